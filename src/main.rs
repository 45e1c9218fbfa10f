use anyhow::Result;
use fpg_bulletin::config::Config;
use fpg_bulletin::services::Diagnostics;
use fpg_bulletin::utils::logging;
use fpg_bulletin::App;
use tracing::{error, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 先用默认级别初始化日志，配置加载过程也能输出
    logging::init(false);

    // 加载配置
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ 加载配置失败: {}", e);
            return Err(e.into());
        }
    };
    logging::set_verbose(config.verbose_logging);

    if let Err(e) = logging::init_log_file(&config.output_log_file) {
        warn!("初始化失败记录文件失败: {}", e);
    }

    // 初始化并运行应用
    let app = match App::from_config(&config) {
        Ok(app) => app,
        Err(e) => {
            error!("❌ 配置不完整: {}", e);
            Diagnostics::new(&config.screenshots_dir, &config.output_log_file)
                .record_failure("初始化", &e)
                .await;
            return Err(e.into());
        }
    };
    if let Err(e) = app.run().await {
        error!("❌ 执行失败: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
