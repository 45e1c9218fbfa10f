//! 需要真实浏览器与门户账号的测试，默认忽略

use fpg_bulletin::config::Config;
use fpg_bulletin::portal::{ChromeLauncher, Portal, PortalLauncher};
use fpg_bulletin::utils::logging;
use fpg_bulletin::App;

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_full_run_against_portal() {
    // 初始化日志
    logging::init(true);

    // 加载配置
    let config = Config::load().expect("加载配置失败");

    let app = App::from_config(&config).expect("配置不完整");
    let report = app.run().await.expect("处理失败");

    println!("{:?}", report);
}

#[tokio::test]
#[ignore]
async fn test_login_page_has_captcha() {
    // 初始化日志
    logging::init(true);

    // 加载配置
    let config = Config::load().expect("加载配置失败");

    let launcher = ChromeLauncher::from_config(&config);
    let mut portal = launcher.open().await.expect("应该能够启动浏览器");

    portal.open_login_page().await.expect("应该能够打开登录页");
    let image = portal.capture_captcha().await.expect("应该能够截取验证码");
    assert!(!image.is_empty());

    portal.close().await.expect("关闭浏览器失败");
}
