//! 端到端流程场景：登录 → 查询 → 分页勾选
//!
//! 使用脚本化门户，验证操作顺序与会话生命周期。

mod common;

use common::*;
use fpg_bulletin::error::AppError;
use fpg_bulletin::models::{format_date, today, SearchRequest, SearchResult};
use fpg_bulletin::services::CaptchaResolution;
use fpg_bulletin::App;

fn app_for(launcher: &FakeLauncher, resolver: std::sync::Arc<ScriptedResolver>, request: SearchRequest) -> App<FakeLauncher> {
    App::new(launcher.clone(), resolver, credentials(), request)
        .with_timings(instant_timings())
        .with_retry(instant_retry())
}

fn by_case(case_number: &str) -> SearchRequest {
    SearchRequest {
        case_number: Some(case_number.to_string()),
        ..Default::default()
    }
}

fn for_today() -> SearchRequest {
    SearchRequest {
        date_start: Some("today".to_string()),
        date_end: Some("today".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn case_search_without_checkboxes_returns_to_main() {
    let launcher = FakeLauncher::new(PortalScript::listing(vec![vec![]]));
    let resolver = ScriptedResolver::always(solved("1234"));
    let app = app_for(&launcher, resolver.clone(), by_case("AB-12345"));

    let report = app.run().await.unwrap();

    assert_eq!(report.login.attempts, 1);
    assert_eq!(report.search, SearchResult::Success { rows_present: false });
    let pagination = report.pagination.unwrap();
    assert_eq!(pagination.visited_pages, vec![1]);
    assert!(pagination.saved_pages.is_empty());

    let events = launcher.events();
    assert!(events.contains(&"case:AB-12345".to_string()));
    assert!(events_with(&events, "save").is_empty());
    assert_eq!(events.last().map(String::as_str), Some("back_to_main"));
    assert_eq!(launcher.opens(), 1);
    assert_eq!(launcher.closes(), 1);
}

#[tokio::test]
async fn unreadable_captchas_then_three_page_listing() {
    let launcher = FakeLauncher::new(PortalScript::listing(vec![
        vec!["A1", "A2"],
        vec!["B1", "B2"],
        vec!["C1", "C2"],
    ]));
    let resolver = ScriptedResolver::new(vec![
        CaptchaResolution::Failure,
        CaptchaResolution::Failure,
        CaptchaResolution::Failure,
        CaptchaResolution::Failure,
        solved("1234"),
    ]);
    let app = app_for(&launcher, resolver.clone(), for_today());

    let report = app.run().await.unwrap();

    // 识别失败的尝试不提交表单
    assert_eq!(report.login.attempts, 5);
    assert_eq!(report.login.submissions, 1);
    assert_eq!(launcher.submissions(), 1);
    assert_eq!(resolver.calls(), 5);

    let events = launcher.events();
    let today = format_date(today());
    assert!(events.contains(&format!("pick_date:Start:{}", today)));
    assert!(events.contains(&format!("pick_date:End:{}", today)));
    assert!(events.contains(&"date_kind:Publish".to_string()));

    let interesting: Vec<&str> = events
        .iter()
        .map(String::as_str)
        .filter(|e| e.starts_with("toggle") || e.starts_with("save") || e.starts_with("jump") || *e == "back_to_main")
        .collect();
    assert_eq!(
        interesting,
        vec![
            "toggle:1:A1",
            "toggle:1:A2",
            "save:1",
            "jump:2",
            "toggle:2:B1",
            "toggle:2:B2",
            "save:2",
            "jump:3",
            "toggle:3:C1",
            "toggle:3:C2",
            "save:3",
            "back_to_main",
        ]
    );

    // 初次查询加两次重新进入
    assert_eq!(events_with(&events, "submit_search").len(), 3);

    let pagination = report.pagination.unwrap();
    assert_eq!(pagination.visited_pages, vec![1, 2, 3]);
    assert_eq!(pagination.saved_pages, vec![1, 2, 3]);
    assert_eq!(pagination.selected_rows, 6);
    assert_eq!(launcher.closes(), 1);
}

#[tokio::test]
async fn unknown_case_number_skips_pagination() {
    let launcher = FakeLauncher::new(PortalScript::not_found());
    let app = app_for(&launcher, ScriptedResolver::always(solved("1234")), by_case("ZZ-00000"));

    let report = app.run().await.unwrap();

    assert!(matches!(report.search, SearchResult::NotFound { ref message } if message.contains("查無此案號")));
    assert!(report.pagination.is_none());

    let events = launcher.events();
    assert!(events_with(&events, "toggle").is_empty());
    assert!(events_with(&events, "save").is_empty());
    assert!(!events.contains(&"back_to_main".to_string()));
    assert_eq!(launcher.closes(), 1);
}

#[tokio::test]
async fn single_empty_page_goes_straight_back() {
    let launcher = FakeLauncher::new(PortalScript::listing(vec![]));
    let app = app_for(&launcher, ScriptedResolver::always(solved("1234")), for_today());

    let report = app.run().await.unwrap();

    let events = launcher.events();
    assert!(events_with(&events, "save").is_empty());
    assert!(events_with(&events, "jump").is_empty());
    assert!(events_with(&events, "next").is_empty());
    assert_eq!(events_with(&events, "open_bulletin").len(), 1);
    assert_eq!(events.last().map(String::as_str), Some("back_to_main"));
    assert_eq!(report.pagination.unwrap().visited_pages, vec![1]);
}

#[tokio::test]
async fn pages_are_visited_once_in_increasing_order() {
    let mut script = PortalScript::listing(vec![vec!["A1", "A2"], vec!["B1"], vec![], vec!["D1"]]);
    script.preselected = vec!["B1"];
    let launcher = FakeLauncher::new(script);
    let app = app_for(&launcher, ScriptedResolver::always(solved("1234")), for_today());

    let report = app.run().await.unwrap();
    let pagination = report.pagination.unwrap();

    assert_eq!(pagination.visited_pages, vec![1, 2, 3, 4]);
    assert_eq!(pagination.saved_pages, vec![1, 4]);
    assert_eq!(pagination.selected_rows, 3);

    let events = launcher.events();
    // 保存后重新进入，没有保存时原地翻页
    assert_eq!(events_with(&events, "jump"), vec!["jump:2"]);
    assert_eq!(events_with(&events, "next"), vec!["next:3", "next:4"]);
    // 已勾选的行不再点击
    assert!(!events.contains(&"toggle:2:B1".to_string()));
}

#[tokio::test]
async fn login_gives_up_after_five_unreadable_captchas() {
    let launcher = FakeLauncher::new(PortalScript::listing(vec![vec!["A1"]]));
    let resolver = ScriptedResolver::always(CaptchaResolution::Failure);
    let app = app_for(&launcher, resolver.clone(), for_today());

    let err = app.run().await.unwrap_err();

    assert!(matches!(err, AppError::AuthenticationExhausted { attempts: 5 }));
    assert_eq!(resolver.calls(), 5);
    assert_eq!(launcher.submissions(), 0);
    assert!(events_with(&launcher.events(), "open_bulletin").is_empty());
    assert_eq!(launcher.opens(), 1);
    assert_eq!(launcher.closes(), 1);
}

#[tokio::test]
async fn rejected_logins_reload_the_login_page() {
    let launcher = FakeLauncher::new(PortalScript::listing(vec![vec!["A1"]]));
    let app = app_for(&launcher, ScriptedResolver::always(solved("9999")), for_today());

    let err = app.run().await.unwrap_err();

    assert!(matches!(err, AppError::AuthenticationExhausted { attempts: 5 }));
    assert_eq!(launcher.submissions(), 5);
    // 首次载入加四次失败后的重新载入
    assert_eq!(events_with(&launcher.events(), "open_login").len(), 5);
}

#[tokio::test]
async fn invalid_input_never_opens_a_session() {
    for request in [by_case("ab-123"), SearchRequest::default()] {
        let launcher = FakeLauncher::new(PortalScript::listing(vec![]));
        let resolver = ScriptedResolver::always(solved("1234"));
        let app = app_for(&launcher, resolver.clone(), request);

        let err = app.run().await.unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(launcher.opens(), 0);
        assert_eq!(resolver.calls(), 0);
        assert!(launcher.events().is_empty());
    }
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let mut script = PortalScript::listing(vec![vec!["A1"], vec!["B1"]]);
    script.fail_once = vec!["submit_search", "page_cursor", "list_rows"];
    let launcher = FakeLauncher::new(script);
    let app = app_for(&launcher, ScriptedResolver::always(solved("1234")), for_today());

    let report = app.run().await.unwrap();

    let events = launcher.events();
    assert!(events.contains(&"timeout:submit_search".to_string()));
    assert!(events.contains(&"timeout:page_cursor".to_string()));
    assert!(events.contains(&"timeout:list_rows".to_string()));
    assert_eq!(report.pagination.unwrap().saved_pages, vec![1, 2]);
}

#[tokio::test]
async fn reload_recovers_a_jump_that_landed_despite_timeouts() {
    let mut script = PortalScript::listing(vec![vec!["A1"], vec!["B1"]]);
    script.jump_times_out_but_lands = true;
    let launcher = FakeLauncher::new(script);
    let app = app_for(&launcher, ScriptedResolver::always(solved("1234")), for_today());

    let report = app.run().await.unwrap();

    let events = launcher.events();
    assert_eq!(events_with(&events, "jump").len(), 3);
    assert_eq!(events_with(&events, "reload").len(), 1);
    let pagination = report.pagination.unwrap();
    assert_eq!(pagination.visited_pages, vec![1, 2]);
    assert_eq!(pagination.saved_pages, vec![1, 2]);
}

#[tokio::test]
async fn unexpected_banner_fails_but_still_releases_the_session() {
    let mut script = PortalScript::listing(vec![vec!["A1"]]);
    script.banner.text = "系統維護中".to_string();
    let launcher = FakeLauncher::new(script);
    let app = app_for(&launcher, ScriptedResolver::always(solved("1234")), for_today());

    let err = app.run().await.unwrap_err();

    assert!(matches!(err, AppError::Contract(ref msg) if msg.contains("系統維護中")));
    assert!(events_with(&launcher.events(), "toggle").is_empty());
    assert_eq!(launcher.opens(), 1);
    assert_eq!(launcher.closes(), 1);
}

#[tokio::test]
async fn failures_are_recorded_to_the_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("output.txt");
    let launcher = FakeLauncher::new(PortalScript::listing(vec![vec!["A1"]]));
    let app = app_for(&launcher, ScriptedResolver::always(CaptchaResolution::Failure), for_today())
        .with_diagnostics(fpg_bulletin::services::Diagnostics::new(dir.path().join("screenshots"), &log));

    assert!(app.run().await.is_err());

    let content = std::fs::read_to_string(&log).unwrap();
    assert!(content.contains("登录失败"));
    // 截图目录在运行开始时创建
    assert!(dir.path().join("screenshots").exists());
}

#[tokio::test]
async fn login_page_timeout_costs_one_attempt() {
    let mut script = PortalScript::listing(vec![vec![]]);
    script.fail_once = vec!["open_login"];
    let launcher = FakeLauncher::new(script);
    let resolver = ScriptedResolver::always(solved("1234"));
    let app = app_for(&launcher, resolver.clone(), by_case("AB-12345"));

    let report = app.run().await.unwrap();

    assert_eq!(report.login.attempts, 2);
    assert_eq!(report.login.submissions, 1);
    assert_eq!(resolver.calls(), 1);
    let events = launcher.events();
    assert_eq!(events.first().map(String::as_str), Some("timeout:open_login"));
    assert_eq!(events_with(&events, "open_login").len(), 1);
}

#[tokio::test]
async fn submit_timeout_consumes_a_login_attempt() {
    let mut script = PortalScript::listing(vec![vec![]]);
    script.fail_once = vec!["submit_login"];
    let launcher = FakeLauncher::new(script);
    let resolver = ScriptedResolver::always(solved("1234"));
    let app = app_for(&launcher, resolver.clone(), by_case("AB-12345"));

    let report = app.run().await.unwrap();

    assert_eq!(report.login.attempts, 2);
    // 超时的那次已经点过登录
    assert_eq!(report.login.submissions, 2);
    assert_eq!(launcher.submissions(), 1);
    assert_eq!(resolver.calls(), 2);
    // 超时后重新载入登录页
    assert_eq!(events_with(&launcher.events(), "open_login").len(), 2);
}

#[tokio::test]
async fn notice_date_kind_reaches_the_portal() {
    let launcher = FakeLauncher::new(PortalScript::listing(vec![vec![]]));
    let request = SearchRequest {
        date_kind: Some("notice".to_string()),
        ..for_today()
    };
    let app = app_for(&launcher, ScriptedResolver::always(solved("1234")), request);

    app.run().await.unwrap();

    let events = launcher.events();
    assert_eq!(events_with(&events, "date_kind"), vec!["date_kind:Notice"]);
}

#[tokio::test]
async fn failed_next_page_click_is_retried_in_place() {
    let mut script = PortalScript::listing(vec![vec!["A1"], vec!["B1"]]);
    script.preselected = vec!["A1", "B1"];
    script.fail_once = vec!["next_page"];
    let launcher = FakeLauncher::new(script);
    let app = app_for(&launcher, ScriptedResolver::always(solved("1234")), for_today());

    let report = app.run().await.unwrap();

    let events = launcher.events();
    assert!(events.contains(&"timeout:next_page".to_string()));
    assert_eq!(events_with(&events, "next"), vec!["next:2"]);
    let pagination = report.pagination.unwrap();
    assert_eq!(pagination.visited_pages, vec![1, 2]);
    assert!(pagination.saved_pages.is_empty());
}

#[tokio::test]
async fn late_page_indicator_is_reread_without_clicking_again() {
    let mut script = PortalScript::listing(vec![vec![], vec![], vec![]]);
    script.next_page_lands_late = true;
    let launcher = FakeLauncher::new(script);
    let app = app_for(&launcher, ScriptedResolver::always(solved("1234")), for_today());

    let report = app.run().await.unwrap();

    assert_eq!(events_with(&launcher.events(), "next"), vec!["next:2", "next:3"]);
    assert_eq!(report.pagination.unwrap().visited_pages, vec![1, 2, 3]);
}

#[tokio::test]
async fn save_that_lands_despite_timeout_is_not_repeated() {
    let mut script = PortalScript::listing(vec![vec!["A1"], vec!["B1"]]);
    script.save_times_out_but_lands = true;
    let launcher = FakeLauncher::new(script);
    let app = app_for(&launcher, ScriptedResolver::always(solved("1234")), for_today());

    let report = app.run().await.unwrap();

    let events = launcher.events();
    assert_eq!(events_with(&events, "save"), vec!["save:1", "save:2"]);
    let pagination = report.pagination.unwrap();
    assert_eq!(pagination.saved_pages, vec![1, 2]);
    assert_eq!(pagination.selected_rows, 2);
    assert_eq!(events.last().map(String::as_str), Some("back_to_main"));
}

#[tokio::test]
async fn duplicate_row_ids_stop_before_any_click() {
    // 没有 value 属性的勾选框在页面上都读成 "on"
    let launcher = FakeLauncher::new(PortalScript::listing(vec![vec!["on", "on", "on"]]));
    let app = app_for(&launcher, ScriptedResolver::always(solved("1234")), for_today());

    let err = app.run().await.unwrap_err();

    assert!(matches!(err, AppError::Contract(ref msg) if msg.contains("on")));
    let events = launcher.events();
    assert!(events_with(&events, "toggle").is_empty());
    assert!(events_with(&events, "save").is_empty());
    assert_eq!(launcher.closes(), 1);
}
