//! 门户页面选择器与固定文字
//!
//! 门户改版时只需要修改这里。

// ---------- 登录页 ----------

pub const CAPTCHA_IMAGE: &str = "img#vcode";
pub const CAPTCHA_REFRESH: &str = r#"a img[alt="重新換一組驗證碼"]"#;
pub const USERNAME_INPUT: &str = r#"input[name="id"]"#;
pub const PASSWORD_INPUT: &str = r#"input[name="passwd"]"#;
pub const CAPTCHA_INPUT: &str = r#"input[name="vcode"]"#;
pub const LOGIN_SUBMIT: &str = r#"input[type="submit"]"#;
pub const LOGIN_SUBMIT_FALLBACK: &str = r#"input[type="button"][value="登入"]"#;
pub const MENU: &str = ".menu_pos";

/// 登录成功后菜单中必须同时出现的标签
pub const POST_LOGIN_MENU_LABELS: [&str; 3] = ["熱訊", "標售公報", "標案管理"];

// ---------- 查询表单 ----------

pub const BULLETIN_MENU_TEXT: &str = "標售公報";
pub const QUERY_FORM: &str = "form#qryForm";
pub const QUERY_MODE_BY_DATE: &str = r#"input[name="qryType"][value="date"]"#;
pub const QUERY_MODE_BY_CASE: &str = r#"input[name="qryType"][value="caseNo"]"#;
pub const START_DATE_PICKER: &str = "#startDateBtn";
pub const END_DATE_PICKER: &str = "#endDateBtn";
pub const DATE_KIND_PUBLISH: &str = r#"input[name="dateType"][value="publish"]"#;
pub const DATE_KIND_NOTICE: &str = r#"input[name="dateType"][value="notice"]"#;
pub const CASE_NUMBER_INPUT: &str = r#"input[name="caseNo"]"#;
pub const SEARCH_BUTTON: &str = r#"input[type="button"][value="查詢"]"#;

/// 日期弹窗中每个日期链接内嵌的动作，参数为 `YYYY/MM/DD`
pub const DATE_ACTION_PREFIX: &str = "setDate('";

// ---------- 结果页 ----------

pub const RESULT_AREA: &str = "#resultArea";

/// 成功与错误横幅共用部分样式类，用一个选择器同时等待
pub const RESULT_BANNER: &str = "div.title_msg, div.err_msg";
pub const SUCCESS_BANNER_CLASS: &str = "title_msg";
/// 横幅文字去掉首尾空白后必须与下面两个常量完全相等
pub const SUCCESS_TITLE: &str = "標售公報查詢結果";
pub const NOT_FOUND_TEXT: &str = "查無此案號";

pub const ROW_CHECKBOX: &str = r#"table.result_table input[type="checkbox"][name="chkCase"]"#;
/// 点击前临时标记目标勾选框的属性
pub const ROW_TARGET_ATTR: &str = "data-row-target";
pub const SAVE_BUTTON: &str = r#"input[type="button"][value="儲存"]"#;
pub const PAGE_INDICATOR: &str = "span.page_info";
pub const JUMP_INPUT: &str = r#"input[name="goPage"]"#;
pub const JUMP_BUTTON: &str = r#"input[type="button"][value="GO"]"#;
pub const NEXT_PAGE_TEXT: &str = "下一頁";
pub const BACK_TO_MAIN_TEXT: &str = "回主畫面";
