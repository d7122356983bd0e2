/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器调试端口（连接已运行的浏览器时使用）
    pub browser_debug_port: u16,
    /// 是否自行启动无头浏览器
    pub headless: bool,
    /// 浏览器可执行文件路径（无头模式下可选）
    pub chrome_executable: Option<String>,
    /// 帮助文章 URL，标识符作为片段附加在其后
    pub article_url: String,
    /// 用户资料 TOML 文件
    pub profile_file: String,
    /// 批量用户名列表，每行一个
    pub usernames_file: String,
    /// 进度快照文件
    pub snapshot_file: String,
    /// 输出日志文件
    pub output_log_file: String,
    /// 关闭标签页前的宽限时间（毫秒）
    pub close_tab_grace_ms: u64,
    /// 代理等待表单出现的最长时间（毫秒）
    pub form_wait_timeout_ms: u64,
    /// 代理提交后等待结果的最长时间（毫秒）
    pub outcome_timeout_ms: u64,
    /// 快照有效期（秒）
    pub snapshot_max_age_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 2001,
            headless: false,
            chrome_executable: None,
            article_url: "https://help.snapchat.com/hc/en-us/articles/7012318024852-I-lost-my-Streak-How-do-I-restore-it".to_string(),
            profile_file: "profile.toml".to_string(),
            usernames_file: "usernames.txt".to_string(),
            snapshot_file: "bulk_progress.json".to_string(),
            output_log_file: "output.txt".to_string(),
            close_tab_grace_ms: 1500,
            form_wait_timeout_ms: 15_000,
            outcome_timeout_ms: 10_000,
            snapshot_max_age_secs: 60 * 60,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").unwrap_or(default.browser_debug_port),
            headless: env_parse("HEADLESS").unwrap_or(default.headless),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(default.chrome_executable),
            article_url: std::env::var("ARTICLE_URL").unwrap_or(default.article_url),
            profile_file: std::env::var("PROFILE_FILE").unwrap_or(default.profile_file),
            usernames_file: std::env::var("USERNAMES_FILE").unwrap_or(default.usernames_file),
            snapshot_file: std::env::var("SNAPSHOT_FILE").unwrap_or(default.snapshot_file),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            close_tab_grace_ms: env_parse("CLOSE_TAB_GRACE_MS").unwrap_or(default.close_tab_grace_ms),
            form_wait_timeout_ms: env_parse("FORM_WAIT_TIMEOUT_MS").unwrap_or(default.form_wait_timeout_ms),
            outcome_timeout_ms: env_parse("OUTCOME_TIMEOUT_MS").unwrap_or(default.outcome_timeout_ms),
            snapshot_max_age_secs: env_parse("SNAPSHOT_MAX_AGE_SECS").unwrap_or(default.snapshot_max_age_secs),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
        }
    }
}

/// 读取并解析环境变量，缺失或无法解析时返回 None
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
