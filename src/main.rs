use std::path::Path;

use anyhow::{Context, Result};
use streak_restore::models::{load_profile, load_usernames};
use streak_restore::utils::logging::log_batch_loaded;
use streak_restore::{logger, App, Config};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logger::init(config.verbose_logging);

    // 加载并校验用户资料
    let profile = load_profile(Path::new(&config.profile_file))
        .await?
        .validated()
        .context("用户资料无效，请先更新 profile.toml")?;

    // 加载用户名列表
    let batch = load_usernames(Path::new(&config.usernames_file)).await?;
    if batch.usernames.is_empty() {
        warn!("⚠️ 没有找到有效的用户名，程序结束");
        return Ok(());
    }
    log_batch_loaded(batch.usernames.len(), batch.duplicates_removed);

    // 初始化并运行应用
    let app = App::initialize(config, profile).await?;
    match app.run(batch.usernames).await? {
        Some(summary) if summary.failed > 0 => {
            warn!("完成但有错误: 成功 {}，失败 {}", summary.success, summary.failed);
        }
        Some(summary) => info!("✅ 全部完成: {} 个标签页", summary.success),
        None => info!("操作已取消"),
    }

    Ok(())
}
