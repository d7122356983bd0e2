use crate::models::profile::{parse_usernames, ParsedBatch, Profile};
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载用户资料
pub async fn load_profile(profile_path: &Path) -> Result<Profile> {
    let content = fs::read_to_string(profile_path)
        .await
        .with_context(|| format!("无法读取资料文件: {}", profile_path.display()))?;

    let profile: Profile = toml::from_str(&content)
        .with_context(|| format!("无法解析资料文件: {}", profile_path.display()))?;

    Ok(profile)
}

/// 从文本文件加载批量用户名（每行一个）
pub async fn load_usernames(list_path: &Path) -> Result<ParsedBatch> {
    if !list_path.exists() {
        anyhow::bail!("用户名列表不存在: {}", list_path.display());
    }

    let content = fs::read_to_string(list_path)
        .await
        .with_context(|| format!("无法读取用户名列表: {}", list_path.display()))?;

    let parsed = parse_usernames(&content);
    tracing::info!(
        "成功加载 {} 个用户名 (去重 {} 个)",
        parsed.usernames.len(),
        parsed.duplicates_removed
    );

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_profile_and_usernames() {
        let dir = tempfile::tempdir().unwrap();
        let profile_path = dir.path().join("profile.toml");
        let list_path = dir.path().join("usernames.txt");

        std::fs::write(
            &profile_path,
            "username = \"me\"\nemail = \"me@example.com\"\nmobile = \"5551234567\"\n",
        )
        .unwrap();
        std::fs::write(&list_path, "alice\nbob\nalice\n").unwrap();

        let profile = load_profile(&profile_path).await.unwrap();
        assert_eq!(profile.username, "me");
        assert!(profile.validated().is_ok());

        let parsed = load_usernames(&list_path).await.unwrap();
        assert_eq!(parsed.usernames, vec!["alice", "bob"]);
        assert_eq!(parsed.duplicates_removed, 1);
    }

    #[tokio::test]
    async fn test_load_usernames_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_usernames(&dir.path().join("nope.txt")).await.is_err());
    }
}
