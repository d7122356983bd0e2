//! 日志工具模块
//!
//! 提供日志格式化和输出的辅助函数

use anyhow::Result;
use std::fs;
use tracing::{info, warn};

use crate::models::{BatchSummary, Event};

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n批量恢复日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(article_url: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 单标签页顺序处理模式");
    info!("🔗 文章地址: {}", truncate_text(article_url, 80));
    info!("{}", "=".repeat(60));
}

/// 记录批量输入加载信息
///
/// # 参数
/// - `total`: 待处理数量
/// - `duplicates_removed`: 去重数量
pub fn log_batch_loaded(total: usize, duplicates_removed: usize) {
    info!("✓ 找到 {} 个待处理的用户名", total);
    if duplicates_removed > 0 {
        info!("📋 已去除 {} 个重复项", duplicates_removed);
    }
    info!("💡 每个标签页处理完成后再打开下一个\n");
}

/// 以控制端视角输出编排器事件
pub fn log_event(event: &Event) {
    match event {
        Event::ProgressUpdate { current, total, .. } => {
            info!("📦 正在打开第 {}/{} 个标签页 ({}%)", current + 1, total, percent(*current, *total));
        }
        Event::TabCreationError {
            identifier,
            failed,
            total,
        } => {
            warn!(
                "⚠️ {} 的标签页打开失败: 共 {}/{} 个失败，请检查是否拦截了弹窗",
                identifier, failed, total
            );
        }
        Event::BulkOperationComplete { .. } => {}
        Event::BulkOperationCancelled => {
            warn!("🛑 操作已取消");
        }
        Event::OperationStateRestored { state } => {
            if state.processing {
                info!(
                    "♻️ 上次运行进度: 已处理 {}/{} 个标签页",
                    state.processed(),
                    state.total
                );
            }
        }
    }
}

/// 打印最终统计信息
///
/// # 参数
/// - `summary`: 批量统计
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(summary: &BatchSummary, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", summary.success, summary.total);
    info!("❌ 失败: {}", summary.failed);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

fn percent(current: usize, total: usize) -> usize {
    if total == 0 {
        0
    } else {
        (current * 100 + total / 2) / total
    }
}
