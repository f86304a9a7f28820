/// 日志工具模块
///
/// 日志写入文件而不是终端，避免和交互式输出混在一起。
use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::SessionResult;

/// 初始化全局日志
///
/// 过滤级别优先取 `RUST_LOG`，否则为 `info`（开启详细日志时为 `debug`）。
pub fn init(config: &Config) -> Result<()> {
    init_log_file(&config.log_file)?;

    let file = OpenOptions::new().append(true).open(&config.log_file)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(config.verbose_logging)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("日志初始化失败: {}", e))
}

fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// 初始化日志文件，写入带时间的文件头
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\nPDF 出题日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - PDF 出题模式");
    info!("🌐 接口地址: {}", config.api_base_url);
    info!(
        "📄 最多读取 {} 页，最多发送 {} 个字符",
        config.max_pdf_pages, config.max_source_chars
    );
    info!("{}", "=".repeat(60));
}

/// 记录一次答题的统计
///
/// # 参数
/// - `result`: 答题结果
/// - `percentage`: 得分百分比
pub fn log_session_summary(result: &SessionResult, percentage: u32) {
    let timed_out = result.answers.iter().filter(|a| a.timed_out()).count();
    info!("\n{}", "─".repeat(60));
    info!("📊 答题统计");
    info!("✅ 正确: {}/{} ({}%)", result.score, result.total, percentage);
    info!("⏰ 超时: {}", timed_out);
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        assert_eq!(truncate_text("题目内容很长", 2), "题目...");
    }

    #[test]
    fn verbose_switches_default_level() {
        assert_eq!(default_level(true), "debug");
        assert_eq!(default_level(false), "info");
    }

    #[test]
    fn log_file_starts_with_header() {
        let path = std::env::temp_dir().join(format!("pdf-quiz-log-{}.log", std::process::id()));
        let path_str = path.to_string_lossy().to_string();

        init_log_file(&path_str).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&"=".repeat(60)));
        assert!(content.contains("PDF 出题日志"));

        let _ = fs::remove_file(&path);
    }
}
