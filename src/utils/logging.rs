/// 日志工具模块
///
/// 提供日志初始化和格式化输出的辅助函数
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::{ChainOutcome, QuizTask};

/// 初始化 tracing
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 info / debug
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "quiz_chain_solver={},tower_http={}",
            default_level, default_level
        ))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录服务启动信息
pub fn log_startup(port: u16, chain_budget: Duration, per_call_timeout: Duration) {
    info!("{}", "=".repeat(60));
    info!("🚀 答题服务启动");
    info!("📡 监听端口: {}", port);
    info!(
        "⏱️ 链路预算: {}s, 单次调用上限: {}s",
        chain_budget.as_secs(),
        per_call_timeout.as_secs()
    );
    info!("{}", "=".repeat(60));
}

/// 记录链路开始
pub fn log_chain_start(chain_id: &str, task: &QuizTask, budget: Duration) {
    info!("\n{}", "=".repeat(60));
    info!("🔗 [链路 {}] 开始: {}", chain_id, task.start_url);
    info!(
        "📨 [链路 {}] 请求时间: {}",
        chain_id,
        task.received_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    info!(
        "⏱️ [链路 {}] 剩余时间: {:.1}s",
        chain_id,
        budget.as_secs_f64()
    );
    info!("{}", "=".repeat(60));
}

/// 记录步骤开始
pub fn log_step_start(chain_id: &str, step_index: usize) {
    info!("\n[链路 {}] {}", chain_id, "─".repeat(30));
    info!("[链路 {}] 处理第 {} 道题目", chain_id, step_index);
}

/// 打印链路统计
pub fn print_chain_summary(chain_id: &str, outcome: &ChainOutcome) {
    info!("\n{}", "=".repeat(60));
    info!("📊 [链路 {}] 处理完成", chain_id);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 正确: {}/{}", outcome.correct, outcome.attempted);
    info!("❌ 失败: {}", outcome.failed);
    info!("🏁 结束原因: {:?}", outcome.terminal_reason);
    info!("⏱️ 耗时: {} ms", outcome.elapsed_ms);
    info!("{}", "=".repeat(60));
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
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("一二三四五", 3), "一二三...");
    }
}
