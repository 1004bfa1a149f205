/// 日志工具模块
///
/// 提供日志初始化和运行阶段输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// `RUST_LOG` 优先；否则按 `verbose` 选择 debug / info。重复调用是安全的。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `max_workers`: 最大并发数
/// - `batch_size`: 每批条目数
pub fn log_startup(max_workers: usize, batch_size: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 并发批量评审模式");
    info!("📊 最大并发数: {} | 每批条目数: {}", max_workers, batch_size);
    info!("{}", "=".repeat(60));
}

/// 记录待处理集合信息
///
/// # 参数
/// - `total`: 条目总数
/// - `resolved`: 已有结果的条目数
/// - `pending`: 待处理条目数
/// - `batches`: 批次数
pub fn log_plan(total: usize, resolved: usize, pending: usize, batches: usize) {
    info!("✓ 共 {} 个条目，已有结果 {} 个", total, resolved);
    if batches == 0 {
        info!("💡 没有待处理条目，跳过远程调用，直接生成结果");
    } else {
        info!("📋 待处理 {} 个条目，共 {} 个批次", pending, batches);
    }
}

/// 记录批次完成进度
pub fn log_progress(completed: usize, total: usize) {
    info!("📦 进度 {}/{}", completed, total);
}

/// 打印最终统计信息
///
/// # 参数
/// - `succeeded`: 成功批次数
/// - `degraded`: 降级批次数
/// - `total`: 批次总数
/// - `output_path`: 结果文件路径
pub fn print_final_stats(succeeded: usize, degraded: usize, total: usize, output_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功批次: {}/{}", succeeded, total);
    info!("❌ 降级批次: {}", degraded);
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_path);
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
