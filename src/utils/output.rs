//! # 美化输出工具
//!
//! 提供统一的终端输出样式。标题栏宽度跟随终端宽度 (最多 80 列)。
//!
//! ## 依赖关系
//! - 被所有 `commands/` 模块使用
//! - 使用 `colored`, `console` crate

use colored::Colorize;

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

fn rule_width() -> usize {
    let (_, cols) = console::Term::stdout().size();
    (cols as usize).clamp(20, 80)
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(rule_width());
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

/// 打印分隔线
pub fn print_separator() {
    println!("{}", "─".repeat(rule_width()).dimmed());
}
