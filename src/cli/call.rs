//! # call 子命令 CLI 定义
//!
//! 以 JSON 参数按名称调用工具，参数来自命令行字符串或文件。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/call.rs`

use clap::Args;
use std::path::PathBuf;

/// call 子命令参数
#[derive(Args, Debug)]
pub struct CallArgs {
    /// Tool name (build_structure, optimize_crystal_structure, calculate_phonon)
    pub tool: String,

    /// JSON object with the tool parameters
    #[arg(short, long, conflicts_with = "args_file")]
    pub args: Option<String>,

    /// File containing the JSON parameters
    #[arg(long)]
    pub args_file: Option<PathBuf>,

    /// Pretty-print the JSON result
    #[arg(short, long, default_value_t = false)]
    pub pretty: bool,
}
