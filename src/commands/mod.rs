//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑：把 CLI 参数转换为工具参数，通过 [`Toolkit`] 运行，
//! 在终端打印状态和结果表格。工具结果带错误时以 `Err` 返回，进程退出码非零。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `tools/`, `utils/`
//! - 子模块: build, optimize, phonon, call

pub mod build;
pub mod call;
pub mod optimize;
pub mod phonon;

use crate::cli::Commands;
use crate::config::Config;
use crate::error::{CalcError, Result};
use crate::tools::{self, Toolkit};
use crate::utils::output;

use tabled::{Table, Tabled};

/// 执行命令
pub fn run(cmd: Commands, config: Config) -> Result<()> {
    match cmd {
        Commands::Build(args) => build::execute(args, Toolkit::new(config)),
        Commands::Optimize(args) => optimize::execute(args, Toolkit::new(config)),
        Commands::Phonon(args) => phonon::execute(args, config),
        Commands::Call(args) => call::execute(args, Toolkit::new(config)),
        Commands::Tools => list_tools(),
    }
}

/// 工具结果中的错误转换为命令错误
fn check(message: &str, failed: bool) -> Result<()> {
    if failed {
        Err(CalcError::Other(message.to_string()))
    } else {
        Ok(())
    }
}

#[derive(Tabled)]
struct ParameterRow {
    #[tabled(rename = "Parameter")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Default")]
    default: String,
}

/// 列出全部工具
fn list_tools() -> Result<()> {
    for tool in tools::descriptors() {
        output::print_header(tool.name);
        output::print_info(tool.description);
        let rows: Vec<ParameterRow> = tool
            .parameters
            .iter()
            .map(|p| ParameterRow {
                name: p.name.to_string(),
                kind: p.kind.to_string(),
                default: match (&p.default, p.required) {
                    (_, true) => "(required)".to_string(),
                    (Some(v), false) => v.to_string(),
                    (None, false) => "null".to_string(),
                },
            })
            .collect();
        println!("{}", Table::new(&rows));
    }
    Ok(())
}
