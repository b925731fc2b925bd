//! # dpcalc - 基于机器学习势的材料计算工具
//!
//! 三个无状态工具，统一成单一可执行文件：
//!
//! ## 子命令
//! - `build`    - 构建体相 / 表面 / 双材料界面结构 (含晶格匹配)
//! - `optimize` - BFGS 原子位置优化
//! - `phonon`   - 有限位移声子计算 (热力学量、能带)
//! - `call`     - 以 JSON 参数按名称调用工具
//! - `tools`    - 列出工具及参数
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     └── tools/     (工具注册表)
//!   │           ├── builder/   (结构构建)
//!   │           ├── optimize/  (BFGS 优化)
//!   │           └── phonon/    (声子计算)
//!   ├── potential/  (能量/受力 oracle)
//!   ├── parsers/    (结构文件读写)
//!   ├── models/     (数据模型)
//!   ├── config.rs   (运行配置)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod builder;
mod cli;
mod commands;
mod config;
mod error;
mod models;
mod optimize;
mod parsers;
mod phonon;
mod potential;
mod tools;
mod utils;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use config::Config;
use std::path::Path;

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration '{}'", path.display())),
        None => Ok(Config::default()),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    commands::run(cli.command, config)?;
    Ok(())
}

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        utils::output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
