//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `build`: 构建体相 / 表面 / 界面结构
//! - `optimize`: BFGS 结构优化
//! - `phonon`: 有限位移声子计算
//! - `call`: 以 JSON 参数按名称调用工具
//! - `tools`: 列出工具及参数
//!
//! 全局参数 `--config` 指定 TOML 配置文件。
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: build, optimize, phonon, call

pub mod build;
pub mod call;
pub mod optimize;
pub mod phonon;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dpcalc - 基于机器学习势的结构构建、优化与声子计算
#[derive(Parser)]
#[command(name = "dpcalc")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Structure building, relaxation and phonon calculations with machine-learned potentials", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "DPCALC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Build a bulk, surface or interface structure
    Build(build::BuildArgs),

    /// Relax atomic positions with BFGS
    Optimize(optimize::OptimizeArgs),

    /// Calculate phonon properties by finite displacements
    Phonon(phonon::PhononArgs),

    /// Call a tool by name with JSON parameters
    Call(call::CallArgs),

    /// List the available tools and their parameters
    Tools,
}
