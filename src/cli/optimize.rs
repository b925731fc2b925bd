//! # optimize 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/optimize.rs`

use crate::optimize::OptimizeParams;

use clap::Args;
use std::path::PathBuf;

/// optimize 子命令参数
#[derive(Args, Debug)]
pub struct OptimizeArgs {
    /// Input structure file (.cif, .vasp, POSCAR, .xyz)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Potential model (local path, remote URI, or 'lj[:epsilon=..,sigma=..]')
    #[arg(short, long)]
    pub model: String,

    /// Model head for multi-task models
    #[arg(long)]
    pub head: Option<String>,

    /// Force convergence criterion (eV/Angstrom)
    #[arg(short = 'f', long, default_value_t = 0.01)]
    pub force_tolerance: f64,

    /// Maximum number of BFGS steps
    #[arg(short = 'n', long, default_value_t = 100)]
    pub max_iterations: usize,
}

impl OptimizeArgs {
    pub fn to_params(&self) -> OptimizeParams {
        OptimizeParams {
            input_structure: self.input.clone(),
            model_path: self.model.clone(),
            head: self.head.clone(),
            force_tolerance: self.force_tolerance,
            max_iterations: self.max_iterations,
        }
    }
}
