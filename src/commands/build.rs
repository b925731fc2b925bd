//! # build 子命令实现
//!
//! ## 依赖关系
//! - 使用 `cli/build.rs` 定义的参数
//! - 调用 `tools::Toolkit::build_structure`

use super::check;
use crate::cli::build::BuildArgs;
use crate::error::Result;
use crate::tools::Toolkit;
use crate::utils::{output, progress};

/// 执行结构构建
pub fn execute(args: BuildArgs, toolkit: Toolkit) -> Result<()> {
    output::print_header("Structure Builder");
    output::print_info(&format!(
        "Building {} structure of {}",
        args.structure_type, args.material1
    ));

    let params = args.to_params();
    let spinner = progress::create_spinner("Building structure...");
    let result = toolkit.build_structure(&params);
    spinner.finish_and_clear();

    check(&result.message, !result.is_success())?;
    output::print_success(&format!(
        "{} ({} atoms) written to '{}'",
        result.formula,
        result.num_atoms,
        result.structure_file.display()
    ));
    Ok(())
}
