//! # optimize 子命令实现
//!
//! ## 依赖关系
//! - 使用 `cli/optimize.rs` 定义的参数
//! - 调用 `tools::Toolkit::optimize_crystal_structure`

use super::check;
use crate::cli::optimize::OptimizeArgs;
use crate::error::Result;
use crate::tools::Toolkit;
use crate::utils::{output, progress};

use tabled::{Table, Tabled};

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Quantity")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// 执行结构优化
pub fn execute(args: OptimizeArgs, toolkit: Toolkit) -> Result<()> {
    output::print_header("BFGS Structure Optimization");
    output::print_info(&format!(
        "Relaxing '{}' with model '{}' (fmax = {} eV/A, max {} steps)",
        args.input.display(),
        args.model,
        args.force_tolerance,
        args.max_iterations
    ));

    let params = args.to_params();
    let spinner = progress::create_spinner("Optimizing...");
    let result = toolkit.optimize_crystal_structure(&params);
    spinner.finish_and_clear();

    check(&result.message, !result.is_success())?;

    let rows = vec![
        SummaryRow {
            name: "Final energy (eV)",
            value: format!("{:.6}", result.final_energy),
        },
        SummaryRow {
            name: "Max force (eV/A)",
            value: format!("{:.6}", result.max_force),
        },
        SummaryRow {
            name: "Steps",
            value: result.steps.to_string(),
        },
        SummaryRow {
            name: "Converged",
            value: result.converged.to_string(),
        },
    ];
    println!("{}", Table::new(&rows));

    if result.converged {
        output::print_success(&result.message);
    } else {
        output::print_warning(&result.message);
    }
    output::print_info(&format!(
        "Optimized structure: '{}'",
        result.optimized_structure.display()
    ));
    if let Some(traj) = &result.optimization_traj {
        output::print_info(&format!("Trajectory: '{}'", traj.display()));
    }
    Ok(())
}
