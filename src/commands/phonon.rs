//! # phonon 子命令实现
//!
//! `--jobs` 与 `--no-plot` 覆盖配置文件中的 `[phonon]` 设置。
//!
//! ## 依赖关系
//! - 使用 `cli/phonon.rs` 定义的参数
//! - 调用 `tools::Toolkit::calculate_phonon`

use super::check;
use crate::cli::phonon::PhononArgs;
use crate::config::Config;
use crate::error::Result;
use crate::tools::Toolkit;
use crate::utils::{output, progress};

use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ThermalRow {
    #[tabled(rename = "T (K)")]
    temperature: String,
    #[tabled(rename = "F (kJ/mol)")]
    free_energy: String,
    #[tabled(rename = "S (J/K/mol)")]
    entropy: String,
    #[tabled(rename = "Cv (J/K/mol)")]
    heat_capacity: String,
}

/// 执行声子计算
pub fn execute(args: PhononArgs, mut config: Config) -> Result<()> {
    output::print_header("Finite-Displacement Phonon Calculation");
    if args.jobs > 0 {
        config.phonon.jobs = args.jobs;
    }
    if args.no_plot {
        config.phonon.plot = false;
    }
    output::print_info(&format!(
        "Structure '{}', supercell {:?}, displacement {} A",
        args.input.display(),
        args.supercell,
        args.displacement
    ));

    let toolkit = Toolkit::new(config);
    let params = args.to_params();
    let spinner = progress::create_spinner("Computing forces and phonons...");
    let result = toolkit.calculate_phonon(&params);
    spinner.finish_and_clear();

    check(&result.message, !result.is_success())?;
    output::print_success(&result.message);

    let rows: Vec<ThermalRow> = result
        .thermal_properties
        .iter()
        .map(|p| ThermalRow {
            temperature: format!("{:.1}", p.temperature),
            free_energy: format!("{:.4}", p.free_energy),
            entropy: format!("{:.4}", p.entropy),
            heat_capacity: format!("{:.4}", p.heat_capacity),
        })
        .collect();
    output::print_header("Thermal Properties");
    println!("{}", Table::new(&rows));

    output::print_info(&format!(
        "Max frequency: {:.4} THz ({:.1} K)",
        result.max_frequency_thz, result.max_frequency_k
    ));
    output::print_separator();
    if !result.band_plot.as_os_str().is_empty() {
        output::print_info(&format!("Band plot:     '{}'", result.band_plot.display()));
    }
    output::print_info(&format!("Band yaml:     '{}'", result.band_yaml.display()));
    output::print_info(&format!("Band data:     '{}'", result.band_dat.display()));
    output::print_info(&format!("Thermal table: '{}'", result.thermal_csv.display()));
    Ok(())
}
