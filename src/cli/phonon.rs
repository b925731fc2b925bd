//! # phonon 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/phonon.rs`

use crate::phonon::PhononParams;

use clap::Args;
use std::path::PathBuf;

/// phonon 子命令参数
#[derive(Args, Debug)]
pub struct PhononArgs {
    /// Unit cell structure file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Potential model (local path, remote URI, or 'lj[:epsilon=..,sigma=..]')
    #[arg(short, long)]
    pub model: String,

    /// Model head for multi-task models
    #[arg(long)]
    pub head: Option<String>,

    /// Supercell matrix: 3 diagonal entries or 9 row-major entries, e.g. 3,3,3
    #[arg(short, long, value_delimiter = ',', default_values_t = [3, 3, 3], allow_negative_numbers = true)]
    pub supercell: Vec<i32>,

    /// Displacement distance (Angstrom)
    #[arg(short, long, default_value_t = 0.005)]
    pub displacement: f64,

    /// Temperatures (K), e.g. 100,300,500
    #[arg(short, long, value_delimiter = ',', default_values_t = [300.0])]
    pub temperatures: Vec<f64>,

    /// Band structure plot (.png or .svg)
    #[arg(short, long, default_value = "phonon_band.png")]
    pub plot: PathBuf,

    /// Skip the band structure plot
    #[arg(long, default_value_t = false)]
    pub no_plot: bool,

    /// Number of threads for q-point sampling (0 = from config)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,
}

impl PhononArgs {
    pub fn to_params(&self) -> PhononParams {
        PhononParams {
            cif_file: self.input.clone(),
            model_path: self.model.clone(),
            head: self.head.clone(),
            supercell_matrix: self.supercell.clone(),
            displacement_distance: self.displacement,
            temperatures: self.temperatures.clone(),
            plot_path: self.plot.clone(),
        }
    }
}
