//! # 声子计算工具
//!
//! `calculate_phonon`：有限位移法计算声子性质。
//!
//! ## 流程
//! 1. 读取原胞，构造超胞 (3 个数为对角矩阵，9 个数为按行展开的 3×3 矩阵)
//! 2. 搜索原胞对称操作，只保留与超胞相容的操作
//! 3. 生成对称不等价位移 ([`displacement`])
//! 4. 对每个位移超胞调用势函数求力，扣除平均力
//! 5. 求解力常数 ([`force_constants`])
//! 6. Monkhorst–Pack 网格上计算热力学量 ([`thermal`])
//! 7. 公度点上的最大频率
//! 8. 高对称路径能带 ([`qpoints`])，写出 yaml / dat / csv / 图
//!
//! 网格和能带路径上的对角化用 rayon 并行。
//!
//! ## 依赖关系
//! - 被 `tools/`, `commands/phonon.rs` 使用
//! - 子模块: displacement, force_constants, dynmat, thermal, qpoints, export, plot
//! - 使用 `potential/` 计算受力

pub mod displacement;
pub mod dynmat;
pub mod export;
pub mod force_constants;
pub mod plot;
pub mod qpoints;
pub mod thermal;

use crate::config::Config;
use crate::error::{CalcError, Result};
use crate::models::structure::norm;
use crate::models::supercell::{self, make_supercell};
use crate::models::symmetry::{find_operations, SymmetryOperation};
use crate::models::{PhononResult, ThermalPoint};
use crate::parsers;
use crate::potential::{ModelRef, PotentialProvider};

use dynmat::PhononModel;
use force_constants::ForceConstants;
use log::{debug, error, info, warn};
use nalgebra::Matrix3;
use qpoints::BandPath;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// 声子计算参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhononParams {
    /// 输入结构 (原胞)
    pub cif_file: PathBuf,
    /// 势函数模型
    pub model_path: String,
    #[serde(default)]
    pub head: Option<String>,
    /// 扩胞矩阵：3 个数 (对角) 或 9 个数 (按行)
    #[serde(default = "default_supercell")]
    pub supercell_matrix: Vec<i32>,
    /// 位移大小 (Å)
    #[serde(default = "default_displacement")]
    pub displacement_distance: f64,
    /// 温度 (K)
    #[serde(default = "default_temperatures")]
    pub temperatures: Vec<f64>,
    /// 能带图路径
    #[serde(default = "default_plot_path")]
    pub plot_path: PathBuf,
}

fn default_supercell() -> Vec<i32> {
    vec![3, 3, 3]
}

fn default_displacement() -> f64 {
    0.005
}

fn default_temperatures() -> Vec<f64> {
    vec![300.0]
}

fn default_plot_path() -> PathBuf {
    PathBuf::from("phonon_band.png")
}

impl PhononParams {
    pub fn new(cif_file: impl Into<PathBuf>, model_path: impl Into<String>) -> Self {
        PhononParams {
            cif_file: cif_file.into(),
            model_path: model_path.into(),
            head: None,
            supercell_matrix: default_supercell(),
            displacement_distance: default_displacement(),
            temperatures: default_temperatures(),
            plot_path: default_plot_path(),
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.displacement_distance > 0.0) {
            return Err(CalcError::InvalidArgument(format!(
                "displacement_distance must be positive, got {}",
                self.displacement_distance
            )));
        }
        if self.temperatures.is_empty() {
            return Err(CalcError::InvalidArgument(
                "temperatures must not be empty".to_string(),
            ));
        }
        if let Some(t) = self
            .temperatures
            .iter()
            .find(|t| !t.is_finite() || **t < 0.0)
        {
            return Err(CalcError::InvalidArgument(format!(
                "temperatures must be non-negative, got {}",
                t
            )));
        }
        Ok(())
    }
}

/// 解析扩胞矩阵；空列表取 3×3×3
pub fn supercell_matrix(values: &[i32]) -> Result<[[i32; 3]; 3]> {
    let matrix = match values.len() {
        0 => supercell::diagonal([3, 3, 3]),
        3 => supercell::diagonal([values[0], values[1], values[2]]),
        9 => [
            [values[0], values[1], values[2]],
            [values[3], values[4], values[5]],
            [values[6], values[7], values[8]],
        ],
        n => {
            return Err(CalcError::InvalidArgument(format!(
                "supercell_matrix must have 3 or 9 entries, got {}",
                n
            )))
        }
    };
    if supercell::determinant(&matrix) == 0 {
        return Err(CalcError::InvalidArgument(
            "supercell_matrix is singular".to_string(),
        ));
    }
    Ok(matrix)
}

/// 只保留把超胞晶格映射到自身的操作：(Sᵀ)⁻¹ W Sᵀ 为整数矩阵
pub fn supercell_operations(
    ops: Vec<SymmetryOperation>,
    matrix: &[[i32; 3]; 3],
) -> Vec<SymmetryOperation> {
    let st = Matrix3::from_fn(|i, j| matrix[j][i] as f64);
    let Some(st_inv) = st.try_inverse() else {
        return ops;
    };
    ops.into_iter()
        .filter(|op| {
            let w = Matrix3::from_fn(|i, j| op.rotation[i][j] as f64);
            let c = st_inv * w * st;
            c.iter().all(|x| (x - x.round()).abs() < 1e-8)
        })
        .collect()
}

/// 能带数据：frequencies[段][点][能带]
#[derive(Debug, Clone)]
pub struct BandStructure {
    pub path: BandPath,
    pub frequencies: Vec<Vec<Vec<f64>>>,
}

/// 输出文件路径
#[derive(Debug, Clone)]
struct Artifacts {
    plot: PathBuf,
    band_yaml: PathBuf,
    band_dat: PathBuf,
    thermal_csv: PathBuf,
}

impl Artifacts {
    fn new(plot: PathBuf) -> Self {
        let stem = plot
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "phonon".to_string());
        let sibling = |suffix: &str| plot.with_file_name(format!("{}{}", stem, suffix));
        Artifacts {
            band_yaml: sibling("_band.yaml"),
            band_dat: sibling("_band.dat"),
            thermal_csv: sibling("_thermal.csv"),
            plot,
        }
    }
}

fn thread_pool(jobs: usize) -> Result<rayon::ThreadPool> {
    let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| CalcError::Other(e.to_string()))
}

fn run(
    params: &PhononParams,
    config: &Config,
    provider: &dyn PotentialProvider,
) -> Result<PhononResult> {
    params.validate()?;
    let settings = &config.phonon;
    let matrix = supercell_matrix(&params.supercell_matrix)?;
    let artifacts = Artifacts::new(config.output.resolve(&params.plot_path));
    if settings.plot {
        plot::PlotFormat::from_path(&artifacts.plot)?;
    }

    info!("Reading structure from: {}", params.cif_file.display());
    let unit = parsers::read_structure(&params.cif_file)?;
    unit.validate()?;
    let masses = unit.masses()?;

    let supercell = make_supercell(&unit, matrix)?;
    let ops = supercell_operations(find_operations(&unit, settings.symprec), &matrix);
    info!(
        "Supercell: {} atoms, {} symmetry operations",
        supercell.crystal.len(),
        ops.len()
    );

    let displacements = displacement::generate_displacements(&unit, &ops, params.displacement_distance);
    info!("Generated {} displacements", displacements.len());

    let potential = provider.load(&ModelRef {
        location: params.model_path.clone(),
        head: params.head.clone(),
    })?;

    let mut force_sets = Vec::with_capacity(displacements.len());
    for (i, disp) in displacements.iter().enumerate() {
        debug!(
            "Displacement {}/{}: atom {} along {:?}",
            i + 1,
            displacements.len(),
            disp.atom,
            disp.direction
        );
        let eval = potential.compute(&disp.apply(&supercell))?;
        if eval.forces.len() != supercell.crystal.len() {
            return Err(CalcError::EvaluationError(format!(
                "expected {} forces, got {}",
                supercell.crystal.len(),
                eval.forces.len()
            )));
        }
        let n = eval.forces.len() as f64;
        let mean = [0usize, 1, 2].map(|k| eval.forces.iter().map(|f| f[k]).sum::<f64>() / n);
        if norm(mean) > 1e-3 {
            warn!("Large net force on displaced supercell {}: {:?}", i + 1, mean);
        }
        force_sets.push(
            eval.forces
                .iter()
                .map(|f| [f[0] - mean[0], f[1] - mean[1], f[2] - mean[2]])
                .collect::<Vec<_>>(),
        );
    }

    let fc = ForceConstants::compute(&unit.lattice, &supercell, &ops, &displacements, &force_sets)?;
    debug!("Largest force constant: {:.6} eV/A^2", fc.max_abs());
    let model = PhononModel::new(&unit.lattice, &supercell, fc, masses.clone())?;

    let pool = thread_pool(settings.jobs)?;
    let sample = |qs: &[[f64; 3]]| -> Vec<Vec<f64>> {
        pool.install(|| qs.par_iter().map(|q| model.frequencies(*q)).collect())
    };

    // 热力学量
    let mesh = qpoints::monkhorst_pack(settings.mesh);
    let mesh_freqs = sample(&mesh[..]);
    let thermal_points: Vec<ThermalPoint> =
        thermal::thermal_properties(&mesh_freqs, &params.temperatures, settings.cutoff_frequency);

    // 公度点最大频率
    let commensurate = qpoints::commensurate_points(&matrix)?;
    let max_frequency = sample(&commensurate[..])
        .into_iter()
        .flatten()
        .fold(f64::NEG_INFINITY, f64::max);

    // 能带
    let path = qpoints::band_path(&unit.lattice, settings.band_points);
    let frequencies = path
        .segments
        .iter()
        .map(|segment| sample(&segment.qpoints[..]))
        .collect();
    let bands = BandStructure { path, frequencies };
    info!("Band path: {:?}, {} q-points", bands.path.kind, bands.path.n_qpoints());

    if let Some(parent) = artifacts.plot.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CalcError::write(parent, e))?;
    }
    // 先绘图：绘图失败时不留下数据文件
    let band_plot = if settings.plot {
        plot::generate_band_plot(
            &bands,
            &artifacts.plot,
            &format!("Phonon dispersion of {}", unit.formula()),
            settings.plot_width,
            settings.plot_height,
        )?;
        artifacts.plot.clone()
    } else {
        PathBuf::new()
    };
    export::write_band_yaml(&bands, &unit, &masses, &artifacts.band_yaml)?;
    export::write_band_dat(&bands, &unit.name, &artifacts.band_dat)?;
    export::write_thermal_csv(&thermal_points, &artifacts.thermal_csv)?;

    let first = thermal_points[0];
    info!(
        "Phonon calculation finished: max frequency {:.4} THz, S({} K) = {:.4} J/K/mol",
        max_frequency, first.temperature, first.entropy
    );

    Ok(PhononResult {
        entropy: first.entropy,
        free_energy: first.free_energy,
        heat_capacity: first.heat_capacity,
        max_frequency_thz: max_frequency,
        max_frequency_k: max_frequency * thermal::THZ_TO_K,
        band_plot,
        band_yaml: artifacts.band_yaml,
        band_dat: artifacts.band_dat,
        thermal_csv: artifacts.thermal_csv,
        thermal_properties: thermal_points,
        num_displacements: displacements.len(),
        message: format!(
            "Phonon calculation completed with {} displacements",
            displacements.len()
        ),
        error: None,
    })
}

/// 计算声子性质；任何失败都以失败结果返回
pub fn calculate_phonon(
    params: &PhononParams,
    config: &Config,
    provider: &dyn PotentialProvider,
) -> PhononResult {
    run(params, config, provider).unwrap_or_else(|e| {
        error!("Phonon calculation failed: {}", e);
        PhononResult::failure(&e)
    })
}
