//! # 工具结果数据模型
//!
//! 三个计算工具的返回值。失败时不返回 `Err`，而是返回路径为空、数值为
//! 哨兵值 (-1.0) 的结果，并在 `message` 中说明原因、在 `error` 中给出错误分类。
//!
//! ## 依赖关系
//! - 被 `builder/`, `optimize/`, `phonon/`, `tools/`, `commands/` 使用
//! - 使用 `error.rs` 的 ErrorKind

use crate::error::{CalcError, ErrorKind};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 失败结果中数值字段的哨兵值
pub const SENTINEL: f64 = -1.0;

/// 结构构建结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildStructureResult {
    /// 生成的结构文件；失败时为空路径
    pub structure_file: PathBuf,

    /// 原子数
    #[serde(default)]
    pub num_atoms: usize,

    /// 化学式
    #[serde(default)]
    pub formula: String,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl BuildStructureResult {
    pub fn failure(err: &CalcError) -> Self {
        BuildStructureResult {
            structure_file: PathBuf::new(),
            num_atoms: 0,
            formula: String::new(),
            message: format!("Structure building failed: {}", err),
            error: Some(err.kind()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// 结构优化结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// 优化后的结构文件；失败时为空路径
    pub optimized_structure: PathBuf,

    /// 优化轨迹 (extxyz)
    pub optimization_traj: Option<PathBuf>,

    /// 最终势能 (eV)
    pub final_energy: f64,

    /// 是否满足力收敛判据
    #[serde(default)]
    pub converged: bool,

    /// 实际执行的 BFGS 步数
    #[serde(default)]
    pub steps: usize,

    /// 最终最大原子受力 (eV/Å)
    #[serde(default)]
    pub max_force: f64,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl OptimizationResult {
    pub fn failure(err: &CalcError) -> Self {
        OptimizationResult {
            optimized_structure: PathBuf::new(),
            optimization_traj: None,
            final_energy: SENTINEL,
            converged: false,
            steps: 0,
            max_force: SENTINEL,
            message: format!("Optimization failed: {}", err),
            error: Some(err.kind()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// 单个温度下的热力学量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalPoint {
    /// 温度 (K)
    pub temperature: f64,
    /// Helmholtz 自由能 (kJ/mol)
    pub free_energy: f64,
    /// 熵 (J/K/mol)
    pub entropy: f64,
    /// 定容热容 (J/K/mol)
    pub heat_capacity: f64,
}

/// 声子计算结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhononResult {
    /// 第一个温度下的熵 (J/K/mol)
    pub entropy: f64,

    /// 第一个温度下的自由能 (kJ/mol)
    pub free_energy: f64,

    /// 第一个温度下的热容 (J/K/mol)
    pub heat_capacity: f64,

    /// 公度点上的最大频率 (THz)
    #[serde(rename = "max_frequency_THz")]
    pub max_frequency_thz: f64,

    /// 最大频率对应的温度 (K)
    #[serde(rename = "max_frequency_K")]
    pub max_frequency_k: f64,

    pub band_plot: PathBuf,
    pub band_yaml: PathBuf,
    pub band_dat: PathBuf,

    /// 全部温度的热力学量表 (CSV)
    #[serde(default)]
    pub thermal_csv: PathBuf,

    /// 全部温度的热力学量
    #[serde(default)]
    pub thermal_properties: Vec<ThermalPoint>,

    /// 有限位移超胞数量
    #[serde(default)]
    pub num_displacements: usize,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl PhononResult {
    pub fn failure(err: &CalcError) -> Self {
        PhononResult {
            entropy: SENTINEL,
            free_energy: SENTINEL,
            heat_capacity: SENTINEL,
            max_frequency_thz: SENTINEL,
            max_frequency_k: SENTINEL,
            band_plot: PathBuf::new(),
            band_yaml: PathBuf::new(),
            band_dat: PathBuf::new(),
            thermal_csv: PathBuf::new(),
            thermal_properties: Vec::new(),
            num_displacements: 0,
            message: format!("Calculation failed: {}", err),
            error: Some(err.kind()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
