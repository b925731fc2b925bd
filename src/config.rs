//! # 运行配置
//!
//! 启动时从 TOML 文件加载一次，构造 [`crate::tools::Toolkit`] 时传入。
//! 所有字段都有默认值，未提供配置文件时使用 [`Config::default`]。
//!
//! ```toml
//! [potential]
//! default_head = "MP_traj_v024_alldata_mixu"
//! evaluator = "dp-eval"
//!
//! [output]
//! directory = "runs"
//!
//! [phonon]
//! mesh = [10, 10, 10]
//! plot = false
//! ```
//!
//! ## 依赖关系
//! - 被 `main.rs`, `tools/`, `optimize/`, `phonon/`, `builder/` 使用
//! - 使用 `toml`, `serde`

use crate::error::{CalcError, Result};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 顶层配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub potential: PotentialConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub builder: BuilderSettings,
    #[serde(default)]
    pub optimize: OptimizeSettings,
    #[serde(default)]
    pub phonon: PhononSettings,
}

/// 势函数 oracle 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotentialConfig {
    /// 多任务模型默认使用的 head
    #[serde(default = "default_head")]
    pub default_head: String,
    /// 外部评估程序 (stdin/stdout 交换 extxyz)
    #[serde(default = "default_evaluator")]
    pub evaluator: String,
    /// 附加到评估程序的额外参数
    #[serde(default)]
    pub evaluator_args: Vec<String>,
}

impl Default for PotentialConfig {
    fn default() -> Self {
        Self {
            default_head: default_head(),
            evaluator: default_evaluator(),
            evaluator_args: Vec::new(),
        }
    }
}

fn default_head() -> String {
    "MP_traj_v024_alldata_mixu".into()
}

fn default_evaluator() -> String {
    "dp-eval".into()
}

/// 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// 相对路径的输出文件都放在该目录下
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl OutputConfig {
    /// 解析输出路径：绝对路径原样返回，相对路径拼接到输出目录
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || self.directory == Path::new(".") {
            path.to_path_buf()
        } else {
            self.directory.join(path)
        }
    }
}

/// 结构构建配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderSettings {
    /// 惯用胞转换时的相对容差
    #[serde(default = "default_builder_symprec")]
    pub symprec: f64,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        Self {
            symprec: default_builder_symprec(),
        }
    }
}

fn default_builder_symprec() -> f64 {
    1e-3
}

/// BFGS 参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeSettings {
    /// 单步最大原子位移 (Å)
    #[serde(default = "default_max_step")]
    pub max_step: f64,
    /// 初始 Hessian 对角值 (eV/Å²)
    #[serde(default = "default_initial_curvature")]
    pub initial_curvature: f64,
}

impl Default for OptimizeSettings {
    fn default() -> Self {
        Self {
            max_step: default_max_step(),
            initial_curvature: default_initial_curvature(),
        }
    }
}

fn default_max_step() -> f64 {
    0.2
}

fn default_initial_curvature() -> f64 {
    70.0
}

/// 声子计算配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhononSettings {
    /// 热力学量采样网格
    #[serde(default = "default_mesh")]
    pub mesh: [usize; 3],
    /// 能带路径每段采样点数
    #[serde(default = "default_band_points")]
    pub band_points: usize,
    /// 对称性搜索的位置容差 (分数坐标 × 晶格长度, Å)
    #[serde(default = "default_phonon_symprec")]
    pub symprec: f64,
    /// 低于该频率 (THz) 的模式不计入热力学求和
    #[serde(default = "default_cutoff_frequency")]
    pub cutoff_frequency: f64,
    /// 是否渲染能带图
    #[serde(default = "default_true")]
    pub plot: bool,
    #[serde(default = "default_plot_width")]
    pub plot_width: u32,
    #[serde(default = "default_plot_height")]
    pub plot_height: u32,
    /// 并行线程数 (0 = 自动)
    #[serde(default)]
    pub jobs: usize,
}

impl Default for PhononSettings {
    fn default() -> Self {
        Self {
            mesh: default_mesh(),
            band_points: default_band_points(),
            symprec: default_phonon_symprec(),
            cutoff_frequency: default_cutoff_frequency(),
            plot: true,
            plot_width: default_plot_width(),
            plot_height: default_plot_height(),
            jobs: 0,
        }
    }
}

fn default_mesh() -> [usize; 3] {
    [10, 10, 10]
}

fn default_band_points() -> usize {
    101
}

fn default_phonon_symprec() -> f64 {
    1e-5
}

fn default_cutoff_frequency() -> f64 {
    1e-4
}

fn default_true() -> bool {
    true
}

fn default_plot_width() -> u32 {
    1200
}

fn default_plot_height() -> u32 {
    900
}

impl Config {
    /// 从 TOML 文件加载并校验
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| CalcError::read(path, e))?;
        Self::from_toml_str(&content)
    }

    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| CalcError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验数值范围
    pub fn validate(&self) -> Result<()> {
        if self.phonon.mesh.iter().any(|&n| n == 0) {
            return Err(CalcError::ConfigError(
                "phonon.mesh entries must be positive".to_string(),
            ));
        }
        if self.phonon.band_points < 2 {
            return Err(CalcError::ConfigError(
                "phonon.band_points must be at least 2".to_string(),
            ));
        }
        if self.phonon.symprec <= 0.0 || self.builder.symprec <= 0.0 {
            return Err(CalcError::ConfigError(
                "symmetry tolerances must be positive".to_string(),
            ));
        }
        if self.optimize.max_step <= 0.0 || self.optimize.initial_curvature <= 0.0 {
            return Err(CalcError::ConfigError(
                "optimize.max_step and optimize.initial_curvature must be positive".to_string(),
            ));
        }
        if self.potential.evaluator.trim().is_empty() {
            return Err(CalcError::ConfigError(
                "potential.evaluator must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.potential.default_head, "MP_traj_v024_alldata_mixu");
        assert_eq!(config.phonon.mesh, [10, 10, 10]);
        assert_eq!(config.phonon.band_points, 101);
        assert!((config.optimize.max_step - 0.2).abs() < 1e-12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
[phonon]
mesh = [4, 4, 4]
plot = false

[output]
directory = "runs"
"#,
        )
        .unwrap();
        assert_eq!(config.phonon.mesh, [4, 4, 4]);
        assert!(!config.phonon.plot);
        assert_eq!(config.phonon.band_points, 101);
        assert_eq!(config.potential.evaluator, "dp-eval");
        assert_eq!(
            config.output.resolve(Path::new("a.cif")),
            PathBuf::from("runs/a.cif")
        );
    }

    #[test]
    fn test_invalid_mesh_rejected() {
        let err = Config::from_toml_str("[phonon]\nmesh = [0, 4, 4]\n").unwrap_err();
        assert!(matches!(err, CalcError::ConfigError(_)));
    }

    #[test]
    fn test_resolve_default_directory() {
        let output = OutputConfig::default();
        assert_eq!(
            output.resolve(Path::new("structure.cif")),
            PathBuf::from("structure.cif")
        );
    }
}
