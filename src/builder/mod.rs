//! # 结构构建工具
//!
//! `build_structure`：由符号描述构建体相、表面或两材料界面结构并写出文件。
//!
//! 所有失败 (无效结构类型、缺少第二种材料、失配超限、写文件失败) 都被捕获，
//! 以结构路径为空的 [`BuildStructureResult`] 返回；失败时不写任何文件。
//!
//! ## 依赖关系
//! - 被 `tools/`, `commands/build.rs` 使用
//! - 子模块: bulk, conventional, surface, interface
//! - 使用 `parsers::write_structure` 写出结果

pub mod bulk;
pub mod conventional;
pub mod interface;
pub mod surface;

use crate::config::Config;
use crate::error::{CalcError, Result};
use crate::models::{BuildStructureResult, Crystal, CrystalFamily};
use crate::parsers;

use bulk::CrystalSpec;
use interface::StackOptions;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// 结构类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureType {
    Bulk,
    Surface,
    Interface,
}

impl fmt::Display for StructureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StructureType::Bulk => "bulk",
            StructureType::Surface => "surface",
            StructureType::Interface => "interface",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for StructureType {
    type Err = CalcError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bulk" => Ok(StructureType::Bulk),
            "surface" => Ok(StructureType::Surface),
            "interface" => Ok(StructureType::Interface),
            other => Err(CalcError::InvalidArgument(format!(
                "Unsupported structure_type: {}",
                other
            ))),
        }
    }
}

/// `build_structure` 参数
///
/// 枚举型参数以字符串接收，在构建时校验，这样无效取值也以失败结果返回。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildParams {
    /// bulk / surface / interface
    pub structure_type: String,
    /// 第一种材料 (元素或化学式)
    pub material1: String,
    #[serde(default = "default_true")]
    pub conventional: bool,
    #[serde(default = "default_family")]
    pub crystal_structure1: String,
    #[serde(default)]
    pub a1: Option<f64>,
    #[serde(default)]
    pub b1: Option<f64>,
    #[serde(default)]
    pub c1: Option<f64>,
    #[serde(default)]
    pub alpha1: Option<f64>,
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,
    #[serde(default = "default_miller")]
    pub miller_index1: [i32; 3],
    #[serde(default = "default_layers1")]
    pub layers1: usize,
    #[serde(default = "default_vacuum")]
    pub vacuum1: f64,
    #[serde(default)]
    pub material2: Option<String>,
    #[serde(default = "default_family")]
    pub crystal_structure2: String,
    #[serde(default)]
    pub a2: Option<f64>,
    #[serde(default)]
    pub b2: Option<f64>,
    #[serde(default)]
    pub c2: Option<f64>,
    #[serde(default)]
    pub alpha2: Option<f64>,
    #[serde(default = "default_miller")]
    pub miller_index2: [i32; 3],
    #[serde(default = "default_layers2")]
    pub layers2: usize,
    #[serde(default = "default_vacuum")]
    pub vacuum2: f64,
    /// 堆叠轴 (0 = x, 1 = y, 2 = z)
    #[serde(default = "default_stack_axis")]
    pub stack_axis: usize,
    /// 界面间距 (Å)
    #[serde(default = "default_interface_distance")]
    pub interface_distance: f64,
    /// 允许的最大相对失配
    #[serde(default = "default_max_strain")]
    pub max_strain: f64,
}

fn default_true() -> bool {
    true
}

fn default_family() -> String {
    "fcc".into()
}

fn default_output_file() -> PathBuf {
    PathBuf::from("structure.cif")
}

fn default_miller() -> [i32; 3] {
    [1, 0, 0]
}

fn default_layers1() -> usize {
    4
}

fn default_layers2() -> usize {
    3
}

fn default_vacuum() -> f64 {
    10.0
}

fn default_stack_axis() -> usize {
    2
}

fn default_interface_distance() -> f64 {
    2.5
}

fn default_max_strain() -> f64 {
    0.05
}

impl BuildParams {
    /// 仅含必需参数，其余取默认值
    pub fn new(structure_type: impl Into<String>, material1: impl Into<String>) -> Self {
        BuildParams {
            structure_type: structure_type.into(),
            material1: material1.into(),
            conventional: true,
            crystal_structure1: default_family(),
            a1: None,
            b1: None,
            c1: None,
            alpha1: None,
            output_file: default_output_file(),
            miller_index1: default_miller(),
            layers1: default_layers1(),
            vacuum1: default_vacuum(),
            material2: None,
            crystal_structure2: default_family(),
            a2: None,
            b2: None,
            c2: None,
            alpha2: None,
            miller_index2: default_miller(),
            layers2: default_layers2(),
            vacuum2: default_vacuum(),
            stack_axis: default_stack_axis(),
            interface_distance: default_interface_distance(),
            max_strain: default_max_strain(),
        }
    }

    fn primary_spec(&self) -> Result<CrystalSpec> {
        Ok(CrystalSpec {
            material: self.material1.clone(),
            family: self.crystal_structure1.parse()?,
            a: self.a1,
            b: self.b1,
            c: self.c1,
            alpha: self.alpha1,
        })
    }

    fn secondary_spec(&self) -> Result<CrystalSpec> {
        let material = self.material2.clone().ok_or_else(|| {
            CalcError::MissingParameter(
                "material2 must be specified for interface structure".to_string(),
            )
        })?;
        Ok(CrystalSpec {
            material,
            family: self.crystal_structure2.parse()?,
            a: self.a2,
            b: self.b2,
            c: self.c2,
            alpha: self.alpha2,
        })
    }
}

/// 构建结构 (不写文件)
pub fn build(params: &BuildParams, config: &Config) -> Result<Crystal> {
    let tolerance = config.builder.symprec;
    let structure_type: StructureType = params.structure_type.parse()?;

    let to_conventional = |crystal: Crystal, family: CrystalFamily| -> Result<Crystal> {
        if params.conventional {
            conventional::conventional_cell(&crystal, family, tolerance)
        } else {
            Ok(crystal)
        }
    };

    match structure_type {
        StructureType::Bulk => {
            let spec = params.primary_spec()?;
            to_conventional(bulk::bulk(&spec)?, spec.family)
        }
        StructureType::Surface => {
            let spec = params.primary_spec()?;
            surface::surface(
                &bulk::bulk(&spec)?,
                params.miller_index1,
                params.layers1,
                Some(params.vacuum1),
            )
        }
        StructureType::Interface => {
            let spec2 = params.secondary_spec()?;
            let spec1 = params.primary_spec()?;
            let bulk1 = to_conventional(bulk::bulk(&spec1)?, spec1.family)?;
            let bulk2 = to_conventional(bulk::bulk(&spec2)?, spec2.family)?;
            let slab1 = surface::surface(&bulk1, params.miller_index1, params.layers1, None)?;
            let slab2 = surface::surface(&bulk2, params.miller_index2, params.layers2, None)?;
            interface::stack(
                &slab1,
                &slab2,
                &StackOptions {
                    axis: params.stack_axis,
                    distance: params.interface_distance,
                    vacuum: params.vacuum1 + params.vacuum2,
                    max_strain: params.max_strain,
                },
            )
        }
    }
}

/// 构建结构并写出文件；任何失败都以失败结果返回
pub fn build_structure(params: &BuildParams, config: &Config) -> BuildStructureResult {
    let output = config.output.resolve(&params.output_file);
    let outcome = build(params, config)
        .and_then(|crystal| parsers::write_structure(&output, &crystal).map(|_| crystal));

    match outcome {
        Ok(crystal) => {
            info!("Structure saved to: {}", output.display());
            BuildStructureResult {
                structure_file: output.clone(),
                num_atoms: crystal.len(),
                formula: crystal.formula(),
                message: format!("Structure saved to: {}", output.display()),
                error: None,
            }
        }
        Err(e) => {
            error!("Structure building failed: {}", e);
            BuildStructureResult::failure(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;
    use tempfile::tempdir;

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.output.directory = dir.to_path_buf();
        config
    }

    #[test]
    fn test_params_defaults_from_json() {
        let params: BuildParams =
            serde_json::from_str(r#"{"structure_type": "bulk", "material1": "Cu"}"#).unwrap();
        assert_eq!(params, BuildParams::new("bulk", "Cu"));
        assert_eq!(params.layers2, 3);
        assert_eq!(params.output_file, PathBuf::from("structure.cif"));
    }

    #[test]
    fn test_bulk_primitive_and_conventional() {
        let config = Config::default();
        let mut params = BuildParams::new("bulk", "Cu");
        params.a1 = Some(3.6);

        params.conventional = false;
        let prim = build(&params, &config).unwrap();
        assert_eq!(prim.len(), 1);
        assert!((prim.lattice.volume().abs() - 3.6f64.powi(3) / 4.0).abs() < 1e-9);

        params.conventional = true;
        let conv = build(&params, &config).unwrap();
        assert_eq!(conv.len(), 4);
        assert!((conv.lattice.volume().abs() - 3.6f64.powi(3)).abs() < 1e-9);
    }

    #[test]
    fn test_build_structure_writes_file() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let mut params = BuildParams::new("surface", "Al");
        params.output_file = PathBuf::from("al_slab.vasp");

        let result = build_structure(&params, &config);
        assert!(result.is_success(), "{}", result.message);
        assert_eq!(result.structure_file, dir.path().join("al_slab.vasp"));
        assert!(result.structure_file.exists());
        assert_eq!(result.num_atoms, 4);
    }

    #[test]
    fn test_interface_is_reproducible() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let mut params = BuildParams::new("interface", "Cu");
        params.material2 = Some("Ni".to_string());

        params.output_file = PathBuf::from("first.cif");
        let first = build_structure(&params, &config);
        params.output_file = PathBuf::from("second.cif");
        let second = build_structure(&params, &config);
        assert!(first.is_success(), "{}", first.message);
        assert_eq!(
            fs::read_to_string(&first.structure_file).unwrap(),
            fs::read_to_string(&second.structure_file).unwrap()
        );
    }

    #[test]
    fn test_interface_without_material2() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let params = BuildParams::new("interface", "Cu");

        let result = build_structure(&params, &config);
        assert_eq!(result.structure_file, PathBuf::new());
        assert_eq!(result.error, Some(ErrorKind::InvalidInput));
        assert!(result.message.contains("material2"));
        assert!(!dir.path().join("structure.cif").exists());
    }

    #[test]
    fn test_interface_mismatch_writes_nothing() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let mut params = BuildParams::new("interface", "Cu");
        params.material2 = Some("Au".to_string());

        let result = build_structure(&params, &config);
        assert_eq!(result.error, Some(ErrorKind::GeometricInfeasibility));
        assert!(result.message.contains("Lattice mismatch too large"));
        assert!(!dir.path().join("structure.cif").exists());
    }

    #[test]
    fn test_unknown_structure_type_and_family() {
        let config = Config::default();
        let result = build_structure(&BuildParams::new("nanotube", "Cu"), &config);
        assert_eq!(result.error, Some(ErrorKind::InvalidInput));

        let mut params = BuildParams::new("bulk", "Cu");
        params.crystal_structure1 = "perovskite".to_string();
        let result = build_structure(&params, &config);
        assert_eq!(result.error, Some(ErrorKind::InvalidInput));
        assert!(result.message.starts_with("Structure building failed:"));
    }
}
