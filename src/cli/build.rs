//! # build 子命令 CLI 定义
//!
//! 参数与 `build_structure` 工具一一对应，缺省值相同。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/build.rs`

use crate::builder::BuildParams;

use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// 结构类型
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum StructureKind {
    Bulk,
    Surface,
    Interface,
}

impl std::fmt::Display for StructureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructureKind::Bulk => write!(f, "bulk"),
            StructureKind::Surface => write!(f, "surface"),
            StructureKind::Interface => write!(f, "interface"),
        }
    }
}

/// build 子命令参数
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Structure type
    #[arg(short = 't', long = "type", value_enum)]
    pub structure_type: StructureKind,

    /// Primary material (element symbol or formula)
    #[arg(short, long)]
    pub material1: String,

    /// Keep the primitive cell instead of the conventional cell
    #[arg(long, default_value_t = false)]
    pub primitive: bool,

    /// Crystal structure of the primary material
    #[arg(long, default_value = "fcc")]
    pub crystal_structure1: String,

    #[arg(long)]
    pub a1: Option<f64>,
    #[arg(long)]
    pub b1: Option<f64>,
    #[arg(long)]
    pub c1: Option<f64>,
    #[arg(long)]
    pub alpha1: Option<f64>,

    /// Output structure file (format from the extension)
    #[arg(short, long, default_value = "structure.cif")]
    pub output: PathBuf,

    /// Miller index of the primary slab, e.g. 1,1,1
    #[arg(long, value_parser = parse_miller, default_value = "1,0,0", allow_hyphen_values = true)]
    pub miller_index1: [i32; 3],

    #[arg(long, default_value_t = 4)]
    pub layers1: usize,

    #[arg(long, default_value_t = 10.0)]
    pub vacuum1: f64,

    /// Secondary material (interfaces only)
    #[arg(long)]
    pub material2: Option<String>,

    #[arg(long, default_value = "fcc")]
    pub crystal_structure2: String,

    #[arg(long)]
    pub a2: Option<f64>,
    #[arg(long)]
    pub b2: Option<f64>,
    #[arg(long)]
    pub c2: Option<f64>,
    #[arg(long)]
    pub alpha2: Option<f64>,

    /// Miller index of the secondary slab
    #[arg(long, value_parser = parse_miller, default_value = "1,0,0", allow_hyphen_values = true)]
    pub miller_index2: [i32; 3],

    #[arg(long, default_value_t = 3)]
    pub layers2: usize,

    #[arg(long, default_value_t = 10.0)]
    pub vacuum2: f64,

    /// Stacking axis (0 = x, 1 = y, 2 = z)
    #[arg(long, default_value_t = 2)]
    pub stack_axis: usize,

    /// Gap between the two slabs (Angstrom)
    #[arg(long, default_value_t = 2.5)]
    pub interface_distance: f64,

    /// Maximum relative lattice mismatch
    #[arg(long, default_value_t = 0.05)]
    pub max_strain: f64,
}

/// 解析 Miller 指数 (如 "1,-1,0")，必须恰好 3 个整数
pub fn parse_miller(s: &str) -> Result<[i32; 3], String> {
    let values = s
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<i32>()
                .map_err(|_| format!("Invalid Miller index component '{}'", v.trim()))
        })
        .collect::<Result<Vec<i32>, String>>()?;
    match values.as_slice() {
        [h, k, l] => Ok([*h, *k, *l]),
        _ => Err(format!(
            "Miller index needs exactly 3 integers, got {} in '{}'",
            values.len(),
            s
        )),
    }
}

impl BuildArgs {
    pub fn to_params(&self) -> BuildParams {
        BuildParams {
            structure_type: self.structure_type.to_string(),
            material1: self.material1.clone(),
            conventional: !self.primitive,
            crystal_structure1: self.crystal_structure1.clone(),
            a1: self.a1,
            b1: self.b1,
            c1: self.c1,
            alpha1: self.alpha1,
            output_file: self.output.clone(),
            miller_index1: self.miller_index1,
            layers1: self.layers1,
            vacuum1: self.vacuum1,
            material2: self.material2.clone(),
            crystal_structure2: self.crystal_structure2.clone(),
            a2: self.a2,
            b2: self.b2,
            c2: self.c2,
            alpha2: self.alpha2,
            miller_index2: self.miller_index2,
            layers2: self.layers2,
            vacuum2: self.vacuum2,
            stack_axis: self.stack_axis,
            interface_distance: self.interface_distance,
            max_strain: self.max_strain,
        }
    }
}
