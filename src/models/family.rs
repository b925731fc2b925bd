//! # 晶体结构族
//!
//! 构建体相晶胞时可选的 15 种结构族，对应 ASE `bulk()` 的
//! `crystalstructure` 标签。封闭枚举：无效标签在解析时即被拒绝。
//!
//! ## 依赖关系
//! - 被 `models/element.rs` (参考态), `builder/` 使用

use crate::error::CalcError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 晶体结构族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrystalFamily {
    Sc,
    Fcc,
    Bcc,
    Tetragonal,
    Bct,
    Hcp,
    Rhombohedral,
    Orthorhombic,
    Mcl,
    Diamond,
    Zincblende,
    Rocksalt,
    #[serde(rename = "cesiumchloride")]
    CesiumChloride,
    Fluorite,
    Wurtzite,
}

impl CrystalFamily {
    pub const ALL: [CrystalFamily; 15] = [
        CrystalFamily::Sc,
        CrystalFamily::Fcc,
        CrystalFamily::Bcc,
        CrystalFamily::Tetragonal,
        CrystalFamily::Bct,
        CrystalFamily::Hcp,
        CrystalFamily::Rhombohedral,
        CrystalFamily::Orthorhombic,
        CrystalFamily::Mcl,
        CrystalFamily::Diamond,
        CrystalFamily::Zincblende,
        CrystalFamily::Rocksalt,
        CrystalFamily::CesiumChloride,
        CrystalFamily::Fluorite,
        CrystalFamily::Wurtzite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CrystalFamily::Sc => "sc",
            CrystalFamily::Fcc => "fcc",
            CrystalFamily::Bcc => "bcc",
            CrystalFamily::Tetragonal => "tetragonal",
            CrystalFamily::Bct => "bct",
            CrystalFamily::Hcp => "hcp",
            CrystalFamily::Rhombohedral => "rhombohedral",
            CrystalFamily::Orthorhombic => "orthorhombic",
            CrystalFamily::Mcl => "mcl",
            CrystalFamily::Diamond => "diamond",
            CrystalFamily::Zincblende => "zincblende",
            CrystalFamily::Rocksalt => "rocksalt",
            CrystalFamily::CesiumChloride => "cesiumchloride",
            CrystalFamily::Fluorite => "fluorite",
            CrystalFamily::Wurtzite => "wurtzite",
        }
    }

    /// 每个原胞需要的化学式符号数
    pub fn basis_size(&self) -> usize {
        match self {
            CrystalFamily::Zincblende
            | CrystalFamily::Rocksalt
            | CrystalFamily::CesiumChloride
            | CrystalFamily::Wurtzite => 2,
            CrystalFamily::Fluorite => 3,
            _ => 1,
        }
    }

    /// 惯用胞晶格点群的阶数 (立方 48, 六方 24, 四方 16, 正交 8, 单斜 4)
    pub fn holohedry_order(&self) -> usize {
        match self {
            CrystalFamily::Sc
            | CrystalFamily::Fcc
            | CrystalFamily::Bcc
            | CrystalFamily::Diamond
            | CrystalFamily::Zincblende
            | CrystalFamily::Rocksalt
            | CrystalFamily::CesiumChloride
            | CrystalFamily::Fluorite => 48,
            CrystalFamily::Hcp | CrystalFamily::Wurtzite | CrystalFamily::Rhombohedral => 24,
            CrystalFamily::Tetragonal | CrystalFamily::Bct => 16,
            CrystalFamily::Orthorhombic => 8,
            CrystalFamily::Mcl => 4,
        }
    }
}

impl fmt::Display for CrystalFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CrystalFamily {
    type Err = CalcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_lowercase();
        CrystalFamily::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == tag)
            .ok_or_else(|| {
                CalcError::InvalidArgument(format!(
                    "Unsupported crystal structure '{}'. Must be one of {}",
                    s,
                    CrystalFamily::ALL
                        .iter()
                        .map(|f| f.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}
