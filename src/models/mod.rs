//! # 数据模型模块
//!
//! 定义统一的晶体结构、元素数据、对称性和工具结果数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `builder/`, `optimize/`, `phonon/`, `tools/` 使用
//! - 子模块: structure, element, family, supercell, symmetry, results

pub mod element;
pub mod family;
pub mod results;
pub mod structure;
pub mod supercell;
pub mod symmetry;

pub use family::CrystalFamily;
pub use results::{BuildStructureResult, OptimizationResult, PhononResult, ThermalPoint};
pub use structure::{Atom, Crystal, Lattice};
