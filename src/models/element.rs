//! # 元素数据表
//!
//! 元素符号、原子序数、原子质量 (amu) 以及单质的参考晶体结构。
//! 构建体相晶胞时若未给出晶格常数，且单质参考结构与请求的结构族一致，
//! 则使用参考晶格常数。
//!
//! ## 数据来源
//! - 原子质量：IUPAC 2016 标准原子量
//! - 参考结构：C. Kittel, Introduction to Solid State Physics (ASE `reference_states`)
//!
//! ## 依赖关系
//! - 被 `models/structure.rs`, `builder/bulk.rs`, `phonon/` 使用
//! - 纯静态数据

use crate::models::family::CrystalFamily;

use std::collections::HashMap;
use std::sync::LazyLock;

/// 单质参考结构
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceState {
    pub family: CrystalFamily,
    /// 晶格常数 a (Å)
    pub a: f64,
    /// c/a 比 (hcp, tetragonal)
    pub c_over_a: Option<f64>,
    /// 菱方角 (度)
    pub alpha: Option<f64>,
}

/// 元素信息
#[derive(Debug, Clone, Copy)]
pub struct Element {
    pub symbol: &'static str,
    pub number: u32,
    pub mass: f64,
    pub reference: Option<ReferenceState>,
}

const fn rs(family: CrystalFamily, a: f64) -> Option<ReferenceState> {
    Some(ReferenceState {
        family,
        a,
        c_over_a: None,
        alpha: None,
    })
}

const fn rs_c(family: CrystalFamily, a: f64, c_over_a: f64) -> Option<ReferenceState> {
    Some(ReferenceState {
        family,
        a,
        c_over_a: Some(c_over_a),
        alpha: None,
    })
}

const fn rs_alpha(a: f64, alpha: f64) -> Option<ReferenceState> {
    Some(ReferenceState {
        family: CrystalFamily::Rhombohedral,
        a,
        c_over_a: None,
        alpha: Some(alpha),
    })
}

use CrystalFamily::{Bcc, Diamond, Fcc, Hcp, Sc, Tetragonal};

#[rustfmt::skip]
static TABLE: [(&str, f64, Option<ReferenceState>); 86] = [
    ("H", 1.008, None),
    ("He", 4.002602, rs_c(Hcp, 3.57, 1.633)),
    ("Li", 6.94, rs(Bcc, 3.49)),
    ("Be", 9.0121831, rs_c(Hcp, 2.29, 1.567)),
    ("B", 10.81, rs_c(Tetragonal, 8.73, 0.576)),
    ("C", 12.011, rs(Diamond, 3.57)),
    ("N", 14.007, None),
    ("O", 15.999, None),
    ("F", 18.998403163, None),
    ("Ne", 20.1797, rs(Fcc, 4.43)),
    ("Na", 22.98976928, rs(Bcc, 4.23)),
    ("Mg", 24.305, rs_c(Hcp, 3.21, 1.624)),
    ("Al", 26.9815385, rs(Fcc, 4.05)),
    ("Si", 28.085, rs(Diamond, 5.43)),
    ("P", 30.973761998, None),
    ("S", 32.06, None),
    ("Cl", 35.45, None),
    ("Ar", 39.948, rs(Fcc, 5.26)),
    ("K", 39.0983, rs(Bcc, 5.23)),
    ("Ca", 40.078, rs(Fcc, 5.58)),
    ("Sc", 44.955908, rs_c(Hcp, 3.31, 1.594)),
    ("Ti", 47.867, rs_c(Hcp, 2.95, 1.588)),
    ("V", 50.9415, rs(Bcc, 3.02)),
    ("Cr", 51.9961, rs(Bcc, 2.88)),
    ("Mn", 54.938044, None),
    ("Fe", 55.845, rs(Bcc, 2.87)),
    ("Co", 58.933194, rs_c(Hcp, 2.51, 1.622)),
    ("Ni", 58.6934, rs(Fcc, 3.52)),
    ("Cu", 63.546, rs(Fcc, 3.61)),
    ("Zn", 65.38, rs_c(Hcp, 2.66, 1.856)),
    ("Ga", 69.723, None),
    ("Ge", 72.630, rs(Diamond, 5.66)),
    ("As", 74.921595, rs_alpha(4.13, 54.10)),
    ("Se", 78.971, rs_c(Hcp, 4.36, 1.136)),
    ("Br", 79.904, None),
    ("Kr", 83.798, rs(Fcc, 5.72)),
    ("Rb", 85.4678, rs(Bcc, 5.59)),
    ("Sr", 87.62, rs(Fcc, 6.08)),
    ("Y", 88.90584, rs_c(Hcp, 3.65, 1.571)),
    ("Zr", 91.224, rs_c(Hcp, 3.23, 1.593)),
    ("Nb", 92.90637, rs(Bcc, 3.30)),
    ("Mo", 95.95, rs(Bcc, 3.15)),
    ("Tc", 97.90721, rs_c(Hcp, 2.74, 1.604)),
    ("Ru", 101.07, rs_c(Hcp, 2.70, 1.584)),
    ("Rh", 102.90550, rs(Fcc, 3.80)),
    ("Pd", 106.42, rs(Fcc, 3.89)),
    ("Ag", 107.8682, rs(Fcc, 4.09)),
    ("Cd", 112.414, rs_c(Hcp, 2.98, 1.886)),
    ("In", 114.818, rs_c(Tetragonal, 4.59, 1.076)),
    ("Sn", 118.710, rs(Diamond, 6.49)),
    ("Sb", 121.760, rs_alpha(4.51, 57.60)),
    ("Te", 127.60, rs_c(Hcp, 4.45, 1.330)),
    ("I", 126.90447, None),
    ("Xe", 131.293, rs(Fcc, 6.20)),
    ("Cs", 132.90545196, rs(Bcc, 6.05)),
    ("Ba", 137.327, rs(Bcc, 5.02)),
    ("La", 138.90547, rs_c(Hcp, 3.75, 1.619)),
    ("Ce", 140.116, rs(Fcc, 5.16)),
    ("Pr", 140.90766, rs_c(Hcp, 3.67, 1.614)),
    ("Nd", 144.242, rs_c(Hcp, 3.66, 1.614)),
    ("Pm", 144.91276, None),
    ("Sm", 150.36, rs_alpha(9.00, 23.13)),
    ("Eu", 151.964, rs(Bcc, 4.61)),
    ("Gd", 157.25, rs_c(Hcp, 3.64, 1.588)),
    ("Tb", 158.92535, rs_c(Hcp, 3.60, 1.581)),
    ("Dy", 162.500, rs_c(Hcp, 3.59, 1.573)),
    ("Ho", 164.93033, rs_c(Hcp, 3.58, 1.570)),
    ("Er", 167.259, rs_c(Hcp, 3.56, 1.570)),
    ("Tm", 168.93422, rs_c(Hcp, 3.54, 1.570)),
    ("Yb", 173.054, rs(Fcc, 5.49)),
    ("Lu", 174.9668, rs_c(Hcp, 3.51, 1.585)),
    ("Hf", 178.49, rs_c(Hcp, 3.20, 1.582)),
    ("Ta", 180.94788, rs(Bcc, 3.31)),
    ("W", 183.84, rs(Bcc, 3.16)),
    ("Re", 186.207, rs_c(Hcp, 2.76, 1.615)),
    ("Os", 190.23, rs_c(Hcp, 2.74, 1.579)),
    ("Ir", 192.217, rs(Fcc, 3.84)),
    ("Pt", 195.084, rs(Fcc, 3.92)),
    ("Au", 196.966569, rs(Fcc, 4.08)),
    ("Hg", 200.592, rs_alpha(2.99, 70.45)),
    ("Tl", 204.38, rs_c(Hcp, 3.46, 1.599)),
    ("Pb", 207.2, rs(Fcc, 4.95)),
    ("Bi", 208.98040, rs_alpha(4.75, 57.14)),
    ("Po", 208.98243, rs(Sc, 3.35)),
    ("At", 209.98715, None),
    ("Rn", 222.01758, None),
];

/// 元素符号索引
pub static ELEMENTS: LazyLock<HashMap<&'static str, Element>> = LazyLock::new(|| {
    TABLE
        .iter()
        .enumerate()
        .map(|(i, &(symbol, mass, reference))| {
            (
                symbol,
                Element {
                    symbol,
                    number: i as u32 + 1,
                    mass,
                    reference,
                },
            )
        })
        .collect()
});

/// 按符号查询元素 (区分大小写)
pub fn lookup(symbol: &str) -> Option<&'static Element> {
    ELEMENTS.get(symbol)
}

/// 从 CIF 标签 (如 "Fe1", "O2-") 中提取元素符号
pub fn symbol_from_label(label: &str) -> Option<&'static str> {
    let letters: String = label
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    let mut chars = letters.chars();
    let first = chars.next()?.to_ascii_uppercase();
    let two: String = match chars.next() {
        Some(second) => [first, second.to_ascii_lowercase()].iter().collect(),
        None => String::new(),
    };
    if !two.is_empty() {
        if let Some(e) = lookup(&two) {
            return Some(e.symbol);
        }
    }
    lookup(&first.to_string()).map(|e| e.symbol)
}
