//! # 体相原胞构建
//!
//! 按结构族生成原胞，晶格向量与基矢位置遵循 ASE `bulk()` 的约定：
//! fcc/bcc 用原胞向量，hcp 为两原子六方胞，diamond/zincblende/rocksalt/fluorite
//! 建在 fcc 原胞上，cesiumchloride 建在简单立方上，wurtzite 为四原子六方胞。
//!
//! 未给出的晶格参数按以下规则补全：
//! - `a`：材料是单质且参考结构族与请求一致时取参考值，否则报错；
//! - hcp/wurtzite 的 c/a：参考结构族一致时取参考值，否则取理想值 √(8/3)；
//! - tetragonal/bct 的 `c`：取参考 c/a × a；
//! - rhombohedral 的 `alpha`：取参考值。
//!
//! ## 依赖关系
//! - 被 `builder/mod.rs` 使用
//! - 使用 `models/element.rs`, `models/family.rs`, `models/structure.rs`
//! - 使用 `regex` 展开化学式

use crate::error::{CalcError, Result};
use crate::models::element::{self, ReferenceState};
use crate::models::{Crystal, CrystalFamily, Lattice};

use regex::Regex;
use std::sync::LazyLock;

static FORMULA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z][a-z]?)(\d*)").expect("valid formula regex"));

/// 体相晶体描述
#[derive(Debug, Clone, PartialEq)]
pub struct CrystalSpec {
    /// 元素符号或化学式
    pub material: String,
    pub family: CrystalFamily,
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub c: Option<f64>,
    /// 角度 (度)
    pub alpha: Option<f64>,
}

impl CrystalSpec {
    pub fn new(material: impl Into<String>, family: CrystalFamily) -> Self {
        CrystalSpec {
            material: material.into(),
            family,
            a: None,
            b: None,
            c: None,
            alpha: None,
        }
    }

    pub fn with_a(mut self, a: f64) -> Self {
        self.a = Some(a);
        self
    }
}

/// 把化学式展开为元素符号序列，如 "NaCl" → [Na, Cl]，"CaF2" → [Ca, F, F]
pub fn expand_formula(formula: &str) -> Result<Vec<String>> {
    let mut symbols = Vec::new();
    let mut consumed = 0;

    for caps in FORMULA_RE.captures_iter(formula) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
        if whole.start != consumed {
            break;
        }
        consumed = whole.end;

        let symbol = &caps[1];
        if element::lookup(symbol).is_none() {
            return Err(CalcError::UnknownElement(symbol.to_string()));
        }
        let count: usize = match &caps[2] {
            "" => 1,
            digits => digits.parse().map_err(|_| {
                CalcError::InvalidArgument(format!("Invalid count in formula '{}'", formula))
            })?,
        };
        symbols.extend(std::iter::repeat(symbol.to_string()).take(count));
    }

    if consumed != formula.len() || symbols.is_empty() {
        return Err(CalcError::InvalidArgument(format!(
            "Cannot parse chemical formula '{}'",
            formula
        )));
    }
    Ok(symbols)
}

/// 单质材料的参考结构
fn reference_of(material: &str) -> Option<ReferenceState> {
    element::lookup(material).and_then(|e| e.reference)
}

fn require(value: Option<f64>, name: &str, spec: &CrystalSpec) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(v) => Err(CalcError::InvalidArgument(format!(
            "{} must be positive, got {}",
            name, v
        ))),
        None => Err(CalcError::MissingParameter(format!(
            "lattice parameter '{}' is required for {} {}",
            name, spec.family, spec.material
        ))),
    }
}

/// 构建体相原胞
pub fn bulk(spec: &CrystalSpec) -> Result<Crystal> {
    use CrystalFamily::*;

    let family = spec.family;
    let mut symbols = expand_formula(&spec.material)?;
    if family == Diamond {
        if symbols.len() != 1 {
            return Err(CalcError::InvalidArgument(format!(
                "diamond structure needs a single element, got '{}'",
                spec.material
            )));
        }
        symbols.push(symbols[0].clone());
    } else if symbols.len() != family.basis_size() {
        return Err(CalcError::InvalidArgument(format!(
            "{} structure needs {} element symbol(s), got '{}'",
            family,
            family.basis_size(),
            spec.material
        )));
    }

    let reference = reference_of(&spec.material);
    let matching = reference.filter(|r| r.family == family);

    let a = require(spec.a.or(matching.map(|r| r.a)), "a", spec)?;

    let c_over_a = match family {
        Hcp | Wurtzite => match spec.c {
            Some(c) => c / a,
            None => matching
                .and_then(|r| r.c_over_a)
                .unwrap_or((8.0f64 / 3.0).sqrt()),
        },
        _ => spec
            .c
            .map(|c| c / a)
            .or_else(|| reference.and_then(|r| r.c_over_a))
            .unwrap_or(f64::NAN),
    };
    let c = || require(c_over_a.is_finite().then_some(c_over_a * a), "c", spec);
    let alpha = || {
        require(
            spec.alpha.or_else(|| reference.and_then(|r| r.alpha)),
            "alpha",
            spec,
        )
    };

    let h = a / 2.0;
    let fcc_cell = [[0.0, h, h], [h, 0.0, h], [h, h, 0.0]];
    let cubic_cell = [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]];

    // (晶格, 笛卡尔坐标)
    let (matrix, positions): ([[f64; 3]; 3], Vec<[f64; 3]>) = match family {
        Sc => (cubic_cell, vec![[0.0; 3]]),
        Fcc => (fcc_cell, vec![[0.0; 3]]),
        Bcc => (
            [[-h, h, h], [h, -h, h], [h, h, -h]],
            vec![[0.0; 3]],
        ),
        Tetragonal => (
            [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, c()?]],
            vec![[0.0; 3]],
        ),
        Orthorhombic => {
            let b = require(spec.b, "b", spec)?;
            let c = require(spec.c, "c", spec)?;
            ([[a, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, c]], vec![[0.0; 3]])
        }
        Bct => {
            let hc = c()? / 2.0;
            (
                [[-h, h, hc], [h, -h, hc], [h, h, -hc]],
                vec![[0.0; 3]],
            )
        }
        Rhombohedral => {
            let alpha = alpha()?.to_radians();
            let (s, co) = ((alpha / 2.0).sin(), (alpha / 2.0).cos());
            let x = alpha.cos() / co;
            let z2 = 1.0 - x * x;
            if z2 <= 0.0 {
                return Err(CalcError::GeometryError(format!(
                    "rhombohedral angle {:.3} gives a degenerate cell",
                    alpha.to_degrees()
                )));
            }
            (
                [
                    [a * co, -a * s, 0.0],
                    [a * co, a * s, 0.0],
                    [a * x, 0.0, a * z2.sqrt()],
                ],
                vec![[0.0; 3]],
            )
        }
        Mcl => {
            let b = require(spec.b, "b", spec)?;
            let c = require(spec.c, "c", spec)?;
            let alpha = alpha()?.to_radians();
            (
                [
                    [a, 0.0, 0.0],
                    [0.0, b, 0.0],
                    [0.0, c * alpha.cos(), c * alpha.sin()],
                ],
                vec![[0.0; 3]],
            )
        }
        Hcp | Wurtzite => {
            let lattice = Lattice::from_vectors([
                [a, 0.0, 0.0],
                [-a / 2.0, a * 3f64.sqrt() / 2.0, 0.0],
                [0.0, 0.0, c_over_a * a],
            ]);
            let frac: Vec<[f64; 3]> = if family == Hcp {
                symbols = vec![symbols[0].clone(), symbols[0].clone()];
                vec![[0.0; 3], [1.0 / 3.0, 2.0 / 3.0, 0.5]]
            } else {
                let u = 0.25 + 1.0 / (3.0 * c_over_a * c_over_a);
                symbols = vec![
                    symbols[0].clone(),
                    symbols[1].clone(),
                    symbols[0].clone(),
                    symbols[1].clone(),
                ];
                vec![
                    [0.0; 3],
                    [1.0 / 3.0, 2.0 / 3.0, 0.5 - u],
                    [1.0 / 3.0, 2.0 / 3.0, 0.5],
                    [0.0, 0.0, 1.0 - u],
                ]
            };
            let positions = frac.iter().map(|f| lattice.frac_to_cart(*f)).collect();
            (lattice.matrix, positions)
        }
        Diamond | Zincblende => (fcc_cell, vec![[0.0; 3], [a / 4.0; 3]]),
        Rocksalt => (fcc_cell, vec![[0.0; 3], [h, 0.0, 0.0]]),
        CesiumChloride => (cubic_cell, vec![[0.0; 3], [h; 3]]),
        Fluorite => (
            fcc_cell,
            vec![[0.0; 3], [a / 4.0; 3], [3.0 * a / 4.0; 3]],
        ),
    };

    let atoms = symbols
        .into_iter()
        .zip(positions)
        .map(|(s, p)| crate::models::Atom::new(s, p))
        .collect();
    let crystal = Crystal::new(spec.material.clone(), Lattice::from_vectors(matrix), atoms);
    crystal.validate()?;
    Ok(crystal)
}
