//! # 晶体结构数据模型
//!
//! 统一的原子构型表示：晶格 (行向量)、原子 (元素 + 笛卡尔坐标, Å) 和
//! 每个方向的周期性标记。所有结构文件读写和三个计算工具共享这一表示。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `builder/`, `potential/`, `optimize/`, `phonon/` 使用
//! - 使用 `models/element.rs` 查询原子质量
//! - 使用 `nalgebra` 做 3×3 矩阵运算

use crate::error::{CalcError, Result};
use crate::models::element;

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// 晶格体积下限 (Å³)，低于该值视为退化晶格
pub const MIN_VOLUME: f64 = 1e-10;

// ─────────────────────────────────────────────────────────────
// 三维向量工具
// ─────────────────────────────────────────────────────────────

pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

pub fn add(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(a: [f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

/// 晶格参数表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度。a 沿 x 轴，b 位于 xy 平面
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let cos_gamma = gamma.to_radians().cos();
        let sin_gamma = gamma.to_radians().sin();

        let a_vec = [a, 0.0, 0.0];
        let b_vec = [b * cos_gamma, b * sin_gamma, 0.0];

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).max(0.0).sqrt();

        Lattice {
            matrix: [a_vec, b_vec, [c1, c2, c3]],
        }
    }

    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 从 nalgebra 矩阵 (行向量) 创建
    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        let mut matrix = [[0.0; 3]; 3];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = m[(i, j)];
            }
        }
        Lattice { matrix }
    }

    /// 转为 nalgebra 矩阵 (行向量)
    pub fn to_matrix(&self) -> Matrix3<f64> {
        let m = self.matrix;
        Matrix3::new(
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        )
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let [a_vec, b_vec, c_vec] = self.matrix;
        let [a, b, c] = self.lengths();

        let alpha = angle_between(b_vec, c_vec, b, c);
        let beta = angle_between(a_vec, c_vec, a, c);
        let gamma = angle_between(a_vec, b_vec, a, b);

        (a, b, c, alpha, beta, gamma)
    }

    /// 三个晶格向量的长度
    pub fn lengths(&self) -> [f64; 3] {
        [
            norm(self.matrix[0]),
            norm(self.matrix[1]),
            norm(self.matrix[2]),
        ]
    }

    /// 计算晶格体积 (带符号)
    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.matrix;
        dot(a, cross(b, c))
    }

    /// 倒格子 (不含 2π)，满足 a_i · b_j = δ_ij
    pub fn reciprocal(&self) -> Lattice {
        match self.to_matrix().try_inverse() {
            Some(inv) => Lattice::from_matrix(&inv.transpose()),
            None => Lattice::from_vectors([[0.0; 3]; 3]),
        }
    }

    /// 度规张量 G_ij = a_i · a_j
    pub fn metric(&self) -> Matrix3<f64> {
        let m = self.to_matrix();
        m * m.transpose()
    }

    /// 分数坐标转笛卡尔坐标
    pub fn frac_to_cart(&self, frac: [f64; 3]) -> [f64; 3] {
        let m = self.matrix;
        [
            frac[0] * m[0][0] + frac[1] * m[1][0] + frac[2] * m[2][0],
            frac[0] * m[0][1] + frac[1] * m[1][1] + frac[2] * m[2][1],
            frac[0] * m[0][2] + frac[1] * m[1][2] + frac[2] * m[2][2],
        ]
    }

    /// 笛卡尔坐标转分数坐标；退化晶格时原样返回
    pub fn cart_to_frac(&self, cart: [f64; 3]) -> [f64; 3] {
        let recip = self.reciprocal();
        if self.volume().abs() < MIN_VOLUME {
            return cart;
        }
        [
            dot(cart, recip.matrix[0]),
            dot(cart, recip.matrix[1]),
            dot(cart, recip.matrix[2]),
        ]
    }
}

fn angle_between(u: [f64; 3], v: [f64; 3], lu: f64, lv: f64) -> f64 {
    if lu < 1e-12 || lv < 1e-12 {
        return 90.0;
    }
    (dot(u, v) / (lu * lv)).clamp(-1.0, 1.0).acos().to_degrees()
}

/// 原子信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// 元素符号
    pub element: String,

    /// 笛卡尔坐标 [x, y, z] (Å)
    pub position: [f64; 3],
}

impl Atom {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            element: element.into(),
            position,
        }
    }
}

/// 晶体结构 (原子构型)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crystal {
    /// 结构名称
    pub name: String,

    /// 晶格
    pub lattice: Lattice,

    /// 原子列表
    pub atoms: Vec<Atom>,

    /// 三个晶格方向的周期性
    pub pbc: [bool; 3],
}

impl Crystal {
    pub fn new(name: impl Into<String>, lattice: Lattice, atoms: Vec<Atom>) -> Self {
        Crystal {
            name: name.into(),
            lattice,
            atoms,
            pbc: [true; 3],
        }
    }

    /// 由分数坐标创建
    pub fn from_fractional(
        name: impl Into<String>,
        lattice: Lattice,
        species: &[String],
        fractional: &[[f64; 3]],
    ) -> Self {
        let atoms = species
            .iter()
            .zip(fractional)
            .map(|(el, f)| Atom::new(el.clone(), lattice.frac_to_cart(*f)))
            .collect();
        Crystal::new(name, lattice, atoms)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// 校验：至少一个原子；有周期方向时晶格不能退化
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(CalcError::InvalidStructure(format!(
                "'{}' contains no atoms",
                self.name
            )));
        }
        if self.pbc.iter().any(|&p| p) && self.lattice.volume().abs() < MIN_VOLUME {
            return Err(CalcError::InvalidStructure(format!(
                "'{}' is periodic but its lattice is degenerate",
                self.name
            )));
        }
        if self
            .atoms
            .iter()
            .any(|a| a.position.iter().any(|x| !x.is_finite()))
        {
            return Err(CalcError::InvalidStructure(format!(
                "'{}' has non-finite coordinates",
                self.name
            )));
        }
        Ok(())
    }

    /// 计算化学式
    pub fn formula(&self) -> String {
        use std::collections::BTreeMap;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for atom in &self.atoms {
            *counts.entry(atom.element.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn symbols(&self) -> Vec<String> {
        self.atoms.iter().map(|a| a.element.clone()).collect()
    }

    pub fn positions(&self) -> Vec<[f64; 3]> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    pub fn set_positions(&mut self, positions: &[[f64; 3]]) {
        for (atom, p) in self.atoms.iter_mut().zip(positions) {
            atom.position = *p;
        }
    }

    /// 原子质量 (amu)
    pub fn masses(&self) -> Result<Vec<f64>> {
        self.atoms
            .iter()
            .map(|a| {
                element::lookup(&a.element)
                    .map(|e| e.mass)
                    .ok_or_else(|| CalcError::UnknownElement(a.element.clone()))
            })
            .collect()
    }

    /// 分数坐标
    pub fn frac_positions(&self) -> Vec<[f64; 3]> {
        self.atoms
            .iter()
            .map(|a| self.lattice.cart_to_frac(a.position))
            .collect()
    }

    /// 由分数坐标设置原子位置
    pub fn set_frac_positions(&mut self, fractional: &[[f64; 3]]) {
        for (atom, f) in self.atoms.iter_mut().zip(fractional) {
            atom.position = self.lattice.frac_to_cart(*f);
        }
    }

    /// 更换晶格；`scale_atoms` 为真时保持分数坐标，否则保持笛卡尔坐标
    pub fn set_lattice(&mut self, lattice: Lattice, scale_atoms: bool) {
        if scale_atoms {
            let frac = self.frac_positions();
            self.lattice = lattice;
            self.set_frac_positions(&frac);
        } else {
            self.lattice = lattice;
        }
    }

    /// 平移所有原子
    pub fn translate(&mut self, shift: [f64; 3]) {
        for atom in &mut self.atoms {
            atom.position = add(atom.position, shift);
        }
    }

    /// 追加另一结构的原子 (保留当前晶格)
    pub fn extend(&mut self, other: &Crystal) {
        self.atoms.extend(other.atoms.iter().cloned());
    }

    /// 沿笛卡尔轴的坐标范围 (min, max)
    pub fn coordinate_range(&self, axis: usize) -> (f64, f64) {
        self.atoms.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), a| (lo.min(a.position[axis]), hi.max(a.position[axis])),
        )
    }

    /// 沿晶格方向重复 (像 ASE `atoms * (n0, n1, n2)`)，平移像在外层循环
    pub fn repeat(&self, reps: [usize; 3]) -> Crystal {
        let m = self.lattice.matrix;
        let mut atoms = Vec::with_capacity(self.atoms.len() * reps.iter().product::<usize>());
        for i0 in 0..reps[0] {
            for i1 in 0..reps[1] {
                for i2 in 0..reps[2] {
                    let shift = self
                        .lattice
                        .frac_to_cart([i0 as f64, i1 as f64, i2 as f64]);
                    for atom in &self.atoms {
                        atoms.push(Atom::new(atom.element.clone(), add(atom.position, shift)));
                    }
                }
            }
        }
        let mut matrix = m;
        for (row, &n) in matrix.iter_mut().zip(reps.iter()) {
            *row = scale(*row, n as f64);
        }
        Crystal {
            name: self.name.clone(),
            lattice: Lattice::from_vectors(matrix),
            atoms,
            pbc: self.pbc,
        }
    }

    /// 沿晶格方向 `axis` 居中，两侧各留 `vacuum` Å 真空
    ///
    /// 原子在该晶格面法向上的投影跨度加上两侧真空即为新的面间高度；
    /// 晶格向量按比例伸长，原子整体平移使两侧真空相等。
    pub fn center_along(&mut self, axis: usize, vacuum: f64) {
        if self.is_empty() {
            return;
        }
        let cell = self.lattice.matrix;
        let mut dir = cross(cell[(axis + 1) % 3], cell[(axis + 2) % 3]);
        let dir_len = norm(dir);
        if dir_len < 1e-12 {
            return;
        }
        dir = scale(dir, 1.0 / dir_len);
        if dot(dir, cell[axis]) < 0.0 {
            dir = scale(dir, -1.0);
        }

        let projections: Vec<f64> = self.atoms.iter().map(|a| dot(a.position, dir)).collect();
        let p0 = projections.iter().cloned().fold(f64::INFINITY, f64::min);
        let p1 = projections.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let length = norm(cell[axis]);
        let height = dot(cell[axis], dir);
        let longer_height = (p1 - p0 + 2.0 * vacuum) - height;
        let top = longer_height + height - p1;
        let shift_height = 0.5 * (top - p0);
        let cos_phi = height / length;

        let longer = longer_height / cos_phi;
        let shift = shift_height / cos_phi;

        let unit = scale(cell[axis], 1.0 / length);
        let mut matrix = cell;
        matrix[axis] = scale(cell[axis], 1.0 + longer / length);
        self.lattice = Lattice::from_vectors(matrix);
        self.translate(scale(unit, shift));
    }

    /// 把周期方向上的分数坐标折回 [0, 1)
    pub fn wrap(&mut self, axes: [bool; 3]) {
        let mut frac = self.frac_positions();
        for f in &mut frac {
            for k in 0..3 {
                if axes[k] {
                    f[k] = f[k].rem_euclid(1.0);
                }
            }
        }
        self.set_frac_positions(&frac);
    }
}
