//! # 超胞构造
//!
//! 用整数矩阵 S (行向量约定，新晶格 = S · 旧晶格) 扩展晶胞。
//! 惯用胞转换 (`builder/conventional.rs`) 与声子超胞 (`phonon/`) 共用。
//!
//! 原子排列顺序为"原子优先"：超胞原子 `p * n_lattice + l` 对应原胞原子 `p`
//! 平移到第 `l` 个格点，其中第 0 个格点是原点。
//!
//! ## 依赖关系
//! - 被 `builder/conventional.rs`, `phonon/` 使用
//! - 使用 `models/structure.rs`

use crate::error::{CalcError, Result};
use crate::models::structure::{Atom, Crystal, Lattice};

use nalgebra::Matrix3;

const LATTICE_POINT_TOL: f64 = 1e-8;

/// 超胞及其与原胞的对应关系
#[derive(Debug, Clone)]
pub struct Supercell {
    pub crystal: Crystal,
    /// 扩胞矩阵
    pub matrix: [[i32; 3]; 3],
    /// 每个超胞原子对应的原胞原子序号
    pub prim_index: Vec<usize>,
    /// 格点 (原胞分数坐标，整数)
    pub lattice_points: Vec<[i32; 3]>,
}

impl Supercell {
    pub fn n_lattice_points(&self) -> usize {
        self.lattice_points.len()
    }

    /// 原胞原子 `p` 在格点 `l` 处的超胞序号
    pub fn index_of(&self, p: usize, l: usize) -> usize {
        p * self.lattice_points.len() + l
    }

    /// 查找格点序号 (按超胞周期折回后比较)
    pub fn lattice_point_index(&self, n: [i32; 3]) -> Option<usize> {
        let inv = inverse_transform(&self.matrix)?;
        let target = wrap_to_cell(super_frac(&inv, n));
        self.lattice_points.iter().position(|&m| {
            let f = wrap_to_cell(super_frac(&inv, m));
            (0..3).all(|k| {
                let d = (f[k] - target[k]).abs();
                d < 1e-6 || (1.0 - d) < 1e-6
            })
        })
    }
}

/// 整数矩阵行列式
pub fn determinant(m: &[[i32; 3]; 3]) -> i32 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]) - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

fn to_matrix(m: &[[i32; 3]; 3]) -> Matrix3<f64> {
    Matrix3::from_fn(|i, j| m[i][j] as f64)
}

fn inverse_transform(m: &[[i32; 3]; 3]) -> Option<Matrix3<f64>> {
    to_matrix(m).try_inverse()
}

/// 原胞分数坐标 n 在超胞分数坐标下的表示：f = n · S⁻¹
fn super_frac(inv: &Matrix3<f64>, n: [i32; 3]) -> [f64; 3] {
    let mut f = [0.0; 3];
    for (j, fj) in f.iter_mut().enumerate() {
        *fj = (0..3).map(|i| n[i] as f64 * inv[(i, j)]).sum();
    }
    f
}

fn wrap_to_cell(f: [f64; 3]) -> [f64; 3] {
    let mut w = f;
    for x in &mut w {
        *x -= (*x + LATTICE_POINT_TOL).floor();
    }
    w
}

/// 枚举超胞内的格点，原点排在第一位
pub fn lattice_points(matrix: &[[i32; 3]; 3]) -> Result<Vec<[i32; 3]>> {
    let det = determinant(matrix);
    if det == 0 {
        return Err(CalcError::InvalidArgument(
            "Supercell matrix is singular".to_string(),
        ));
    }
    let inv = inverse_transform(matrix)
        .ok_or_else(|| CalcError::InvalidArgument("Supercell matrix is singular".to_string()))?;

    // 超胞角点在原胞坐标下的范围
    let mut lo = [0i32; 3];
    let mut hi = [0i32; 3];
    for row in matrix {
        for k in 0..3 {
            if row[k] < 0 {
                lo[k] += row[k];
            } else {
                hi[k] += row[k];
            }
        }
    }

    let mut points = Vec::with_capacity(det.unsigned_abs() as usize);
    for i in lo[0]..=hi[0] {
        for j in lo[1]..=hi[1] {
            for k in lo[2]..=hi[2] {
                let f = super_frac(&inv, [i, j, k]);
                if f.iter()
                    .all(|&x| x >= -LATTICE_POINT_TOL && x < 1.0 - LATTICE_POINT_TOL)
                {
                    points.push([i, j, k]);
                }
            }
        }
    }

    if points.len() != det.unsigned_abs() as usize {
        return Err(CalcError::GeometryError(format!(
            "Found {} lattice points for a supercell of determinant {}",
            points.len(),
            det
        )));
    }

    points.sort_by_key(|p| (p[0] != 0 || p[1] != 0 || p[2] != 0, p[2], p[1], p[0]));
    Ok(points)
}

/// 构造超胞
pub fn make_supercell(unit: &Crystal, matrix: [[i32; 3]; 3]) -> Result<Supercell> {
    let points = lattice_points(&matrix)?;

    let s = to_matrix(&matrix);
    let new_lattice = Lattice::from_matrix(&(s * unit.lattice.to_matrix()));

    let mut atoms = Vec::with_capacity(unit.len() * points.len());
    let mut prim_index = Vec::with_capacity(unit.len() * points.len());
    for (p, atom) in unit.atoms.iter().enumerate() {
        for n in &points {
            let shift = unit
                .lattice
                .frac_to_cart([n[0] as f64, n[1] as f64, n[2] as f64]);
            let cart = crate::models::structure::add(atom.position, shift);
            // 折回超胞，保证所有原子都在 [0, 1) 内
            let frac = wrap_to_cell(new_lattice.cart_to_frac(cart));
            atoms.push(Atom::new(atom.element.clone(), new_lattice.frac_to_cart(frac)));
            prim_index.push(p);
        }
    }

    let mut crystal = Crystal::new(unit.name.clone(), new_lattice, atoms);
    crystal.pbc = unit.pbc;

    Ok(Supercell {
        crystal,
        matrix,
        prim_index,
        lattice_points: points,
    })
}

/// 对角扩胞矩阵
pub fn diagonal(n: [i32; 3]) -> [[i32; 3]; 3] {
    [[n[0], 0, 0], [0, n[1], 0], [0, 0, n[2]]]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fcc_primitive(a: f64) -> Crystal {
        let b = a / 2.0;
        Crystal::new(
            "Cu",
            Lattice::from_vectors([[0.0, b, b], [b, 0.0, b], [b, b, 0.0]]),
            vec![Atom::new("Cu", [0.0; 3])],
        )
    }

    #[test]
    fn test_diagonal_supercell() {
        let sc = make_supercell(&fcc_primitive(3.6), diagonal([2, 2, 2])).unwrap();
        assert_eq!(sc.crystal.len(), 8);
        assert_eq!(sc.lattice_points[0], [0, 0, 0]);
        let v = fcc_primitive(3.6).lattice.volume().abs() * 8.0;
        assert!((sc.crystal.lattice.volume().abs() - v).abs() < 1e-9);
    }

    #[test]
    fn test_fcc_to_cubic_transform() {
        let matrix = [[-1, 1, 1], [1, -1, 1], [1, 1, -1]];
        assert_eq!(determinant(&matrix), 4);
        let sc = make_supercell(&fcc_primitive(4.0), matrix).unwrap();
        assert_eq!(sc.crystal.len(), 4);
        assert!((sc.crystal.lattice.volume() - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_singular_matrix_rejected() {
        let err = make_supercell(&fcc_primitive(4.0), [[1, 0, 0], [1, 0, 0], [0, 0, 1]]);
        assert!(err.is_err());
    }

    #[test]
    fn test_lattice_point_index_wraps() {
        let sc = make_supercell(&fcc_primitive(3.6), diagonal([3, 3, 3])).unwrap();
        let idx = sc.lattice_point_index([4, -1, 3]).unwrap();
        assert_eq!(sc.lattice_points[idx], [1, 2, 0]);
        assert_eq!(sc.lattice_point_index([0, 0, 0]), Some(0));
    }
}
