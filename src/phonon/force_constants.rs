//! # 力常数
//!
//! 只存储原点格点处原胞原子的行 Φ(p, j) (3×3，eV/Å²)，j 遍历超胞全部原子；
//! 其他格点的行由平移对称给出，动力学矩阵只需要这些行。
//!
//! 求解步骤：
//! 1. 对每个代表原子 p，用其位点对称操作 g 扩展位移/受力方程：
//!    位移 R u，受力 F'(g j) = R F(j)；
//! 2. 一次伪逆解出整行：Φ(p, j) = -pinv(U) · F_j；
//! 3. 同一轨道的其他原子 q = g p：Φ(q, g j) = R Φ(p, j) Rᵀ。
//!
//! 操作 g 作用到超胞原子时扣除 p 的格点偏移，使 g p 落回原点格点。
//!
//! ## 依赖关系
//! - 被 `phonon/mod.rs`, `phonon/dynmat.rs` 使用
//! - 使用 `phonon/displacement.rs`, `models/supercell.rs`, `models/symmetry.rs`
//! - 使用 `nalgebra` 的 SVD 伪逆

use super::displacement::Displacement;
use crate::error::{CalcError, Result};
use crate::models::supercell::Supercell;
use crate::models::symmetry::{rotate_direction, SymmetryOperation};
use crate::models::Lattice;

use log::debug;
use nalgebra::{DMatrix, Matrix3, Vector3};

/// 原点格点行的力常数
#[derive(Debug, Clone)]
pub struct ForceConstants {
    rows: Vec<Vec<Matrix3<f64>>>,
}

impl ForceConstants {
    #[cfg(test)]
    pub(crate) fn zeros(n_prim: usize, n_super: usize) -> Self {
        ForceConstants {
            rows: vec![vec![Matrix3::zeros(); n_super]; n_prim],
        }
    }

    #[cfg(test)]
    pub(crate) fn from_rows(rows: Vec<Vec<Matrix3<f64>>>) -> Self {
        ForceConstants { rows }
    }

    pub fn n_prim(&self) -> usize {
        self.rows.len()
    }

    #[cfg(test)]
    pub fn n_super(&self) -> usize {
        self.rows.first().map_or(0, |r| r.len())
    }

    /// Φ(p, j)：p 为原胞原子 (原点格点)，j 为超胞原子
    pub fn get(&self, p: usize, j: usize) -> &Matrix3<f64> {
        &self.rows[p][j]
    }

    pub fn max_abs(&self) -> f64 {
        self.rows
            .iter()
            .flatten()
            .map(|m| m.amax())
            .fold(0.0, f64::max)
    }

    /// 由位移和受力求解
    ///
    /// `forces[k]` 是第 k 个位移超胞中全部原子的受力 (已扣除平均值)
    pub fn compute(
        lattice: &Lattice,
        supercell: &Supercell,
        ops: &[SymmetryOperation],
        displacements: &[Displacement],
        forces: &[Vec<[f64; 3]>],
    ) -> Result<Self> {
        let n_prim = supercell.crystal.len() / supercell.n_lattice_points().max(1);
        let n_super = supercell.crystal.len();
        if displacements.len() != forces.len() {
            return Err(CalcError::ForceConstantsError(format!(
                "{} displacements but {} force sets",
                displacements.len(),
                forces.len()
            )));
        }
        if let Some(set) = forces.iter().find(|f| f.len() != n_super) {
            return Err(CalcError::ForceConstantsError(format!(
                "force set has {} atoms, supercell has {}",
                set.len(),
                n_super
            )));
        }

        let rotations: Vec<Matrix3<f64>> =
            ops.iter().map(|op| op.cartesian_rotation(lattice)).collect();

        let mut representatives: Vec<usize> = displacements.iter().map(|d| d.atom).collect();
        representatives.dedup();

        let mut rows: Vec<Option<Vec<Matrix3<f64>>>> = vec![None; n_prim];
        for &p in &representatives {
            let site: Vec<usize> = (0..ops.len())
                .filter(|&g| ops[g].permutation[p] == p)
                .collect();
            let maps = site
                .iter()
                .map(|&g| map_atoms(supercell, &ops[g], p))
                .collect::<Result<Vec<_>>>()?;

            let mut u_rows: Vec<Vector3<f64>> = Vec::new();
            let mut f_rows: Vec<Vec<Vector3<f64>>> = vec![Vec::new(); n_super];
            for (k, disp) in displacements.iter().enumerate().filter(|(_, d)| d.atom == p) {
                let u = Vector3::from(disp.vector);
                for (&g, map) in site.iter().zip(&maps) {
                    let r = &rotations[g];
                    u_rows.push(r * u);
                    for (j, f) in forces[k].iter().enumerate() {
                        f_rows[map[j]].push(r * Vector3::from(*f));
                    }
                }
            }
            debug!(
                "Atom {}: {} site operations, {} equations",
                p,
                site.len(),
                u_rows.len()
            );

            let u = DMatrix::from_fn(u_rows.len(), 3, |i, a| u_rows[i][a]);
            let pinv = pseudo_inverse(u, p)?;

            let mut row = Vec::with_capacity(n_super);
            for f in &f_rows {
                let fm = DMatrix::from_fn(f.len(), 3, |i, a| f[i][a]);
                let phi = -(&pinv * fm);
                let phi = Matrix3::from_fn(|a, b| phi[(a, b)]);
                if phi.iter().any(|x| !x.is_finite()) {
                    return Err(CalcError::ForceConstantsError(format!(
                        "non-finite force constants for atom {}",
                        p
                    )));
                }
                row.push(phi);
            }
            rows[p] = Some(row);
        }

        // 分配到等价原子
        for q in 0..n_prim {
            if rows[q].is_some() {
                continue;
            }
            let (p, g) = representatives
                .iter()
                .find_map(|&p| {
                    ops.iter()
                        .position(|op| op.permutation[p] == q)
                        .map(|g| (p, g))
                })
                .ok_or_else(|| {
                    CalcError::ForceConstantsError(format!(
                        "atom {} is not equivalent to any displaced atom",
                        q
                    ))
                })?;
            let map = map_atoms(supercell, &ops[g], p)?;
            let r = &rotations[g];
            let source = rows[p].as_ref().ok_or_else(|| {
                CalcError::ForceConstantsError(format!("missing force constants for atom {}", p))
            })?;
            let mut row = vec![Matrix3::zeros(); n_super];
            for (j, phi) in source.iter().enumerate() {
                row[map[j]] = r * phi * r.transpose();
            }
            rows[q] = Some(row);
        }

        Ok(ForceConstants {
            rows: rows.into_iter().flatten().collect(),
        })
    }
}

fn pseudo_inverse(u: DMatrix<f64>, atom: usize) -> Result<DMatrix<f64>> {
    let svd = u.svd(true, true);
    let largest = svd.singular_values.max();
    if !(largest > 0.0) || svd.rank(1e-8 * largest) < 3 {
        return Err(CalcError::ForceConstantsError(format!(
            "displacements of atom {} do not span three dimensions",
            atom
        )));
    }
    svd.pseudo_inverse(1e-12 * largest)
        .map_err(|e| CalcError::ForceConstantsError(e.to_string()))
}

/// 操作 g 对超胞原子的置换；扣除原子 `anchor` 的格点偏移
pub fn map_atoms(
    supercell: &Supercell,
    op: &SymmetryOperation,
    anchor: usize,
) -> Result<Vec<usize>> {
    let n_lat = supercell.n_lattice_points();
    let shift = op.offsets[anchor];
    let mut map = Vec::with_capacity(supercell.crystal.len());
    for (j, &p) in supercell.prim_index.iter().enumerate() {
        let n = supercell.lattice_points[j - p * n_lat];
        let wn = rotate_direction(&op.rotation, n);
        let target = [0, 1, 2].map(|k| op.offsets[p][k] + wn[k] - shift[k]);
        let l = supercell.lattice_point_index(target).ok_or_else(|| {
            CalcError::ForceConstantsError(
                "symmetry operation does not map the supercell onto itself".to_string(),
            )
        })?;
        map.push(supercell.index_of(op.permutation[p], l));
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::supercell::{diagonal, make_supercell};
    use crate::models::symmetry::find_operations;
    use crate::models::{Atom, Crystal};
    use crate::phonon::displacement::generate_displacements;

    fn fcc(a: f64) -> Crystal {
        let b = a / 2.0;
        Crystal::new(
            "Ar",
            Lattice::from_vectors([[0.0, b, b], [b, 0.0, b], [b, b, 0.0]]),
            vec![Atom::new("Ar", [0.0; 3])],
        )
    }

    #[test]
    fn test_map_atoms_is_permutation() {
        let unit = fcc(5.26);
        let sc = make_supercell(&unit, diagonal([2, 2, 2])).unwrap();
        let ops = find_operations(&unit, 1e-5);
        for op in &ops {
            let mut map = map_atoms(&sc, op, 0).unwrap();
            assert_eq!(map[0], 0);
            map.sort_unstable();
            assert_eq!(map, (0..8).collect::<Vec<_>>());
        }
    }

    /// 最近邻弹簧模型：Φ(0, j) 只在最近邻上非零，力由 F = -Φ u 给出
    #[test]
    fn test_recovers_symmetric_spring_constants() {
        let unit = fcc(5.26);
        let sc = make_supercell(&unit, diagonal([3, 3, 3])).unwrap();
        let ops = find_operations(&unit, 1e-5);
        let disps = generate_displacements(&unit, &ops, 0.01);
        assert_eq!(disps.len(), 1);

        // 径向弹簧 k = 1，等效 Φ(0, j) = -k e eᵀ (j 为最近邻)，Φ(0, 0) = Σ k e eᵀ
        let k = 1.0;
        let positions = sc.crystal.positions();
        let lattice = &sc.crystal.lattice;
        let nn = 5.26 / 2f64.sqrt();
        let u = Vector3::from(disps[0].vector);
        let mut forces = vec![[0.0; 3]; sc.crystal.len()];
        for j in 1..sc.crystal.len() {
            let mut d = lattice.cart_to_frac(positions[j]);
            for x in &mut d {
                *x -= x.round();
            }
            let r = Vector3::from(lattice.frac_to_cart(d));
            if (r.norm() - nn).abs() > 1e-6 {
                continue;
            }
            let e = r / r.norm();
            // 原子 0 位移 u：j 受力 k (e·u) e，原子 0 受反作用
            let f = e * (k * e.dot(&u));
            for a in 0..3 {
                forces[j][a] += f[a];
                forces[0][a] -= f[a];
            }
        }

        let fc = ForceConstants::compute(&unit.lattice, &sc, &ops, &disps, &[forces]).unwrap();
        // 自作用项：12 个最近邻 Σ e eᵀ = 4 I
        let self_term = fc.get(0, 0);
        assert!((self_term - Matrix3::identity() * 4.0).amax() < 1e-9);
        // 力常数按行求和为零
        let mut sum = Matrix3::zeros();
        for j in 0..sc.crystal.len() {
            sum += fc.get(0, j);
        }
        assert!(sum.amax() < 1e-9);
    }

    #[test]
    fn test_zero_forces_give_zero_constants() {
        let a = 5.64;
        let b = a / 2.0;
        let unit = Crystal::new(
            "NaCl",
            Lattice::from_vectors([[0.0, b, b], [b, 0.0, b], [b, b, 0.0]]),
            vec![Atom::new("Na", [0.0; 3]), Atom::new("Cl", [b, 0.0, 0.0])],
        );
        let sc = make_supercell(&unit, diagonal([2, 2, 2])).unwrap();
        let ops = find_operations(&unit, 1e-5);
        let disps = generate_displacements(&unit, &ops, 0.01);
        let forces = vec![vec![[0.0; 3]; 16]; disps.len()];
        let fc = ForceConstants::compute(&unit.lattice, &sc, &ops, &disps, &forces).unwrap();
        assert_eq!(fc.n_prim(), 2);
        assert_eq!(fc.n_super(), 16);
        assert_eq!(fc.max_abs(), 0.0);
    }

    #[test]
    fn test_mismatched_force_sets() {
        let unit = fcc(5.26);
        let sc = make_supercell(&unit, diagonal([2, 2, 2])).unwrap();
        let ops = find_operations(&unit, 1e-5);
        let disps = generate_displacements(&unit, &ops, 0.01);
        let err = ForceConstants::compute(&unit.lattice, &sc, &ops, &disps, &[]).unwrap_err();
        assert!(matches!(err, CalcError::ForceConstantsError(_)));
    }
}
