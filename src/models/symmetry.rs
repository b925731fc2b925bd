//! # 对称性搜索
//!
//! 直接在晶胞上搜索对称操作，不依赖外部对称性库：
//! 1. 晶格点群：矩阵元 ∈ {-1, 0, 1} 且保持度规 (WᵀGW = G) 的整数矩阵 W；
//! 2. 空间群操作：对每个 W，用原子 0 与同种原子配对得到候选平移 t，
//!    再检查所有原子都映射到同种原子上。
//!
//! 分数坐标约定为列向量：x' = W x + t。对应的笛卡尔旋转 R = Lᵀ W (Lᵀ)⁻¹，
//! 其中 L 的行是晶格向量。
//!
//! ## 依赖关系
//! - 被 `builder/conventional.rs`, `phonon/` 使用
//! - 使用 `models/structure.rs`, `nalgebra`

use crate::models::structure::{Crystal, Lattice};

use nalgebra::Matrix3;

/// 空间群操作 (分数坐标)
#[derive(Debug, Clone)]
pub struct SymmetryOperation {
    pub rotation: [[i32; 3]; 3],
    pub translation: [f64; 3],
    /// 原子置换：原子 i 映射到原子 `permutation[i]`
    pub permutation: Vec<usize>,
    /// W x_i + t = x_{perm[i]} + offsets[i]
    pub offsets: Vec<[i32; 3]>,
}

impl SymmetryOperation {
    /// 笛卡尔旋转矩阵
    pub fn cartesian_rotation(&self, lattice: &Lattice) -> Matrix3<f64> {
        cartesian_rotation(&self.rotation, lattice)
    }

    pub fn is_identity(&self) -> bool {
        self.rotation == IDENTITY && self.translation.iter().all(|t| t.abs() < 1e-8)
    }

    /// 作用于分数坐标
    pub fn apply(&self, frac: [f64; 3]) -> [f64; 3] {
        let w = self.rotation;
        let mut out = self.translation;
        for (i, o) in out.iter_mut().enumerate() {
            *o += (0..3).map(|j| w[i][j] as f64 * frac[j]).sum::<f64>();
        }
        out
    }
}

pub const IDENTITY: [[i32; 3]; 3] = [[1, 0, 0], [0, 1, 0], [0, 0, 1]];

pub fn rotation_matrix(w: &[[i32; 3]; 3]) -> Matrix3<f64> {
    Matrix3::from_fn(|i, j| w[i][j] as f64)
}

/// 分数坐标旋转 W 对应的笛卡尔旋转
pub fn cartesian_rotation(w: &[[i32; 3]; 3], lattice: &Lattice) -> Matrix3<f64> {
    let lt = lattice.to_matrix().transpose();
    match lt.try_inverse() {
        Some(inv) => lt * rotation_matrix(w) * inv,
        None => Matrix3::identity(),
    }
}

/// 作用于分数方向向量 (整数)
pub fn rotate_direction(w: &[[i32; 3]; 3], d: [i32; 3]) -> [i32; 3] {
    let mut out = [0; 3];
    for (i, o) in out.iter_mut().enumerate() {
        *o = (0..3).map(|j| w[i][j] * d[j]).sum();
    }
    out
}

/// 晶格点群
///
/// `tolerance` 为度规的相对容差：|(WᵀGW - G)_ij| ≤ tol · √(G_ii G_jj)
pub fn lattice_point_group(lattice: &Lattice, tolerance: f64) -> Vec<[[i32; 3]; 3]> {
    let g = lattice.metric();
    let mut ops = Vec::new();
    let range = [-1, 0, 1];

    // 候选列向量：保持长度 |W e_j| = |a_j|
    let mut candidates: [Vec<[i32; 3]>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for i in range {
        for j in range {
            for k in range {
                let v = [i, j, k];
                if v == [0, 0, 0] {
                    continue;
                }
                let vf = [i as f64, j as f64, k as f64];
                let len2: f64 = (0..3)
                    .map(|a| (0..3).map(|b| vf[a] * g[(a, b)] * vf[b]).sum::<f64>())
                    .sum();
                for col in 0..3 {
                    if (len2 - g[(col, col)]).abs() <= tolerance * 2.0 * g[(col, col)] {
                        candidates[col].push(v);
                    }
                }
            }
        }
    }

    for c0 in &candidates[0] {
        for c1 in &candidates[1] {
            for c2 in &candidates[2] {
                let w = [
                    [c0[0], c1[0], c2[0]],
                    [c0[1], c1[1], c2[1]],
                    [c0[2], c1[2], c2[2]],
                ];
                let det = crate::models::supercell::determinant(&w);
                if det.abs() != 1 {
                    continue;
                }
                let wm = rotation_matrix(&w);
                let gw = wm.transpose() * g * wm;
                let preserves = (0..3).all(|a| {
                    (0..3).all(|b| {
                        let scale = (g[(a, a)] * g[(b, b)]).sqrt();
                        (gw[(a, b)] - g[(a, b)]).abs() <= tolerance * scale
                    })
                });
                if preserves {
                    ops.push(w);
                }
            }
        }
    }
    ops
}

/// 两个分数坐标在周期意义下的笛卡尔距离，返回 (距离, 整数差)
fn periodic_distance(lattice: &Lattice, a: [f64; 3], b: [f64; 3]) -> (f64, [i32; 3]) {
    let mut diff = [0.0; 3];
    let mut n = [0i32; 3];
    for k in 0..3 {
        let d = a[k] - b[k];
        n[k] = d.round() as i32;
        diff[k] = d - n[k] as f64;
    }
    let cart = lattice.frac_to_cart(diff);
    (crate::models::structure::norm(cart), n)
}

/// 搜索晶体的空间群操作
///
/// `symprec` 为笛卡尔距离容差 (Å)。结果总是包含恒等操作。
pub fn find_operations(crystal: &Crystal, symprec: f64) -> Vec<SymmetryOperation> {
    let lattice = &crystal.lattice;
    let lengths = lattice.lengths();
    let shortest = lengths.iter().cloned().fold(f64::INFINITY, f64::min);
    let metric_tol = (2.0 * symprec / shortest).max(1e-8);
    let rotations = lattice_point_group(lattice, metric_tol);
    let frac = crystal.frac_positions();
    let n = crystal.len();

    let mut ops: Vec<SymmetryOperation> = Vec::new();
    for w in &rotations {
        let probe = SymmetryOperation {
            rotation: *w,
            translation: [0.0; 3],
            permutation: Vec::new(),
            offsets: Vec::new(),
        };
        let rotated: Vec<[f64; 3]> = frac.iter().map(|f| probe.apply(*f)).collect();

        for j in 0..n {
            if crystal.atoms[j].element != crystal.atoms[0].element {
                continue;
            }
            let mut t = [0.0; 3];
            for k in 0..3 {
                let d = frac[j][k] - rotated[0][k];
                t[k] = d - (d + 1e-9).floor();
            }

            let mut permutation = Vec::with_capacity(n);
            let mut offsets = Vec::with_capacity(n);
            let mut ok = true;
            for i in 0..n {
                let image = [
                    rotated[i][0] + t[0],
                    rotated[i][1] + t[1],
                    rotated[i][2] + t[2],
                ];
                let found = (0..n).find_map(|k| {
                    if crystal.atoms[k].element != crystal.atoms[i].element {
                        return None;
                    }
                    let (dist, offset) = periodic_distance(lattice, image, frac[k]);
                    (dist < symprec).then_some((k, offset))
                });
                match found {
                    Some((k, offset)) => {
                        permutation.push(k);
                        offsets.push(offset);
                    }
                    None => {
                        ok = false;
                        break;
                    }
                }
            }
            if !ok {
                continue;
            }
            // 置换必须是双射
            let mut seen = vec![false; n];
            if permutation.iter().any(|&k| std::mem::replace(&mut seen[k], true)) {
                continue;
            }
            ops.push(SymmetryOperation {
                rotation: *w,
                translation: t,
                permutation,
                offsets,
            });
        }
    }

    // 恒等操作放在首位
    if let Some(pos) = ops.iter().position(|op| op.is_identity()) {
        ops.swap(0, pos);
    } else {
        ops.insert(
            0,
            SymmetryOperation {
                rotation: IDENTITY,
                translation: [0.0; 3],
                permutation: (0..n).collect(),
                offsets: vec![[0; 3]; n],
            },
        );
    }
    ops
}

/// 按对称操作把原子划分为等价轨道，返回每个原子的代表原子 (轨道中最小序号)
pub fn equivalent_atoms(n_atoms: usize, ops: &[SymmetryOperation]) -> Vec<usize> {
    let mut rep: Vec<usize> = (0..n_atoms).collect();
    for i in 0..n_atoms {
        for op in ops {
            let k = op.permutation[i];
            if rep[k] > rep[i] {
                rep[k] = rep[i];
            }
        }
    }
    // 传递闭包
    loop {
        let mut changed = false;
        for i in 0..n_atoms {
            for op in ops {
                let k = op.permutation[i];
                let m = rep[i].min(rep[k]);
                if rep[i] != m || rep[k] != m {
                    rep[i] = m;
                    rep[k] = m;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
    rep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::structure::Atom;

    fn cubic(a: f64) -> Lattice {
        Lattice::from_vectors([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]])
    }

    #[test]
    fn test_point_group_orders() {
        assert_eq!(lattice_point_group(&cubic(3.0), 1e-5).len(), 48);

        let b = 1.8;
        let fcc = Lattice::from_vectors([[0.0, b, b], [b, 0.0, b], [b, b, 0.0]]);
        assert_eq!(lattice_point_group(&fcc, 1e-5).len(), 48);

        let hex = Lattice::from_parameters(2.5, 2.5, 4.0, 90.0, 90.0, 120.0);
        assert_eq!(lattice_point_group(&hex, 1e-5).len(), 24);

        let tet = Lattice::from_parameters(3.0, 3.0, 4.0, 90.0, 90.0, 90.0);
        assert_eq!(lattice_point_group(&tet, 1e-5).len(), 16);

        let ortho = Lattice::from_parameters(3.0, 3.5, 4.0, 90.0, 90.0, 90.0);
        assert_eq!(lattice_point_group(&ortho, 1e-5).len(), 8);
    }

    #[test]
    fn test_rocksalt_operations() {
        let a = 5.64;
        let b = a / 2.0;
        let lattice = Lattice::from_vectors([[0.0, b, b], [b, 0.0, b], [b, b, 0.0]]);
        let crystal = Crystal::new(
            "NaCl",
            lattice,
            vec![Atom::new("Na", [0.0; 3]), Atom::new("Cl", [b, 0.0, 0.0])],
        );
        let ops = find_operations(&crystal, 1e-5);
        assert_eq!(ops.len(), 48);
        assert!(ops[0].is_identity());
        for op in &ops {
            assert_eq!(op.permutation, vec![0, 1]);
        }
    }

    #[test]
    fn test_cartesian_rotation_is_orthogonal() {
        let hex = Lattice::from_parameters(2.5, 2.5, 4.0, 90.0, 90.0, 120.0);
        for w in lattice_point_group(&hex, 1e-5) {
            let r = cartesian_rotation(&w, &hex);
            let rtr = r.transpose() * r;
            assert!((rtr - Matrix3::identity()).abs().max() < 1e-10);
        }
    }

    #[test]
    fn test_equivalent_atoms_in_conventional_fcc() {
        let a = 3.6;
        let h = a / 2.0;
        let crystal = Crystal::new(
            "Cu",
            cubic(a),
            vec![
                Atom::new("Cu", [0.0, 0.0, 0.0]),
                Atom::new("Cu", [0.0, h, h]),
                Atom::new("Cu", [h, 0.0, h]),
                Atom::new("Cu", [h, h, 0.0]),
            ],
        );
        let ops = find_operations(&crystal, 1e-5);
        assert_eq!(ops.len(), 48 * 4);
        assert_eq!(equivalent_atoms(4, &ops), vec![0, 0, 0, 0]);
    }
}
