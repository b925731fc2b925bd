//! # 有限位移生成
//!
//! 每个对称等价轨道只位移一个代表原子。位移方向从 13 个候选方向
//! (晶格分数坐标下的整数向量) 中选取：
//! 1. 一个方向 d，若位点对称操作的像 {W d} 已张成三维空间；
//! 2. 否则两个方向 d₁, d₂，使 {d₁, d₂, W d₁ 或 W d₂} 张成三维空间；
//! 3. 否则取三个坐标轴。
//!
//! 若没有位点操作把 d 映射为 -d，再补一个反向位移。
//!
//! ## 依赖关系
//! - 被 `phonon/mod.rs`, `phonon/force_constants.rs` 使用
//! - 使用 `models/symmetry.rs`

use crate::models::structure::{add, norm, scale};
use crate::models::supercell::{determinant, Supercell};
use crate::models::symmetry::{equivalent_atoms, rotate_direction, SymmetryOperation};
use crate::models::{Crystal, Lattice};

/// 候选位移方向
pub const CANDIDATE_DIRECTIONS: [[i32; 3]; 13] = [
    [1, 0, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 1, 0],
    [1, 0, 1],
    [0, 1, 1],
    [1, -1, 0],
    [1, 0, -1],
    [0, 1, -1],
    [1, 1, 1],
    [1, 1, -1],
    [1, -1, 1],
    [-1, 1, 1],
];

/// 单个原子位移
#[derive(Debug, Clone, PartialEq)]
pub struct Displacement {
    /// 被位移的原胞原子 (位于超胞原点格点)
    pub atom: usize,
    /// 分数坐标方向
    pub direction: [i32; 3],
    /// 笛卡尔位移向量 (Å)
    pub vector: [f64; 3],
}

impl Displacement {
    fn new(atom: usize, direction: [i32; 3], lattice: &Lattice, distance: f64) -> Self {
        let cart = lattice.frac_to_cart(direction.map(|x| x as f64));
        Displacement {
            atom,
            direction,
            vector: scale(cart, distance / norm(cart)),
        }
    }

    /// 生成位移后的超胞
    pub fn apply(&self, supercell: &Supercell) -> Crystal {
        let mut crystal = supercell.crystal.clone();
        let index = supercell.index_of(self.atom, 0);
        crystal.atoms[index].position = add(crystal.atoms[index].position, self.vector);
        crystal
    }
}

/// 原子 `atom` 的位点对称 (去重后的旋转部分)
pub fn site_symmetry(ops: &[SymmetryOperation], atom: usize) -> Vec<[[i32; 3]; 3]> {
    let mut rotations: Vec<[[i32; 3]; 3]> = Vec::new();
    for op in ops.iter().filter(|op| op.permutation[atom] == atom) {
        if !rotations.contains(&op.rotation) {
            rotations.push(op.rotation);
        }
    }
    rotations
}

fn det(a: [i32; 3], b: [i32; 3], c: [i32; 3]) -> i32 {
    determinant(&[a, b, c])
}

/// 最少的位移方向
pub fn least_directions(site: &[[[i32; 3]; 3]]) -> Vec<[i32; 3]> {
    for d in CANDIDATE_DIRECTIONS {
        let images: Vec<[i32; 3]> = site.iter().map(|w| rotate_direction(w, d)).collect();
        for (i, a) in images.iter().enumerate() {
            for b in &images[i + 1..] {
                if det(d, *a, *b) != 0 {
                    return vec![d];
                }
            }
        }
    }

    for d1 in CANDIDATE_DIRECTIONS {
        for d2 in CANDIDATE_DIRECTIONS {
            let spans = site.iter().any(|w| {
                det(d1, d2, rotate_direction(w, d1)) != 0
                    || det(d1, d2, rotate_direction(w, d2)) != 0
            });
            if spans {
                return vec![d1, d2];
            }
        }
    }

    vec![[1, 0, 0], [0, 1, 0], [0, 0, 1]]
}

/// 没有位点操作把 d 映射为 -d 时需要反向位移
pub fn needs_minus(site: &[[[i32; 3]; 3]], d: [i32; 3]) -> bool {
    let minus = d.map(|x| -x);
    !site.iter().any(|w| rotate_direction(w, d) == minus)
}

/// 生成全部对称不等价位移
pub fn generate_displacements(
    unit: &Crystal,
    ops: &[SymmetryOperation],
    distance: f64,
) -> Vec<Displacement> {
    let mut representatives = equivalent_atoms(unit.len(), ops);
    representatives.sort_unstable();
    representatives.dedup();

    let mut displacements = Vec::new();
    for atom in representatives {
        let site = site_symmetry(ops, atom);
        for d in least_directions(&site) {
            displacements.push(Displacement::new(atom, d, &unit.lattice, distance));
            if needs_minus(&site, d) {
                displacements.push(Displacement::new(
                    atom,
                    d.map(|x| -x),
                    &unit.lattice,
                    distance,
                ));
            }
        }
    }
    displacements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::symmetry::{find_operations, IDENTITY};
    use crate::models::Atom;

    fn fcc(a: f64) -> Crystal {
        let b = a / 2.0;
        Crystal::new(
            "Cu",
            Lattice::from_vectors([[0.0, b, b], [b, 0.0, b], [b, b, 0.0]]),
            vec![Atom::new("Cu", [0.0; 3])],
        )
    }

    #[test]
    fn test_fcc_needs_single_displacement() {
        let unit = fcc(3.61);
        let ops = find_operations(&unit, 1e-5);
        let disps = generate_displacements(&unit, &ops, 0.01);
        assert_eq!(disps.len(), 1);
        assert_eq!(disps[0].direction, [1, 0, 0]);
        assert!((norm(disps[0].vector) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_rocksalt_displaces_each_sublattice() {
        let a = 5.64;
        let b = a / 2.0;
        let unit = Crystal::new(
            "NaCl",
            Lattice::from_vectors([[0.0, b, b], [b, 0.0, b], [b, b, 0.0]]),
            vec![Atom::new("Na", [0.0; 3]), Atom::new("Cl", [b, 0.0, 0.0])],
        );
        let ops = find_operations(&unit, 1e-5);
        let disps = generate_displacements(&unit, &ops, 0.01);
        let atoms: Vec<usize> = disps.iter().map(|d| d.atom).collect();
        assert_eq!(atoms, vec![0, 1]);
    }

    #[test]
    fn test_triclinic_needs_three_directions() {
        // 仅有恒等和反演
        let site = vec![IDENTITY, [[-1, 0, 0], [0, -1, 0], [0, 0, -1]]];
        assert_eq!(least_directions(&site).len(), 3);
        assert!(!needs_minus(&site, [1, 0, 0]));
    }

    #[test]
    fn test_polar_site_needs_minus() {
        let site = vec![IDENTITY];
        assert!(needs_minus(&site, [0, 0, 1]));
        // 绕 z 轴四重旋转：z 方向无反向像，x 方向有
        let c4 = [[0, -1, 0], [1, 0, 0], [0, 0, 1]];
        let c2 = [[-1, 0, 0], [0, -1, 0], [0, 0, 1]];
        let c4i = [[0, 1, 0], [-1, 0, 0], [0, 0, 1]];
        let site = vec![IDENTITY, c4, c2, c4i];
        assert!(needs_minus(&site, [0, 0, 1]));
        assert!(!needs_minus(&site, [1, 0, 0]));
        // 面内方向的像不离开 xy 平面，[1, 0, 1] 的像已张成三维
        assert_eq!(least_directions(&site), vec![[1, 0, 1]]);
        assert!(needs_minus(&site, [1, 0, 1]));
    }
}
