//! # q 点采样
//!
//! 所有 q 点都用原胞倒格子的分数坐标表示 (不含 2π)。
//!
//! - [`monkhorst_pack`]：热力学量采样网格 q_i = (2r - N - 1) / 2N
//! - [`commensurate_points`]：与超胞公度的 q 点，满足 S q ∈ Z³，共 |det S| 个
//! - [`band_path`]：按晶格度规分类选取的高对称路径
//!
//! ## 依赖关系
//! - 被 `phonon/mod.rs` 使用
//! - 使用 `models/supercell.rs`, `models/structure.rs`

use crate::error::Result;
use crate::models::structure::norm;
use crate::models::supercell::lattice_points;
use crate::models::Lattice;

use nalgebra::{Matrix3, Vector3};

/// Monkhorst–Pack 网格 (不含偏移，偶数网格不含 Γ)
pub fn monkhorst_pack(mesh: [usize; 3]) -> Vec<[f64; 3]> {
    let axis = |n: usize| -> Vec<f64> {
        (1..=n)
            .map(|r| (2.0 * r as f64 - n as f64 - 1.0) / (2.0 * n as f64))
            .collect()
    };
    let (q0, q1, q2) = (axis(mesh[0]), axis(mesh[1]), axis(mesh[2]));

    let mut points = Vec::with_capacity(mesh.iter().product());
    for &a in &q0 {
        for &b in &q1 {
            for &c in &q2 {
                points.push([a, b, c]);
            }
        }
    }
    points
}

/// 与扩胞矩阵 S 公度的 q 点，落在 [0, 1) 内
pub fn commensurate_points(matrix: &[[i32; 3]; 3]) -> Result<Vec<[f64; 3]>> {
    let transposed = [
        [matrix[0][0], matrix[1][0], matrix[2][0]],
        [matrix[0][1], matrix[1][1], matrix[2][1]],
        [matrix[0][2], matrix[1][2], matrix[2][2]],
    ];
    // Sᵀ 的格点 n 满足 S⁻¹ n ∈ [0, 1)³
    let points = lattice_points(&transposed)?;
    let s = Matrix3::from_fn(|i, j| matrix[i][j] as f64);
    let inv = s.try_inverse().unwrap_or_else(Matrix3::zeros);

    Ok(points
        .into_iter()
        .map(|n| {
            let q = inv * Vector3::new(n[0] as f64, n[1] as f64, n[2] as f64);
            [0, 1, 2].map(|k| {
                let x = q[k] - q[k].floor();
                if (1.0 - x).abs() < 1e-10 {
                    0.0
                } else {
                    x
                }
            })
        })
        .collect())
}

/// 路径上的一个高对称点
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub name: &'static str,
    pub q: [f64; 3],
}

const G: Label = Label {
    name: "Γ",
    q: [0.0, 0.0, 0.0],
};

fn label(name: &'static str, q: [f64; 3]) -> Label {
    Label { name, q }
}

/// 晶格类型 (仅用于选取能带路径)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Cubic,
    FaceCentered,
    BodyCentered,
    Hexagonal,
    Tetragonal,
    Orthorhombic,
    Triclinic,
}

fn close(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol * a.abs().max(b.abs()).max(1.0)
}

/// 按晶格参数分类
pub fn classify(lattice: &Lattice) -> PathKind {
    let (a, b, c, alpha, beta, gamma) = lattice.parameters();
    let tol = 1e-4;
    let equal_ab = close(a, b, tol);
    let equal_abc = equal_ab && close(b, c, tol);
    let right = |x: f64| close(x, 90.0, tol);
    let all_right = right(alpha) && right(beta) && right(gamma);
    let bcc_angle = 109.471_220_634_490_69;

    if equal_abc && all_right {
        PathKind::Cubic
    } else if equal_abc && [alpha, beta, gamma].iter().all(|&x| close(x, 60.0, tol)) {
        PathKind::FaceCentered
    } else if equal_abc && [alpha, beta, gamma].iter().all(|&x| close(x, bcc_angle, tol)) {
        PathKind::BodyCentered
    } else if equal_ab && right(alpha) && right(beta) && close(gamma, 120.0, tol) {
        PathKind::Hexagonal
    } else if equal_ab && all_right {
        PathKind::Tetragonal
    } else if all_right {
        PathKind::Orthorhombic
    } else {
        PathKind::Triclinic
    }
}

/// 标准高对称路径：每个子列表是一段连续路径
pub fn standard_path(kind: PathKind) -> Vec<Vec<Label>> {
    let h = 0.5;
    match kind {
        PathKind::Cubic => {
            let x = label("X", [0.0, h, 0.0]);
            let m = label("M", [h, h, 0.0]);
            let r = label("R", [h, h, h]);
            vec![
                vec![G, x.clone(), m.clone(), G, r.clone(), x],
                vec![m, r],
            ]
        }
        PathKind::FaceCentered => {
            let x = label("X", [h, 0.0, h]);
            let w = label("W", [h, 0.25, 0.75]);
            let k = label("K", [0.375, 0.375, 0.75]);
            let l = label("L", [h, h, h]);
            let u = label("U", [0.625, 0.25, 0.625]);
            vec![
                vec![G, x, w.clone(), k.clone(), G, l.clone(), u, w, l, k],
            ]
        }
        PathKind::BodyCentered => {
            let hh = label("H", [h, -h, h]);
            let n = label("N", [0.0, 0.0, h]);
            let p = label("P", [0.25, 0.25, 0.25]);
            vec![vec![G, hh.clone(), n.clone(), G, p.clone(), hh], vec![p, n]]
        }
        PathKind::Hexagonal => {
            let m = label("M", [h, 0.0, 0.0]);
            let k = label("K", [1.0 / 3.0, 1.0 / 3.0, 0.0]);
            let a = label("A", [0.0, 0.0, h]);
            let l = label("L", [h, 0.0, h]);
            let hh = label("H", [1.0 / 3.0, 1.0 / 3.0, h]);
            vec![
                vec![G, m.clone(), k.clone(), G, a.clone(), l.clone(), hh.clone(), a],
                vec![l, m],
                vec![k, hh],
            ]
        }
        PathKind::Tetragonal => {
            let x = label("X", [0.0, h, 0.0]);
            let m = label("M", [h, h, 0.0]);
            let z = label("Z", [0.0, 0.0, h]);
            let r = label("R", [0.0, h, h]);
            let a = label("A", [h, h, h]);
            vec![
                vec![G, x.clone(), m.clone(), G, z.clone(), r.clone(), a.clone(), z],
                vec![x, r],
                vec![m, a],
            ]
        }
        PathKind::Orthorhombic => {
            let x = label("X", [h, 0.0, 0.0]);
            let y = label("Y", [0.0, h, 0.0]);
            let z = label("Z", [0.0, 0.0, h]);
            let s = label("S", [h, h, 0.0]);
            let u = label("U", [h, 0.0, h]);
            let t = label("T", [0.0, h, h]);
            let r = label("R", [h, h, h]);
            vec![
                vec![G, x.clone(), s.clone(), y.clone(), G, z.clone(), u.clone(), r.clone(), t.clone(), z],
                vec![y, t],
                vec![u, x],
                vec![s, r],
            ]
        }
        PathKind::Triclinic => {
            let x = label("X", [h, 0.0, 0.0]);
            let y = label("Y", [0.0, h, 0.0]);
            let z = label("Z", [0.0, 0.0, h]);
            let l = label("L", [h, h, 0.0]);
            let m = label("M", [0.0, h, h]);
            let n = label("N", [h, 0.0, h]);
            let r = label("R", [h, h, h]);
            vec![
                vec![x, G, y],
                vec![l, G, z],
                vec![n, G, m],
                vec![r, G],
            ]
        }
    }
}

/// 能带路径中的一段
#[derive(Debug, Clone)]
pub struct Segment {
    pub start: Label,
    pub end: Label,
    pub qpoints: Vec<[f64; 3]>,
    /// 沿路径的累积距离 (Å⁻¹，不含 2π)
    pub distances: Vec<f64>,
}

/// 能带路径
#[derive(Debug, Clone)]
pub struct BandPath {
    pub kind: PathKind,
    pub segments: Vec<Segment>,
}

impl BandPath {
    pub fn n_qpoints(&self) -> usize {
        self.segments.iter().map(|s| s.qpoints.len()).sum()
    }

    /// 断点之间不累加距离
    pub fn total_distance(&self) -> f64 {
        self.segments
            .last()
            .and_then(|s| s.distances.last())
            .copied()
            .unwrap_or(0.0)
    }
}

/// 每段 `npoints` 个点 (含两端点)
pub fn band_path(lattice: &Lattice, npoints: usize) -> BandPath {
    let kind = classify(lattice);
    let recip = lattice.reciprocal();
    let npoints = npoints.max(2);

    let mut segments = Vec::new();
    let mut distance = 0.0;
    for branch in standard_path(kind) {
        for pair in branch.windows(2) {
            let (start, end) = (&pair[0], &pair[1]);
            let mut qpoints = Vec::with_capacity(npoints);
            let mut distances = Vec::with_capacity(npoints);
            let mut previous = start.q;
            for i in 0..npoints {
                let t = i as f64 / (npoints - 1) as f64;
                let q = [0, 1, 2].map(|k| start.q[k] + t * (end.q[k] - start.q[k]));
                let dq = [0, 1, 2].map(|k| q[k] - previous[k]);
                distance += norm(recip.frac_to_cart(dq));
                previous = q;
                qpoints.push(q);
                distances.push(distance);
            }
            segments.push(Segment {
                start: start.clone(),
                end: end.clone(),
                qpoints,
                distances,
            });
        }
    }
    BandPath { kind, segments }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::supercell::diagonal;

    #[test]
    fn test_monkhorst_pack() {
        let mesh = monkhorst_pack([2, 3, 4]);
        assert_eq!(mesh.len(), 24);
        assert_eq!(mesh[0], [-0.25, -1.0 / 3.0, -0.375]);
        // 偶数网格不含 Γ，奇数方向含 0
        assert!(mesh.iter().all(|q| q[0] != 0.0));
        assert!(mesh.iter().any(|q| q[1] == 0.0));
    }

    #[test]
    fn test_commensurate_points_diagonal() {
        let points = commensurate_points(&diagonal([3, 3, 3])).unwrap();
        assert_eq!(points.len(), 27);
        assert_eq!(points[0], [0.0, 0.0, 0.0]);
        assert!(points
            .iter()
            .all(|q| q.iter().all(|&x| (3.0 * x - (3.0 * x).round()).abs() < 1e-10)));
    }

    #[test]
    fn test_commensurate_points_general_matrix() {
        let matrix = [[-1, 1, 1], [1, -1, 1], [1, 1, -1]];
        let points = commensurate_points(&matrix).unwrap();
        assert_eq!(points.len(), 4);
        for q in &points {
            for row in &matrix {
                let m: f64 = (0..3).map(|k| row[k] as f64 * q[k]).sum();
                assert!((m - m.round()).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_classification() {
        let b = 1.8;
        let fcc = Lattice::from_vectors([[0.0, b, b], [b, 0.0, b], [b, b, 0.0]]);
        assert_eq!(classify(&fcc), PathKind::FaceCentered);
        let bcc = Lattice::from_vectors([[-b, b, b], [b, -b, b], [b, b, -b]]);
        assert_eq!(classify(&bcc), PathKind::BodyCentered);
        let hex = Lattice::from_parameters(3.2, 3.2, 5.2, 90.0, 90.0, 120.0);
        assert_eq!(classify(&hex), PathKind::Hexagonal);
        let cubic = Lattice::from_parameters(4.0, 4.0, 4.0, 90.0, 90.0, 90.0);
        assert_eq!(classify(&cubic), PathKind::Cubic);
        let rhombo = Lattice::from_parameters(4.7, 4.7, 4.7, 57.2, 57.2, 57.2);
        assert_eq!(classify(&rhombo), PathKind::Triclinic);
    }

    #[test]
    fn test_band_path_sampling() {
        let cubic = Lattice::from_parameters(4.0, 4.0, 4.0, 90.0, 90.0, 90.0);
        let path = band_path(&cubic, 11);
        // Γ-X-M-Γ-R-X | M-R
        assert_eq!(path.segments.len(), 6);
        assert_eq!(path.n_qpoints(), 66);
        let first = &path.segments[0];
        assert_eq!(first.qpoints[0], [0.0, 0.0, 0.0]);
        assert_eq!(first.qpoints[10], [0.0, 0.5, 0.0]);
        // Γ → X 长度 = 0.5 / a
        assert!((first.distances[10] - 0.125).abs() < 1e-12);
        // 断点处距离不增加
        let fifth = &path.segments[4];
        let sixth = &path.segments[5];
        assert_eq!(fifth.distances.last(), sixth.distances.first());
    }
}
