//! # BFGS 准牛顿步
//!
//! 对 3N 维原子坐标维护近似 Hessian H (初值 α·I)：
//!
//! ```text
//! Δx = x - x₀,  Δf = f - f₀
//! H ← H - Δf Δfᵀ / (Δx·Δf) - (HΔx)(HΔx)ᵀ / (Δx·HΔx)
//! ```
//!
//! 最大坐标变化小于 1e-7 时跳过更新。步长由 H 的本征分解给出
//! `dx = V (Vᵀ f) / |ω|`，若某原子位移超过 `max_step`，整步等比缩小。
//!
//! ## 依赖关系
//! - 被 `optimize/mod.rs` 使用
//! - 使用 `nalgebra` 的 DMatrix / SymmetricEigen

use nalgebra::{DMatrix, DVector, SymmetricEigen};

const UPDATE_THRESHOLD: f64 = 1e-7;

/// 本征值绝对值的下限，避免零曲率方向给出无穷大步长
const MIN_CURVATURE: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct Bfgs {
    hessian: DMatrix<f64>,
    max_step: f64,
    /// 上一步的 (坐标, 受力)
    previous: Option<(DVector<f64>, DVector<f64>)>,
}

fn flatten(v: &[[f64; 3]]) -> DVector<f64> {
    DVector::from_iterator(v.len() * 3, v.iter().flatten().copied())
}

impl Bfgs {
    pub fn new(n_atoms: usize, initial_curvature: f64, max_step: f64) -> Self {
        Bfgs {
            hessian: DMatrix::identity(3 * n_atoms, 3 * n_atoms) * initial_curvature,
            max_step,
            previous: None,
        }
    }

    #[cfg(test)]
    pub fn hessian(&self) -> &DMatrix<f64> {
        &self.hessian
    }

    fn update(&mut self, x: &DVector<f64>, f: &DVector<f64>) {
        let Some((x0, f0)) = &self.previous else {
            return;
        };
        let dx = x - x0;
        if dx.amax() < UPDATE_THRESHOLD {
            return;
        }
        let df = f - f0;
        let a = dx.dot(&df);
        let dg = &self.hessian * &dx;
        let b = dx.dot(&dg);
        if a == 0.0 || b == 0.0 {
            return;
        }
        self.hessian -= &df * df.transpose() / a + &dg * dg.transpose() / b;
    }

    /// 给出下一步的原子位移 (Å)，并记录当前坐标和受力
    pub fn step(&mut self, positions: &[[f64; 3]], forces: &[[f64; 3]]) -> Vec<[f64; 3]> {
        let x = flatten(positions);
        let f = flatten(forces);
        self.update(&x, &f);

        let eigen = SymmetricEigen::new(self.hessian.clone());
        let v = &eigen.eigenvectors;
        let mut projected = v.transpose() * &f;
        for (p, omega) in projected.iter_mut().zip(eigen.eigenvalues.iter()) {
            *p /= omega.abs().max(MIN_CURVATURE);
        }
        let dx = v * projected;

        let mut displacement: Vec<[f64; 3]> = dx
            .as_slice()
            .chunks(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();

        let longest = displacement
            .iter()
            .map(|d| crate::models::structure::norm(*d))
            .fold(0.0, f64::max);
        if longest >= self.max_step {
            let factor = self.max_step / longest;
            for d in &mut displacement {
                for x in d.iter_mut() {
                    *x *= factor;
                }
            }
        }

        self.previous = Some((x, f));
        displacement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_step_is_steepest_descent() {
        let mut bfgs = Bfgs::new(1, 70.0, 0.2);
        let d = bfgs.step(&[[0.0; 3]], &[[0.7, 0.0, -0.35]]);
        assert!((d[0][0] - 0.01).abs() < 1e-12);
        assert!((d[0][2] + 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_step_is_capped() {
        let mut bfgs = Bfgs::new(2, 70.0, 0.2);
        let d = bfgs.step(&[[0.0; 3], [2.0, 0.0, 0.0]], &[[70.0, 0.0, 0.0], [7.0, 0.0, 0.0]]);
        // 整步缩放，方向不变
        assert!((d[0][0] - 0.2).abs() < 1e-12);
        assert!((d[1][0] - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_update_learns_curvature() {
        // 一维谐振子 f = -k x，k = 10
        let k = 10.0;
        let mut bfgs = Bfgs::new(1, 70.0, 1.0);
        let mut x = [0.5, 0.0, 0.0];
        for _ in 0..3 {
            let f = [-k * x[0], 0.0, 0.0];
            let d = bfgs.step(&[x], &[f]);
            x[0] += d[0][0];
        }
        assert!((bfgs.hessian()[(0, 0)] - k).abs() < 1e-8);
        assert!(x[0].abs() < 1e-8);
    }

    #[test]
    fn test_tiny_move_skips_update() {
        let mut bfgs = Bfgs::new(1, 70.0, 0.2);
        bfgs.step(&[[0.0; 3]], &[[0.0; 3]]);
        bfgs.step(&[[1e-9, 0.0, 0.0]], &[[1.0, 0.0, 0.0]]);
        assert_eq!(bfgs.hessian()[(0, 0)], 70.0);
    }
}
