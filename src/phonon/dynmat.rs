//! # 动力学矩阵
//!
//! ```text
//! D_{pα,qβ}(q) = Σ_{j ∈ q} Φ_{pα,jβ} / √(m_p m_q) · (1/N_j) Σ_{images} exp(2πi q·r)
//! ```
//!
//! r 为原胞原子 p 到超胞原子 j 的最短镜像向量 (原胞分数坐标)，
//! 长度相同的镜像取平均。D 厄米化后求本征值 λ (eV/Å²/amu)，
//! 频率 ν = sign(λ)·√|λ|·15.633302 THz，虚频以负值表示。
//!
//! ## 依赖关系
//! - 被 `phonon/mod.rs` 使用
//! - 使用 `phonon/force_constants.rs`
//! - 使用 `nalgebra` 的复厄米本征分解

use super::force_constants::ForceConstants;
use crate::error::{CalcError, Result};
use crate::models::structure::norm;
use crate::models::supercell::Supercell;
use crate::models::Lattice;

use nalgebra::{Complex, DMatrix, SymmetricEigen};
use std::f64::consts::PI;

/// √(eV/Å²/amu) → THz
pub const VASP_TO_THZ: f64 = 15.633302;

/// 镜像长度比较容差 (Å)
const IMAGE_TOL: f64 = 1e-4;

/// 可在任意 q 点求频率的声子模型
#[derive(Debug, Clone)]
pub struct PhononModel {
    force_constants: ForceConstants,
    masses: Vec<f64>,
    /// 每个超胞原子对应的原胞原子
    prim_index: Vec<usize>,
    /// images[p][j]：最短镜像向量
    images: Vec<Vec<Vec<[f64; 3]>>>,
}

impl PhononModel {
    pub fn new(
        unit_lattice: &Lattice,
        supercell: &Supercell,
        force_constants: ForceConstants,
        masses: Vec<f64>,
    ) -> Result<Self> {
        let n_prim = force_constants.n_prim();
        if masses.len() != n_prim {
            return Err(CalcError::ForceConstantsError(format!(
                "{} masses for {} atoms",
                masses.len(),
                n_prim
            )));
        }

        let sc_lattice = &supercell.crystal.lattice;
        let frac = supercell.crystal.frac_positions();
        let images = (0..n_prim)
            .map(|p| {
                let origin = frac[supercell.index_of(p, 0)];
                frac.iter()
                    .map(|fj| shortest_images(sc_lattice, unit_lattice, origin, *fj))
                    .collect()
            })
            .collect();

        Ok(PhononModel {
            force_constants,
            masses,
            prim_index: supercell.prim_index.clone(),
            images,
        })
    }

    #[cfg(test)]
    pub fn n_bands(&self) -> usize {
        3 * self.masses.len()
    }

    /// q 为原胞倒格子分数坐标
    pub fn dynamical_matrix(&self, q: [f64; 3]) -> DMatrix<Complex<f64>> {
        let n = self.masses.len();
        let mut dm = DMatrix::<Complex<f64>>::zeros(3 * n, 3 * n);
        for p in 0..n {
            for (j, &qa) in self.prim_index.iter().enumerate() {
                let phi = self.force_constants.get(p, j);
                if phi.amax() == 0.0 {
                    continue;
                }
                let images = &self.images[p][j];
                let phase = images
                    .iter()
                    .map(|r| {
                        let arg = 2.0 * PI * (q[0] * r[0] + q[1] * r[1] + q[2] * r[2]);
                        Complex::new(arg.cos(), arg.sin())
                    })
                    .fold(Complex::new(0.0, 0.0), |acc, z| acc + z)
                    / images.len() as f64;
                let factor = phase / (self.masses[p] * self.masses[qa]).sqrt();
                for a in 0..3 {
                    for b in 0..3 {
                        dm[(3 * p + a, 3 * qa + b)] += factor * phi[(a, b)];
                    }
                }
            }
        }
        (&dm + dm.adjoint()) * Complex::new(0.5, 0.0)
    }

    /// 升序频率 (THz)
    pub fn frequencies(&self, q: [f64; 3]) -> Vec<f64> {
        let eigen = SymmetricEigen::new(self.dynamical_matrix(q));
        let mut freqs: Vec<f64> = eigen
            .eigenvalues
            .iter()
            .map(|&lambda| {
                let nu = lambda.abs().sqrt() * VASP_TO_THZ;
                if lambda < 0.0 {
                    -nu
                } else {
                    nu
                }
            })
            .collect();
        freqs.sort_by(|a, b| a.total_cmp(b));
        freqs
    }
}

/// 超胞内 a → b 的全部最短镜像，返回原胞分数坐标
fn shortest_images(
    sc_lattice: &Lattice,
    unit_lattice: &Lattice,
    a: [f64; 3],
    b: [f64; 3],
) -> Vec<[f64; 3]> {
    let base = [0, 1, 2].map(|k| {
        let d = b[k] - a[k];
        d - d.round()
    });

    let mut candidates = Vec::with_capacity(125);
    for i in -2..=2 {
        for j in -2..=2 {
            for k in -2..=2 {
                let shifted = [base[0] + i as f64, base[1] + j as f64, base[2] + k as f64];
                let cart = sc_lattice.frac_to_cart(shifted);
                candidates.push((norm(cart), cart));
            }
        }
    }
    let shortest = candidates
        .iter()
        .map(|(len, _)| *len)
        .fold(f64::INFINITY, f64::min);

    candidates
        .into_iter()
        .filter(|(len, _)| *len < shortest + IMAGE_TOL)
        .map(|(_, cart)| unit_lattice.cart_to_frac(cart))
        .collect()
}
