//! # Lennard-Jones 势
//!
//! 内置 12-6 对势，用于离线计算和测试：
//!
//! E = Σ_{i<j} 4ε [(σ/r)¹² - (σ/r)⁶] - E(r_c)，r < r_c
//!
//! 能量在截断处平移为零。周期方向上对截断半径内的所有镜像求和，
//! 每个方向的镜像数为 ⌈r_c / d⌉ + 1，d 为该方向的晶面间距。
//!
//! 默认参数为氩：ε = 0.0104 eV，σ = 3.40 Å，r_c = 2.5σ。
//!
//! ## 依赖关系
//! - 被 `potential/mod.rs` 使用

use super::{Evaluation, Potential};
use crate::error::{CalcError, Result};
use crate::models::structure::{dot, norm};
use crate::models::Crystal;

/// 12-6 对势参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LennardJones {
    /// 势阱深度 (eV)
    pub epsilon: f64,
    /// 零点距离 (Å)
    pub sigma: f64,
    /// 截断半径 (Å)
    pub cutoff: f64,
}

impl Default for LennardJones {
    fn default() -> Self {
        LennardJones {
            epsilon: 0.0104,
            sigma: 3.40,
            cutoff: 2.5 * 3.40,
        }
    }
}

impl LennardJones {
    /// 解析 `lj` 或 `lj:epsilon=0.01,sigma=2.3,cutoff=6.0`；
    /// 只给 sigma 时截断半径取 2.5σ
    pub fn from_spec(spec: &str) -> Result<Self> {
        let mut lj = LennardJones::default();
        let mut cutoff = None;
        let options = spec.strip_prefix("lj").unwrap_or(spec);
        let options = options.strip_prefix(':').unwrap_or(options);

        for item in options.split(',').filter(|s| !s.trim().is_empty()) {
            let (key, value) = item.split_once('=').ok_or_else(|| {
                CalcError::InvalidArgument(format!("Invalid LJ option '{}'", item))
            })?;
            let value: f64 = value.trim().parse().map_err(|_| {
                CalcError::InvalidArgument(format!("Invalid LJ value '{}'", item))
            })?;
            if !(value > 0.0) || !value.is_finite() {
                return Err(CalcError::InvalidArgument(format!(
                    "LJ option '{}' must be positive",
                    item
                )));
            }
            match key.trim() {
                "epsilon" => lj.epsilon = value,
                "sigma" => lj.sigma = value,
                "cutoff" => cutoff = Some(value),
                other => {
                    return Err(CalcError::InvalidArgument(format!(
                        "Unknown LJ option '{}'",
                        other
                    )))
                }
            }
        }
        lj.cutoff = cutoff.unwrap_or(2.5 * lj.sigma);
        Ok(lj)
    }

    /// 对能量 (未平移) 与 dE/dr
    fn pair(&self, r: f64) -> (f64, f64) {
        let sr6 = (self.sigma / r).powi(6);
        let sr12 = sr6 * sr6;
        let energy = 4.0 * self.epsilon * (sr12 - sr6);
        let de_dr = 4.0 * self.epsilon * (-12.0 * sr12 + 6.0 * sr6) / r;
        (energy, de_dr)
    }
}

impl Potential for LennardJones {
    fn describe(&self) -> String {
        format!(
            "lennard-jones (epsilon={}, sigma={}, cutoff={})",
            self.epsilon, self.sigma, self.cutoff
        )
    }

    fn compute(&self, crystal: &Crystal) -> Result<Evaluation> {
        let n = crystal.len();
        let lattice = &crystal.lattice;
        let recip = lattice.reciprocal();
        let rc = self.cutoff;
        let (shift, _) = self.pair(rc);

        let mut images = [0i32; 3];
        for k in 0..3 {
            if crystal.pbc[k] {
                images[k] = (rc * norm(recip.matrix[k])).ceil() as i32 + 1;
            }
        }

        let frac = crystal.frac_positions();
        let mut energy = 0.0;
        let mut forces = vec![[0.0; 3]; n];

        for i in 0..n {
            for j in 0..n {
                // 最近镜像的分数坐标差
                let mut d = [0.0; 3];
                for k in 0..3 {
                    d[k] = frac[j][k] - frac[i][k];
                    if crystal.pbc[k] {
                        d[k] -= d[k].round();
                    }
                }
                for n0 in -images[0]..=images[0] {
                    for n1 in -images[1]..=images[1] {
                        for n2 in -images[2]..=images[2] {
                            if i == j && n0 == 0 && n1 == 0 && n2 == 0 {
                                continue;
                            }
                            let rvec = if crystal.pbc.iter().any(|&p| p) {
                                lattice.frac_to_cart([
                                    d[0] + n0 as f64,
                                    d[1] + n1 as f64,
                                    d[2] + n2 as f64,
                                ])
                            } else {
                                let a = crystal.atoms[i].position;
                                let b = crystal.atoms[j].position;
                                [b[0] - a[0], b[1] - a[1], b[2] - a[2]]
                            };
                            let r2 = dot(rvec, rvec);
                            if r2 >= rc * rc {
                                continue;
                            }
                            let r = r2.sqrt();
                            if r < 1e-8 {
                                return Err(CalcError::EvaluationError(format!(
                                    "atoms {} and {} overlap",
                                    i, j
                                )));
                            }
                            let (e, de_dr) = self.pair(r);
                            energy += 0.5 * (e - shift);
                            for k in 0..3 {
                                forces[i][k] += de_dr * rvec[k] / r;
                            }
                        }
                    }
                }
            }
        }

        Ok(Evaluation { energy, forces })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};

    fn molecule(r: f64) -> Crystal {
        let mut c = Crystal::new(
            "Ar2",
            Lattice::from_vectors([[0.0; 3]; 3]),
            vec![Atom::new("Ar", [0.0; 3]), Atom::new("Ar", [r, 0.0, 0.0])],
        );
        c.pbc = [false; 3];
        c
    }

    #[test]
    fn test_parse_spec() {
        let lj = LennardJones::from_spec("lj:epsilon=0.02,sigma=2.0").unwrap();
        assert_eq!(lj.epsilon, 0.02);
        assert_eq!(lj.cutoff, 5.0);
        assert_eq!(LennardJones::from_spec("lj").unwrap(), LennardJones::default());
        assert!(LennardJones::from_spec("lj:gamma=1").is_err());
        assert!(LennardJones::from_spec("lj:sigma=-1").is_err());
    }

    #[test]
    fn test_dimer_minimum() {
        let lj = LennardJones::default();
        let r_min = 2f64.powf(1.0 / 6.0) * lj.sigma;
        let eval = lj.compute(&molecule(r_min)).unwrap();
        assert!(eval.max_force() < 1e-12);
        let (shift, _) = lj.pair(lj.cutoff);
        assert!((eval.energy - (-lj.epsilon - shift)).abs() < 1e-12);
    }

    #[test]
    fn test_forces_match_finite_difference() {
        let lj = LennardJones::default();
        let r = 3.6;
        let h = 1e-5;
        let eval = lj.compute(&molecule(r)).unwrap();
        let ep = lj.compute(&molecule(r + h)).unwrap().energy;
        let em = lj.compute(&molecule(r - h)).unwrap().energy;
        // 原子 1 的受力 = -dE/dx1
        let numeric = -(ep - em) / (2.0 * h);
        assert!((eval.forces[1][0] - numeric).abs() < 1e-7);
        // 牛顿第三定律
        assert!((eval.forces[0][0] + eval.forces[1][0]).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_fcc_has_zero_force() {
        let a = 5.26;
        let h = a / 2.0;
        let crystal = Crystal::new(
            "Ar",
            Lattice::from_vectors([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]]),
            vec![
                Atom::new("Ar", [0.0, 0.0, 0.0]),
                Atom::new("Ar", [0.0, h, h]),
                Atom::new("Ar", [h, 0.0, h]),
                Atom::new("Ar", [h, h, 0.0]),
            ],
        );
        let eval = LennardJones::default().compute(&crystal).unwrap();
        assert!(eval.max_force() < 1e-10);
        assert!(eval.energy < 0.0);
    }
}
