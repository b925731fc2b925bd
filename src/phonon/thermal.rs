//! # 谐振热力学量
//!
//! 对网格上所有模式等权求和 (每个 q 点权重 1/N_q)，x = hν / k_B T：
//!
//! ```text
//! F  = Σ [hν/2 + k_B T ln(1 - e^{-x})]
//! S  = Σ k_B [x / (e^x - 1) - ln(1 - e^{-x})]
//! Cv = Σ k_B x² e^{-x} / (1 - e^{-x})²
//! ```
//!
//! 低于截断频率的模式 (含虚频) 不参与求和；T = 0 时 F 为零点能，S = Cv = 0。
//! 单位：F 为 kJ/mol，S 与 Cv 为 J/K/mol。
//!
//! ## 依赖关系
//! - 被 `phonon/mod.rs` 使用
//! - 使用 `models/results.rs` 的 ThermalPoint

use crate::models::ThermalPoint;

pub const THZ_TO_EV: f64 = 0.00413566733;
pub const KB: f64 = 8.6173303e-5;
pub const EV_TO_KJMOL: f64 = 96.4853910;
/// 1 THz 对应的温度 (K)
pub const THZ_TO_K: f64 = 47.9924;

/// 计算各温度下的热力学量
///
/// `frequencies[i]` 为第 i 个 q 点的全部频率 (THz)
pub fn thermal_properties(
    frequencies: &[Vec<f64>],
    temperatures: &[f64],
    cutoff: f64,
) -> Vec<ThermalPoint> {
    let weight = 1.0 / frequencies.len().max(1) as f64;
    let energies: Vec<f64> = frequencies
        .iter()
        .flatten()
        .filter(|&&nu| nu > cutoff)
        .map(|nu| nu * THZ_TO_EV)
        .collect();

    temperatures
        .iter()
        .map(|&t| {
            let (f, s, cv) = if t > 0.0 {
                let kt = KB * t;
                energies.iter().fold((0.0, 0.0, 0.0), |(f, s, cv), &e| {
                    let x = e / kt;
                    let boltzmann = (-x).exp();
                    (
                        f + e / 2.0 + kt * (-boltzmann).ln_1p(),
                        s + KB * (x / x.exp_m1() - (-boltzmann).ln_1p()),
                        cv + KB * x * x * boltzmann / (1.0 - boltzmann).powi(2),
                    )
                })
            } else {
                (energies.iter().map(|e| e / 2.0).sum(), 0.0, 0.0)
            };
            ThermalPoint {
                temperature: t,
                free_energy: f * weight * EV_TO_KJMOL,
                entropy: s * weight * EV_TO_KJMOL * 1000.0,
                heat_capacity: cv * weight * EV_TO_KJMOL * 1000.0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAS_CONSTANT: f64 = KB * EV_TO_KJMOL * 1000.0;

    #[test]
    fn test_classical_limit() {
        // 3 个 1 THz 模式，高温 Cv → 3R
        let freqs = vec![vec![1.0, 1.0, 1.0]];
        let point = thermal_properties(&freqs, &[3000.0], 1e-4)[0];
        assert!((point.heat_capacity - 3.0 * GAS_CONSTANT).abs() < 1e-3);
        assert!(point.entropy > 0.0);
        assert!(point.free_energy < 0.0);
    }

    #[test]
    fn test_zero_temperature_is_zero_point_energy() {
        let freqs = vec![vec![2.0, 4.0], vec![2.0, 4.0]];
        let point = thermal_properties(&freqs, &[0.0], 1e-4)[0];
        let zpe = (2.0 + 4.0) / 2.0 * THZ_TO_EV * EV_TO_KJMOL;
        assert!((point.free_energy - zpe).abs() < 1e-12);
        assert_eq!(point.entropy, 0.0);
        assert_eq!(point.heat_capacity, 0.0);
    }

    #[test]
    fn test_imaginary_and_zero_modes_are_skipped() {
        let freqs = vec![vec![-1.5, 0.0, 0.0]];
        let points = thermal_properties(&freqs, &[300.0, 600.0], 1e-4);
        assert_eq!(points.len(), 2);
        for p in points {
            assert_eq!(p.free_energy, 0.0);
            assert_eq!(p.entropy, 0.0);
            assert_eq!(p.heat_capacity, 0.0);
        }
    }

    #[test]
    fn test_entropy_matches_free_energy_derivative() {
        let freqs = vec![vec![3.0, 5.0, 7.5]];
        let h = 0.01;
        let t = 300.0;
        let at = |t: f64| thermal_properties(&freqs, &[t], 1e-4)[0];
        // S = -dF/dT，F 为 kJ/mol，S 为 J/K/mol
        let numeric = -(at(t + h).free_energy - at(t - h).free_energy) / (2.0 * h) * 1000.0;
        assert!((at(t).entropy - numeric).abs() < 1e-5);
    }
}
