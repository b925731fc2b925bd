//! # 界面拼接
//!
//! 两块不带真空的平板沿堆叠轴拼接：第二块平板的两个面内晶格向量缩放到与
//! 第一块一致 (原子按分数坐标跟随)，平移到第一块上方 `distance` 处，合并后
//! 沿堆叠轴居中并在两侧加真空。失配超过 `max_strain` 时拒绝构造。
//!
//! ## 依赖关系
//! - 被 `builder/mod.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{CalcError, Result};
use crate::models::structure::{norm, scale};
use crate::models::{Crystal, Lattice};

use log::debug;

/// 界面拼接参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackOptions {
    /// 堆叠轴 (0 = x, 1 = y, 2 = z)
    pub axis: usize,
    /// 两块平板之间的间距 (Å)
    pub distance: f64,
    /// 两侧真空 (Å)
    pub vacuum: f64,
    /// 允许的最大相对失配
    pub max_strain: f64,
}

/// 面内两个轴的相对失配 |l1 - l2| / mean(l1, l2)
pub fn lattice_strain(lower: &Crystal, upper: &Crystal, axis: usize) -> Result<[f64; 2]> {
    let in_plane = in_plane_axes(axis)?;
    let len1 = lower.lattice.lengths();
    let len2 = upper.lattice.lengths();
    Ok(in_plane.map(|i| (len1[i] - len2[i]).abs() / ((len1[i] + len2[i]) / 2.0)))
}

fn in_plane_axes(axis: usize) -> Result<[usize; 2]> {
    match axis {
        0 => Ok([1, 2]),
        1 => Ok([0, 2]),
        2 => Ok([0, 1]),
        _ => Err(CalcError::InvalidArgument(format!(
            "stack_axis must be 0, 1 or 2, got {}",
            axis
        ))),
    }
}

/// 拼接两块平板
pub fn stack(lower: &Crystal, upper: &Crystal, options: &StackOptions) -> Result<Crystal> {
    let axis = options.axis;
    let [axis1, axis2] = in_plane_axes(axis)?;
    if !(options.distance >= 0.0) || !(options.vacuum >= 0.0) {
        return Err(CalcError::InvalidArgument(
            "interface distance and vacuum must be non-negative".to_string(),
        ));
    }

    let [strain_a, strain_b] = lattice_strain(lower, upper, axis)?;
    debug!("Interface strain: a={:.4}, b={:.4}", strain_a, strain_b);
    if strain_a > options.max_strain || strain_b > options.max_strain {
        return Err(CalcError::LatticeMismatch { strain_a, strain_b });
    }

    // 只缩放第二块平板
    let len1 = lower.lattice.lengths();
    let len2 = upper.lattice.lengths();
    let mut matrix = upper.lattice.matrix;
    matrix[axis1] = scale(matrix[axis1], len1[axis1] / len2[axis1]);
    matrix[axis2] = scale(matrix[axis2], len1[axis2] / len2[axis2]);
    let mut upper = upper.clone();
    upper.set_lattice(Lattice::from_vectors(matrix), true);

    let (_, max1) = lower.coordinate_range(axis);
    let (min2, _) = upper.coordinate_range(axis);
    let mut shift = [0.0; 3];
    shift[axis] = max1 - min2 + options.distance;
    upper.translate(shift);

    let mut combined = lower.clone();
    combined.name = format!("{}-{}", lower.name, upper.name);
    combined.extend(&upper);
    combined.center_along(axis, options.vacuum);
    combined.pbc = [true; 3];
    combined.pbc[axis] = false;

    if norm(combined.lattice.matrix[axis]) < 1e-8 {
        return Err(CalcError::GeometryError(
            "stacking axis has zero length after centering".to_string(),
        ));
    }
    combined.validate()?;
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::bulk::{bulk, CrystalSpec};
    use crate::builder::surface::surface;
    use crate::models::CrystalFamily;

    fn slab(material: &str, a: f64, layers: usize) -> Crystal {
        let b = bulk(&CrystalSpec::new(material, CrystalFamily::Fcc).with_a(a)).unwrap();
        surface(&b, [1, 0, 0], layers, None).unwrap()
    }

    fn options() -> StackOptions {
        StackOptions {
            axis: 2,
            distance: 2.5,
            vacuum: 20.0,
            max_strain: 0.05,
        }
    }

    #[test]
    fn test_gap_equals_distance() {
        let lower = slab("Cu", 3.61, 4);
        let upper = slab("Ni", 3.52, 3);
        let combined = stack(&lower, &upper, &options()).unwrap();
        assert_eq!(combined.len(), 7);

        let z: Vec<f64> = combined.atoms.iter().map(|a| a.position[2]).collect();
        let top_lower = z[..4].iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let bottom_upper = z[4..].iter().cloned().fold(f64::INFINITY, f64::min);
        assert!((bottom_upper - top_lower - 2.5).abs() < 1e-9);
        // 两侧真空
        let (lo, hi) = combined.coordinate_range(2);
        assert!((lo - 20.0).abs() < 1e-9);
        assert!((combined.lattice.matrix[2][2] - hi - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_upper_matches_lower_in_plane() {
        let lower = slab("Cu", 3.61, 2);
        let upper = slab("Ni", 3.52, 2);
        let combined = stack(&lower, &upper, &options()).unwrap();
        let la = lower.lattice.lengths();
        let lc = combined.lattice.lengths();
        assert!((la[0] - lc[0]).abs() < 1e-12 && (la[1] - lc[1]).abs() < 1e-12);
    }

    #[test]
    fn test_mismatch_rejected() {
        let lower = slab("Cu", 3.61, 2);
        let upper = slab("Au", 4.08, 2);
        match stack(&lower, &upper, &options()).unwrap_err() {
            CalcError::LatticeMismatch { strain_a, strain_b } => {
                assert!(strain_a > 0.05 && strain_b > 0.05);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reproducible() {
        let lower = slab("Cu", 3.61, 3);
        let upper = slab("Ni", 3.52, 3);
        let first = stack(&lower, &upper, &options()).unwrap();
        let second = stack(&lower, &upper, &options()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_stacking_axis_is_not_periodic() {
        let cube = |material: &str, a: f64| {
            bulk(&CrystalSpec::new(material, CrystalFamily::Sc).with_a(a)).unwrap()
        };
        for axis in 0..3 {
            let opts = StackOptions { axis, ..options() };
            let combined = stack(&cube("Cu", 3.61), &cube("Ni", 3.52), &opts).unwrap();
            let mut expected = [true; 3];
            expected[axis] = false;
            assert_eq!(combined.pbc, expected);
            assert_eq!(combined.len(), 2);
        }
    }

    #[test]
    fn test_invalid_axis() {
        let s = slab("Cu", 3.61, 2);
        let mut opts = options();
        opts.axis = 3;
        assert!(matches!(
            stack(&s, &s, &opts).unwrap_err(),
            CalcError::InvalidArgument(_)
        ));
    }
}
