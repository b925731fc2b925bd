//! # 表面切割
//!
//! 沿 Miller 指数 (h k l) 切割体相晶胞，得到 `layers` 层的平板：
//! 1. 用扩展欧几里得算法求出面内两个最短整数基矢 c1、c2 与面外基矢 c3；
//! 2. 把原子变换到新基矢下并折回单胞；
//! 3. 沿 c3 重复 `layers` 次，并把第三个晶格向量投影到表面法向；
//! 4. 旋转到 a 沿 x、法向沿 z 的取向，面内坐标折回 [0, 1)；
//! 5. 给出 `vacuum` 时两侧各加真空层。
//!
//! 平板的第三个晶格向量保持非零长度 (层厚)，这样不加真空的平板仍可写出、
//! 也可直接用于界面拼接。
//!
//! ## 依赖关系
//! - 被 `builder/mod.rs`, `builder/interface.rs` 使用
//! - 使用 `models/structure.rs`, `nalgebra`

use crate::error::{CalcError, Result};
use crate::models::structure::{cross, dot, norm, scale, sub};
use crate::models::{Crystal, Lattice};

use nalgebra::{Matrix3, Vector3};

const TOL: f64 = 1e-10;

/// 向负无穷取整的整数除法
fn floor_div(a: i64, b: i64) -> i64 {
    (a - floor_mod(a, b)) / b
}

/// 结果符号与除数相同的取模
fn floor_mod(a: i64, b: i64) -> i64 {
    ((a % b) + b) % b
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// 扩展欧几里得：返回 (x, y) 使 a x + b y = gcd(a, b)
pub fn ext_gcd(a: i64, b: i64) -> (i64, i64) {
    if b == 0 {
        (1, 0)
    } else if floor_mod(a, b) == 0 {
        (0, 1)
    } else {
        let (x, y) = ext_gcd(b, floor_mod(a, b));
        (y, x - y * floor_div(a, b))
    }
}

/// 表面基矢 (c1, c2, c3)，整数系数，行向量
pub fn surface_basis(lattice: &Lattice, miller: [i32; 3]) -> Result<[[i64; 3]; 3]> {
    if miller == [0, 0, 0] {
        return Err(CalcError::InvalidArgument(
            "Miller index must not be (0, 0, 0)".to_string(),
        ));
    }
    let [h, k, l] = miller.map(i64::from);
    let zeros = miller.iter().filter(|&&m| m == 0).count();

    if zeros == 2 {
        let basis = if h != 0 {
            [[0, 1, 0], [0, 0, 1], [1, 0, 0]]
        } else if k != 0 {
            [[0, 0, 1], [1, 0, 0], [0, 1, 0]]
        } else {
            [[1, 0, 0], [0, 1, 0], [0, 0, 1]]
        };
        return Ok(basis);
    }

    let (mut p, mut q) = ext_gcd(k, l);
    let [a1, a2, a3] = lattice.matrix;
    let (hf, kf, lf) = (h as f64, k as f64, l as f64);
    let v1 = sub(scale(a1, kf), scale(a2, hf));
    let v2 = sub(scale(a1, lf), scale(a3, hf));
    let v3 = sub(scale(a2, lf), scale(a3, kf));

    // c1 · c2 = k1 + i k2，选 i 使其最小
    let k1 = dot(
        [
            p as f64 * v1[0] + q as f64 * v2[0],
            p as f64 * v1[1] + q as f64 * v2[1],
            p as f64 * v1[2] + q as f64 * v2[2],
        ],
        v3,
    );
    let k2 = dot(sub(scale(v1, lf), scale(v2, kf)), v3);
    if k2.abs() > TOL {
        let i = -((k1 / k2).round_ties_even() as i64);
        p += i * l;
        q -= i * k;
    }

    let (a, b) = ext_gcd(p * k + q * l, h);
    let g = gcd(l, k);
    Ok([
        [p * k + q * l, -p * h, -q * h],
        [0, l / g, -k / g],
        [b, a * p, a * q],
    ])
}

/// 切割表面
pub fn surface(
    bulk: &Crystal,
    miller: [i32; 3],
    layers: usize,
    vacuum: Option<f64>,
) -> Result<Crystal> {
    if layers == 0 {
        return Err(CalcError::InvalidArgument(
            "layers must be a positive integer".to_string(),
        ));
    }
    if let Some(v) = vacuum {
        if !(v >= 0.0) {
            return Err(CalcError::InvalidArgument(format!(
                "vacuum must be non-negative, got {}",
                v
            )));
        }
    }

    let basis = surface_basis(&bulk.lattice, miller)?;
    let b = Matrix3::from_fn(|i, j| basis[i][j] as f64);
    let bt_inv = b.transpose().try_inverse().ok_or_else(|| {
        CalcError::GeometryError(format!("degenerate surface basis for {:?}", miller))
    })?;

    // 新基矢下的分数坐标，折回单胞
    let frac: Vec<[f64; 3]> = bulk
        .frac_positions()
        .iter()
        .map(|f| {
            let s = bt_inv * Vector3::new(f[0], f[1], f[2]);
            [
                s[0] - (s[0] + TOL).floor(),
                s[1] - (s[1] + TOL).floor(),
                s[2] - (s[2] + TOL).floor(),
            ]
        })
        .collect();

    let mut slab = bulk.clone();
    slab.lattice = Lattice::from_matrix(&(b * bulk.lattice.to_matrix()));
    slab.set_frac_positions(&frac);
    let mut slab = slab.repeat([1, 1, layers]);

    // 第三个晶格向量投影到表面法向
    let [a1, a2, a3] = slab.lattice.matrix;
    let n = cross(a1, a2);
    let n2 = dot(n, n);
    if n2 < TOL {
        return Err(CalcError::GeometryError(
            "surface vectors are collinear".to_string(),
        ));
    }
    slab.set_lattice(
        Lattice::from_vectors([a1, a2, scale(n, dot(a3, n) / n2)]),
        false,
    );

    // a 沿 x，法向沿 z
    let [a1, a2, a3] = slab.lattice.matrix;
    let x = dot(a1, a2) / norm(a1);
    let y = (dot(a2, a2) - x * x).max(0.0).sqrt();
    slab.set_lattice(
        Lattice::from_vectors([[norm(a1), 0.0, 0.0], [x, y, 0.0], [0.0, 0.0, norm(a3)]]),
        true,
    );
    slab.pbc = [true, true, false];
    slab.wrap([true, true, false]);

    if let Some(v) = vacuum {
        slab.center_along(2, v);
    }
    slab.validate()?;
    Ok(slab)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::bulk::{bulk, CrystalSpec};
    use crate::models::CrystalFamily;

    #[test]
    fn test_ext_gcd() {
        for (a, b) in [(3i64, 5i64), (4, 6), (-2, 3), (1, 1), (0, 7), (5, -3)] {
            let (x, y) = ext_gcd(a, b);
            assert_eq!((a * x + b * y).abs(), gcd(a, b), "a={} b={}", a, b);
        }
    }

    #[test]
    fn test_python_style_division() {
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(floor_mod(-7, 2), 1);
        assert_eq!(floor_mod(7, -2), -1);
    }

    #[test]
    fn test_fcc_primitive_100_slab() {
        // Miller 指数相对原胞晶格：原胞 (100) 即立方 {111} 面
        let cu = bulk(&CrystalSpec::new("Cu", CrystalFamily::Fcc).with_a(3.6)).unwrap();
        let slab = surface(&cu, [1, 0, 0], 4, Some(10.0)).unwrap();
        assert_eq!(slab.len(), 4);
        assert_eq!(slab.pbc, [true, true, false]);
        let m = slab.lattice.matrix;
        // 法向沿 z，a 沿 x
        assert!(m[2][0].abs() < 1e-12 && m[2][1].abs() < 1e-12);
        assert!(m[0][1].abs() < 1e-12 && m[0][2].abs() < 1e-12);
        let (_, _, _, _, _, gamma) = slab.lattice.parameters();
        assert!((gamma - 60.0).abs() < 1e-9);
        // 两侧真空各 10 Å
        let (lo, hi) = slab.coordinate_range(2);
        assert!((lo - 10.0).abs() < 1e-9);
        assert!((m[2][2] - hi - 10.0).abs() < 1e-9);
        // 层间距 a/√3
        assert!((hi - lo - 3.0 * 3.6 / 3f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_fcc_111_slab_in_plane_cell() {
        let cu = bulk(&CrystalSpec::new("Cu", CrystalFamily::Fcc).with_a(3.6)).unwrap();
        let slab = surface(&cu, [1, 1, 1], 3, Some(5.0)).unwrap();
        assert_eq!(slab.len(), 3);
        let (a, b, _, _, _, gamma) = slab.lattice.parameters();
        let nn = 3.6 / 2f64.sqrt();
        assert!((a - nn).abs() < 1e-9 && (b - nn).abs() < 1e-9);
        assert!((gamma - 60.0).abs() < 1e-6 || (gamma - 120.0).abs() < 1e-6);
    }

    #[test]
    fn test_slab_without_vacuum_keeps_thickness() {
        let cu = bulk(&CrystalSpec::new("Cu", CrystalFamily::Fcc).with_a(3.6)).unwrap();
        let slab = surface(&cu, [1, 1, 0], 2, None).unwrap();
        assert!(slab.lattice.matrix[2][2] > 0.0);
        let expected = cu.lattice.volume().abs() * 2.0;
        assert!((slab.lattice.volume().abs() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_inputs() {
        let cu = bulk(&CrystalSpec::new("Cu", CrystalFamily::Fcc).with_a(3.6)).unwrap();
        assert!(matches!(
            surface(&cu, [0, 0, 0], 3, None).unwrap_err(),
            CalcError::InvalidArgument(_)
        ));
        assert!(surface(&cu, [1, 0, 0], 0, None).is_err());
    }
}
