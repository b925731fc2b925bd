//! # 惯用胞转换
//!
//! 原胞 → 惯用标准胞：
//! 1. 按结构族选取整数变换矩阵 P (面心 4 倍、体心 2 倍、菱方 → 六方 3 倍)；
//! 2. 用 P 构造超胞并去除重合位点；
//! 3. 检查新晶格的点群阶数不低于该晶系的全对称阶数；
//! 4. 旋转到标准取向 (a 沿 x，b 在 xy 平面内)，保持分数坐标。
//!
//! ## 依赖关系
//! - 被 `builder/mod.rs` 使用
//! - 使用 `models/supercell.rs`, `models/symmetry.rs`

use crate::error::{CalcError, Result};
use crate::models::structure::norm;
use crate::models::supercell::make_supercell;
use crate::models::symmetry::lattice_point_group;
use crate::models::{Crystal, CrystalFamily, Lattice};

use log::debug;

const FACE_CENTERED: [[i32; 3]; 3] = [[-1, 1, 1], [1, -1, 1], [1, 1, -1]];
const BODY_CENTERED: [[i32; 3]; 3] = [[0, 1, 1], [1, 0, 1], [1, 1, 0]];
const RHOMBOHEDRAL_TO_HEXAGONAL: [[i32; 3]; 3] = [[1, -1, 0], [0, 1, -1], [1, 1, 1]];
const IDENTITY: [[i32; 3]; 3] = [[1, 0, 0], [0, 1, 0], [0, 0, 1]];

/// 原胞到惯用胞的变换矩阵 (行向量约定)
pub fn transformation(family: CrystalFamily) -> [[i32; 3]; 3] {
    use CrystalFamily::*;
    match family {
        Fcc | Diamond | Zincblende | Rocksalt | Fluorite => FACE_CENTERED,
        Bcc | Bct => BODY_CENTERED,
        Rhombohedral => RHOMBOHEDRAL_TO_HEXAGONAL,
        Sc | CesiumChloride | Tetragonal | Orthorhombic | Mcl | Hcp | Wurtzite => IDENTITY,
    }
}

/// 转换为惯用标准胞
///
/// `tolerance` 为相对容差，同时用于重合位点判定 (× 最短晶格长度) 和点群检查。
pub fn conventional_cell(
    primitive: &Crystal,
    family: CrystalFamily,
    tolerance: f64,
) -> Result<Crystal> {
    let matrix = transformation(family);
    let supercell = make_supercell(primitive, matrix)?;
    let mut crystal = supercell.crystal;

    // 去除重合位点
    let lengths = crystal.lattice.lengths();
    let shortest = lengths.iter().cloned().fold(f64::INFINITY, f64::min);
    let site_tol = tolerance * shortest;
    let frac = crystal.frac_positions();
    let mut keep: Vec<usize> = Vec::with_capacity(crystal.len());
    for i in 0..crystal.len() {
        let duplicate = keep.iter().any(|&j| {
            if crystal.atoms[i].element != crystal.atoms[j].element {
                return false;
            }
            let mut d = [0.0; 3];
            for k in 0..3 {
                let x = frac[i][k] - frac[j][k];
                d[k] = x - x.round();
            }
            norm(crystal.lattice.frac_to_cart(d)) < site_tol
        });
        if !duplicate {
            keep.push(i);
        }
    }
    if keep.len() != crystal.len() {
        debug!(
            "Removed {} duplicate sites from conventional cell",
            crystal.len() - keep.len()
        );
        crystal.atoms = keep.iter().map(|&i| crystal.atoms[i].clone()).collect();
    }

    let order = lattice_point_group(&crystal.lattice, tolerance).len();
    if order < family.holohedry_order() {
        return Err(CalcError::GeometryError(format!(
            "conventional {} cell has a point group of order {}, expected {}",
            family,
            order,
            family.holohedry_order()
        )));
    }

    // 标准取向
    let (a, b, c, alpha, beta, gamma) = crystal.lattice.parameters();
    crystal.set_lattice(Lattice::from_parameters(a, b, c, alpha, beta, gamma), true);
    crystal.wrap([true; 3]);
    crystal.validate()?;
    Ok(crystal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::bulk::{bulk, CrystalSpec};

    #[test]
    fn test_fcc_conventional() {
        let prim = bulk(&CrystalSpec::new("Cu", CrystalFamily::Fcc).with_a(3.6)).unwrap();
        let conv = conventional_cell(&prim, CrystalFamily::Fcc, 1e-3).unwrap();
        assert_eq!(conv.len(), 4);
        assert!((conv.lattice.volume() - 3.6f64.powi(3)).abs() < 1e-9);
        let (a, b, c, alpha, _, _) = conv.lattice.parameters();
        assert!((a - 3.6).abs() < 1e-9 && (b - 3.6).abs() < 1e-9 && (c - 3.6).abs() < 1e-9);
        assert!((alpha - 90.0).abs() < 1e-9);
        // 标准取向：a 沿 x
        assert!(conv.lattice.matrix[0][1].abs() < 1e-12);
    }

    #[test]
    fn test_bcc_and_rocksalt_counts() {
        let fe = bulk(&CrystalSpec::new("Fe", CrystalFamily::Bcc)).unwrap();
        assert_eq!(conventional_cell(&fe, CrystalFamily::Bcc, 1e-3).unwrap().len(), 2);

        let nacl =
            bulk(&CrystalSpec::new("NaCl", CrystalFamily::Rocksalt).with_a(5.64)).unwrap();
        let conv = conventional_cell(&nacl, CrystalFamily::Rocksalt, 1e-3).unwrap();
        assert_eq!(conv.len(), 8);
        assert_eq!(conv.symbols().iter().filter(|s| *s == "Na").count(), 4);
    }

    #[test]
    fn test_rhombohedral_to_hexagonal() {
        let bi = bulk(&CrystalSpec::new("Bi", CrystalFamily::Rhombohedral)).unwrap();
        let conv = conventional_cell(&bi, CrystalFamily::Rhombohedral, 1e-3).unwrap();
        assert_eq!(conv.len(), 3);
        let (_, _, _, _, _, gamma) = conv.lattice.parameters();
        assert!((gamma - 120.0).abs() < 1e-6);
    }

    fn spec(
        material: &str,
        family: CrystalFamily,
        a: f64,
        b: Option<f64>,
        c: Option<f64>,
        alpha: Option<f64>,
    ) -> CrystalSpec {
        CrystalSpec {
            b,
            c,
            alpha,
            ..CrystalSpec::new(material, family).with_a(a)
        }
    }

    #[test]
    fn test_all_families_counts_and_volumes() {
        use CrystalFamily::*;

        let hex = |a: f64, c: f64| a * a * 3f64.sqrt() / 2.0 * c;
        let cos70 = 70f64.to_radians().cos();
        let rhombo = 4f64.powi(3) * (1.0 - 3.0 * cos70 * cos70 + 2.0 * cos70.powi(3)).sqrt();

        // (结构, 原胞原子数, 原胞体积, 惯用胞原子数, 惯用胞体积)
        let cases = [
            (spec("Po", Sc, 3.0, None, None, None), 1, 27.0, 1, 27.0),
            (spec("Cu", Fcc, 4.0, None, None, None), 1, 16.0, 4, 64.0),
            (spec("Fe", Bcc, 3.0, None, None, None), 1, 13.5, 2, 27.0),
            (spec("In", Tetragonal, 3.0, None, Some(4.0), None), 1, 36.0, 1, 36.0),
            (spec("Sn", Bct, 3.0, None, Some(5.0), None), 1, 22.5, 2, 45.0),
            (spec("Mg", Hcp, 3.0, None, Some(5.0), None), 2, hex(3.0, 5.0), 2, hex(3.0, 5.0)),
            (spec("Bi", Rhombohedral, 4.0, None, None, Some(70.0)), 1, rhombo, 3, 3.0 * rhombo),
            (spec("Ga", Orthorhombic, 3.0, Some(4.0), Some(5.0), None), 1, 60.0, 1, 60.0),
            (
                spec("Cu", Mcl, 3.0, Some(4.0), Some(5.0), Some(80.0)),
                1,
                60.0 * 80f64.to_radians().sin(),
                1,
                60.0 * 80f64.to_radians().sin(),
            ),
            (spec("Si", Diamond, 5.43, None, None, None), 2, 5.43f64.powi(3) / 4.0, 8, 5.43f64.powi(3)),
            (spec("GaAs", Zincblende, 5.65, None, None, None), 2, 5.65f64.powi(3) / 4.0, 8, 5.65f64.powi(3)),
            (spec("NaCl", Rocksalt, 5.64, None, None, None), 2, 5.64f64.powi(3) / 4.0, 8, 5.64f64.powi(3)),
            (spec("CsCl", CesiumChloride, 4.1, None, None, None), 2, 4.1f64.powi(3), 2, 4.1f64.powi(3)),
            (spec("CaF2", Fluorite, 5.46, None, None, None), 3, 5.46f64.powi(3) / 4.0, 12, 5.46f64.powi(3)),
            (spec("ZnO", Wurtzite, 3.25, None, Some(5.2), None), 4, hex(3.25, 5.2), 4, hex(3.25, 5.2)),
        ];
        assert_eq!(cases.len(), CrystalFamily::ALL.len());

        for (spec, n_prim, v_prim, n_conv, v_conv) in cases {
            let prim = bulk(&spec).unwrap();
            assert_eq!(prim.len(), n_prim, "{} primitive", spec.family);
            assert!(
                (prim.lattice.volume().abs() - v_prim).abs() < 1e-6 * v_prim,
                "{} primitive volume {} != {}",
                spec.family,
                prim.lattice.volume(),
                v_prim
            );

            let conv = conventional_cell(&prim, spec.family, 1e-3).unwrap();
            assert_eq!(conv.len(), n_conv, "{} conventional", spec.family);
            assert!(
                (conv.lattice.volume().abs() - v_conv).abs() < 1e-6 * v_conv,
                "{} conventional volume {} != {}",
                spec.family,
                conv.lattice.volume(),
                v_conv
            );
            // 化学计量不变
            assert_eq!(
                conv.len() * prim.symbols().iter().filter(|s| **s == prim.atoms[0].element).count(),
                prim.len() * conv.symbols().iter().filter(|s| **s == prim.atoms[0].element).count(),
            );
        }
    }

    #[test]
    fn test_hcp_is_unchanged() {
        let mg = bulk(&CrystalSpec::new("Mg", CrystalFamily::Hcp)).unwrap();
        let conv = conventional_cell(&mg, CrystalFamily::Hcp, 1e-3).unwrap();
        assert_eq!(conv.len(), 2);
        assert!((conv.lattice.volume() - mg.lattice.volume()).abs() < 1e-9);
    }
}
