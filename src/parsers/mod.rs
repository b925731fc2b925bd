//! # 解析器模块
//!
//! 结构文件读写，格式由扩展名决定：
//! - `.cif`
//! - `.vasp`、`.poscar`，以及无扩展名的 `POSCAR*` / `CONTCAR*`
//! - `.xyz`、`.extxyz`
//!
//! ## 依赖关系
//! - 被 `builder/`, `optimize/`, `phonon/`, `potential/` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: cif, poscar, xyz

pub mod cif;
pub mod poscar;
pub mod xyz;

use crate::error::{CalcError, Result};
use crate::models::Crystal;

use std::fs;
use std::path::Path;

/// 结构文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFormat {
    Cif,
    Poscar,
    ExtXyz,
}

impl StructureFormat {
    /// 从文件路径推断格式
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "cif" => Ok(StructureFormat::Cif),
            "vasp" | "poscar" => Ok(StructureFormat::Poscar),
            "xyz" | "extxyz" => Ok(StructureFormat::ExtXyz),
            _ => {
                // 可能是 POSCAR/CONTCAR (无扩展名)
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if name.starts_with("POSCAR") || name.starts_with("CONTCAR") {
                        return Ok(StructureFormat::Poscar);
                    }
                }
                Err(CalcError::UnsupportedFormat(format!(
                    "Cannot determine format for: {}",
                    path.display()
                )))
            }
        }
    }
}

/// 读取结构文件
pub fn read_structure(path: &Path) -> Result<Crystal> {
    if !path.exists() {
        return Err(CalcError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    match StructureFormat::from_path(path)? {
        StructureFormat::Cif => cif::parse_cif_file(path),
        StructureFormat::Poscar => poscar::parse_poscar_file(path),
        StructureFormat::ExtXyz => xyz::parse_xyz_file(path),
    }
}

/// 写出结构文件，必要时创建父目录
pub fn write_structure(path: &Path, crystal: &Crystal) -> Result<()> {
    let content = match StructureFormat::from_path(path)? {
        StructureFormat::Cif => cif::to_cif_string(crystal),
        StructureFormat::Poscar => poscar::to_poscar_string(crystal),
        StructureFormat::ExtXyz => xyz::to_xyz_string(crystal),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CalcError::write(parent, e))?;
    }
    fs::write(path, content).map_err(|e| CalcError::write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_format_detection() {
        let cases = [
            ("a.cif", StructureFormat::Cif),
            ("a.CIF", StructureFormat::Cif),
            ("Si.vasp", StructureFormat::Poscar),
            ("POSCAR_relaxed", StructureFormat::Poscar),
            ("CONTCAR", StructureFormat::Poscar),
            ("traj.extxyz", StructureFormat::ExtXyz),
        ];
        for (name, fmt) in cases {
            assert_eq!(StructureFormat::from_path(&PathBuf::from(name)).unwrap(), fmt);
        }
        assert!(StructureFormat::from_path(&PathBuf::from("a.res")).is_err());
    }

    #[test]
    fn test_write_then_read_each_format() {
        let dir = tempdir().unwrap();
        let crystal = Crystal::new(
            "NaCl",
            Lattice::from_vectors([[5.6, 0.0, 0.0], [0.0, 5.6, 0.0], [0.0, 0.0, 5.6]]),
            vec![
                Atom::new("Na", [0.0, 0.0, 0.0]),
                Atom::new("Cl", [2.8, 2.8, 2.8]),
            ],
        );
        for name in ["out/s.cif", "s.vasp", "s.extxyz"] {
            let path = dir.path().join(name);
            write_structure(&path, &crystal).unwrap();
            let back = read_structure(&path).unwrap();
            assert_eq!(back.symbols(), vec!["Na", "Cl"]);
            assert!((back.lattice.volume() - crystal.lattice.volume()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_missing_file() {
        let err = read_structure(Path::new("/nonexistent/structure.cif")).unwrap_err();
        assert!(matches!(err, CalcError::FileNotFound { .. }));
    }
}
