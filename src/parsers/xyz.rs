//! # 扩展 XYZ 格式读写
//!
//! 每一帧：
//! ```text
//! N
//! Lattice="ax ay az bx by bz cx cy cz" Properties=species:S:1:pos:R:3:forces:R:3 energy=-3.72 pbc="T T T"
//! Cu  0.000  0.000  0.000  0.001 -0.002  0.000
//! ```
//!
//! 没有 `Lattice` 的普通 XYZ 文件读为非周期结构。优化轨迹按帧追加写入。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs`, `potential/external.rs`, `optimize/` 使用
//! - 使用 `models/structure.rs`

use crate::error::{CalcError, Result};
use crate::models::{Atom, Crystal, Lattice};

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// 一帧构型及其可选的能量和受力
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub crystal: Crystal,
    /// 势能 (eV)
    pub energy: Option<f64>,
    /// 原子受力 (eV/Å)
    pub forces: Option<Vec<[f64; 3]>>,
}

impl Frame {
    pub fn new(crystal: Crystal) -> Self {
        Frame {
            crystal,
            energy: None,
            forces: None,
        }
    }

    pub fn with_results(crystal: Crystal, energy: f64, forces: Vec<[f64; 3]>) -> Self {
        Frame {
            crystal,
            energy: Some(energy),
            forces: Some(forces),
        }
    }
}

fn parse_error(name: &str, reason: impl Into<String>) -> CalcError {
    CalcError::ParseError {
        format: "extxyz".to_string(),
        path: name.to_string(),
        reason: reason.into(),
    }
}

/// 解析 XYZ 文件，返回最后一帧
pub fn parse_xyz_file(path: &Path) -> Result<Crystal> {
    let content = fs::read_to_string(path).map_err(|e| CalcError::read(path, e))?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    parse_frames(&content, name)?
        .pop()
        .map(|f| f.crystal)
        .ok_or_else(|| parse_error(name, "No frames found"))
}

/// 注释行的 key=value 解析，值可以用双引号包裹
fn parse_comment(line: &str) -> Vec<(String, String)> {
    let chars: Vec<char> = line.chars().collect();
    let mut pairs = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let key_start = i;
        while i < chars.len() && chars[i] != '=' && !chars[i].is_whitespace() {
            i += 1;
        }
        let key: String = chars[key_start..i].iter().collect();
        if key.is_empty() {
            i += 1;
            continue;
        }
        if i >= chars.len() || chars[i] != '=' {
            // 无值的标志
            pairs.push((key, "T".to_string()));
            continue;
        }
        i += 1;
        let value: String = if i < chars.len() && chars[i] == '"' {
            i += 1;
            let start = i;
            while i < chars.len() && chars[i] != '"' {
                i += 1;
            }
            let v = chars[start..i].iter().collect();
            i += 1;
            v
        } else {
            let start = i;
            while i < chars.len() && !chars[i].is_whitespace() {
                i += 1;
            }
            chars[start..i].iter().collect()
        };
        pairs.push((key, value));
    }
    pairs
}

/// Properties 描述：(名称, 列数)
fn parse_properties(spec: &str) -> Option<Vec<(String, usize)>> {
    let fields: Vec<&str> = spec.split(':').collect();
    if fields.len() % 3 != 0 {
        return None;
    }
    fields
        .chunks(3)
        .map(|c| Some((c[0].to_lowercase(), c[2].parse().ok()?)))
        .collect()
}

fn parse_bool(s: &str) -> bool {
    matches!(s, "T" | "t" | "True" | "true" | "1")
}

/// 解析所有帧
pub fn parse_frames(content: &str, name: &str) -> Result<Vec<Frame>> {
    let lines: Vec<&str> = content.lines().collect();
    let mut frames = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        if lines[idx].trim().is_empty() {
            idx += 1;
            continue;
        }
        let n: usize = lines[idx].trim().parse().map_err(|_| {
            parse_error(name, format!("Invalid atom count at line {}", idx + 1))
        })?;
        let comment = lines.get(idx + 1).copied().unwrap_or("");
        let header = parse_comment(comment);
        let get = |key: &str| {
            header
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_str())
        };

        let lattice = match get("Lattice") {
            Some(v) => {
                let values: Vec<f64> = v
                    .split_whitespace()
                    .map(|s| s.parse::<f64>())
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|_| parse_error(name, "Invalid Lattice values"))?;
                if values.len() != 9 {
                    return Err(parse_error(name, "Lattice needs 9 values"));
                }
                Some(Lattice::from_vectors([
                    [values[0], values[1], values[2]],
                    [values[3], values[4], values[5]],
                    [values[6], values[7], values[8]],
                ]))
            }
            None => None,
        };
        let pbc = match (get("pbc"), &lattice) {
            (Some(v), _) => {
                let flags: Vec<bool> = v.split_whitespace().map(parse_bool).collect();
                if flags.len() != 3 {
                    return Err(parse_error(name, "pbc needs 3 flags"));
                }
                [flags[0], flags[1], flags[2]]
            }
            (None, Some(_)) => [true; 3],
            (None, None) => [false; 3],
        };
        let energy = match get("energy") {
            Some(v) => Some(
                v.parse::<f64>()
                    .map_err(|_| parse_error(name, format!("Invalid energy '{}'", v)))?,
            ),
            None => None,
        };
        let properties = match get("Properties") {
            Some(v) => parse_properties(v)
                .ok_or_else(|| parse_error(name, format!("Invalid Properties '{}'", v)))?,
            None => vec![("species".to_string(), 1), ("pos".to_string(), 3)],
        };

        let mut atoms = Vec::with_capacity(n);
        let mut forces: Vec<[f64; 3]> = Vec::new();
        let has_forces = properties.iter().any(|(p, _)| p == "forces");

        for k in 0..n {
            let line_no = idx + 2 + k;
            let line = lines.get(line_no).ok_or_else(|| {
                parse_error(name, format!("Expected {} atoms, file ends at line {}", n, line_no))
            })?;
            let cols: Vec<&str> = line.split_whitespace().collect();
            let mut col = 0;
            let mut species = None;
            let mut pos = None;
            for (prop, width) in &properties {
                let slice = cols.get(col..col + width).ok_or_else(|| {
                    parse_error(name, format!("Too few columns at line {}", line_no + 1))
                })?;
                match prop.as_str() {
                    "species" => species = Some(slice[0].to_string()),
                    "pos" | "forces" => {
                        let mut v = [0.0; 3];
                        for (d, s) in v.iter_mut().zip(slice) {
                            *d = s.parse().map_err(|_| {
                                parse_error(name, format!("Invalid number at line {}", line_no + 1))
                            })?;
                        }
                        if prop == "pos" {
                            pos = Some(v);
                        } else {
                            forces.push(v);
                        }
                    }
                    _ => {}
                }
                col += width;
            }
            match (species, pos) {
                (Some(s), Some(p)) => atoms.push(Atom::new(s, p)),
                _ => return Err(parse_error(name, "Properties lack species or pos")),
            }
        }

        let mut crystal = Crystal::new(
            name,
            lattice.unwrap_or_else(|| Lattice::from_vectors([[0.0; 3]; 3])),
            atoms,
        );
        crystal.pbc = pbc;
        crystal.validate()?;
        frames.push(Frame {
            crystal,
            energy,
            forces: has_forces.then_some(forces),
        });
        idx += 2 + n;
    }

    Ok(frames)
}

fn flag(b: bool) -> &'static str {
    if b {
        "T"
    } else {
        "F"
    }
}

/// 单帧文本
pub fn frame_to_string(frame: &Frame) -> String {
    let crystal = &frame.crystal;
    let m = crystal.lattice.matrix;
    let mut result = String::new();
    result.push_str(&format!("{}\n", crystal.len()));

    let mut comment = format!(
        "Lattice=\"{:.10} {:.10} {:.10} {:.10} {:.10} {:.10} {:.10} {:.10} {:.10}\" Properties=species:S:1:pos:R:3",
        m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2]
    );
    let forces = frame
        .forces
        .as_ref()
        .filter(|f| f.len() == crystal.len());
    if forces.is_some() {
        comment.push_str(":forces:R:3");
    }
    if let Some(e) = frame.energy {
        comment.push_str(&format!(" energy={:.10}", e));
    }
    comment.push_str(&format!(
        " pbc=\"{} {} {}\"",
        flag(crystal.pbc[0]),
        flag(crystal.pbc[1]),
        flag(crystal.pbc[2])
    ));
    result.push_str(&comment);
    result.push('\n');

    for (i, atom) in crystal.atoms.iter().enumerate() {
        let p = atom.position;
        result.push_str(&format!(
            "{:<3} {:16.10} {:16.10} {:16.10}",
            atom.element, p[0], p[1], p[2]
        ));
        if let Some(f) = forces {
            result.push_str(&format!(
                " {:16.10} {:16.10} {:16.10}",
                f[i][0], f[i][1], f[i][2]
            ));
        }
        result.push('\n');
    }
    result
}

/// 结构写为单帧扩展 XYZ
pub fn to_xyz_string(crystal: &Crystal) -> String {
    frame_to_string(&Frame::new(crystal.clone()))
}

/// 追加一帧到轨迹文件 (不存在时创建)
pub fn append_frame(path: &Path, frame: &Frame) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| CalcError::write(path, e))?;
    file.write_all(frame_to_string(frame).as_bytes())
        .map_err(|e| CalcError::write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dimer() -> Crystal {
        Crystal::new(
            "Ar2",
            Lattice::from_vectors([[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]]),
            vec![
                Atom::new("Ar", [0.0, 0.0, 0.0]),
                Atom::new("Ar", [3.8, 0.0, 0.0]),
            ],
        )
    }

    #[test]
    fn test_frame_with_energy_and_forces() {
        let frame = Frame::with_results(dimer(), -0.0104, vec![[0.1, 0.0, 0.0], [-0.1, 0.0, 0.0]]);
        let text = frame_to_string(&frame);
        let parsed = parse_frames(&text, "x").unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].energy, Some(-0.0104));
        let forces = parsed[0].forces.as_ref().unwrap();
        assert!((forces[1][0] + 0.1).abs() < 1e-12);
        assert_eq!(parsed[0].crystal.pbc, [true; 3]);
    }

    #[test]
    fn test_plain_xyz_is_molecule() {
        let text = "3\nwater\nO 0.0 0.0 0.0\nH 0.757 0.586 0.0\nH -0.757 0.586 0.0\n";
        let frames = parse_frames(text, "h2o").unwrap();
        let crystal = &frames[0].crystal;
        assert_eq!(crystal.len(), 3);
        assert_eq!(crystal.pbc, [false; 3]);
        assert!(frames[0].energy.is_none());
    }

    #[test]
    fn test_comment_quoting() {
        let pairs = parse_comment(r#"Lattice="1 0 0 0 1 0 0 0 1" energy=-2.5 pbc="T T F" flag"#);
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[0].1, "1 0 0 0 1 0 0 0 1");
        assert_eq!(pairs[2].1, "T T F");
        assert_eq!(pairs[3], ("flag".to_string(), "T".to_string()));
    }

    #[test]
    fn test_append_builds_trajectory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("traj.extxyz");
        let mut crystal = dimer();
        append_frame(&path, &Frame::new(crystal.clone())).unwrap();
        crystal.atoms[1].position[0] = 3.7;
        append_frame(&path, &Frame::new(crystal)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let frames = parse_frames(&content, "traj").unwrap();
        assert_eq!(frames.len(), 2);
        assert!((frames[1].crystal.atoms[1].position[0] - 3.7).abs() < 1e-10);
        assert!((parse_xyz_file(&path).unwrap().atoms[1].position[0] - 3.7).abs() < 1e-10);
    }

    #[test]
    fn test_truncated_frame_rejected() {
        assert!(parse_frames("2\n\nAr 0 0 0\n", "x").is_err());
    }
}
