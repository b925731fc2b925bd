//! # 声子数据导出
//!
//! - `<base>_band.yaml`：能带数据 (YAML，字段沿用常见声子程序的 band.yaml 布局)
//! - `<base>_band.dat`：纯文本能带，每行 `distance freq_1 … freq_n`，段间空行
//! - `<base>_thermal.csv`：temperature, free_energy, entropy, heat_capacity
//!
//! ## 依赖关系
//! - 被 `phonon/mod.rs` 调用
//! - 使用 `serde_yaml` 写 YAML，`csv` 写热力学表

use super::BandStructure;
use crate::error::{CalcError, Result};
use crate::models::{Crystal, ThermalPoint};

use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

#[derive(Serialize)]
struct BandYaml<'a> {
    nqpoint: usize,
    npath: usize,
    segment_nqpoint: Vec<usize>,
    labels: Vec<[&'a str; 2]>,
    reciprocal_lattice: [[f64; 3]; 3],
    natom: usize,
    lattice: [[f64; 3]; 3],
    points: Vec<YamlAtom<'a>>,
    phonon: Vec<YamlQpoint<'a>>,
}

#[derive(Serialize)]
struct YamlAtom<'a> {
    symbol: &'a str,
    coordinates: [f64; 3],
    mass: f64,
}

#[derive(Serialize)]
struct YamlQpoint<'a> {
    #[serde(rename = "q-position")]
    q_position: [f64; 3],
    distance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<&'a str>,
    band: Vec<YamlBand>,
}

#[derive(Serialize)]
struct YamlBand {
    frequency: f64,
}

/// 写出 band.yaml
pub fn write_band_yaml(
    bands: &BandStructure,
    unit: &Crystal,
    masses: &[f64],
    path: &Path,
) -> Result<()> {
    let segments = &bands.path.segments;
    let mut phonon = Vec::with_capacity(bands.path.n_qpoints());
    for (segment, freqs) in segments.iter().zip(&bands.frequencies) {
        let last = segment.qpoints.len().saturating_sub(1);
        for (i, ((q, d), f)) in segment
            .qpoints
            .iter()
            .zip(&segment.distances)
            .zip(freqs)
            .enumerate()
        {
            let label = match i {
                0 => Some(segment.start.name),
                i if i == last => Some(segment.end.name),
                _ => None,
            };
            phonon.push(YamlQpoint {
                q_position: *q,
                distance: *d,
                label,
                band: f.iter().map(|&frequency| YamlBand { frequency }).collect(),
            });
        }
    }

    let doc = BandYaml {
        nqpoint: phonon.len(),
        npath: segments.len(),
        segment_nqpoint: segments.iter().map(|s| s.qpoints.len()).collect(),
        labels: segments.iter().map(|s| [s.start.name, s.end.name]).collect(),
        reciprocal_lattice: unit.lattice.reciprocal().matrix,
        natom: unit.len(),
        lattice: unit.lattice.matrix,
        points: unit
            .atoms
            .iter()
            .zip(unit.frac_positions())
            .zip(masses)
            .map(|((atom, coordinates), &mass)| YamlAtom {
                symbol: &atom.element,
                coordinates,
                mass,
            })
            .collect(),
        phonon,
    };

    let content = serde_yaml::to_string(&doc)?;
    fs::write(path, content).map_err(|e| CalcError::write(path, e))
}

/// 写出 band.dat
pub fn write_band_dat(bands: &BandStructure, name: &str, path: &Path) -> Result<()> {
    let mut out = String::new();
    let labels: Vec<String> = bands
        .path
        .segments
        .iter()
        .map(|s| format!("{}-{}", s.start.name, s.end.name))
        .collect();
    let _ = writeln!(out, "# Phonon band structure: {}", name);
    let _ = writeln!(out, "# Path: {}", labels.join(" "));
    let _ = writeln!(out, "# distance (1/A)  frequencies (THz)");

    for (k, (segment, freqs)) in bands.path.segments.iter().zip(&bands.frequencies).enumerate() {
        if k > 0 {
            out.push('\n');
        }
        for (d, f) in segment.distances.iter().zip(freqs) {
            let _ = write!(out, "{:12.8}", d);
            for nu in f {
                let _ = write!(out, " {:15.8}", nu);
            }
            out.push('\n');
        }
    }

    fs::write(path, out).map_err(|e| CalcError::write(path, e))
}

/// 写出热力学表
pub fn write_thermal_csv(points: &[ThermalPoint], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for point in points {
        wtr.serialize(point)?;
    }
    wtr.flush().map_err(|e| CalcError::write(path, e))
}
