//! # 结构优化工具
//!
//! `optimize_crystal_structure`：固定晶胞，用 BFGS 弛豫原子坐标直到最大原子
//! 受力不超过 `force_tolerance`，或达到 `max_iterations` 步。
//!
//! 运行状态：
//! ```text
//! Loaded → Iterating → Converged | MaxIterationsReached → Written
//! ```
//!
//! 输出 (相对输出目录)：
//! - `<stem>_optimization_traj.extxyz`：初始帧 + 每步一帧，已存在时先删除
//! - `<stem>_optimized.cif`：最终结构
//!
//! 达到步数上限不是错误：结果 `converged = false`，能量有效，文件照常写出。
//!
//! ## 依赖关系
//! - 被 `tools/`, `commands/optimize.rs` 使用
//! - 子模块: bfgs
//! - 使用 `potential/` 计算能量与受力，`parsers/` 读写结构和轨迹

pub mod bfgs;

use crate::config::{Config, OptimizeSettings};
use crate::error::{CalcError, Result};
use crate::models::{Crystal, OptimizationResult};
use crate::parsers::{self, xyz};
use crate::potential::{Evaluation, ModelRef, Potential, PotentialProvider};

use bfgs::Bfgs;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 优化参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizeParams {
    /// 输入结构文件
    pub input_structure: PathBuf,
    /// 势函数模型 (本地路径、远程 URI 或 `lj:…`)
    pub model_path: String,
    /// 多任务模型的 head，缺省取配置中的默认值
    #[serde(default)]
    pub head: Option<String>,
    /// 力收敛判据 (eV/Å)
    #[serde(default = "default_force_tolerance")]
    pub force_tolerance: f64,
    /// 最大 BFGS 步数
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_force_tolerance() -> f64 {
    0.01
}

fn default_max_iterations() -> usize {
    100
}

impl OptimizeParams {
    pub fn new(input_structure: impl Into<PathBuf>, model_path: impl Into<String>) -> Self {
        OptimizeParams {
            input_structure: input_structure.into(),
            model_path: model_path.into(),
            head: None,
            force_tolerance: default_force_tolerance(),
            max_iterations: default_max_iterations(),
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.force_tolerance > 0.0) {
            return Err(CalcError::InvalidArgument(format!(
                "force_tolerance must be positive, got {}",
                self.force_tolerance
            )));
        }
        Ok(())
    }

    fn stem(&self) -> String {
        self.input_structure
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "structure".to_string())
    }
}

/// 优化运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Loaded,
    Iterating,
    Converged,
    MaxIterationsReached,
    Written,
}

/// 弛豫结果 (未写文件)
#[derive(Debug, Clone)]
pub struct Relaxation {
    pub crystal: Crystal,
    pub energy: f64,
    pub max_force: f64,
    pub steps: usize,
    pub state: RunState,
}

impl Relaxation {
    pub fn converged(&self) -> bool {
        self.state == RunState::Converged
    }
}

/// 用 BFGS 弛豫原子坐标；`trajectory` 给定时逐帧追加
pub fn relax(
    crystal: Crystal,
    potential: &dyn Potential,
    settings: &OptimizeSettings,
    force_tolerance: f64,
    max_iterations: usize,
    trajectory: Option<&Path>,
) -> Result<Relaxation> {
    let mut crystal = crystal;
    let mut bfgs = Bfgs::new(crystal.len(), settings.initial_curvature, settings.max_step);

    let record = |crystal: &Crystal, eval: &Evaluation| -> Result<()> {
        match trajectory {
            Some(path) => xyz::append_frame(
                path,
                &xyz::Frame::with_results(crystal.clone(), eval.energy, eval.forces.clone()),
            ),
            None => Ok(()),
        }
    };

    let mut eval = potential.compute(&crystal)?;
    record(&crystal, &eval)?;
    let mut steps = 0;
    debug!("State: {:?}", RunState::Iterating);

    let state = loop {
        let fmax = eval.max_force();
        debug!("BFGS step {:>4}: E = {:.6} eV, fmax = {:.6} eV/A", steps, eval.energy, fmax);
        if fmax <= force_tolerance {
            break RunState::Converged;
        }
        if steps >= max_iterations {
            break RunState::MaxIterationsReached;
        }

        let positions = crystal.positions();
        let displacement = bfgs.step(&positions, &eval.forces);
        let moved: Vec<[f64; 3]> = positions
            .iter()
            .zip(&displacement)
            .map(|(p, d)| crate::models::structure::add(*p, *d))
            .collect();
        crystal.set_positions(&moved);
        steps += 1;

        eval = potential.compute(&crystal)?;
        record(&crystal, &eval)?;
    };

    Ok(Relaxation {
        max_force: eval.max_force(),
        energy: eval.energy,
        crystal,
        steps,
        state,
    })
}

fn run(
    params: &OptimizeParams,
    config: &Config,
    provider: &dyn PotentialProvider,
) -> Result<OptimizationResult> {
    params.validate()?;
    let stem = params.stem();

    info!("Reading structure from: {}", params.input_structure.display());
    let crystal = parsers::read_structure(&params.input_structure)?;
    let potential = provider.load(&ModelRef {
        location: params.model_path.clone(),
        head: params.head.clone(),
    })?;
    debug!("State: {:?}", RunState::Loaded);

    let traj = config
        .output
        .resolve(Path::new(&format!("{}_optimization_traj.extxyz", stem)));
    if traj.exists() {
        warn!("Overwriting existing trajectory file: {}", traj.display());
        fs::remove_file(&traj).map_err(|e| CalcError::write(&traj, e))?;
    }
    if let Some(parent) = traj.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CalcError::write(parent, e))?;
    }

    info!("Starting structure optimization...");
    let relaxation = relax(
        crystal,
        potential.as_ref(),
        &config.optimize,
        params.force_tolerance,
        params.max_iterations,
        Some(&traj),
    )?;
    if !relaxation.converged() {
        warn!(
            "Optimization stopped after {} steps without reaching fmax <= {} (fmax = {:.4})",
            relaxation.steps, params.force_tolerance, relaxation.max_force
        );
    }

    let output = config
        .output
        .resolve(Path::new(&format!("{}_optimized.cif", stem)));
    parsers::write_structure(&output, &relaxation.crystal)?;
    debug!("State: {:?}", RunState::Written);

    info!(
        "Optimization completed in {} steps. Final energy: {:.4} eV",
        relaxation.steps, relaxation.energy
    );

    Ok(OptimizationResult {
        optimized_structure: output,
        optimization_traj: Some(traj),
        final_energy: relaxation.energy,
        converged: relaxation.converged(),
        steps: relaxation.steps,
        max_force: relaxation.max_force,
        message: format!("Successfully completed in {} steps", relaxation.steps),
        error: None,
    })
}

/// 优化结构并写出结果；任何失败都以失败结果返回
pub fn optimize_crystal_structure(
    params: &OptimizeParams,
    config: &Config,
    provider: &dyn PotentialProvider,
) -> OptimizationResult {
    run(params, config, provider).unwrap_or_else(|e| {
        error!("Optimization failed: {}", e);
        OptimizationResult::failure(&e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{Atom, Lattice};
    use crate::potential::testing::{FailAfter, Fixed, Flat, Harmonic};
    use std::sync::atomic::AtomicUsize;
    use tempfile::tempdir;

    fn dimer() -> Crystal {
        Crystal::new(
            "Ar2",
            Lattice::from_vectors([[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]]),
            vec![
                Atom::new("Ar", [1.0, 1.0, 1.0]),
                Atom::new("Ar", [4.5, 1.2, 0.8]),
            ],
        )
    }

    fn setup(dir: &Path) -> (OptimizeParams, Config) {
        let input = dir.join("dimer.cif");
        parsers::write_structure(&input, &dimer()).unwrap();
        let mut config = Config::default();
        config.output.directory = dir.join("out");
        (OptimizeParams::new(input, "model.pt"), config)
    }

    fn count_frames(path: &Path) -> usize {
        let content = fs::read_to_string(path).unwrap();
        xyz::parse_frames(&content, "traj").unwrap().len()
    }

    #[test]
    fn test_params_defaults_from_json() {
        let params: OptimizeParams =
            serde_json::from_str(r#"{"input_structure": "a.cif", "model_path": "m.pt"}"#)
                .unwrap();
        assert_eq!(params, OptimizeParams::new("a.cif", "m.pt"));
        assert_eq!(params.max_iterations, 100);
    }

    #[test]
    fn test_zero_force_converges_immediately() {
        let dir = tempdir().unwrap();
        let (params, config) = setup(dir.path());
        let provider = Fixed(|| Box::new(Flat { energy: -3.25 }) as Box<dyn Potential>);

        let result = optimize_crystal_structure(&params, &config, &provider);
        assert!(result.is_success(), "{}", result.message);
        assert!(result.converged);
        assert_eq!(result.steps, 0);
        assert_eq!(result.final_energy, -3.25);
        assert_eq!(result.message, "Successfully completed in 0 steps");
        assert!(result.optimized_structure.ends_with("out/dimer_optimized.cif"));
        assert!(result.optimized_structure.exists());
        assert_eq!(count_frames(result.optimization_traj.as_ref().unwrap()), 1);
    }

    #[test]
    fn test_harmonic_relaxes_to_targets() {
        let targets = vec![[1.1, 0.9, 1.0], [4.4, 1.0, 1.0]];
        let potential = Harmonic { k: 5.0, targets: targets.clone() };
        let relaxation = relax(
            dimer(),
            &potential,
            &OptimizeSettings::default(),
            1e-4,
            100,
            None,
        )
        .unwrap();
        assert!(relaxation.converged());
        assert!(relaxation.steps > 0 && relaxation.steps < 100);
        for (atom, t) in relaxation.crystal.atoms.iter().zip(&targets) {
            for k in 0..3 {
                assert!((atom.position[k] - t[k]).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_iteration_cap_is_not_an_error() {
        let dir = tempdir().unwrap();
        let (mut params, config) = setup(dir.path());
        params.max_iterations = 2;
        params.force_tolerance = 1e-12;
        let provider = Fixed(|| {
            Box::new(Harmonic {
                k: 0.5,
                targets: vec![[5.0, 5.0, 5.0], [8.0, 8.0, 8.0]],
            }) as Box<dyn Potential>
        });

        let result = optimize_crystal_structure(&params, &config, &provider);
        assert!(result.is_success());
        assert!(!result.converged);
        assert_eq!(result.steps, 2);
        assert!(result.final_energy > 0.0);
        assert!(result.max_force > 1e-12);
        assert_eq!(count_frames(result.optimization_traj.as_ref().unwrap()), 3);
    }

    #[test]
    fn test_existing_trajectory_is_replaced() {
        let dir = tempdir().unwrap();
        let (params, config) = setup(dir.path());
        let provider = Fixed(|| Box::new(Flat { energy: 0.0 }) as Box<dyn Potential>);

        let first = optimize_crystal_structure(&params, &config, &provider);
        let second = optimize_crystal_structure(&params, &config, &provider);
        assert_eq!(first.optimization_traj, second.optimization_traj);
        assert_eq!(count_frames(second.optimization_traj.as_ref().unwrap()), 1);
    }

    #[test]
    fn test_oracle_failure_is_reported() {
        let dir = tempdir().unwrap();
        let (params, config) = setup(dir.path());
        let provider = Fixed(|| {
            Box::new(FailAfter {
                ok_calls: 0,
                calls: AtomicUsize::new(0),
            }) as Box<dyn Potential>
        });

        let result = optimize_crystal_structure(&params, &config, &provider);
        assert!(!result.is_success());
        assert_eq!(result.final_energy, -1.0);
        assert_eq!(result.optimized_structure, PathBuf::new());
        assert!(result.optimization_traj.is_none());
        assert!(result.message.starts_with("Optimization failed:"));
        assert_eq!(result.error, Some(ErrorKind::ExternalOracleFailure));
    }

    #[test]
    fn test_missing_input() {
        let dir = tempdir().unwrap();
        let config = Config::default();
        let params = OptimizeParams::new(dir.path().join("missing.cif"), "model.pt");
        let provider = Fixed(|| Box::new(Flat { energy: 0.0 }) as Box<dyn Potential>);
        let result = optimize_crystal_structure(&params, &config, &provider);
        assert_eq!(result.error, Some(ErrorKind::Io));
    }
}
