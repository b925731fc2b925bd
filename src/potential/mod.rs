//! # 势函数 oracle
//!
//! 能量/受力的计算由外部训练好的势函数模型完成，这里只定义调用契约：
//! - [`Potential`]：给定构型返回能量 (eV) 与原子受力 (eV/Å)；
//! - [`PotentialProvider`]：由模型引用 [`ModelRef`] 加载势函数。
//!
//! 默认提供者 [`DefaultProvider`] 的规则：
//! - `lj` 或 `lj:epsilon=…,sigma=…,cutoff=…` → 内置 Lennard-Jones 势；
//! - 其他引用 → 外部评估程序 ([`external::ExternalPotential`])，本地路径必须存在，
//!   含 `scheme://` 的远程引用原样传递。
//!
//! ## 依赖关系
//! - 被 `optimize/`, `phonon/`, `tools/` 使用
//! - 子模块: external, lennard_jones
//! - 使用 `config.rs` 的 PotentialConfig

pub mod external;
pub mod lennard_jones;

use crate::config::PotentialConfig;
use crate::error::{CalcError, Result};
use crate::models::Crystal;

use log::info;
use std::path::Path;

pub use external::ExternalPotential;
pub use lennard_jones::LennardJones;

/// 单次势函数计算结果
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// 势能 (eV)
    pub energy: f64,
    /// 原子受力 (eV/Å)，顺序与输入原子一致
    pub forces: Vec<[f64; 3]>,
}

impl Evaluation {
    /// 最大原子受力模长
    pub fn max_force(&self) -> f64 {
        self.forces
            .iter()
            .map(|f| crate::models::structure::norm(*f))
            .fold(0.0, f64::max)
    }
}

/// 能量/受力 oracle；对固定构型和模型是确定性的
pub trait Potential: Send + Sync {
    /// 用于日志的描述
    fn describe(&self) -> String;

    fn compute(&self, crystal: &Crystal) -> Result<Evaluation>;
}

/// 模型引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    /// 本地路径或远程 URI
    pub location: String,
    /// 多任务模型的 head
    pub head: Option<String>,
}

impl ModelRef {
    #[cfg(test)]
    pub fn new(location: impl Into<String>) -> Self {
        ModelRef {
            location: location.into(),
            head: None,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.location.contains("://")
    }
}

/// 由模型引用加载势函数
pub trait PotentialProvider: Send + Sync {
    fn load(&self, model: &ModelRef) -> Result<Box<dyn Potential>>;
}

/// 默认提供者：内置 Lennard-Jones 或外部评估程序
#[derive(Debug, Clone)]
pub struct DefaultProvider {
    config: PotentialConfig,
}

impl DefaultProvider {
    pub fn new(config: PotentialConfig) -> Self {
        DefaultProvider { config }
    }
}

impl PotentialProvider for DefaultProvider {
    fn load(&self, model: &ModelRef) -> Result<Box<dyn Potential>> {
        let location = model.location.trim();
        if location == "lj" || location.starts_with("lj:") {
            let lj = LennardJones::from_spec(location)?;
            info!("Using built-in potential: {}", lj.describe());
            return Ok(Box::new(lj));
        }

        if !model.is_remote() && !Path::new(location).exists() {
            return Err(CalcError::ModelNotFound {
                path: location.to_string(),
            });
        }

        let head = model
            .head
            .clone()
            .unwrap_or_else(|| self.config.default_head.clone());
        let potential = ExternalPotential::new(
            &self.config.evaluator,
            self.config.evaluator_args.clone(),
            location,
            head,
        );
        info!("Using external potential: {}", potential.describe());
        Ok(Box::new(potential))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lj_reference_selects_builtin() {
        let provider = DefaultProvider::new(PotentialConfig::default());
        let potential = provider.load(&ModelRef::new("lj:sigma=2.5")).unwrap();
        assert!(potential.describe().contains("sigma=2.5"));
    }

    #[test]
    fn test_missing_local_model() {
        let provider = DefaultProvider::new(PotentialConfig::default());
        let err = provider
            .load(&ModelRef::new("/nonexistent/dpa-2.4-7M.pt"))
            .err()
            .unwrap();
        assert!(matches!(err, CalcError::ModelNotFound { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::ExternalOracleFailure);
    }

    #[test]
    fn test_remote_model_is_passed_through() {
        let provider = DefaultProvider::new(PotentialConfig::default());
        let potential = provider
            .load(&ModelRef::new("bohrium://13756/27666/store/dpa.pt"))
            .unwrap();
        assert!(potential.describe().contains("MP_traj_v024_alldata_mixu"));
    }

    #[test]
    fn test_max_force() {
        let eval = Evaluation {
            energy: 0.0,
            forces: vec![[3.0, 4.0, 0.0], [0.0, 0.0, 1.0]],
        };
        assert_eq!(eval.max_force(), 5.0);
    }
}
