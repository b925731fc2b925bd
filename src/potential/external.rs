//! # 外部评估程序
//!
//! 每次计算启动一次评估程序：
//! ```text
//! <evaluator> [evaluator_args...] --model <location> --head <head>
//! ```
//! 构型以单帧扩展 XYZ 写入 stdin；stdout 须为单帧扩展 XYZ，注释行含
//! `energy=`，Properties 含 `forces:R:3`。
//!
//! ## 依赖关系
//! - 被 `potential/mod.rs` 使用
//! - 使用 `parsers/xyz.rs` 交换构型

use super::{Evaluation, Potential};
use crate::error::{CalcError, Result};
use crate::models::Crystal;
use crate::parsers::xyz::{self, Frame};

use log::debug;
use std::io::Write;
use std::process::{Command, Stdio};

/// 通过子进程调用的势函数模型
#[derive(Debug, Clone)]
pub struct ExternalPotential {
    command: String,
    args: Vec<String>,
    model: String,
    head: String,
}

impl ExternalPotential {
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        model: impl Into<String>,
        head: impl Into<String>,
    ) -> Self {
        ExternalPotential {
            command: command.into(),
            args,
            model: model.into(),
            head: head.into(),
        }
    }

    fn run(&self, input: &str) -> Result<String> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .args(["--model", self.model.as_str(), "--head", self.head.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|_| CalcError::CommandNotFound {
                command: self.command.clone(),
            })?;

        // 写 stdin 与读 stdout/stderr 并行，避免双方都阻塞在满管道上；
        // 子进程提前退出时写入失败，由退出状态报告
        let stdin = child.stdin.take();
        let output = std::thread::scope(|scope| {
            if let Some(mut stdin) = stdin {
                scope.spawn(move || {
                    stdin.write_all(input.as_bytes()).ok();
                });
            }
            child.wait_with_output()
        })
        .map_err(|e| CalcError::CommandFailed {
            command: self.command.clone(),
            stderr: e.to_string(),
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(CalcError::CommandFailed {
                command: format!("{} --model {}", self.command, self.model),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }
}

impl Potential for ExternalPotential {
    fn describe(&self) -> String {
        format!("{} (model={}, head={})", self.command, self.model, self.head)
    }

    fn compute(&self, crystal: &Crystal) -> Result<Evaluation> {
        let input = xyz::frame_to_string(&Frame::new(crystal.clone()));
        let reply = self.run(&input)?;
        debug!("Evaluator replied with {} bytes", reply.len());

        let frame = xyz::parse_frames(&reply, &self.command)
            .map_err(|e| CalcError::EvaluationError(format!("malformed reply: {}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| CalcError::EvaluationError("empty reply".to_string()))?;

        let energy = frame
            .energy
            .ok_or_else(|| CalcError::EvaluationError("reply has no energy".to_string()))?;
        let forces = frame
            .forces
            .ok_or_else(|| CalcError::EvaluationError("reply has no forces".to_string()))?;
        if forces.len() != crystal.len() {
            return Err(CalcError::EvaluationError(format!(
                "expected {} forces, got {}",
                crystal.len(),
                forces.len()
            )));
        }
        if !energy.is_finite() || forces.iter().flatten().any(|f| !f.is_finite()) {
            return Err(CalcError::EvaluationError(
                "non-finite energy or forces".to_string(),
            ));
        }
        Ok(Evaluation { energy, forces })
    }
}
