//! # 统一错误处理模块
//!
//! 定义 dpcalc 的所有错误类型，使用 `thiserror` 派生。
//!
//! 工具边界 (`tools/`) 不向外抛出错误，而是通过 [`CalcError::kind`] 把错误
//! 归类为 [`ErrorKind`] 写入结果的 `error` 字段，同时把错误信息写入 `message`。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// dpcalc 统一错误类型
#[derive(Error, Debug)]
pub enum CalcError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    // ─────────────────────────────────────────────────────────────
    // 输入参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Unknown element symbol: {0}")]
    UnknownElement(String),

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    // ─────────────────────────────────────────────────────────────
    // 几何错误
    // ─────────────────────────────────────────────────────────────
    #[error("Lattice mismatch too large: strain_a={strain_a:.3}, strain_b={strain_b:.3}")]
    LatticeMismatch { strain_a: f64, strain_b: f64 },

    #[error("Geometry error: {0}")]
    GeometryError(String),

    // ─────────────────────────────────────────────────────────────
    // 势函数 (外部 oracle) 错误
    // ─────────────────────────────────────────────────────────────
    #[error("External command '{command}' not found in PATH")]
    CommandNotFound { command: String },

    #[error("External command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Potential model not found: {path}")]
    ModelNotFound { path: String },

    #[error("Potential evaluation failed: {0}")]
    EvaluationError(String),

    // ─────────────────────────────────────────────────────────────
    // 数值错误
    // ─────────────────────────────────────────────────────────────
    #[error("Force constant assembly failed: {0}")]
    ForceConstantsError(String),

    // ─────────────────────────────────────────────────────────────
    // 序列化 / 绘图错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Plot error: {0}")]
    PlotError(String),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// 错误分类，对应工具结果中的 `error` 字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 不支持的枚举值、缺失的必需参数
    InvalidInput,
    /// 晶格失配超限等几何上无法构造的请求
    GeometricInfeasibility,
    /// 势函数加载/计算失败，或力常数求解失败
    ExternalOracleFailure,
    /// 文件读写与格式解析
    Io,
}

impl CalcError {
    /// 错误归类
    pub fn kind(&self) -> ErrorKind {
        match self {
            CalcError::FileReadError { .. }
            | CalcError::FileWriteError { .. }
            | CalcError::FileNotFound { .. }
            | CalcError::ParseError { .. }
            | CalcError::UnsupportedFormat(_)
            | CalcError::CsvError(_)
            | CalcError::JsonError(_)
            | CalcError::YamlError(_)
            | CalcError::PlotError(_) => ErrorKind::Io,

            CalcError::InvalidArgument(_)
            | CalcError::MissingParameter(_)
            | CalcError::UnknownElement(_)
            | CalcError::InvalidStructure(_)
            | CalcError::ConfigError(_) => ErrorKind::InvalidInput,

            CalcError::LatticeMismatch { .. } | CalcError::GeometryError(_) => {
                ErrorKind::GeometricInfeasibility
            }

            CalcError::CommandNotFound { .. }
            | CalcError::CommandFailed { .. }
            | CalcError::ModelNotFound { .. }
            | CalcError::EvaluationError(_)
            | CalcError::ForceConstantsError(_)
            | CalcError::Other(_) => ErrorKind::ExternalOracleFailure,
        }
    }

    /// 包装写文件错误
    pub fn write(path: &std::path::Path, source: std::io::Error) -> Self {
        CalcError::FileWriteError {
            path: path.display().to_string(),
            source,
        }
    }

    /// 包装读文件错误
    pub fn read(path: &std::path::Path, source: std::io::Error) -> Self {
        CalcError::FileReadError {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, CalcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_classification() {
        let e = CalcError::MissingParameter("material2".to_string());
        assert_eq!(e.kind(), ErrorKind::InvalidInput);

        let e = CalcError::LatticeMismatch {
            strain_a: 0.2,
            strain_b: 0.0,
        };
        assert_eq!(e.kind(), ErrorKind::GeometricInfeasibility);
        assert!(e.to_string().contains("strain_a=0.200"));

        let e = CalcError::CommandNotFound {
            command: "dp-eval".to_string(),
        };
        assert_eq!(e.kind(), ErrorKind::ExternalOracleFailure);
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::GeometricInfeasibility).unwrap();
        assert_eq!(json, "\"geometric_infeasibility\"");
    }
}
