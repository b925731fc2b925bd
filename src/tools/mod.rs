//! # 工具注册表
//!
//! [`Toolkit`] 在启动时由 [`Config`] 构造一次，持有势函数提供者，
//! 按名称暴露三个工具：
//!
//! | 名称 | 参数 | 结果 |
//! |---|---|---|
//! | `build_structure` | [`BuildParams`] | [`BuildStructureResult`] |
//! | `optimize_crystal_structure` | [`OptimizeParams`] | [`OptimizationResult`] |
//! | `calculate_phonon` | [`PhononParams`] | [`PhononResult`] |
//!
//! [`Toolkit::call`] 是 JSON 调用入口：反序列化参数 (补齐默认值)、运行工具、
//! 把结果序列化为 JSON。未知工具或参数格式错误返回带 `message` 的 JSON 对象。
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 调用 `builder/`, `optimize/`, `phonon/`
//! - 使用 `serde_json`

use crate::builder::{self, BuildParams};
use crate::config::Config;
use crate::error::ErrorKind;
use crate::models::{BuildStructureResult, OptimizationResult, PhononResult};
use crate::optimize::{self, OptimizeParams};
use crate::phonon::{self, PhononParams};
use crate::potential::{DefaultProvider, PotentialProvider};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

/// 工具名称
pub const BUILD_STRUCTURE: &str = "build_structure";
pub const OPTIMIZE_CRYSTAL_STRUCTURE: &str = "optimize_crystal_structure";
pub const CALCULATE_PHONON: &str = "calculate_phonon";

/// 工具描述 (名称、说明、参数表)
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParameterSpec>,
}

/// 单个参数的描述；`default` 为 None 表示必需参数
#[derive(Debug, Clone, Serialize)]
pub struct ParameterSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

fn required(name: &'static str, kind: &'static str) -> ParameterSpec {
    ParameterSpec {
        name,
        kind,
        required: true,
        default: None,
    }
}

/// 默认值取自参数结构体本身，保证描述与反序列化一致
fn optional(name: &'static str, kind: &'static str, defaults: &Value) -> ParameterSpec {
    ParameterSpec {
        name,
        kind,
        required: false,
        default: defaults.get(name).cloned(),
    }
}

/// 全部工具描述
pub fn descriptors() -> Vec<ToolDescriptor> {
    let build = serde_json::to_value(BuildParams::new("", "")).unwrap_or(Value::Null);
    let opt = serde_json::to_value(OptimizeParams::new("", "")).unwrap_or(Value::Null);
    let ph = serde_json::to_value(PhononParams::new("", "")).unwrap_or(Value::Null);

    vec![
        ToolDescriptor {
            name: BUILD_STRUCTURE,
            description: "Build a bulk, surface or interface structure and save it to a file.",
            parameters: vec![
                required("structure_type", "string"),
                required("material1", "string"),
                optional("conventional", "boolean", &build),
                optional("crystal_structure1", "string", &build),
                optional("a1", "number", &build),
                optional("b1", "number", &build),
                optional("c1", "number", &build),
                optional("alpha1", "number", &build),
                optional("output_file", "string", &build),
                optional("miller_index1", "integer[3]", &build),
                optional("layers1", "integer", &build),
                optional("vacuum1", "number", &build),
                optional("material2", "string", &build),
                optional("crystal_structure2", "string", &build),
                optional("a2", "number", &build),
                optional("b2", "number", &build),
                optional("c2", "number", &build),
                optional("alpha2", "number", &build),
                optional("miller_index2", "integer[3]", &build),
                optional("layers2", "integer", &build),
                optional("vacuum2", "number", &build),
                optional("stack_axis", "integer", &build),
                optional("interface_distance", "number", &build),
                optional("max_strain", "number", &build),
            ],
        },
        ToolDescriptor {
            name: OPTIMIZE_CRYSTAL_STRUCTURE,
            description: "Relax atomic positions with BFGS using a machine-learned potential.",
            parameters: vec![
                required("input_structure", "string"),
                required("model_path", "string"),
                optional("head", "string", &opt),
                optional("force_tolerance", "number", &opt),
                optional("max_iterations", "integer", &opt),
            ],
        },
        ToolDescriptor {
            name: CALCULATE_PHONON,
            description: "Compute phonon thermal properties and band structure by finite displacements.",
            parameters: vec![
                required("cif_file", "string"),
                required("model_path", "string"),
                optional("head", "string", &ph),
                optional("supercell_matrix", "integer[3] | integer[9]", &ph),
                optional("displacement_distance", "number", &ph),
                optional("temperatures", "number[]", &ph),
                optional("plot_path", "string", &ph),
            ],
        },
    ]
}

/// 工具集合
pub struct Toolkit {
    config: Config,
    provider: Box<dyn PotentialProvider>,
}

impl Toolkit {
    /// 使用默认提供者 (内置 LJ 或外部评估程序)
    pub fn new(config: Config) -> Self {
        let provider = DefaultProvider::new(config.potential.clone());
        Toolkit {
            config,
            provider: Box::new(provider),
        }
    }

    #[cfg(test)]
    pub fn with_provider(config: Config, provider: Box<dyn PotentialProvider>) -> Self {
        Toolkit { config, provider }
    }

    pub fn build_structure(&self, params: &BuildParams) -> BuildStructureResult {
        builder::build_structure(params, &self.config)
    }

    pub fn optimize_crystal_structure(&self, params: &OptimizeParams) -> OptimizationResult {
        optimize::optimize_crystal_structure(params, &self.config, self.provider.as_ref())
    }

    pub fn calculate_phonon(&self, params: &PhononParams) -> PhononResult {
        phonon::calculate_phonon(params, &self.config, self.provider.as_ref())
    }

    /// 按名称调用工具
    pub fn call(&self, name: &str, args: Value) -> Value {
        match name {
            BUILD_STRUCTURE => self.dispatch(name, args, |p: &BuildParams| self.build_structure(p)),
            OPTIMIZE_CRYSTAL_STRUCTURE => self.dispatch(name, args, |p: &OptimizeParams| {
                self.optimize_crystal_structure(p)
            }),
            CALCULATE_PHONON => self.dispatch(name, args, |p: &PhononParams| self.calculate_phonon(p)),
            other => rejection(format!("Unknown tool: {}", other)),
        }
    }

    fn dispatch<P, R>(&self, name: &str, args: Value, run: impl FnOnce(&P) -> R) -> Value
    where
        P: DeserializeOwned,
        R: Serialize,
    {
        let params: P = match serde_json::from_value(args) {
            Ok(params) => params,
            Err(e) => return rejection(format!("Invalid parameters for {}: {}", name, e)),
        };
        serde_json::to_value(run(&params))
            .unwrap_or_else(|e| rejection(format!("Failed to serialize result: {}", e)))
    }
}

fn rejection(message: String) -> Value {
    log::error!("{}", message);
    json!({ "message": message, "error": ErrorKind::InvalidInput })
}
