//! # call 子命令实现
//!
//! 读取 JSON 参数、按名称调用工具、把 JSON 结果打印到标准输出。
//!
//! ## 依赖关系
//! - 使用 `cli/call.rs` 定义的参数
//! - 调用 `tools::Toolkit::call`

use crate::cli::call::CallArgs;
use crate::error::{CalcError, Result};
use crate::tools::Toolkit;

use serde_json::Value;
use std::fs;

/// 执行工具调用
pub fn execute(args: CallArgs, toolkit: Toolkit) -> Result<()> {
    let raw = match (&args.args, &args.args_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => fs::read_to_string(path).map_err(|e| CalcError::read(path, e))?,
        (None, None) => "{}".to_string(),
    };
    let params: Value = serde_json::from_str(&raw)?;

    let result = toolkit.call(&args.tool, params);
    let text = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{}", text);

    if result.get("error").map_or(false, |e| !e.is_null()) {
        let message = result["message"].as_str().unwrap_or("tool call failed");
        return Err(CalcError::Other(message.to_string()));
    }
    Ok(())
}
