//! 命令校验：分派前拒绝结构非法的命令，只返回布尔值
//!
//! click 缺坐标不拒绝（执行时回退到当前指针位置）；hotkey 同时缺少 key 与 keys 则拒绝。

use serde_json::Value;

use crate::action::types::{command_kind, RawCommand};

/// 命令是否可以分派
pub fn validate(cmd: &RawCommand) -> bool {
    if !cmd.is_object() {
        return false;
    }

    let Some(kind) = command_kind(cmd).map(str::trim).filter(|k| !k.is_empty()) else {
        return false;
    };

    let empty = serde_json::Map::new();
    let args = match cmd.get("args") {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(map)) => map,
        Some(_) => return false,
    };

    match kind.to_lowercase().as_str() {
        "click" => {
            if !args.contains_key("x") || !args.contains_key("y") {
                tracing::warn!("click without coordinates, will use current pointer position");
            }
            true
        }
        "hotkey" => args.contains_key("keys") || args.contains_key("key"),
        _ => true,
    }
}
