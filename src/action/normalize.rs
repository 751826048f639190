//! 命令规范化
//!
//! 纯函数、不失败：只改写 hotkey 参数，其余动作原样返回。
//! `key: "Ctrl+S"`、`keys: "Ctrl,S"`、`keys: ["Ctrl", "S"]` 统一为 `keys: ["ctrl", "s"]`，
//! 原始大小写保存在 `original_keys`（仅首次写入，保证幂等）。

use serde_json::{Map, Value};

use crate::action::types::{command_kind, RawCommand};

/// 规范化单条原始命令
pub fn normalize(mut cmd: RawCommand) -> RawCommand {
    let is_hotkey = command_kind(&cmd)
        .map(|k| k.trim().eq_ignore_ascii_case("hotkey"))
        .unwrap_or(false);
    if !is_hotkey {
        return cmd;
    }

    if let Some(Value::Object(args)) = cmd.get_mut("args") {
        normalize_hotkey_args(args);
    }
    cmd
}

fn normalize_hotkey_args(args: &mut Map<String, Value>) {
    let from_combined = args.get("key").and_then(split_keys);
    let original = match from_combined {
        Some(parts) => {
            args.remove("key");
            parts
        }
        None => match args.get("keys").and_then(split_keys) {
            Some(parts) => parts,
            None => return,
        },
    };

    let lowered: Vec<Value> = original
        .iter()
        .map(|k| Value::String(k.to_lowercase()))
        .collect();

    args.entry("original_keys")
        .or_insert_with(|| Value::Array(original.into_iter().map(Value::String).collect()));
    args.insert("keys".into(), Value::Array(lowered));
}

/// 拆分组合键：字符串按 `+` / `,` 拆分，列表逐项拆分；去空白、去空项
pub fn split_keys(value: &Value) -> Option<Vec<String>> {
    let parts: Vec<String> = match value {
        Value::String(s) => split_combo(s),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .flat_map(split_combo)
            .collect(),
        _ => return None,
    };
    Some(parts)
}

fn split_combo(s: &str) -> Vec<String> {
    s.split(['+', ','])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

/// 读取规范化后的小写键列表（执行器用；未规范化的命令同样可读）
pub fn canonical_keys(args: &Map<String, Value>) -> Option<Vec<String>> {
    let raw = args
        .get("keys")
        .filter(|v| !v.is_null())
        .or_else(|| args.get("key"))?;
    split_keys(raw).map(|keys| keys.into_iter().map(|k| k.to_lowercase()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_combined_string() {
        let cmd = normalize(json!({"action": "hotkey", "args": {"key": "Ctrl+S"}}));
        assert_eq!(cmd["args"]["keys"], json!(["ctrl", "s"]));
        assert_eq!(cmd["args"]["original_keys"], json!(["Ctrl", "S"]));
        assert!(cmd["args"].get("key").is_none());
    }

    #[test]
    fn test_comma_separated_string() {
        let cmd = normalize(json!({"action": "hotkey", "args": {"keys": "Alt, F4"}}));
        assert_eq!(cmd["args"]["keys"], json!(["alt", "f4"]));
    }

    #[test]
    fn test_pre_split_list() {
        let cmd = normalize(json!({"action": "hotkey", "args": {"keys": ["CTRL", "O"]}}));
        assert_eq!(cmd["args"]["keys"], json!(["ctrl", "o"]));
        assert_eq!(cmd["args"]["original_keys"], json!(["CTRL", "O"]));
    }

    #[test]
    fn test_idempotent() {
        let inputs = vec![
            json!({"action": "hotkey", "args": {"key": "Ctrl+S"}}),
            json!({"action": "hotkey", "args": {"keys": "Ctrl,Shift,Esc"}}),
            json!({"action": "hotkey", "args": {"keys": ["Alt", "F4"]}}),
            json!({"action": "hotkey", "args": {}}),
            json!({"action": "click", "args": {"x": 1}}),
            json!({"args": {"key": "Ctrl+S"}}),
            json!("not an object"),
        ];
        for cmd in inputs {
            let once = normalize(cmd.clone());
            let twice = normalize(once.clone());
            assert_eq!(once, twice, "not idempotent for {cmd}");
        }
    }

    #[test]
    fn test_other_kinds_untouched() {
        let cmd = json!({"action": "type_text", "args": {"text": "Ctrl+S"}});
        assert_eq!(normalize(cmd.clone()), cmd);
    }

    #[test]
    fn test_canonical_keys_reads_unnormalized_args() {
        let args = json!({"key": "Alt+F4"});
        let keys = canonical_keys(args.as_object().unwrap()).unwrap();
        assert_eq!(keys, vec!["alt", "f4"]);
    }
}
