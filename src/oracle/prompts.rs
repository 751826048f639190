//! 预言机提示词与动作 JSON Schema
//!
//! schemars 生成 `{"action": ..., "args": {...}}` 的 Schema 并拼入 system prompt，减少格式错误。

use schemars::{schema_for, JsonSchema};
use serde_json::{Map, Value};

use crate::executor::allowed_hotkeys_display;
use crate::oracle::OracleMode;

/// 单条动作格式（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ActionFormat {
    /// 动作名：move、click、click_image、type_text、hotkey、focus_window、sleep、save_file、finish
    pub action: String,
    /// 动作参数，依动作不同而不同（x/y、img、text、keys、title、seconds、path 等）
    pub args: Option<Map<String, Value>>,
}

/// 完整计划格式（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct PlanFormat {
    pub plan: Vec<ActionFormat>,
}

pub const ALLOWED_ACTIONS: &str =
    "move | click | click_image | type_text | hotkey | focus_window | sleep | save_file | finish";

pub fn action_schema_json() -> String {
    serde_json::to_string_pretty(&schema_for!(ActionFormat)).unwrap_or_default()
}

pub fn plan_schema_json() -> String {
    serde_json::to_string_pretty(&schema_for!(PlanFormat)).unwrap_or_default()
}

pub fn system_prompt(mode: OracleMode) -> String {
    let mut sys = format!(
        "You control a desktop through atomic actions. Allowed actions: {ALLOWED_ACTIONS}.\n\
         hotkey only accepts these combinations: {}.\n\
         Argument names: move/click use x, y (click also button); click_image uses img and optional conf; \
         type_text uses text; hotkey uses keys (list); focus_window uses title, class_name or process_name; \
         sleep uses seconds; save_file uses path.\n\
         Reply with JSON only, no prose.",
        allowed_hotkeys_display()
    );
    if mode == OracleMode::Text {
        sys.push_str(
            "\nYou cannot see screenshots; infer the screen state from the window title and the action history.",
        );
    }
    sys
}

pub fn plan_request(goal: &str) -> String {
    format!(
        "Goal: {goal}\nReturn the complete ordered plan of atomic actions that achieves the goal, \
         as {{\"plan\": [...]}} matching this schema:\n{}",
        plan_schema_json()
    )
}

pub fn next_action_request(goal: &str, last_result: &str) -> String {
    format!(
        "Goal: {goal}\nResult of the previous step: {last_result}\n\
         Return the single next atomic action as one JSON object matching this schema \
         (use {{\"action\": \"finish\"}} when the goal is achieved):\n{}",
        action_schema_json()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mentions_fields() {
        let schema = action_schema_json();
        assert!(schema.contains("\"action\""));
        assert!(schema.contains("\"args\""));
        assert!(plan_schema_json().contains("\"plan\""));
    }

    #[test]
    fn test_text_mode_prompt_mentions_missing_screenshots() {
        assert!(system_prompt(OracleMode::Text).contains("cannot see screenshots"));
        assert!(!system_prompt(OracleMode::Vision).contains("cannot see screenshots"));
        assert!(system_prompt(OracleMode::Vision).contains("ctrl+s, ctrl+o, alt+f4"));
    }
}
