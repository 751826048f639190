//! 解析预言机回复
//!
//! 计划：接受裸 JSON 数组、`{"plan": [...]}`、代码块包裹或夹杂在文字中的 JSON，否则 MalformedPlan。
//! 下一步：空回复、非 JSON 或空数组一律视为 finish；数组取首元素。

use serde_json::{json, Value};

use crate::action::RawCommand;
use crate::core::AgentError;

/// 去掉 ``` / ```json 代码块包裹（无代码块时原样返回）
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let rest = &trimmed[start + 3..];
    // 跳过语言标记所在行
    let body = match rest.find('\n') {
        Some(nl) if !rest[..nl].trim().contains(['{', '[']) => &rest[nl + 1..],
        _ => rest,
    };
    body.find("```")
        .map(|end| body[..end].trim())
        .unwrap_or(body.trim())
}

fn finish() -> RawCommand {
    json!({"action": "finish"})
}

fn plan_from_value(value: Value) -> Option<Vec<RawCommand>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut obj) => match obj.remove("plan") {
            Some(Value::Array(items)) => Some(items),
            Some(_) => None,
            None if obj.contains_key("action") || obj.contains_key("kind") => {
                Some(vec![Value::Object(obj)])
            }
            None => None,
        },
        _ => None,
    }
}

fn slice_between(text: &str, open: char, close: char) -> Option<&str> {
    let l = text.find(open)?;
    let r = text.rfind(close)?;
    (l < r).then(|| &text[l..=r])
}

pub fn parse_plan(text: &str) -> Result<Vec<RawCommand>, AgentError> {
    let body = strip_code_fence(text);

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(plan) = plan_from_value(value) {
            return Ok(plan);
        }
    }
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(candidate) = slice_between(body, open, close) {
            if let Some(plan) = serde_json::from_str::<Value>(candidate)
                .ok()
                .and_then(plan_from_value)
            {
                return Ok(plan);
            }
        }
    }

    let preview: String = text.trim().chars().take(120).collect();
    Err(AgentError::MalformedPlan(format!(
        "expected a JSON array of actions, got: {preview}"
    )))
}

pub fn parse_next_action(text: &str) -> RawCommand {
    let body = strip_code_fence(text);
    if !body.starts_with(['{', '[']) {
        if !body.is_empty() {
            tracing::info!(reply = %body, "non-JSON reply treated as finish");
        }
        return finish();
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items.into_iter().next().unwrap_or_else(finish),
        Ok(Value::Object(mut obj)) => match obj.remove("plan") {
            Some(Value::Array(items)) => items.into_iter().next().unwrap_or_else(finish),
            Some(other) => {
                obj.insert("plan".into(), other);
                Value::Object(obj)
            }
            None => Value::Object(obj),
        },
        Ok(other) => {
            tracing::warn!(reply = %other, "unexpected next action shape, treating as finish");
            finish()
        }
        Err(e) => {
            tracing::warn!(error = %e, reply = %body, "unparseable next action, treating as finish");
            finish()
        }
    }
}
