//! 动作层：数据模型、规范化、校验

pub mod normalize;
pub mod types;
pub mod validate;

pub use normalize::{canonical_keys, normalize};
pub use types::{command_kind, Action, ActionKind, ExecutionResult, RawCommand};
pub use validate::validate;
