//! 分析器注册表：稳定字符串 key → 构造函数，启动时解析一次
//!
//! 规格写法 `key` 或 `key=path`，如 `ide`、`tabular=/var/log/run.xlsx`。

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

use crate::core::AgentError;
use crate::recovery::ide::IdeLogAnalyzer;
use crate::recovery::log_analyzer::LogAnalyzer;
use crate::recovery::tabular::TabularLogAnalyzer;

/// key 与别名
pub const ANALYZER_KEYS: &[(&str, &[&str])] = &[
    ("ide", &["pycharm"]),
    ("tabular", &["excel", "csv"]),
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct AnalyzerSpec {
    pub key: String,
    pub path: Option<PathBuf>,
}

impl FromStr for AnalyzerSpec {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, path) = match s.split_once('=') {
            Some((k, p)) => (k, Some(p.trim()).filter(|p| !p.is_empty())),
            None => (s, None),
        };
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            return Err(AgentError::Config(format!("empty analyzer key in `{s}`")));
        }
        Ok(Self {
            key,
            path: path.map(PathBuf::from),
        })
    }
}

impl TryFrom<String> for AnalyzerSpec {
    type Error = AgentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AnalyzerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(p) => write!(f, "{}={}", self.key, p.display()),
            None => f.write_str(&self.key),
        }
    }
}

fn canonical_key(key: &str) -> Option<&'static str> {
    ANALYZER_KEYS
        .iter()
        .find(|(k, aliases)| *k == key || aliases.contains(&key))
        .map(|(k, _)| *k)
}

pub fn build_analyzer(spec: &AnalyzerSpec) -> Result<Box<dyn LogAnalyzer>, AgentError> {
    match canonical_key(&spec.key) {
        Some("ide") => Ok(Box::new(IdeLogAnalyzer::new(spec.path.clone()))),
        Some("tabular") => Ok(Box::new(TabularLogAnalyzer::new(spec.path.clone()))),
        _ => Err(AgentError::Config(format!(
            "unknown analyzer `{}`; known: {}",
            spec.key,
            ANALYZER_KEYS
                .iter()
                .map(|(k, _)| *k)
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

/// 构造全部分析器；未知 key 记日志后跳过
pub fn build_analyzers(specs: &[AnalyzerSpec]) -> Vec<Box<dyn LogAnalyzer>> {
    specs
        .iter()
        .filter_map(|spec| match build_analyzer(spec) {
            Ok(analyzer) => {
                tracing::info!(analyzer = %spec, "log analyzer enabled");
                Some(analyzer)
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping analyzer");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spec() {
        let spec: AnalyzerSpec = "Excel=/tmp/run.xlsx".parse().unwrap();
        assert_eq!(spec.key, "excel");
        assert_eq!(spec.path, Some(PathBuf::from("/tmp/run.xlsx")));
        let spec: AnalyzerSpec = "pycharm".parse().unwrap();
        assert_eq!(spec.path, None);
        assert!("=x".parse::<AnalyzerSpec>().is_err());
    }

    #[test]
    fn test_aliases_resolve() {
        for key in ["ide", "pycharm", "tabular", "excel", "csv"] {
            let spec: AnalyzerSpec = key.parse().unwrap();
            assert!(build_analyzer(&spec).is_ok(), "{key}");
        }
        let analyzer = build_analyzer(&"csv=/x.csv".parse().unwrap()).unwrap();
        assert_eq!(analyzer.source_name(), "tabular");
    }

    #[test]
    fn test_unknown_keys_skipped() {
        let specs: Vec<AnalyzerSpec> = vec!["ide".parse().unwrap(), "splunk".parse().unwrap()];
        assert_eq!(build_analyzers(&specs).len(), 1);
    }

    #[test]
    fn test_deserialize_from_string() {
        let specs: Vec<AnalyzerSpec> =
            serde_json::from_str(r#"["ide", "tabular=/var/log/run.csv"]"#).unwrap();
        assert_eq!(specs[1].path, Some(PathBuf::from("/var/log/run.csv")));
    }
}
