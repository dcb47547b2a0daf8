//! Environment contract consumed by the handlers.
//!
//! - `TABLE_NAME` - target table (required, `TODOS_TABLE_NAME` accepted as fallback)
//! - `REGION` - AWS region (optional, SDK provider chain otherwise)
//! - `INDEX_NAME` - chronological index (default: `CreatedAtIndex`)

use crate::error::ConfigError;

/// Default name of the `pk`/`created_at` secondary index.
pub const DEFAULT_INDEX_NAME: &str = "CreatedAtIndex";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub table_name: String,
    pub region: Option<String>,
    pub index_name: String,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let table_name = non_empty("TABLE_NAME")
            .or_else(|| non_empty("TODOS_TABLE_NAME"))
            .ok_or(ConfigError::Missing("TABLE_NAME"))?;

        Ok(Self {
            table_name,
            region: non_empty("REGION"),
            index_name: non_empty("INDEX_NAME").unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string()),
        })
    }

    /// Build a DynamoDB client for this configuration.
    pub async fn dynamodb_client(&self) -> aws_sdk_dynamodb::Client {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(aws_sdk_dynamodb::config::Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;
        aws_sdk_dynamodb::Client::new(&sdk_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_lookup(lookup(&[
            ("TABLE_NAME", "main"),
            ("REGION", "ap-northeast-1"),
            ("INDEX_NAME", "ByDate"),
        ]))
        .unwrap();

        assert_eq!(config.table_name, "main");
        assert_eq!(config.region.as_deref(), Some("ap-northeast-1"));
        assert_eq!(config.index_name, "ByDate");
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("TABLE_NAME", "main")])).unwrap();
        assert_eq!(config.region, None);
        assert_eq!(config.index_name, DEFAULT_INDEX_NAME);
    }

    #[test]
    fn test_legacy_table_variable() {
        let config = Config::from_lookup(lookup(&[("TODOS_TABLE_NAME", "todos")])).unwrap();
        assert_eq!(config.table_name, "todos");
    }

    #[test]
    fn test_missing_table_name() {
        let err = Config::from_lookup(lookup(&[("TABLE_NAME", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TABLE_NAME"));
        assert_eq!(err.to_string(), "TABLE_NAME not set");
    }
}
