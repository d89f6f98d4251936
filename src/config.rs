//! Engine configuration and environment lookups.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const STAGE_ENV_KEY: &str = "PROVISION_REPORT_STAGE";
pub const MAX_STACK_LINES_ENV_KEY: &str = "PROVISION_REPORT_MAX_STACK_LINES";

/// Environment lookup abstraction used when loading configuration.
pub trait EnvProvider {
    /// Returns the environment value for `key`, if available.
    fn get(&self, key: &str) -> Option<String>;
}

/// [`EnvProvider`] implementation backed by process environment variables.
pub struct ProcessEnvProvider;

impl EnvProvider for ProcessEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Debug, Clone)]
/// [`EnvProvider`] implementation backed by a caller-provided map.
pub struct MapEnvProvider {
    values: HashMap<String, String>,
}

impl MapEnvProvider {
    /// Creates a new map-backed provider.
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl EnvProvider for MapEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Container build stage.
pub enum Stage {
    /// Singletons are created on first request.
    #[default]
    Development,
    /// Singletons are created eagerly while the container is built.
    Production,
}

impl Stage {
    fn parse(raw: &str) -> Result<Self, EngineError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Stage::Development),
            "production" => Ok(Stage::Production),
            other => Err(EngineError::ConfigError(format!(
                "{STAGE_ENV_KEY} must be 'development' or 'production', found '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Options for the report renderer.
pub struct RenderConfig {
    /// Truncates each cause's stack to this many lines when set.
    #[serde(default)]
    pub max_stack_lines: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub stage: Stage,
    #[serde(default)]
    pub render: RenderConfig,
}

impl EngineConfig {
    pub fn from_json(input: &str) -> Result<Self, EngineError> {
        serde_json::from_str(input).map_err(|e| EngineError::ConfigError(e.to_string()))
    }

    /// Reads overrides from the environment; unset keys keep their defaults.
    pub fn from_env(env: &dyn EnvProvider) -> Result<Self, EngineError> {
        let mut config = Self::default();
        if let Some(raw) = env.get(STAGE_ENV_KEY) {
            config.stage = Stage::parse(&raw)?;
        }
        if let Some(raw) = env.get(MAX_STACK_LINES_ENV_KEY) {
            let lines = raw.trim().parse::<usize>().map_err(|_e| {
                EngineError::ConfigError(format!(
                    "{MAX_STACK_LINES_ENV_KEY} must be a non-negative integer, found '{raw}'"
                ))
            })?;
            config.render.max_stack_lines = Some(lines);
        }
        Ok(config)
    }
}
