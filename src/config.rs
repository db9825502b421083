//! Run configuration.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid {key} {value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("queue_capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("predicate_key must not be empty")]
    EmptyPredicateKey,
}

/// What a run does when an item fails terminally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep going; every failure is listed in the report.
    #[default]
    BestEffort,
    /// Cancel the run on the first failure and return that error.
    FailFast,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "best_effort" => Ok(FailurePolicy::BestEffort),
            "fail_fast" => Ok(FailurePolicy::FailFast),
            other => Err(format!("unknown failure policy {:?}", other)),
        }
    }
}

/// Settings for one client and every run it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpsertConfig {
    /// Upper bound on concurrent workers. Env: `UPSERT_WORKERS`, default 16.
    pub workers: usize,
    /// Bound of the input queue. Env: `UPSERT_QUEUE_CAPACITY`, default 64.
    pub queue_capacity: usize,
    /// Conflict retries per item before giving up; unbounded when `None`.
    /// Env: `UPSERT_MAX_CONFLICT_RETRIES`, default unbounded.
    pub max_conflict_retries: Option<usize>,
    /// Env: `UPSERT_FAILURE_POLICY` (`best_effort` or `fail_fast`).
    pub failure_policy: FailurePolicy,
    /// Unique predicate used when building nodes from maps.
    /// Env: `UPSERT_PREDICATE_KEY`, default `name`.
    pub predicate_key: String,
}

impl Default for UpsertConfig {
    fn default() -> Self {
        UpsertConfig {
            workers: 16,
            queue_capacity: 64,
            max_conflict_retries: None,
            failure_policy: FailurePolicy::BestEffort,
            predicate_key: "name".to_string(),
        }
    }
}

impl UpsertConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_max_conflict_retries(mut self, retries: usize) -> Self {
        self.max_conflict_retries = Some(retries);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_predicate_key(mut self, key: impl Into<String>) -> Self {
        self.predicate_key = key.into();
        self
    }

    /// Load from `UPSERT_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`UpsertConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = UpsertConfig::default();

        if let Some(value) = lookup("UPSERT_WORKERS") {
            config.workers = parse_value("UPSERT_WORKERS", &value)?;
        }
        if let Some(value) = lookup("UPSERT_QUEUE_CAPACITY") {
            config.queue_capacity = parse_value("UPSERT_QUEUE_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("UPSERT_MAX_CONFLICT_RETRIES") {
            config.max_conflict_retries =
                Some(parse_value("UPSERT_MAX_CONFLICT_RETRIES", &value)?);
        }
        if let Some(value) = lookup("UPSERT_FAILURE_POLICY") {
            config.failure_policy = parse_value("UPSERT_FAILURE_POLICY", &value)?;
        }
        if let Some(value) = lookup("UPSERT_PREDICATE_KEY") {
            config.predicate_key = value;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.predicate_key.trim().is_empty() {
            return Err(ConfigError::EmptyPredicateKey);
        }
        Ok(())
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}
