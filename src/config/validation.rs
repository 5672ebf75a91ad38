//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation of runtime settings (serde handles syntactic)
//! - The function config contract: decode JSON into `C`, then `C::ok`
//! - Map config failures onto the single error served to every request
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Loader causes are logged; callers only see a generic message
//! - Validation messages describe the operator's own input and are echoed

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::loader::ConfigLoader;
use crate::config::schema::RuntimeSettings;
use crate::envelope::ApiError;

/// A semantic problem in the runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Composed validation error of a function config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigErrors {
    messages: Vec<String>,
}

impl ConfigErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// `Ok` when nothing was pushed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl<S: Into<String>> FromIterator<S> for ConfigErrors {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages.join("\n"))
    }
}

impl std::error::Error for ConfigErrors {}

/// Contract for a function's own config type.
pub trait FnConfig: DeserializeOwned + Send + Sync + 'static {
    /// A value to use without consulting any config source.
    fn skipped() -> Option<Self> {
        None
    }

    fn ok(&self) -> Result<(), ConfigErrors> {
        Ok(())
    }
}

/// Config type for functions that take no config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SkipCfg;

impl FnConfig for SkipCfg {
    fn skipped() -> Option<Self> {
        Some(SkipCfg)
    }
}

/// A config failure: the caller-visible error plus its logged cause.
#[derive(Debug)]
pub struct ConfigFailure {
    pub api: ApiError,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for ConfigFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{}: {}", self.api, src),
            None => write!(f, "{}", self.api),
        }
    }
}

impl std::error::Error for ConfigFailure {}

/// Load, decode and validate the function config.
pub async fn read_config<C: FnConfig>(
    loader: &dyn ConfigLoader,
    settings: &RuntimeSettings,
) -> Result<C, ConfigFailure> {
    if let Some(cfg) = C::skipped() {
        return Ok(cfg);
    }

    let raw = loader.load_config(settings).await.map_err(|e| ConfigFailure {
        api: ApiError::internal("failed to read config source"),
        source: Some(Box::new(e)),
    })?;

    let cfg: C = serde_json::from_slice(&raw).map_err(|e| ConfigFailure {
        api: ApiError::bad_request("failed to unmarshal config into config type"),
        source: Some(Box::new(e)),
    })?;

    cfg.ok().map_err(|e| ConfigFailure {
        api: ApiError::bad_request(format!("config is invalid: {e}")),
        source: None,
    })?;

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::{ConfigError, EnvConfigLoader, FsConfigLoader};
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    #[derive(Debug, Deserialize)]
    struct Cfg {
        name: String,
        replicas: u32,
    }

    impl FnConfig for Cfg {
        fn ok(&self) -> Result<(), ConfigErrors> {
            let mut errs = ConfigErrors::new();
            if self.name.is_empty() {
                errs.push("name is required");
            }
            if self.replicas == 0 {
                errs.push("replicas must be positive");
            }
            errs.into_result()
        }
    }

    fn env(json: &str) -> EnvConfigLoader {
        EnvConfigLoader::with_value(STANDARD.encode(json))
    }

    #[tokio::test]
    async fn valid_config_loads() {
        let cfg: Cfg = read_config(&env(r#"{"name":"x","replicas":2}"#), &RuntimeSettings::default())
            .await
            .unwrap();
        assert_eq!(cfg.name, "x");
    }

    #[tokio::test]
    async fn invalid_config_joins_messages() {
        let err = read_config::<Cfg>(&env(r#"{"name":"","replicas":0}"#), &RuntimeSettings::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.api,
            ApiError::bad_request("config is invalid: name is required\nreplicas must be positive")
        );
    }

    #[tokio::test]
    async fn undecodable_config_is_bad_request() {
        let err = read_config::<Cfg>(&env(r#"{"name":1}"#), &RuntimeSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err.api, ApiError::bad_request("failed to unmarshal config into config type"));
    }

    struct Failing;

    #[async_trait]
    impl ConfigLoader for Failing {
        async fn load_config(&self, _settings: &RuntimeSettings) -> Result<Vec<u8>, ConfigError> {
            Err(ConfigError::NotFound)
        }
    }

    #[tokio::test]
    async fn loader_failure_is_internal() {
        let err = read_config::<Cfg>(&Failing, &RuntimeSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err.api, ApiError::internal("failed to read config source"));
        assert!(err.source.is_some());
    }

    #[tokio::test]
    async fn skip_cfg_never_loads() {
        let cfg = read_config::<SkipCfg>(&FsConfigLoader, &RuntimeSettings::default())
            .await
            .unwrap();
        assert_eq!(cfg, SkipCfg);
    }
}
