//! Function config sources.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::schema::RuntimeSettings;

pub const ENV_FN_CONFIG: &str = "FN_CONFIG";

/// Error type for config loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no config provided")]
    NotFound,

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read toml config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to read yaml config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to convert config to json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unable to decode $FN_CONFIG var: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// A source of raw JSON config bytes.
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    async fn load_config(&self, settings: &RuntimeSettings) -> Result<Vec<u8>, ConfigError>;
}

/// Reads the file named by `CS_FN_CONFIG_PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsConfigLoader;

#[async_trait]
impl ConfigLoader for FsConfigLoader {
    async fn load_config(&self, settings: &RuntimeSettings) -> Result<Vec<u8>, ConfigError> {
        let path = settings.config_path.as_deref().ok_or(ConfigError::NotFound)?;
        load_file(path).await
    }
}

async fn load_file(path: &Path) -> Result<Vec<u8>, ConfigError> {
    let raw = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ConfigError::NotFound),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => {
            let value: serde_yaml::Value = serde_yaml::from_slice(&raw)?;
            Ok(serde_json::to_vec(&value)?)
        }
        Some("toml") => {
            let text = String::from_utf8_lossy(&raw);
            let value: toml::Value = toml::from_str(&text)?;
            Ok(serde_json::to_vec(&value)?)
        }
        _ => Ok(raw),
    }
}

/// Decodes the base64 `FN_CONFIG` variable.
#[derive(Debug, Clone, Default)]
pub struct EnvConfigLoader {
    value: Option<String>,
}

impl EnvConfigLoader {
    /// Reads `FN_CONFIG` at load time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `value` instead of the environment.
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }
}

#[async_trait]
impl ConfigLoader for EnvConfigLoader {
    async fn load_config(&self, _settings: &RuntimeSettings) -> Result<Vec<u8>, ConfigError> {
        let raw = match &self.value {
            Some(v) => v.clone(),
            None => std::env::var(ENV_FN_CONFIG).unwrap_or_default(),
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::NotFound);
        }
        Ok(STANDARD.decode(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(path: PathBuf) -> RuntimeSettings {
        RuntimeSettings {
            config_path: Some(path),
            ..RuntimeSettings::default()
        }
    }

    #[tokio::test]
    async fn fs_reads_json_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{"a":1}"#).await.unwrap();

        let b = FsConfigLoader.load_config(&settings_with(path)).await.unwrap();
        assert_eq!(b, br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn fs_converts_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "name = \"x\"\n[limits]\nmax = 3\n").await.unwrap();

        let b = FsConfigLoader.load_config(&settings_with(path)).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&b).unwrap();
        assert_eq!(v, serde_json::json!({"name": "x", "limits": {"max": 3}}));
    }

    #[tokio::test]
    async fn fs_converts_yaml() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["config.yaml", "config.yml"] {
            let path = dir.path().join(name);
            tokio::fs::write(&path, "name: x\nlimits:\n  max: 3\ntags: [a, b]\n")
                .await
                .unwrap();

            let b = FsConfigLoader.load_config(&settings_with(path)).await.unwrap();
            let v: serde_json::Value = serde_json::from_slice(&b).unwrap();
            assert_eq!(
                v,
                serde_json::json!({"name": "x", "limits": {"max": 3}, "tags": ["a", "b"]})
            );
        }
    }

    #[tokio::test]
    async fn fs_invalid_yaml_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        tokio::fs::write(&path, "name: [unclosed\n").await.unwrap();

        let err = FsConfigLoader.load_config(&settings_with(path)).await.unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[tokio::test]
    async fn fs_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsConfigLoader
            .load_config(&settings_with(dir.path().join("nope.json")))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound));

        let err = FsConfigLoader
            .load_config(&RuntimeSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound));
    }

    #[tokio::test]
    async fn env_decodes_base64() {
        let loader = EnvConfigLoader::with_value(STANDARD.encode(r#"{"k":"v"}"#));
        let b = loader.load_config(&RuntimeSettings::default()).await.unwrap();
        assert_eq!(b, br#"{"k":"v"}"#);

        let bad = EnvConfigLoader::with_value("%%%");
        assert!(matches!(
            bad.load_config(&RuntimeSettings::default()).await,
            Err(ConfigError::Base64(_))
        ));
    }
}
