use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Vertex AI region the relay talks to.
pub const VERTEX_LOCATION: &str = "us-central1";

/// Model every request is served by. Also reported back as `modelVersion`.
pub const MODEL_ID: &str = "gemini-1.5-flash";

/// Host of the GCE / Cloud Run metadata server.
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub common: core_config::Config,
    pub gcp: GcpConfig,
    pub vertex: VertexSettings,
}

#[derive(Debug, Clone)]
pub struct GcpConfig {
    pub project_id: String,
    pub location: String,
}

#[derive(Debug, Clone)]
pub struct VertexSettings {
    /// Base URL of the Vertex AI API, without trailing slash.
    pub api_base: String,
    /// Metadata server host used for ambient credentials.
    pub metadata_host: String,
    /// Fixed bearer token, bypassing the metadata server (local development).
    pub access_token: Option<Secret<String>>,
}

impl RelayConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_lookup(common_config, |key| env::var(key).ok())
    }

    fn from_lookup(
        common: core_config::Config,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let get_env = |key: &str, default: Option<&str>| -> Result<String, AppError> {
            match lookup(key).filter(|v| !v.is_empty()) {
                Some(val) => Ok(val),
                None => default.map(str::to_string).ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!("{} is required but not set", key))
                }),
            }
        };

        let default_api_base = format!("https://{}-aiplatform.googleapis.com", VERTEX_LOCATION);

        Ok(RelayConfig {
            common,
            gcp: GcpConfig {
                project_id: get_env("GCP_PROJECT", None)?,
                location: VERTEX_LOCATION.to_string(),
            },
            vertex: VertexSettings {
                api_base: get_env("VERTEX_API_BASE", Some(default_api_base.as_str()))?
                    .trim_end_matches('/')
                    .to_string(),
                metadata_host: get_env("GCE_METADATA_HOST", Some(DEFAULT_METADATA_HOST))?,
                access_token: lookup("VERTEX_ACCESS_TOKEN")
                    .filter(|v| !v.is_empty())
                    .map(Secret::new),
            },
        })
    }
}
