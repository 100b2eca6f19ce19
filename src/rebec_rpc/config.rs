use crate::client::{ClientBuilder, DEFAULT_TIMEOUT_MS};
use crate::descriptor::builtin::PROMPT_SERVICE;
use crate::descriptor::DescriptorPool;
use crate::error::{Result, RpcError};
use crate::transport::Protocol;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CONFIG_FILENAME: &str = "config.json";
pub const PROJECT_DIR: &str = ".rebec-rpc";

pub const ENV_BASE_URL: &str = "REBEC_RPC_BASE_URL";
pub const ENV_PROTOCOL: &str = "REBEC_RPC_PROTOCOL";
pub const ENV_TIMEOUT_MS: &str = "REBEC_RPC_TIMEOUT_MS";

pub const KEYS: [&str; 8] = [
    "base_url",
    "protocol",
    "service",
    "schema",
    "timeout_ms",
    "headers",
    "allow_unframed_responses",
    "http2_prior_knowledge",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Project,
    Global,
}

/// Where each scope keeps its `config.json`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project: Option<PathBuf>,
    pub global: PathBuf,
}

impl ConfigPaths {
    pub fn scope_dir(&self, scope: Scope) -> Result<PathBuf> {
        match scope {
            Scope::Project => self
                .project
                .clone()
                .ok_or_else(|| RpcError::Config("Project scope is not available".to_string())),
            Scope::Global => Ok(self.global.clone()),
        }
    }
}

/// Client configuration, stored in .rebec-rpc/config.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default)]
    pub protocol: Protocol,

    /// Fully-qualified service name
    #[serde(default = "default_service")]
    pub service: String,

    /// JSON schema document with extra descriptors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<PathBuf>,

    /// 0 disables the deadline
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Sent on every call
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    #[serde(default = "default_true")]
    pub allow_unframed_responses: bool,

    #[serde(default)]
    pub http2_prior_knowledge: bool,
}

fn default_service() -> String {
    PROMPT_SERVICE.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_true() -> bool {
    true
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            protocol: Protocol::default(),
            service: default_service(),
            schema: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            headers: BTreeMap::new(),
            allow_unframed_responses: true,
            http2_prior_knowledge: false,
        }
    }
}

/// Splits `Name: value` (or `Name:value`) into its parts.
pub fn parse_header_arg(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| RpcError::Config(format!("header '{}' must look like Name: value", raw)))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(RpcError::Config(format!("header '{}' has no name", raw)));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_bool(key: &str, value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("{} expects true or false, got '{}'", key, value)),
    }
}

impl RpcConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: RpcConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();
        if !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_dir.join(CONFIG_FILENAME), content)?;
        Ok(())
    }

    pub fn exists<P: AsRef<Path>>(config_dir: P) -> bool {
        config_dir.as_ref().join(CONFIG_FILENAME).exists()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "base_url" => Some(self.base_url.clone().unwrap_or_default()),
            "protocol" => Some(self.protocol.to_string()),
            "service" => Some(self.service.clone()),
            "schema" => Some(
                self.schema
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            ),
            "timeout_ms" => Some(self.timeout_ms.to_string()),
            "headers" => Some(
                self.headers
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            "allow_unframed_responses" => Some(self.allow_unframed_responses.to_string()),
            "http2_prior_knowledge" => Some(self.http2_prior_knowledge.to_string()),
            _ => None,
        }
    }

    /// Sets a key from its string form. An empty value clears optional keys.
    pub fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), String> {
        match key {
            "base_url" => {
                self.base_url = (!value.trim().is_empty()).then(|| value.trim().to_string());
            }
            "protocol" => self.protocol = value.parse().map_err(|e: RpcError| e.to_string())?,
            "service" => {
                if value.trim().is_empty() {
                    return Err("service cannot be empty".to_string());
                }
                self.service = value.trim().to_string();
            }
            "schema" => {
                self.schema = (!value.trim().is_empty()).then(|| PathBuf::from(value.trim()));
            }
            "timeout_ms" => {
                self.timeout_ms = value
                    .trim()
                    .parse()
                    .map_err(|_| format!("timeout_ms expects milliseconds, got '{}'", value))?;
            }
            "headers" => {
                let mut headers = BTreeMap::new();
                for part in value.split(',').filter(|p| !p.trim().is_empty()) {
                    let (k, v) = parse_header_arg(part).map_err(|e| e.to_string())?;
                    headers.insert(k, v);
                }
                self.headers = headers;
            }
            "allow_unframed_responses" => self.allow_unframed_responses = parse_bool(key, value)?,
            "http2_prior_knowledge" => self.http2_prior_knowledge = parse_bool(key, value)?,
            _ => {
                return Err(format!(
                    "Unknown config key: {} (valid keys: {})",
                    key,
                    KEYS.join(", ")
                ))
            }
        }
        Ok(())
    }

    /// Applies `REBEC_RPC_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for (var, key) in [
            (ENV_BASE_URL, "base_url"),
            (ENV_PROTOCOL, "protocol"),
            (ENV_TIMEOUT_MS, "timeout_ms"),
        ] {
            if let Some(value) = lookup(var) {
                self.set(key, &value)
                    .map_err(|e| RpcError::Config(format!("{}: {}", var, e)))?;
            }
        }
        Ok(())
    }

    /// Built-in descriptors plus the configured schema document, if any.
    pub fn descriptor_pool(&self) -> Result<Arc<DescriptorPool>> {
        let mut builder = DescriptorPool::builder().with_builtins();
        if let Some(schema) = &self.schema {
            builder = builder.with_schema_file(schema)?;
        }
        Ok(Arc::new(builder.build()?))
    }

    pub fn client_builder(&self, pool: Arc<DescriptorPool>) -> Result<ClientBuilder> {
        let base_url = self.base_url.clone().ok_or_else(|| {
            RpcError::Config(
                "no base URL configured; pass --base-url or run `rebec-rpc config base_url <URL>`"
                    .to_string(),
            )
        })?;
        let mut builder = ClientBuilder::new(base_url)
            .service(self.service.clone())
            .pool(pool)
            .protocol(self.protocol)
            .timeout_ms(self.timeout_ms)
            .allow_unframed_responses(self.allow_unframed_responses)
            .http2_prior_knowledge(self.http2_prior_knowledge);
        for (name, value) in &self.headers {
            builder = builder.header(name.clone(), value.clone());
        }
        Ok(builder)
    }
}
