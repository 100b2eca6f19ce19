//! Reads and writes the client settings stored in a scope's `config.json`.

use crate::commands::{CmdResult, Notice};
use crate::config::{ConfigPaths, RpcConfig, Scope, KEYS};
use crate::descriptor::DescriptorPool;
use crate::error::{Result, RpcError};
use crate::transport::Endpoint;

/// A stored setting and whether it still holds its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub key: &'static str,
    pub value: String,
    pub is_default: bool,
}

#[derive(Debug, Clone)]
pub enum ConfigAction {
    List,
    Get(String),
    Set(String, String),
    Unset(String),
}

pub fn run(paths: &ConfigPaths, scope: Scope, action: ConfigAction) -> Result<CmdResult> {
    let dir = paths.scope_dir(scope)?;
    let mut config = RpcConfig::load(&dir)?;
    match action {
        ConfigAction::List => {
            let settings = KEYS.into_iter().map(|key| setting(&config, key)).collect();
            Ok(CmdResult::default().with_settings(settings))
        }
        ConfigAction::Get(key) => {
            let key = known_key(&key)?;
            Ok(CmdResult::default().with_settings(vec![setting(&config, key)]))
        }
        ConfigAction::Set(key, value) => {
            let key = known_key(&key)?;
            config.set(key, &value).map_err(RpcError::Config)?;
            check_setting(&config, key)?;
            config.save(&dir)?;
            let value = config.get(key).unwrap_or_default();
            Ok(CmdResult::default().notify(Notice::Changed { key, value }))
        }
        ConfigAction::Unset(key) => {
            let key = known_key(&key)?;
            let default = RpcConfig::default().get(key).unwrap_or_default();
            config.set(key, &default).map_err(RpcError::Config)?;
            config.save(&dir)?;
            Ok(CmdResult::default().notify(Notice::Reset {
                key,
                value: default,
            }))
        }
    }
}

fn known_key(key: &str) -> Result<&'static str> {
    KEYS.iter().copied().find(|k| *k == key).ok_or_else(|| {
        RpcError::Config(format!(
            "Unknown config key: {} (valid keys: {})",
            key,
            KEYS.join(", ")
        ))
    })
}

fn setting(config: &RpcConfig, key: &'static str) -> Setting {
    let value = config.get(key).unwrap_or_default();
    let is_default = RpcConfig::default().get(key).as_deref() == Some(value.as_str());
    Setting {
        key,
        value,
        is_default,
    }
}

/// Rejects values that parse but could never be used by `call`.
fn check_setting(config: &RpcConfig, key: &str) -> Result<()> {
    match key {
        "base_url" => match &config.base_url {
            Some(url) => Endpoint::parse(url).map(|_| ()),
            None => Ok(()),
        },
        "schema" => match &config.schema {
            Some(path) => DescriptorPool::builder()
                .with_builtins()
                .with_schema_file(path)?
                .build()
                .map(|_| ()),
            None => Ok(()),
        },
        _ => Ok(()),
    }
}
