use crate::commands::{CmdResult, Notice};
use crate::config::{ConfigPaths, RpcConfig, Scope};
use crate::error::Result;
use crate::transport::Endpoint;

/// Writes a default `config.json` for the scope, seeded with `base_url` when given.
pub fn run(paths: &ConfigPaths, scope: Scope, base_url: Option<&str>) -> Result<CmdResult> {
    let dir = paths.scope_dir(scope)?;
    if RpcConfig::exists(&dir) {
        return Ok(CmdResult::default().notify(Notice::AlreadyInitialized(dir)));
    }

    let mut config = RpcConfig::default();
    if let Some(url) = base_url {
        Endpoint::parse(url)?;
        config.base_url = Some(url.trim().to_string());
    }
    config.save(&dir)?;
    Ok(CmdResult::default().notify(Notice::Initialized(dir)))
}
