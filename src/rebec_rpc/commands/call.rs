use crate::client::CallOptions;
use crate::commands::{resolve_method, CmdResult, Notice};
use crate::config::RpcConfig;
use crate::descriptor::DescriptorPool;
use crate::error::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

pub async fn run(
    config: &RpcConfig,
    pool: Arc<DescriptorPool>,
    method: &str,
    request: &Value,
) -> Result<CmdResult> {
    let (service, descriptor) = resolve_method(&pool, &config.service, method)?;
    let client = config
        .client_builder(pool)?
        .service(service.full_name.clone())
        .build()?;

    let started = Instant::now();
    let response = client
        .call(&descriptor.name, request, CallOptions::default())
        .await?;

    Ok(CmdResult::default()
        .with_document(response)
        .notify(Notice::Completed {
            method_path: service.method_path(&descriptor.name),
            protocol: client.protocol(),
            elapsed_ms: started.elapsed().as_millis(),
        }))
}
