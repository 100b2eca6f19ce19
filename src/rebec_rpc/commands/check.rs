//! Offline contract check: validate a document against a method's descriptors.

use crate::commands::{resolve_method, CmdResult, Notice};
use crate::descriptor::DescriptorPool;
use crate::error::{Direction, Result};
use crate::message::{self, DecodeOptions};
use serde_json::Value;

pub fn run(
    pool: &DescriptorPool,
    default_service: &str,
    method: &str,
    document: &Value,
    direction: Direction,
) -> Result<CmdResult> {
    let (service, descriptor) = resolve_method(pool, default_service, method)?;
    let type_name = match direction {
        Direction::Request => &descriptor.input_type,
        Direction::Response => &descriptor.output_type,
    };
    let normalized = message::normalize(pool, type_name, document, direction, DecodeOptions::default())?;

    Ok(CmdResult::default()
        .with_document(normalized)
        .notify(Notice::Valid {
            direction,
            type_name: type_name.clone(),
            method_path: service.method_path(&descriptor.name),
        }))
}
