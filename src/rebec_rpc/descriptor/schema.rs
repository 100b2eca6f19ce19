//! JSON schema documents.
//!
//! A schema document declares one package worth of messages, enums and services:
//!
//! ```json
//! {
//!   "package": "prompt.v1",
//!   "messages": [
//!     { "name": "PromptRunRequest",
//!       "fields": [
//!         { "name": "tool_name", "type": "string", "required": true },
//!         { "name": "tools", "type": "ToolDefinition", "repeated": true },
//!         { "name": "labels", "type": "map<string, string>" }
//!       ] }
//!   ],
//!   "enums": [ { "name": "Level", "values": ["LEVEL_UNSPECIFIED", "HIGH"] } ],
//!   "services": [
//!     { "name": "PromptService",
//!       "methods": [ { "name": "Run", "input": "PromptRunRequest", "output": "PromptRunResponse" } ] }
//!   ]
//! }
//! ```
//!
//! Type names without a dot are relative to the document's package.

use super::{
    EnumDescriptor, FieldDescriptor, FieldKind, MessageDescriptor, MethodDescriptor,
    PoolBuilder, ServiceDescriptor, STRUCT_TYPE, VALUE_TYPE,
};
use crate::error::{Result, RpcError};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub messages: Vec<MessageDef>,
    #[serde(default)]
    pub enums: Vec<EnumDef>,
    #[serde(default)]
    pub services: Vec<ServiceDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub repeated: bool,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDef {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodDef {
    pub name: String,
    pub input: String,
    pub output: String,
}

impl SchemaDocument {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| RpcError::Config(format!("invalid schema document: {}", e)))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            RpcError::Config(format!("cannot read schema {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    fn qualify(&self, name: &str) -> String {
        if name.contains('.') || self.package.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.package, name)
        }
    }

    fn parse_kind(&self, type_name: &str) -> Result<FieldKind> {
        let t = type_name.trim();
        if let Some(inner) = t.strip_prefix("map<").and_then(|s| s.strip_suffix('>')) {
            let (k, v) = inner
                .split_once(',')
                .ok_or_else(|| RpcError::Config(format!("malformed map type: {}", t)))?;
            return Ok(FieldKind::Map(
                Box::new(self.parse_kind(k)?),
                Box::new(self.parse_kind(v)?),
            ));
        }
        let kind = match t {
            "string" => FieldKind::String,
            "bool" => FieldKind::Bool,
            "int32" | "sint32" | "sfixed32" => FieldKind::Int32,
            "uint32" | "fixed32" => FieldKind::Uint32,
            "int64" | "sint64" | "sfixed64" => FieldKind::Int64,
            "uint64" | "fixed64" => FieldKind::Uint64,
            "float" => FieldKind::Float,
            "double" => FieldKind::Double,
            "bytes" => FieldKind::Bytes,
            STRUCT_TYPE => FieldKind::Struct,
            VALUE_TYPE => FieldKind::Value,
            "" => return Err(RpcError::Config("empty type name".to_string())),
            other => FieldKind::Message(self.qualify(other)),
        };
        Ok(kind)
    }

    /// Adds every declaration in this document to `builder`.
    pub fn register(&self, mut builder: PoolBuilder) -> Result<PoolBuilder> {
        for e in &self.enums {
            builder = builder.enumeration(EnumDescriptor::new(self.qualify(&e.name), e.values.clone()));
        }
        for m in &self.messages {
            let mut message = MessageDescriptor::new(self.qualify(&m.name));
            for f in &m.fields {
                let kind = self.parse_kind(&f.type_name).map_err(|e| {
                    RpcError::Config(format!("{}.{}: {}", m.name, f.name, e))
                })?;
                let mut field = FieldDescriptor::new(f.name.clone(), kind);
                if f.repeated {
                    field = field.repeated();
                }
                if f.required {
                    field = field.required();
                }
                message = message.field(field);
            }
            builder = builder.message(message);
        }
        for s in &self.services {
            let mut service = ServiceDescriptor::new(self.qualify(&s.name));
            for m in &s.methods {
                service = service.method(MethodDescriptor::new(
                    m.name.clone(),
                    self.qualify(&m.input),
                    self.qualify(&m.output),
                ));
            }
            builder = builder.service(service);
        }
        Ok(builder)
    }
}

impl PoolBuilder {
    /// Loads and registers a schema document from disk.
    pub fn with_schema_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        SchemaDocument::load(path)?.register(self)
    }
}
