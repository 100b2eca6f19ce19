//! # Descriptor Registry
//!
//! Descriptors describe the shape of every message a service exchanges. They drive request
//! validation before anything touches the network, and response validation after.
//!
//! ## Sources
//!
//! A [`DescriptorPool`] is assembled once, at startup, from:
//! - [`builtin`]: descriptors for the services this client ships with, written in Rust
//! - [`schema`]: JSON schema documents loaded from disk
//!
//! ## Immutability
//!
//! [`PoolBuilder::build`] resolves every named type reference and returns a pool that never
//! changes afterward. Clients hold it behind an `Arc` and share it across concurrent calls;
//! nothing is re-parsed per call.

use crate::error::{Result, RpcError};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

pub mod builtin;
pub mod schema;

pub const STRUCT_TYPE: &str = "google.protobuf.Struct";
pub const VALUE_TYPE: &str = "google.protobuf.Value";

/// The type of a single field, following the protobuf JSON mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Bool,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float,
    Double,
    Bytes,
    /// Fully-qualified enum name.
    Enum(String),
    /// Fully-qualified message name.
    Message(String),
    Map(Box<FieldKind>, Box<FieldKind>),
    /// `google.protobuf.Struct`: any JSON object.
    Struct,
    /// `google.protobuf.Value`: any JSON value, including null.
    Value,
}

impl FieldKind {
    pub fn is_valid_map_key(&self) -> bool {
        matches!(
            self,
            FieldKind::String
                | FieldKind::Bool
                | FieldKind::Int32
                | FieldKind::Uint32
                | FieldKind::Int64
                | FieldKind::Uint64
        )
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::String => write!(f, "string"),
            FieldKind::Bool => write!(f, "bool"),
            FieldKind::Int32 => write!(f, "int32"),
            FieldKind::Uint32 => write!(f, "uint32"),
            FieldKind::Int64 => write!(f, "int64"),
            FieldKind::Uint64 => write!(f, "uint64"),
            FieldKind::Float => write!(f, "float"),
            FieldKind::Double => write!(f, "double"),
            FieldKind::Bytes => write!(f, "bytes"),
            FieldKind::Enum(name) | FieldKind::Message(name) => write!(f, "{}", name),
            FieldKind::Map(k, v) => write!(f, "map<{}, {}>", k, v),
            FieldKind::Struct => write!(f, "{}", STRUCT_TYPE),
            FieldKind::Value => write!(f, "{}", VALUE_TYPE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub json_name: String,
    pub kind: FieldKind,
    pub repeated: bool,
    pub required: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            json_name: json_name(&name),
            name,
            kind,
            repeated: false,
            required: false,
        }
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// `repeated string tags`, `map<string, int32> counts`, ...
    pub fn type_label(&self) -> String {
        if self.repeated {
            format!("repeated {}", self.kind)
        } else {
            self.kind.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDescriptor {
    pub full_name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl MessageDescriptor {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Looks a field up by proto name or JSON name.
    pub fn find_field(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name == key)
            .or_else(|| self.fields.iter().find(|f| f.json_name == key))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDescriptor {
    pub full_name: String,
    /// Value names, indexed by their number.
    pub values: Vec<String>,
}

impl EnumDescriptor {
    pub fn new(full_name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            full_name: full_name.into(),
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    pub input_type: String,
    pub output_type: String,
}

impl MethodDescriptor {
    pub fn new(
        name: impl Into<String>,
        input_type: impl Into<String>,
        output_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            input_type: input_type.into(),
            output_type: output_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub full_name: String,
    pub methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            methods: Vec::new(),
        }
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn find_method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// The HTTP path of a method: `/<package>.<Service>/<Method>`.
    pub fn method_path(&self, method: &str) -> String {
        format!("/{}/{}", self.full_name, method)
    }
}

/// Immutable registry of services, messages and enums.
#[derive(Debug, Default)]
pub struct DescriptorPool {
    messages: HashMap<String, MessageDescriptor>,
    enums: HashMap<String, EnumDescriptor>,
    services: BTreeMap<String, Arc<ServiceDescriptor>>,
}

impl DescriptorPool {
    pub fn builder() -> PoolBuilder {
        PoolBuilder::default()
    }

    pub fn message(&self, name: &str) -> Result<&MessageDescriptor> {
        self.messages
            .get(name)
            .ok_or_else(|| RpcError::Config(format!("message type not found: {}", name)))
    }

    /// Looks a message up by full name, or by its short name when that is unique.
    pub fn find_message(&self, name: &str) -> Result<&MessageDescriptor> {
        if let Some(m) = self.messages.get(name) {
            return Ok(m);
        }
        let mut matches = self
            .messages
            .values()
            .filter(|m| m.full_name.rsplit('.').next() == Some(name));
        match (matches.next(), matches.next()) {
            (Some(m), None) => Ok(m),
            (Some(_), Some(_)) => Err(RpcError::Config(format!(
                "message name {} is ambiguous; use the fully-qualified name",
                name
            ))),
            (None, _) => Err(RpcError::Config(format!("message type not found: {}", name))),
        }
    }

    pub fn enumeration(&self, name: &str) -> Option<&EnumDescriptor> {
        self.enums.get(name)
    }

    pub fn service(&self, name: &str) -> Result<Arc<ServiceDescriptor>> {
        self.services
            .get(name)
            .cloned()
            .ok_or_else(|| RpcError::Config(format!("service not found: {}", name)))
    }

    pub fn services(&self) -> impl Iterator<Item = &Arc<ServiceDescriptor>> {
        self.services.values()
    }

    /// Resolves `Service/Method`, `package.Service/Method`, or a bare method name when only one
    /// service declares it.
    pub fn resolve_method(&self, target: &str) -> Result<(Arc<ServiceDescriptor>, MethodDescriptor)> {
        let target = target.trim_start_matches('/');
        if let Some((svc, method)) = target.rsplit_once('/') {
            let service = match self.services.get(svc) {
                Some(s) => s.clone(),
                None => self
                    .services
                    .values()
                    .find(|s| s.full_name.rsplit('.').next() == Some(svc))
                    .cloned()
                    .ok_or_else(|| RpcError::Config(format!("service not found: {}", svc)))?,
            };
            let found = service
                .find_method(method)
                .cloned()
                .ok_or_else(|| RpcError::UnknownMethod(format!("{}/{}", service.full_name, method)))?;
            return Ok((service, found));
        }

        let mut matches = self
            .services
            .values()
            .filter_map(|s| s.find_method(target).map(|m| (s.clone(), m.clone())));
        match (matches.next(), matches.next()) {
            (Some(found), None) => Ok(found),
            (Some(_), Some(_)) => Err(RpcError::Config(format!(
                "method {} is ambiguous; qualify it as Service/{}",
                target, target
            ))),
            (None, _) => Err(RpcError::UnknownMethod(target.to_string())),
        }
    }
}

/// Collects descriptors and resolves them into a [`DescriptorPool`].
#[derive(Debug, Default)]
pub struct PoolBuilder {
    messages: Vec<MessageDescriptor>,
    enums: Vec<EnumDescriptor>,
    services: Vec<ServiceDescriptor>,
}

impl PoolBuilder {
    pub fn message(mut self, message: MessageDescriptor) -> Self {
        self.messages.push(message);
        self
    }

    pub fn enumeration(mut self, descriptor: EnumDescriptor) -> Self {
        self.enums.push(descriptor);
        self
    }

    pub fn service(mut self, service: ServiceDescriptor) -> Self {
        self.services.push(service);
        self
    }

    pub fn with_builtins(self) -> Self {
        builtin::register(self)
    }

    pub fn build(self) -> Result<DescriptorPool> {
        let mut pool = DescriptorPool::default();

        for e in self.enums {
            if e.values.is_empty() {
                return Err(RpcError::Config(format!("enum {} has no values", e.full_name)));
            }
            if pool.enums.contains_key(&e.full_name) {
                return Err(RpcError::Config(format!("duplicate type: {}", e.full_name)));
            }
            pool.enums.insert(e.full_name.clone(), e);
        }
        for m in self.messages {
            if pool.messages.contains_key(&m.full_name) || pool.enums.contains_key(&m.full_name) {
                return Err(RpcError::Config(format!("duplicate type: {}", m.full_name)));
            }
            pool.messages.insert(m.full_name.clone(), m);
        }

        // Named references start out as Message(..); rewrite the ones that point at enums.
        let enum_names: Vec<String> = pool.enums.keys().cloned().collect();
        let message_names: Vec<String> = pool.messages.keys().cloned().collect();
        for message in pool.messages.values_mut() {
            for field in &mut message.fields {
                resolve_kind(&mut field.kind, &message_names, &enum_names).map_err(|name| {
                    RpcError::Config(format!(
                        "{}.{} references unknown type {}",
                        message.full_name, field.name, name
                    ))
                })?;
                if let FieldKind::Map(key, _) = &field.kind {
                    if !key.is_valid_map_key() {
                        return Err(RpcError::Config(format!(
                            "{}.{}: {} is not a valid map key",
                            message.full_name, field.name, key
                        )));
                    }
                }
            }
        }

        for s in self.services {
            if pool.services.contains_key(&s.full_name) {
                return Err(RpcError::Config(format!("duplicate service: {}", s.full_name)));
            }
            for m in &s.methods {
                for ty in [&m.input_type, &m.output_type] {
                    if !pool.messages.contains_key(ty) {
                        return Err(RpcError::Config(format!(
                            "{}/{} references unknown message {}",
                            s.full_name, m.name, ty
                        )));
                    }
                }
            }
            pool.services.insert(s.full_name.clone(), Arc::new(s));
        }

        Ok(pool)
    }
}

fn resolve_kind(
    kind: &mut FieldKind,
    messages: &[String],
    enums: &[String],
) -> std::result::Result<(), String> {
    match kind {
        FieldKind::Message(name) => {
            if messages.iter().any(|m| m == name) {
                Ok(())
            } else if enums.iter().any(|e| e == name) {
                *kind = FieldKind::Enum(name.clone());
                Ok(())
            } else {
                Err(name.clone())
            }
        }
        FieldKind::Enum(name) => {
            if enums.iter().any(|e| e == name) {
                Ok(())
            } else {
                Err(name.clone())
            }
        }
        FieldKind::Map(k, v) => {
            resolve_kind(k, messages, enums)?;
            resolve_kind(v, messages, enums)
        }
        _ => Ok(()),
    }
}

/// Derives the protobuf JSON name: `max_output_tokens` → `maxOutputTokens`.
pub fn json_name(proto_name: &str) -> String {
    let mut out = String::with_capacity(proto_name.len());
    let mut upper_next = false;
    for c in proto_name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
