use crate::descriptor::{DescriptorPool, MessageDescriptor, MethodDescriptor, ServiceDescriptor};
use crate::error::{Direction, Result};
use crate::transport::Protocol;
use self::config::Setting;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub mod call;
pub mod check;
pub mod config;
pub mod describe;
pub mod init;
pub mod methods;

/// Something a command wants the user to know, rendered by the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Initialized(PathBuf),
    AlreadyInitialized(PathBuf),
    /// A setting was written. An empty value means the key was cleared.
    Changed { key: &'static str, value: String },
    /// A setting went back to its default.
    Reset { key: &'static str, value: String },
    Valid {
        direction: Direction,
        type_name: String,
        method_path: String,
    },
    Completed {
        method_path: String,
        protocol: Protocol,
        elapsed_ms: u128,
    },
    NoServices,
}

impl Notice {
    pub fn is_warning(&self) -> bool {
        matches!(self, Notice::AlreadyInitialized(_) | Notice::NoServices)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Initialized(dir) => {
                write!(f, "Initialized rebec-rpc config at {}", dir.display())
            }
            Notice::AlreadyInitialized(dir) => {
                write!(f, "Config already exists at {}", dir.display())
            }
            Notice::Changed { key, value } if value.is_empty() => write!(f, "{} cleared", key),
            Notice::Changed { key, value } => write!(f, "{} set to {}", key, value),
            Notice::Reset { key, value } if value.is_empty() => write!(f, "{} cleared", key),
            Notice::Reset { key, value } => write!(f, "{} reset to {}", key, value),
            Notice::Valid {
                direction,
                type_name,
                method_path,
            } => write!(f, "{} is a valid {} for {}", direction, type_name, method_path),
            Notice::Completed {
                method_path,
                protocol,
                elapsed_ms,
            } => write!(f, "{} via {} in {}ms", method_path, protocol, elapsed_ms),
            Notice::NoServices => f.write_str("No services registered."),
        }
    }
}

/// What a command produced, for the binary to render.
#[derive(Debug, Default)]
pub struct CmdResult {
    /// A JSON document to print (a response, or a normalized request).
    pub document: Option<Value>,
    pub services: Vec<Arc<ServiceDescriptor>>,
    pub message_type: Option<MessageDescriptor>,
    pub settings: Vec<Setting>,
    pub notices: Vec<Notice>,
}

impl CmdResult {
    pub fn notify(mut self, notice: Notice) -> Self {
        self.notices.push(notice);
        self
    }

    pub fn with_document(mut self, document: Value) -> Self {
        self.document = Some(document);
        self
    }

    pub fn with_services(mut self, services: Vec<Arc<ServiceDescriptor>>) -> Self {
        self.services = services;
        self
    }

    pub fn with_message_type(mut self, message: MessageDescriptor) -> Self {
        self.message_type = Some(message);
        self
    }

    pub fn with_settings(mut self, settings: Vec<Setting>) -> Self {
        self.settings = settings;
        self
    }
}

/// Resolves a method argument. A bare name is looked up in the configured service first.
pub fn resolve_method(
    pool: &DescriptorPool,
    default_service: &str,
    method: &str,
) -> Result<(Arc<ServiceDescriptor>, MethodDescriptor)> {
    if !method.contains('/') {
        if let Ok(service) = pool.service(default_service) {
            if let Some(found) = service.find_method(method) {
                let found = found.clone();
                return Ok((service, found));
            }
        }
    }
    pool.resolve_method(method)
}
