//! Error types for the component framework and its serial endpoint

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("instance name [{name}] clashes with an existing sibling under [{parent}]")]
    NameClash { parent: String, name: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("parameter [{descriptor}] is not of type [{requested}]")]
    TypeMismatch {
        descriptor: String,
        requested: &'static str,
    },

    #[error("invalid value for parameter [{param}]: {reason}")]
    Validation { param: String, reason: String },

    #[error("multiple matches for descriptor [{0}] while only one is allowed")]
    MultipleMatch(String),

    #[error("invalid descriptor [{descriptor}]: {reason}")]
    InvalidDescriptor { descriptor: String, reason: String },

    #[error("device configuration rejected for [{device}]: {reason}")]
    DeviceConfig { device: String, reason: String },

    #[error("lifecycle error in [{component}]: {reason}")]
    Lifecycle { component: String, reason: String },

    #[error("timeout waiting for end of line")]
    Timeout,

    #[error("serial write overflow on [{0}]")]
    WriteOverflow(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            param: param.into(),
            reason: reason.into(),
        }
    }

    pub fn device_config(device: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::DeviceConfig {
            device: device.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_descriptor(descriptor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            descriptor: descriptor.into(),
            reason: reason.into(),
        }
    }

    /// Validation errors raised while parsing a string carry no parameter
    /// name yet; the parameter layer fills it in.
    pub(crate) fn with_param(self, name: &str) -> Self {
        match self {
            Self::Validation { param, reason } if param.is_empty() => Self::Validation {
                param: name.to_string(),
                reason,
            },
            other => other,
        }
    }
}
