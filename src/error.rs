//! Error types for the bridge.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The inbound request is malformed. Never reaches the target.
    #[error("Invalid request: {message}")]
    Validation { message: String },

    #[error("Target unreachable: {message}")]
    UpstreamUnreachable { message: String },

    #[error("Target timed out: {message}")]
    UpstreamTimeout { message: String },

    /// The target answered with something that is not the expected shape.
    #[error("Target protocol error: {message}")]
    UpstreamProtocol { message: String },

    /// The target answered with a non-success status.
    #[error("Target returned status {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ProxyError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::UpstreamUnreachable {
            message: msg.into(),
        }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::UpstreamTimeout {
            message: msg.into(),
        }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::UpstreamProtocol {
            message: msg.into(),
        }
    }

    /// Map a transport-level reqwest failure onto the upstream taxonomy.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else if err.is_connect() {
            Self::unreachable(err.to_string())
        } else if err.is_decode() || err.is_body() {
            Self::protocol(err.to_string())
        } else {
            Self::unreachable(format!("Request failed: {err}"))
        }
    }

    /// Short machine-readable name, echoed to clients as `reason`.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Validation { .. } | Self::Json(_) => "validation_error",
            Self::UpstreamUnreachable { .. } => "upstream_unreachable",
            Self::UpstreamTimeout { .. } => "upstream_timeout",
            Self::UpstreamProtocol { .. } => "upstream_protocol_error",
            Self::UpstreamStatus { .. } => "upstream_status",
            Self::Config { .. } | Self::Io(_) | Self::Toml(_) => "internal_error",
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::Json(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamUnreachable { .. } | Self::UpstreamProtocol { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamStatus { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Config { .. } | Self::Io(_) | Self::Toml(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
