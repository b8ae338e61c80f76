use crate::config::Network;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("USDT contract address not configured for {network}. Please set {env_var} in .env file")]
    Configuration {
        network: Network,
        env_var: &'static str,
    },

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("corrupt wallet file {}: {reason}", path.display())]
    CorruptWalletFile { path: PathBuf, reason: String },

    #[error("input closed")]
    InputClosed,
}

impl WalletError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Short machine-friendly label, used as a structured log field.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Configuration { .. } => "configuration",
            Self::Gateway(_) => "gateway",
            Self::CorruptWalletFile { .. } => "corrupt_wallet_file",
            Self::InputClosed => "input_closed",
        }
    }
}

/// Classify an error report for logging. Untyped failures default to `fallback`.
pub fn error_code(err: &eyre::Report, fallback: &'static str) -> &'static str {
    err.downcast_ref::<WalletError>()
        .map_or(fallback, WalletError::code)
}

pub fn is_input_closed(err: &eyre::Report) -> bool {
    matches!(err.downcast_ref::<WalletError>(), Some(WalletError::InputClosed))
}
