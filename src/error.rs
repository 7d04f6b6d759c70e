use miette::Diagnostic;
use thiserror::Error;

use crate::backend::rpc::RpcError;

#[derive(Debug, Error, Diagnostic)]
pub enum RotateError {
    #[error("{message}")]
    Usage {
        message: String,
        #[help]
        usage: String,
    },

    #[error("failed to connect to {url}")]
    #[diagnostic(help("check that the URL points at a Xen Orchestra instance"))]
    Connect {
        url: String,
        #[source]
        source: RpcError,
    },

    #[error("sign-in rejected")]
    #[diagnostic(help("check the token or user/password"))]
    Auth {
        #[source]
        source: RpcError,
    },

    #[error("failed to fetch inventory: {message}")]
    Inventory { message: String },

    #[error("snapshot of VM '{vm}' failed")]
    SnapshotCreate {
        vm: String,
        #[source]
        source: RpcError,
    },

    #[error("deleting snapshot '{snapshot}' of VM '{vm}' failed")]
    SnapshotDelete {
        vm: String,
        snapshot: String,
        #[source]
        source: RpcError,
    },

    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("failed to open log file {path}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("prompt error: {message}")]
    Prompt { message: String },

    #[error("cancelled")]
    PromptCancelled,
}

impl RotateError {
    /// Error chain flattened into one line, for event records and logs.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            out.push_str(": ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }
}
