//! Xen Orchestra session: sign-in, inventory and snapshot calls.

use std::fmt;

use serde_json::{Value, json};

use super::ControlPlane;
use super::rpc::{RpcClient, RpcError};
use crate::error::RotateError;
use crate::inventory;
use crate::model::{Identity, Inventory};

/// How to sign in.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Password { user: String, password: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Token(_) => f.write_str("Token(<redacted>)"),
            Credentials::Password { user, .. } => f
                .debug_struct("Password")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// A signed-in connection to one XO instance.
pub struct XoSession {
    rpc: RpcClient,
}

impl XoSession {
    /// Connect to `api_url` (see [`api_url`]) and sign in.
    pub async fn sign_in(api_url: &str, credentials: &Credentials) -> Result<Self, RotateError> {
        let rpc = RpcClient::connect(api_url)
            .await
            .map_err(|source| RotateError::Connect {
                url: api_url.to_string(),
                source,
            })?;

        let (method, params) = match credentials {
            Credentials::Token(token) => ("session.signInWithToken", json!({ "token": token })),
            Credentials::Password { user, password } => (
                "session.signInWithPassword",
                // Older servers identify users by `email`.
                json!({ "user": user, "password": password, "email": user }),
            ),
        };

        let user = rpc
            .call(method, params)
            .await
            .map_err(|source| RotateError::Auth { source })?;
        let email = user.get("email").and_then(Value::as_str).unwrap_or("?");
        tracing::info!(user = email, "signed in");

        Ok(Self { rpc })
    }
}

impl ControlPlane for XoSession {
    async fn fetch_inventory(&self) -> Result<Inventory, RotateError> {
        let objects = self
            .rpc
            .call("xo.getAllObjects", json!({}))
            .await
            .map_err(|e| RotateError::Inventory {
                message: e.to_string(),
            })?;
        inventory::from_objects(objects)
    }

    async fn create_snapshot(&self, vm: &Identity, name: &str) -> Result<Identity, RpcError> {
        let result = self
            .rpc
            .call("vm.snapshot", json!({ "id": vm.as_str(), "name": name }))
            .await?;
        match result {
            Value::String(id) => Ok(Identity::new(id)),
            // Some servers answer `true`; the id isn't needed afterwards.
            _ => Ok(Identity::new(name)),
        }
    }

    async fn delete_snapshot(
        &self,
        snapshot: &Identity,
        delete_disks: bool,
    ) -> Result<(), RpcError> {
        self.rpc
            .call(
                "vm.delete",
                json!({ "id": snapshot.as_str(), "delete_disks": delete_disks }),
            )
            .await
            .map(|_| ())
    }
}

/// Turn a user-supplied XO address into its WebSocket API endpoint.
///
/// `http://xo.company.tld` → `ws://xo.company.tld/api/`,
/// `https://…` → `wss://…/api/`, bare hosts get `ws://`.
pub fn api_url(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("URL must not be empty".into());
    }

    let (scheme, rest) = match raw.split_once("://") {
        Some(("http" | "ws", rest)) => ("ws", rest),
        Some(("https" | "wss", rest)) => ("wss", rest),
        Some((other, _)) => return Err(format!("unsupported URL scheme '{other}'")),
        None => ("ws", raw),
    };

    if rest.is_empty() || rest.starts_with('/') {
        return Err(format!("URL has no host: '{raw}'"));
    }

    let path = rest.trim_end_matches('/');
    if path.ends_with("/api") {
        Ok(format!("{scheme}://{path}/"))
    } else {
        Ok(format!("{scheme}://{path}/api/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_maps_http_schemes() {
        assert_eq!(
            api_url("http://xo.company.tld").unwrap(),
            "ws://xo.company.tld/api/"
        );
        assert_eq!(
            api_url("https://xo.company.tld/").unwrap(),
            "wss://xo.company.tld/api/"
        );
    }

    #[test]
    fn api_url_keeps_existing_api_path() {
        assert_eq!(
            api_url("http://xo.company.tld/api/").unwrap(),
            "ws://xo.company.tld/api/"
        );
        assert_eq!(api_url("wss://xo:8443/api").unwrap(), "wss://xo:8443/api/");
    }

    #[test]
    fn api_url_defaults_to_ws() {
        assert_eq!(api_url("xo.local").unwrap(), "ws://xo.local/api/");
        assert_eq!(
            api_url("  10.0.0.5:8080/xo  ").unwrap(),
            "ws://10.0.0.5:8080/xo/api/"
        );
    }

    #[test]
    fn api_url_rejects_bad_input() {
        assert!(api_url("").is_err());
        assert!(api_url("ftp://xo").is_err());
        assert!(api_url("http://").is_err());
        assert!(api_url("http:///api").is_err());
    }

    #[test]
    fn credentials_debug_redacts_secrets() {
        let token = format!("{:?}", Credentials::Token("s3cret".into()));
        assert!(!token.contains("s3cret"));

        let password = format!(
            "{:?}",
            Credentials::Password {
                user: "admin@admin.net".into(),
                password: "hunter2".into(),
            }
        );
        assert!(password.contains("admin@admin.net"));
        assert!(!password.contains("hunter2"));
    }
}
