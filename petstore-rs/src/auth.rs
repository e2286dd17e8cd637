//! Shared-secret token gate.
//!
//! Every resource request must present the configured token, either as
//! `Authorization: Bearer <token>` or in an `api_key` header. The secret comes
//! from the CLI, the `PETSTORE_TOKEN` env var, the config file, or a token
//! file holding just the token.
//!
//! **Security:** Use `chmod 600` on the token file. The server warns if it is
//! world-readable (Unix).

use std::path::Path;

use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::warn;

#[derive(Clone)]
pub struct AuthGate {
    token: String,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate").finish_non_exhaustive()
    }
}

impl AuthGate {
    /// Build a gate for `token`. Surrounding whitespace is ignored; an empty
    /// token is rejected.
    pub fn new(token: &str) -> Result<Self, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Empty);
        }
        Ok(Self {
            token: token.to_string(),
        })
    }

    /// Constant-time comparison of a presented token against the secret.
    pub fn authorize(&self, presented: Option<&str>) -> bool {
        presented.is_some_and(|candidate| {
            candidate
                .trim()
                .as_bytes()
                .ct_eq(self.token.as_bytes())
                .into()
        })
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to read token file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("token file {path} is empty")]
    EmptyFile { path: String },
    #[error("token must not be empty")]
    Empty,
}

/// Read the shared secret from a file. Warns if the file is world-readable (Unix only).
pub fn load_token_file(path: &Path) -> Result<AuthGate, TokenError> {
    check_token_file_permissions(path);

    let raw = std::fs::read_to_string(path).map_err(|source| TokenError::Read {
        path: path.display().to_string(),
        source,
    })?;

    AuthGate::new(&raw).map_err(|_| TokenError::EmptyFile {
        path: path.display().to_string(),
    })
}

#[cfg(unix)]
fn check_token_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = std::fs::metadata(path) {
        let mode = meta.permissions().mode();
        if mode & 0o004 != 0 {
            warn!(
                path = %path.display(),
                "token file is world-readable; consider chmod 600"
            );
        }
    }
}

#[cfg(not(unix))]
fn check_token_file_permissions(_path: &Path) {}
