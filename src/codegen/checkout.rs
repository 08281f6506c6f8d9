//! Checkout collaborators
//!
//! A checkout makes an existing file legal to overwrite: a version-control
//! "edit" call, clearing a read-only bit, or nothing at all. The validator
//! calls exactly one checkout before overwriting a file that already existed
//! and never writes when the checkout fails.

use crate::error::CheckoutError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::Permissions;
use std::io;
use std::path::Path;
use std::process::Output;

/// Blocking checkout
pub trait Checkout {
    fn checkout(&self, path: &Path) -> Result<(), CheckoutError>;
}

/// Awaitable checkout used by the cooperative validator
#[async_trait]
pub trait AsyncCheckout: Send + Sync {
    async fn checkout_async(&self, path: &Path) -> Result<(), CheckoutError>;
}

// =============================================================================
// NoCheckout
// =============================================================================

/// Files are always writable; checkout is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCheckout;

impl Checkout for NoCheckout {
    fn checkout(&self, _path: &Path) -> Result<(), CheckoutError> {
        Ok(())
    }
}

#[async_trait]
impl AsyncCheckout for NoCheckout {
    async fn checkout_async(&self, _path: &Path) -> Result<(), CheckoutError> {
        Ok(())
    }
}

// =============================================================================
// ClearReadOnly
// =============================================================================

/// Clears the read-only permission of the file, the way a lock-based VCS
/// client leaves files it has checked out.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearReadOnly;

impl Checkout for ClearReadOnly {
    fn checkout(&self, path: &Path) -> Result<(), CheckoutError> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(CheckoutError::new(path, err.to_string())),
        };

        if let Some(permissions) = writable(metadata.permissions()) {
            std::fs::set_permissions(path, permissions)
                .map_err(|err| CheckoutError::new(path, err.to_string()))?;
            tracing::debug!(path = %path.display(), "cleared read-only attribute");
        }
        Ok(())
    }
}

#[async_trait]
impl AsyncCheckout for ClearReadOnly {
    async fn checkout_async(&self, path: &Path) -> Result<(), CheckoutError> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(CheckoutError::new(path, err.to_string())),
        };

        if let Some(permissions) = writable(metadata.permissions()) {
            tokio::fs::set_permissions(path, permissions)
                .await
                .map_err(|err| CheckoutError::new(path, err.to_string()))?;
            tracing::debug!(path = %path.display(), "cleared read-only attribute");
        }
        Ok(())
    }
}

/// Owner-writable version of `permissions`, or `None` if already writable.
#[cfg(unix)]
fn writable(permissions: Permissions) -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;

    if !permissions.readonly() {
        return None;
    }
    Some(Permissions::from_mode(permissions.mode() | 0o200))
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn writable(mut permissions: Permissions) -> Option<Permissions> {
    if !permissions.readonly() {
        return None;
    }
    permissions.set_readonly(false);
    Some(permissions)
}

// =============================================================================
// CommandCheckout
// =============================================================================

/// Runs an external program with the destination path appended, e.g.
/// `p4 edit <path>`. A non-zero exit status is a checkout failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandCheckout {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandCheckout {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line such as `"p4 edit"`.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    fn check_output(&self, path: &Path, output: io::Result<Output>) -> Result<(), CheckoutError> {
        let output = output.map_err(|err| {
            CheckoutError::new(path, format!("failed to run {}: {err}", self.program))
        })?;

        if output.status.success() {
            tracing::debug!(
                program = %self.program,
                path = %path.display(),
                "checkout command succeeded"
            );
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let reason = if stderr.is_empty() {
            format!("{} exited with {}", self.program, output.status)
        } else {
            format!("{} exited with {}: {}", self.program, output.status, stderr)
        };
        Err(CheckoutError::new(path, reason))
    }
}

impl Checkout for CommandCheckout {
    fn checkout(&self, path: &Path) -> Result<(), CheckoutError> {
        let output = std::process::Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output();
        self.check_output(path, output)
    }
}

#[async_trait]
impl AsyncCheckout for CommandCheckout {
    async fn checkout_async(&self, path: &Path) -> Result<(), CheckoutError> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .await;
        self.check_output(path, output)
    }
}

// =============================================================================
// CheckoutStrategy
// =============================================================================

/// Configurable choice of checkout collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutStrategy {
    #[default]
    None,
    ClearReadonly,
    Command(CommandCheckout),
}

impl Checkout for CheckoutStrategy {
    fn checkout(&self, path: &Path) -> Result<(), CheckoutError> {
        match self {
            CheckoutStrategy::None => NoCheckout.checkout(path),
            CheckoutStrategy::ClearReadonly => ClearReadOnly.checkout(path),
            CheckoutStrategy::Command(command) => command.checkout(path),
        }
    }
}

#[async_trait]
impl AsyncCheckout for CheckoutStrategy {
    async fn checkout_async(&self, path: &Path) -> Result<(), CheckoutError> {
        match self {
            CheckoutStrategy::None => NoCheckout.checkout_async(path).await,
            CheckoutStrategy::ClearReadonly => ClearReadOnly.checkout_async(path).await,
            CheckoutStrategy::Command(command) => command.checkout_async(path).await,
        }
    }
}
