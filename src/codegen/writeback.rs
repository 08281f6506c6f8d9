//! Write-back validator
//!
//! Decides whether generated text should replace a file, and commits it when
//! it should. Two entry points share one decision path:
//!
//! - [`Validator::validate`] blocks until the outcome is known.
//! - [`Validator::validate_async`] is a future that yields to its driver
//!   before the checkout and before the write, so an interactive host can keep
//!   servicing other work between steps. Dropping it abandons the operation.
//!
//! Both produce the same [`Outcome`] and leave the file system in the same
//! state.

use super::checkout::{AsyncCheckout, Checkout, CheckoutStrategy};
use super::compare::{Comparison, Outcome};
use crate::config::WriteBackConfig;
use crate::error::{WriteBackError, WriteBackResult};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::Instrument;

/// Generated text plus where it should live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    text: String,
    destination: PathBuf,
}

impl WriteRequest {
    pub fn new(text: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            text: text.into(),
            destination: destination.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    fn checked_destination(&self) -> WriteBackResult<&Path> {
        if self.destination.as_os_str().is_empty() {
            return Err(WriteBackError::InvalidDestination);
        }
        Ok(&self.destination)
    }
}

/// Compares generated text against disk and commits real changes
#[derive(Debug, Clone)]
pub struct Validator<C = CheckoutStrategy> {
    checkout: C,
    /// Write through a sibling temp file and rename into place
    pub atomic_writes: bool,
    /// Create missing parent directories before writing
    pub create_parent_dirs: bool,
}

impl Validator<CheckoutStrategy> {
    pub fn from_config(config: &WriteBackConfig) -> Self {
        Self {
            checkout: config.checkout.clone(),
            atomic_writes: config.atomic_writes,
            create_parent_dirs: config.create_parent_dirs,
        }
    }
}

impl<C: Default> Default for Validator<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<C> Validator<C> {
    /// Direct writes, parent directories created on demand.
    pub fn new(checkout: C) -> Self {
        Self {
            checkout,
            atomic_writes: false,
            create_parent_dirs: true,
        }
    }

    pub fn with_atomic_writes(mut self, atomic: bool) -> Self {
        self.atomic_writes = atomic;
        self
    }

    pub fn with_create_parent_dirs(mut self, create: bool) -> Self {
        self.create_parent_dirs = create;
        self
    }

    pub fn checkout(&self) -> &C {
        &self.checkout
    }

    /// Outcome `validate` would produce, without checkout or write.
    pub fn compare(&self, request: &WriteRequest) -> WriteBackResult<Outcome> {
        let path = request.checked_destination()?;
        let existing = read_existing(path)?;
        let comparison = Comparison::of(existing.as_deref(), request.text());
        log_comparison(path, comparison);
        Ok(comparison.outcome())
    }

    /// Awaitable form of [`compare`](Self::compare).
    pub async fn compare_async(&self, request: &WriteRequest) -> WriteBackResult<Outcome> {
        let path = request.checked_destination()?;
        let existing = read_existing_async(path).await?;
        let comparison = Comparison::of(existing.as_deref(), request.text());
        log_comparison(path, comparison);
        Ok(comparison.outcome())
    }

    fn commit(&self, path: &Path, text: &str) -> WriteBackResult<()> {
        if self.create_parent_dirs {
            if let Some(parent) = parent_dir(path) {
                fs::create_dir_all(parent).map_err(|source| WriteBackError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let written = if self.atomic_writes {
            atomic_write(path, text)
        } else {
            fs::write(path, text)
        };
        written.map_err(|source| WriteBackError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    async fn commit_async(&self, path: &Path, text: &str) -> WriteBackResult<()> {
        if self.create_parent_dirs {
            if let Some(parent) = parent_dir(path) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| WriteBackError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let written = if self.atomic_writes {
            let owned_path = path.to_path_buf();
            let owned_text = text.to_string();
            tokio::task::spawn_blocking(move || atomic_write(&owned_path, &owned_text))
                .await
                .unwrap_or_else(|join_err| Err(io::Error::other(join_err)))
        } else {
            tokio::fs::write(path, text).await
        };
        written.map_err(|source| WriteBackError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl<C: Checkout> Validator<C> {
    /// Compare, and on a real change check out (if the file existed) and write.
    pub fn validate(&self, request: &WriteRequest) -> WriteBackResult<Outcome> {
        let path = request.checked_destination()?;
        let span = tracing::debug_span!("validate", path = %path.display());
        let _entered = span.enter();

        let existing = read_existing(path)?;
        let comparison = Comparison::of(existing.as_deref(), request.text());
        log_comparison(path, comparison);

        if !comparison.outcome().is_changed() {
            return Ok(Outcome::Unchanged);
        }

        self.overwrite(path, existing.is_some(), request.text())?;
        Ok(Outcome::Changed)
    }

    /// Check out (when the file existed) and write.
    fn overwrite(&self, path: &Path, existed: bool, text: &str) -> WriteBackResult<()> {
        if existed {
            self.checkout.checkout(path).inspect_err(|err| {
                tracing::warn!(
                    path = %path.display(),
                    reason = %err.reason,
                    "checkout failed, not writing"
                );
            })?;
        }

        self.commit(path, text)?;
        tracing::info!(path = %path.display(), bytes = text.len(), "wrote generated file");
        Ok(())
    }
}

impl<C: AsyncCheckout> Validator<C> {
    /// Cooperative form of [`validate`](Self::validate).
    ///
    /// The destination precondition is checked on first poll, before any
    /// file-system access.
    pub async fn validate_async(&self, request: &WriteRequest) -> WriteBackResult<Outcome> {
        let path = request.checked_destination()?;
        let span = tracing::debug_span!("validate_async", path = %path.display());

        async move {
            let existing = read_existing_async(path).await?;
            let comparison = Comparison::of(existing.as_deref(), request.text());
            log_comparison(path, comparison);

            if !comparison.outcome().is_changed() {
                return Ok(Outcome::Unchanged);
            }

            self.overwrite_async(path, existing.is_some(), request.text()).await?;
            Ok(Outcome::Changed)
        }
        .instrument(span)
        .await
    }

    /// Cooperative [`overwrite`](Self::overwrite): suspends to the driver
    /// just before the checkout and just before the write.
    async fn overwrite_async(
        &self,
        path: &Path,
        existed: bool,
        text: &str,
    ) -> WriteBackResult<()> {
        if existed {
            tokio::task::yield_now().await;
            self.checkout.checkout_async(path).await.inspect_err(|err| {
                tracing::warn!(
                    path = %path.display(),
                    reason = %err.reason,
                    "checkout failed, not writing"
                );
            })?;
        }

        tokio::task::yield_now().await;
        self.commit_async(path, text).await?;
        tracing::info!(path = %path.display(), bytes = text.len(), "wrote generated file");
        Ok(())
    }
}

fn read_existing(path: &Path) -> WriteBackResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(WriteBackError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn read_existing_async(path: &Path) -> WriteBackResult<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(WriteBackError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn log_comparison(path: &Path, comparison: Comparison) {
    tracing::debug!(
        path = %path.display(),
        comparison = comparison.as_str(),
        outcome = %comparison.outcome(),
        "compared generated text"
    );
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|parent| !parent.as_os_str().is_empty())
}

/// Write to a temp file beside `path`, then rename over it.
///
/// The replacement keeps the permissions of the file it replaces.
fn atomic_write(path: &Path, text: &str) -> io::Result<()> {
    let dir = parent_dir(path).unwrap_or_else(|| Path::new("."));
    let mut temp_file = NamedTempFile::new_in(dir)?;
    temp_file.write_all(text.as_bytes())?;
    temp_file.flush()?;

    if let Ok(metadata) = fs::metadata(path) {
        temp_file.as_file().set_permissions(metadata.permissions())?;
    }

    temp_file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::checkout::NoCheckout;
    use crate::error::CheckoutError;
    use async_trait::async_trait;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Poll;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct Recording(Arc<AtomicUsize>);

    impl Recording {
        fn calls(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AsyncCheckout for Recording {
        async fn checkout_async(&self, _path: &Path) -> Result<(), CheckoutError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Poll `fut` exactly once with the current task's waker.
    async fn poll_once<F: Future>(mut fut: Pin<&mut F>) -> Poll<F::Output> {
        std::future::poll_fn(|cx| Poll::Ready(fut.as_mut().poll(cx))).await
    }

    #[tokio::test(flavor = "current_thread")]
    async fn overwrite_async_suspends_before_checkout_and_before_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.rs");
        fs::write(&path, "old").unwrap();
        let checkout = Recording::default();
        let validator = Validator::new(checkout.clone()).with_create_parent_dirs(false);

        let mut step = std::pin::pin!(validator.overwrite_async(&path, true, "new"));

        // Stops before the checkout runs.
        assert!(poll_once(step.as_mut()).await.is_pending());
        assert_eq!(checkout.calls(), 0);

        // Checks out, then stops before the write is started.
        assert!(poll_once(step.as_mut()).await.is_pending());
        assert_eq!(checkout.calls(), 1);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");

        step.await.unwrap();
        assert_eq!(checkout.calls(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn overwrite_async_new_file_suspends_once_without_checkout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.rs");
        let checkout = Recording::default();
        let validator = Validator::new(checkout.clone()).with_create_parent_dirs(false);

        let mut step = std::pin::pin!(validator.overwrite_async(&path, false, "new"));

        assert!(poll_once(step.as_mut()).await.is_pending());
        std::thread::sleep(Duration::from_millis(50));
        assert!(!path.exists());

        step.await.unwrap();
        assert_eq!(checkout.calls(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn commit_into_existing_parent_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("gen")).unwrap();
        let validator = Validator::new(NoCheckout);

        validator.commit(&dir.path().join("gen/a.rs"), "x").unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("gen/a.rs")).unwrap(), "x");
    }

    #[test]
    fn empty_destination_fails_before_io() {
        let validator = Validator::new(NoCheckout);
        let err = validator
            .validate(&WriteRequest::new("x", ""))
            .unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn compare_does_not_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.rs");
        let validator = Validator::new(NoCheckout);

        let outcome = validator.compare(&WriteRequest::new("fn a() {}", &path)).unwrap();

        assert_eq!(outcome, Outcome::Changed);
        assert!(!path.exists());
    }

    #[test]
    fn atomic_write_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.rs");
        fs::write(&path, "old").unwrap();

        atomic_write(&path, "new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn parent_dir_skips_bare_file_names() {
        assert!(parent_dir(Path::new("a.rs")).is_none());
        assert_eq!(parent_dir(Path::new("gen/a.rs")), Some(Path::new("gen")));
    }

    #[test]
    fn directory_destination_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        let validator = Validator::new(NoCheckout);

        let err = validator
            .validate(&WriteRequest::new("x", dir.path()))
            .unwrap_err();

        assert!(matches!(err, WriteBackError::Read { .. }));
    }
}
