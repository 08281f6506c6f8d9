#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use codegen_writeback::{AsyncCheckout, Checkout, CheckoutError};
use tempfile::{TempDir, tempdir};

pub struct TestWorkspace {
    _tempdir: TempDir,
    root: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let tempdir = tempdir().expect("tempdir");
        let root = tempdir.path().to_path_buf();
        Self {
            _tempdir: tempdir,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create dir");
        }
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.path(name)).expect("read fixture")
    }
}

/// Checkout that records every call and optionally refuses
#[derive(Debug, Clone, Default)]
pub struct CountingCheckout {
    calls: Arc<AtomicUsize>,
    refuse: bool,
}

impl CountingCheckout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing() -> Self {
        Self {
            calls: Arc::default(),
            refuse: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn run(&self, path: &Path) -> Result<(), CheckoutError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            Err(CheckoutError::new(path, "file is locked by another user"))
        } else {
            Ok(())
        }
    }
}

impl Checkout for CountingCheckout {
    fn checkout(&self, path: &Path) -> Result<(), CheckoutError> {
        self.run(path)
    }
}

#[async_trait]
impl AsyncCheckout for CountingCheckout {
    async fn checkout_async(&self, path: &Path) -> Result<(), CheckoutError> {
        self.run(path)
    }
}

pub fn modified_time(path: &Path) -> std::time::SystemTime {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .expect("mtime")
}
