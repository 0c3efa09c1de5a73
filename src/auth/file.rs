//! Token store persisted to a file in the user's config directory.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};

use super::{TokenStore, mask_token};
use crate::runtime::Runtime;

pub struct FileTokenStore<R: Runtime> {
    runtime: R,
    path: PathBuf,
}

impl<R: Runtime> FileTokenStore<R> {
    pub fn new(runtime: R, path: PathBuf) -> Self {
        Self { runtime, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R: Runtime> TokenStore for FileTokenStore<R> {
    #[tracing::instrument(skip(self))]
    fn get(&self) -> Option<String> {
        if !self.runtime.exists(&self.path) {
            return None;
        }
        match self.runtime.read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    None
                } else {
                    Some(token.to_string())
                }
            }
            Err(e) => {
                warn!("Ignoring unreadable token file {:?}: {:#}", self.path, e);
                None
            }
        }
    }

    #[tracing::instrument(skip(self, token))]
    fn set(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        self.runtime
            .write(&self.path, token.trim().as_bytes())
            .context("Failed to store auth token")?;
        self.runtime.set_permissions(&self.path, 0o600)?;
        debug!("Stored token {} in {:?}", mask_token(token), self.path);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn clear(&self) -> Result<()> {
        if self.runtime.exists(&self.path) {
            self.runtime
                .remove_file(&self.path)
                .context("Failed to remove auth token")?;
            debug!("Removed token file {:?}", self.path);
        }
        Ok(())
    }
}
