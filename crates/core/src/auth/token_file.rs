use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::strategy::Credential;

/// Durable `{token, expiration}` record reused across process restarts.
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    /// Point at a token file; nothing is read until [`TokenFile::restore`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record, returning `None` if it does not exist.
    pub fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read token file {}", self.path.display()))?;
        let credential = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse token file {}", self.path.display()))?;
        Ok(Some(credential))
    }

    /// Load a usable credential, deleting the record when it is unreadable
    /// or already expired.
    pub fn restore(&self) -> Option<Credential> {
        match self.load() {
            Ok(Some(credential)) if credential.token.trim().is_empty() => {
                warn!("token file {} holds an empty token, deleting it", self.path.display());
                self.discard_or_warn();
                None
            }
            Ok(Some(credential)) if !credential.is_valid() => {
                warn!("the stored token appears to be expired, deleting {}", self.path.display());
                self.discard_or_warn();
                None
            }
            Ok(Some(credential)) => {
                if credential.expires_at.is_none() {
                    info!("stored token has no expiration, it will be considered valid");
                }
                Some(credential)
            }
            Ok(None) => None,
            Err(err) => {
                warn!("error while reading the token file: {err:#}");
                self.discard_or_warn();
                None
            }
        }
    }

    /// Atomically replace the record with `credential`.
    pub fn persist(&self, credential: &Credential) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .with_context(|| format!("failed to create token directory {}", parent.display()))?;

        let serialized =
            serde_json::to_string_pretty(credential).context("failed to serialize token")?;
        let mut staged = tempfile::NamedTempFile::new_in(&parent)
            .with_context(|| format!("failed to stage token file in {}", parent.display()))?;
        staged
            .write_all(serialized.as_bytes())
            .context("failed to write staged token file")?;
        staged
            .persist(&self.path)
            .with_context(|| format!("failed to write token file {}", self.path.display()))?;
        Ok(())
    }

    /// Remove the record if present.
    pub fn discard(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to delete token file {}", self.path.display()))?;
        }
        Ok(())
    }

    fn discard_or_warn(&self) {
        if let Err(err) = self.discard() {
            warn!("{err:#}");
        }
    }
}
