use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, warn};

/// Somewhere to keep the serialized credential between runs.
pub trait CredentialStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> anyhow::Result<Option<String>>;
    fn save(&self, blob: &str) -> anyhow::Result<()>;
    fn clear(&self) -> anyhow::Result<()>;
}

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileStore {
    fn load(&self) -> anyhow::Result<Option<String>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read {}", self.path.display()))
            }
        };

        // A cache that isn't text can't be a credential; treat it as absent.
        match String::from_utf8(bytes) {
            Ok(blob) => Ok(Some(blob)),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "ignoring unreadable token cache"
                );
                Ok(None)
            }
        }
    }

    fn save(&self, blob: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&self.path, blob)
            .with_context(|| format!("failed to write {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        debug!(path = %self.path().display(), "saved credential");
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to remove {}", self.path.display())),
        }
    }
}

const SERVICE_NAME: &str = "weektally";

/// Keeps the credential in the platform keyring (Keychain, Secret Service, Credential Manager).
pub struct KeyringStore {
    user: String,
}

impl KeyringStore {
    pub fn new(user: &str) -> Self {
        Self {
            user: user.to_owned(),
        }
    }

    fn entry(&self) -> keyring::Entry {
        keyring::Entry::new(SERVICE_NAME, &self.user)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new("primary")
    }
}

impl CredentialStore for KeyringStore {
    fn load(&self) -> anyhow::Result<Option<String>> {
        match self.entry().get_password() {
            Ok(blob) => Ok(Some(blob)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err).context("failed to read credential from keyring"),
        }
    }

    fn save(&self, blob: &str) -> anyhow::Result<()> {
        self.entry()
            .set_password(blob)
            .context("failed to write credential to keyring")?;
        Ok(())
    }

    fn clear(&self) -> anyhow::Result<()> {
        match self.entry().delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err).context("failed to delete credential from keyring"),
        }
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryStore;
