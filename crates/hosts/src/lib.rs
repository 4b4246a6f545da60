use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostStoreError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON format in hosts file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Authentication mode for a host profile.
///
/// Public-key mode lets the helper negotiate with whatever keys the agent
/// offers; password mode makes the helper read the secret from stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    #[default]
    PublicKey,
    Password,
}

/// One saved remote mount target.
///
/// The name is display-only and not guaranteed unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostProfile {
    pub name: String,
    pub user: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(rename = "remotePath")]
    pub remote_path: String,
    #[serde(rename = "localPath")]
    pub local_path: PathBuf,
    #[serde(default)]
    pub auth: AuthMethod,
}

fn default_port() -> u16 {
    22
}

impl HostProfile {
    /// The `user@host` endpoint string, as it appears in mount tables.
    pub fn endpoint(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// The `user@host:remotePath` spec passed to the mount helper.
    pub fn remote_spec(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.remote_path)
    }
}

/// On-disk document: a flat list of host records.
#[derive(Debug, Default, Serialize, Deserialize)]
struct HostsDocument {
    hosts: Vec<HostProfile>,
}

/// Ordered list of host profiles with JSON persistence.
pub struct HostStore {
    hosts: Vec<HostProfile>,
    file_path: PathBuf,
}

impl HostStore {
    /// Creates a store backed by the given file. Nothing is read until
    /// [`HostStore::load`] is called.
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            hosts: Vec::new(),
            file_path,
        }
    }

    /// The default store location, `~/.ssh/mounter/hosts.json`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ssh")
            .join("mounter")
            .join("hosts.json")
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn hosts(&self) -> &[HostProfile] {
        &self.hosts
    }

    /// First profile whose display name matches.
    pub fn find_by_name(&self, name: &str) -> Option<&HostProfile> {
        self.hosts.iter().find(|h| h.name == name)
    }

    /// Reads the hosts file. A missing file is not an error: it yields an
    /// empty list.
    pub fn load(&mut self) -> Result<(), HostStoreError> {
        if !self.file_path.exists() {
            self.hosts.clear();
            tracing::debug!(path = %self.file_path.display(), "no existing hosts file, starting fresh");
            return Ok(());
        }

        let data = std::fs::read_to_string(&self.file_path).map_err(|source| {
            HostStoreError::Read {
                path: self.file_path.clone(),
                source,
            }
        })?;

        let doc: HostsDocument = serde_json::from_str(&data)?;
        self.hosts = doc.hosts;
        tracing::debug!(count = self.hosts.len(), path = %self.file_path.display(), "loaded hosts");
        Ok(())
    }

    /// Writes the hosts file, creating the parent directory if needed.
    pub fn save(&self) -> Result<(), HostStoreError> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| HostStoreError::Write {
                path: self.file_path.clone(),
                source,
            })?;
        }

        let doc = HostsDocument {
            hosts: self.hosts.clone(),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        std::fs::write(&self.file_path, json).map_err(|source| HostStoreError::Write {
            path: self.file_path.clone(),
            source,
        })?;

        tracing::debug!(count = self.hosts.len(), path = %self.file_path.display(), "saved hosts");
        Ok(())
    }

    pub fn add(&mut self, profile: HostProfile) {
        self.hosts.push(profile);
    }

    /// Removes the profile at `index`. Out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) {
        if index < self.hosts.len() {
            self.hosts.remove(index);
        }
    }

    /// Replaces the profile at `index`. Out-of-range indices are ignored.
    pub fn update(&mut self, index: usize, profile: HostProfile) {
        if let Some(slot) = self.hosts.get_mut(index) {
            *slot = profile;
        }
    }
}
