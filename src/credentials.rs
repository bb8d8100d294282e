// Saved credentials: one domain + token pair kept between sessions.
//
// The token is obscured at rest with AES-256-GCM under a key compiled into
// the binary. Every installation shares that key, so this only keeps the
// token from being readable at a glance (a pasted config file, a shared
// screenshot). Anyone with file-system access and this source can recover
// it. Moving to the OS keychain is the upgrade path for real secrecy.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const OBSCURE_KEY: &[u8; 32] = b"lms-cli-credential-obscuring-key";
const NONCE_LEN: usize = 12;
const FILE_NAME: &str = "credentials.json";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Could not determine a configuration directory")]
    NoConfigDir,

    #[error("Credential file error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not encode credentials: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Stored record could not be turned back into a token. Never leaves
    /// `load`, which reports it as "no credential".
    #[error("Stored credential is unreadable: {0}")]
    Decode(String),
}

/// A stored domain + token pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub token: String,
    pub domain: String,
    pub saved_at: DateTime<Utc>,
}

/// On-disk shape. `token` holds the obscured form.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRecord {
    token: String,
    domain: String,
    saved_at: DateTime<Utc>,
}

pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CredentialStore { dir: dir.into() }
    }

    /// Per-user location: `<config dir>/lms-cli`, or `~/.lms-cli` on systems
    /// without a config dir.
    pub fn default_location() -> Result<Self, CredentialError> {
        if let Some(dir) = dirs::config_dir() {
            return Ok(Self::new(dir.join("lms-cli")));
        }
        dirs::home_dir()
            .map(|home| Self::new(home.join(".lms-cli")))
            .ok_or(CredentialError::NoConfigDir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(FILE_NAME)
    }

    /// Writes the credential, replacing whatever was stored before.
    pub fn store(&self, token: &str, domain: &str) -> Result<Credential, CredentialError> {
        self.ensure_dir()?;
        let saved_at = Utc::now();
        let record = CredentialRecord {
            token: obscure(token)?,
            domain: domain.to_string(),
            saved_at,
        };
        let data = serde_json::to_string_pretty(&record)?;
        let path = self.path();
        write_private(&path, data.as_bytes()).map_err(|source| CredentialError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), domain, "Stored credentials");
        Ok(Credential {
            token: token.to_string(),
            domain: domain.to_string(),
            saved_at,
        })
    }

    /// The stored credential, or `None` when there is none or it cannot be
    /// read back.
    pub fn load(&self) -> Option<Credential> {
        let path = self.path();
        if !path.exists() {
            return None;
        }
        match self.read(&path) {
            Ok(credential) => Some(credential),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "Ignoring stored credentials");
                None
            }
        }
    }

    fn read(&self, path: &Path) -> Result<Credential, CredentialError> {
        let data = fs::read_to_string(path).map_err(|source| CredentialError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let record: CredentialRecord =
            serde_json::from_str(&data).map_err(|e| CredentialError::Decode(e.to_string()))?;
        Ok(Credential {
            token: reveal(&record.token)?,
            domain: record.domain,
            saved_at: record.saved_at,
        })
    }

    /// Removes the stored credential. Nothing stored is fine.
    pub fn clear(&self) -> Result<(), CredentialError> {
        let path = self.path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CredentialError::Io { path, source }),
        }
    }

    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    fn ensure_dir(&self) -> Result<(), CredentialError> {
        if self.dir.is_dir() {
            return Ok(());
        }
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder.create(&self.dir).map_err(|source| CredentialError::Io {
            path: self.dir.clone(),
            source,
        })
    }
}

/// Truncating write with owner-only permissions, also for a file that
/// already existed with looser ones.
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(data)?;
    file.sync_all()
}

fn cipher() -> Result<Aes256Gcm, CredentialError> {
    Aes256Gcm::new_from_slice(OBSCURE_KEY).map_err(|e| CredentialError::Decode(e.to_string()))
}

/// base64(nonce || ciphertext)
fn obscure(token: &str) -> Result<String, CredentialError> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let mut out = nonce.to_vec();
    let sealed = cipher()?
        .encrypt(&nonce, token.as_bytes())
        .map_err(|e| CredentialError::Decode(e.to_string()))?;
    out.extend(sealed);
    Ok(BASE64.encode(out))
}

fn reveal(stored: &str) -> Result<String, CredentialError> {
    let raw = BASE64
        .decode(stored)
        .map_err(|e| CredentialError::Decode(e.to_string()))?;
    if raw.len() <= NONCE_LEN {
        return Err(CredentialError::Decode("record too short".into()));
    }
    let (nonce, sealed) = raw.split_at(NONCE_LEN);
    let plain = cipher()?
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|e| CredentialError::Decode(e.to_string()))?;
    String::from_utf8(plain).map_err(|e| CredentialError::Decode(e.to_string()))
}
