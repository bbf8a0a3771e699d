//! File-backed identity and contact storage.
//!
//! Layout of the data directory:
//!
//! ```text
//! identity.pem        PKCS#8 PEM Ed25519 private key
//! user_config.json    {"display_name": "..."}
//! contacts.json       fingerprint -> {"name", "key"}
//! archive_keys/       keys retired by `rotate`
//! ```

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tessera_core::{ContactBook, LocalIdentity};
use tracing::debug;
use zeroize::Zeroizing;

const IDENTITY_FILE: &str = "identity.pem";
const CONFIG_FILE: &str = "user_config.json";
const CONTACTS_FILE: &str = "contacts.json";
const ARCHIVE_DIR: &str = "archive_keys";

/// Message used when no identity exists; mapped to exit code 78.
pub const NOT_CONFIGURED: &str = "No identity found. Run 'tessera setup <NAME>' first";

#[derive(Debug, Serialize, Deserialize)]
struct UserConfig {
    display_name: String,
}

/// The data directory.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Use `home` if given, otherwise the platform data directory.
    pub fn resolve(home: Option<PathBuf>) -> Result<Self> {
        let root = match home {
            Some(path) => path,
            None => dirs::data_dir()
                .context("Could not determine a data directory; pass --home")?
                .join("tessera"),
        };
        debug!(path = %root.display(), "Using data directory");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to write data directory: {}", self.root.display()))
    }

    pub fn is_setup(&self) -> bool {
        self.path(IDENTITY_FILE).exists() && self.path(CONFIG_FILE).exists()
    }

    /// Load the signing identity.
    pub fn load_identity(&self) -> Result<LocalIdentity> {
        if !self.is_setup() {
            bail!(NOT_CONFIGURED);
        }

        let config: UserConfig = serde_json::from_slice(
            &fs::read(self.path(CONFIG_FILE)).context("Failed to read user config")?,
        )
        .context("Failed to parse user config")?;

        let pem = Zeroizing::new(
            fs::read_to_string(self.path(IDENTITY_FILE)).context("Failed to read identity key")?,
        );
        let identity = LocalIdentity::from_pkcs8_pem(config.display_name, &pem)?;
        debug!(fingerprint = %identity.fingerprint(), "Loaded identity");
        Ok(identity)
    }

    /// Load the identity if one exists.
    pub fn try_load_identity(&self) -> Result<Option<LocalIdentity>> {
        if self.is_setup() {
            self.load_identity().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Persist `identity`, replacing any existing one.
    pub fn save_identity(&self, identity: &LocalIdentity) -> Result<()> {
        use tessera_core::KeyStore;

        self.ensure_root()?;
        let pem = Zeroizing::new(identity.to_pkcs8_pem()?);
        write_private(&self.path(IDENTITY_FILE), pem.as_bytes())?;

        let config = UserConfig {
            display_name: identity.display_name().to_string(),
        };
        fs::write(self.path(CONFIG_FILE), serde_json::to_vec(&config)?)
            .context("Failed to write user config")?;
        Ok(())
    }

    /// Load trusted contacts; a missing file is an empty book.
    pub fn load_contacts(&self) -> Result<ContactBook> {
        let path = self.path(CONTACTS_FILE);
        if !path.exists() {
            return Ok(ContactBook::new());
        }
        let bytes = fs::read(&path).context("Failed to read contacts")?;
        serde_json::from_slice(&bytes).context("Failed to parse contacts")
    }

    pub fn save_contacts(&self, contacts: &ContactBook) -> Result<()> {
        self.ensure_root()?;
        fs::write(self.path(CONTACTS_FILE), serde_json::to_vec_pretty(contacts)?)
            .context("Failed to write contacts")
    }

    /// Copy the current key files into `archive_keys/`, tagged with `stamp`.
    ///
    /// Archived keys are never overwritten: a stamp that is already taken
    /// gets a numeric suffix.
    pub fn archive_identity(&self, identity: &LocalIdentity, stamp: &str) -> Result<PathBuf> {
        let dir = self.path(ARCHIVE_DIR);
        fs::create_dir_all(&dir).context("Failed to write archive directory")?;

        let pem = Zeroizing::new(identity.to_pkcs8_pem()?);
        for n in 0u32..1000 {
            let tag = if n == 0 { stamp.to_string() } else { format!("{stamp}_{n}") };
            let private = dir.join(format!("private_{tag}.pem"));
            if !create_private(&private, pem.as_bytes())? {
                continue;
            }
            fs::write(dir.join(format!("public_{tag}.txt")), identity.public_key_base64())
                .context("Failed to write archived public key")?;
            return Ok(private);
        }
        bail!("Archive directory is full: {}", dir.display())
    }
}

/// Write a new key file. Returns `false` if `path` already exists.
fn create_private(path: &Path, contents: &[u8]) -> Result<bool> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to write key: {}", path.display()))
        }
    };
    file.write_all(contents)
        .with_context(|| format!("Failed to write key: {}", path.display()))?;
    Ok(true)
}

fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("Failed to write key: {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to write key permissions: {}", path.display()))?;
    }
    Ok(())
}
