use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::{Db, EncryptionManager};

/// Service name every sshconnect secret is filed under.
pub const SERVICE: &str = "sshconnect";

const KEY_FILE: &str = "key";
const SECRETS_FILE: &str = "secrets";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("cannot access credential store: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential store is unreadable: {0}")]
    Corrupt(String),
    #[error("stored secret cannot be decrypted")]
    Decrypt,
    #[error("credential store key is unusable: {0}")]
    Key(String),
}

impl LookupError {
    pub fn code(&self) -> i32 {
        match self {
            LookupError::Io(_) => 1,
            LookupError::Corrupt(_) => 2,
            LookupError::Decrypt => 3,
            LookupError::Key(_) => 4,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Secret storage addressed by service and account.
pub trait CredentialStore {
    fn lookup(&self, service: &str, account: &str) -> Result<Option<Secret>, LookupError>;

    fn store(&mut self, service: &str, account: &str, secret: &[u8]) -> Result<(), LookupError>;
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
struct VaultKey {
    service: String,
    account: String,
}

impl VaultKey {
    fn new(service: &str, account: &str) -> Self {
        Self {
            service: service.to_string(),
            account: account.to_string(),
        }
    }
}

/// Encrypted secrets kept in `<dir>/secrets`, sealed with the key in `<dir>/key`.
pub struct Vault {
    db: Db<VaultKey, Vec<u8>>,
    key_path: PathBuf,
}

impl Vault {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, LookupError> {
        let dir = dir.as_ref();
        let db = Db::open(dir.join(SECRETS_FILE)).map_err(storage_error)?;
        Ok(Self {
            db,
            key_path: dir.join(KEY_FILE),
        })
    }

    fn manager(&self, create: bool) -> Result<EncryptionManager, LookupError> {
        let manager = if create {
            EncryptionManager::new(&self.key_path)
        } else {
            EncryptionManager::open(&self.key_path)
        };
        manager.map_err(|e| LookupError::Key(e.to_string()))
    }
}

fn storage_error(e: anyhow::Error) -> LookupError {
    match e.downcast::<std::io::Error>() {
        Ok(io) => LookupError::Io(io),
        Err(e) => LookupError::Corrupt(e.to_string()),
    }
}

impl CredentialStore for Vault {
    fn lookup(&self, service: &str, account: &str) -> Result<Option<Secret>, LookupError> {
        let Some(sealed) = self.db.get(&VaultKey::new(service, account)) else {
            return Ok(None);
        };

        let plain = self
            .manager(false)?
            .decrypt(sealed)
            .map_err(|_| LookupError::Decrypt)?;
        Ok(Some(Secret::new(plain)))
    }

    fn store(&mut self, service: &str, account: &str, secret: &[u8]) -> Result<(), LookupError> {
        let sealed = self
            .manager(true)?
            .encrypt(secret)
            .map_err(|e| LookupError::Key(e.to_string()))?;
        self.db.insert(VaultKey::new(service, account), sealed);
        self.db.flush().map_err(storage_error)?;

        log::debug!("stored secret for {}/{} in {}", service, account, self.db.path().display());
        Ok(())
    }
}
