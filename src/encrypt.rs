use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key,
};
use std::{fs, io::Write, path::Path};

use crate::db::private_options;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

pub struct EncryptionManager {
    key: Key<Aes256Gcm>,
}

impl EncryptionManager {
    /// Loads an existing key from `file`; never writes.
    pub fn open<P: AsRef<Path>>(file: P) -> anyhow::Result<Self> {
        let file = file.as_ref();
        let bytes = fs::read(file)?;
        if bytes.len() != KEY_LEN {
            anyhow::bail!(
                "key file {} holds {} bytes, expected {}",
                file.display(),
                bytes.len(),
                KEY_LEN
            );
        }

        Ok(EncryptionManager {
            key: *Key::<Aes256Gcm>::from_slice(&bytes),
        })
    }

    /// Loads the key from `file`, generating and saving one on first use.
    pub fn new<P: AsRef<Path>>(file: P) -> anyhow::Result<Self> {
        let file = file.as_ref();
        if file.exists() {
            return Self::open(file);
        }

        let key = Aes256Gcm::generate_key(OsRng);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        private_options().open(file)?.write_all(key.as_slice())?;
        Ok(EncryptionManager { key })
    }

    pub fn encrypt(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng); // 96-bits; unique per message
        let cipher = Aes256Gcm::new(&self.key);
        let ciphertext = cipher
            .encrypt(&nonce, data)
            .map_err(|e| anyhow::anyhow!(e))?;

        let mut encrypted = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        encrypted.extend_from_slice(&nonce);
        encrypted.extend_from_slice(&ciphertext);
        Ok(encrypted)
    }

    pub fn decrypt(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        if data.len() < NONCE_LEN {
            anyhow::bail!("ciphertext shorter than nonce");
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(&self.key);
        cipher
            .decrypt(nonce.into(), ciphertext)
            .map_err(|e| anyhow::anyhow!(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn key_is_created_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("key");

        let first = EncryptionManager::new(&path).unwrap();
        let sealed = first.encrypt(b"hunter2").unwrap();
        assert_eq!(fs::read(&path).unwrap().len(), KEY_LEN);

        let second = EncryptionManager::new(&path).unwrap();
        assert_eq!(second.decrypt(&sealed).unwrap(), b"hunter2");
    }

    #[test]
    fn open_never_creates_a_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("key");

        assert!(EncryptionManager::open(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn rejects_short_key_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("key");
        fs::write(&path, b"short").unwrap();

        assert!(EncryptionManager::new(&path).is_err());
        assert!(EncryptionManager::open(&path).is_err());
    }

    #[test]
    fn rejects_tampered_data() {
        let dir = tempdir().unwrap();
        let manager = EncryptionManager::new(dir.path().join("key")).unwrap();

        let mut sealed = manager.encrypt(b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        assert!(manager.decrypt(&sealed).is_err());
        assert!(manager.decrypt(&[0u8; 4]).is_err());
    }
}
