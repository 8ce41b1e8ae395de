use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::Debug,
    fs::{self, OpenOptions},
    hash::Hash,
    io::Write,
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
};

/// A bincode-serialized map persisted to a single file.
#[derive(Debug)]
pub struct Db<K, V> {
    path: PathBuf,
    db: HashMap<K, V>,
}

impl<K, V> Db<K, V>
where
    K: Hash + Eq + Serialize + for<'de> Deserialize<'de> + Debug,
    V: Serialize + for<'de> Deserialize<'de> + Debug,
{
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = PathBuf::from(path.as_ref());
        let db = if path.exists() {
            // read errors stay `io::Error` so callers can tell them from bad data
            let bytes = fs::read(&path)?;
            bincode::deserialize(&bytes)?
        } else {
            HashMap::new()
        };

        Ok(Self { path, db })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes next to the target first so a crash never leaves a truncated file.
    pub fn flush(&self) -> anyhow::Result<()> {
        let data = bincode::serialize(&self.db)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = private_options().open(&tmp)?;
        file.write_all(&data)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

pub(crate) fn private_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

impl<K, V> Deref for Db<K, V> {
    type Target = HashMap<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

impl<K, V> DerefMut for Db<K, V> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempdir().unwrap();
        let db: Db<String, u32> = Db::open(dir.path().join("db")).unwrap();
        assert!(db.is_empty());
    }

    #[test]
    fn flush_then_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("db");

        let mut db: Db<String, Vec<u8>> = Db::open(&path).unwrap();
        db.insert("prod".to_string(), vec![1, 2, 3]);
        db.flush().unwrap();

        let db: Db<String, Vec<u8>> = Db::open(&path).unwrap();
        assert_eq!(db.get("prod"), Some(&vec![1, 2, 3]));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn garbage_fails_to_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        fs::write(&path, [0xff; 3]).unwrap();

        assert!(Db::<String, Vec<u8>>::open(&path).is_err());
    }
}
