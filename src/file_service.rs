//! Versioned blob persistence.
//!
//! Layout under `<base>/<currency>/<network>/`: one directory per
//! registered type, one file per entity named by the hex of its 32-byte
//! SHA-256 identifier, and a `version` sidecar per type recording the
//! current encoding version.  Entity payloads are self-versioned; loading
//! migrates older encodings through their readers and re-saves at the
//! current version.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::FileServiceError;
use crate::hash::sha256;

const VERSION_SIDECAR: &str = "version";

/// A 32-byte entity identifier.
pub type EntityIdentifier = [u8; 32];

/// Identifier for a transfer bundle: SHA-256 over the uids string.  Only
/// the uids is guaranteed unique; several transfers may share one
/// transaction hash.
pub fn transfer_identifier(uids: &str) -> EntityIdentifier {
    sha256(uids.as_bytes())
}

/// Identifier for a transaction bundle: SHA-256 over the raw serialization.
pub fn transaction_identifier(serialization: &[u8]) -> EntityIdentifier {
    sha256(serialization)
}

/// A typed, versioned blob store.
#[derive(Debug)]
pub struct FileService {
    base: PathBuf,
    types: HashMap<String, u32>,
}

impl FileService {
    /// Open (creating if needed) the store rooted at
    /// `<base>/<currency>/<network>/`.
    pub fn new(
        base: impl AsRef<Path>,
        currency: &str,
        network: &str,
    ) -> Result<Self, FileServiceError> {
        let base = base.as_ref().join(currency).join(network);
        fs::create_dir_all(&base)?;
        Ok(FileService {
            base,
            types: HashMap::new(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    fn type_dir(&self, type_name: &str) -> PathBuf {
        self.base.join(type_name)
    }

    fn require_type(&self, type_name: &str) -> Result<(), FileServiceError> {
        if self.types.contains_key(type_name) {
            Ok(())
        } else {
            Err(FileServiceError::Impl(format!(
                "type '{}' is not registered",
                type_name
            )))
        }
    }

    /// Register a type at its current encoding version.  A sidecar newer
    /// than `current_version` means the store was written by a newer
    /// runtime and is treated as corrupt.
    pub fn register_type(
        &mut self,
        type_name: &str,
        current_version: u32,
    ) -> Result<(), FileServiceError> {
        let dir = self.type_dir(type_name);
        fs::create_dir_all(&dir)?;

        let sidecar = dir.join(VERSION_SIDECAR);
        if sidecar.exists() {
            let recorded: u32 = fs::read_to_string(&sidecar)?
                .trim()
                .parse()
                .map_err(|_| {
                    FileServiceError::Store(format!("unreadable version sidecar for '{}'", type_name))
                })?;
            if recorded > current_version {
                return Err(FileServiceError::Store(format!(
                    "store version {} for '{}' is newer than supported {}",
                    recorded, type_name, current_version
                )));
            }
        }
        fs::write(&sidecar, current_version.to_string())?;

        self.types.insert(type_name.to_string(), current_version);
        Ok(())
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn current_version(&self, type_name: &str) -> Option<u32> {
        self.types.get(type_name).copied()
    }

    /// Persist one entity.
    pub fn save(
        &self,
        type_name: &str,
        identifier: &EntityIdentifier,
        bytes: &[u8],
    ) -> Result<(), FileServiceError> {
        self.require_type(type_name)?;
        let path = self.type_dir(type_name).join(hex::encode(identifier));
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Load every entity of a type: `(identifier, payload)` pairs.
    /// Undecodable filenames classify as store corruption.
    pub fn load_all(
        &self,
        type_name: &str,
    ) -> Result<Vec<(EntityIdentifier, Vec<u8>)>, FileServiceError> {
        self.require_type(type_name)?;

        let mut entities = Vec::new();
        for entry in fs::read_dir(self.type_dir(type_name))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == VERSION_SIDECAR {
                continue;
            }

            let raw = hex::decode(&name).map_err(|_| {
                FileServiceError::Store(format!("malformed entity file name '{}'", name))
            })?;
            if raw.len() != 32 {
                return Err(FileServiceError::Store(format!(
                    "entity file name '{}' is not a 32-byte identifier",
                    name
                )));
            }
            let mut identifier = [0u8; 32];
            identifier.copy_from_slice(&raw);

            entities.push((identifier, fs::read(entry.path())?));
        }

        Ok(entities)
    }

    /// Remove one entity; missing entities are not an error.
    pub fn remove(
        &self,
        type_name: &str,
        identifier: &EntityIdentifier,
    ) -> Result<(), FileServiceError> {
        self.require_type(type_name)?;
        let path = self.type_dir(type_name).join(hex::encode(identifier));
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete the whole store for this `(currency, network)` pair.
    pub fn wipe(self) -> Result<(), FileServiceError> {
        match fs::remove_dir_all(&self.base) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(dir: &Path) -> FileService {
        let mut fs = FileService::new(dir, "avax", "mainnet").unwrap();
        fs.register_type("transfer", 2).unwrap();
        fs
    }

    #[test]
    fn test_save_load_remove() {
        let dir = tempfile::tempdir().unwrap();
        let fs = service(dir.path());

        let id = transfer_identifier("uids-1");
        fs.save("transfer", &id, b"payload").unwrap();

        let loaded = fs.load_all("transfer").unwrap();
        assert_eq!(loaded, vec![(id, b"payload".to_vec())]);

        fs.remove("transfer", &id).unwrap();
        fs.remove("transfer", &id).unwrap(); // second removal is a no-op
        assert!(fs.load_all("transfer").unwrap().is_empty());
    }

    #[test]
    fn test_unregistered_type_is_impl_error() {
        let dir = tempfile::tempdir().unwrap();
        let fs = service(dir.path());
        let err = fs.save("nope", &[0u8; 32], b"x").unwrap_err();
        assert!(matches!(err, FileServiceError::Impl(_)));
    }

    #[test]
    fn test_newer_store_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut fs = FileService::new(dir.path(), "avax", "mainnet").unwrap();
            fs.register_type("transfer", 5).unwrap();
        }
        let mut fs = FileService::new(dir.path(), "avax", "mainnet").unwrap();
        let err = fs.register_type("transfer", 2).unwrap_err();
        assert!(matches!(err, FileServiceError::Store(_)));
    }

    #[test]
    fn test_corrupt_sidecar_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut fs = FileService::new(dir.path(), "avax", "mainnet").unwrap();
            fs.register_type("transfer", 2).unwrap();
        }
        std::fs::write(
            dir.path().join("avax/mainnet/transfer").join(VERSION_SIDECAR),
            "not a number",
        )
        .unwrap();

        let mut fs = FileService::new(dir.path(), "avax", "mainnet").unwrap();
        assert!(matches!(
            fs.register_type("transfer", 2).unwrap_err(),
            FileServiceError::Store(_)
        ));
    }

    #[test]
    fn test_wipe() {
        let dir = tempfile::tempdir().unwrap();
        let fs = service(dir.path());
        let base = fs.base_path().to_path_buf();
        fs.save("transfer", &[1u8; 32], b"x").unwrap();

        FileService::new(dir.path(), "avax", "mainnet")
            .unwrap()
            .wipe()
            .unwrap();
        assert!(!base.exists());
    }
}
