//! Encrypted key-value store (§4.K) backing both credentials
//! (`cred:<name>`) and config overrides (`config:<section>`), so both use
//! one crypto path: PBKDF2-derived key (from `CredentialsConfig.credential_key_env`)
//! + AES-GCM, grounded on the `pbkdf2`/`aes-gcm`/`rand` dependency stack.
//!
//! Access is serialized through a single `parking_lot::RwLock`, the same
//! shape as [`beto_sessions::store::SessionStore`] (load-on-open, flush
//! whole-file-on-write).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use parking_lot::RwLock;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use beto_domain::error::{Error, Result};

const PBKDF2_ROUNDS: u32 = 480_000;

#[derive(Debug, Serialize, Deserialize, Default)]
struct StoreFile {
    salt: String,
    entries: HashMap<String, Entry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    nonce: String,
    ciphertext: String,
}

pub struct CredentialStore {
    path: PathBuf,
    key_env: String,
    file: RwLock<StoreFile>,
}

impl CredentialStore {
    pub fn open(path: &Path, key_env: &str) -> Result<Self> {
        let file = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            let mut salt = [0u8; 16];
            rand::thread_rng().fill_bytes(&mut salt);
            StoreFile { salt: base64::engine::general_purpose::STANDARD.encode(salt), entries: HashMap::new() }
        };

        Ok(Self { path: path.to_path_buf(), key_env: key_env.to_string(), file: RwLock::new(file) })
    }

    /// Derive the AES-256 key from the passphrase in `self.key_env`.
    /// Returns an error (rather than panicking) when the env var is unset
    /// — credential endpoints stay disabled until an operator sets it.
    fn derive_key(&self, salt_b64: &str) -> Result<[u8; 32]> {
        let passphrase = std::env::var(&self.key_env)
            .map_err(|_| Error::Config(format!("{} is not set; credential store disabled", self.key_env)))?;
        let salt = base64::engine::general_purpose::STANDARD
            .decode(salt_b64)
            .map_err(|e| Error::Other(format!("corrupt credential store salt: {e}")))?;
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), &salt, PBKDF2_ROUNDS, &mut key);
        Ok(key)
    }

    /// Encrypt and store `value` under `key`, persisting immediately.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut file = self.file.write();
        let aes_key = self.derive_key(&file.salt)?;
        let cipher = Aes256Gcm::new_from_slice(&aes_key).map_err(|e| Error::Other(e.to_string()))?;

        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher.encrypt(nonce, value.as_bytes()).map_err(|e| Error::Other(e.to_string()))?;

        file.entries.insert(
            key.to_string(),
            Entry {
                nonce: base64::engine::general_purpose::STANDARD.encode(nonce_bytes),
                ciphertext: base64::engine::general_purpose::STANDARD.encode(ciphertext),
            },
        );
        self.flush_locked(&file)
    }

    /// Decrypt and return the value stored under `key`.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let file = self.file.read();
        let Some(entry) = file.entries.get(key) else { return Ok(None) };
        let aes_key = self.derive_key(&file.salt)?;
        let cipher = Aes256Gcm::new_from_slice(&aes_key).map_err(|e| Error::Other(e.to_string()))?;

        let nonce_bytes = base64::engine::general_purpose::STANDARD
            .decode(&entry.nonce)
            .map_err(|e| Error::Other(format!("corrupt credential entry: {e}")))?;
        let ciphertext = base64::engine::general_purpose::STANDARD
            .decode(&entry.ciphertext)
            .map_err(|e| Error::Other(format!("corrupt credential entry: {e}")))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| Error::Auth("credential decryption failed; wrong key or corrupt store".into()))?;
        Ok(Some(String::from_utf8_lossy(&plaintext).into_owned()))
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        let mut file = self.file.write();
        file.entries.remove(key);
        self.flush_locked(&file)
    }

    /// List stored keys matching `prefix` (e.g. `"config:"` or `"cred:"`).
    pub fn list_keys(&self, prefix: &str) -> Vec<String> {
        self.file.read().entries.keys().filter(|k| k.starts_with(prefix)).cloned().collect()
    }

    fn flush_locked(&self, file: &StoreFile) -> Result<()> {
        let json = serde_json::to_string_pretty(file).map_err(Error::Json)?;
        std::fs::write(&self.path, json).map_err(Error::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_roundtrips() {
        std::env::set_var("TEST_CREDENTIAL_KEY_1", "correct horse battery staple");
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(&dir.path().join("store.json"), "TEST_CREDENTIAL_KEY_1").unwrap();
        store.set("cred:github", "ghp_abc123").unwrap();
        assert_eq!(store.get("cred:github").unwrap(), Some("ghp_abc123".to_string()));
    }

    #[test]
    fn missing_env_var_errors_instead_of_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(&dir.path().join("store.json"), "TEST_CREDENTIAL_KEY_UNSET").unwrap();
        assert!(store.set("cred:x", "y").is_err());
    }

    #[test]
    fn list_keys_filters_by_prefix() {
        std::env::set_var("TEST_CREDENTIAL_KEY_2", "passphrase");
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(&dir.path().join("store.json"), "TEST_CREDENTIAL_KEY_2").unwrap();
        store.set("cred:a", "1").unwrap();
        store.set("config:server", "{}").unwrap();
        assert_eq!(store.list_keys("cred:"), vec!["cred:a".to_string()]);
    }

    #[test]
    fn delete_removes_entry() {
        std::env::set_var("TEST_CREDENTIAL_KEY_3", "passphrase");
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(&dir.path().join("store.json"), "TEST_CREDENTIAL_KEY_3").unwrap();
        store.set("cred:a", "1").unwrap();
        store.delete("cred:a").unwrap();
        assert_eq!(store.get("cred:a").unwrap(), None);
    }
}
