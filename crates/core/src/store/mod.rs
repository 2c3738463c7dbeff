//! The durable store.
//!
//! Holds tasks, patterns, preferences, the persistent response cache and
//! usage statistics, each serialized whole under a single key. Every write
//! rewrites the full category; concurrent writers to the same category race
//! and the last snapshot wins.
//!
//! Reads never fail on bad data. A value that cannot be decrypted or parsed,
//! or an envelope found while encryption is disabled, is deleted and reported
//! as absent.

pub mod hash;
pub mod keys;
pub mod migrate;
pub mod patterns;
pub mod preferences;
pub mod response_cache;
pub mod tasks;
pub mod transfer;
pub mod usage;

use std::sync::Arc;
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Error;
use crate::config::AppConfig;
use crate::crypto::{Cipher, Envelope};
use crate::storage::{Area, KvDb, MemoryArea, StorageArea};

pub use migrate::CURRENT_SCHEMA_VERSION;

/// Store behavior knobs, usually derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub encryption_enabled: bool,
    pub response_cache_max_entries: usize,
    pub response_cache_ttl: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for StoreSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            encryption_enabled: config.encryption_enabled,
            response_cache_max_entries: config.response_cache_max_entries,
            response_cache_ttl: config.response_cache_ttl(),
        }
    }
}

/// Handle to an initialized durable store.
///
/// Construct with [`Store::open`], [`Store::open_in_memory`] or
/// [`Store::with_areas`]; all three run key setup, data migrations and
/// default seeding before returning.
pub struct Store {
    local: Arc<dyn StorageArea>,
    sync: Arc<dyn StorageArea>,
    cipher: Option<Cipher>,
    settings: StoreSettings,
}

impl Store {
    /// Open the SQLite-backed store described by `config`.
    pub async fn open(config: &AppConfig) -> Result<Self, Error> {
        let db = KvDb::open(&config.db_path).await?;
        Self::with_areas(Arc::new(db.area(Area::Local)), Arc::new(db.area(Area::Sync)), config.into()).await
    }

    /// Open a store over a fresh in-memory SQLite database.
    pub async fn open_in_memory(settings: StoreSettings) -> Result<Self, Error> {
        let db = KvDb::open_in_memory().await?;
        Self::with_areas(Arc::new(db.area(Area::Local)), Arc::new(db.area(Area::Sync)), settings).await
    }

    /// Open a store over plain in-memory maps.
    pub async fn ephemeral(settings: StoreSettings) -> Result<Self, Error> {
        Self::with_areas(Arc::new(MemoryArea::new()), Arc::new(MemoryArea::new()), settings).await
    }

    /// Initialize a store over caller-provided storage areas.
    pub async fn with_areas(
        local: Arc<dyn StorageArea>, sync: Arc<dyn StorageArea>, settings: StoreSettings,
    ) -> Result<Self, Error> {
        let cipher = if settings.encryption_enabled { Some(load_or_create_key(local.as_ref()).await?) } else { None };

        let store = Self { local, sync, cipher, settings };

        let version = migrate::run(&store).await?;
        store.ensure_defaults().await?;

        tracing::info!(
            schema_version = version,
            encryption = store.cipher.is_some(),
            "Durable store initialized"
        );

        Ok(store)
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn encryption_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    pub(crate) fn area(&self, area: Area) -> &dyn StorageArea {
        match area {
            Area::Local => self.local.as_ref(),
            Area::Sync => self.sync.as_ref(),
        }
    }

    fn area_for(&self, key: &str) -> &dyn StorageArea {
        if key == keys::PREFERENCES { self.area(Area::Sync) } else { self.area(Area::Local) }
    }

    /// Read and decode the value stored under `key`.
    ///
    /// Returns `Ok(None)` both when nothing is stored and when the stored
    /// value was corrupt and has just been discarded.
    pub(crate) async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        let Some(raw) = self.area_for(key).get(key).await? else {
            return Ok(None);
        };

        let plaintext = match (Envelope::parse(&raw), &self.cipher) {
            (Some(_), None) => {
                tracing::warn!(key, "Discarding encrypted value found while encryption is disabled");
                self.discard(key).await;
                return Ok(None);
            }
            (Some(envelope), Some(cipher)) => match cipher.open(&envelope) {
                Ok(plaintext) => plaintext,
                Err(e) => {
                    tracing::warn!(key, error = %e, "Discarding undecryptable value");
                    self.discard(key).await;
                    return Ok(None);
                }
            },
            (None, _) => raw,
        };

        match serde_json::from_str(&plaintext) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding unparseable value");
                self.discard(key).await;
                Ok(None)
            }
        }
    }

    /// Serialize `value`, seal it when encryption is on, and store it.
    pub(crate) async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), Error> {
        let plaintext = serde_json::to_string(value)?;
        let stored = match &self.cipher {
            Some(cipher) => cipher.seal(&plaintext)?.to_json()?,
            None => plaintext,
        };
        self.area_for(key).set(key, stored).await
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.area_for(key).remove(key).await {
            tracing::warn!(key, error = %e, "Failed to remove corrupt value");
        }
    }

    /// Seed every category that has no stored value yet.
    pub(crate) async fn ensure_defaults(&self) -> Result<(), Error> {
        for key in keys::LOCAL_DATA {
            if self.local.get(key).await?.is_none() {
                self.write(key, &serde_json::json!({})).await?;
            }
        }
        if self.sync.get(keys::PREFERENCES).await?.is_none() {
            self.write(keys::PREFERENCES, &preferences::UserPreferences::default())
                .await?;
        }
        Ok(())
    }

    /// Persist the exported key of the active cipher, if any.
    pub(crate) async fn persist_key(&self) -> Result<(), Error> {
        if let Some(cipher) = &self.cipher {
            self.local.set(keys::ENCRYPTION_KEY, cipher.export()).await?;
        }
        Ok(())
    }
}

/// Load the installation key, generating and persisting one on first use.
///
/// An unreadable stored key is replaced; values sealed with it become
/// undecryptable and are discarded on their next read.
async fn load_or_create_key(local: &dyn StorageArea) -> Result<Cipher, Error> {
    if let Some(exported) = local.get(keys::ENCRYPTION_KEY).await? {
        match Cipher::import(&exported) {
            Ok(cipher) => return Ok(cipher),
            Err(e) => tracing::warn!(error = %e, "Stored encryption key is unreadable; generating a new one"),
        }
    }

    let cipher = Cipher::generate();
    local.set(keys::ENCRYPTION_KEY, cipher.export()).await?;
    tracing::info!("Generated new encryption key");
    Ok(cipher)
}

/// Compile a website pattern the way matching uses it.
pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::invalid_pattern(pattern, &e))
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(())
}
