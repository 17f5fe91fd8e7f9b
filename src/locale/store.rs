//! Reference-table access for locale lookups.
//!
//! Three tables are consulted, each keyed by the 5-digit postal code:
//! the US locale table, the area-surcharge table and the special-locale table.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::StoreError;

/// US locale table file name.
pub const LOCALES_FILE: &str = "locales.json";
/// Area-surcharge table file name.
pub const AREA_SURCHARGES_FILE: &str = "area_surcharges.json";
/// Special-locale table file name.
pub const SPECIAL_LOCALES_FILE: &str = "special_locales.json";

/// Read access to the locale reference tables.
#[async_trait]
pub trait LocaleStore: Send + Sync {
    /// Whether `postal_code` appears in the US locale table.
    async fn is_recognized(&self, postal_code: &str) -> Result<bool, StoreError>;

    /// Whether `postal_code` appears in the special-locale table.
    async fn is_special(&self, postal_code: &str) -> Result<bool, StoreError>;

    /// Raw charge code for `postal_code`, if the surcharge table has one.
    async fn surcharge_code(&self, postal_code: &str) -> Result<Option<String>, StoreError>;
}

/// Row of the US locale table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocaleRecord {
    /// Country code.
    #[serde(default)]
    pub country: String,
    /// Five-digit postal code.
    pub postal_code: String,
    /// First three digits of the postal code.
    #[serde(default)]
    pub postal_code_prefix: String,
    /// City name.
    #[serde(default)]
    pub city: String,
    /// State name.
    #[serde(default)]
    pub state: String,
    /// Two-letter state code.
    #[serde(default)]
    pub state_code: String,
}

/// Row of the area-surcharge table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AreaSurchargeRecord {
    /// First three digits of the postal code.
    #[serde(default)]
    pub postal_code_prefix: String,
    /// Five-digit postal code.
    pub postal_code: String,
    /// Raw charge code (`NONE`, `DAS`, `EDAS`, `RAS`).
    pub charge_code: String,
}

/// Row of the special-locale table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpecialLocaleRecord {
    /// The special postal code and its observed outcomes.
    pub special_postal_code: SpecialPostalCode,
}

/// Detail of a special locale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpecialPostalCode {
    /// Area-surcharge code recorded for this locale.
    #[serde(default)]
    pub as_charge_code: String,
    /// City name.
    #[serde(default)]
    pub city: String,
    /// State code.
    #[serde(default)]
    pub state: String,
    /// Five-digit postal code.
    pub postal_code: String,
    /// Service that actually won when rated.
    #[serde(default)]
    pub winning_service: String,
    /// Service the classifier predicted.
    #[serde(default)]
    pub predicted_service: String,
}

// ── In-memory store ─────────────────────────────────────────────────────

/// Locale store held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocaleStore {
    locales: HashSet<String>,
    specials: HashSet<String>,
    surcharges: HashMap<String, String>,
}

impl MemoryLocaleStore {
    /// Start building a store.
    pub fn builder() -> MemoryLocaleStoreBuilder {
        MemoryLocaleStoreBuilder::default()
    }
}

/// Builder for [`MemoryLocaleStore`].
#[derive(Debug, Default)]
pub struct MemoryLocaleStoreBuilder {
    inner: MemoryLocaleStore,
}

impl MemoryLocaleStoreBuilder {
    /// Add a recognised US locale.
    pub fn locale(mut self, postal_code: &str) -> Self {
        self.inner.locales.insert(postal_code.to_string());
        self
    }

    /// Add a special locale.
    pub fn special(mut self, postal_code: &str) -> Self {
        self.inner.specials.insert(postal_code.to_string());
        self
    }

    /// Add an area-surcharge row.
    pub fn surcharge(mut self, postal_code: &str, charge_code: &str) -> Self {
        self.inner
            .surcharges
            .insert(postal_code.to_string(), charge_code.to_string());
        self
    }

    /// Finish building.
    pub fn build(self) -> MemoryLocaleStore {
        self.inner
    }
}

#[async_trait]
impl LocaleStore for MemoryLocaleStore {
    async fn is_recognized(&self, postal_code: &str) -> Result<bool, StoreError> {
        Ok(self.locales.contains(postal_code))
    }

    async fn is_special(&self, postal_code: &str) -> Result<bool, StoreError> {
        Ok(self.specials.contains(postal_code))
    }

    async fn surcharge_code(&self, postal_code: &str) -> Result<Option<String>, StoreError> {
        Ok(self.surcharges.get(postal_code).cloned())
    }
}

// ── File-backed store ───────────────────────────────────────────────────

/// Locale store reading JSON-array tables from a directory on every call.
///
/// A missing table file reads as an empty table.
#[derive(Debug, Clone)]
pub struct FileLocaleStore {
    dir: PathBuf,
}

impl FileLocaleStore {
    /// Create a store over the tables in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the tables are read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_table<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>, StoreError> {
        let path = self.dir.join(name);
        let file = path.display().to_string();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { file, source }),
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Malformed { file, source })
    }
}

#[async_trait]
impl LocaleStore for FileLocaleStore {
    async fn is_recognized(&self, postal_code: &str) -> Result<bool, StoreError> {
        let rows: Vec<LocaleRecord> = self.read_table(LOCALES_FILE).await?;
        Ok(rows.iter().any(|r| r.postal_code == postal_code))
    }

    async fn is_special(&self, postal_code: &str) -> Result<bool, StoreError> {
        let rows: Vec<SpecialLocaleRecord> = self.read_table(SPECIAL_LOCALES_FILE).await?;
        Ok(rows
            .iter()
            .any(|r| r.special_postal_code.postal_code == postal_code))
    }

    async fn surcharge_code(&self, postal_code: &str) -> Result<Option<String>, StoreError> {
        let rows: Vec<AreaSurchargeRecord> = self.read_table(AREA_SURCHARGES_FILE).await?;
        Ok(rows
            .into_iter()
            .find(|r| r.postal_code == postal_code)
            .map(|r| r.charge_code))
    }
}
