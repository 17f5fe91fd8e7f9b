//! # Stage: Locale Classifier
//!
//! ## Responsibility
//! Map a receiver postal code onto one of four mutually exclusive
//! area-surcharge categories, and answer the two locale questions the
//! router asks: is this a recognised US locale, and is it a special locale
//! that must always be carrier-rated.
//!
//! ## Guarantees
//! - One-hot: every [`SurchargeClass`] has exactly one flag set
//! - Silent degrade: an unknown or unparsable charge code becomes
//!   [`SurchargeCode::None`], never an error
//! - Read-only: reference tables are never mutated from here
//!
//! ## NOT Responsible For
//! - Postal-code format validation (see: `request`)
//! - Maintaining the reference tables (external collaborator)

pub mod store;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use store::{
    AreaSurchargeRecord, FileLocaleStore, LocaleRecord, LocaleStore, MemoryLocaleStore,
    SpecialLocaleRecord, SpecialPostalCode,
};

/// Errors raised while reading a reference table.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The table file exists but could not be read.
    #[error("failed to read reference table '{file}': {source}")]
    Io {
        /// Table file path.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The table file is not valid JSON for its record shape.
    #[error("malformed reference table '{file}': {source}")]
    Malformed {
        /// Table file path.
        file: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Area-surcharge charge code as stored in the surcharge table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurchargeCode {
    /// No surcharge.
    None,
    /// Delivery area surcharge.
    Das,
    /// Extended delivery area surcharge.
    Edas,
    /// Remote area surcharge.
    Ras,
}

impl FromStr for SurchargeCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "DAS" => Ok(Self::Das),
            "EDAS" => Ok(Self::Edas),
            "RAS" => Ok(Self::Ras),
            _ => Err(()),
        }
    }
}

impl SurchargeCode {
    /// Parse a raw charge code, degrading anything unrecognised to `None`.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::None)
    }

    /// Canonical table spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Das => "DAS",
            Self::Edas => "EDAS",
            Self::Ras => "RAS",
        }
    }
}

impl fmt::Display for SurchargeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Four-way exclusive surcharge classification carried on the feature vector.
///
/// Only constructible from a [`SurchargeCode`], so exactly one flag is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurchargeClass {
    none: bool,
    delivery: bool,
    extended: bool,
    remote: bool,
}

impl From<SurchargeCode> for SurchargeClass {
    fn from(code: SurchargeCode) -> Self {
        Self {
            none: code == SurchargeCode::None,
            delivery: code == SurchargeCode::Das,
            extended: code == SurchargeCode::Edas,
            remote: code == SurchargeCode::Ras,
        }
    }
}

impl SurchargeClass {
    /// No area surcharge applies.
    pub fn none(&self) -> bool {
        self.none
    }

    /// Delivery area surcharge applies.
    pub fn delivery(&self) -> bool {
        self.delivery
    }

    /// Extended delivery area surcharge applies.
    pub fn extended(&self) -> bool {
        self.extended
    }

    /// Remote area surcharge applies.
    pub fn remote(&self) -> bool {
        self.remote
    }

    /// The charge code this classification was built from.
    pub fn code(&self) -> SurchargeCode {
        if self.delivery {
            SurchargeCode::Das
        } else if self.extended {
            SurchargeCode::Edas
        } else if self.remote {
            SurchargeCode::Ras
        } else {
            SurchargeCode::None
        }
    }
}

/// Classifies postal codes against the reference tables.
#[derive(Clone)]
pub struct LocaleClassifier {
    store: Arc<dyn LocaleStore>,
}

impl LocaleClassifier {
    /// Create a classifier backed by `store`.
    pub fn new(store: Arc<dyn LocaleStore>) -> Self {
        Self { store }
    }

    /// Surcharge classification for `postal_code`.
    ///
    /// A postal code absent from the surcharge table classifies as `NONE`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the table itself cannot be read.
    pub async fn classify(&self, postal_code: &str) -> Result<SurchargeClass, StoreError> {
        let code = match self.store.surcharge_code(postal_code).await? {
            Some(raw) => SurchargeCode::parse_lenient(&raw),
            None => SurchargeCode::None,
        };
        debug!(postal_code, surcharge = %code, "locale classified");
        Ok(code.into())
    }

    /// Whether `postal_code` is a recognised US locale.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the locale table cannot be read.
    pub async fn is_recognized(&self, postal_code: &str) -> Result<bool, StoreError> {
        self.store.is_recognized(postal_code).await
    }

    /// Whether `postal_code` is flagged as a special locale.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the special-locale table cannot be read.
    pub async fn is_special(&self, postal_code: &str) -> Result<bool, StoreError> {
        self.store.is_special(postal_code).await
    }
}

impl fmt::Debug for LocaleClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocaleClassifier").finish_non_exhaustive()
    }
}
