//! Value objects: equality by value, not identity.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**; to "modify" one,
/// build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

const MAX_SLUG_LEN: usize = 255;
const MAX_SKU_LEN: usize = 100;

/// Opaque catalog identifier of a product design (e.g. `linen-midi-dress`).
///
/// The catalog owns product content; this crate only needs a stable key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductSlug(String);

impl ProductSlug {
    pub fn parse(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        let value = raw.trim();
        if value.is_empty() {
            return Err(DomainError::validation("product slug must not be empty"));
        }
        if value.len() > MAX_SLUG_LEN {
            return Err(DomainError::validation(format!(
                "product slug exceeds {MAX_SLUG_LEN} characters"
            )));
        }
        if value.chars().any(char::is_whitespace) {
            return Err(DomainError::validation(
                "product slug must not contain whitespace",
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for ProductSlug {}

impl TryFrom<String> for ProductSlug {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ProductSlug> for String {
    fn from(value: ProductSlug) -> Self {
        value.0
    }
}

impl core::fmt::Display for ProductSlug {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stock-keeping unit printed on one physical garment's tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn parse(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        let value = raw.trim();
        if value.is_empty() {
            return Err(DomainError::validation("sku must not be empty"));
        }
        if value.len() > MAX_SKU_LEN {
            return Err(DomainError::validation(format!(
                "sku exceeds {MAX_SKU_LEN} characters"
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Sku {}

impl TryFrom<String> for Sku {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Sku> for String {
    fn from(value: Sku) -> Self {
        value.0
    }
}

impl core::fmt::Display for Sku {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
