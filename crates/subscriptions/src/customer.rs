use serde::{Deserialize, Serialize};

use seasons_core::{DomainError, DomainResult};

const MAX_PHONE_LEN: usize = 32;
const MAX_ADDRESS_LEN: usize = 1000;

/// Where a subscriber's boxes ship; captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    address: String,
    phone: Option<String>,
}

impl ShippingDetails {
    pub fn new(address: impl Into<String>, phone: Option<String>) -> DomainResult<Self> {
        let address = address.into().trim().to_string();
        if address.is_empty() {
            return Err(DomainError::validation("shipping address is required"));
        }
        if address.len() > MAX_ADDRESS_LEN {
            return Err(DomainError::validation(format!(
                "shipping address exceeds {MAX_ADDRESS_LEN} characters"
            )));
        }

        let phone = phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        if let Some(p) = &phone {
            if p.len() > MAX_PHONE_LEN {
                return Err(DomainError::validation(format!(
                    "phone exceeds {MAX_PHONE_LEN} characters"
                )));
            }
        }

        Ok(Self { address, phone })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }
}
