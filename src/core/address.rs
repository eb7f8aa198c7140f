//! Address verification seam.
//!
//! Verification is an external collaborator and is fail-open: if the service
//! cannot be reached the address is stored as provisional and the edit goes
//! ahead. Only a definite "undeliverable" verdict rejects the input.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A postal address as entered by the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailingAddress {
    /// First line
    pub line1: String,
    /// Optional second line
    pub line2: Option<String>,
    /// City
    pub city: String,
    /// State or region
    pub region: String,
    /// Postal code
    pub postal_code: String,
}

impl MailingAddress {
    /// Trims every field and rejects missing required parts.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] naming the first empty required field.
    pub fn normalized(&self) -> Result<Self> {
        let required = [
            ("line1", &self.line1),
            ("city", &self.city),
            ("region", &self.region),
            ("postal_code", &self.postal_code),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(Error::Validation {
                message: format!("Address {field} cannot be empty"),
            });
        }

        Ok(Self {
            line1: self.line1.trim().to_string(),
            line2: self
                .line2
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string),
            city: self.city.trim().to_string(),
            region: self.region.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
        })
    }
}

/// Verdict from a verification service that answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressVerdict {
    /// The address can receive mail
    Deliverable,
    /// The address definitely cannot receive mail
    Undeliverable,
}

/// Stored verification state of a recipient address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressStatus {
    /// Confirmed deliverable
    Verified,
    /// Accepted while the verification service was unavailable
    Provisional,
}

impl AddressStatus {
    /// Value stored in `recipients.address_status`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Provisional => "provisional",
        }
    }
}

/// An external address verification service.
pub trait AddressVerifier {
    /// Checks an address. An `Err` means the service itself failed.
    fn verify(
        &self,
        address: &MailingAddress,
    ) -> impl std::future::Future<Output = Result<AddressVerdict>> + Send;
}

/// Verifier that accepts every address; used when no service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllVerifier;

impl AddressVerifier for AcceptAllVerifier {
    async fn verify(&self, _address: &MailingAddress) -> Result<AddressVerdict> {
        Ok(AddressVerdict::Deliverable)
    }
}

/// Runs verification with the fail-open policy.
///
/// # Errors
/// Returns [`Error::Validation`] only when the service reports the address as
/// undeliverable.
pub async fn check_address<V>(verifier: &V, address: &MailingAddress) -> Result<AddressStatus>
where
    V: AddressVerifier + Sync,
{
    match verifier.verify(address).await {
        Ok(AddressVerdict::Deliverable) => Ok(AddressStatus::Verified),
        Ok(AddressVerdict::Undeliverable) => Err(Error::Validation {
            message: format!(
                "Address is undeliverable: {}, {} {}",
                address.line1, address.city, address.postal_code
            ),
        }),
        Err(e) => {
            warn!("Address verification unavailable, accepting provisionally: {e}");
            Ok(AddressStatus::Provisional)
        }
    }
}
