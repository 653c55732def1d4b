use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::serde_json;

use rstdev_domain::entity::ToJSON;
use rstdev_domain::BaseError;

use super::types::{Agreement, LedgerError};

/// `AgreementAcceptance` records one accepted transaction author agreement
///
/// It is created once per ledger-write session and must precede any
/// ledger-mutating operation against a ledger that enforces the agreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct AgreementAcceptance {
    text: String,
    version: String,
    mechanism: String,
    accepted_at: DateTime<Utc>,
}

impl AgreementAcceptance {
    pub fn new(text: String, version: String, mechanism: String) -> Self {
        Self {
            text,
            version,
            mechanism,
            accepted_at: Utc::now(),
        }
    }

    /// True when this record covers the given agreement text and version.
    /// A ledger operator rotating the agreement invalidates old records
    pub fn covers(&self, agreement: &Agreement) -> bool {
        self.text.eq(agreement.get_text()) && self.version.eq(agreement.get_version())
    }

    pub fn get_text(&self) -> &String {
        &self.text
    }

    pub fn get_version(&self) -> &String {
        &self.version
    }

    pub fn get_mechanism(&self) -> &String {
        &self.mechanism
    }

    pub fn get_accepted_at(&self) -> DateTime<Utc> {
        self.accepted_at
    }
}

impl ToJSON for AgreementAcceptance {
    fn to_json(&self) -> Result<String, BaseError> {
        serde_json::to_string(self).map_err(|err| BaseError::ToJSONError(err.to_string()))
    }
}

impl TryInto<Vec<u8>> for AgreementAcceptance {
    type Error = LedgerError;

    fn try_into(self) -> Result<Vec<u8>, Self::Error> {
        serde_json::to_vec(&self).map_err(|err| LedgerError::EntityError(err.to_string()))
    }
}

impl TryFrom<Vec<u8>> for AgreementAcceptance {
    type Error = LedgerError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        serde_json::from_slice(&bytes).map_err(|err| LedgerError::EntityError(err.to_string()))
    }
}
