use derive_more::{AsRef, From, Into};
use the_newtype::Newtype;

use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::standard::uuid::Uuid;

/// Unique identifier of one credential or proof exchange
///
/// An exchange is always scoped to a single connection; the pair
/// `(connection, exchange id)` identifies exactly one flow
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Newtype, From, Into, AsRef)]
#[serde(crate = "self::serde")]
pub struct ExchangeID(String);

impl ExchangeID {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_validated(id: String) -> Self {
        Self(id)
    }

    pub fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `AgentProfile` carries the institution identity shown to counterparties
/// inside invitations
///
/// This replaces the original engine's ambient mutable configuration: the
/// profile is an explicit value handed to the component that needs it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct AgentProfile {
    name: String,
    logo_url: Option<String>,
}

impl AgentProfile {
    pub fn new(name: String, logo_url: Option<String>) -> Self {
        Self { name, logo_url }
    }

    pub fn get_name(&self) -> &String {
        &self.name
    }

    pub fn get_logo_url(&self) -> Option<String> {
        self.logo_url.clone()
    }
}
