use derive_more::{AsRef, From, Into};
use the_newtype::Newtype;

use rst_common::standard::async_trait::async_trait;
use rst_common::standard::chrono::{DateTime, Utc};
use rst_common::standard::serde::{self, Deserialize, Serialize};
use rst_common::with_errors::thiserror::{self, Error};

/// `LedgerError` is a base error types for the ledger collaborator
#[derive(Debug, PartialEq, Error, Serialize, Deserialize, Clone)]
#[serde(crate = "self::serde")]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("entity error: {0}")]
    EntityError(String),
}

/// Ledger reference of a registered schema
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Newtype, From, Into, AsRef)]
#[serde(crate = "self::serde")]
pub struct SchemaRef(String);

impl SchemaRef {
    pub fn from_validated(schema_ref: String) -> Self {
        Self(schema_ref)
    }

    pub fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ledger reference of a registered credential definition
///
/// Every credential offer points at one of these; the holder derives its
/// credential request from it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Newtype, From, Into, AsRef)]
#[serde(crate = "self::serde")]
pub struct CredentialDefinitionRef(String);

impl CredentialDefinitionRef {
    pub fn from_validated(cred_def_ref: String) -> Self {
        Self(cred_def_ref)
    }

    pub fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `SchemaSpec` describes a schema to be registered on the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct SchemaSpec {
    name: String,
    version: String,
    attribute_names: Vec<String>,
}

impl SchemaSpec {
    pub fn new(name: String, version: String, attribute_names: Vec<String>) -> Self {
        Self {
            name,
            version,
            attribute_names,
        }
    }

    pub fn get_name(&self) -> &String {
        &self.name
    }

    pub fn get_version(&self) -> &String {
        &self.version
    }

    pub fn get_attribute_names(&self) -> &Vec<String> {
        &self.attribute_names
    }
}

/// `Agreement` is the transaction author agreement a ledger operator may
/// enforce before accepting ledger-writing transactions
///
/// `acceptance_mechanisms` lists the mechanism labels the operator accepts;
/// an acceptance record must name one of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct Agreement {
    text: String,
    version: String,
    acceptance_mechanisms: Vec<String>,
}

impl Agreement {
    pub fn new(text: String, version: String, acceptance_mechanisms: Vec<String>) -> Self {
        Self {
            text,
            version,
            acceptance_mechanisms,
        }
    }

    pub fn get_text(&self) -> &String {
        &self.text
    }

    pub fn get_version(&self) -> &String {
        &self.version
    }

    pub fn get_acceptance_mechanisms(&self) -> &Vec<String> {
        &self.acceptance_mechanisms
    }
}

/// `LedgerClient` is the consumed distributed-ledger capability
///
/// `fetch_agreement` returns `None` when the target ledger enforces no
/// transaction author agreement; ledger-mutating operations may then proceed
/// without an acceptance record
#[async_trait]
pub trait LedgerClient: Clone + Send + Sync {
    async fn register_schema(&self, spec: SchemaSpec) -> Result<SchemaRef, LedgerError>;

    async fn register_credential_definition(
        &self,
        schema_ref: SchemaRef,
        tag: String,
    ) -> Result<CredentialDefinitionRef, LedgerError>;

    async fn fetch_agreement(&self) -> Result<Option<Agreement>, LedgerError>;

    async fn submit_agreement_acceptance(
        &self,
        text: String,
        version: String,
        mechanism: String,
        accepted_at: DateTime<Utc>,
    ) -> Result<(), LedgerError>;
}
