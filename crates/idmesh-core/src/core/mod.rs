// crates/idmesh-core/src/core/mod.rs
// ============================================================================
// Module: idmesh Core Types
// Description: Canonical idmesh data model and registry structures.
// Purpose: Provide stable, serializable types for requests, parties, and identities.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types define the request aggregate, callback events, party records,
//! identity and service registries, and the shared error taxonomy. These
//! types are the canonical source of truth for any derived API surfaces.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod block;
pub mod callback;
pub mod directory;
pub mod errors;
pub mod hashing;
pub mod identifiers;
pub mod identity;
pub mod party;
pub mod proxy;
pub mod request;
pub mod time;
pub mod token;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use block::BlockHeight;
pub use block::LogicalChain;
pub use callback::CallbackEvent;
pub use callback::IncomingDataRequest;
pub use directory::PriceByCurrency;
pub use directory::PriceSchedule;
pub use directory::ServiceDefinition;
pub use directory::ServiceDirectory;
pub use directory::ServiceOffering;
pub use errors::ErrorDetail;
pub use errors::PlatformError;
pub use hashing::HashDigest;
pub use hashing::HashingError;
pub use hashing::PADDED_HASH_LEN;
pub use hashing::Salt;
pub use hashing::derive_request_salt;
pub use hashing::derive_service_salt;
pub use hashing::hash_bytes;
pub use hashing::hash_canonical_json;
pub use hashing::hash_request_message;
pub use hashing::padded_message_hash;
pub use identifiers::AccessorId;
pub use identifiers::AssuranceLevel;
pub use identifiers::IdentityMode;
pub use identifiers::NodeId;
pub use identifiers::ReferenceGroupCode;
pub use identifiers::ReferenceId;
pub use identifiers::RequestId;
pub use identifiers::ServiceId;
pub use identity::AccessorRecord;
pub use identity::IdentityRegistry;
pub use identity::NamespaceRecord;
pub use identity::SubjectRecord;
pub use identity::decode_public_key;
pub use identity::validate_national_id;
pub use identity::verify_accessor_signature;
pub use party::NodeRecord;
pub use party::NodeRole;
pub use party::NodeTable;
pub use proxy::ProxyBinding;
pub use proxy::ProxyKeyConfig;
pub use proxy::ProxyTable;
pub use request::AccessorInput;
pub use request::AddAccessorInput;
pub use request::AsDataInput;
pub use request::CloseRequestInput;
pub use request::ConsentStatus;
pub use request::CreateIdentityInput;
pub use request::CreateRequestInput;
pub use request::DataRequestSpec;
pub use request::IdpResponseInput;
pub use request::RequestRecord;
pub use request::RequestSnapshot;
pub use request::RequestStatus;
pub use request::RequestTarget;
pub use request::ResponseValidation;
pub use request::ServiceProgress;
pub use time::Timestamp;
pub use token::TokenLedger;
