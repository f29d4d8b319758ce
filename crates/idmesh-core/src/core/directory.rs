// crates/idmesh-core/src/core/directory.rs
// ============================================================================
// Module: idmesh Service Directory
// Description: AS service offerings, approval state, schemas, and prices.
// Purpose: Resolve which AS nodes may answer a data request and validate their data.
// Dependencies: serde, serde_json, jsonschema, std
// ============================================================================

//! ## Overview
//! The service directory is a pure lookup/association store consumed by the
//! request engine. A service is defined once at the NDID level, then offered
//! per-AS after explicit NDID approval. Offerings carry the callback URL,
//! assurance minimums, an optional JSON data schema applied to AS-submitted
//! data, optional namespace restrictions, and an optional price schedule
//! bounded by a platform price ceiling.
//!
//! Invariants:
//! - Offerings are never hard-deleted; deactivation hides them from
//!   resolution.
//! - Mutations are idempotent at the (service, AS) key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::RwLock;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::errors::PlatformError;
use crate::core::identifiers::AssuranceLevel;
use crate::core::identifiers::NodeId;
use crate::core::identifiers::ServiceId;

// ============================================================================
// SECTION: Price Schedule
// ============================================================================

/// Price entry for one currency.
///
/// # Invariants
/// - `amount` is in minor units of `currency`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceByCurrency {
    /// ISO currency code.
    pub currency: String,
    /// Price amount in minor units.
    pub amount: u64,
}

/// Price schedule attached to a service offering.
///
/// # Invariants
/// - `effective_from` gates when the schedule applies; older schedules are
///   replaced, not stacked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSchedule {
    /// Prices per currency.
    pub price_by_currency_list: Vec<PriceByCurrency>,
    /// Unix-millisecond timestamp the schedule becomes effective.
    pub effective_from: i64,
}

// ============================================================================
// SECTION: Service Records
// ============================================================================

/// NDID-level service definition.
///
/// # Invariants
/// - `service_id` is unique within the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Service identifier.
    pub service_id: ServiceId,
    /// Human-readable service name.
    pub service_name: String,
    /// Whether the service accepts new offerings and requests.
    pub active: bool,
    /// Price ceilings per currency, in minor units.
    pub price_ceiling_by_currency: BTreeMap<String, u64>,
}

/// Per-AS service offering.
///
/// # Invariants
/// - `data_schema`, when present, is a valid JSON schema.
/// - An offering exists only after NDID approval of the (service, AS) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOffering {
    /// Service identifier.
    pub service_id: ServiceId,
    /// Offering AS node.
    pub as_id: NodeId,
    /// Minimum subject IAL the AS accepts.
    pub min_ial: AssuranceLevel,
    /// Minimum subject AAL the AS accepts.
    pub min_aal: AssuranceLevel,
    /// AS callback endpoint for data requests.
    pub url: String,
    /// Whether the offering is active.
    pub active: bool,
    /// Whether the offering is administratively suspended.
    pub suspended: bool,
    /// Optional JSON schema applied to AS-submitted data.
    pub data_schema: Option<Value>,
    /// Optional schema version label.
    pub data_schema_version: Option<String>,
    /// Optional namespace restriction for the offering.
    pub supported_namespace_list: Option<Vec<String>>,
    /// Optional price schedule.
    pub price_schedule: Option<PriceSchedule>,
}

impl ServiceOffering {
    /// Returns true when the offering can answer data requests.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.active && !self.suspended
    }
}

/// Internal directory entry for one service.
#[derive(Debug, Clone)]
struct ServiceEntry {
    /// NDID-level definition.
    definition: ServiceDefinition,
    /// AS nodes approved to offer the service.
    approved: BTreeSet<NodeId>,
    /// Offerings keyed by AS node.
    offerings: BTreeMap<NodeId, ServiceOffering>,
}

// ============================================================================
// SECTION: Service Directory
// ============================================================================

/// In-memory service directory.
///
/// # Invariants
/// - Offerings require prior approval of the (service, AS) pair.
#[derive(Debug, Default)]
pub struct ServiceDirectory {
    /// Services keyed by identifier.
    services: RwLock<BTreeMap<ServiceId, ServiceEntry>>,
}

impl ServiceDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines or replaces a service at the NDID level.
    pub fn define_service(&self, definition: ServiceDefinition) {
        if let Ok(mut services) = self.services.write() {
            let service_id = definition.service_id.clone();
            services
                .entry(service_id)
                .and_modify(|entry| entry.definition = definition.clone())
                .or_insert_with(|| ServiceEntry {
                    definition,
                    approved: BTreeSet::new(),
                    offerings: BTreeMap::new(),
                });
        }
    }

    /// Enables or disables a service at the NDID level.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::ServiceDefinitionNotFound`] for unknown
    /// services.
    pub fn set_service_active(
        &self,
        service_id: &ServiceId,
        active: bool,
    ) -> Result<(), PlatformError> {
        let Ok(mut services) = self.services.write() else {
            return Err(PlatformError::ServiceDefinitionNotFound);
        };
        let entry =
            services.get_mut(service_id).ok_or(PlatformError::ServiceDefinitionNotFound)?;
        entry.definition.active = active;
        Ok(())
    }

    /// Approves an AS to offer a service.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::ServiceDefinitionNotFound`] for unknown
    /// services.
    pub fn approve_service(
        &self,
        service_id: &ServiceId,
        as_id: &NodeId,
    ) -> Result<(), PlatformError> {
        let Ok(mut services) = self.services.write() else {
            return Err(PlatformError::ServiceDefinitionNotFound);
        };
        let entry =
            services.get_mut(service_id).ok_or(PlatformError::ServiceDefinitionNotFound)?;
        entry.approved.insert(as_id.clone());
        Ok(())
    }

    /// Adds or updates an AS offering.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::UnauthorizedServiceRegistration`] when the AS
    /// is not approved, [`PlatformError::InvalidServiceSchema`] for a schema
    /// that fails to compile, and [`PlatformError::PriceCeilingExceeded`]
    /// when a price exceeds the service ceiling.
    pub fn add_or_update_service(&self, offering: ServiceOffering) -> Result<(), PlatformError> {
        if let Some(schema) = &offering.data_schema {
            jsonschema::validator_for(schema)
                .map_err(|err| PlatformError::InvalidServiceSchema(err.to_string()))?;
        }
        let Ok(mut services) = self.services.write() else {
            return Err(PlatformError::ServiceDefinitionNotFound);
        };
        let entry = services
            .get_mut(&offering.service_id)
            .ok_or(PlatformError::ServiceDefinitionNotFound)?;
        if !entry.approved.contains(&offering.as_id) {
            return Err(PlatformError::UnauthorizedServiceRegistration);
        }
        if let Some(schedule) = &offering.price_schedule {
            for price in &schedule.price_by_currency_list {
                let ceiling =
                    entry.definition.price_ceiling_by_currency.get(&price.currency).copied();
                if ceiling.is_some_and(|ceiling| price.amount > ceiling) {
                    return Err(PlatformError::PriceCeilingExceeded);
                }
            }
        }
        entry.offerings.insert(offering.as_id.clone(), offering);
        Ok(())
    }

    /// Enables or disables an AS offering.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::ServiceNotFound`] when the offering does not
    /// exist.
    pub fn set_offering_active(
        &self,
        service_id: &ServiceId,
        as_id: &NodeId,
        active: bool,
    ) -> Result<(), PlatformError> {
        let Ok(mut services) = self.services.write() else {
            return Err(PlatformError::ServiceNotFound);
        };
        let entry = services.get_mut(service_id).ok_or(PlatformError::ServiceNotFound)?;
        let offering = entry.offerings.get_mut(as_id).ok_or(PlatformError::ServiceNotFound)?;
        offering.active = active;
        Ok(())
    }

    /// Returns the service definition when known.
    #[must_use]
    pub fn get_definition(&self, service_id: &ServiceId) -> Option<ServiceDefinition> {
        self.services
            .read()
            .ok()
            .and_then(|services| services.get(service_id).map(|entry| entry.definition.clone()))
    }

    /// Returns the available offerings for an active service.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::ServiceNotFound`] for unknown or disabled
    /// services.
    pub fn available_offerings(
        &self,
        service_id: &ServiceId,
    ) -> Result<Vec<ServiceOffering>, PlatformError> {
        let Ok(services) = self.services.read() else {
            return Err(PlatformError::ServiceNotFound);
        };
        let entry = services.get(service_id).ok_or(PlatformError::ServiceNotFound)?;
        if !entry.definition.active {
            return Err(PlatformError::ServiceNotFound);
        }
        Ok(entry
            .offerings
            .values()
            .filter(|offering| offering.is_available())
            .cloned()
            .collect())
    }

    /// Returns the offering for one (service, AS) pair when available.
    #[must_use]
    pub fn get_offering(&self, service_id: &ServiceId, as_id: &NodeId) -> Option<ServiceOffering> {
        self.services
            .read()
            .ok()
            .and_then(|services| services.get(service_id).and_then(|entry| entry.offerings.get(as_id).cloned()))
    }

    /// Validates AS-submitted data against the offering's declared schema.
    ///
    /// Offerings without a schema accept any JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::DataValidationFailed`] when the data does not
    /// conform, and [`PlatformError::ServiceNotFound`] for unknown offerings.
    pub fn validate_data(
        &self,
        service_id: &ServiceId,
        as_id: &NodeId,
        data: &Value,
    ) -> Result<(), PlatformError> {
        let offering =
            self.get_offering(service_id, as_id).ok_or(PlatformError::ServiceNotFound)?;
        let Some(schema) = &offering.data_schema else {
            return Ok(());
        };
        let validator = jsonschema::validator_for(schema)
            .map_err(|err| PlatformError::InvalidServiceSchema(err.to_string()))?;
        if let Err(error) = validator.validate(data) {
            return Err(PlatformError::DataValidationFailed(error.to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
