use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::CardExpiry;

// ============================================================================
// Resource Commands - Represent user intent
// ============================================================================
//
// Updates are explicit variants instead of partial records. There is no
// "clear default" variant: the only way to move the default is to make another
// entry default, so a non-empty collection can never end up without one.
//
// ============================================================================

/// Something that can change a stored resource
pub trait ResourceUpdate {
    /// True when applying this update makes the target the default entry
    fn makes_default(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AddressUpdate {
    Relabel {
        label: String,
    },
    ChangeLocation {
        street: String,
        city: String,
        state: String,
        zip_code: String,
    },
    MakeDefault,
}

impl ResourceUpdate for AddressUpdate {
    fn makes_default(&self) -> bool {
        matches!(self, AddressUpdate::MakeDefault)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PaymentMethodUpdate {
    ChangeExpiry {
        expiry: CardExpiry,
    },
    MakeDefault,
}

impl ResourceUpdate for PaymentMethodUpdate {
    fn makes_default(&self) -> bool {
        matches!(self, PaymentMethodUpdate::MakeDefault)
    }
}

/// Commands accepted by a `ResourceCollection`
///
/// Insert/Update carry the record as the backend persisted it. Remove carries
/// the entry the backend promoted when the default was deleted.
#[derive(Debug, Clone)]
pub enum ResourceCommand<R> {
    ReplaceAll {
        resources: Vec<R>,
    },
    Insert {
        resource: R,
    },
    Update {
        resource: R,
    },
    Remove {
        id: Uuid,
        promoted: Option<Uuid>,
    },
}
