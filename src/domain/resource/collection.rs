use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kernel::Aggregate;
use super::commands::{AddressUpdate, PaymentMethodUpdate, ResourceCommand, ResourceUpdate};
use super::errors::ResourceError;
use super::value_objects::{Address, NewAddress, NewPaymentMethod, PaymentMethod};

// ============================================================================
// Resource Trait - anything a user owns a list of, with one default
// ============================================================================

pub trait Resource:
    Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// User-entered form of the resource, before an id exists
    type Draft: Clone + std::fmt::Debug + Send + Sync + 'static;
    type Update: ResourceUpdate + Clone + std::fmt::Debug + Send + Sync + 'static;

    /// Name used in logs, metrics and error messages
    const KIND: &'static str;

    fn id(&self) -> Uuid;
    fn is_default(&self) -> bool;
    fn set_default(&mut self, is_default: bool);

    fn from_draft(id: Uuid, draft: Self::Draft) -> Self;
    fn draft_is_default(draft: &Self::Draft) -> bool;
    fn mark_draft_default(draft: &mut Self::Draft);

    fn apply_update(&mut self, update: &Self::Update);
}

impl Resource for Address {
    type Draft = NewAddress;
    type Update = AddressUpdate;

    const KIND: &'static str = "address";

    fn id(&self) -> Uuid {
        self.id
    }

    fn is_default(&self) -> bool {
        self.is_default
    }

    fn set_default(&mut self, is_default: bool) {
        self.is_default = is_default;
    }

    fn from_draft(id: Uuid, draft: NewAddress) -> Self {
        Self {
            id,
            label: draft.label,
            street: draft.street,
            city: draft.city,
            state: draft.state,
            zip_code: draft.zip_code,
            is_default: draft.is_default,
        }
    }

    fn draft_is_default(draft: &NewAddress) -> bool {
        draft.is_default
    }

    fn mark_draft_default(draft: &mut NewAddress) {
        draft.is_default = true;
    }

    fn apply_update(&mut self, update: &AddressUpdate) {
        match update {
            AddressUpdate::Relabel { label } => self.label = label.clone(),
            AddressUpdate::ChangeLocation { street, city, state, zip_code } => {
                self.street = street.clone();
                self.city = city.clone();
                self.state = state.clone();
                self.zip_code = zip_code.clone();
            }
            AddressUpdate::MakeDefault => self.is_default = true,
        }
    }
}

impl Resource for PaymentMethod {
    type Draft = NewPaymentMethod;
    type Update = PaymentMethodUpdate;

    const KIND: &'static str = "payment_method";

    fn id(&self) -> Uuid {
        self.id
    }

    fn is_default(&self) -> bool {
        self.is_default
    }

    fn set_default(&mut self, is_default: bool) {
        self.is_default = is_default;
    }

    fn from_draft(id: Uuid, draft: NewPaymentMethod) -> Self {
        Self {
            id,
            kind: draft.kind,
            last_four: draft.last_four,
            card_brand: draft.card_brand,
            expiry: draft.expiry,
            is_default: draft.is_default,
        }
    }

    fn draft_is_default(draft: &NewPaymentMethod) -> bool {
        draft.is_default
    }

    fn mark_draft_default(draft: &mut NewPaymentMethod) {
        draft.is_default = true;
    }

    fn apply_update(&mut self, update: &PaymentMethodUpdate) {
        match update {
            PaymentMethodUpdate::ChangeExpiry { expiry } => self.expiry = Some(*expiry),
            PaymentMethodUpdate::MakeDefault => self.is_default = true,
        }
    }
}

// ============================================================================
// Resource Events
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent<R> {
    Replaced { resources: Vec<R> },
    /// Unset the default flag on every entry except `except`
    DefaultsCleared { except: Option<Uuid> },
    Inserted { resource: R },
    Updated { resource: R },
    Removed { id: Uuid },
    DefaultPromoted { id: Uuid },
}

// ============================================================================
// Resource Collection Aggregate
// ============================================================================
//
// Invariant: at most one entry is default at any time, and a non-empty
// collection has exactly one default after every command.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "R: Resource")]
pub struct ResourceCollection<R> {
    items: Vec<R>,
}

impl<R> Default for ResourceCollection<R> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<R: Resource> ResourceCollection<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[R] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&R> {
        self.items.iter().find(|r| r.id() == id)
    }

    pub fn default_count(&self) -> usize {
        self.items.iter().filter(|r| r.is_default()).count()
    }

    /// Entry flagged default, else the first entry
    ///
    /// The fallback only triggers if the invariant was broken somewhere, so it
    /// is logged.
    pub fn default_entry(&self) -> Option<&R> {
        if let Some(found) = self.items.iter().find(|r| r.is_default()) {
            return Some(found);
        }

        let first = self.items.first();
        if let Some(first) = first {
            tracing::warn!(
                kind = R::KIND,
                fallback_id = %first.id(),
                "No default entry flagged, falling back to first entry"
            );
        }
        first
    }

    fn position(&self, id: Uuid) -> Result<usize, ResourceError> {
        self.items
            .iter()
            .position(|r| r.id() == id)
            .ok_or(ResourceError::NotFound { kind: R::KIND, id })
    }
}

impl<R: Resource> Aggregate for ResourceCollection<R> {
    type Event = ResourceEvent<R>;
    type Command = ResourceCommand<R>;
    type Error = ResourceError;

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            ResourceEvent::Replaced { resources } => {
                self.items = resources.clone();
            }
            ResourceEvent::DefaultsCleared { except } => {
                for item in self.items.iter_mut() {
                    if Some(item.id()) != *except {
                        item.set_default(false);
                    }
                }
            }
            ResourceEvent::Inserted { resource } => {
                self.items.insert(0, resource.clone());
            }
            ResourceEvent::Updated { resource } => {
                let index = self.position(resource.id())?;
                self.items[index] = resource.clone();
            }
            ResourceEvent::Removed { id } => {
                let index = self.position(*id)?;
                self.items.remove(index);
            }
            ResourceEvent::DefaultPromoted { id } => {
                let index = self.position(*id)?;
                self.items[index].set_default(true);
            }
        }
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ResourceCommand::ReplaceAll { resources } => {
                let mut sorted = resources.clone();
                // stable: keeps backend order within each group
                sorted.sort_by_key(|r| !r.is_default());

                let mut events = Vec::new();
                let first = sorted.first().map(|r| (r.id(), r.is_default()));
                let defaults = sorted.iter().filter(|r| r.is_default()).count();
                events.push(ResourceEvent::Replaced { resources: sorted });

                match first {
                    Some((id, false)) => {
                        tracing::warn!(kind = R::KIND, promoted_id = %id, "Fetched collection has no default, promoting first entry");
                        events.push(ResourceEvent::DefaultPromoted { id });
                    }
                    Some((id, true)) if defaults > 1 => {
                        tracing::warn!(kind = R::KIND, kept_id = %id, defaults, "Fetched collection has several defaults, keeping first");
                        events.push(ResourceEvent::DefaultsCleared { except: Some(id) });
                    }
                    _ => {}
                }

                Ok(events)
            }

            ResourceCommand::Insert { resource } => {
                if self.get(resource.id()).is_some() {
                    return Err(ResourceError::AlreadyExists { kind: R::KIND, id: resource.id() });
                }

                let mut resource = resource.clone();
                if self.is_empty() {
                    resource.set_default(true);
                }

                let mut events = Vec::new();
                if resource.is_default() {
                    events.push(ResourceEvent::DefaultsCleared { except: None });
                }
                events.push(ResourceEvent::Inserted { resource });

                Ok(events)
            }

            ResourceCommand::Update { resource } => {
                let index = self.position(resource.id())?;

                let mut resource = resource.clone();
                if self.items[index].is_default() && !resource.is_default() {
                    // updates cannot demote; keep the current default in place
                    resource.set_default(true);
                }

                let mut events = Vec::new();
                if resource.is_default() {
                    events.push(ResourceEvent::DefaultsCleared { except: Some(resource.id()) });
                }
                events.push(ResourceEvent::Updated { resource });

                Ok(events)
            }

            ResourceCommand::Remove { id, promoted } => {
                let index = self.position(*id)?;
                let was_default = self.items[index].is_default();

                let mut events = vec![ResourceEvent::Removed { id: *id }];

                if was_default {
                    let remaining = |candidate: Uuid| candidate != *id && self.get(candidate).is_some();
                    let next = match promoted {
                        Some(promoted) if remaining(*promoted) => Some(*promoted),
                        _ => self.items.iter().map(|r| r.id()).find(|candidate| *candidate != *id),
                    };
                    if let Some(next) = next {
                        events.push(ResourceEvent::DefaultPromoted { id: next });
                    }
                }

                Ok(events)
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
