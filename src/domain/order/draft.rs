use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::NaiveDate;

use crate::domain::resource::{Address, PaymentMethod};
use super::errors::OrderError;
use super::value_objects::{DraftStage, LineItem, MissingSection, Schedule, PRICE_EPSILON};

// ============================================================================
// Order Draft - the in-progress order
// ============================================================================
//
// Fields may be filled in any order and overwritten freely. Completeness is
// only enforced by `validate`, which runs at submission.
//
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    line_items: Vec<LineItem>,
    pickup: Option<Schedule>,
    delivery: Option<Schedule>,
    payment_method: Option<PaymentMethod>,
    special_instructions: String,
}

/// A draft that passed validation; every section is present
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedDraft {
    pub line_items: Vec<LineItem>,
    pub pickup: Schedule,
    pub delivery: Schedule,
    pub payment_method: PaymentMethod,
    pub special_instructions: Option<String>,
    pub total_amount: f64,
}

impl OrderDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    pub fn line_item(&self, service_id: Uuid) -> Option<&LineItem> {
        self.line_items.iter().find(|i| i.service_id == service_id)
    }

    pub fn pickup(&self) -> Option<&Schedule> {
        self.pickup.as_ref()
    }

    pub fn delivery(&self) -> Option<&Schedule> {
        self.delivery.as_ref()
    }

    pub fn payment_method(&self) -> Option<&PaymentMethod> {
        self.payment_method.as_ref()
    }

    pub fn special_instructions(&self) -> &str {
        &self.special_instructions
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Add a service, merging into an existing line for the same service
    pub fn add_line_item(
        &mut self,
        service_id: Uuid,
        service_name: impl Into<String>,
        quantity: i32,
        unit_price: f64,
    ) -> Result<(), OrderError> {
        if quantity <= 0 {
            return Err(OrderError::InvalidQuantity(quantity));
        }
        if !unit_price.is_finite() || unit_price < 0.0 {
            return Err(OrderError::InvalidUnitPrice(unit_price));
        }
        let requested = quantity;
        let quantity = quantity.unsigned_abs();

        match self.line_items.iter_mut().find(|i| i.service_id == service_id) {
            Some(existing) => {
                if (existing.unit_price() - unit_price).abs() > PRICE_EPSILON {
                    return Err(OrderError::UnitPriceMismatch {
                        service_id,
                        stored: existing.unit_price(),
                        requested: unit_price,
                    });
                }
                // merged quantities stay within what an i32 column holds
                let merged = existing
                    .quantity()
                    .checked_add(quantity)
                    .filter(|merged| i32::try_from(*merged).is_ok())
                    .ok_or(OrderError::InvalidQuantity(requested))?;
                existing.set_quantity(merged);
            }
            None => {
                self.line_items.push(LineItem::new(service_id, service_name, quantity, unit_price));
            }
        }

        Ok(())
    }

    /// Change a line's quantity; zero or less removes the line
    pub fn set_line_item_quantity(&mut self, service_id: Uuid, quantity: i32) -> Result<(), OrderError> {
        let index = self
            .line_items
            .iter()
            .position(|i| i.service_id == service_id)
            .ok_or(OrderError::LineItemNotFound(service_id))?;

        if quantity <= 0 {
            self.line_items.remove(index);
        } else {
            self.line_items[index].set_quantity(quantity.unsigned_abs());
        }

        Ok(())
    }

    pub fn remove_line_item(&mut self, service_id: Uuid) {
        self.line_items.retain(|i| i.service_id != service_id);
    }

    pub fn set_pickup(&mut self, address: Address, date: NaiveDate, time_slot: impl Into<String>) {
        self.pickup = Some(Schedule {
            address,
            date,
            time_slot: time_slot.into(),
        });
    }

    pub fn set_delivery(&mut self, address: Address, date: NaiveDate, time_slot: impl Into<String>) {
        self.delivery = Some(Schedule {
            address,
            date,
            time_slot: time_slot.into(),
        });
    }

    pub fn set_payment_method(&mut self, method: PaymentMethod) {
        self.payment_method = Some(method);
    }

    pub fn set_special_instructions(&mut self, text: impl Into<String>) {
        self.special_instructions = text.into();
    }

    pub fn calculate_total(&self) -> f64 {
        self.line_items.iter().map(LineItem::price).sum()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn stage(&self) -> DraftStage {
        if self.line_items.is_empty() {
            DraftStage::Empty
        } else if self.pickup.is_none() {
            DraftStage::ServicesSelected
        } else if self.delivery.is_none() {
            DraftStage::PickupSet
        } else if self.payment_method.is_none() {
            DraftStage::DeliverySet
        } else {
            DraftStage::PaymentSet
        }
    }

    /// Check completeness in the fixed order services → pickup → delivery → payment
    pub fn validate(&self) -> Result<CompletedDraft, OrderError> {
        if self.line_items.is_empty() {
            return Err(OrderError::IncompleteOrder(MissingSection::Services));
        }
        let pickup = self
            .pickup
            .clone()
            .ok_or(OrderError::IncompleteOrder(MissingSection::Pickup))?;
        let delivery = self
            .delivery
            .clone()
            .ok_or(OrderError::IncompleteOrder(MissingSection::Delivery))?;
        let payment_method = self
            .payment_method
            .clone()
            .ok_or(OrderError::IncompleteOrder(MissingSection::Payment))?;

        let special_instructions = match self.special_instructions.trim() {
            "" => None,
            text => Some(text.to_string()),
        };

        Ok(CompletedDraft {
            line_items: self.line_items.clone(),
            pickup,
            delivery,
            payment_method,
            special_instructions,
            total_amount: self.calculate_total(),
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::PaymentMethodKind;
    use proptest::prelude::*;

    fn home() -> Address {
        Address {
            id: Uuid::new_v4(),
            label: "Home".to_string(),
            street: "12 MG Road".to_string(),
            city: "Bengaluru".to_string(),
            state: "KA".to_string(),
            zip_code: "560001".to_string(),
            is_default: true,
        }
    }

    fn card() -> PaymentMethod {
        PaymentMethod {
            id: Uuid::new_v4(),
            kind: PaymentMethodKind::Card,
            last_four: Some("4242".to_string()),
            card_brand: Some("Visa".to_string()),
            expiry: None,
            is_default: true,
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    #[test]
    fn test_scenario_two_services_total() {
        let wash = Uuid::new_v4();
        let dry = Uuid::new_v4();
        let mut draft = OrderDraft::new();

        draft.add_line_item(wash, "Wash & Fold", 3, 50.0).unwrap();
        draft.add_line_item(dry, "Dry Clean", 1, 200.0).unwrap();
        assert_eq!(draft.calculate_total(), 350.0);

        draft.set_line_item_quantity(wash, 5).unwrap();
        assert_eq!(draft.calculate_total(), 450.0);
        assert_eq!(draft.calculate_total(), draft.calculate_total());
    }

    #[test]
    fn test_add_merges_same_service() {
        let wash = Uuid::new_v4();
        let mut draft = OrderDraft::new();

        draft.add_line_item(wash, "Wash & Fold", 2, 50.0).unwrap();
        draft.add_line_item(wash, "Wash & Fold", 3, 50.0).unwrap();

        assert_eq!(draft.line_items().len(), 1);
        let item = draft.line_item(wash).unwrap();
        assert_eq!(item.quantity(), 5);
        assert_eq!(item.price(), 250.0);
    }

    #[test]
    fn test_merge_with_different_unit_price_is_rejected() {
        let wash = Uuid::new_v4();
        let mut draft = OrderDraft::new();
        draft.add_line_item(wash, "Wash & Fold", 2, 50.0).unwrap();

        let result = draft.add_line_item(wash, "Wash & Fold", 1, 80.0);
        assert!(matches!(result, Err(OrderError::UnitPriceMismatch { .. })));
        assert_eq!(draft.line_item(wash).unwrap().quantity(), 2);
    }

    #[test]
    fn test_merge_past_i32_range_is_rejected() {
        let wash = Uuid::new_v4();
        let mut draft = OrderDraft::new();
        draft.add_line_item(wash, "Wash & Fold", i32::MAX, 1.0).unwrap();

        let result = draft.add_line_item(wash, "Wash & Fold", 1, 1.0);
        assert!(matches!(result, Err(OrderError::InvalidQuantity(1))));
        assert_eq!(draft.line_item(wash).unwrap().quantity(), i32::MAX as u32);
    }

    #[test]
    fn test_invalid_quantity_and_price_rejected() {
        let mut draft = OrderDraft::new();
        assert!(matches!(
            draft.add_line_item(Uuid::new_v4(), "Iron", 0, 10.0),
            Err(OrderError::InvalidQuantity(0))
        ));
        assert!(matches!(
            draft.add_line_item(Uuid::new_v4(), "Iron", 1, -1.0),
            Err(OrderError::InvalidUnitPrice(_))
        ));
        assert!(draft.line_items().is_empty());
    }

    #[test]
    fn test_zero_quantity_removes_line() {
        let wash = Uuid::new_v4();
        let mut draft = OrderDraft::new();
        draft.add_line_item(wash, "Wash & Fold", 2, 50.0).unwrap();

        draft.set_line_item_quantity(wash, 0).unwrap();
        assert!(draft.line_items().is_empty());
        assert!(matches!(
            draft.set_line_item_quantity(wash, 1),
            Err(OrderError::LineItemNotFound(_))
        ));
    }

    #[test]
    fn test_remove_is_unconditional() {
        let mut draft = OrderDraft::new();
        draft.remove_line_item(Uuid::new_v4());
        draft.add_line_item(Uuid::new_v4(), "Iron", 1, 30.0).unwrap();
        let id = draft.line_items()[0].service_id;
        draft.remove_line_item(id);
        assert_eq!(draft.calculate_total(), 0.0);
    }

    #[test]
    fn test_validate_names_first_missing_section() {
        let mut draft = OrderDraft::new();
        // jump ahead: payment before anything else
        draft.set_payment_method(card());
        assert!(matches!(
            draft.validate(),
            Err(OrderError::IncompleteOrder(MissingSection::Services))
        ));

        draft.add_line_item(Uuid::new_v4(), "Iron", 1, 30.0).unwrap();
        assert!(matches!(
            draft.validate(),
            Err(OrderError::IncompleteOrder(MissingSection::Pickup))
        ));

        draft.set_pickup(home(), date(20), "09:00 - 11:00");
        assert!(matches!(
            draft.validate(),
            Err(OrderError::IncompleteOrder(MissingSection::Delivery))
        ));

        draft.set_delivery(home(), date(22), "17:00 - 19:00");
        let completed = draft.validate().unwrap();
        assert_eq!(completed.total_amount, 30.0);
        assert_eq!(completed.special_instructions, None);
    }

    #[test]
    fn test_validate_missing_payment() {
        let mut draft = OrderDraft::new();
        draft.add_line_item(Uuid::new_v4(), "Iron", 1, 30.0).unwrap();
        draft.set_pickup(home(), date(20), "09:00 - 11:00");
        draft.set_delivery(home(), date(22), "17:00 - 19:00");
        draft.set_special_instructions("  ring twice ");

        assert_eq!(draft.stage(), DraftStage::DeliverySet);
        assert!(matches!(
            draft.validate(),
            Err(OrderError::IncompleteOrder(MissingSection::Payment))
        ));

        draft.set_payment_method(card());
        assert_eq!(draft.stage(), DraftStage::PaymentSet);
        assert_eq!(draft.validate().unwrap().special_instructions.as_deref(), Some("ring twice"));
    }

    #[test]
    fn test_pickup_overwrites_wholesale() {
        let mut draft = OrderDraft::new();
        draft.set_pickup(home(), date(20), "09:00 - 11:00");
        draft.set_pickup(home(), date(21), "13:00 - 15:00");

        let pickup = draft.pickup().unwrap();
        assert_eq!(pickup.date, date(21));
        assert_eq!(pickup.time_slot, "13:00 - 15:00");
    }

    #[test]
    fn test_reset_returns_to_empty() {
        let mut draft = OrderDraft::new();
        draft.add_line_item(Uuid::new_v4(), "Iron", 1, 30.0).unwrap();
        draft.set_special_instructions("gentle");
        draft.reset();

        assert!(draft.is_empty());
        assert_eq!(draft.stage(), DraftStage::Empty);
    }

    proptest! {
        #[test]
        fn prop_unit_price_survives_quantity_edits(
            unit_price in 0.5f64..500.0,
            start in 1i32..20,
            edits in proptest::collection::vec(1i32..50, 1..20),
        ) {
            let id = Uuid::new_v4();
            let mut draft = OrderDraft::new();
            draft.add_line_item(id, "Wash & Fold", start, unit_price).unwrap();

            for quantity in edits {
                let before = draft.line_item(id).unwrap().clone();
                draft.set_line_item_quantity(id, quantity).unwrap();
                let after = draft.line_item(id).unwrap();

                let expected = f64::from(quantity) * (before.price() / f64::from(before.quantity()));
                prop_assert!((after.price() - expected).abs() < 1e-6);
                prop_assert!((draft.calculate_total() - after.price()).abs() < 1e-9);
            }
        }
    }
}
