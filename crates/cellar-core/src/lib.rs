#![deny(warnings)]

//! Core domain records and invariants for cellar accounting.
//!
//! This crate defines the serializable records exchanged with the web tier
//! (batches, volume events, cost sheets), unit conversion, and the explicit
//! access context that mutating operations take.

pub mod units;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use units::{convert, to_gallons, to_kilograms, to_liters, Dimension, Unit, UnitError};

/// Unique identifier for a batch, e.g. "2024-KINGSTON-01".
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub String);

/// Lifecycle stage of a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Fermenting,
    Aging,
    Ready,
    Packaged,
}

/// A batch of juice/cider tracked through the cellar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    /// Display name.
    pub name: String,
    pub status: BatchStatus,
    /// Volume currently in the vessel.
    pub current_volume: f64,
    pub current_volume_unit: Unit,
    /// Tank or barrel holding the batch, if any.
    #[serde(default)]
    pub vessel_id: Option<String>,
    /// Soft-delete marker set by an admin.
    #[serde(default)]
    pub deleted: bool,
}

/// Kind of operation that moved liquid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeEventKind {
    Transfer,
    Filter,
    KegFill,
}

/// A before/after volume measurement around a cellar operation.
///
/// For transfers and filters the after-volume is what remains in the batch.
/// For keg fills the before-volume is what was drawn from the batch and the
/// after-volume is what ended up in kegs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolumeEvent {
    pub kind: VolumeEventKind,
    pub volume_before: f64,
    pub volume_before_unit: Unit,
    pub volume_after: f64,
    pub volume_after_unit: Unit,
    pub recorded_at: NaiveDateTime,
}

/// Fruit purchase priced per unit of weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppleCost {
    pub variety: String,
    pub weight: f64,
    pub weight_unit: Unit,
    /// Price per `weight_unit`.
    pub cost_per_unit: Decimal,
}

/// Additive used in the batch (yeast, nutrient, sulfite ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdditiveCost {
    pub name: String,
    pub amount: Decimal,
    /// Free-form unit label (g, mL, tablet).
    pub unit: String,
    pub cost_per_unit: Decimal,
}

/// Packaging material consumed (bottles, caps, labels, cases).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackagingCost {
    pub item_type: String,
    pub quantity: u64,
    pub price_per_unit: Decimal,
}

/// Everything that contributes to the cost of a packaged run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostInputs {
    #[serde(default)]
    pub apples: Vec<AppleCost>,
    #[serde(default)]
    pub additives: Vec<AdditiveCost>,
    #[serde(default)]
    pub packaging: Vec<PackagingCost>,
    #[serde(default)]
    pub labor_cost: Decimal,
    #[serde(default)]
    pub overhead_cost: Decimal,
    /// Bottles (or cans/kegs) produced by the run.
    pub units_produced: u64,
    /// Finished volume of the run in liters.
    pub volume_liters: f64,
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Numeric field must be finite.
    #[error("non-finite numeric value in {0}")]
    NonFinite(&'static str),
    /// Volumes and weights must be non-negative.
    #[error("negative quantity in {0}")]
    NegativeQuantity(&'static str),
    /// Price or cost must be non-negative.
    #[error("negative monetary value in {0}")]
    NegativeMoney(&'static str),
    /// Name-like field is blank.
    #[error("{0} must not be empty")]
    Empty(&'static str),
    /// A unit of the wrong dimension was supplied.
    #[error("{field} expects a {expected:?} unit, got {got}")]
    WrongDimension {
        field: &'static str,
        expected: Dimension,
        got: Unit,
    },
}

/// Validate a non-negative finite quantity.
pub fn validate_quantity(value: f64, field: &'static str) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite(field));
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeQuantity(field));
    }
    Ok(())
}

/// Validate a non-negative monetary value.
pub fn validate_money(value: Decimal, field: &'static str) -> Result<(), ValidationError> {
    if value < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney(field));
    }
    Ok(())
}

/// Validate that `unit` measures the expected dimension.
pub fn validate_dimension(
    unit: Unit,
    expected: Dimension,
    field: &'static str,
) -> Result<(), ValidationError> {
    if unit.dimension() != expected {
        return Err(ValidationError::WrongDimension {
            field,
            expected,
            got: unit,
        });
    }
    Ok(())
}

/// Validate a batch record.
pub fn validate_batch(b: &Batch) -> Result<(), ValidationError> {
    if b.id.0.trim().is_empty() {
        return Err(ValidationError::Empty("batch id"));
    }
    if b.name.trim().is_empty() {
        return Err(ValidationError::Empty("batch name"));
    }
    validate_quantity(b.current_volume, "current_volume")?;
    validate_dimension(b.current_volume_unit, Dimension::Volume, "current_volume_unit")
}

/// Validate a volume event's measurements (ordering is checked by the loss calculators).
pub fn validate_volume_event(e: &VolumeEvent) -> Result<(), ValidationError> {
    validate_quantity(e.volume_before, "volume_before")?;
    validate_quantity(e.volume_after, "volume_after")?;
    validate_dimension(e.volume_before_unit, Dimension::Volume, "volume_before_unit")?;
    validate_dimension(e.volume_after_unit, Dimension::Volume, "volume_after_unit")
}

/// Validate every line of a cost sheet.
pub fn validate_cost_inputs(c: &CostInputs) -> Result<(), ValidationError> {
    for a in &c.apples {
        if a.variety.trim().is_empty() {
            return Err(ValidationError::Empty("apple variety"));
        }
        validate_quantity(a.weight, "apple weight")?;
        validate_dimension(a.weight_unit, Dimension::Mass, "apple weight_unit")?;
        validate_money(a.cost_per_unit, "apple cost_per_unit")?;
    }
    for a in &c.additives {
        if a.name.trim().is_empty() {
            return Err(ValidationError::Empty("additive name"));
        }
        if a.amount < Decimal::ZERO {
            return Err(ValidationError::NegativeQuantity("additive amount"));
        }
        validate_money(a.cost_per_unit, "additive cost_per_unit")?;
    }
    for p in &c.packaging {
        if p.item_type.trim().is_empty() {
            return Err(ValidationError::Empty("packaging item_type"));
        }
        validate_money(p.price_per_unit, "packaging price_per_unit")?;
    }
    validate_money(c.labor_cost, "labor_cost")?;
    validate_money(c.overhead_cost, "overhead_cost")?;
    validate_quantity(c.volume_liters, "volume_liters")
}

/// Role of the user performing an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Operator,
    Viewer,
}

/// Who is asking. Passed explicitly to every mutating operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessContext {
    pub user: String,
    pub role: Role,
}

/// Rejected by role gating.
#[derive(Debug, Error, PartialEq)]
#[error("{user} ({role:?}) may not {action}")]
pub struct AccessError {
    pub user: String,
    pub role: Role,
    pub action: &'static str,
}

impl AccessContext {
    pub fn new(user: impl Into<String>, role: Role) -> Self {
        Self {
            user: user.into(),
            role,
        }
    }

    fn deny(&self, action: &'static str) -> AccessError {
        AccessError {
            user: self.user.clone(),
            role: self.role,
            action,
        }
    }

    /// Operators and admins may record cellar operations.
    pub fn require_operator(&self, action: &'static str) -> Result<(), AccessError> {
        match self.role {
            Role::Admin | Role::Operator => Ok(()),
            Role::Viewer => Err(self.deny(action)),
        }
    }

    /// Only admins may perform destructive actions.
    pub fn require_admin(&self, action: &'static str) -> Result<(), AccessError> {
        match self.role {
            Role::Admin => Ok(()),
            _ => Err(self.deny(action)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn batch() -> Batch {
        Batch {
            id: BatchId("B-01".to_string()),
            name: "Kingston Black".to_string(),
            status: BatchStatus::Fermenting,
            current_volume: 100.0,
            current_volume_unit: Unit::Gallon,
            vessel_id: Some("T1".to_string()),
            deleted: false,
        }
    }

    fn sheet() -> CostInputs {
        CostInputs {
            apples: vec![AppleCost {
                variety: "Dabinett".to_string(),
                weight: 500.0,
                weight_unit: Unit::Kilogram,
                cost_per_unit: Decimal::new(60, 2),
            }],
            additives: vec![AdditiveCost {
                name: "yeast".to_string(),
                amount: Decimal::new(5, 0),
                unit: "g".to_string(),
                cost_per_unit: Decimal::new(10, 2),
            }],
            packaging: vec![PackagingCost {
                item_type: "bottle".to_string(),
                quantity: 200,
                price_per_unit: Decimal::new(45, 2),
            }],
            labor_cost: Decimal::new(100, 0),
            overhead_cost: Decimal::new(25, 0),
            units_produced: 200,
            volume_liters: 150.0,
        }
    }

    #[test]
    fn batch_serde_roundtrip() {
        let b = batch();
        let s = serde_json::to_string(&b).unwrap();
        assert!(s.contains("\"status\":\"fermenting\""));
        assert!(s.contains("\"current_volume_unit\":\"gal\""));
        let back: Batch = serde_json::from_str(&s).unwrap();
        assert_eq!(back, b);
        validate_batch(&back).unwrap();
    }

    #[test]
    fn batch_defaults_optional_fields() {
        let s = r#"{"id":"B","name":"n","status":"aging","current_volume":1.0,"current_volume_unit":"L"}"#;
        let b: Batch = serde_json::from_str(s).unwrap();
        assert_eq!(b.vessel_id, None);
        assert!(!b.deleted);
    }

    #[test]
    fn batch_with_mass_unit_is_invalid() {
        let mut b = batch();
        b.current_volume_unit = Unit::Pound;
        assert!(matches!(
            validate_batch(&b),
            Err(ValidationError::WrongDimension { .. })
        ));
    }

    #[test]
    fn volume_event_roundtrip() {
        let e = VolumeEvent {
            kind: VolumeEventKind::KegFill,
            volume_before: 20.0,
            volume_before_unit: Unit::Liter,
            volume_after: 19.5,
            volume_after_unit: Unit::Liter,
            recorded_at: NaiveDate::from_ymd_opt(2024, 10, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        };
        let s = serde_json::to_string(&e).unwrap();
        assert!(s.contains("\"kind\":\"keg_fill\""));
        let back: VolumeEvent = serde_json::from_str(&s).unwrap();
        assert_eq!(back, e);
        validate_volume_event(&back).unwrap();
    }

    #[test]
    fn cost_sheet_validation() {
        validate_cost_inputs(&sheet()).unwrap();

        let mut bad = sheet();
        bad.labor_cost = Decimal::new(-1, 0);
        assert_eq!(
            validate_cost_inputs(&bad),
            Err(ValidationError::NegativeMoney("labor_cost"))
        );

        let mut bad = sheet();
        bad.apples[0].weight_unit = Unit::Liter;
        assert!(validate_cost_inputs(&bad).is_err());

        let mut bad = sheet();
        bad.volume_liters = f64::NAN;
        assert_eq!(
            validate_cost_inputs(&bad),
            Err(ValidationError::NonFinite("volume_liters"))
        );
    }

    #[test]
    fn role_gating() {
        let admin = AccessContext::new("ana", Role::Admin);
        let op = AccessContext::new("omar", Role::Operator);
        let viewer = AccessContext::new("vic", Role::Viewer);
        assert!(admin.require_admin("delete batch").is_ok());
        assert!(op.require_operator("record transfer").is_ok());
        assert!(op.require_admin("delete batch").is_err());
        let err = viewer.require_operator("record transfer").unwrap_err();
        assert_eq!(err.to_string(), "vic (Viewer) may not record transfer");
    }

    proptest! {
        #[test]
        fn non_negative_quantities_pass(v in 0.0f64..1e9) {
            prop_assert!(validate_quantity(v, "v").is_ok());
        }

        #[test]
        fn negative_quantities_fail(v in -1e9f64..-1e-9) {
            prop_assert_eq!(validate_quantity(v, "v"), Err(ValidationError::NegativeQuantity("v")));
        }
    }
}
