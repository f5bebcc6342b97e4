#![deny(warnings)]

//! Volume loss accounting for cellar operations.
//!
//! This module provides validated calculators for:
//! - Loss across a transfer (racking) or filtration, with a warning threshold
//! - Loss while filling kegs, bucketed into display tiers

use cellar_core::units::{convert, to_liters, Dimension, Unit, UnitError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors produced by the loss calculators.
#[derive(Debug, Error, PartialEq)]
pub enum LossError {
    /// Volume was NaN or infinite.
    #[error("non-finite volume in {0}")]
    NonFinite(&'static str),
    /// Volumes must be non-negative.
    #[error("negative volume in {0}")]
    NegativeVolume(&'static str),
    /// Starting volume must be strictly positive.
    #[error("{0} must be greater than zero")]
    NothingMeasured(&'static str),
    /// After-volume is not below before-volume, so there is no loss to record.
    #[error("volume after ({after_liters} L) must be less than volume before ({before_liters} L)")]
    NoLoss { before_liters: f64, after_liters: f64 },
    /// Keg holds more than was drawn from the batch.
    #[error("keg volume ({keg_liters} L) exceeds volume taken ({taken_liters} L)")]
    KegOverfill { taken_liters: f64, keg_liters: f64 },
    /// A mass unit was supplied where a volume unit is required.
    #[error("{0} is not a volume unit")]
    NotAVolume(Unit),
    #[error(transparent)]
    Conversion(#[from] UnitError),
}

/// Thresholds applied to computed losses. Defaults match the cellar's usual
/// tolerances; none of them block an operation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LossPolicy {
    /// Transfer/filter loss above this percentage raises a warning.
    pub loss_warning_percent: f64,
    /// Keg-fill loss at or below this percentage is "good".
    pub keg_good_max_percent: f64,
    /// Keg-fill loss at or below this percentage is "caution"; above is "high".
    pub keg_caution_max_percent: f64,
}

impl Default for LossPolicy {
    fn default() -> Self {
        Self {
            loss_warning_percent: 10.0,
            keg_good_max_percent: 2.0,
            keg_caution_max_percent: 5.0,
        }
    }
}

/// Before/after measurements around a transfer or filtration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LossInput {
    pub volume_before: f64,
    pub volume_before_unit: Unit,
    pub volume_after: f64,
    pub volume_after_unit: Unit,
}

/// Computed loss, all volumes in liters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LossResult {
    pub before_liters: f64,
    pub after_liters: f64,
    pub loss_liters: f64,
    /// Loss as a percentage of the before-volume, in (0, 100].
    pub loss_percent: f64,
    /// Loss exceeded the policy's warning threshold.
    pub warning: bool,
}

impl LossResult {
    /// Loss expressed in another volume unit.
    pub fn loss_in(&self, unit: Unit) -> Result<f64, UnitError> {
        convert(self.loss_liters, Unit::Liter, unit)
    }
}

/// Display tier for keg-fill losses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossTier {
    Good,
    Caution,
    High,
}

/// Volume drawn from the batch against what actually went into kegs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KegFillInput {
    pub volume_taken: f64,
    pub volume_taken_unit: Unit,
    pub keg_volume: f64,
    pub keg_volume_unit: Unit,
}

/// Computed keg-fill loss, all volumes in liters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KegFillResult {
    pub taken_liters: f64,
    pub keg_liters: f64,
    pub loss_liters: f64,
    pub loss_percent: f64,
    pub tier: LossTier,
}

fn liters(value: f64, unit: Unit, field: &'static str) -> Result<f64, LossError> {
    if !value.is_finite() {
        return Err(LossError::NonFinite(field));
    }
    if value < 0.0 {
        return Err(LossError::NegativeVolume(field));
    }
    if unit.dimension() != Dimension::Volume {
        return Err(LossError::NotAVolume(unit));
    }
    Ok(to_liters(value, unit)?)
}

/// Loss across a transfer or filtration.
///
/// Both volumes are converted to liters first. After-volume must be strictly
/// below before-volume; an unchanged or increased volume is rejected rather
/// than reported as a zero or negative loss.
///
/// Example:
/// let r = calculate_loss(&LossInput { volume_before: 100.0, volume_before_unit: Unit::Liter,
///     volume_after: 92.0, volume_after_unit: Unit::Liter }, &LossPolicy::default()).unwrap();
/// assert_eq!(r.loss_liters, 8.0);
pub fn calculate_loss(input: &LossInput, policy: &LossPolicy) -> Result<LossResult, LossError> {
    let before = liters(input.volume_before, input.volume_before_unit, "volume_before")?;
    let after = liters(input.volume_after, input.volume_after_unit, "volume_after")?;
    if before <= 0.0 {
        return Err(LossError::NothingMeasured("volume_before"));
    }
    if after >= before {
        return Err(LossError::NoLoss {
            before_liters: before,
            after_liters: after,
        });
    }
    let loss = before - after;
    let loss_percent = loss * 100.0 / before;
    let warning = loss_percent > policy.loss_warning_percent;
    if warning {
        warn!(
            loss_liters = loss,
            loss_percent,
            threshold = policy.loss_warning_percent,
            "loss above warning threshold"
        );
    } else {
        debug!(loss_liters = loss, loss_percent, "loss computed");
    }
    Ok(LossResult {
        before_liters: before,
        after_liters: after,
        loss_liters: loss,
        loss_percent,
        warning,
    })
}

/// Bucket a keg-fill loss percentage into a display tier.
pub fn classify_keg_loss(loss_percent: f64, policy: &LossPolicy) -> LossTier {
    if loss_percent <= policy.keg_good_max_percent {
        LossTier::Good
    } else if loss_percent <= policy.keg_caution_max_percent {
        LossTier::Caution
    } else {
        LossTier::High
    }
}

/// Loss while filling kegs from a batch.
///
/// A perfect fill (keg volume equal to volume taken) is a zero loss. A keg
/// holding more than was taken is rejected.
pub fn calculate_keg_fill(
    input: &KegFillInput,
    policy: &LossPolicy,
) -> Result<KegFillResult, LossError> {
    let taken = liters(input.volume_taken, input.volume_taken_unit, "volume_taken")?;
    let keg = liters(input.keg_volume, input.keg_volume_unit, "keg_volume")?;
    if taken <= 0.0 {
        return Err(LossError::NothingMeasured("volume_taken"));
    }
    if keg > taken {
        return Err(LossError::KegOverfill {
            taken_liters: taken,
            keg_liters: keg,
        });
    }
    let loss = taken - keg;
    let loss_percent = loss * 100.0 / taken;
    let tier = classify_keg_loss(loss_percent, policy);
    debug!(loss_liters = loss, loss_percent, ?tier, "keg fill computed");
    Ok(KegFillResult {
        taken_liters: taken,
        keg_liters: keg,
        loss_liters: loss,
        loss_percent,
        tier,
    })
}
