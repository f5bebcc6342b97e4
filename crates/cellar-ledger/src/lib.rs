#![deny(warnings)]

//! Batch lifecycle and volume ledger.
//!
//! Applies measured cellar operations to batches, keeps a per-batch record of
//! losses, and reconciles volumes for excise reporting in US gallons.

use cellar_core::units::{convert, to_gallons, to_liters, Unit, UnitError};
use cellar_core::{
    validate_batch, validate_volume_event, AccessContext, AccessError, Batch, BatchId,
    BatchStatus, ValidationError, VolumeEvent, VolumeEventKind,
};
use cellar_loss::{
    calculate_keg_fill, calculate_loss, KegFillInput, LossError, LossInput, LossPolicy, LossTier,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

/// Relative difference allowed between a batch's recorded volume and the
/// before-volume measured for an operation.
pub const VOLUME_MATCH_TOLERANCE: f64 = 0.005;

/// Errors produced while mutating batches or reconciling volumes.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Loss(#[from] LossError),
    #[error(transparent)]
    Conversion(#[from] UnitError),
    /// Batch was soft-deleted.
    #[error("batch {0} is deleted")]
    Deleted(String),
    /// Status may only move forward.
    #[error("cannot move batch from {from:?} to {to:?}")]
    InvalidTransition { from: BatchStatus, to: BatchStatus },
    /// Measured before-volume disagrees with the batch record.
    #[error("batch holds {batch_liters} L but operation measured {measured_liters} L")]
    VolumeMismatch {
        batch_liters: f64,
        measured_liters: f64,
    },
    /// Keg fill drew more than the batch holds.
    #[error("cannot draw {taken_liters} L from a batch holding {batch_liters} L")]
    Overdraw {
        batch_liters: f64,
        taken_liters: f64,
    },
}

fn ensure_live(batch: &Batch) -> Result<(), LedgerError> {
    if batch.deleted {
        return Err(LedgerError::Deleted(batch.id.0.clone()));
    }
    Ok(())
}

/// Move a batch forward through fermenting, aging, ready and packaged.
///
/// Stages may be skipped (a batch can go straight from fermenting to ready)
/// but never revisited.
pub fn transition_status(
    batch: &mut Batch,
    to: BatchStatus,
    ctx: &AccessContext,
) -> Result<(), LedgerError> {
    ctx.require_operator("change batch status")?;
    ensure_live(batch)?;
    if to <= batch.status {
        return Err(LedgerError::InvalidTransition {
            from: batch.status,
            to,
        });
    }
    info!(batch = %batch.id.0, from = ?batch.status, ?to, user = %ctx.user, "status changed");
    batch.status = to;
    Ok(())
}

/// Mark a batch deleted. Admin only; deleting twice is a no-op.
pub fn soft_delete(batch: &mut Batch, ctx: &AccessContext) -> Result<(), LedgerError> {
    ctx.require_admin("delete batch")?;
    if !batch.deleted {
        info!(batch = %batch.id.0, user = %ctx.user, "batch soft-deleted");
        batch.deleted = true;
    }
    Ok(())
}

/// Outcome of applying a volume event to a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppliedEvent {
    pub batch_id: BatchId,
    pub kind: VolumeEventKind,
    pub recorded_at: NaiveDateTime,
    pub loss_liters: f64,
    pub loss_percent: f64,
    /// Transfer/filter loss exceeded the warning threshold.
    pub warning: bool,
    /// Set for keg fills only.
    pub keg_tier: Option<LossTier>,
    /// Batch volume after the event, in liters.
    pub batch_liters: f64,
}

/// Apply a measured transfer, filtration or keg fill to a batch.
///
/// Transfers and filters set the batch volume to the after-volume. Keg fills
/// reduce the batch by the volume taken. On error the batch is unchanged.
pub fn apply_event(
    batch: &mut Batch,
    event: &VolumeEvent,
    policy: &LossPolicy,
    ctx: &AccessContext,
) -> Result<AppliedEvent, LedgerError> {
    ctx.require_operator("record volume event")?;
    ensure_live(batch)?;
    validate_batch(batch)?;
    validate_volume_event(event)?;

    let batch_liters = to_liters(batch.current_volume, batch.current_volume_unit)?;
    let before_liters = to_liters(event.volume_before, event.volume_before_unit)?;

    let (loss_liters, loss_percent, warning, keg_tier, remaining) = match event.kind {
        VolumeEventKind::Transfer | VolumeEventKind::Filter => {
            if (before_liters - batch_liters).abs() > batch_liters * VOLUME_MATCH_TOLERANCE {
                warn!(batch = %batch.id.0, batch_liters, before_liters, "volume mismatch");
                return Err(LedgerError::VolumeMismatch {
                    batch_liters,
                    measured_liters: before_liters,
                });
            }
            let r = calculate_loss(
                &LossInput {
                    volume_before: event.volume_before,
                    volume_before_unit: event.volume_before_unit,
                    volume_after: event.volume_after,
                    volume_after_unit: event.volume_after_unit,
                },
                policy,
            )?;
            (r.loss_liters, r.loss_percent, r.warning, None, r.after_liters)
        }
        VolumeEventKind::KegFill => {
            if before_liters - batch_liters > batch_liters * VOLUME_MATCH_TOLERANCE {
                return Err(LedgerError::Overdraw {
                    batch_liters,
                    taken_liters: before_liters,
                });
            }
            let r = calculate_keg_fill(
                &KegFillInput {
                    volume_taken: event.volume_before,
                    volume_taken_unit: event.volume_before_unit,
                    keg_volume: event.volume_after,
                    keg_volume_unit: event.volume_after_unit,
                },
                policy,
            )?;
            let left = (batch_liters - r.taken_liters).max(0.0);
            (r.loss_liters, r.loss_percent, false, Some(r.tier), left)
        }
    };

    batch.current_volume = convert(remaining, Unit::Liter, batch.current_volume_unit)?;
    info!(
        batch = %batch.id.0,
        kind = ?event.kind,
        loss_liters,
        remaining_liters = remaining,
        user = %ctx.user,
        "volume event applied"
    );
    Ok(AppliedEvent {
        batch_id: batch.id.clone(),
        kind: event.kind,
        recorded_at: event.recorded_at,
        loss_liters,
        loss_percent,
        warning,
        keg_tier,
        batch_liters: remaining,
    })
}

/// One recorded loss.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LossEntry {
    pub kind: VolumeEventKind,
    pub recorded_at: NaiveDateTime,
    pub loss_liters: f64,
}

/// Losses recorded per batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LossLedger {
    entries: BTreeMap<BatchId, Vec<LossEntry>>,
}

impl LossLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, applied: &AppliedEvent) {
        self.entries
            .entry(applied.batch_id.clone())
            .or_default()
            .push(LossEntry {
                kind: applied.kind,
                recorded_at: applied.recorded_at,
                loss_liters: applied.loss_liters,
            });
    }

    pub fn entries(&self, batch: &BatchId) -> &[LossEntry] {
        self.entries.get(batch).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_loss_liters(&self, batch: &BatchId) -> f64 {
        self.entries(batch).iter().map(|e| e.loss_liters).sum()
    }

    /// Total loss for a batch in the given volume unit.
    pub fn total_loss_in(&self, batch: &BatchId, unit: Unit) -> Result<f64, UnitError> {
        convert(self.total_loss_liters(batch), Unit::Liter, unit)
    }

    /// Loss per operation kind, in liters.
    pub fn loss_by_kind(&self, batch: &BatchId) -> BTreeMap<VolumeEventKind, f64> {
        let mut out = BTreeMap::new();
        for e in self.entries(batch) {
            *out.entry(e.kind).or_insert(0.0) += e.loss_liters;
        }
        out
    }
}

/// Tolerances for volume reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationPolicy {
    /// Largest absolute discrepancy still considered balanced.
    pub tolerance_gallons: f64,
}

impl Default for ReconciliationPolicy {
    fn default() -> Self {
        Self {
            tolerance_gallons: 0.5,
        }
    }
}

/// Volumes moved during a reporting period, all in US gallons.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationInput {
    pub opening_gallons: f64,
    #[serde(default)]
    pub produced_gallons: f64,
    #[serde(default)]
    pub removed_gallons: f64,
    #[serde(default)]
    pub losses_gallons: f64,
    pub recorded_closing_gallons: f64,
}

/// Expected against recorded closing volume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub expected_closing_gallons: f64,
    pub recorded_closing_gallons: f64,
    /// Recorded minus expected; positive means more on hand than accounted for.
    pub discrepancy_gallons: f64,
    pub balanced: bool,
}

fn gallons(value: f64, field: &'static str) -> Result<f64, LedgerError> {
    cellar_core::validate_quantity(value, field)?;
    Ok(value)
}

/// Reconcile a period: opening + produced - removed - losses should equal the
/// recorded closing volume within tolerance.
pub fn reconcile(
    input: &ReconciliationInput,
    policy: &ReconciliationPolicy,
) -> Result<ReconciliationReport, LedgerError> {
    let opening = gallons(input.opening_gallons, "opening_gallons")?;
    let produced = gallons(input.produced_gallons, "produced_gallons")?;
    let removed = gallons(input.removed_gallons, "removed_gallons")?;
    let losses = gallons(input.losses_gallons, "losses_gallons")?;
    let recorded = gallons(input.recorded_closing_gallons, "recorded_closing_gallons")?;

    let expected = opening + produced - removed - losses;
    let discrepancy = recorded - expected;
    let balanced = discrepancy.abs() <= policy.tolerance_gallons;
    if !balanced {
        warn!(expected, recorded, discrepancy, "volume reconciliation out of balance");
    }
    Ok(ReconciliationReport {
        expected_closing_gallons: expected,
        recorded_closing_gallons: recorded,
        discrepancy_gallons: discrepancy,
        balanced,
    })
}

/// Build a reconciliation input for one batch from its ledger.
///
/// `opening` and `removed` are volumes in `unit`; the batch's current volume
/// is taken as the recorded closing.
pub fn batch_reconciliation_input(
    batch: &Batch,
    ledger: &LossLedger,
    opening: f64,
    removed: f64,
    unit: Unit,
) -> Result<ReconciliationInput, LedgerError> {
    Ok(ReconciliationInput {
        opening_gallons: to_gallons(opening, unit)?,
        produced_gallons: 0.0,
        removed_gallons: to_gallons(removed, unit)?,
        losses_gallons: ledger.total_loss_in(&batch.id, Unit::Gallon)?,
        recorded_closing_gallons: to_gallons(batch.current_volume, batch.current_volume_unit)?,
    })
}
