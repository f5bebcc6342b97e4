#![deny(warnings)]

//! Cost and margin models for packaged runs.
//!
//! This module provides validated utilities for:
//! - Cost of goods sold (COGS) aggregation by category with per-unit costs
//! - Gross margin and markup against a retail price
//! - Valuation of remaining inventory and average selling price (ASP)

use cellar_core::{validate_cost_inputs, AppleCost, CostInputs, ValidationError};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Errors produced by economic helpers.
#[derive(Debug, Error, PartialEq)]
pub enum EconError {
    /// Cost sheet failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// Monetary values must be non-negative.
    #[error("negative monetary value in {0}")]
    NegativeMoney(&'static str),
    /// Numeric conversion to decimal failed.
    #[error("non-finite numeric conversion in {0}")]
    NonFinite(&'static str),
    /// Margin requested without a retail price.
    #[error("no pricing data")]
    NoPricingData,
    /// Remaining stock exceeds what was produced.
    #[error("remaining units ({remaining}) exceed units produced ({produced})")]
    InventoryMismatch { produced: u64, remaining: u64 },
    /// Result does not fit in a decimal.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
}

/// Cost category on a cost sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostCategory {
    Apples,
    Additives,
    Packaging,
    Labor,
    Overhead,
}

/// One category's contribution to total cost.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: CostCategory,
    pub amount: Decimal,
    /// Share of total COGS in percent; `None` when total cost is zero.
    pub percent_of_total: Option<Decimal>,
}

/// Aggregated cost of a packaged run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CogsResult {
    pub apples: Decimal,
    pub additives: Decimal,
    pub packaging: Decimal,
    pub labor: Decimal,
    pub overhead: Decimal,
    pub total_cogs: Decimal,
    pub breakdown: Vec<CategoryShare>,
    /// `None` when no units were produced.
    pub cost_per_bottle: Option<Decimal>,
    /// `None` when the finished volume is zero.
    pub cost_per_liter: Option<Decimal>,
}

fn dec(value: f64, field: &'static str) -> Result<Decimal, EconError> {
    Decimal::from_f64(value).ok_or(EconError::NonFinite(field))
}

fn mul(a: Decimal, b: Decimal, field: &'static str) -> Result<Decimal, EconError> {
    a.checked_mul(b).ok_or(EconError::Overflow(field))
}

fn add(a: Decimal, b: Decimal, field: &'static str) -> Result<Decimal, EconError> {
    a.checked_add(b).ok_or(EconError::Overflow(field))
}

/// `part / whole * 100`, or `None` when `whole` is zero.
fn percent(
    part: Decimal,
    whole: Decimal,
    field: &'static str,
) -> Result<Option<Decimal>, EconError> {
    if whole.is_zero() {
        return Ok(None);
    }
    let ratio = part.checked_div(whole).ok_or(EconError::Overflow(field))?;
    mul(ratio, Decimal::ONE_HUNDRED, field).map(Some)
}

fn apple_line(a: &AppleCost) -> Result<Decimal, EconError> {
    mul(dec(a.weight, "apple weight")?, a.cost_per_unit, "apple cost")
}

/// Apple spend grouped by variety name.
pub fn apple_cost_by_variety(inputs: &CostInputs) -> Result<BTreeMap<String, Decimal>, EconError> {
    validate_cost_inputs(inputs)?;
    let mut out: BTreeMap<String, Decimal> = BTreeMap::new();
    for a in &inputs.apples {
        let line = apple_line(a)?;
        let slot = out.entry(a.variety.clone()).or_insert(Decimal::ZERO);
        *slot = add(*slot, line, "apple cost")?;
    }
    Ok(out)
}

/// Aggregate a cost sheet into category totals, shares and per-unit costs.
///
/// Example:
/// total 500.00 over 200 bottles => cost_per_bottle == 2.50
pub fn aggregate_cogs(inputs: &CostInputs) -> Result<CogsResult, EconError> {
    validate_cost_inputs(inputs)?;

    let mut apples = Decimal::ZERO;
    for a in &inputs.apples {
        apples = add(apples, apple_line(a)?, "apple cost")?;
    }
    let mut additives = Decimal::ZERO;
    for a in &inputs.additives {
        let line = mul(a.amount, a.cost_per_unit, "additive cost")?;
        additives = add(additives, line, "additive cost")?;
    }
    let mut packaging = Decimal::ZERO;
    for p in &inputs.packaging {
        let line = mul(Decimal::from(p.quantity), p.price_per_unit, "packaging cost")?;
        packaging = add(packaging, line, "packaging cost")?;
    }
    let labor = inputs.labor_cost;
    let overhead = inputs.overhead_cost;
    let total_cogs = [additives, packaging, labor, overhead]
        .into_iter()
        .try_fold(apples, |acc, x| add(acc, x, "total_cogs"))?;

    let breakdown = [
        (CostCategory::Apples, apples),
        (CostCategory::Additives, additives),
        (CostCategory::Packaging, packaging),
        (CostCategory::Labor, labor),
        (CostCategory::Overhead, overhead),
    ]
    .into_iter()
    .map(|(category, amount)| {
        Ok(CategoryShare {
            category,
            amount,
            percent_of_total: percent(amount, total_cogs, "percent_of_total")?,
        })
    })
    .collect::<Result<Vec<_>, EconError>>()?;

    // Divisors are at least one unit here, so only a sub-liter volume can overflow.
    let cost_per_bottle = if inputs.units_produced == 0 {
        None
    } else {
        total_cogs.checked_div(Decimal::from(inputs.units_produced))
    };
    let liters = if inputs.volume_liters > 0.0 {
        dec(inputs.volume_liters, "volume_liters")?
    } else {
        Decimal::ZERO
    };
    let cost_per_liter = if liters.is_zero() {
        None
    } else {
        Some(
            total_cogs
                .checked_div(liters)
                .ok_or(EconError::Overflow("cost_per_liter"))?,
        )
    };

    debug!(%total_cogs, ?cost_per_bottle, ?cost_per_liter, "cogs aggregated");
    Ok(CogsResult {
        apples,
        additives,
        packaging,
        labor,
        overhead,
        total_cogs,
        breakdown,
        cost_per_bottle,
        cost_per_liter,
    })
}

/// Stock position of a packaged run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCounts {
    pub produced: u64,
    pub remaining: u64,
    pub depleted: u64,
}

/// Pricing and stock for one packaged run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarginInput {
    #[serde(default)]
    pub retail_price: Option<Decimal>,
    pub cost_per_bottle: Decimal,
    #[serde(default)]
    pub inventory: InventoryCounts,
}

/// Margin, markup and stock valuation for one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarginResult {
    pub gross_margin: Decimal,
    /// `None` when the retail price is zero.
    pub gross_margin_percent: Option<Decimal>,
    pub markup: Decimal,
    /// `None` when the cost is zero.
    pub markup_percent: Option<Decimal>,
    pub inventory_value_remaining: Decimal,
    pub revenue_if_sold: Decimal,
    pub potential_profit: Decimal,
    /// Depleted over produced; `None` when nothing was produced.
    pub sell_through_percent: Option<Decimal>,
}

fn validate_margin_input(input: &MarginInput) -> Result<Decimal, EconError> {
    let price = input.retail_price.ok_or(EconError::NoPricingData)?;
    if price < Decimal::ZERO {
        return Err(EconError::NegativeMoney("retail_price"));
    }
    if input.cost_per_bottle < Decimal::ZERO {
        return Err(EconError::NegativeMoney("cost_per_bottle"));
    }
    let inv = input.inventory;
    if inv.remaining > inv.produced {
        return Err(EconError::InventoryMismatch {
            produced: inv.produced,
            remaining: inv.remaining,
        });
    }
    Ok(price)
}

/// Margin and markup of a run against its retail price.
///
/// A missing retail price yields `EconError::NoPricingData` rather than a
/// zero margin.
///
/// Example:
/// cost 2.50, price 8.00 => gross_margin 5.50, gross_margin_percent 68.75
pub fn calculate_margin(input: &MarginInput) -> Result<MarginResult, EconError> {
    let price = validate_margin_input(input)?;
    let cost = input.cost_per_bottle;
    let inv = input.inventory;

    let gross_margin = price - cost;
    let markup = price - cost;
    let remaining = Decimal::from(inv.remaining);
    let inventory_value_remaining = mul(remaining, cost, "inventory_value_remaining")?;
    let revenue_if_sold = mul(remaining, price, "revenue_if_sold")?;

    Ok(MarginResult {
        gross_margin,
        gross_margin_percent: percent(gross_margin, price, "gross_margin_percent")?,
        markup,
        markup_percent: percent(markup, cost, "markup_percent")?,
        inventory_value_remaining,
        revenue_if_sold,
        // both sides are non-negative, so the difference stays in range
        potential_profit: revenue_if_sold - inventory_value_remaining,
        sell_through_percent: percent(
            Decimal::from(inv.depleted),
            Decimal::from(inv.produced),
            "sell_through_percent",
        )?,
    })
}

/// Remaining stock valued across several runs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryValuation {
    /// Cost value of all remaining stock, priced or not.
    pub inventory_value_remaining: Decimal,
    /// Revenue if all priced stock sold at retail.
    pub revenue_if_sold: Decimal,
    /// Profit on priced stock only.
    pub potential_profit: Decimal,
    /// Runs without a retail price; excluded from revenue and profit.
    pub unpriced_runs: usize,
}

/// Value remaining inventory across runs.
pub fn inventory_valuation(runs: &[MarginInput]) -> Result<InventoryValuation, EconError> {
    let mut out = InventoryValuation::default();
    for run in runs {
        match calculate_margin(run) {
            Ok(m) => {
                out.inventory_value_remaining = add(
                    out.inventory_value_remaining,
                    m.inventory_value_remaining,
                    "inventory_value_remaining",
                )?;
                out.revenue_if_sold =
                    add(out.revenue_if_sold, m.revenue_if_sold, "revenue_if_sold")?;
                out.potential_profit =
                    add(out.potential_profit, m.potential_profit, "potential_profit")?;
            }
            Err(EconError::NoPricingData) => {
                if run.cost_per_bottle < Decimal::ZERO {
                    return Err(EconError::NegativeMoney("cost_per_bottle"));
                }
                out.unpriced_runs += 1;
                let value = mul(
                    Decimal::from(run.inventory.remaining),
                    run.cost_per_bottle,
                    "inventory_value_remaining",
                )?;
                out.inventory_value_remaining =
                    add(out.inventory_value_remaining, value, "inventory_value_remaining")?;
            }
            Err(e) => return Err(e),
        }
    }
    debug!(
        value = %out.inventory_value_remaining,
        unpriced = out.unpriced_runs,
        "inventory valued"
    );
    Ok(out)
}

/// Units sold at one realised price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub price: Decimal,
    pub quantity: u64,
}

/// Quantity-weighted realised price across sales lines.
///
/// `Ok(None)` when no units were sold.
///
/// Example:
/// 3 @ 8.00 and 1 @ 10.00 => 8.50
pub fn average_selling_price(lines: &[SaleLine]) -> Result<Option<Decimal>, EconError> {
    let mut revenue = Decimal::ZERO;
    let mut units = Decimal::ZERO;
    for line in lines {
        if line.price < Decimal::ZERO {
            return Err(EconError::NegativeMoney("sale price"));
        }
        let qty = Decimal::from(line.quantity);
        revenue = add(revenue, mul(line.price, qty, "sales revenue")?, "sales revenue")?;
        units = add(units, qty, "units sold")?;
    }
    if units.is_zero() {
        return Ok(None);
    }
    // units >= 1, so the quotient never exceeds revenue
    let asp = revenue / units;
    debug!(%asp, %units, "average selling price");
    Ok(Some(asp))
}
