//! Billing Calculator
//!
//! Pure computation: no I/O, deterministic for identical inputs.
//! Monetary amounts are `f64` at the boundaries; all arithmetic runs on
//! `Decimal` and is rounded exactly once on the way out.

use crate::db::models::ConsumptionLine;
use rust_decimal::prelude::*;
use serde::Serialize;

/// Monetary precision: 2 decimal places
const DECIMAL_PLACES: u32 = 2;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Convert an f64 amount into Decimal for computation
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert a Decimal back to f64, applying the uniform rounding rule
/// (2 decimal places, midpoint away from zero)
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Line subtotal: unit price x quantity
pub fn line_subtotal(unit_price: f64, quantity: i64) -> f64 {
    to_f64(to_decimal(unit_price) * Decimal::from(quantity))
}

/// Itemized bill produced when a session closes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bill {
    pub minutes_played: i64,
    pub time_cost: f64,
    pub consumption_total: f64,
    pub total_due: f64,
}

/// Compute the bill for a session.
///
/// Minutes are billed by the started minute (ceiling), never negative
/// even under clock skew. Time cost is `hourly_rate / 60` per minute.
pub fn compute_bill(
    session_start: i64,
    session_end: i64,
    hourly_rate: f64,
    lines: &[ConsumptionLine],
) -> Bill {
    let elapsed_ms = (session_end - session_start).max(0);
    let minutes_played = (elapsed_ms as u64).div_ceil(MILLIS_PER_MINUTE as u64) as i64;

    let time_cost =
        to_decimal(hourly_rate) * Decimal::from(minutes_played) / Decimal::from(60);
    let consumption_total: Decimal = lines.iter().map(|l| to_decimal(l.subtotal)).sum();
    let total_due = time_cost + consumption_total;

    Bill {
        minutes_played,
        time_cost: to_f64(time_cost),
        consumption_total: to_f64(consumption_total),
        total_due: to_f64(total_due),
    }
}
