//! Budget-constrained allocation over a pool of quotes.
//!
//! Candidates are picked lowest-risk first, weighted towards lower risk,
//! converted to whole shares and then topped up greedily with whatever budget
//! is left. Money is tracked as `Decimal` at the full precision of the quoted
//! prices, so the budget bound is exact.

use crate::domain::quote::StockQuote;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

pub const DEFAULT_MAX_CANDIDATES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("Budget must be positive.")]
    InvalidBudget,
    #[error("No stocks found matching the desired risk level.")]
    NoCandidates,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub quote: StockQuote,
    pub weight: i64,
    pub initial_allocation: f64,
    pub quantity: i64,
    price: Decimal,
}

impl Candidate {
    /// `close_price` as an exact decimal.
    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn cost(&self) -> Decimal {
        Decimal::from(self.quantity) * self.price
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub items: Vec<Candidate>,
    pub budget: Decimal,
    pub total_cost: Decimal,
    pub remaining: Decimal,
}

impl Allocation {
    pub fn total_cost(&self) -> f64 {
        self.total_cost.to_f64().unwrap_or(0.0)
    }

    pub fn remaining_budget(&self) -> f64 {
        self.remaining.to_f64().unwrap_or(0.0)
    }
}

/// `floor(weight * budget / (total_weight * price))`, corrected downwards so
/// the share never exceeds its slice. `None` when the price is unusable or
/// the quantity does not fit.
fn initial_quantity(weight: i64, total_weight: i64, budget: Decimal, price: Decimal) -> Option<i64> {
    if price <= Decimal::ZERO {
        return None;
    }
    let slice = Decimal::from(weight).checked_mul(budget)?;
    let unit = Decimal::from(total_weight).checked_mul(price)?;
    let mut quantity = slice.checked_div(unit)?.floor();
    // Division rounds at 28 significant digits; step back if that rounded up.
    while quantity > Decimal::ZERO && quantity.checked_mul(unit)? > slice {
        quantity -= Decimal::ONE;
    }
    quantity.to_i64()
}

pub fn allocate(
    budget: f64,
    risk_ceiling: i32,
    pool: &[StockQuote],
    max_candidates: usize,
) -> Result<Allocation, AllocationError> {
    if !budget.is_finite() || budget <= 0.0 {
        return Err(AllocationError::InvalidBudget);
    }
    let budget_dec = Decimal::from_f64(budget)
        .filter(|b| *b > Decimal::ZERO)
        .ok_or(AllocationError::InvalidBudget)?;

    let mut selected: Vec<&StockQuote> = pool
        .iter()
        .filter(|q| q.risk_class <= risk_ceiling)
        .collect();
    if selected.is_empty() {
        return Err(AllocationError::NoCandidates);
    }

    // Stable sort: equal risk classes keep pool order.
    selected.sort_by_key(|q| q.risk_class);
    selected.truncate(max_candidates);

    let weights: Vec<i64> = selected
        .iter()
        .map(|q| i64::from(risk_ceiling) - i64::from(q.risk_class) + 1)
        .collect();
    let total_weight: i64 = weights.iter().sum();

    let mut items: Vec<Candidate> = selected
        .into_iter()
        .zip(weights)
        .filter_map(|(quote, weight)| {
            let price = Decimal::from_f64(quote.close_price).unwrap_or(Decimal::ZERO);
            let quantity = initial_quantity(weight, total_weight, budget_dec, price)?;
            (quantity > 0).then(|| Candidate {
                quote: quote.clone(),
                weight,
                initial_allocation: (weight as f64 / total_weight as f64) * budget,
                quantity,
                price,
            })
        })
        .collect();

    let mut total_cost: Decimal = items.iter().map(Candidate::cost).sum();
    let mut remaining = budget_dec - total_cost;

    // Every survivor has a positive price, so each productive scan shrinks
    // `remaining` and the loop reaches a fixed point.
    while remaining > Decimal::ZERO {
        let mut changed = false;
        for c in items.iter_mut() {
            if c.price <= remaining {
                c.quantity += 1;
                remaining -= c.price;
                total_cost += c.price;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    Ok(Allocation {
        items,
        budget: budget_dec,
        total_cost,
        remaining,
    })
}
