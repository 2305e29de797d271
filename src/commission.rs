//! Upline commission cascade.
//!
//! A sale is written first. The cascade then walks upward from the seller in
//! its own transaction, paying each ancestor a share of the sale amount until
//! the hop budget runs out, the forest root is reached, or a share falls under
//! [`MIN_COMMISSION`].

use std::collections::HashSet;

use rusqlite::Connection;

use crate::clock::Clock;
use crate::db::{atomically, queries};
use crate::error::{AppError, Result};
use crate::hierarchy::{AgentGraph, HierarchyRules};
use crate::models::{AgentCommission, SalespersonSale};

/// Shares below this amount end the cascade.
pub const MIN_COMMISSION: f64 = 0.01;

/// Rate paid to an ancestor at `ancestor_level` from a walk positioned at
/// `current_level`.
///
/// The direct upline (`ancestor_level == current_level - 1`) earns its
/// `parent_rate` as is; each skipped level halves it. A walk that moves one
/// hop at a time never skips, so the halving only applies to malformed levels.
pub fn ancestor_rate(current_level: i64, ancestor_level: i64, parent_rate: f64) -> f64 {
    let level_diff = current_level - ancestor_level - 1;
    if level_diff <= 0 {
        parent_rate
    } else {
        let exp = i32::try_from(level_diff).unwrap_or(i32::MAX);
        parent_rate / 2f64.powi(exp)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Payout {
    pub agent_id: i64,
    pub agent_level: i64,
    /// Walk position one hop below the agent
    pub descendant_id: i64,
    pub rate: f64,
    pub amount: f64,
}

/// Compute the payouts for a sale of `sale_amount` by `seller_id`.
pub fn plan<G: AgentGraph + ?Sized>(
    graph: &G,
    seller_id: i64,
    sale_amount: f64,
    max_hops: usize,
) -> Result<Vec<Payout>> {
    let mut current = graph
        .agent_node(seller_id)?
        .ok_or_else(|| AppError::NotFound(format!("Salesperson {} not found", seller_id)))?;
    let mut visited = HashSet::from([current.id]);
    let mut payouts = Vec::new();

    for _ in 0..max_hops {
        let Some(parent_id) = current.parent_id else {
            break;
        };
        if !visited.insert(parent_id) {
            return Err(AppError::Integrity(format!(
                "Cycle in upline of salesperson {}",
                seller_id
            )));
        }
        let parent = graph
            .agent_node(parent_id)?
            .ok_or_else(|| AppError::NotFound(format!("Upline {} not found", parent_id)))?;

        let rate = ancestor_rate(current.level, parent.level, parent.parent_commission_rate);
        let amount = sale_amount * rate;
        if amount < MIN_COMMISSION {
            break;
        }

        payouts.push(Payout {
            agent_id: parent.id,
            agent_level: parent.level,
            descendant_id: current.id,
            rate,
            amount,
        });
        current = parent;
    }
    Ok(payouts)
}

/// Persist the cascade for an already committed sale.
///
/// All commission rows and `total_commission` increments commit together or
/// not at all. The sale itself is never touched.
pub fn cascade(
    conn: &mut Connection,
    clock: &dyn Clock,
    rules: &HierarchyRules,
    sale: &SalespersonSale,
) -> Result<Vec<AgentCommission>> {
    let now = clock.timestamp();
    let max_hops = usize::try_from(rules.max_agent_level).unwrap_or(0);

    let rows = atomically(conn, |tx| {
        let graph: &Connection = tx;
        let payouts = plan(graph, sale.salesperson_id, sale.sale_amount, max_hops)?;

        let mut rows = Vec::with_capacity(payouts.len());
        for payout in payouts {
            let row = queries::insert_agent_commission(
                tx,
                &queries::NewAgentCommission {
                    sale_id: sale.id,
                    salesperson_id: payout.descendant_id,
                    agent_id: payout.agent_id,
                    agent_level: payout.agent_level,
                    original_amount: sale.sale_amount,
                    commission_rate: payout.rate,
                    commission_amount: payout.amount,
                },
                now,
            )?;
            queries::add_commission_total(tx, payout.agent_id, payout.amount)?;
            rows.push(row);
        }
        Ok(rows)
    })?;

    if !rows.is_empty() {
        tracing::info!(
            "Cascaded sale {} to {} upline agent(s)",
            sale.id,
            rows.len()
        );
    }
    Ok(rows)
}
