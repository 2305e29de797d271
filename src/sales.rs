//! Salesperson key generation and the sale ledger.
//!
//! Generating keys writes in two phases. Phase one mints the keys, bumps the
//! assignment quota, records the sale and credits the seller, all in one
//! transaction. Phase two runs the upline cascade in its own transaction; if
//! it fails the sale stands and the failure is reported alongside it.

use rusqlite::Connection;
use serde::Serialize;

use crate::catalog;
use crate::clock::Clock;
use crate::codegen::CodeGenerator;
use crate::commission;
use crate::db::{atomically, queries};
use crate::error::{AppError, Result};
use crate::hierarchy::HierarchyRules;
use crate::keys::{self, Creator};
use crate::models::*;

#[derive(Debug, Serialize)]
pub struct SaleOutcome {
    pub sale: SalespersonSale,
    pub keys: Vec<Key>,
    pub agent_commissions: Vec<AgentCommission>,
    /// Set when the sale committed but its upline cascade did not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cascade_error: Option<String>,
}

/// Rate credited to the seller: the assignment's own rate, or the
/// salesperson's default when the assignment leaves it at 0.
pub fn own_rate(assignment_rate: f64, default_rate: f64) -> f64 {
    if assignment_rate > 0.0 {
        assignment_rate
    } else {
        default_rate
    }
}

pub fn generate_keys(
    conn: &mut Connection,
    codes: &CodeGenerator,
    clock: &dyn Clock,
    rules: &HierarchyRules,
    salesperson_id: i64,
    input: &GenerateKeys,
) -> Result<SaleOutcome> {
    keys::validate_count(input.count)?;
    let now = clock.timestamp();

    let (sale, minted) = atomically(conn, |tx| {
        let seller = queries::get_salesperson(tx, salesperson_id)?
            .ok_or_else(|| AppError::NotFound("Salesperson not found".into()))?;
        if seller.status != SalespersonStatus::Active {
            return Err(AppError::Forbidden("Salesperson is not active".into()));
        }

        let (software, key_type) =
            catalog::require_mintable(tx, input.software_id, input.key_type_id)?;

        let product = queries::get_product(tx, salesperson_id, software.id, key_type.id)?
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                AppError::Forbidden("Product is not assigned to this salesperson".into())
            })?;

        if !queries::reserve_quota(tx, product.id, input.count, now)? {
            return Err(AppError::Integrity(format!(
                "Key quota exceeded: {} of {} used, {} requested",
                product.keys_generated, product.key_gen_limit, input.count
            )));
        }

        let minted = keys::mint_in(
            tx,
            codes,
            now,
            &software,
            &key_type,
            input.count,
            Creator::Salesperson(salesperson_id),
        )?;

        let sale_amount = input.count as f64 * key_type.price;
        let rate = own_rate(product.commission_rate, seller.commission_rate);
        let commission = sale_amount * rate;

        let sale = queries::insert_sale(
            tx,
            &queries::NewSale {
                salesperson_id,
                software_id: software.id,
                key_type_id: key_type.id,
                key_count: input.count,
                sale_amount,
                commission_rate: rate,
                commission,
                details: &input.details,
            },
            now,
        )?;
        queries::add_sale_totals(tx, salesperson_id, sale_amount, commission)?;
        Ok((sale, minted))
    })?;

    tracing::info!(
        "Salesperson {} generated {} key(s), sale {} for {:.2}",
        salesperson_id,
        minted.len(),
        sale.id,
        sale.sale_amount
    );

    let (agent_commissions, cascade_error) = match commission::cascade(conn, clock, rules, &sale) {
        Ok(rows) => (rows, None),
        Err(e) => {
            tracing::error!("Commission cascade for sale {} failed: {}", sale.id, e);
            (Vec::new(), Some(e.to_string()))
        }
    };

    Ok(SaleOutcome {
        sale,
        keys: minted,
        agent_commissions,
        cascade_error,
    })
}

pub fn list_sales(
    conn: &Connection,
    salesperson_id: i64,
    filter: &SaleFilter,
) -> Result<Page<SalespersonSale>> {
    if queries::get_salesperson(conn, salesperson_id)?.is_none() {
        return Err(AppError::NotFound("Salesperson not found".into()));
    }
    queries::list_sales(conn, salesperson_id, filter)
}

pub fn commission_stats(conn: &Connection, salesperson_id: i64) -> Result<CommissionStats> {
    if queries::get_salesperson(conn, salesperson_id)?.is_none() {
        return Err(AppError::NotFound("Salesperson not found".into()));
    }
    queries::commission_stats(conn, salesperson_id)
}
