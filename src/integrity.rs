//! Recompute denormalized counters from their source rows and report drift.

use rusqlite::{Connection, params};
use serde::Serialize;

use crate::error::Result;

/// Allowed difference between stored and recomputed money sums.
const MONEY_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Drift {
    pub table: &'static str,
    pub id: i64,
    pub column: &'static str,
    pub stored: f64,
    pub expected: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub ok: bool,
    pub drifts: Vec<Drift>,
}

fn collect(
    conn: &Connection,
    sql: &str,
    table: &'static str,
    column: &'static str,
    tolerance: f64,
    out: &mut Vec<Drift>,
) -> Result<()> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?, row.get::<_, f64>(2)?))
    })?;
    for row in rows {
        let (id, stored, expected) = row?;
        if (stored - expected).abs() > tolerance {
            out.push(Drift {
                table,
                id,
                column,
                stored,
                expected,
            });
        }
    }
    Ok(())
}

/// Every counter that disagrees with a from-scratch recount.
///
/// - `children_count`: rows whose `parent_id` points here
/// - `keys_generated`: salesperson-minted keys for the assignment's pair
/// - `total_sales`: sum of own sale amounts
/// - `total_commission`: own sale commissions plus upline commissions earned
pub fn check_counters(conn: &Connection) -> Result<Vec<Drift>> {
    let mut drifts = Vec::new();

    collect(
        conn,
        "SELECT s.id, s.children_count,
                (SELECT COUNT(*) FROM salespeople c WHERE c.parent_id = s.id)
         FROM salespeople s ORDER BY s.id",
        "salespeople",
        "children_count",
        0.0,
        &mut drifts,
    )?;

    collect(
        conn,
        "SELECT p.id, p.keys_generated,
                (SELECT COUNT(*) FROM keys k
                 WHERE k.salesperson_id = p.salesperson_id
                   AND k.creator_type = 'salesperson'
                   AND k.software_id = p.software_id
                   AND k.key_type_id = p.key_type_id)
         FROM salesperson_products p ORDER BY p.id",
        "salesperson_products",
        "keys_generated",
        0.0,
        &mut drifts,
    )?;

    collect(
        conn,
        "SELECT s.id, s.total_sales,
                (SELECT COALESCE(SUM(sale_amount), 0) FROM salesperson_sales WHERE salesperson_id = s.id)
         FROM salespeople s ORDER BY s.id",
        "salespeople",
        "total_sales",
        MONEY_EPSILON,
        &mut drifts,
    )?;

    collect(
        conn,
        "SELECT s.id, s.total_commission,
                (SELECT COALESCE(SUM(commission), 0) FROM salesperson_sales WHERE salesperson_id = s.id)
                + (SELECT COALESCE(SUM(commission_amount), 0) FROM agent_commissions WHERE agent_id = s.id)
         FROM salespeople s ORDER BY s.id",
        "salespeople",
        "total_commission",
        MONEY_EPSILON,
        &mut drifts,
    )?;

    if !drifts.is_empty() {
        tracing::warn!("Integrity check found {} drifted counter(s)", drifts.len());
    }
    Ok(drifts)
}

pub fn report(conn: &Connection) -> Result<IntegrityReport> {
    let drifts = check_counters(conn)?;
    Ok(IntegrityReport {
        ok: drifts.is_empty(),
        drifts,
    })
}
