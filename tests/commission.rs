//! Salesperson sales and the upline commission cascade.

mod common;
use common::*;
use rusqlite::Connection;

fn sell(
    conn: &mut Connection,
    clock: &dyn Clock,
    salesperson_id: i64,
    software_id: i64,
    key_type_id: i64,
    count: i64,
) -> Result<sales::SaleOutcome, AppError> {
    sales::generate_keys(
        conn,
        &CodeGenerator::new(),
        clock,
        &HierarchyRules::default(),
        salesperson_id,
        &GenerateKeys {
            software_id,
            key_type_id,
            count,
            details: SaleDetails {
                customer_name: Some("Acme".into()),
                ..Default::default()
            },
        },
    )
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}

#[test]
fn test_generate_keys_records_sale_and_credits_seller() {
    let db = test_db();
    let clock = test_clock();
    let mut conn = db.pool.get().unwrap();
    let (software, key_type) = seed_catalog(&conn, clock.as_ref());
    let seller = create_salesperson(&conn, "seller", 0.05, 0.1);
    assign(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 0.2, 0);

    let outcome = sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 10).unwrap();
    assert_eq!(outcome.keys.len(), 10);
    assert!(outcome.agent_commissions.is_empty());
    assert!(outcome.cascade_error.is_none());
    for key in &outcome.keys {
        assert_eq!(key.creator_type, CreatorType::Salesperson);
        assert_eq!(key.salesperson_id, Some(seller.id));
        assert_eq!(key.status, KeyStatus::Unused);
        assert!(key.key_code.starts_with("KEY"));
    }

    let sale = &outcome.sale;
    assert_eq!(sale.key_count, 10);
    assert_close(sale.sale_amount, 99.9);
    assert_close(sale.commission_rate, 0.2);
    assert_close(sale.commission, 19.98);
    assert_eq!(sale.status, SettlementStatus::Pending);
    assert_eq!(sale.customer_name.as_deref(), Some("Acme"));

    let seller = reload(&conn, seller.id);
    assert_close(seller.total_sales, 99.9);
    assert_close(seller.total_commission, 19.98);

    let product = queries::get_product(&conn, seller.id, software.id, key_type.id)
        .unwrap()
        .unwrap();
    assert_eq!(product.keys_generated, 10);
    assert!(integrity::check_counters(&conn).unwrap().is_empty());
}

#[test]
fn test_assignment_without_rate_uses_salesperson_default() {
    let db = test_db();
    let clock = test_clock();
    let mut conn = db.pool.get().unwrap();
    let (software, key_type) = seed_catalog(&conn, clock.as_ref());
    let seller = create_salesperson(&conn, "seller", 0.05, 0.1);
    assign(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 0.0, 0);

    let outcome = sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 2).unwrap();
    assert_close(outcome.sale.commission_rate, 0.05);
    assert_close(outcome.sale.commission, 19.98 * 0.05);
}

#[test]
fn test_direct_upline_earns_its_parent_rate() {
    let db = test_db();
    let clock = test_clock();
    let mut conn = db.pool.get().unwrap();
    let rules = HierarchyRules::default();
    let (software, key_type) = seed_catalog(&conn, clock.as_ref());
    let parent = create_salesperson(&conn, "parent", 0.1, 0.1);
    let seller = create_salesperson(&conn, "seller", 0.1, 0.1);
    link(&mut conn, clock.as_ref(), &rules, parent.id, seller.id);
    assign(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 0.1, 0);

    let outcome = sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 10).unwrap();
    assert_eq!(outcome.agent_commissions.len(), 1);
    let row = &outcome.agent_commissions[0];
    assert_eq!(row.sale_id, outcome.sale.id);
    assert_eq!(row.agent_id, parent.id);
    assert_eq!(row.salesperson_id, seller.id);
    assert_eq!(row.agent_level, 0);
    assert_close(row.original_amount, 99.9);
    assert_close(row.commission_rate, 0.1);
    assert_close(row.commission_amount, 9.99);

    assert_close(reload(&conn, parent.id).total_commission, 9.99);
    assert_close(reload(&conn, seller.id).total_commission, 9.99);
    assert_close(reload(&conn, parent.id).total_sales, 0.0);
    assert!(integrity::check_counters(&conn).unwrap().is_empty());
}

#[test]
fn test_chain_pays_every_ancestor_once() {
    let db = test_db();
    let clock = test_clock();
    let mut conn = db.pool.get().unwrap();
    let rules = HierarchyRules::default();
    let (software, key_type) = seed_catalog(&conn, clock.as_ref());

    // a -> b -> c -> seller, each ancestor with its own parent rate
    let a = create_salesperson(&conn, "a", 0.1, 0.05);
    let b = create_salesperson(&conn, "b", 0.1, 0.1);
    let c = create_salesperson(&conn, "c", 0.1, 0.2);
    let seller = create_salesperson(&conn, "seller", 0.1, 0.1);
    link(&mut conn, clock.as_ref(), &rules, a.id, b.id);
    link(&mut conn, clock.as_ref(), &rules, b.id, c.id);
    link(&mut conn, clock.as_ref(), &rules, c.id, seller.id);
    assign(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 0.1, 0);

    // 100 keys at 9.99 = 999.0
    let outcome = sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 100).unwrap();
    let paid: Vec<(i64, i64, f64)> = outcome
        .agent_commissions
        .iter()
        .map(|r| (r.agent_id, r.salesperson_id, r.commission_amount))
        .collect();
    assert_eq!(paid.len(), 3);
    assert_eq!((paid[0].0, paid[0].1), (c.id, seller.id));
    assert_eq!((paid[1].0, paid[1].1), (b.id, c.id));
    assert_eq!((paid[2].0, paid[2].1), (a.id, b.id));
    assert_close(paid[0].2, 999.0 * 0.2);
    assert_close(paid[1].2, 999.0 * 0.1);
    assert_close(paid[2].2, 999.0 * 0.05);

    assert_close(reload(&conn, c.id).total_commission, 199.8);
    assert_close(reload(&conn, b.id).total_commission, 99.9);
    assert_close(reload(&conn, a.id).total_commission, 49.95);
    assert_eq!(count_rows(&conn, "agent_commissions"), 3);

    let earned = hierarchy::agent_commissions(&conn, c.id).unwrap();
    assert_eq!(earned.commissions.len(), 1);
    assert_close(earned.total_commission, 199.8);
    assert!(integrity::check_counters(&conn).unwrap().is_empty());
}

#[test]
fn test_inactive_ancestor_still_earns() {
    let db = test_db();
    let clock = test_clock();
    let mut conn = db.pool.get().unwrap();
    let rules = HierarchyRules::default();
    let (software, key_type) = seed_catalog(&conn, clock.as_ref());
    let parent = create_salesperson(&conn, "parent", 0.1, 0.1);
    let seller = create_salesperson(&conn, "seller", 0.1, 0.1);
    link(&mut conn, clock.as_ref(), &rules, parent.id, seller.id);
    assign(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 0.1, 0);

    salespeople::update(
        &conn,
        clock.as_ref(),
        parent.id,
        &UpdateSalesperson {
            status: Some(SalespersonStatus::Inactive),
            ..Default::default()
        },
    )
    .unwrap();

    let outcome = sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 10).unwrap();
    assert_eq!(outcome.agent_commissions.len(), 1);
    assert_close(reload(&conn, parent.id).total_commission, 9.99);
}

#[test]
fn test_tiny_shares_end_the_cascade() {
    let db = test_db();
    let clock = test_clock();
    let mut conn = db.pool.get().unwrap();
    let rules = HierarchyRules::default();
    let (software, key_type) = seed_catalog(&conn, clock.as_ref());
    let parent = create_salesperson(&conn, "parent", 0.1, 0.0001);
    let seller = create_salesperson(&conn, "seller", 0.1, 0.1);
    link(&mut conn, clock.as_ref(), &rules, parent.id, seller.id);
    assign(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 0.1, 0);

    // 9.99 * 0.0001 is under one cent
    let outcome = sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 1).unwrap();
    assert!(outcome.agent_commissions.is_empty());
    assert_close(reload(&conn, parent.id).total_commission, 0.0);
}

#[test]
fn test_quota_is_enforced_atomically() {
    let db = test_db();
    let clock = test_clock();
    let mut conn = db.pool.get().unwrap();
    let (software, key_type) = seed_catalog(&conn, clock.as_ref());
    let seller = create_salesperson(&conn, "seller", 0.1, 0.1);
    assign(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 0.1, 5);

    let err = sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 6).unwrap_err();
    assert!(matches!(err, AppError::Integrity(_)), "{err:?}");
    assert_eq!(count_rows(&conn, "keys"), 0);
    assert_eq!(count_rows(&conn, "salesperson_sales"), 0);
    assert_close(reload(&conn, seller.id).total_sales, 0.0);

    sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 5).unwrap();
    let err = sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 1).unwrap_err();
    assert!(matches!(err, AppError::Integrity(_)));

    let product = queries::get_product(&conn, seller.id, software.id, key_type.id)
        .unwrap()
        .unwrap();
    assert_eq!(product.keys_generated, 5);
    assert_eq!(count_rows(&conn, "keys"), 5);
}

#[test]
fn test_sale_requires_an_active_assignment() {
    let db = test_db();
    let clock = test_clock();
    let mut conn = db.pool.get().unwrap();
    let (software, key_type) = seed_catalog(&conn, clock.as_ref());
    let seller = create_salesperson(&conn, "seller", 0.1, 0.1);

    let err = sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 1).unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = sell(&mut conn, clock.as_ref(), 9_999, software.id, key_type.id, 1).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 0).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    assign(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 0.1, 0);
    salespeople::update(
        &conn,
        clock.as_ref(),
        seller.id,
        &UpdateSalesperson {
            status: Some(SalespersonStatus::Suspended),
            ..Default::default()
        },
    )
    .unwrap();
    let err = sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 1).unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(count_rows(&conn, "keys"), 0);
}

#[test]
fn test_assignment_requires_bound_pair() {
    let db = test_db();
    let clock = test_clock();
    let mut conn = db.pool.get().unwrap();
    let software = create_software(&conn, clock.as_ref(), "Unbound App");
    let key_type = create_key_type(&conn, clock.as_ref(), "Weekly", 168, 2.5);
    let seller = create_salesperson(&conn, "seller", 0.1, 0.1);

    let err = salespeople::assign_product(
        &mut conn,
        clock.as_ref(),
        seller.id,
        &AssignProduct {
            software_id: software.id,
            key_type_id: key_type.id,
            commission_rate: Some(0.1),
            key_gen_limit: None,
        },
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[test]
fn test_lowering_limit_below_usage_is_rejected() {
    let db = test_db();
    let clock = test_clock();
    let mut conn = db.pool.get().unwrap();
    let (software, key_type) = seed_catalog(&conn, clock.as_ref());
    let seller = create_salesperson(&conn, "seller", 0.1, 0.1);
    assign(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 0.1, 10);
    sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 4).unwrap();

    let err = salespeople::assign_product(
        &mut conn,
        clock.as_ref(),
        seller.id,
        &AssignProduct {
            software_id: software.id,
            key_type_id: key_type.id,
            commission_rate: None,
            key_gen_limit: Some(3),
        },
    )
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let product = assign(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 0.1, 4);
    assert_eq!(product.key_gen_limit, 4);
    assert_eq!(product.keys_generated, 4);
}

#[test]
fn test_failed_cascade_keeps_the_sale() {
    let db = test_db();
    let clock = test_clock();
    let mut conn = db.pool.get().unwrap();
    let rules = HierarchyRules::default();
    let (software, key_type) = seed_catalog(&conn, clock.as_ref());
    let parent = create_salesperson(&conn, "parent", 0.1, 0.1);
    let seller = create_salesperson(&conn, "seller", 0.1, 0.1);
    link(&mut conn, clock.as_ref(), &rules, parent.id, seller.id);
    assign(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 0.1, 0);

    // Corrupt the forest behind the service's back
    conn.execute(
        "UPDATE salespeople SET parent_id = ?1 WHERE id = ?2",
        rusqlite::params![seller.id, parent.id],
    )
    .unwrap();

    let outcome = sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 10).unwrap();
    assert!(outcome.cascade_error.is_some());
    assert!(outcome.agent_commissions.is_empty());
    assert_eq!(outcome.keys.len(), 10);

    assert_eq!(count_rows(&conn, "salesperson_sales"), 1);
    assert_eq!(count_rows(&conn, "agent_commissions"), 0);
    assert_close(reload(&conn, seller.id).total_sales, 99.9);
    assert_close(reload(&conn, parent.id).total_commission, 0.0);
}

#[test]
fn test_sales_listing_and_stats() {
    let db = test_db();
    let clock = test_clock();
    let mut conn = db.pool.get().unwrap();
    let (software, key_type) = seed_catalog(&conn, clock.as_ref());
    let seller = create_salesperson(&conn, "seller", 0.1, 0.1);
    assign(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 0.1, 0);

    sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 1).unwrap();
    clock.advance(3_600);
    sell(&mut conn, clock.as_ref(), seller.id, software.id, key_type.id, 2).unwrap();

    let page = sales::list_sales(&conn, seller.id, &SaleFilter::default()).unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 2);

    let later = sales::list_sales(
        &conn,
        seller.id,
        &SaleFilter {
            start_time: Some(NOW + 1),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(later.total, 1);
    assert_eq!(later.items[0].key_count, 2);

    let stats = sales::commission_stats(&conn, seller.id).unwrap();
    assert_close(stats.total_sales, 29.97);
    assert_close(stats.total_commission, 2.997);
    assert_close(stats.pending_amount, 2.997);
    assert_close(stats.settled_amount, 0.0);

    let err = sales::commission_stats(&conn, 9_999).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
