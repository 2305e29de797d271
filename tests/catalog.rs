//! Software, key types and bindings.

mod common;
use common::*;

#[test]
fn test_duplicate_names_conflict() {
    let db = test_db();
    let clock = test_clock();
    let conn = db.pool.get().unwrap();
    create_software(&conn, clock.as_ref(), "App");
    create_key_type(&conn, clock.as_ref(), "Monthly", 720, 9.99);

    let err = catalog::create_software(
        &conn,
        clock.as_ref(),
        &CreateSoftware {
            name: "App".into(),
            version: "2.0".into(),
            announcement: None,
        },
    )
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let err = catalog::create_key_type(
        &conn,
        clock.as_ref(),
        &CreateKeyType {
            name: "Monthly".into(),
            description: None,
            hours: 1,
            price: 0.0,
        },
    )
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[test]
fn test_key_type_validation() {
    let db = test_db();
    let clock = test_clock();
    let conn = db.pool.get().unwrap();

    for (hours, price) in [
        (0, 1.0),
        (-5, 1.0),
        (24, -0.01),
        (catalog::MAX_KEY_TYPE_HOURS + 1, 1.0),
        (i64::MAX / 1000, 1.0),
    ] {
        let err = catalog::create_key_type(
            &conn,
            clock.as_ref(),
            &CreateKeyType {
                name: format!("bad-{hours}-{price}"),
                description: None,
                hours,
                price,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}

#[test]
fn test_key_type_hours_cap() {
    let db = test_db();
    let clock = test_clock();
    let conn = db.pool.get().unwrap();

    let longest = create_key_type(&conn, clock.as_ref(), "Century", catalog::MAX_KEY_TYPE_HOURS, 99.0);
    assert_eq!(longest.hours, catalog::MAX_KEY_TYPE_HOURS);

    let err = catalog::update_key_type(
        &conn,
        clock.as_ref(),
        longest.id,
        &UpdateKeyType {
            hours: Some(i64::MAX / 1000),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(catalog::get_key_type(&conn, longest.id).unwrap().hours, catalog::MAX_KEY_TYPE_HOURS);
}

#[test]
fn test_update_software_clears_announcement() {
    let db = test_db();
    let clock = test_clock();
    let conn = db.pool.get().unwrap();
    let software = create_software(&conn, clock.as_ref(), "App");

    let updated = catalog::update_software(
        &conn,
        clock.as_ref(),
        software.id,
        &UpdateSoftware {
            announcement: Some(Some("v2 is out".into())),
            version: Some("2.0.0".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(updated.announcement.as_deref(), Some("v2 is out"));
    assert_eq!(updated.version, "2.0.0");

    let cleared: UpdateSoftware = serde_json::from_str(r#"{"announcement": null}"#).unwrap();
    let updated = catalog::update_software(&conn, clock.as_ref(), software.id, &cleared).unwrap();
    assert_eq!(updated.announcement, None);
    assert_eq!(updated.version, "2.0.0");
}

#[test]
fn test_binding_rules() {
    let db = test_db();
    let clock = test_clock();
    let conn = db.pool.get().unwrap();
    let (software, key_type) = seed_catalog(&conn, clock.as_ref());

    let err = catalog::bind(&conn, clock.as_ref(), software.id, key_type.id, 0).unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let err = catalog::bind(&conn, clock.as_ref(), software.id, 999, 0).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let bound = catalog::bound_key_types(&conn, software.id).unwrap();
    assert_eq!(bound.len(), 1);
    assert!(bound[0].binding_active);

    let binding = catalog::set_binding_active(&conn, software.id, key_type.id, false).unwrap();
    assert!(!binding.is_active);
    assert!(!catalog::bound_key_types(&conn, software.id).unwrap()[0].binding_active);

    catalog::unbind(&conn, software.id, key_type.id).unwrap();
    let err = catalog::unbind(&conn, software.id, key_type.id).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(catalog::bound_key_types(&conn, software.id).unwrap().is_empty());
}

#[test]
fn test_delete_key_type_with_keys_is_rejected() {
    let db = test_db();
    let clock = test_clock();
    let mut conn = db.pool.get().unwrap();
    let (software, key_type) = seed_catalog(&conn, clock.as_ref());
    mint_as_admin(&mut conn, clock.as_ref(), software.id, key_type.id, 1);

    let err = catalog::delete_key_type(&mut conn, key_type.id).unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    let err = catalog::delete_software(&mut conn, software.id).unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    // Still bound and mintable
    assert!(catalog::require_mintable(&conn, software.id, key_type.id).is_ok());
}

#[test]
fn test_delete_unused_key_type_removes_bindings() {
    let db = test_db();
    let clock = test_clock();
    let mut conn = db.pool.get().unwrap();
    let (software, key_type) = seed_catalog(&conn, clock.as_ref());

    catalog::delete_key_type(&mut conn, key_type.id).unwrap();
    assert!(catalog::bound_key_types(&conn, software.id).unwrap().is_empty());
    let err = catalog::get_key_type(&conn, key_type.id).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    catalog::delete_software(&mut conn, software.id).unwrap();
    let err = catalog::delete_software(&mut conn, software.id).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn test_list_software_filters() {
    let db = test_db();
    let clock = test_clock();
    let conn = db.pool.get().unwrap();
    create_software(&conn, clock.as_ref(), "Photo Editor");
    let audio = create_software(&conn, clock.as_ref(), "Audio Mixer");
    create_software(&conn, clock.as_ref(), "Photo Viewer");
    catalog::set_software_active(&conn, clock.as_ref(), audio.id, false).unwrap();

    let photos = queries::list_software(
        &conn,
        &CatalogFilter {
            name: Some("Photo".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(photos.total, 2);

    let inactive = queries::list_software(
        &conn,
        &CatalogFilter {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(inactive.total, 1);
    assert_eq!(inactive.items[0].id, audio.id);
}
