use std::time::Duration;

use time::macros::{datetime, offset};

use super::rows::{parse_listing, parse_local_instant};
use super::{HttpBackend, ItemSource, JsonFileSource, SourceError, StatusWriter};
use crate::domain::item::SchedulableItem;
use crate::domain::kind::ItemKind;
use crate::domain::status::ItemStatus;

fn unique_items_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("agenda-notify-items-{}.json", uuid::Uuid::now_v7()))
}

#[test]
fn local_instants_use_configured_offset() {
    let offset = offset!(-6);
    assert_eq!(
        parse_local_instant("2025-01-10T10:00", offset),
        Some(datetime!(2025-01-10 10:00 -6))
    );
    assert_eq!(
        parse_local_instant("2025-01-10 10:00:30", offset),
        Some(datetime!(2025-01-10 10:00:30 -6))
    );
    assert_eq!(
        parse_local_instant("2025-01-10T10:00:00.000", offset),
        Some(datetime!(2025-01-10 10:00 -6))
    );
    assert_eq!(
        parse_local_instant("2025-01-10", offset),
        Some(datetime!(2025-01-10 00:00 -6))
    );
    assert_eq!(
        parse_local_instant("2025-01-10T16:00:00.000Z", offset),
        Some(datetime!(2025-01-10 16:00 UTC))
    );
    assert_eq!(parse_local_instant("tomorrow", offset), None);
    assert_eq!(parse_local_instant("  ", offset), None);
}

#[test]
fn appointment_rows_map_backend_fields() {
    let body = r#"[
        {"id": 42, "descripcion": "Dentist", "fecha": "2025-01-10", "hora": "10:00",
         "aviso_anticipado_min": 15, "recordatorio_cada_min": 0, "estado": "Pendiente"},
        {"id": 43, "descripcion": "", "fecha": "2025-01-11", "hora": "09:30:00",
         "aviso_anticipado_min": null, "estado": "Activo"},
        {"id": 44, "descripcion": "No time", "fecha": "2025-01-12", "hora": null},
        {"id": 45, "fecha": "2025-01-12", "hora": "08:00", "estado": "Unknown"}
    ]"#;

    let items = parse_listing(ItemKind::Appointment, body, offset!(UTC)).expect("listing parses");
    assert_eq!(items.len(), 3);

    assert_eq!(items[0].id, "42");
    assert_eq!(items[0].title, "Dentist");
    assert_eq!(items[0].start_at, datetime!(2025-01-10 10:00 UTC));
    assert_eq!(items[0].lead_minutes, 15);
    assert_eq!(items[0].status, ItemStatus::Pending);

    assert_eq!(items[1].title, "No description");
    assert_eq!(items[1].lead_minutes, 0);
    assert_eq!(items[1].status, ItemStatus::Active);

    assert_eq!(items[2].id, "44");
    assert_eq!(items[2].start_at, datetime!(2025-01-12 00:00 UTC));
    assert_eq!(items[2].status, ItemStatus::Pending);
}

#[test]
fn appointment_without_time_of_day_starts_at_local_midnight() {
    let body = r#"[
        {"id": 8, "descripcion": "All day", "fecha": "2025-01-10", "hora": null,
         "estado": "Pendiente"},
        {"id": 9, "descripcion": "Blank time", "fecha": "2025-01-11T00:00:00.000Z",
         "hora": "  "},
        {"id": 10, "descripcion": "No date", "hora": "10:00"}
    ]"#;

    let items = parse_listing(ItemKind::Appointment, body, offset!(-6)).expect("listing parses");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "8");
    assert_eq!(items[0].start_at, datetime!(2025-01-10 00:00 -6));
    assert_eq!(items[1].id, "9");
    assert_eq!(items[1].start_at, datetime!(2025-01-11 00:00 -6));
}

#[test]
fn minute_columns_accept_numeric_strings() {
    let appointments = r#"[
        {"id": 7, "descripcion": "Dentist", "fecha": "2025-01-10", "hora": "10:00",
         "aviso_anticipado_min": "15", "recordatorio_cada_min": "0", "estado": "Pendiente"},
        {"id": 8, "descripcion": "Blank", "fecha": "2025-01-10", "hora": "11:00",
         "aviso_anticipado_min": "", "recordatorio_cada_min": " 30 "},
        {"id": 9, "descripcion": "Garbage", "fecha": "2025-01-10", "hora": "12:00",
         "aviso_anticipado_min": "soon"},
        {"id": 10, "descripcion": "Fraction", "fecha": "2025-01-10", "hora": "13:00",
         "aviso_anticipado_min": 2.5}
    ]"#;
    let items =
        parse_listing(ItemKind::Appointment, appointments, offset!(UTC)).expect("listing parses");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "7");
    assert_eq!(items[0].lead_minutes, 15);
    assert_eq!(items[0].repeat_minutes, 0);
    assert_eq!(items[1].id, "8");
    assert_eq!(items[1].lead_minutes, 0);
    assert_eq!(items[1].repeat_minutes, 30);

    let events = r#"[
        {"id": 3, "titulo": "Review", "inicio": "2025-01-10T09:00",
         "aviso_min": "10", "repetir_cada_min": "5"}
    ]"#;
    let items = parse_listing(ItemKind::Event, events, offset!(UTC)).expect("listing parses");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].lead_minutes, 10);
    assert_eq!(items[0].repeat_minutes, 5);
}

#[test]
fn event_rows_map_backend_fields_and_default_to_active() {
    let body = r#"[
        {"id": 7, "titulo": "Standup", "inicio": "2025-01-10T09:00", "fin": "2025-01-10T09:15",
         "aviso_min": 5, "repetir_cada_min": 2},
        {"id": "8", "titulo": "Archived", "inicio": "2025-01-10T09:00", "fin": "",
         "estado": "Archivado"},
        {"id": null, "titulo": "Broken", "inicio": "2025-01-10T09:00"},
        {"id": 9, "titulo": "No start"}
    ]"#;

    let items = parse_listing(ItemKind::Event, body, offset!(UTC)).expect("listing parses");
    assert_eq!(items.len(), 2);

    let standup = &items[0];
    assert_eq!(standup.id, "7");
    assert_eq!(standup.end_at, Some(datetime!(2025-01-10 09:15 UTC)));
    assert_eq!(standup.lead_minutes, 5);
    assert_eq!(standup.repeat_minutes, 2);
    assert_eq!(standup.status, ItemStatus::Active);

    assert_eq!(items[1].id, "8");
    assert_eq!(items[1].end_at, None);
    assert_eq!(items[1].status, ItemStatus::Archived);
}

#[test]
fn listing_that_is_not_an_array_is_an_error() {
    let err = parse_listing(ItemKind::Event, r#"{"mensaje":"No autorizado"}"#, offset!(UTC))
        .expect_err("object body should fail");
    assert!(matches!(err, SourceError::Json(_)));
}

#[test]
fn http_backend_builds_collection_urls() {
    let appointments = HttpBackend::new(
        ItemKind::Appointment,
        "http://localhost:3000/api/",
        Duration::from_secs(1),
        None,
        offset!(UTC),
    );
    assert_eq!(
        appointments.list_url(),
        "http://localhost:3000/api/citas?estado=Pendiente,Activo"
    );
    assert_eq!(
        appointments.status_url("42"),
        "http://localhost:3000/api/citas/42/estado"
    );

    let events = HttpBackend::new(
        ItemKind::Event,
        "http://localhost:3000/api",
        Duration::from_secs(1),
        Some("sid=abc".to_string()),
        offset!(UTC),
    );
    assert_eq!(events.list_url(), "http://localhost:3000/api/eventos?estado=Todos");
}

#[test]
fn http_backend_reports_unreachable_server() {
    let backend = HttpBackend::new(
        ItemKind::Event,
        "http://127.0.0.1:9/api",
        Duration::from_millis(500),
        None,
        offset!(UTC),
    );
    let err = backend
        .fetch_eligible_items()
        .expect_err("nothing listens on the discard port");
    assert!(matches!(err, SourceError::Http(_)));
}

#[test]
fn json_file_source_filters_and_rewrites_status() {
    let path = unique_items_path();
    let items = vec![
        SchedulableItem {
            id: "1".to_string(),
            title: "Dentist".to_string(),
            start_at: datetime!(2025-01-10 10:00 UTC),
            end_at: None,
            lead_minutes: 15,
            repeat_minutes: 0,
            status: ItemStatus::Pending,
        },
        SchedulableItem {
            id: "2".to_string(),
            title: "Old".to_string(),
            start_at: datetime!(2025-01-01 10:00 UTC),
            end_at: None,
            lead_minutes: 0,
            repeat_minutes: 0,
            status: ItemStatus::Archived,
        },
    ];
    std::fs::write(
        &path,
        serde_json::to_string(&items).expect("items serialize"),
    )
    .expect("items file should be written");

    let source = JsonFileSource::new(&path);
    let eligible = source.fetch_eligible_items().expect("fetch");
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].id, "1");

    source
        .set_status("1", ItemStatus::Active)
        .expect("status update");
    let reread = source.read_all().expect("reread");
    assert_eq!(reread[0].status, ItemStatus::Active);
    assert_eq!(reread[1].status, ItemStatus::Archived);

    let err = source
        .set_status("missing", ItemStatus::Active)
        .expect_err("unknown id");
    assert!(matches!(err, SourceError::UnknownItem(id) if id == "missing"));

    let _ = std::fs::remove_file(path);
}

#[test]
fn json_file_source_missing_file_is_io_error() {
    let source = JsonFileSource::new(unique_items_path());
    assert!(matches!(
        source.fetch_eligible_items(),
        Err(SourceError::Io(_))
    ));
}
