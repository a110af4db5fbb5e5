use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};
use tracing::warn;

use crate::domain::item::SchedulableItem;
use crate::domain::kind::ItemKind;
use crate::domain::status::ItemStatus;

use super::SourceError;

#[derive(Debug, Clone, Deserialize)]
struct AppointmentRow {
    id: Value,
    #[serde(default)]
    descripcion: Option<String>,
    #[serde(default)]
    fecha: Option<String>,
    #[serde(default)]
    hora: Option<String>,
    #[serde(default, deserialize_with = "lenient_minutes")]
    aviso_anticipado_min: Option<i64>,
    #[serde(default, deserialize_with = "lenient_minutes")]
    recordatorio_cada_min: Option<i64>,
    #[serde(default)]
    estado: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct EventRow {
    id: Value,
    #[serde(default)]
    titulo: Option<String>,
    #[serde(default)]
    inicio: Option<String>,
    #[serde(default)]
    fin: Option<String>,
    #[serde(default, deserialize_with = "lenient_minutes")]
    aviso_min: Option<i64>,
    #[serde(default, deserialize_with = "lenient_minutes")]
    repetir_cada_min: Option<i64>,
    #[serde(default)]
    estado: Option<String>,
}

/// Parses a backend listing. Rows that cannot be scheduled are skipped.
pub fn parse_listing(
    kind: ItemKind,
    body: &str,
    offset: UtcOffset,
) -> Result<Vec<SchedulableItem>, SourceError> {
    let rows: Vec<Value> = serde_json::from_str(body)?;
    Ok(rows
        .into_iter()
        .filter_map(|row| match kind {
            ItemKind::Appointment => appointment_from_row(row, offset),
            ItemKind::Event => event_from_row(row, offset),
        })
        .collect())
}

fn appointment_from_row(row: Value, offset: UtcOffset) -> Option<SchedulableItem> {
    let row: AppointmentRow = match serde_json::from_value(row) {
        Ok(row) => row,
        Err(err) => {
            warn!(error = %err, "skipping malformed appointment row");
            return None;
        }
    };
    let id = row_id(&row.id)?;
    let start_at = row.fecha.as_deref().and_then(|date| {
        // Some drivers serialize DATE columns as a full timestamp.
        let day = date.split('T').next().unwrap_or(date).trim();
        match row.hora.as_deref().map(str::trim).filter(|clock| !clock.is_empty()) {
            Some(clock) => parse_local_instant(&format!("{}T{}", day, clock), offset),
            // No time of day means midnight.
            None => parse_local_instant(day, offset),
        }
    });
    let Some(start_at) = start_at else {
        warn!(item_id = %id, "skipping appointment without a parsable date and time");
        return None;
    };
    let status = row_status(&id, row.estado.as_deref(), ItemStatus::Pending)?;

    Some(SchedulableItem {
        id,
        title: non_empty_or(row.descripcion, "No description"),
        start_at,
        end_at: None,
        lead_minutes: row.aviso_anticipado_min.unwrap_or(0),
        repeat_minutes: row.recordatorio_cada_min.unwrap_or(0),
        status,
    })
}

fn event_from_row(row: Value, offset: UtcOffset) -> Option<SchedulableItem> {
    let row: EventRow = match serde_json::from_value(row) {
        Ok(row) => row,
        Err(err) => {
            warn!(error = %err, "skipping malformed event row");
            return None;
        }
    };
    let id = row_id(&row.id)?;
    let Some(start_at) = row
        .inicio
        .as_deref()
        .and_then(|raw| parse_local_instant(raw, offset))
    else {
        warn!(item_id = %id, "skipping event without a parsable start");
        return None;
    };
    let end_at = row
        .fin
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| parse_local_instant(raw, offset));
    let status = row_status(&id, row.estado.as_deref(), ItemStatus::Active)?;

    Some(SchedulableItem {
        id,
        title: non_empty_or(row.titulo, "Untitled"),
        start_at,
        end_at,
        lead_minutes: row.aviso_min.unwrap_or(0),
        repeat_minutes: row.repetir_cada_min.unwrap_or(0),
        status,
    })
}

/// Minute columns arrive as numbers or numeric strings; blank means unset.
fn lenient_minutes<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let parsed = match &raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => return Ok(None),
        Some(Value::Number(number)) => number.as_i64(),
        Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    match (parsed, raw) {
        (Some(minutes), _) => Ok(Some(minutes)),
        (None, Some(value)) => Err(serde::de::Error::custom(format!(
            "expected a whole number of minutes, got {}",
            value
        ))),
        (None, None) => Ok(None),
    }
}

fn row_id(raw: &Value) -> Option<String> {
    let id = match raw {
        Value::Number(number) => number.to_string(),
        Value::String(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => {
            warn!(id = %raw, "skipping row with an unusable id");
            return None;
        }
    };
    Some(id)
}

fn row_status(id: &str, raw: Option<&str>, fallback: ItemStatus) -> Option<ItemStatus> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Some(fallback),
        Some(value) => match ItemStatus::from_str(value) {
            Ok(status) => Some(status),
            Err(err) => {
                warn!(item_id = %id, error = %err, "skipping row with unknown status");
                None
            }
        },
    }
}

fn non_empty_or(value: Option<String>, fallback: &str) -> String {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Reads RFC 3339 instants as-is and local date-times at `offset`.
pub fn parse_local_instant(raw: &str, offset: UtcOffset) -> Option<OffsetDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(instant) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(instant);
    }

    let normalized = trimmed.replacen(' ', "T", 1);
    let without_fraction = normalized
        .split_once('.')
        .map_or(normalized.as_str(), |(head, _)| head);

    let local = PrimitiveDateTime::parse(
        without_fraction,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            without_fraction,
            format_description!("[year]-[month]-[day]T[hour]:[minute]"),
        )
    })
    .or_else(|_| {
        Date::parse(without_fraction, format_description!("[year]-[month]-[day]"))
            .map(Date::midnight)
    })
    .ok()?;
    Some(local.assume_offset(offset))
}
