//! Record CRUD handlers: create, read, update, delete, list. All generic
//! over the record type; the route builder monomorphizes one set per
//! registered type.

use crate::controller::ListParams;
use crate::error::Error;
use crate::record::{FieldKind, Record, ScalarValue};
use crate::response::{id_payload, MetaCount, SuccessMany, SuccessOne};
use crate::schema::OrderDirection;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Path ids are decimal and non-negative; everything else is a 400.
fn parse_id(raw: &str) -> Result<i64, Error> {
    let id: i64 = raw
        .parse()
        .map_err(|_| Error::BadRequest("invalid id".into()))?;
    if id < 0 {
        return Err(Error::BadRequest("invalid id".into()));
    }
    Ok(id)
}

/// Overlay a JSON object onto a record: keys present in the body replace
/// the record's serialized fields, absent keys keep their current values.
/// This is how PUT gets its merge semantics for both create (merge over a
/// default instance) and update (merge over the loaded row).
fn merge_record<T>(base: &T, body: Value) -> Result<T, Error>
where
    T: Record + Serialize + DeserializeOwned,
{
    let Value::Object(patch) = body else {
        return Err(Error::BadRequest("body must be a JSON object".into()));
    };
    let mut merged =
        serde_json::to_value(base).map_err(|e| Error::BadRequest(e.to_string()))?;
    let Value::Object(map) = &mut merged else {
        return Err(Error::BadRequest("record is not a JSON object".into()));
    };
    for (k, v) in patch {
        map.insert(k, v);
    }
    serde_json::from_value(merged)
        .map_err(|e| Error::BadRequest(format!("invalid payload: {}", e)))
}

pub async fn create<T>(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl axum::response::IntoResponse, Error>
where
    T: Record + Serialize + DeserializeOwned,
{
    let mut rec = merge_record(&T::default(), body)?;
    *rec.id_mut() = 0;
    state.controller.save(&mut rec).await?;
    Ok((
        StatusCode::OK,
        Json(SuccessOne {
            data: id_payload(rec.id()),
            meta: None,
        }),
    ))
}

pub async fn read<T>(
    State(state): State<AppState>,
    Path(id_raw): Path<String>,
) -> Result<impl axum::response::IntoResponse, Error>
where
    T: Record + Serialize + DeserializeOwned,
{
    let id = parse_id(&id_raw)?;
    let mut rec = T::default();
    if !state.controller.load(&mut rec, id).await? {
        return Err(Error::NotFound(id_raw));
    }
    Ok((
        StatusCode::OK,
        Json(SuccessOne {
            data: rec,
            meta: None,
        }),
    ))
}

pub async fn update<T>(
    State(state): State<AppState>,
    Path(id_raw): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl axum::response::IntoResponse, Error>
where
    T: Record + Serialize + DeserializeOwned,
{
    let id = parse_id(&id_raw)?;
    let mut current = T::default();
    if !state.controller.load(&mut current, id).await? {
        return Err(Error::NotFound(id_raw));
    }
    let mut rec = merge_record(&current, body)?;
    // The path id is authoritative, whatever the body carried.
    *rec.id_mut() = id;
    state.controller.save(&mut rec).await?;
    Ok((
        StatusCode::OK,
        Json(SuccessOne {
            data: id_payload(id),
            meta: None,
        }),
    ))
}

pub async fn delete<T>(
    State(state): State<AppState>,
    Path(id_raw): Path<String>,
) -> Result<impl axum::response::IntoResponse, Error>
where
    T: Record + Serialize + DeserializeOwned,
{
    let id = parse_id(&id_raw)?;
    let mut rec = T::default();
    if !state.controller.load(&mut rec, id).await? {
        return Err(Error::NotFound(id_raw));
    }
    state.controller.delete(&mut rec).await?;
    Ok((
        StatusCode::OK,
        Json(SuccessOne {
            data: id_payload(id),
            meta: None,
        }),
    ))
}

pub async fn list<T>(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl axum::response::IntoResponse, Error>
where
    T: Record + Serialize + DeserializeOwned,
{
    let schema = state.controller.schema::<T>()?;

    let mut list_params = ListParams {
        limit: 10,
        ..ListParams::default()
    };
    let mut order_field: Option<String> = None;
    let mut order_direction = String::new();

    for (key, value) in params {
        match key.as_str() {
            "limit" => {
                if let Ok(n) = value.parse::<i64>() {
                    if n > 0 {
                        list_params.limit = n;
                    }
                }
            }
            "offset" => {
                if let Ok(n) = value.parse::<i64>() {
                    if n > 0 {
                        list_params.offset = n;
                    }
                }
            }
            "order" => order_field = Some(value),
            "order_direction" => order_direction = value,
            _ => {
                let Some(field) = key.strip_prefix("filter_") else {
                    continue;
                };
                // Unknown filter names are ignored; a value that does not
                // parse for the field's kind is a 400.
                let Some(kind) = schema.field_kind(field) else {
                    continue;
                };
                let parsed = match kind {
                    FieldKind::I64 => ScalarValue::I64(value.parse().map_err(|_| {
                        Error::BadRequest(format!("invalid filter value for '{}'", field))
                    })?),
                    FieldKind::Text => ScalarValue::Text(value),
                    FieldKind::Link => continue,
                };
                list_params.filters.insert(field.to_string(), parsed);
            }
        }
    }
    if let Some(field) = order_field {
        list_params
            .order
            .push((field, OrderDirection::parse(&order_direction)));
    }

    let rows = state.controller.list::<T>(&list_params).await?;
    let count = rows.len() as u64;
    Ok((
        StatusCode::OK,
        Json(SuccessMany {
            data: rows,
            meta: MetaCount { count },
        }),
    ))
}
