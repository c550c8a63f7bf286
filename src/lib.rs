//! crudkit: maps record structs to PostgreSQL tables and exposes them as
//! CRUD HTTP endpoints. A record type derives [`Record`]; its schema (table
//! and column names, cached SQL statements, validation rules from the
//! `#[crud("...")]` field tags) is built once on first use and shared by
//! every operation.

pub mod controller;
pub mod error;
pub mod handlers;
pub mod record;
pub mod response;
pub mod routes;
pub mod schema;
pub mod state;
pub mod tag;
pub mod validator;

pub use controller::{Controller, ListParams};
pub use error::{Error, SchemaError, TagError};
pub use record::{
    populate_links, FieldDef, FieldKind, FieldRef, FieldSlot, Record, ScalarValue,
};
pub use response::{id_payload, MetaCount, SuccessMany, SuccessOne};
pub use routes::record_routes;
pub use schema::{ListQuery, OrderDirection, Schema};
pub use state::AppState;
pub use tag::{parse_tag, ParsedTag};
pub use validator::Validator;

pub use crudkit_derive::Record;
