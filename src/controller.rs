//! Generic CRUD execution against PostgreSQL. The controller owns the
//! injected pool, the table prefix, and the per-type schema registry;
//! every operation goes through the cached schema and the record's slot
//! accessors, so no per-type SQL or scan code exists anywhere.

use crate::error::{Error, SchemaError};
use crate::record::{populate_links, FieldKind, FieldRef, FieldSlot, Record, ScalarValue};
use crate::schema::{ListQuery, OrderDirection, Schema};
use crate::validator::Validator;
use sqlx::postgres::PgRow;
use sqlx::PgPool;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// List operation parameters: equality filters, ordering, paging.
/// `limit <= 0` means no limit, `offset <= 0` no offset.
#[derive(Debug, Default, Clone)]
pub struct ListParams {
    pub order: Vec<(String, OrderDirection)>,
    pub limit: i64,
    pub offset: i64,
    pub filters: HashMap<String, ScalarValue>,
}

pub struct Controller {
    pool: PgPool,
    table_prefix: String,
    schemas: RwLock<HashMap<TypeId, Result<Arc<Schema>, SchemaError>>>,
}

impl Controller {
    pub fn new(pool: PgPool, table_prefix: impl Into<String>) -> Self {
        Controller {
            pool,
            table_prefix: table_prefix.into(),
            schemas: RwLock::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Schema for a record type, built on first use and cached for the
    /// controller's lifetime. A failed build is cached too: the
    /// descriptor is compiled into the binary, so retrying cannot
    /// produce a different outcome.
    pub fn schema<T: Record>(&self) -> Result<Arc<Schema>, Error> {
        let key = TypeId::of::<T>();
        if let Some(entry) = self
            .schemas
            .read()
            .expect("schema registry lock poisoned")
            .get(&key)
        {
            return entry.clone().map_err(Error::Schema);
        }
        let mut schemas = self.schemas.write().expect("schema registry lock poisoned");
        let entry = schemas.entry(key).or_insert_with(|| {
            Schema::build(T::TYPE_NAME, T::fields(), &self.table_prefix).map(Arc::new)
        });
        entry.clone().map_err(Error::Schema)
    }

    pub async fn create_table<T: Record>(&self) -> Result<(), Error> {
        let schema = self.schema::<T>()?;
        self.execute(schema.query_create_table()).await
    }

    pub async fn drop_table<T: Record>(&self) -> Result<(), Error> {
        let schema = self.schema::<T>()?;
        self.execute(schema.query_drop_table()).await
    }

    /// Validate and persist. A record with a non-zero identity is assumed
    /// to exist and is updated in place; otherwise it is inserted and the
    /// database-generated identity is written back into the record.
    /// Satisfied link references populate their foreign-key fields first.
    pub async fn save<T: Record>(&self, rec: &mut T) -> Result<(), Error> {
        let schema = self.schema::<T>()?;
        populate_links(rec, &schema);
        let failed = Validator::validate(rec, &schema);
        if !failed.is_empty() {
            return Err(Error::Validation(failed));
        }

        let values = field_values(rec);
        if rec.id() != 0 {
            let sql = schema.query_update_by_id();
            tracing::debug!(sql = %sql, id = rec.id(), "update");
            let mut query = sqlx::query(sql);
            for value in &values {
                query = match value {
                    ScalarValue::I64(v) => query.bind(*v),
                    ScalarValue::Text(s) => query.bind(s.clone()),
                };
            }
            query.bind(rec.id()).execute(&self.pool).await?;
        } else {
            let sql = schema.query_insert();
            tracing::debug!(sql = %sql, "insert");
            let mut query = sqlx::query_scalar::<_, i64>(sql);
            for value in &values {
                query = match value {
                    ScalarValue::I64(v) => query.bind(*v),
                    ScalarValue::Text(s) => query.bind(s.clone()),
                };
            }
            let id = query.fetch_one(&self.pool).await?;
            *rec.id_mut() = id;
        }
        Ok(())
    }

    /// Fill the record from the row with the given identity. A missing
    /// row is a normal outcome: the record is reset to zero values and
    /// `false` is returned.
    pub async fn load<T: Record>(&self, rec: &mut T, id: i64) -> Result<bool, Error> {
        let schema = self.schema::<T>()?;
        let sql = schema.query_select_by_id();
        tracing::debug!(sql = %sql, id, "select");
        let row = sqlx::query(sql).bind(id).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => {
                read_row_into(rec, &row)?;
                Ok(true)
            }
            None => {
                rec.reset();
                Ok(false)
            }
        }
    }

    /// Delete the record's row, then reset the record. Does nothing when
    /// the identity is zero.
    pub async fn delete<T: Record>(&self, rec: &mut T) -> Result<(), Error> {
        if rec.id() == 0 {
            return Ok(());
        }
        let schema = self.schema::<T>()?;
        let sql = schema.query_delete_by_id();
        tracing::debug!(sql = %sql, id = rec.id(), "delete");
        sqlx::query(sql).bind(rec.id()).execute(&self.pool).await?;
        rec.reset();
        Ok(())
    }

    /// List rows matching the filters. Filters are validated in filter
    /// mode first; a failing filter value surfaces as a validation error.
    pub async fn list<T: Record>(&self, params: &ListParams) -> Result<Vec<T>, Error> {
        let schema = self.schema::<T>()?;
        let failed = Validator::validate_filters(&params.filters, &schema);
        if !failed.is_empty() {
            return Err(Error::Validation(failed));
        }

        let ListQuery { sql, params: bound } =
            schema.select_query(&params.order, params.limit, params.offset, &params.filters);
        tracing::debug!(sql = %sql, params = ?bound, "list");
        let mut query = sqlx::query(&sql);
        for value in &bound {
            query = match value {
                ScalarValue::I64(v) => query.bind(*v),
                ScalarValue::Text(s) => query.bind(s.clone()),
            };
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut rec = T::default();
            read_row_into(&mut rec, row)?;
            out.push(rec);
        }
        Ok(out)
    }

    async fn execute(&self, sql: &str) -> Result<(), Error> {
        tracing::debug!(sql = %sql, "execute");
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }
}

/// Current values of the persistable fields (identity excluded), in the
/// column order the cached insert/update statements were built with.
fn field_values<T: Record>(rec: &T) -> Vec<ScalarValue> {
    T::fields()
        .iter()
        .enumerate()
        .filter(|(j, field)| *j != 0 && field.kind != FieldKind::Link)
        .filter_map(|(j, _)| rec.get(j))
        .map(|value| match value {
            FieldRef::I64(v) => ScalarValue::I64(v),
            FieldRef::Text(s) => ScalarValue::Text(s.to_owned()),
        })
        .collect()
}

/// Scan a row into the record: identity first, then every slot in
/// declaration order, matching the cached select column order.
fn read_row_into<T: Record>(rec: &mut T, row: &PgRow) -> Result<(), Error> {
    use sqlx::Row;
    *rec.id_mut() = row.try_get(0)?;
    for (i, slot) in rec.slots().into_iter().enumerate() {
        match slot {
            FieldSlot::I64(v) => *v = row.try_get(i + 1)?,
            FieldSlot::Text(v) => *v = row.try_get(i + 1)?,
        }
    }
    Ok(())
}
