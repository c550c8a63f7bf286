//! Schema: the cached, per-record-type artifact. Built once from the
//! record descriptor, it owns the derived table/column names, the SQL
//! statement templates, and the validation constraint tables. Immutable
//! after construction and safe to share across concurrent requests.

use crate::error::SchemaError;
use crate::record::{FieldDef, FieldKind, ScalarValue};
use crate::tag::parse_tag;
use regex::Regex;
use std::collections::HashMap;

/// A list statement plus its bound values, in matching order.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub sql: String,
    pub params: Vec<ScalarValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }

    /// `desc` (any case) orders descending; everything else ascending.
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("desc") {
            OrderDirection::Desc
        } else {
            OrderDirection::Asc
        }
    }
}

#[derive(Debug)]
pub struct Schema {
    table: String,
    col_prefix: String,
    fields: &'static [FieldDef],
    /// Column name per field index; `None` for link fields.
    columns: Vec<Option<String>>,
    /// Position of each field in the slot list (identity and links `None`).
    slot_of_field: Vec<Option<usize>>,
    field_index: HashMap<&'static str, usize>,

    query_drop_table: String,
    query_create_table: String,
    query_insert: String,
    query_update_by_id: String,
    query_select_by_id: String,
    query_delete_by_id: String,
    query_select_prefix: String,

    required: Vec<usize>,
    length: Vec<(usize, Option<i64>, Option<i64>)>,
    bounds: Vec<(usize, Option<i64>, Option<i64>)>,
    email: Vec<usize>,
    patterns: Vec<(usize, Regex)>,
    /// Resolved `link:` pairs: (source column field, target link field).
    links: Vec<(usize, usize)>,
}

impl Schema {
    /// Walk the descriptor once and assemble everything. Any tag error,
    /// unresolvable link target, or non-compiling regexp aborts the build;
    /// the record type is unusable until its definition is fixed.
    pub fn build(
        type_name: &str,
        fields: &'static [FieldDef],
        table_prefix: &str,
    ) -> Result<Schema, SchemaError> {
        match fields.first() {
            Some(f) if f.name == "id" && f.kind == FieldKind::I64 => {}
            _ => {
                return Err(SchemaError::MissingIdentity {
                    type_name: type_name.to_string(),
                })
            }
        }

        let col_prefix = underscored(type_name);
        let table = format!("{}{}", table_prefix, pluralized(&col_prefix));

        let mut columns = Vec::with_capacity(fields.len());
        let mut slot_of_field = vec![None; fields.len()];
        let mut field_index = HashMap::with_capacity(fields.len());

        let mut create_cols = String::new();
        let mut select_cols = String::new();
        let mut update_cols = String::new();
        let mut insert_cols = String::new();
        let mut insert_vals = String::new();
        let mut placeholder = 0usize;
        let mut slot_count = 0usize;

        let mut required = Vec::new();
        let mut length = Vec::new();
        let mut bounds = Vec::new();
        let mut email = Vec::new();
        let mut patterns = Vec::new();
        let mut links = Vec::new();

        for (j, field) in fields.iter().enumerate() {
            field_index.insert(field.name, j);
            if field.kind == FieldKind::Link {
                columns.push(None);
                continue;
            }

            let tag = parse_tag(field.tag).map_err(|source| SchemaError::Tag {
                field: field.name,
                source,
            })?;
            if tag.required {
                required.push(j);
            }
            if tag.email {
                email.push(j);
            }
            if tag.len_min.is_some() || tag.len_max.is_some() {
                length.push((j, tag.len_min, tag.len_max));
            }
            if tag.val_min.is_some() || tag.val_max.is_some() {
                bounds.push((j, tag.val_min, tag.val_max));
            }
            if !tag.pattern.is_empty() {
                let re = Regex::new(&tag.pattern).map_err(|e| SchemaError::Pattern {
                    field: field.name,
                    message: e.to_string(),
                })?;
                patterns.push((j, re));
            }
            if !tag.link.is_empty() {
                let target = fields
                    .iter()
                    .position(|t| t.name == tag.link && t.kind == FieldKind::Link)
                    .ok_or_else(|| SchemaError::UnresolvedLink {
                        field: field.name,
                        target: tag.link.clone(),
                    })?;
                links.push((j, target));
            }

            let col = if field.name == "id" {
                format!("{}_id", col_prefix)
            } else if field.name == "flags" {
                format!("{}_flags", col_prefix)
            } else {
                underscored(field.name)
            };
            let mut ddl = if field.name == "id" {
                "SERIAL PRIMARY KEY".to_string()
            } else if field.name == "flags" {
                "BIGINT DEFAULT 0".to_string()
            } else {
                match field.kind {
                    FieldKind::I64 => "BIGINT DEFAULT 0",
                    _ => "VARCHAR(255) DEFAULT ''",
                }
                .to_string()
            };
            if tag.unique {
                ddl.push_str(" UNIQUE");
            }

            push_comma(&mut create_cols, &format!("{} {}", col, ddl));
            push_comma(&mut select_cols, &col);
            if field.name != "id" {
                placeholder += 1;
                push_comma(&mut update_cols, &format!("{}=${}", col, placeholder));
                push_comma(&mut insert_cols, &col);
                push_comma(&mut insert_vals, &format!("${}", placeholder));
                slot_of_field[j] = Some(slot_count);
                slot_count += 1;
            }
            columns.push(Some(col));
        }

        let id_col = format!("{}_id", col_prefix);
        Ok(Schema {
            query_drop_table: format!("DROP TABLE IF EXISTS {}", table),
            query_create_table: format!("CREATE TABLE {} ({})", table, create_cols),
            query_insert: format!(
                "INSERT INTO {}({}) VALUES ({}) RETURNING {}",
                table, insert_cols, insert_vals, id_col
            ),
            query_update_by_id: format!(
                "UPDATE {} SET {} WHERE {} = ${}",
                table,
                update_cols,
                id_col,
                placeholder + 1
            ),
            query_select_by_id: format!(
                "SELECT {} FROM {} WHERE {} = $1",
                select_cols, table, id_col
            ),
            query_delete_by_id: format!("DELETE FROM {} WHERE {} = $1", table, id_col),
            query_select_prefix: format!("SELECT {} FROM {}", select_cols, table),
            table,
            col_prefix,
            fields,
            columns,
            slot_of_field,
            field_index,
            required,
            length,
            bounds,
            email,
            patterns,
            links,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column_prefix(&self) -> &str {
        &self.col_prefix
    }

    pub fn fields(&self) -> &'static [FieldDef] {
        self.fields
    }

    pub fn query_drop_table(&self) -> &str {
        &self.query_drop_table
    }

    pub fn query_create_table(&self) -> &str {
        &self.query_create_table
    }

    pub fn query_insert(&self) -> &str {
        &self.query_insert
    }

    pub fn query_update_by_id(&self) -> &str {
        &self.query_update_by_id
    }

    pub fn query_select_by_id(&self) -> &str {
        &self.query_select_by_id
    }

    pub fn query_delete_by_id(&self) -> &str {
        &self.query_delete_by_id
    }

    /// `SELECT <cols> FROM <table>` without any clauses; the list builder
    /// appends WHERE/ORDER BY/LIMIT/OFFSET per request.
    pub fn query_select_prefix(&self) -> &str {
        &self.query_select_prefix
    }

    pub fn field_name(&self, index: usize) -> &'static str {
        self.fields[index].name
    }

    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.field_index.get(name).map(|&j| self.fields[j].kind)
    }

    /// Column for a field name; `None` for unknown or link fields.
    pub fn column_for(&self, name: &str) -> Option<&str> {
        let &j = self.field_index.get(name)?;
        self.columns[j].as_deref()
    }

    /// Position of a field in the slot list (identity and links have none).
    pub fn slot_index(&self, index: usize) -> Option<usize> {
        self.slot_of_field.get(index).copied().flatten()
    }

    pub fn links(&self) -> &[(usize, usize)] {
        &self.links
    }

    /// Target link field for a source column field, if any.
    pub fn link_target_of(&self, source: usize) -> Option<usize> {
        self.links
            .iter()
            .find(|(s, _)| *s == source)
            .map(|&(_, t)| t)
    }

    pub fn required_fields(&self) -> &[usize] {
        &self.required
    }

    pub fn length_bounds(&self) -> &[(usize, Option<i64>, Option<i64>)] {
        &self.length
    }

    pub fn value_bounds(&self) -> &[(usize, Option<i64>, Option<i64>)] {
        &self.bounds
    }

    pub fn value_bounds_for(&self, index: usize) -> Option<(Option<i64>, Option<i64>)> {
        self.bounds
            .iter()
            .find(|(j, _, _)| *j == index)
            .map(|&(_, min, max)| (min, max))
    }

    pub fn email_fields(&self) -> &[usize] {
        &self.email
    }

    pub fn regexp_fields(&self) -> &[(usize, Regex)] {
        &self.patterns
    }

    /// Build the list statement. Filters are equality matches keyed by
    /// field name and are applied in column-name order, so the SQL text
    /// and the returned parameter list stay in lockstep no matter how the
    /// caller's map iterates. Unknown filter and order names are skipped.
    pub fn select_query(
        &self,
        order: &[(String, OrderDirection)],
        limit: i64,
        offset: i64,
        filters: &HashMap<String, ScalarValue>,
    ) -> ListQuery {
        let mut sql = self.query_select_prefix.clone();
        let mut params = Vec::new();

        let mut entries: Vec<(&str, &ScalarValue)> = filters
            .iter()
            .filter_map(|(name, value)| self.column_for(name).map(|col| (col, value)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (i, (col, value)) in entries.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            sql.push_str(&format!("{}=${}", col, i + 1));
            params.push((*value).clone());
        }

        let mut order_cols = String::new();
        for (name, dir) in order {
            let Some(col) = self.column_for(name) else {
                continue;
            };
            push_comma(&mut order_cols, &format!("{} {}", col, dir.as_sql()));
        }
        if !order_cols.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_cols);
        }
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if offset > 0 {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        ListQuery { sql, params }
    }
}

fn push_comma(buf: &mut String, part: &str) {
    if !buf.is_empty() {
        buf.push(',');
    }
    buf.push_str(part);
}

/// `_` before each uppercase letter, lowercased, except that a `D`
/// directly after an `I` continues the run so identifiers ending in `ID`
/// render as `_id` rather than `_i_d`.
pub(crate) fn underscored(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev = '\0';
    for (i, ch) in name.chars().enumerate() {
        if i == 0 {
            out.extend(ch.to_lowercase());
        } else if ch.is_uppercase() {
            if prev == 'I' && ch == 'D' {
                out.extend(ch.to_lowercase());
            } else {
                out.push('_');
                out.extend(ch.to_lowercase());
            }
        } else {
            out.push(ch);
        }
        prev = ch;
    }
    out
}

/// Trailing `y` becomes `ies`, trailing `s` gains `es`, everything else
/// gains `s`.
pub(crate) fn pluralized(name: &str) -> String {
    if let Some(stem) = name.strip_suffix('y') {
        format!("{}ies", stem)
    } else if name.ends_with('s') {
        format!("{}es", name)
    } else {
        format!("{}s", name)
    }
}
