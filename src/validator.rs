//! Constraint evaluation against a schema's tables. Full-object mode
//! checks everything including required fields; filter mode covers only
//! the fields present in the filter map and never applies the required
//! check, since a filter is inherently partial.

use crate::record::{FieldKind, FieldRef, Record, ScalarValue};
use crate::schema::Schema;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

const EMAIL_PATTERN: &str = "^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$";

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is fixed"))
}

enum Lookup<'a> {
    /// Field not present in the filter map; nothing to check.
    Skip,
    /// Filter value kind does not match the field kind.
    Mismatch,
    Value(FieldRef<'a>),
}

pub struct Validator;

impl Validator {
    /// Full-object mode. Returns the names of failing fields, in
    /// constraint-table order; a field appears once per failing category.
    /// Empty result means valid. Never mutates the record.
    pub fn validate<T: Record>(rec: &T, schema: &Schema) -> Vec<&'static str> {
        let mut failed = Vec::new();
        for &j in schema.required_fields() {
            let ok = match rec.get(j) {
                Some(FieldRef::Text(s)) => !s.is_empty(),
                Some(FieldRef::I64(v)) => {
                    v != 0 || zero_bound_escape(schema, j) || link_satisfied(rec, schema, j)
                }
                None => true,
            };
            if !ok {
                failed.push(schema.field_name(j));
            }
        }
        check_categories(&mut failed, schema, |j| match rec.get(j) {
            Some(value) => Lookup::Value(value),
            None => Lookup::Skip,
        });
        failed
    }

    /// Filter mode: checks only fields present in the map and skips the
    /// required category. A value whose kind does not match the field
    /// fails that field. Unknown keys are ignored.
    pub fn validate_filters(
        filters: &HashMap<String, ScalarValue>,
        schema: &Schema,
    ) -> Vec<&'static str> {
        let mut failed = Vec::new();
        check_categories(&mut failed, schema, |j| {
            match filters.get(schema.field_name(j)) {
                None => Lookup::Skip,
                Some(value) if value.kind() != schema.fields()[j].kind => Lookup::Mismatch,
                Some(value) => Lookup::Value(value.as_ref()),
            }
        });
        failed
    }
}

/// Zero is an acceptable required value when the field declares zero as
/// its minimum or maximum bound.
fn zero_bound_escape(schema: &Schema, index: usize) -> bool {
    matches!(
        schema.value_bounds_for(index),
        Some((Some(0), _)) | Some((_, Some(0)))
    )
}

/// A required link column is satisfied when its link reference points at
/// a record that already has an identity, even though the raw value is
/// still zero before population.
fn link_satisfied<T: Record>(rec: &T, schema: &Schema, index: usize) -> bool {
    schema
        .link_target_of(index)
        .and_then(|target| rec.linked_id(target))
        .is_some_and(|id| id != 0)
}

fn check_categories<'a, F>(failed: &mut Vec<&'static str>, schema: &Schema, lookup: F)
where
    F: Fn(usize) -> Lookup<'a>,
{
    for &(j, min, max) in schema.length_bounds() {
        match lookup(j) {
            Lookup::Skip => {}
            Lookup::Mismatch => failed.push(schema.field_name(j)),
            Lookup::Value(FieldRef::Text(s)) => {
                let len = s.len() as i64;
                if min.is_some_and(|m| len < m) || max.is_some_and(|m| len > m) {
                    failed.push(schema.field_name(j));
                }
            }
            // Length applies to string fields only.
            Lookup::Value(FieldRef::I64(_)) => {}
        }
    }
    for &(j, min, max) in schema.value_bounds() {
        match lookup(j) {
            Lookup::Skip => {}
            Lookup::Mismatch => failed.push(schema.field_name(j)),
            Lookup::Value(FieldRef::I64(v)) => {
                if min.is_some_and(|m| v < m) || max.is_some_and(|m| v > m) {
                    failed.push(schema.field_name(j));
                }
            }
            Lookup::Value(FieldRef::Text(_)) => {}
        }
    }
    for &j in schema.email_fields() {
        match lookup(j) {
            Lookup::Skip => {}
            Lookup::Mismatch => failed.push(schema.field_name(j)),
            Lookup::Value(FieldRef::Text(s)) => {
                if !email_regex().is_match(s) {
                    failed.push(schema.field_name(j));
                }
            }
            Lookup::Value(FieldRef::I64(_)) => {}
        }
    }
    for (j, re) in schema.regexp_fields() {
        match lookup(*j) {
            Lookup::Skip => {}
            Lookup::Mismatch => failed.push(schema.field_name(*j)),
            Lookup::Value(FieldRef::Text(s)) => {
                if !re.is_match(s) {
                    failed.push(schema.field_name(*j));
                }
            }
            Lookup::Value(FieldRef::I64(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::testutil::{Author, Post};
    use crate::record::{FieldDef, Record};

    fn post_schema() -> Schema {
        Schema::build(Post::TYPE_NAME, Post::fields(), "").unwrap()
    }

    fn valid_post() -> Post {
        Post {
            title: "First post".into(),
            score: 10,
            author_id: 1,
            ..Post::default()
        }
    }

    #[test]
    fn valid_record_passes() {
        let schema = post_schema();
        assert!(Validator::validate(&valid_post(), &schema).is_empty());
    }

    #[test]
    fn required_string_fails_when_empty() {
        let schema = post_schema();
        let mut post = valid_post();
        post.title.clear();
        let failed = Validator::validate(&post, &schema);
        assert!(failed.contains(&"title"));
    }

    #[test]
    fn zero_bound_escapes_required() {
        let schema = post_schema();
        // score is tagged valmin:0, so zero passes the range check; it is
        // not required so only the required author_id matters here.
        let mut post = valid_post();
        post.score = 0;
        assert!(Validator::validate(&post, &schema).is_empty());

        // author_id is required with no zero bound: zero fails unless the
        // link is satisfied.
        post.author_id = 0;
        let failed = Validator::validate(&post, &schema);
        assert_eq!(failed, vec!["author_id"]);
    }

    #[test]
    fn zero_minimum_escapes_required_numeric() {
        const FIELDS: &[FieldDef] = &[
            FieldDef {
                name: "id",
                kind: FieldKind::I64,
                tag: "",
            },
            FieldDef {
                name: "qty",
                kind: FieldKind::I64,
                tag: "req valmin:0 valmax:999",
            },
            FieldDef {
                name: "age",
                kind: FieldKind::I64,
                tag: "req",
            },
        ];

        #[derive(Default)]
        struct Stock {
            id: i64,
            qty: i64,
            age: i64,
        }

        impl Record for Stock {
            const TYPE_NAME: &'static str = "Stock";
            fn fields() -> &'static [FieldDef] {
                FIELDS
            }
            fn id(&self) -> i64 {
                self.id
            }
            fn id_mut(&mut self) -> &mut i64 {
                &mut self.id
            }
            fn get(&self, index: usize) -> Option<FieldRef<'_>> {
                match index {
                    0 => Some(FieldRef::I64(self.id)),
                    1 => Some(FieldRef::I64(self.qty)),
                    2 => Some(FieldRef::I64(self.age)),
                    _ => None,
                }
            }
            fn slots(&mut self) -> Vec<crate::record::FieldSlot<'_>> {
                vec![
                    crate::record::FieldSlot::I64(&mut self.qty),
                    crate::record::FieldSlot::I64(&mut self.age),
                ]
            }
            fn linked_id(&self, _index: usize) -> Option<i64> {
                None
            }
            fn clear_links(&mut self) {}
        }

        let schema = Schema::build(Stock::TYPE_NAME, Stock::fields(), "").unwrap();
        let stock = Stock {
            age: 5,
            ..Stock::default()
        };
        // qty is zero but declares valmin:0: not a required failure.
        assert!(Validator::validate(&stock, &schema).is_empty());

        // age is zero with no zero bound: required failure.
        let stock = Stock {
            qty: 1,
            ..Stock::default()
        };
        let failed = Validator::validate(&stock, &schema);
        assert_eq!(failed, vec!["age"]);
    }

    #[test]
    fn satisfied_link_escapes_required() {
        let schema = post_schema();
        let mut post = valid_post();
        post.author_id = 0;
        post.author = Some(Author {
            id: 7,
            name: "a".into(),
        });
        assert!(Validator::validate(&post, &schema).is_empty());

        // A reference without an identity does not satisfy the link.
        post.author = Some(Author::default());
        let failed = Validator::validate(&post, &schema);
        assert_eq!(failed, vec!["author_id"]);
    }

    #[test]
    fn length_and_range_checks() {
        let schema = post_schema();
        let mut post = valid_post();
        post.title = "ab".into();
        assert_eq!(Validator::validate(&post, &schema), vec!["title"]);

        post.title = "a".repeat(101);
        assert_eq!(Validator::validate(&post, &schema), vec!["title"]);

        let mut post = valid_post();
        post.score = 101;
        assert_eq!(Validator::validate(&post, &schema), vec!["score"]);
        post.score = -1;
        assert_eq!(Validator::validate(&post, &schema), vec!["score"]);
    }

    #[test]
    fn email_and_pattern_checks() {
        use crate::record::FieldSlot;

        const FIELDS: &[FieldDef] = &[
            FieldDef {
                name: "id",
                kind: FieldKind::I64,
                tag: "",
            },
            FieldDef {
                name: "email",
                kind: FieldKind::Text,
                tag: "req email",
            },
            FieldDef {
                name: "post_code",
                kind: FieldKind::Text,
                tag: "req lenmin:6 regexp:^[0-9]{2}-[0-9]{3}$",
            },
        ];

        #[derive(Default)]
        struct Contact {
            id: i64,
            email: String,
            post_code: String,
        }

        impl Record for Contact {
            const TYPE_NAME: &'static str = "Contact";
            fn fields() -> &'static [FieldDef] {
                FIELDS
            }
            fn id(&self) -> i64 {
                self.id
            }
            fn id_mut(&mut self) -> &mut i64 {
                &mut self.id
            }
            fn get(&self, index: usize) -> Option<FieldRef<'_>> {
                match index {
                    0 => Some(FieldRef::I64(self.id)),
                    1 => Some(FieldRef::Text(&self.email)),
                    2 => Some(FieldRef::Text(&self.post_code)),
                    _ => None,
                }
            }
            fn slots(&mut self) -> Vec<FieldSlot<'_>> {
                vec![
                    FieldSlot::Text(&mut self.email),
                    FieldSlot::Text(&mut self.post_code),
                ]
            }
            fn linked_id(&self, _index: usize) -> Option<i64> {
                None
            }
            fn clear_links(&mut self) {}
        }

        let schema = Schema::build(Contact::TYPE_NAME, Contact::fields(), "").unwrap();
        let contact = Contact {
            email: "a@b.com".into(),
            post_code: "66-112".into(),
            ..Contact::default()
        };
        assert!(Validator::validate(&contact, &schema).is_empty());

        let contact = Contact {
            email: "not-an-email".into(),
            post_code: "66112".into(),
            ..Contact::default()
        };
        let failed = Validator::validate(&contact, &schema);
        assert!(failed.contains(&"email"));
        assert!(failed.contains(&"post_code"));
    }

    #[test]
    fn filter_mode_skips_required_and_absent_fields() {
        let schema = post_schema();
        // Empty filter map: nothing fails, even though title and
        // author_id are required.
        assert!(Validator::validate_filters(&HashMap::new(), &schema).is_empty());

        let mut filters = HashMap::new();
        filters.insert("score".to_string(), ScalarValue::I64(50));
        assert!(Validator::validate_filters(&filters, &schema).is_empty());

        filters.insert("score".to_string(), ScalarValue::I64(500));
        assert_eq!(
            Validator::validate_filters(&filters, &schema),
            vec!["score"]
        );
    }

    #[test]
    fn filter_kind_mismatch_fails_the_field() {
        let schema = post_schema();
        let mut filters = HashMap::new();
        filters.insert("score".to_string(), ScalarValue::Text("high".to_string()));
        assert_eq!(
            Validator::validate_filters(&filters, &schema),
            vec!["score"]
        );
    }

    #[test]
    fn multiple_category_failures_repeat_the_field() {
        let schema = post_schema();
        let mut post = valid_post();
        post.title.clear(); // required + lenmin
        let failed = Validator::validate(&post, &schema);
        assert_eq!(failed.iter().filter(|f| **f == "title").count(), 2);
    }
}
