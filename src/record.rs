//! Record descriptor and generic field access. The descriptor is a
//! compile-time table emitted by `#[derive(Record)]`; everything the
//! schema build and the controller do with a record goes through it, so
//! no per-type query or scan code is ever written by hand.

use crate::schema::Schema;

/// What a field maps to. `I64` and `Text` are persistable scalar columns;
/// `Link` is a reference to another record type, used only to populate a
/// foreign-key column and excluded from column mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    I64,
    Text,
    Link,
}

/// One field of a record type, in declaration order. `tag` is the verbatim
/// `#[crud("...")]` string; it is parsed when the schema is built.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub tag: &'static str,
}

/// Read-only view of one scalar field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRef<'a> {
    I64(i64),
    Text(&'a str),
}

/// Mutable slot for one scalar field, used to bind query parameters and to
/// receive scanned row values.
#[derive(Debug)]
pub enum FieldSlot<'a> {
    I64(&'a mut i64),
    Text(&'a mut String),
}

/// Owned scalar value, used for list-query filters and bound parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarValue {
    I64(i64),
    Text(String),
}

impl ScalarValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            ScalarValue::I64(_) => FieldKind::I64,
            ScalarValue::Text(_) => FieldKind::Text,
        }
    }

    pub fn as_ref(&self) -> FieldRef<'_> {
        match self {
            ScalarValue::I64(v) => FieldRef::I64(*v),
            ScalarValue::Text(s) => FieldRef::Text(s),
        }
    }
}

/// A persistable record type. Implemented by `#[derive(Record)]`.
///
/// The identity field is `id: i64` and must be declared first. A field
/// named `flags: i64` gets the reserved `<prefix>_flags` column. `slots`
/// returns the persistable fields (identity excluded) in declaration
/// order; the schema build relies on that ordering when it numbers
/// insert/update placeholders, so the two can never drift apart.
pub trait Record: Default + Send + Sync + 'static {
    const TYPE_NAME: &'static str;

    fn fields() -> &'static [FieldDef];

    fn id(&self) -> i64;
    fn id_mut(&mut self) -> &mut i64;

    /// Read one scalar field by descriptor index. `None` for link fields.
    fn get(&self, index: usize) -> Option<FieldRef<'_>>;

    /// Mutable slots for every persistable field except the identity, in
    /// declaration order.
    fn slots(&mut self) -> Vec<FieldSlot<'_>>;

    /// Identity of the record referenced by the link field at `index`, if
    /// the reference is set. `None` for non-link fields.
    fn linked_id(&self, index: usize) -> Option<i64>;

    /// Drop every link-field reference.
    fn clear_links(&mut self);

    /// Zero the identity and every persistable field, and clear links.
    /// Used after delete and to represent "not found" after a failed load.
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Copy each satisfied link target's identity into its source column
/// field: assigning `session.user = Some(user)` makes `session.user_id`
/// follow on the next save, without managing the foreign key by hand.
/// References that are unset, or whose record has no identity yet, leave
/// the source field untouched.
pub fn populate_links<T: Record>(rec: &mut T, schema: &Schema) {
    for &(source, target) in schema.links() {
        let Some(id) = rec.linked_id(target) else {
            continue;
        };
        if id == 0 {
            continue;
        }
        let Some(slot) = schema.slot_index(source) else {
            continue;
        };
        if let Some(FieldSlot::I64(v)) = rec.slots().into_iter().nth(slot) {
            *v = id;
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// Hand-written `Record` impls, mirroring what the derive emits. Used
    /// by the validator and schema tests inside this crate; the derive
    /// itself is exercised by the integration suite.
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Author {
        pub id: i64,
        pub name: String,
    }

    impl Record for Author {
        const TYPE_NAME: &'static str = "Author";

        fn fields() -> &'static [FieldDef] {
            const FIELDS: &[FieldDef] = &[
                FieldDef {
                    name: "id",
                    kind: FieldKind::I64,
                    tag: "",
                },
                FieldDef {
                    name: "name",
                    kind: FieldKind::Text,
                    tag: "req",
                },
            ];
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
                1 => Some(FieldRef::Text(&self.name)),
                _ => None,
            }
        }

        fn slots(&mut self) -> Vec<FieldSlot<'_>> {
            vec![FieldSlot::Text(&mut self.name)]
        }

        fn linked_id(&self, _index: usize) -> Option<i64> {
            None
        }

        fn clear_links(&mut self) {}
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Post {
        pub id: i64,
        pub flags: i64,
        pub title: String,
        pub score: i64,
        pub author_id: i64,
        pub author: Option<Author>,
    }

    impl Record for Post {
        const TYPE_NAME: &'static str = "Post";

        fn fields() -> &'static [FieldDef] {
            const FIELDS: &[FieldDef] = &[
                FieldDef {
                    name: "id",
                    kind: FieldKind::I64,
                    tag: "",
                },
                FieldDef {
                    name: "flags",
                    kind: FieldKind::I64,
                    tag: "",
                },
                FieldDef {
                    name: "title",
                    kind: FieldKind::Text,
                    tag: "req lenmin:3 lenmax:100",
                },
                FieldDef {
                    name: "score",
                    kind: FieldKind::I64,
                    tag: "valmin:0 valmax:100",
                },
                FieldDef {
                    name: "author_id",
                    kind: FieldKind::I64,
                    tag: "req link:author",
                },
                FieldDef {
                    name: "author",
                    kind: FieldKind::Link,
                    tag: "",
                },
            ];
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
                1 => Some(FieldRef::I64(self.flags)),
                2 => Some(FieldRef::Text(&self.title)),
                3 => Some(FieldRef::I64(self.score)),
                4 => Some(FieldRef::I64(self.author_id)),
                _ => None,
            }
        }

        fn slots(&mut self) -> Vec<FieldSlot<'_>> {
            vec![
                FieldSlot::I64(&mut self.flags),
                FieldSlot::Text(&mut self.title),
                FieldSlot::I64(&mut self.score),
                FieldSlot::I64(&mut self.author_id),
            ]
        }

        fn linked_id(&self, index: usize) -> Option<i64> {
            match index {
                5 => self.author.as_ref().map(Record::id),
                _ => None,
            }
        }

        fn clear_links(&mut self) {
            self.author = None;
        }
    }
}
