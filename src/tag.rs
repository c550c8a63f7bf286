//! Field tag parsing. Each persistable field may carry a space-separated
//! tag describing its validation rules and column traits:
//! `req email uniq lenmin:N lenmax:N valmin:N valmax:N regexp:P link:Field`.

use crate::error::TagError;

/// Parsed form of one field tag. Absent bounds are `None`; `Some(0)` is a
/// real bound, which is what lets a required numeric field legitimately
/// hold zero (see the validator's required check).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedTag {
    pub required: bool,
    pub email: bool,
    pub unique: bool,
    pub len_min: Option<i64>,
    pub len_max: Option<i64>,
    pub val_min: Option<i64>,
    pub val_max: Option<i64>,
    pub pattern: String,
    pub link: String,
}

/// Parse a tag string. Pure; stops at the first malformed token.
/// Unrecognized tokens are ignored. An empty tag yields the all-default
/// ("no constraint") result.
pub fn parse_tag(tag: &str) -> Result<ParsedTag, TagError> {
    let mut out = ParsedTag::default();
    if tag.is_empty() {
        return Ok(out);
    }
    for token in tag.split(' ') {
        match token {
            "req" => out.required = true,
            "email" => out.email = true,
            "uniq" => out.unique = true,
            _ => {
                if let Some(rest) = token.strip_prefix("lenmin:") {
                    out.len_min = Some(parse_bound("lenmin", rest)?);
                } else if let Some(rest) = token.strip_prefix("lenmax:") {
                    out.len_max = Some(parse_bound("lenmax", rest)?);
                } else if let Some(rest) = token.strip_prefix("valmin:") {
                    out.val_min = Some(parse_bound("valmin", rest)?);
                } else if let Some(rest) = token.strip_prefix("valmax:") {
                    out.val_max = Some(parse_bound("valmax", rest)?);
                } else if let Some(rest) = token.strip_prefix("regexp:") {
                    // Captured verbatim; compiled by the schema build.
                    out.pattern = rest.to_string();
                } else if let Some(rest) = token.strip_prefix("link:") {
                    if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_alphanumeric()) {
                        return Err(TagError::BadLink {
                            value: rest.to_string(),
                        });
                    }
                    out.link = rest.to_string();
                }
            }
        }
    }
    Ok(out)
}

fn parse_bound(token: &'static str, raw: &str) -> Result<i64, TagError> {
    raw.parse().map_err(|_| TagError::BadInt {
        token,
        value: raw.to_string(),
    })
}
