//! Field tables and index declarations.
//!
//! Every keyed document type publishes a table of its persisted fields and
//! how to produce each field's default. Reset helpers only go through that
//! table, so a type's reset declarations can be checked without an instance.

use crate::traits::KeyedDocument;
use errors::DocumentError;

/// A persisted field and the function that restores its default, if any.
pub struct FieldSpec<D> {
    pub name: &'static str,
    pub default: Option<fn(&mut D)>,
}

impl<D> FieldSpec<D> {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            default: None,
        }
    }

    pub const fn with_default(name: &'static str, default: fn(&mut D)) -> Self {
        Self {
            name,
            default: Some(default),
        }
    }
}

/// Ascending index over one or more top-level fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub fields: &'static [&'static str],
    pub unique: bool,
}

impl IndexSpec {
    pub const fn ascending(fields: &'static [&'static str]) -> Self {
        Self {
            fields,
            unique: false,
        }
    }

    pub const fn unique(fields: &'static [&'static str]) -> Self {
        Self {
            fields,
            unique: true,
        }
    }

    /// Name MongoDB would generate for the same key pattern.
    pub fn name(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{}_1", f))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Look up the default producer for every declared reset field.
fn reset_plan<D: KeyedDocument>() -> Result<Vec<fn(&mut D)>, DocumentError> {
    D::RESET_FIELDS
        .iter()
        .map(|&name| {
            let field = D::FIELDS.iter().find(|f| f.name == name).ok_or_else(|| {
                DocumentError::FieldNotFound {
                    field: name.to_string(),
                    document: D::NAME.to_string(),
                }
            })?;
            field.default.ok_or_else(|| DocumentError::NoDefaultDeclared {
                field: name.to_string(),
                document: D::NAME.to_string(),
            })
        })
        .collect()
}

/// Check that every reset field of `D` exists and has a default.
pub fn validate_reset_fields<D: KeyedDocument>() -> Result<(), DocumentError> {
    reset_plan::<D>().map(|_| ())
}

/// Restore every reset field of `doc` to its default, in memory only.
///
/// Nothing is assigned unless every declared field resolves.
pub fn reset_fields_to_default_no_save<D: KeyedDocument>(doc: &mut D) -> Result<(), DocumentError> {
    for reset in reset_plan::<D>()? {
        reset(doc);
    }
    Ok(())
}
