//! Decoding of tally and selection records
//!
//! Records arrive as loosely typed JSON from two places: the on-device
//! store at startup and the remote store's full-value snapshots. Both go
//! through the same normalization so the local invariants hold no matter
//! what another client wrote:
//! - counts are non-negative integers
//! - only catalog sessions appear, and every catalog session appears
//! - a selection names at most one catalog session per category

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use unconf_common::votes::CategoryTally;
use unconf_common::{Catalog, Category, Error, Result, SessionId, UserSelection};

/// Per-category counts present in a tally record
pub type TallyPatch = BTreeMap<Category, CategoryTally>;

/// Per-category choices present in a selection record
pub type SelectionPatch = BTreeMap<Category, Option<SessionId>>;

/// Decode an aggregate tally record
///
/// `null` decodes to an empty patch. Categories absent from the record are
/// absent from the patch; unknown category names are skipped.
pub fn decode_tally(catalog: &Catalog, value: &Value) -> Result<TallyPatch> {
    let object = match value {
        Value::Null => return Ok(TallyPatch::new()),
        Value::Object(object) => object,
        other => {
            return Err(Error::InvalidInput(format!(
                "tally record must be an object, got {}",
                kind(other)
            )))
        }
    };

    let mut patch = TallyPatch::new();
    for (name, counts) in object {
        let Ok(category) = name.parse::<Category>() else {
            debug!("Skipping unknown tally category '{}'", name);
            continue;
        };
        patch.insert(category, decode_category_counts(catalog, category, counts));
    }
    Ok(patch)
}

/// Normalize one category's counts onto the full catalog
fn decode_category_counts(catalog: &Catalog, category: Category, value: &Value) -> CategoryTally {
    let mut counts: CategoryTally = catalog.ids().map(|id| (id.clone(), 0)).collect();

    let Some(object) = value.as_object() else {
        if !value.is_null() {
            warn!("Tally for '{}' is not an object; treating as all zero", category);
        }
        return counts;
    };

    for (session, raw) in object {
        let Some(slot) = counts.get_mut(session.as_str()) else {
            warn!("Dropping tally for unknown session '{}' in '{}'", session, category);
            continue;
        };
        *slot = match raw.as_i64() {
            Some(n) if n >= 0 => n as u64,
            Some(n) => {
                warn!("Clamping negative tally {} for '{}' in '{}'", n, session, category);
                0
            }
            None => match raw.as_u64() {
                Some(n) => n,
                None => {
                    warn!("Ignoring non-integer tally for '{}' in '{}'", session, category);
                    0
                }
            },
        };
    }
    counts
}

/// Decode a selection record
///
/// Values other than a catalog session id string decode to "no vote".
pub fn decode_selection(catalog: &Catalog, value: &Value) -> Result<SelectionPatch> {
    let object = match value {
        Value::Null => return Ok(SelectionPatch::new()),
        Value::Object(object) => object,
        other => {
            return Err(Error::InvalidInput(format!(
                "selection record must be an object, got {}",
                kind(other)
            )))
        }
    };

    let mut patch = SelectionPatch::new();
    for (name, choice) in object {
        let Ok(category) = name.parse::<Category>() else {
            debug!("Skipping unknown selection category '{}'", name);
            continue;
        };
        let session = match choice {
            Value::String(id) => match catalog.resolve(id) {
                Ok(id) => Some(id.clone()),
                Err(_) => {
                    warn!("Dropping selection of unknown session '{}' in '{}'", id, category);
                    None
                }
            },
            Value::Null => None,
            other => {
                warn!("Ignoring {} selection in '{}'", kind(other), category);
                None
            }
        };
        patch.insert(category, session);
    }
    Ok(patch)
}

/// Build a full selection from a patch, categories missing from the patch
/// being "no vote"
pub fn selection_from_patch(patch: SelectionPatch) -> UserSelection {
    let mut selection = UserSelection::default();
    for (category, session) in patch {
        if let Some(session) = session {
            selection.set(category, session);
        }
    }
    selection
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
