//! Reconciliation engine
//!
//! Folds remote snapshots into the local vote store without any user
//! action. The last snapshot to arrive always wins: there is no merging
//! with local increments that the remote has not seen yet.

use serde_json::Value;
use tracing::debug;
use unconf_common::{Category, Result};

use crate::snapshot::{decode_selection, decode_tally, selection_from_patch};
use crate::store::LocalVoteStore;
use crate::view::{MarkerToggle, VotedMarkers};

/// Overwrite local tallies with an aggregate snapshot
///
/// Every category present in the snapshot replaces the local one
/// wholesale; absent categories are untouched. Returns the categories
/// that were replaced.
pub fn fold_aggregate(store: &mut LocalVoteStore, snapshot: &Value) -> Result<Vec<Category>> {
    let patch = decode_tally(store.catalog(), snapshot)?;
    let categories: Vec<Category> = patch.keys().copied().collect();

    for (category, counts) in patch {
        store.replace_tally(category, counts);
    }

    debug!("Folded aggregate snapshot into {:?}", categories);
    Ok(categories)
}

/// Replace the local selection with this client's own remote record
///
/// A `null` snapshot means no record exists remotely yet, which leaves the
/// local selection alone. Returns the marker toggles needed to move the
/// view from `markers` to the restored selection, and updates `markers`.
pub fn fold_selection(
    store: &mut LocalVoteStore,
    markers: &mut VotedMarkers,
    snapshot: &Value,
) -> Result<Vec<MarkerToggle>> {
    if snapshot.is_null() {
        debug!("No remote selection record; keeping local selection");
        return Ok(Vec::new());
    }

    let patch = decode_selection(store.catalog(), snapshot)?;
    store.replace_selection(selection_from_patch(patch));

    let restored = VotedMarkers::from_selection(store.selection());
    let toggles = markers.diff(&restored);
    *markers = restored;
    Ok(toggles)
}
