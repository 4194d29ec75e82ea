//! Local vote store
//!
//! Owns this client's selection and its mirror of the aggregate tally,
//! and persists both to on-device storage. The store is a plain owned
//! value: the poll event loop holds the only instance, so it needs no
//! locking.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use unconf_common::db::{LocalStorage, USER_VOTES_KEY, VOTES_KEY};
use unconf_common::votes::CategoryTally;
use unconf_common::{Catalog, Category, Error, Result, SessionId, Tally, UserSelection};

use crate::snapshot::{decode_selection, decode_tally, selection_from_patch};

/// Result of applying a vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The session was already this client's selection
    Unchanged,
    /// Selection moved to `current`, releasing `previous` if there was one
    Changed {
        previous: Option<SessionId>,
        current: SessionId,
    },
}

impl VoteOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, VoteOutcome::Changed { .. })
    }
}

pub struct LocalVoteStore {
    catalog: Arc<Catalog>,
    tally: Tally,
    selection: UserSelection,
    storage: LocalStorage,
}

impl LocalVoteStore {
    /// Empty store: zeroed tally, no selection
    pub fn new(catalog: Arc<Catalog>, storage: LocalStorage) -> Self {
        let tally = Tally::zeroed(&catalog);
        Self {
            catalog,
            tally,
            selection: UserSelection::default(),
            storage,
        }
    }

    /// Restore the store from on-device records
    ///
    /// Stored categories overlay the zeroed tally. A record that fails to
    /// decode is logged and ignored; the store starts from defaults for it.
    pub async fn load(catalog: Arc<Catalog>, storage: LocalStorage) -> Result<Self> {
        let mut store = Self::new(catalog, storage);

        if let Some(raw) = store.storage.get_item(VOTES_KEY).await? {
            match serde_json::from_str::<Value>(&raw)
                .map_err(Error::from)
                .and_then(|value| decode_tally(&store.catalog, &value))
            {
                Ok(patch) => {
                    for (category, counts) in patch {
                        store.tally.replace_category(category, counts);
                    }
                }
                Err(e) => warn!("Ignoring unreadable stored tally: {}", e),
            }
        }

        if let Some(raw) = store.storage.get_item(USER_VOTES_KEY).await? {
            match serde_json::from_str::<Value>(&raw)
                .map_err(Error::from)
                .and_then(|value| decode_selection(&store.catalog, &value))
            {
                Ok(patch) => store.selection = selection_from_patch(patch),
                Err(e) => warn!("Ignoring unreadable stored selection: {}", e),
            }
        }

        debug!(
            "Loaded local vote store ({} categories voted)",
            store.selection.voted().count()
        );
        Ok(store)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn current_selection(&self, category: Category) -> Option<&SessionId> {
        self.selection.get(category)
    }

    pub fn selection(&self) -> &UserSelection {
        &self.selection
    }

    pub fn tally(&self, category: Category) -> Option<&CategoryTally> {
        self.tally.category(category)
    }

    pub fn full_tally(&self) -> &Tally {
        &self.tally
    }

    /// Cast this client's vote for `session` in `category`
    ///
    /// Re-voting the current selection changes nothing. Moving a vote
    /// decrements the old session (never below zero) before incrementing
    /// the new one. Unknown sessions fail with `InvalidSession` and leave
    /// the tally untouched.
    pub fn apply_vote(&mut self, category: Category, session: &str) -> Result<VoteOutcome> {
        let session = self.catalog.resolve(session)?.clone();

        if self.selection.get(category) == Some(&session) {
            return Ok(VoteOutcome::Unchanged);
        }

        let previous = self.selection.set(category, session.clone());
        if let Some(prev) = &previous {
            if !self.tally.decrement(category, prev) {
                debug!("Tally for '{}' in '{}' already zero on vote change", prev, category);
            }
        }
        self.tally.increment(category, &session);

        Ok(VoteOutcome::Changed {
            previous,
            current: session,
        })
    }

    /// Overwrite one category of the local tally
    pub fn replace_tally(&mut self, category: Category, counts: CategoryTally) {
        self.tally.replace_category(category, counts);
    }

    /// Overwrite the whole selection
    pub fn replace_selection(&mut self, selection: UserSelection) {
        self.selection = selection;
    }

    /// Write both records to on-device storage
    pub async fn persist(&self) -> Result<()> {
        self.persist_tally().await?;
        self.persist_selection().await
    }

    pub async fn persist_tally(&self) -> Result<()> {
        let json = serde_json::to_string(&self.tally)?;
        self.storage.set_item(VOTES_KEY, &json).await
    }

    pub async fn persist_selection(&self) -> Result<()> {
        let json = serde_json::to_string(&self.selection)?;
        self.storage.set_item(USER_VOTES_KEY, &json).await
    }
}
