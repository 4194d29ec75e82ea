//! Session catalog and voting categories
//!
//! The catalog is the closed set of votable sessions known at startup.
//! Its iteration order is significant: results with equal counts are
//! listed in catalog order.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Sessions of the default unconference poll, in display order
const DEFAULT_SESSIONS: &[(&str, &str)] = &[
    ("code-sanitizers", "Code Sanitizers"),
    ("ethical-genai", "Ethical Considerations of GenAI"),
    ("vibe-coding", "Vibe Coding"),
    ("privatizing-life", "Privatizing Your Life"),
    ("evolution-app", "Evolution of an App"),
    ("developer-success", "Developer Success"),
    ("photo-editing", "Photo Editing"),
    ("ai-web-stack", "The AI Web Stack"),
    ("secure-cpp", "Secure Coding Standards for C++"),
    ("agentic-ai", "Agentic AI"),
];

/// Voting dimension each session is rated on independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// "Scariest" session
    Scary,
    /// Most useful for day-to-day work
    Work,
    /// Most engaging session
    Engagement,
}

impl Category {
    /// Every category, in display order
    pub const ALL: [Category; 3] = [Category::Scary, Category::Work, Category::Engagement];

    /// Wire name used in storage keys, remote records and button tags
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Scary => "scary",
            Category::Work => "work",
            Category::Engagement => "engagement",
        }
    }

    /// Id of the container the results for this category are rendered into
    pub fn results_container_id(&self) -> String {
        format!("{}-results", self.as_str())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scary" => Ok(Category::Scary),
            "work" => Ok(Category::Work),
            "engagement" => Ok(Category::Engagement),
            other => Err(Error::UnknownCategory(other.to_string())),
        }
    }
}

/// Catalog key for a votable session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One votable session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub id: SessionId,
    pub name: String,
}

/// Fixed, ordered set of votable sessions
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<SessionEntry>,
    positions: HashMap<SessionId, usize>,
}

impl Catalog {
    /// Build a catalog from `(id, display name)` pairs, preserving order
    ///
    /// Fails on an empty list, an empty id, or a duplicate id.
    pub fn from_pairs<I, S, N>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, N)>,
        S: Into<String>,
        N: Into<String>,
    {
        let mut entries = Vec::new();
        let mut positions = HashMap::new();

        for (id, name) in pairs {
            let id: String = id.into();
            if id.trim().is_empty() {
                return Err(Error::Config("Session id must not be empty".to_string()));
            }
            let id = SessionId::new(id);
            if positions.insert(id.clone(), entries.len()).is_some() {
                return Err(Error::Config(format!("Duplicate session id: {}", id)));
            }
            entries.push(SessionEntry {
                id,
                name: name.into(),
            });
        }

        if entries.is_empty() {
            return Err(Error::Config("Session catalog is empty".to_string()));
        }

        Ok(Self { entries, positions })
    }

    /// The ten sessions of the unconference poll
    pub fn unconference() -> Self {
        let entries: Vec<SessionEntry> = DEFAULT_SESSIONS
            .iter()
            .map(|(id, name)| SessionEntry {
                id: SessionId::from(*id),
                name: name.to_string(),
            })
            .collect();
        let positions = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        Self { entries, positions }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Catalog position of a session, used as the results tie-break
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Look up a session, failing with `InvalidSession` when unknown
    pub fn resolve(&self, id: &str) -> Result<&SessionId> {
        self.position(id)
            .map(|i| &self.entries[i].id)
            .ok_or_else(|| Error::InvalidSession(id.to_string()))
    }

    /// Display name of a session, falling back to the raw id
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.position(id)
            .map(|i| self.entries[i].name.as_str())
            .unwrap_or(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &SessionId> {
        self.entries.iter().map(|e| &e.id)
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::unconference()
    }
}
