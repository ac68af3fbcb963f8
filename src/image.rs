//! Provider-neutral image records and their per-region ordering.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Machine image as described by a regional endpoint.
///
/// Fields the core relies on are typed; everything else the provider
/// reports is carried through [`Image::attributes`] untouched.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Image {
    /// Provider identifier (for example `ami-0abc...`).
    pub id: String,
    /// Image name, when one was set.
    pub name: Option<String>,
    /// Account that owns the image.
    pub owner_id: Option<String>,
    /// Creation timestamp reported by the provider.
    pub created_at: Option<DateTime<Utc>>,
    /// Lifecycle state (for example `available`).
    pub state: Option<String>,
    /// Resource tags keyed by tag name.
    pub tags: BTreeMap<String, String>,
    /// Provider-specific metadata passed through opaquely.
    pub attributes: BTreeMap<String, String>,
}

impl Image {
    /// Creates a record carrying only an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            owner_id: None,
            created_at: None,
            state: None,
            tags: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Sets the image name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the owning account.
    #[must_use]
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Sets the creation timestamp.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the lifecycle state.
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Adds an opaque provider attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Parses the ISO-8601 creation date format used by EC2
/// (`2024-01-02T03:04:05.000Z`).
#[must_use]
pub fn parse_creation_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Orders a region's images from oldest to newest.
///
/// Lists with fewer than two entries are left untouched. The sort is stable,
/// so images sharing a timestamp keep the order the provider returned.
/// Images without a timestamp sort first.
pub fn sort_by_creation(images: &mut [Image]) {
    if images.len() > 1 {
        images.sort_by(|lhs, rhs| lhs.created_at.cmp(&rhs.created_at));
    }
}
