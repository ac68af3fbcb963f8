//! Region identifiers and resolution of the region set a run operates on.
//!
//! Regions are configured as two comma separated lists: the regions to
//! include and the regions to exclude. Either list may contain the
//! [`ALL_REGIONS_SENTINEL`], which expands to the static [`ALL_REGIONS`]
//! catalog on the include side and empties the result on the exclude side.

mod catalog;

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;

use serde::Serialize;
use thiserror::Error;

pub use catalog::ALL_REGIONS;

/// Region list entry that stands for every region in [`ALL_REGIONS`].
pub const ALL_REGIONS_SENTINEL: &str = "all";

/// Identifier of a single AWS region (for example `eu-west-1`).
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Region(String);

impl Region {
    /// Wraps a region identifier, trimming surrounding whitespace.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let raw: String = value.into();
        Self(raw.trim().to_owned())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Region {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Region {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for Region {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for Region {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised while building a [`RegionSet`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RegionError {
    /// Raised when no region remains after applying the exclusions.
    #[error("no regions left to operate on (include: '{include}', exclude: '{exclude}')")]
    Empty {
        /// Inclusion list as configured.
        include: String,
        /// Exclusion list as configured.
        exclude: String,
    },
}

/// Non-empty, duplicate-free set of regions targeted by a run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegionSet {
    regions: BTreeSet<Region>,
}

impl RegionSet {
    /// Resolves the inclusion and exclusion lists into a region set.
    ///
    /// # Errors
    ///
    /// Returns [`RegionError::Empty`] when the exclusions remove every
    /// included region, or when the inclusion list names no region at all.
    pub fn resolve(include: &str, exclude: &str) -> Result<Self, RegionError> {
        Self::from_regions(resolve_regions(include, exclude)).ok_or_else(|| RegionError::Empty {
            include: include.to_owned(),
            exclude: exclude.to_owned(),
        })
    }

    /// Wraps an already resolved set, returning `None` when it is empty.
    #[must_use]
    pub fn from_regions(regions: BTreeSet<Region>) -> Option<Self> {
        if regions.is_empty() {
            None
        } else {
            Some(Self { regions })
        }
    }

    /// Iterates over the regions in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    /// Number of regions in the set. Never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Always `false`; provided for API symmetry with collections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Returns `true` when `region` is part of the set.
    #[must_use]
    pub fn contains(&self, region: &Region) -> bool {
        self.regions.contains(region)
    }
}

impl<'a> IntoIterator for &'a RegionSet {
    type Item = &'a Region;
    type IntoIter = std::collections::btree_set::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

/// Splits a comma separated region list, trimming entries and dropping
/// empty ones.
#[must_use]
pub fn parse_region_list(spec: &str) -> BTreeSet<String> {
    spec.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Computes `included - excluded`, expanding the sentinel on either side.
///
/// The result may be empty; callers that need a non-empty set should use
/// [`RegionSet::resolve`].
#[must_use]
pub fn resolve_regions(include: &str, exclude: &str) -> BTreeSet<Region> {
    let excluded = parse_region_list(exclude);
    if excluded.contains(ALL_REGIONS_SENTINEL) {
        return BTreeSet::new();
    }

    let included = parse_region_list(include);
    let candidates: BTreeSet<String> = if included.contains(ALL_REGIONS_SENTINEL) {
        ALL_REGIONS.iter().map(|region| (*region).to_owned()).collect()
    } else {
        included
    };

    candidates
        .difference(&excluded)
        .map(|region| Region::new(region.as_str()))
        .collect()
}

#[cfg(test)]
mod tests;
