//! Aggregation of per-region failures.

use std::fmt;

use thiserror::Error;

use crate::region::Region;

/// Why a single region's unit of work did not produce a result.
#[derive(Debug, Error)]
pub enum UnitError<E>
where
    E: std::error::Error + 'static,
{
    /// The provider call returned an error.
    #[error(transparent)]
    Call(E),
    /// The task ended without reporting, for example after a panic.
    #[error("regional task ended without reporting a result")]
    Lost,
}

/// A failure attributed to the region that produced it.
#[derive(Debug)]
pub struct RegionFailure<E>
where
    E: std::error::Error + 'static,
{
    /// Region whose call failed.
    pub region: Region,
    /// Underlying cause.
    pub cause: UnitError<E>,
}

impl<E> RegionFailure<E>
where
    E: std::error::Error + 'static,
{
    /// Returns the provider error, if the failure came from the call itself.
    #[must_use]
    pub const fn call_error(&self) -> Option<&E> {
        match &self.cause {
            UnitError::Call(err) => Some(err),
            UnitError::Lost => None,
        }
    }
}

impl<E> fmt::Display for RegionFailure<E>
where
    E: std::error::Error + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.region, self.cause)
    }
}

impl<E> std::error::Error for RegionFailure<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Every regional failure of one fan-out call.
///
/// The value only exists when at least one region failed. Its display form
/// lists each failure on its own line, prefixed by the region.
#[derive(Debug)]
pub struct MultiRegionError<E>
where
    E: std::error::Error + 'static,
{
    failures: Vec<RegionFailure<E>>,
}

impl<E> MultiRegionError<E>
where
    E: std::error::Error + 'static,
{
    /// Builds the aggregate, returning `None` when `failures` is empty.
    ///
    /// Failures are ordered by region so the rendering is deterministic.
    #[must_use]
    pub fn from_failures(mut failures: Vec<RegionFailure<E>>) -> Option<Self> {
        if failures.is_empty() {
            return None;
        }
        failures.sort_by(|lhs, rhs| lhs.region.cmp(&rhs.region));
        Some(Self { failures })
    }

    /// Number of failed regions.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.failures.len()
    }

    /// Always `false`: an aggregate holds at least one failure.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Individual failures ordered by region.
    #[must_use]
    pub fn failures(&self) -> &[RegionFailure<E>] {
        &self.failures
    }

    /// Regions that failed, ordered.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.failures.iter().map(|failure| &failure.region)
    }

    /// Consumes the aggregate, yielding its failures.
    #[must_use]
    pub fn into_failures(self) -> Vec<RegionFailure<E>> {
        self.failures
    }
}

impl<E> fmt::Display for MultiRegionError<E>
where
    E: std::error::Error + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.failures.len() == 1 {
            "region"
        } else {
            "regions"
        };
        write!(f, "{} {noun} failed:", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n\t* {failure}")?;
        }
        Ok(())
    }
}

impl<E> std::error::Error for MultiRegionError<E> where E: std::error::Error + 'static {}
