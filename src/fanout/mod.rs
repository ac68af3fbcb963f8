//! Multi-region fan-out and fan-in.
//!
//! [`fan_out`] spawns one task per registered region, each running the same
//! logical operation against its own regional client. Tasks report back over
//! a channel to a single collector, which owns the merged result map and the
//! failure list, so no lock guards the shared state. The collector waits for
//! every task: there is no early return, no cancellation, and no retry.

mod error;

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::image::{Image, sort_by_creation};
use crate::region::Region;
use crate::registry::ClientRegistry;

pub use error::{MultiRegionError, RegionFailure, UnitError};

/// Per-region values keyed by region, only for regions that succeeded.
pub type RegionMap<T> = BTreeMap<Region, T>;

/// Image lists keyed by region, each ordered oldest first.
pub type MultiImages = RegionMap<Vec<Image>>;

/// Outcome of one fan-out call.
///
/// Results and error are independent: a call may succeed in some regions
/// and fail in others, in which case both are populated.
#[derive(Debug)]
pub struct FanOutOutcome<T, E>
where
    E: std::error::Error + 'static,
{
    /// Values from the regions that succeeded.
    pub results: RegionMap<T>,
    /// Failures from the remaining regions, `None` when every region succeeded.
    pub error: Option<MultiRegionError<E>>,
}

impl<T, E> FanOutOutcome<T, E>
where
    E: std::error::Error + 'static,
{
    /// Returns `true` when every region succeeded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Returns `true` when some, but not all, regions failed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.error.is_some() && !self.results.is_empty()
    }

    /// Splits the outcome into results and optional aggregated error.
    #[must_use]
    pub fn into_parts(self) -> (RegionMap<T>, Option<MultiRegionError<E>>) {
        (self.results, self.error)
    }

    /// Converts the outcome into a `Result`, discarding partial results when
    /// any region failed.
    ///
    /// # Errors
    ///
    /// Returns the aggregated error when at least one region failed.
    pub fn into_result(self) -> Result<RegionMap<T>, MultiRegionError<E>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.results),
        }
    }

    /// Transforms every successful value, keeping the failures.
    #[must_use]
    pub fn map_results<U, F>(self, mut transform: F) -> FanOutOutcome<U, E>
    where
        F: FnMut(&Region, T) -> U,
    {
        let results = self
            .results
            .into_iter()
            .map(|(region, value)| {
                let mapped = transform(&region, value);
                (region, mapped)
            })
            .collect();
        FanOutOutcome {
            results,
            error: self.error,
        }
    }
}

/// Runs `operation` against every client in `registry` concurrently.
///
/// `operation` is called once per region to build that region's unit of
/// work; each unit runs on its own tokio task. The call returns once every
/// unit has finished. A unit that ends without reporting (for example
/// because it panicked) is recorded as [`UnitError::Lost`] for its region.
pub async fn fan_out<S, T, E, F, Fut>(
    registry: &ClientRegistry<S>,
    mut operation: F,
) -> FanOutOutcome<T, E>
where
    S: Send + Sync + 'static,
    T: Send + 'static,
    E: std::error::Error + Send + 'static,
    F: FnMut(Region, Arc<S>) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let (sender, mut receiver) = mpsc::unbounded_channel::<(Region, Result<T, E>)>();
    let mut pending = BTreeSet::new();

    for (region, client) in registry.iter() {
        debug!(region = %region, "dispatching regional call");
        let unit = operation(region.clone(), Arc::clone(client));
        let report = sender.clone();
        let reporting_region = region.clone();
        pending.insert(region.clone());
        tokio::spawn(async move {
            let result = unit.await;
            if report.send((reporting_region, result)).is_err() {
                debug!("fan-out collector dropped before regional result arrived");
            }
        });
    }
    drop(sender);

    let mut results = RegionMap::new();
    let mut failures = Vec::new();
    while let Some((region, result)) = receiver.recv().await {
        pending.remove(&region);
        match result {
            Ok(value) => {
                results.insert(region, value);
            }
            Err(err) => {
                warn!(region = %region, error = %err, "regional call failed");
                failures.push(RegionFailure {
                    region,
                    cause: UnitError::Call(err),
                });
            }
        }
    }

    for region in pending {
        warn!(region = %region, "regional task ended without a result");
        failures.push(RegionFailure {
            region,
            cause: UnitError::Lost,
        });
    }

    info!(
        succeeded = results.len(),
        failed = failures.len(),
        "fan-out complete"
    );
    FanOutOutcome {
        results,
        error: MultiRegionError::from_failures(failures),
    }
}

/// Fan-out for operations returning image lists; each region's list is
/// ordered oldest first before it is stored.
pub async fn fan_out_images<S, E, F, Fut>(
    registry: &ClientRegistry<S>,
    operation: F,
) -> FanOutOutcome<Vec<Image>, E>
where
    S: Send + Sync + 'static,
    E: std::error::Error + Send + 'static,
    F: FnMut(Region, Arc<S>) -> Fut,
    Fut: Future<Output = Result<Vec<Image>, E>> + Send + 'static,
{
    fan_out(registry, operation)
        .await
        .map_results(|_, mut images| {
            sort_by_creation(&mut images);
            images
        })
}
