//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard as StdMutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tokio::time::sleep;

use crate::backend::{BackendFuture, CopyRequest, DescribeRequest, ImageChanges, ImageService};
use crate::image::Image;
use crate::region::{Region, RegionSet};
use crate::registry::ClientRegistry;

/// Filter name understood by [`ScriptedService::describe`].
const IMAGE_ID_FILTER: &str = "image-id";

/// Error returned by [`ScriptedService`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedServiceError {
    /// Failure scripted through [`ScriptedService::failing`].
    #[error("scripted failure in {region}: {message}")]
    Scripted {
        /// Region of the failing service.
        region: String,
        /// Scripted message.
        message: String,
    },
    /// Raised when an operation targets an image the region does not hold.
    #[error("image {image_id} not found in {region}")]
    NotFound {
        /// Region of the service.
        region: String,
        /// Requested image id.
        image_id: String,
    },
}

/// Records a single call made through [`ScriptedService`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServiceCall {
    /// `describe` with its request.
    Describe(DescribeRequest),
    /// `copy` with its request.
    Copy(CopyRequest),
    /// `deregister` with image id and dry-run flag.
    Deregister {
        /// Target image.
        image_id: String,
        /// Dry-run flag.
        dry_run: bool,
    },
    /// `modify` with image id, changes and dry-run flag.
    Modify {
        /// Target image.
        image_id: String,
        /// Requested changes.
        changes: ImageChanges,
        /// Dry-run flag.
        dry_run: bool,
    },
}

#[derive(Debug, Default)]
struct ScriptState {
    images: Vec<Image>,
    failure: Option<String>,
    refused: BTreeSet<String>,
    latency: Duration,
    panics: bool,
    calls: Vec<ServiceCall>,
}

/// In-memory [`ImageService`] that serves scripted images and failures.
///
/// Clones share state, so a test can keep a handle to inspect calls after
/// the service has been moved into a registry.
#[derive(Clone, Debug)]
pub struct ScriptedService {
    region: Region,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedService {
    /// Creates a service for `region` holding no images.
    #[must_use]
    pub fn new(region: impl Into<Region>) -> Self {
        Self {
            region: region.into(),
            state: Arc::new(Mutex::new(ScriptState::default())),
        }
    }

    /// Replaces the images held by the region.
    #[must_use]
    pub fn with_images(self, images: Vec<Image>) -> Self {
        self.lock().images = images;
        self
    }

    /// Makes every operation fail with `message`.
    #[must_use]
    pub fn failing(self, message: impl Into<String>) -> Self {
        self.lock().failure = Some(message.into());
        self
    }

    /// Makes deregister and modify calls for `image_id` fail while other
    /// images are still handled.
    #[must_use]
    pub fn refusing(self, image_id: impl Into<String>) -> Self {
        self.lock().refused.insert(image_id.into());
        self
    }

    /// Delays every operation by `latency` before answering.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    /// Makes every operation panic.
    #[must_use]
    pub fn panicking(self) -> Self {
        self.lock().panics = true;
        self
    }

    /// Region served by this double.
    #[must_use]
    pub const fn region(&self) -> &Region {
        &self.region
    }

    /// Snapshot of the calls received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.lock().calls.clone()
    }

    /// Snapshot of the images currently held.
    #[must_use]
    pub fn images(&self) -> Vec<Image> {
        self.lock().images.clone()
    }

    fn lock(&self) -> StdMutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `call`, panicking when scripted to.
    fn record(&self, call: ServiceCall) {
        let panics = {
            let mut state = self.lock();
            state.calls.push(call);
            state.panics
        };
        assert!(!panics, "scripted panic in {}", self.region);
    }

    /// Scripted latency, or the scripted failure.
    fn latency(&self) -> Result<Duration, ScriptedServiceError> {
        let state = self.lock();
        if let Some(message) = &state.failure {
            return Err(self.scripted(message.clone()));
        }
        Ok(state.latency)
    }

    /// Fails when `image_id` was scripted through [`ScriptedService::refusing`].
    fn admit(&self, image_id: &str) -> Result<(), ScriptedServiceError> {
        if self.lock().refused.contains(image_id) {
            return Err(self.scripted(format!("refused {image_id}")));
        }
        Ok(())
    }

    fn scripted(&self, message: String) -> ScriptedServiceError {
        ScriptedServiceError::Scripted {
            region: self.region.to_string(),
            message,
        }
    }

    fn not_found(&self, image_id: &str) -> ScriptedServiceError {
        ScriptedServiceError::NotFound {
            region: self.region.to_string(),
            image_id: image_id.to_owned(),
        }
    }

    fn matches(request: &DescribeRequest, image: &Image) -> bool {
        let by_id = request.image_ids.is_empty() || request.image_ids.contains(&image.id);
        let by_filter = request
            .filters
            .get(IMAGE_ID_FILTER)
            .is_none_or(|ids| ids.contains(&image.id));
        by_id && by_filter
    }
}

impl ImageService for ScriptedService {
    type Error = ScriptedServiceError;

    fn describe<'a>(
        &'a self,
        request: &'a DescribeRequest,
    ) -> BackendFuture<'a, Vec<Image>, Self::Error> {
        Box::pin(async move {
            self.record(ServiceCall::Describe(request.clone()));
            let latency = self.latency()?;
            sleep(latency).await;
            Ok(self
                .lock()
                .images
                .iter()
                .filter(|image| Self::matches(request, image))
                .cloned()
                .collect())
        })
    }

    fn copy<'a>(
        &'a self,
        request: &'a CopyRequest,
    ) -> BackendFuture<'a, Option<String>, Self::Error> {
        Box::pin(async move {
            self.record(ServiceCall::Copy(request.clone()));
            let latency = self.latency()?;
            sleep(latency).await;
            if request.dry_run {
                return Ok(None);
            }
            let new_id = format!("{}-copy-{}", request.source_image_id, self.region);
            self.lock()
                .images
                .push(Image::new(new_id.clone()).with_name(request.name.clone()));
            Ok(Some(new_id))
        })
    }

    fn deregister<'a>(
        &'a self,
        image_id: &'a str,
        dry_run: bool,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.record(ServiceCall::Deregister {
                image_id: image_id.to_owned(),
                dry_run,
            });
            let latency = self.latency()?;
            sleep(latency).await;
            self.admit(image_id)?;
            let mut state = self.lock();
            let Some(position) = state.images.iter().position(|image| image.id == image_id) else {
                return Err(self.not_found(image_id));
            };
            if !dry_run {
                state.images.remove(position);
            }
            Ok(())
        })
    }

    fn modify<'a>(
        &'a self,
        image_id: &'a str,
        changes: &'a ImageChanges,
        dry_run: bool,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.record(ServiceCall::Modify {
                image_id: image_id.to_owned(),
                changes: changes.clone(),
                dry_run,
            });
            let latency = self.latency()?;
            sleep(latency).await;
            self.admit(image_id)?;
            let mut state = self.lock();
            let Some(image) = state.images.iter_mut().find(|image| image.id == image_id) else {
                return Err(self.not_found(image_id));
            };
            if !dry_run {
                for key in &changes.delete_tags {
                    image.tags.remove(key);
                }
                image.tags.extend(changes.create_tags.clone());
            }
            Ok(())
        })
    }
}

/// A set of scripted services, one per region, ready to build a registry.
#[derive(Clone, Debug, Default)]
pub struct ScriptedFleet {
    services: BTreeMap<Region, ScriptedService>,
}

impl ScriptedFleet {
    /// Creates empty services for each region in `regions`.
    #[must_use]
    pub fn new(regions: &[&str]) -> Self {
        let services = regions
            .iter()
            .map(|region| (Region::from(*region), ScriptedService::new(*region)))
            .collect();
        Self { services }
    }

    /// Replaces the service of a region, adding the region if needed.
    #[must_use]
    pub fn with_service(mut self, service: ScriptedService) -> Self {
        self.services.insert(service.region().clone(), service);
        self
    }

    /// Returns the shared handle for `region`.
    #[must_use]
    pub fn service(&self, region: &str) -> Option<&ScriptedService> {
        self.services.get(&Region::from(region))
    }

    /// Region set covering every scripted region, `None` for an empty fleet.
    #[must_use]
    pub fn region_set(&self) -> Option<RegionSet> {
        RegionSet::from_regions(self.services.keys().cloned().collect::<BTreeSet<_>>())
    }

    /// Builds a registry whose clients share state with this fleet.
    #[must_use]
    pub fn registry(&self) -> Option<ClientRegistry<ScriptedService>> {
        let regions = self.region_set()?;
        ClientRegistry::build(&regions, |region| {
            self.services.get(region).cloned().ok_or(())
        })
        .ok()
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets and removes environment variables while holding a global mutex.
    ///
    /// Pairs with a `None` value are removed for the guard's lifetime.
    pub async fn set_vars(pairs: &[(&str, Option<&str>)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe {
                match value {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
