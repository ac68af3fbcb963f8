//! Multi-region image provider.
//!
//! [`AwsImages`] owns the client registry and maps each verb onto one
//! fan-out call. Regional failures never abort a verb: every operation
//! returns a [`FanOutOutcome`] carrying the successful regions alongside the
//! aggregated error.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::backend::{
    CopyRequest, DescribeRequest, ImageChanges, ImageService, RequestError, SELF_OWNER,
};
use crate::config::{AwsConfig, ConfigError};
use crate::ec2::Ec2Service;
use crate::fanout::{
    FanOutOutcome, MultiImages, MultiRegionError, RegionMap, fan_out, fan_out_images,
};
use crate::image::Image;
use crate::region::{Region, RegionError, RegionSet};
use crate::registry::{ClientRegistry, RegistryError};

/// Provider filter selecting images by id without failing for ids a region
/// does not hold.
pub const IMAGE_ID_FILTER: &str = "image-id";

/// Errors raised before any regional work starts.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Configuration is incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The region list resolved to nothing.
    #[error(transparent)]
    Region(#[from] RegionError),
    /// A requested region has no client.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The verb payload is invalid.
    #[error(transparent)]
    Request(#[from] RequestError),
    /// No configured region holds the copy source.
    #[error("image {image_id} was not found in any configured region")]
    SourceNotFound {
        /// Requested source image.
        image_id: String,
    },
    /// The copy source was found in more than one region.
    #[error("image {image_id} exists in several regions ({regions}); pass --source-region")]
    AmbiguousSource {
        /// Requested source image.
        image_id: String,
        /// Comma separated regions holding the id.
        regions: String,
    },
    /// The source lookup failed in the regions that might hold the image.
    #[error("could not locate image {image_id}: {cause}")]
    SourceLookup {
        /// Requested source image.
        image_id: String,
        /// Rendered lookup failure.
        cause: String,
    },
    /// Copy has no region to copy into.
    #[error("no destination region left after excluding source region {0}")]
    NoDestinations(Region),
    /// The source region has no client, so the source name cannot be read.
    #[error("source region {0} is not configured; pass --name to copy from it")]
    UnconfiguredSource(Region),
}

/// A regional delete or modify that stopped before handling every image.
///
/// Images are handled one at a time; `completed` lists those already
/// deregistered or modified when the call for `image_id` failed.
#[derive(Debug)]
pub struct ImageActionError<E> {
    /// Image whose call failed, `None` when the lookup itself failed.
    pub image_id: Option<String>,
    /// Images handled before the failure, in call order.
    pub completed: Vec<String>,
    /// Provider error.
    pub source: E,
}

impl<E> ImageActionError<E> {
    const fn lookup(source: E) -> Self {
        Self {
            image_id: None,
            completed: Vec::new(),
            source,
        }
    }

    fn partial(image_id: &str, completed: Vec<String>, source: E) -> Self {
        Self {
            image_id: Some(image_id.to_owned()),
            completed,
            source,
        }
    }

    /// Ids this region is known to hold: the handled images and the failing one.
    pub fn image_ids(&self) -> impl Iterator<Item = &str> {
        self.completed
            .iter()
            .map(String::as_str)
            .chain(self.image_id.as_deref())
    }
}

impl<E> fmt::Display for ImageActionError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(image_id) = &self.image_id else {
            return write!(f, "{}", self.source);
        };
        write!(f, "{image_id}: {}", self.source)?;
        if !self.completed.is_empty() {
            write!(f, " (already handled: {})", self.completed.join(", "))?;
        }
        Ok(())
    }
}

impl<E> std::error::Error for ImageActionError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Outcome of a delete or modify verb: the images handled per region.
pub type ImageActionOutcome<E> = FanOutOutcome<Vec<Image>, ImageActionError<E>>;

/// Parameters of a copy verb.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CopyPlan {
    /// Image to copy.
    pub image_id: String,
    /// Region holding the image; located across the registry when `None`.
    pub source_region: Option<Region>,
    /// Destination regions; every registered region except the source when
    /// `None`.
    pub destinations: Option<BTreeSet<Region>>,
    /// Name of the copies; the source image name when `None`.
    pub name: Option<String>,
    /// Description of the copies.
    pub description: Option<String>,
    /// Check permissions without copying.
    pub dry_run: bool,
}

/// Result of a copy verb.
#[derive(Debug)]
pub struct CopyReport<E>
where
    E: std::error::Error + 'static,
{
    /// Request sent to every destination.
    pub request: CopyRequest,
    /// New image id per destination, `None` for a dry run.
    pub outcome: FanOutOutcome<Option<String>, E>,
}

/// Image operations spanning every configured region.
#[derive(Debug)]
pub struct AwsImages<S = Ec2Service> {
    registry: ClientRegistry<S>,
}

impl<S> Clone for AwsImages<S> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl AwsImages<Ec2Service> {
    /// Validates `config`, resolves its regions and builds one EC2 client
    /// per region. No request is sent.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] for missing settings and
    /// [`ProviderError::Region`] when no region is left to operate on.
    pub fn new(config: &AwsConfig) -> Result<Self, ProviderError> {
        config.validate()?;
        let regions = RegionSet::resolve(&config.region, config.region_exclude())?;
        let credentials = config.credentials();
        let registry = ClientRegistry::build(&regions, |region| {
            Ok::<_, Infallible>(Ec2Service::new(region, &credentials))
        })
        .unwrap_or_else(|never| match never {});
        info!(regions = registry.len(), "built regional clients");
        Ok(Self { registry })
    }
}

impl<S> AwsImages<S>
where
    S: ImageService,
{
    /// Wraps an existing registry.
    #[must_use]
    pub const fn from_registry(registry: ClientRegistry<S>) -> Self {
        Self { registry }
    }

    /// Registered regions in lexical order.
    #[must_use]
    pub fn regions(&self) -> Vec<Region> {
        self.registry.regions()
    }

    /// Describes images in every region; each list is ordered oldest first.
    pub async fn list(&self, request: DescribeRequest) -> FanOutOutcome<Vec<Image>, S::Error> {
        let shared = Arc::new(request);
        fan_out_images(&self.registry, |_, service| {
            let query = Arc::clone(&shared);
            async move { service.describe(&query).await }
        })
        .await
    }

    /// Finds the regions holding `image_id`, whoever owns it. Regions that
    /// answered without the image are absent from the results.
    pub async fn locate(&self, image_id: &str) -> FanOutOutcome<Image, S::Error> {
        let request = DescribeRequest::default().filter(IMAGE_ID_FILTER, [image_id]);
        let (results, error) = self.list(request).await.into_parts();
        let held = results
            .into_iter()
            .filter_map(|(region, images)| {
                images.into_iter().next().map(|image| (region, image))
            })
            .collect();
        FanOutOutcome {
            results: held,
            error,
        }
    }

    /// Copies an image into the destination regions.
    ///
    /// Without a source region the image is located first; without a name
    /// the source image name is reused.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the source cannot be resolved, a
    /// destination is not registered, or the request is incomplete.
    /// Regional copy failures are reported in the returned outcome.
    pub async fn copy(&self, plan: CopyPlan) -> Result<CopyReport<S::Error>, ProviderError> {
        let image_id = plan.image_id.trim().to_owned();
        if image_id.is_empty() {
            return Err(RequestError::Validation(String::from("image")).into());
        }

        let (source_region, source) = match plan.source_region {
            Some(region) if plan.name.is_some() => (region, None),
            Some(region) => {
                let image = self.describe_source(&region, &image_id).await?;
                (region, Some(image))
            }
            None => {
                let (region, image) = self.find_source(&image_id).await?;
                (region, Some(image))
            }
        };

        let name = plan
            .name
            .or_else(|| source.and_then(|image| image.name))
            .unwrap_or_default();
        let request = CopyRequest::builder()
            .source_region(source_region.as_str())
            .source_image_id(&image_id)
            .name(name)
            .description(plan.description)
            .dry_run(plan.dry_run)
            .build()?;

        let targets = match plan.destinations {
            Some(destinations) => self.registry.subset(&destinations)?,
            None => {
                let others: BTreeSet<Region> = self
                    .registry
                    .regions()
                    .into_iter()
                    .filter(|region| *region != source_region)
                    .collect();
                if others.is_empty() {
                    return Err(ProviderError::NoDestinations(source_region));
                }
                self.registry.subset(&others)?
            }
        };

        debug!(
            image = %image_id,
            source = %source_region,
            destinations = targets.len(),
            "copying image"
        );
        let shared = Arc::new(request.clone());
        let outcome = fan_out(&targets, |_, service| {
            let copy = Arc::clone(&shared);
            async move { service.copy(&copy).await }
        })
        .await;
        Ok(CopyReport { request, outcome })
    }

    /// Deregisters the listed images owned by the caller, in every region
    /// holding them. Results list the images handled per region; a region
    /// that fails part way reports the images it already deregistered.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Request`] when no image id is given.
    pub async fn delete(
        &self,
        image_ids: &[String],
        dry_run: bool,
    ) -> Result<ImageActionOutcome<S::Error>, ProviderError> {
        let query = Arc::new(owned_images(image_ids)?);
        Ok(fan_out_images(&self.registry, |_, service| {
            let shared = Arc::clone(&query);
            async move {
                let found = service
                    .describe(&shared)
                    .await
                    .map_err(ImageActionError::lookup)?;
                let mut completed = Vec::with_capacity(found.len());
                for image in &found {
                    if let Err(err) = service.deregister(&image.id, dry_run).await {
                        return Err(ImageActionError::partial(&image.id, completed, err));
                    }
                    completed.push(image.id.clone());
                }
                Ok::<_, ImageActionError<S::Error>>(found)
            }
        })
        .await)
    }

    /// Applies `changes` to the listed images owned by the caller, in every
    /// region holding them. Results list the images handled per region; a
    /// region that fails part way reports the images it already modified.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Request`] when no image id or no change is
    /// given.
    pub async fn modify(
        &self,
        image_ids: &[String],
        changes: ImageChanges,
        dry_run: bool,
    ) -> Result<ImageActionOutcome<S::Error>, ProviderError> {
        changes.validate()?;
        let query = Arc::new(owned_images(image_ids)?);
        let shared_changes = Arc::new(changes);
        Ok(fan_out_images(&self.registry, |_, service| {
            let shared = Arc::clone(&query);
            let changes = Arc::clone(&shared_changes);
            async move {
                let found = service
                    .describe(&shared)
                    .await
                    .map_err(ImageActionError::lookup)?;
                let mut completed = Vec::with_capacity(found.len());
                for image in &found {
                    if let Err(err) = service.modify(&image.id, &changes, dry_run).await {
                        return Err(ImageActionError::partial(&image.id, completed, err));
                    }
                    completed.push(image.id.clone());
                }
                Ok::<_, ImageActionError<S::Error>>(found)
            }
        })
        .await)
    }

    async fn describe_source(&self, region: &Region, image_id: &str) -> Result<Image, ProviderError> {
        let Some(service) = self.registry.get(region) else {
            return Err(ProviderError::UnconfiguredSource(region.clone()));
        };
        let request = DescribeRequest::default().filter(IMAGE_ID_FILTER, [image_id]);
        let images = service
            .describe(&request)
            .await
            .map_err(|err| ProviderError::SourceLookup {
                image_id: image_id.to_owned(),
                cause: format!("{region}: {err}"),
            })?;
        images
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::SourceNotFound {
                image_id: image_id.to_owned(),
            })
    }

    async fn find_source(&self, image_id: &str) -> Result<(Region, Image), ProviderError> {
        let (mut held, error) = self.locate(image_id).await.into_parts();
        if held.len() > 1 {
            let regions = held
                .keys()
                .map(Region::as_str)
                .collect::<Vec<_>>()
                .join(",");
            return Err(ProviderError::AmbiguousSource {
                image_id: image_id.to_owned(),
                regions,
            });
        }
        if let Some(found) = held.pop_first() {
            return Ok(found);
        }
        match error {
            Some(err) => Err(ProviderError::SourceLookup {
                image_id: image_id.to_owned(),
                cause: err.to_string(),
            }),
            None => Err(ProviderError::SourceNotFound {
                image_id: image_id.to_owned(),
            }),
        }
    }
}

/// Query for the caller's images among `image_ids`.
fn owned_images(image_ids: &[String]) -> Result<DescribeRequest, RequestError> {
    let ids: Vec<&str> = image_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .collect();
    if ids.is_empty() {
        return Err(RequestError::Validation(String::from("image-ids")));
    }
    Ok(DescribeRequest::default()
        .owner(SELF_OWNER)
        .filter(IMAGE_ID_FILTER, ids))
}

/// Image ids that no region reported, in request order without repeats.
///
/// Ids named by a partially failed region count as seen. Regions that failed
/// before their lookup answered are unknown, so callers should word the
/// result accordingly when `error` is set.
#[must_use]
pub fn unmatched_ids<E>(
    image_ids: &[String],
    results: &MultiImages,
    error: Option<&MultiRegionError<ImageActionError<E>>>,
) -> Vec<String>
where
    E: std::error::Error + 'static,
{
    let partial = error
        .into_iter()
        .flat_map(MultiRegionError::failures)
        .filter_map(|failure| failure.call_error())
        .flat_map(ImageActionError::image_ids);
    let seen: BTreeSet<&str> = results
        .values()
        .flatten()
        .map(|image| image.id.as_str())
        .chain(partial)
        .collect();
    let mut reported = BTreeSet::new();
    image_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && !seen.contains(id) && reported.insert(*id))
        .map(str::to_owned)
        .collect()
}

/// Number of entries across every region.
#[must_use]
pub fn total_images<T>(results: &RegionMap<Vec<T>>) -> usize {
    results.values().map(Vec::len).sum()
}
