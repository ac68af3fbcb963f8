//! Provider boundary: request payloads and the per-region image service.
//!
//! Every regional client implements [`ImageService`]. The fan-out executor
//! only ever talks to this trait, so tests can swap in scripted services
//! while production wires in the EC2 implementation.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::image::Image;
use crate::region::Region;

/// Owner alias that selects images owned by the calling account.
pub const SELF_OWNER: &str = "self";

/// Errors raised while building request payloads.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RequestError {
    /// Raised when a request is missing a required field.
    #[error("missing or empty field: {0}")]
    Validation(String),
    /// Raised when a `key=value` tag specification cannot be parsed.
    #[error("malformed tag '{0}': expected key=value")]
    MalformedTag(String),
    /// Raised when a modify request carries no change at all.
    #[error("no modification requested")]
    NoChanges,
}

/// Query payload for describing images.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DescribeRequest {
    /// Owner account ids or aliases (`self`, `amazon`, ...). Empty means any.
    pub owners: Vec<String>,
    /// Explicit image ids. The provider rejects ids unknown to the region,
    /// so cross-region lookups should use an `image-id` filter instead.
    pub image_ids: Vec<String>,
    /// Provider filters keyed by filter name.
    pub filters: BTreeMap<String, Vec<String>>,
}

impl DescribeRequest {
    /// Request for every image owned by the calling account.
    #[must_use]
    pub fn owned_by_self() -> Self {
        Self::default().owner(SELF_OWNER)
    }

    /// Adds an owner.
    #[must_use]
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owners.push(owner.into());
        self
    }

    /// Adds explicit image ids.
    #[must_use]
    pub fn image_ids<I, V>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.image_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Adds values to a provider filter.
    #[must_use]
    pub fn filter<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.filters
            .entry(name.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }
}

/// Payload for copying an image into the region of the executing client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CopyRequest {
    /// Region currently holding the source image.
    pub source_region: Region,
    /// Identifier of the image to copy.
    pub source_image_id: String,
    /// Name given to the copies.
    pub name: String,
    /// Optional description for the copies.
    pub description: Option<String>,
    /// Ask the provider to check permissions without copying.
    pub dry_run: bool,
}

impl CopyRequest {
    /// Starts a builder for a [`CopyRequest`].
    #[must_use]
    pub fn builder() -> CopyRequestBuilder {
        CopyRequestBuilder::default()
    }

    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] naming the first empty field.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.source_region.is_empty() {
            return Err(RequestError::Validation(String::from("source_region")));
        }
        if self.source_image_id.is_empty() {
            return Err(RequestError::Validation(String::from("source_image_id")));
        }
        if self.name.is_empty() {
            return Err(RequestError::Validation(String::from("name")));
        }
        Ok(())
    }
}

/// Builder for [`CopyRequest`] that trims inputs and validates on build.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CopyRequestBuilder {
    source_region: String,
    source_image_id: String,
    name: String,
    description: Option<String>,
    dry_run: bool,
}

impl CopyRequestBuilder {
    /// Sets the source region.
    #[must_use]
    pub fn source_region(mut self, value: impl Into<String>) -> Self {
        self.source_region = value.into();
        self
    }

    /// Sets the source image id.
    #[must_use]
    pub fn source_image_id(mut self, value: impl Into<String>) -> Self {
        self.source_image_id = value.into();
        self
    }

    /// Sets the name of the copies.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = value.into();
        self
    }

    /// Sets the optional description.
    #[must_use]
    pub fn description(mut self, value: Option<String>) -> Self {
        self.description = value;
        self
    }

    /// Enables or disables dry-run mode.
    #[must_use]
    pub const fn dry_run(mut self, value: bool) -> Self {
        self.dry_run = value;
        self
    }

    /// Builds and validates the [`CopyRequest`].
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when a required field is empty.
    pub fn build(self) -> Result<CopyRequest, RequestError> {
        let request = CopyRequest {
            source_region: Region::new(self.source_region),
            source_image_id: self.source_image_id.trim().to_owned(),
            name: self.name.trim().to_owned(),
            description: self
                .description
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
            dry_run: self.dry_run,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Attribute and tag changes applied to an image.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ImageChanges {
    /// Account ids granted launch permission.
    pub add_launch_users: Vec<String>,
    /// Account ids whose launch permission is revoked.
    pub remove_launch_users: Vec<String>,
    /// `Some(true)` makes the image public, `Some(false)` private.
    pub public: Option<bool>,
    /// Tags created or overwritten.
    pub create_tags: BTreeMap<String, String>,
    /// Tag keys removed.
    pub delete_tags: Vec<String>,
}

impl ImageChanges {
    /// Returns `true` when no change is requested.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.add_launch_users.is_empty()
            && self.remove_launch_users.is_empty()
            && self.public.is_none()
            && self.create_tags.is_empty()
            && self.delete_tags.is_empty()
    }

    /// Returns `true` when launch permissions change.
    #[must_use]
    pub const fn touches_launch_permission(&self) -> bool {
        !self.add_launch_users.is_empty()
            || !self.remove_launch_users.is_empty()
            || self.public.is_some()
    }

    /// Validates that at least one change is present.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::NoChanges`] when the change set is empty.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.is_empty() {
            return Err(RequestError::NoChanges);
        }
        Ok(())
    }
}

/// Parses a `key=value,key2=value2` tag list. Values may be empty.
///
/// # Errors
///
/// Returns [`RequestError::MalformedTag`] when an entry has no `=` or an
/// empty key.
pub fn parse_tags(spec: &str) -> Result<BTreeMap<String, String>, RequestError> {
    let mut tags = BTreeMap::new();
    for entry in spec.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(RequestError::MalformedTag(entry.to_owned()));
        };
        let trimmed_key = key.trim();
        if trimmed_key.is_empty() {
            return Err(RequestError::MalformedTag(entry.to_owned()));
        }
        tags.insert(trimmed_key.to_owned(), value.trim().to_owned());
    }
    Ok(tags)
}

/// Future returned by image service operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Image operations offered by one regional endpoint.
pub trait ImageService: Send + Sync + 'static {
    /// Provider specific error type returned by the service.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Describes the images matching `request` in this region.
    fn describe<'a>(
        &'a self,
        request: &'a DescribeRequest,
    ) -> BackendFuture<'a, Vec<Image>, Self::Error>;

    /// Copies an image into this region and returns the new image id, or
    /// `None` for a successful dry run.
    fn copy<'a>(&'a self, request: &'a CopyRequest)
    -> BackendFuture<'a, Option<String>, Self::Error>;

    /// Deregisters an image held by this region.
    fn deregister<'a>(
        &'a self,
        image_id: &'a str,
        dry_run: bool,
    ) -> BackendFuture<'a, (), Self::Error>;

    /// Applies launch permission and tag changes to an image in this region.
    fn modify<'a>(
        &'a self,
        image_id: &'a str,
        changes: &'a ImageChanges,
        dry_run: bool,
    ) -> BackendFuture<'a, (), Self::Error>;
}
