//! EC2 implementation of [`ImageService`], bound to a single region.

mod convert;
mod error;

use std::time::Duration;

use aws_sdk_ec2::Client;
use aws_sdk_ec2::config::retry::RetryConfig;
use aws_sdk_ec2::config::timeout::TimeoutConfig;
use aws_sdk_ec2::config::{BehaviorVersion, Credentials, Region as SdkRegion};
use aws_sdk_ec2::types::{Filter, LaunchPermission, LaunchPermissionModifications, PermissionGroup, Tag};
use tracing::debug;
use uuid::Uuid;

use crate::backend::{BackendFuture, CopyRequest, DescribeRequest, ImageChanges, ImageService};
use crate::image::Image;
use crate::region::Region;

pub use error::Ec2ServiceError;
use error::tolerate_dry_run;

/// Connect and per-operation timeout shared by every regional client.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const CREDENTIALS_PROVIDER: &str = "images-static";

/// Static credentials shared by every regional client.
#[derive(Clone, Eq, PartialEq)]
pub struct StaticCredentials {
    access_key: String,
    secret_key: String,
}

impl StaticCredentials {
    /// Wraps an access key pair.
    #[must_use]
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"** redacted **")
            .finish()
    }
}

/// Regional EC2 client.
#[derive(Clone, Debug)]
pub struct Ec2Service {
    region: Region,
    client: Client,
}

impl Ec2Service {
    /// Builds a client for `region`. No request is sent.
    ///
    /// SDK-level retries are disabled: a failed regional call is reported
    /// as-is and never retried.
    #[must_use]
    pub fn new(region: &Region, credentials: &StaticCredentials) -> Self {
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(HTTP_TIMEOUT)
            .operation_timeout(HTTP_TIMEOUT)
            .build();
        let config = aws_sdk_ec2::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(SdkRegion::new(region.as_str().to_owned()))
            .credentials_provider(Credentials::new(
                credentials.access_key.clone(),
                credentials.secret_key.clone(),
                None,
                None,
                CREDENTIALS_PROVIDER,
            ))
            .timeout_config(timeouts)
            .retry_config(RetryConfig::disabled())
            .build();
        Self {
            region: region.clone(),
            client: Client::from_conf(config),
        }
    }

    /// Region this client is bound to.
    #[must_use]
    pub const fn region(&self) -> &Region {
        &self.region
    }

    async fn describe_images(
        &self,
        request: &DescribeRequest,
    ) -> Result<Vec<Image>, Ec2ServiceError> {
        let filters = request
            .filters
            .iter()
            .map(|(name, values)| {
                Filter::builder()
                    .name(name)
                    .set_values(Some(values.clone()))
                    .build()
            })
            .collect::<Vec<_>>();
        let output = self
            .client
            .describe_images()
            .set_owners(non_empty(&request.owners))
            .set_image_ids(non_empty(&request.image_ids))
            .set_filters(if filters.is_empty() { None } else { Some(filters) })
            .send()
            .await
            .map_err(|err| Ec2ServiceError::from_sdk("DescribeImages", &err))?;
        let images: Vec<Image> = output.images().iter().map(Image::from).collect();
        debug!(region = %self.region, count = images.len(), "described images");
        Ok(images)
    }

    async fn copy_image(&self, request: &CopyRequest) -> Result<Option<String>, Ec2ServiceError> {
        let result = self
            .client
            .copy_image()
            .source_region(request.source_region.as_str())
            .source_image_id(&request.source_image_id)
            .name(&request.name)
            .set_description(request.description.clone())
            .client_token(Uuid::new_v4().to_string())
            .dry_run(request.dry_run)
            .send()
            .await
            .map_err(|err| Ec2ServiceError::from_sdk("CopyImage", &err));
        let Some(output) = tolerate_dry_run(result)? else {
            return Ok(None);
        };
        output
            .image_id()
            .map(|id| Some(id.to_owned()))
            .ok_or(Ec2ServiceError::MissingField {
                operation: "CopyImage",
                field: "ImageId",
            })
    }

    async fn deregister_image(&self, image_id: &str, dry_run: bool) -> Result<(), Ec2ServiceError> {
        let result = self
            .client
            .deregister_image()
            .image_id(image_id)
            .dry_run(dry_run)
            .send()
            .await
            .map_err(|err| Ec2ServiceError::from_sdk("DeregisterImage", &err));
        tolerate_dry_run(result)?;
        Ok(())
    }

    async fn modify_image(
        &self,
        image_id: &str,
        changes: &ImageChanges,
        dry_run: bool,
    ) -> Result<(), Ec2ServiceError> {
        if changes.touches_launch_permission() {
            let result = self
                .client
                .modify_image_attribute()
                .image_id(image_id)
                .launch_permission(launch_permission_changes(changes))
                .dry_run(dry_run)
                .send()
                .await
                .map_err(|err| Ec2ServiceError::from_sdk("ModifyImageAttribute", &err));
            tolerate_dry_run(result)?;
        }

        if !changes.create_tags.is_empty() {
            let tags = changes
                .create_tags
                .iter()
                .map(|(key, value)| Tag::builder().key(key).value(value).build())
                .collect::<Vec<_>>();
            let result = self
                .client
                .create_tags()
                .resources(image_id)
                .set_tags(Some(tags))
                .dry_run(dry_run)
                .send()
                .await
                .map_err(|err| Ec2ServiceError::from_sdk("CreateTags", &err));
            tolerate_dry_run(result)?;
        }

        if !changes.delete_tags.is_empty() {
            let tags = changes
                .delete_tags
                .iter()
                .map(|key| Tag::builder().key(key).build())
                .collect::<Vec<_>>();
            let result = self
                .client
                .delete_tags()
                .resources(image_id)
                .set_tags(Some(tags))
                .dry_run(dry_run)
                .send()
                .await
                .map_err(|err| Ec2ServiceError::from_sdk("DeleteTags", &err));
            tolerate_dry_run(result)?;
        }

        Ok(())
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

fn launch_permission_changes(changes: &ImageChanges) -> LaunchPermissionModifications {
    let mut added: Vec<LaunchPermission> = changes
        .add_launch_users
        .iter()
        .map(|user| LaunchPermission::builder().user_id(user).build())
        .collect();
    let mut removed: Vec<LaunchPermission> = changes
        .remove_launch_users
        .iter()
        .map(|user| LaunchPermission::builder().user_id(user).build())
        .collect();
    let everyone = LaunchPermission::builder()
        .group(PermissionGroup::All)
        .build();
    match changes.public {
        Some(true) => added.push(everyone),
        Some(false) => removed.push(everyone),
        None => {}
    }
    LaunchPermissionModifications::builder()
        .set_add(if added.is_empty() { None } else { Some(added) })
        .set_remove(if removed.is_empty() { None } else { Some(removed) })
        .build()
}

impl ImageService for Ec2Service {
    type Error = Ec2ServiceError;

    fn describe<'a>(
        &'a self,
        request: &'a DescribeRequest,
    ) -> BackendFuture<'a, Vec<Image>, Self::Error> {
        Box::pin(self.describe_images(request))
    }

    fn copy<'a>(
        &'a self,
        request: &'a CopyRequest,
    ) -> BackendFuture<'a, Option<String>, Self::Error> {
        Box::pin(self.copy_image(request))
    }

    fn deregister<'a>(
        &'a self,
        image_id: &'a str,
        dry_run: bool,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(self.deregister_image(image_id, dry_run))
    }

    fn modify<'a>(
        &'a self,
        image_id: &'a str,
        changes: &'a ImageChanges,
        dry_run: bool,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(self.modify_image(image_id, changes, dry_run))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn public_flag_maps_to_group_all() {
        let changes = ImageChanges {
            add_launch_users: vec![String::from("111122223333")],
            public: Some(false),
            ..ImageChanges::default()
        };

        let modifications = launch_permission_changes(&changes);

        assert_eq!(modifications.add().len(), 1);
        assert_eq!(
            modifications.add().first().and_then(LaunchPermission::user_id),
            Some("111122223333")
        );
        assert_eq!(
            modifications.remove().first().and_then(LaunchPermission::group),
            Some(&PermissionGroup::All)
        );
    }

    #[tokio::test]
    async fn client_construction_is_local() {
        let service = Ec2Service::new(
            &Region::from("eu-west-1"),
            &StaticCredentials::new("AKIDEXAMPLE", "secret"),
        );
        assert_eq!(service.region().as_str(), "eu-west-1");
    }

    #[rstest]
    fn credentials_debug_redacts_secret() {
        let rendered = format!("{:?}", StaticCredentials::new("AKIDEXAMPLE", "hunter2"));
        assert!(rendered.contains("AKIDEXAMPLE"));
        assert!(!rendered.contains("hunter2"));
    }
}
