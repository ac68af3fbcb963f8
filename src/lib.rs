//! Core library for the `images` multi-region machine image tool.
//!
//! Every operation is fanned out to one client per configured AWS region and
//! fanned back in to a per-region result map plus an aggregated error naming
//! each region that failed. Partial success is a normal outcome: callers get
//! the regions that answered and the failures side by side.

pub mod backend;
pub mod config;
pub mod ec2;
pub mod fanout;
pub mod help;
pub mod image;
pub mod output;
pub mod provider;
pub mod region;
pub mod registry;
pub mod test_support;

pub use backend::{
    BackendFuture, CopyRequest, CopyRequestBuilder, DescribeRequest, ImageChanges, ImageService,
    RequestError,
};
pub use config::{AwsConfig, ConfigError, ConfigOverrides};
pub use ec2::{Ec2Service, Ec2ServiceError, StaticCredentials};
pub use fanout::{
    FanOutOutcome, MultiImages, MultiRegionError, RegionFailure, RegionMap, UnitError, fan_out,
    fan_out_images,
};
pub use image::{Image, sort_by_creation};
pub use provider::{
    AwsImages, CopyPlan, CopyReport, ImageActionError, ImageActionOutcome, ProviderError,
};
pub use region::{Region, RegionError, RegionSet, resolve_regions};
pub use registry::{ClientRegistry, RegistryError};
