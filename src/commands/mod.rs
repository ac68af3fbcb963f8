//! Verb handlers for the `images` binary.
//!
//! Each handler turns parsed arguments into one provider call, prints the
//! successful regions to stdout and the failed ones to stderr, and returns
//! the process exit code.

use std::collections::BTreeSet;
use std::io::{self, Write};

use thiserror::Error;
use tracing::warn;

use images::backend::{DescribeRequest, ImageChanges, RequestError, SELF_OWNER, parse_tags};
use images::config::{AwsConfig, ConfigError, ConfigOverrides};
use images::fanout::{MultiImages, MultiRegionError};
use images::provider::{
    AwsImages, CopyPlan, IMAGE_ID_FILTER, ImageActionError, ProviderError, unmatched_ids,
};
use images::{ImageService, Region, help, output};

use crate::cli::{
    Cli, Command, CopyCommand, DeleteCommand, GlobalArgs, HelpCommand, ListCommand, ModifyCommand,
};

/// Provider filter matching image names.
const NAME_FILTER: &str = "name";

/// Errors that end a verb before any result is printed.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The provider rejected the verb before fanning out.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// An argument could not be parsed.
    #[error("invalid argument: {0}")]
    Request(#[from] RequestError),
    /// Results could not be serialised.
    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),
    /// Writing to stdout or stderr failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Destination streams for results and diagnostics.
pub(crate) struct Console<O, E> {
    /// Results.
    pub(crate) out: O,
    /// Warnings and regional failures.
    pub(crate) err: E,
}

impl Console<io::Stdout, io::Stderr> {
    /// Console bound to the process streams.
    pub(crate) fn stdio() -> Self {
        Self {
            out: io::stdout(),
            err: io::stderr(),
        }
    }
}

impl From<GlobalArgs> for ConfigOverrides {
    fn from(args: GlobalArgs) -> Self {
        Self {
            region: args.region,
            region_exclude: args.region_exclude,
            access_key: args.access_key,
            secret_key: args.secret_key,
        }
    }
}

/// Runs the parsed command line against EC2.
///
/// `help` never loads configuration, so it works before credentials are
/// set up.
pub(crate) async fn dispatch<O, E>(cli: Cli, console: &mut Console<O, E>) -> Result<i32, CliError>
where
    O: Write,
    E: Write,
{
    let Cli { global, command } = cli;
    if let Command::Help(args) = command {
        return write_help(&args, console);
    }

    let config = AwsConfig::load_without_cli_args()?.with_overrides(global.into());
    let images = AwsImages::new(&config)?;
    run(&images, command, console).await
}

/// Runs one verb against the regions of `images`.
pub(crate) async fn run<S, O, E>(
    images: &AwsImages<S>,
    command: Command,
    console: &mut Console<O, E>,
) -> Result<i32, CliError>
where
    S: ImageService,
    O: Write,
    E: Write,
{
    match command {
        Command::List(args) => list(images, args, console).await,
        Command::Copy(args) => copy(images, args, console).await,
        Command::Delete(args) => delete(images, args, console).await,
        Command::Modify(args) => modify(images, args, console).await,
        Command::Help(args) => write_help(&args, console),
    }
}

fn write_help<O, E>(args: &HelpCommand, console: &mut Console<O, E>) -> Result<i32, CliError>
where
    O: Write,
{
    let text = args.verb.as_deref().map_or_else(help::overview, help::help);
    writeln!(console.out, "{text}")?;
    Ok(0)
}

fn describe_request(args: &ListCommand) -> DescribeRequest {
    let owners: Vec<&str> = args
        .owners
        .iter()
        .map(|owner| owner.trim())
        .filter(|owner| !owner.is_empty())
        .collect();
    let mut request = if owners.is_empty() {
        DescribeRequest::default().owner(SELF_OWNER)
    } else {
        owners
            .into_iter()
            .fold(DescribeRequest::default(), |request, owner| request.owner(owner))
    };
    let ids = non_blank(&args.image_ids);
    if !ids.is_empty() {
        request = request.filter(IMAGE_ID_FILTER, ids);
    }
    if let Some(name) = args.name.as_deref().map(str::trim).filter(|name| !name.is_empty()) {
        request = request.filter(NAME_FILTER, [name]);
    }
    request
}

async fn list<S, O, E>(
    images: &AwsImages<S>,
    args: ListCommand,
    console: &mut Console<O, E>,
) -> Result<i32, CliError>
where
    S: ImageService,
    O: Write,
    E: Write,
{
    let (results, error) = images.list(describe_request(&args)).await.into_parts();
    write_images(&results, args.json, console)?;
    finish(error.as_ref(), console)
}

async fn copy<S, O, E>(
    images: &AwsImages<S>,
    args: CopyCommand,
    console: &mut Console<O, E>,
) -> Result<i32, CliError>
where
    S: ImageService,
    O: Write,
    E: Write,
{
    let destinations: BTreeSet<Region> = non_blank(&args.to)
        .into_iter()
        .map(Region::from)
        .collect();
    let plan = CopyPlan {
        image_id: args.image,
        source_region: args
            .source_region
            .map(Region::from)
            .filter(|region| !region.is_empty()),
        destinations: if destinations.is_empty() {
            None
        } else {
            Some(destinations)
        },
        name: args.name,
        description: args.description,
        dry_run: args.dry_run,
    };
    let report = images.copy(plan).await?;
    let (copies, error) = report.outcome.into_parts();
    if args.json {
        writeln!(console.out, "{}", output::json(&copies)?)?;
    } else {
        writeln!(
            console.out,
            "{} from {} as {}",
            report.request.source_image_id, report.request.source_region, report.request.name
        )?;
        writeln!(console.out, "{}", output::copies_table(&copies))?;
    }
    finish(error.as_ref(), console)
}

async fn delete<S, O, E>(
    images: &AwsImages<S>,
    args: DeleteCommand,
    console: &mut Console<O, E>,
) -> Result<i32, CliError>
where
    S: ImageService,
    O: Write,
    E: Write,
{
    let (results, error) = images
        .delete(&args.image_ids, args.dry_run)
        .await?
        .into_parts();
    write_images(&results, args.json, console)?;
    warn_unmatched(&args.image_ids, &results, error.as_ref(), console)?;
    finish(error.as_ref(), console)
}

async fn modify<S, O, E>(
    images: &AwsImages<S>,
    args: ModifyCommand,
    console: &mut Console<O, E>,
) -> Result<i32, CliError>
where
    S: ImageService,
    O: Write,
    E: Write,
{
    let changes = ImageChanges {
        add_launch_users: non_blank(&args.add_users),
        remove_launch_users: non_blank(&args.remove_users),
        public: match (args.public, args.private) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        },
        create_tags: args
            .create_tags
            .as_deref()
            .map(parse_tags)
            .transpose()?
            .unwrap_or_default(),
        delete_tags: non_blank(&args.delete_tags),
    };
    let (results, error) = images
        .modify(&args.image_ids, changes, args.dry_run)
        .await?
        .into_parts();
    write_images(&results, args.json, console)?;
    warn_unmatched(&args.image_ids, &results, error.as_ref(), console)?;
    finish(error.as_ref(), console)
}

fn write_images<O, E>(
    results: &MultiImages,
    json: bool,
    console: &mut Console<O, E>,
) -> Result<(), CliError>
where
    O: Write,
{
    let rendered = if json {
        output::json(results)?
    } else {
        output::images_table(results)
    };
    writeln!(console.out, "{rendered}")?;
    Ok(())
}

/// Warns about requested ids no region reported. When some regions failed
/// their holdings are unknown, so the warning only speaks for the others.
fn warn_unmatched<F, O, E>(
    image_ids: &[String],
    results: &MultiImages,
    error: Option<&MultiRegionError<ImageActionError<F>>>,
    console: &mut Console<O, E>,
) -> io::Result<()>
where
    F: std::error::Error + 'static,
    E: Write,
{
    let scope = if error.is_some() {
        "any region that answered"
    } else {
        "any region"
    };
    for image_id in unmatched_ids(image_ids, results, error) {
        warn!(image = %image_id, scope, "image not found");
        writeln!(console.err, "warning: image {image_id} not found in {scope}")?;
    }
    Ok(())
}

/// Reports regional failures and picks the exit code.
fn finish<F, O, E>(
    error: Option<&MultiRegionError<F>>,
    console: &mut Console<O, E>,
) -> Result<i32, CliError>
where
    F: std::error::Error + 'static,
    E: Write,
{
    let Some(failed) = error else {
        return Ok(0);
    };
    write!(console.err, "{}", output::failures(failed))?;
    Ok(1)
}

fn non_blank(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests;
