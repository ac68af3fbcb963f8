//! Command-line interface definitions for the `images` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `images` binary.
#[derive(Debug, Parser)]
#[command(
    name = "images",
    about = "Query and manage machine images across every AWS region at once",
    arg_required_else_help = true,
    disable_help_subcommand = true
)]
pub(crate) struct Cli {
    /// Connection settings shared by every verb.
    #[command(flatten)]
    pub(crate) global: GlobalArgs,
    /// Verb to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Overrides for values otherwise read from configuration files and the
/// `IMAGES_AWS_*` environment variables.
#[derive(Debug, Default, Args)]
pub(crate) struct GlobalArgs {
    /// Comma separated regions, or `all` for every known region.
    #[arg(long, global = true, value_name = "REGIONS")]
    pub(crate) region: Option<String>,
    /// Comma separated regions to skip, or `all`.
    #[arg(long, global = true, value_name = "REGIONS")]
    pub(crate) region_exclude: Option<String>,
    /// AWS access key id.
    #[arg(long, global = true, value_name = "KEY")]
    pub(crate) access_key: Option<String>,
    /// AWS secret access key.
    #[arg(long, global = true, value_name = "KEY")]
    pub(crate) secret_key: Option<String>,
}

/// Verbs understood by the binary.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List images in every configured region.
    #[command(name = "list", about = "List images in every configured region")]
    List(ListCommand),
    /// Copy an image into other regions.
    #[command(name = "copy", about = "Copy an image into other regions")]
    Copy(CopyCommand),
    /// Deregister images.
    #[command(name = "delete", about = "Deregister images owned by this account")]
    Delete(DeleteCommand),
    /// Change launch permissions and tags.
    #[command(name = "modify", about = "Change launch permissions and tags")]
    Modify(ModifyCommand),
    /// Show help for a verb.
    #[command(name = "help", about = "Show help for a command")]
    Help(HelpCommand),
}

/// Arguments for `images list`.
#[derive(Debug, Default, Args)]
pub(crate) struct ListCommand {
    /// Image owner (account id, `self`, `amazon`, ...); repeatable.
    #[arg(long = "owner", value_name = "OWNER")]
    pub(crate) owners: Vec<String>,
    /// Comma separated image ids.
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub(crate) image_ids: Vec<String>,
    /// Name filter; `*` and `?` wildcards are allowed.
    #[arg(long, value_name = "PATTERN")]
    pub(crate) name: Option<String>,
    /// Print JSON keyed by region.
    #[arg(long)]
    pub(crate) json: bool,
}

/// Arguments for `images copy`.
#[derive(Debug, Default, Args)]
pub(crate) struct CopyCommand {
    /// Image to copy.
    #[arg(long, value_name = "ID")]
    pub(crate) image: String,
    /// Region holding the image; looked up across regions when omitted.
    #[arg(long, value_name = "REGION")]
    pub(crate) source_region: Option<String>,
    /// Comma separated destination regions; every other region by default.
    #[arg(long, value_name = "REGIONS", value_delimiter = ',')]
    pub(crate) to: Vec<String>,
    /// Name of the copies; the source image name by default.
    #[arg(long, value_name = "NAME")]
    pub(crate) name: Option<String>,
    /// Description of the copies.
    #[arg(long = "desc", value_name = "TEXT")]
    pub(crate) description: Option<String>,
    /// Check permissions without copying.
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Print JSON keyed by region.
    #[arg(long)]
    pub(crate) json: bool,
}

/// Arguments for `images delete`.
#[derive(Debug, Default, Args)]
pub(crate) struct DeleteCommand {
    /// Comma separated image ids.
    #[arg(long, value_name = "IDS", value_delimiter = ',', required = true)]
    pub(crate) image_ids: Vec<String>,
    /// Check permissions without deregistering.
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Print JSON keyed by region.
    #[arg(long)]
    pub(crate) json: bool,
}

/// Arguments for `images modify`.
#[derive(Debug, Default, Args)]
pub(crate) struct ModifyCommand {
    /// Comma separated image ids.
    #[arg(long, value_name = "IDS", value_delimiter = ',', required = true)]
    pub(crate) image_ids: Vec<String>,
    /// Account ids granted launch permission.
    #[arg(long, value_name = "ACCOUNTS", value_delimiter = ',')]
    pub(crate) add_users: Vec<String>,
    /// Account ids whose launch permission is revoked.
    #[arg(long, value_name = "ACCOUNTS", value_delimiter = ',')]
    pub(crate) remove_users: Vec<String>,
    /// Allow everyone to launch the images.
    #[arg(long, conflicts_with = "private")]
    pub(crate) public: bool,
    /// Revoke public launch permission.
    #[arg(long)]
    pub(crate) private: bool,
    /// Tags to set, as `key=value,...`.
    #[arg(long, value_name = "TAGS")]
    pub(crate) create_tags: Option<String>,
    /// Tag keys to remove, as `key,...`.
    #[arg(long, value_name = "KEYS", value_delimiter = ',')]
    pub(crate) delete_tags: Vec<String>,
    /// Check permissions without modifying.
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Print JSON keyed by region.
    #[arg(long)]
    pub(crate) json: bool,
}

/// Arguments for `images help`.
#[derive(Debug, Default, Args)]
pub(crate) struct HelpCommand {
    /// Verb to describe.
    #[arg(value_name = "COMMAND")]
    pub(crate) verb: Option<String>,
}
