//! Static help text for each verb.

/// Options accepted by every verb, with the environment variables that
/// provide their defaults.
pub const GLOBAL_OPTIONS: &str = "
Global options:
  --access-key      <KEY>      AWS access key (env: IMAGES_AWS_ACCESS_KEY)
  --secret-key      <KEY>      AWS secret key (env: IMAGES_AWS_SECRET_KEY)
  --region          <REGIONS>  Comma separated regions or `all` (env: IMAGES_AWS_REGION)
  --region-exclude  <REGIONS>  Regions to skip (env: IMAGES_AWS_REGION_EXCLUDE)
";

const LIST: &str = "Usage: images list [options]

 List images in every configured region, oldest first.

Options:
  --owner      <OWNER>     Image owner, repeatable (default: self)
  --image-ids  <IDS>       Comma separated image ids
  --name       <PATTERN>   Name filter, `*` and `?` wildcards allowed
  --json                   Print JSON keyed by region
";

const COPY: &str = "Usage: images copy --image <ID> [options]

 Copy an image into other regions.

Options:
  --image          <ID>       Image to copy (required)
  --source-region  <REGION>   Region holding the image (default: looked up)
  --to             <REGIONS>  Comma separated destinations (default: every other region)
  --name           <NAME>     Name of the copies (default: source image name)
  --desc           <TEXT>     Description of the copies
  --dry-run                   Check permissions without copying
  --json                      Print JSON keyed by region
";

const DELETE: &str = "Usage: images delete --image-ids <IDS> [options]

 Deregister images owned by this account in every region holding them.

Options:
  --image-ids  <IDS>   Comma separated image ids (required)
  --dry-run            Check permissions without deregistering
  --json               Print JSON keyed by region
";

const MODIFY: &str = "Usage: images modify --image-ids <IDS> [options]

 Change launch permissions and tags of images owned by this account.

Options:
  --image-ids     <IDS>        Comma separated image ids (required)
  --add-users     <ACCOUNTS>   Grant launch permission to account ids
  --remove-users  <ACCOUNTS>   Revoke launch permission from account ids
  --public                     Allow everyone to launch the images
  --private                    Revoke public launch permission
  --create-tags   <TAGS>       Tags to set, as key=value,...
  --delete-tags   <KEYS>       Tag keys to remove, as key,...
  --dry-run                    Check permissions without modifying
  --json                       Print JSON keyed by region
";

const OVERVIEW: &str = "Usage: images <command> [options]

Commands:
  list     List images in every configured region
  copy     Copy an image into other regions
  delete   Deregister images
  modify   Change launch permissions and tags
  help     Show help for a command
";

/// Help text for `verb`, followed by the global options. Unknown verbs get
/// a one-line notice instead.
#[must_use]
pub fn help(verb: &str) -> String {
    let body = match verb {
        "list" => LIST,
        "copy" => COPY,
        "delete" => DELETE,
        "modify" => MODIFY,
        _ => return format!("no help found for command {verb}"),
    };
    format!("{body}{GLOBAL_OPTIONS}")
}

/// Help text listing every verb.
#[must_use]
pub fn overview() -> String {
    format!("{OVERVIEW}{GLOBAL_OPTIONS}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("list", "Usage: images list")]
    #[case("copy", "--source-region")]
    #[case("delete", "--image-ids")]
    #[case("modify", "--create-tags")]
    fn known_verbs_include_global_options(#[case] verb: &str, #[case] expected: &str) {
        let text = help(verb);
        assert!(text.contains(expected), "{text}");
        assert!(text.contains("IMAGES_AWS_REGION_EXCLUDE"), "{text}");
    }

    #[rstest]
    #[case("frobnicate")]
    #[case("")]
    fn unknown_verbs_get_literal_notice(#[case] verb: &str) {
        assert_eq!(help(verb), format!("no help found for command {verb}"));
    }

    #[rstest]
    fn overview_lists_every_verb() {
        let text = overview();
        for verb in ["list", "copy", "delete", "modify", "help"] {
            assert!(text.contains(verb), "{text}");
        }
    }
}
