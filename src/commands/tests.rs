//! Unit tests for the verb handlers.

use super::*;
use crate::cli::HelpCommand;
use images::Image;
use images::test_support::{ScriptedFleet, ScriptedService, ServiceCall};
use rstest::rstest;

const REGIONS: &[&str] = &["eu-west-1", "us-east-1"];

type Captured = Console<Vec<u8>, Vec<u8>>;

fn console() -> Captured {
    Console {
        out: Vec::new(),
        err: Vec::new(),
    }
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8(bytes.to_vec()).expect("output should be utf8")
}

fn provider(fleet: &ScriptedFleet) -> AwsImages<ScriptedService> {
    AwsImages::from_registry(fleet.registry().expect("fleet should build a registry"))
}

#[rstest]
#[case(Some("list"), "Usage: images list")]
#[case(Some("nope"), "no help found for command nope")]
#[case(None, "Commands:")]
#[tokio::test]
async fn help_is_printed_without_configuration(
    #[case] verb: Option<&str>,
    #[case] expected: &str,
) {
    let mut captured = console();
    let cli = Cli {
        global: GlobalArgs::default(),
        command: Command::Help(HelpCommand {
            verb: verb.map(str::to_owned),
        }),
    };

    let code = dispatch(cli, &mut captured).await.expect("help should print");

    assert_eq!(code, 0);
    let rendered = text(&captured.out);
    assert!(rendered.contains(expected), "{rendered}");
}

#[rstest]
fn list_defaults_to_own_images() {
    let request = describe_request(&ListCommand::default());
    assert_eq!(request.owners, vec![String::from(SELF_OWNER)]);
    assert!(request.filters.is_empty());
}

#[rstest]
fn list_maps_ids_and_name_to_filters() {
    let request = describe_request(&ListCommand {
        owners: vec![String::from("amazon"), String::from(" ")],
        image_ids: vec![String::from("ami-1"), String::new()],
        name: Some(String::from("golden-*")),
        json: false,
    });
    assert_eq!(request.owners, vec![String::from("amazon")]);
    assert_eq!(
        request.filters.get(IMAGE_ID_FILTER),
        Some(&vec![String::from("ami-1")])
    );
    assert_eq!(
        request.filters.get(NAME_FILTER),
        Some(&vec![String::from("golden-*")])
    );
    assert!(request.image_ids.is_empty());
}

#[tokio::test]
async fn list_prints_partial_results_and_fails() {
    let fleet = ScriptedFleet::new(REGIONS)
        .with_service(
            ScriptedService::new("eu-west-1").with_images(vec![Image::new("ami-1")]),
        )
        .with_service(ScriptedService::new("us-east-1").failing("auth failure"));
    let mut captured = console();

    let code = run(
        &provider(&fleet),
        Command::List(ListCommand {
            json: true,
            ..ListCommand::default()
        }),
        &mut captured,
    )
    .await
    .expect("list should run");

    assert_eq!(code, 1);
    let stdout = text(&captured.out);
    assert!(stdout.contains("\"eu-west-1\""), "{stdout}");
    assert!(stdout.contains("ami-1"), "{stdout}");
    let stderr = text(&captured.err);
    assert!(stderr.contains("error: us-east-1:"), "{stderr}");
    assert!(stderr.contains("auth failure"), "{stderr}");
}

#[tokio::test]
async fn copy_prints_new_ids_per_region() {
    let fleet = ScriptedFleet::new(REGIONS).with_service(
        ScriptedService::new("us-east-1")
            .with_images(vec![Image::new("ami-src").with_name("golden")]),
    );
    let mut captured = console();

    let code = run(
        &provider(&fleet),
        Command::Copy(CopyCommand {
            image: String::from("ami-src"),
            ..CopyCommand::default()
        }),
        &mut captured,
    )
    .await
    .expect("copy should run");

    assert_eq!(code, 0);
    let stdout = text(&captured.out);
    assert!(stdout.contains("ami-src from us-east-1 as golden"), "{stdout}");
    assert!(stdout.contains("ami-src-copy-eu-west-1"), "{stdout}");
}

#[tokio::test]
async fn copy_to_unknown_region_is_an_error() {
    let fleet = ScriptedFleet::new(REGIONS);
    let mut captured = console();

    let err = run(
        &provider(&fleet),
        Command::Copy(CopyCommand {
            image: String::from("ami-src"),
            source_region: Some(String::from("us-east-1")),
            to: vec![String::from("mars-north-1")],
            name: Some(String::from("copy")),
            ..CopyCommand::default()
        }),
        &mut captured,
    )
    .await
    .expect_err("unknown destination should fail");

    assert!(err.to_string().contains("mars-north-1"), "{err}");
}

#[tokio::test]
async fn delete_warns_about_unmatched_ids() {
    let fleet = ScriptedFleet::new(REGIONS)
        .with_service(ScriptedService::new("eu-west-1").with_images(vec![Image::new("ami-1")]));
    let mut captured = console();

    let code = run(
        &provider(&fleet),
        Command::Delete(DeleteCommand {
            image_ids: vec![String::from("ami-1"), String::from("ami-9")],
            dry_run: false,
            json: false,
        }),
        &mut captured,
    )
    .await
    .expect("delete should run");

    assert_eq!(code, 0);
    assert!(text(&captured.out).contains("ami-1"));
    assert_eq!(
        text(&captured.err),
        "warning: image ami-9 not found in any region\n"
    );
}

#[tokio::test]
async fn delete_does_not_claim_absence_for_regions_that_failed() {
    let fleet = ScriptedFleet::new(REGIONS).with_service(
        ScriptedService::new("eu-west-1")
            .with_images(vec![Image::new("ami-1")])
            .failing("throttled"),
    );
    let mut captured = console();

    let code = run(
        &provider(&fleet),
        Command::Delete(DeleteCommand {
            image_ids: vec![String::from("ami-1")],
            dry_run: false,
            json: false,
        }),
        &mut captured,
    )
    .await
    .expect("delete should run");

    assert_eq!(code, 1);
    let stderr = text(&captured.err);
    let (warnings, errors) = stderr.split_at(stderr.find("error: ").unwrap_or(stderr.len()));
    assert_eq!(
        warnings,
        "warning: image ami-1 not found in any region that answered\n"
    );
    assert!(errors.starts_with("error: eu-west-1: "), "{stderr}");
    assert!(errors.contains("throttled"), "{stderr}");
}

#[tokio::test]
async fn delete_reports_images_removed_before_a_failure() {
    let fleet = ScriptedFleet::new(REGIONS).with_service(
        ScriptedService::new("us-east-1")
            .with_images(vec![Image::new("ami-1"), Image::new("ami-2")])
            .refusing("ami-2"),
    );
    let mut captured = console();

    let code = run(
        &provider(&fleet),
        Command::Delete(DeleteCommand {
            image_ids: vec![String::from("ami-1"), String::from("ami-2")],
            dry_run: false,
            json: false,
        }),
        &mut captured,
    )
    .await
    .expect("delete should run");

    assert_eq!(code, 1);
    let stderr = text(&captured.err);
    assert!(!stderr.contains("warning:"), "{stderr}");
    assert!(
        stderr.contains("error: us-east-1: ami-2: ") && stderr.contains("(already handled: ami-1)"),
        "{stderr}"
    );
}

#[tokio::test]
async fn modify_builds_changes_from_flags() {
    let service = ScriptedService::new("us-east-1").with_images(vec![Image::new("ami-1")]);
    let fleet = ScriptedFleet::new(REGIONS).with_service(service.clone());
    let mut captured = console();

    let code = run(
        &provider(&fleet),
        Command::Modify(ModifyCommand {
            image_ids: vec![String::from("ami-1")],
            add_users: vec![String::from("111122223333")],
            private: true,
            create_tags: Some(String::from("team=infra")),
            delete_tags: vec![String::from("stale")],
            dry_run: true,
            ..ModifyCommand::default()
        }),
        &mut captured,
    )
    .await
    .expect("modify should run");

    assert_eq!(code, 0);
    let modified = service.calls().into_iter().find_map(|call| match call {
        ServiceCall::Modify {
            changes, dry_run, ..
        } => Some((changes, dry_run)),
        _ => None,
    });
    let (changes, dry_run) = modified.expect("modify should reach the region");
    assert!(dry_run);
    assert_eq!(changes.add_launch_users, vec![String::from("111122223333")]);
    assert_eq!(changes.public, Some(false));
    assert_eq!(
        changes.create_tags.get("team").map(String::as_str),
        Some("infra")
    );
    assert_eq!(changes.delete_tags, vec![String::from("stale")]);
}

#[tokio::test]
async fn malformed_tags_are_rejected() {
    let fleet = ScriptedFleet::new(REGIONS);
    let mut captured = console();

    let err = run(
        &provider(&fleet),
        Command::Modify(ModifyCommand {
            image_ids: vec![String::from("ami-1")],
            create_tags: Some(String::from("novalue")),
            ..ModifyCommand::default()
        }),
        &mut captured,
    )
    .await
    .expect_err("malformed tag should fail");

    assert!(matches!(err, CliError::Request(RequestError::MalformedTag(_))), "{err:?}");
}
