//! Unit tests for region resolution.

use super::*;
use rstest::rstest;

fn names(regions: &BTreeSet<Region>) -> Vec<&str> {
    regions.iter().map(Region::as_str).collect()
}

#[rstest]
fn resolves_explicit_inclusion_list() {
    let regions = resolve_regions("us-east-1,us-west-2", "");
    assert_eq!(names(&regions), vec!["us-east-1", "us-west-2"]);
}

#[rstest]
fn all_sentinel_expands_to_catalog_minus_exclusions() {
    let regions = resolve_regions("all", "us-west-2");
    assert_eq!(regions.len(), ALL_REGIONS.len() - 1);
    assert!(!regions.contains(&Region::from("us-west-2")));
    assert!(regions.contains(&Region::from("us-east-1")));
}

#[rstest]
fn excluding_all_yields_empty_set() {
    assert!(resolve_regions("us-east-1,eu-west-1", "all").is_empty());
}

#[rstest]
#[case(" us-east-1 , ,us-west-2,", vec!["us-east-1", "us-west-2"])]
#[case("eu-west-1,eu-west-1", vec!["eu-west-1"])]
#[case("", vec![])]
fn parses_trims_and_deduplicates(#[case] spec: &str, #[case] expected: Vec<&str>) {
    let parsed = parse_region_list(spec);
    let actual: Vec<&str> = parsed.iter().map(String::as_str).collect();
    assert_eq!(actual, expected);
}

#[rstest]
fn region_set_rejects_empty_difference() {
    let err = RegionSet::resolve("us-east-1", "us-east-1").expect_err("set should be empty");
    assert_eq!(
        err,
        RegionError::Empty {
            include: String::from("us-east-1"),
            exclude: String::from("us-east-1"),
        }
    );
}

#[rstest]
fn region_set_keeps_resolved_members() {
    let set = RegionSet::resolve("eu-west-1, us-east-1", "").expect("set should resolve");
    assert_eq!(set.len(), 2);
    assert!(set.contains(&Region::from("eu-west-1")));
    assert!(!set.is_empty());
}

#[rstest]
fn catalog_has_no_duplicates() {
    let unique: BTreeSet<&str> = ALL_REGIONS.iter().copied().collect();
    assert_eq!(unique.len(), ALL_REGIONS.len());
}
