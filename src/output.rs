//! Rendering of per-region results as tables or JSON.

use std::fmt::Write as _;

use comfy_table::{Table, presets::UTF8_BORDERS_ONLY};
use serde::Serialize;

use crate::fanout::{MultiImages, MultiRegionError, RegionMap};
use crate::image::Image;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders images as one row per image, grouped by region.
#[must_use]
pub fn images_table(images: &MultiImages) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(["REGION", "IMAGE ID", "NAME", "STATE", "CREATED", "TAGS"]);
    for (region, listed) in images {
        for image in listed {
            table.add_row([
                region.to_string(),
                image.id.clone(),
                image.name.clone().unwrap_or_default(),
                image.state.clone().unwrap_or_default(),
                created(image),
                tags(image),
            ]);
        }
    }
    table.to_string()
}

/// Renders copy results; a dry run shows `(dry run)` instead of an id.
#[must_use]
pub fn copies_table(copies: &RegionMap<Option<String>>) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(["REGION", "NEW IMAGE ID"]);
    for (region, image_id) in copies {
        table.add_row([
            region.to_string(),
            image_id.clone().unwrap_or_else(|| String::from("(dry run)")),
        ]);
    }
    table.to_string()
}

/// Pretty JSON rendering of any result map.
///
/// # Errors
///
/// Returns the serializer error, which only happens for non-string keys.
pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// One line per failed region, as written to stderr.
#[must_use]
pub fn failures<E>(error: &MultiRegionError<E>) -> String
where
    E: std::error::Error + 'static,
{
    let mut rendered = String::new();
    for failure in error.failures() {
        writeln!(rendered, "error: {failure}").ok();
    }
    rendered
}

fn created(image: &Image) -> String {
    image
        .created_at
        .map(|timestamp| timestamp.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

fn tags(image: &Image) -> String {
    image
        .tags
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::{RegionFailure, UnitError};
    use crate::region::Region;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use std::fmt;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl std::error::Error for Boom {}

    fn sample() -> MultiImages {
        let created = Utc
            .timestamp_opt(1_704_164_645, 0)
            .single()
            .expect("timestamp should be valid");
        let image = Image::new("ami-1")
            .with_name("golden")
            .with_state("available")
            .with_created_at(created)
            .with_tag("team", "infra");
        [(Region::from("eu-west-1"), vec![image])].into_iter().collect()
    }

    #[rstest]
    fn image_rows_show_region_and_fields() {
        let rendered = images_table(&sample());
        for expected in [
            "eu-west-1",
            "ami-1",
            "golden",
            "available",
            "2024-01-02 03:04:05",
            "team=infra",
        ] {
            assert!(rendered.contains(expected), "missing {expected}: {rendered}");
        }
    }

    #[rstest]
    fn dry_run_copies_are_marked() {
        let copies: RegionMap<Option<String>> = [
            (Region::from("us-east-1"), Some(String::from("ami-new"))),
            (Region::from("us-west-2"), None),
        ]
        .into_iter()
        .collect();
        let rendered = copies_table(&copies);
        assert!(rendered.contains("ami-new"), "{rendered}");
        assert!(rendered.contains("(dry run)"), "{rendered}");
    }

    #[rstest]
    fn json_is_keyed_by_region() {
        let rendered = json(&sample()).expect("images should serialize");
        let parsed: serde_json::Value =
            serde_json::from_str(&rendered).expect("output should be JSON");
        assert_eq!(
            parsed.pointer("/eu-west-1/0/id").and_then(serde_json::Value::as_str),
            Some("ami-1")
        );
    }

    #[rstest]
    fn failures_name_each_region() {
        let error = MultiRegionError::from_failures(vec![
            RegionFailure {
                region: Region::from("us-west-2"),
                cause: UnitError::Call(Boom),
            },
            RegionFailure {
                region: Region::from("ap-south-1"),
                cause: UnitError::Lost,
            },
        ])
        .expect("two failures");
        let rendered = failures(&error);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines.first().copied(),
            Some("error: ap-south-1: regional task ended without reporting a result")
        );
        assert_eq!(lines.get(1).copied(), Some("error: us-west-2: boom"));
    }
}
