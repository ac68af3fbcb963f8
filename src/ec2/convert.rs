//! Conversion from EC2 image descriptions to [`Image`] records.

use std::collections::BTreeMap;

use aws_sdk_ec2::types;
use tracing::debug;

use crate::image::{Image, parse_creation_date};

fn put(attributes: &mut BTreeMap<String, String>, key: &str, value: Option<&str>) {
    if let Some(present) = value {
        attributes.insert(key.to_owned(), present.to_owned());
    }
}

impl From<&types::Image> for Image {
    fn from(image: &types::Image) -> Self {
        let mut attributes = BTreeMap::new();
        put(&mut attributes, "creation_date", image.creation_date());
        put(&mut attributes, "description", image.description());
        put(
            &mut attributes,
            "architecture",
            image.architecture().map(types::ArchitectureValues::as_str),
        );
        put(
            &mut attributes,
            "virtualization_type",
            image
                .virtualization_type()
                .map(types::VirtualizationType::as_str),
        );
        put(
            &mut attributes,
            "root_device_type",
            image.root_device_type().map(types::DeviceType::as_str),
        );
        put(
            &mut attributes,
            "image_type",
            image.image_type().map(types::ImageTypeValues::as_str),
        );
        put(&mut attributes, "platform_details", image.platform_details());
        if let Some(public) = image.public() {
            attributes.insert(String::from("public"), public.to_string());
        }

        let created_at = image.creation_date().and_then(|raw| {
            let parsed = parse_creation_date(raw);
            if parsed.is_none() {
                debug!(raw, "unparseable image creation date");
            }
            parsed
        });

        let tags = image
            .tags()
            .iter()
            .filter_map(|tag| {
                tag.key()
                    .map(|key| (key.to_owned(), tag.value().unwrap_or_default().to_owned()))
            })
            .collect();

        Self {
            id: image.image_id().unwrap_or_default().to_owned(),
            name: image.name().map(str::to_owned),
            owner_id: image.owner_id().map(str::to_owned),
            created_at,
            state: image.state().map(|state| state.as_str().to_owned()),
            tags,
            attributes,
        }
    }
}
