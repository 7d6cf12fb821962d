//! Custom item descriptors handed to extensions through item definition events.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TEXTURE_SIZE: u32 = 16;

/// How a custom item is matched against the base item it extends.
///
/// At least one matcher has to be present for the item to be registrable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CustomItemOptions {
    #[serde(default)]
    pub unbreakable: Option<bool>,
    #[serde(default)]
    pub custom_model_data: Option<i32>,
    #[serde(default)]
    pub damage_predicate: Option<i32>,
}

impl CustomItemOptions {
    pub fn has_custom_item_options(&self) -> bool {
        self.unbreakable.is_some()
            || self.custom_model_data.is_some()
            || self.damage_predicate.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct OffsetXyz {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl OffsetXyz {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Offset {
    #[serde(default)]
    pub position: Option<OffsetXyz>,
    #[serde(default)]
    pub rotation: Option<OffsetXyz>,
    #[serde(default)]
    pub scale: Option<OffsetXyz>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Hand {
    #[serde(default)]
    pub first_person: Option<Offset>,
    #[serde(default)]
    pub third_person: Option<Offset>,
}

/// Render offsets per hand. `None` renders the item normally.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CustomRenderOffsets {
    #[serde(default)]
    pub main_hand: Option<Hand>,
    #[serde(default)]
    pub off_hand: Option<Hand>,
}

/// Data describing one custom item.
///
/// Deserialization goes through [`CustomItemData::new`], so the same checks
/// apply to items read from disk.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "RawCustomItemData")]
pub struct CustomItemData {
    name: String,
    options: CustomItemOptions,
    display_name: String,
    allow_offhand: bool,
    texture_size: u32,
    render_offsets: Option<CustomRenderOffsets>,
}

#[derive(Deserialize)]
struct RawCustomItemData {
    name: String,
    #[serde(default)]
    options: CustomItemOptions,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    allow_offhand: bool,
    #[serde(default = "default_texture_size")]
    texture_size: u32,
    #[serde(default)]
    render_offsets: Option<CustomRenderOffsets>,
}

fn default_texture_size() -> u32 {
    DEFAULT_TEXTURE_SIZE
}

impl TryFrom<RawCustomItemData> for CustomItemData {
    type Error = anyhow::Error;

    fn try_from(raw: RawCustomItemData) -> Result<Self> {
        let mut item = CustomItemData::new(raw.name, raw.options)?;
        if let Some(display_name) = raw.display_name {
            item.set_display_name(display_name);
        }
        item.set_allow_offhand(raw.allow_offhand);
        item.set_texture_size(raw.texture_size);
        item.set_render_offsets(raw.render_offsets);
        Ok(item)
    }
}

impl CustomItemData {
    /// The display name starts out equal to `name`.
    pub fn new(name: impl Into<String>, options: CustomItemOptions) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            bail!("custom item name must not be empty");
        }
        if !options.has_custom_item_options() {
            bail!("custom item '{}' has no registration options", name);
        }
        Ok(Self {
            display_name: name.clone(),
            name,
            options,
            allow_offhand: false,
            texture_size: DEFAULT_TEXTURE_SIZE,
            render_offsets: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &CustomItemOptions {
        &self.options
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn set_display_name(&mut self, display_name: impl Into<String>) {
        self.display_name = display_name.into();
    }

    pub fn allow_offhand(&self) -> bool {
        self.allow_offhand
    }

    pub fn set_allow_offhand(&mut self, allow_offhand: bool) {
        self.allow_offhand = allow_offhand;
    }

    /// Used to rescale textures that are not 16x16.
    pub fn texture_size(&self) -> u32 {
        self.texture_size
    }

    pub fn set_texture_size(&mut self, texture_size: u32) {
        self.texture_size = texture_size;
    }

    pub fn render_offsets(&self) -> Option<&CustomRenderOffsets> {
        self.render_offsets.as_ref()
    }

    pub fn set_render_offsets(&mut self, render_offsets: Option<CustomRenderOffsets>) {
        self.render_offsets = render_offsets;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_data(value: i32) -> CustomItemOptions {
        CustomItemOptions {
            custom_model_data: Some(value),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let item = CustomItemData::new("ruby_sword", model_data(7)).unwrap();
        assert_eq!(item.name(), "ruby_sword");
        assert_eq!(item.display_name(), "ruby_sword");
        assert!(!item.allow_offhand());
        assert_eq!(item.texture_size(), DEFAULT_TEXTURE_SIZE);
        assert!(item.render_offsets().is_none());
    }

    #[test]
    fn test_setters() {
        let mut item = CustomItemData::new("ruby_sword", model_data(7)).unwrap();
        item.set_display_name("Ruby Sword");
        item.set_allow_offhand(true);
        item.set_texture_size(32);
        item.set_render_offsets(Some(CustomRenderOffsets {
            main_hand: Some(Hand {
                first_person: Some(Offset {
                    scale: Some(OffsetXyz::new(0.5, 0.5, 0.5)),
                    ..Default::default()
                }),
                third_person: None,
            }),
            off_hand: None,
        }));

        assert_eq!(item.display_name(), "Ruby Sword");
        assert!(item.allow_offhand());
        assert_eq!(item.texture_size(), 32);
        let offsets = item.render_offsets().unwrap();
        assert!(offsets.off_hand.is_none());
        assert_eq!(item.name(), "ruby_sword");
    }

    #[test]
    fn test_rejects_empty_name_and_missing_options() {
        assert!(CustomItemData::new("  ", model_data(1)).is_err());
        assert!(CustomItemData::new("plain", CustomItemOptions::default()).is_err());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let item: CustomItemData = serde_json::from_str(
            r#"{
                "name": "wand",
                "options": { "damage_predicate": 3 },
                "display_name": "Magic Wand"
            }"#,
        )
        .unwrap();
        assert_eq!(item.texture_size(), DEFAULT_TEXTURE_SIZE);
        assert_eq!(item.options().damage_predicate, Some(3));
        assert_eq!(item.display_name(), "Magic Wand");
        assert!(!item.allow_offhand());
    }

    #[test]
    fn test_deserialize_applies_constructor_checks() {
        let blank = serde_json::from_str::<CustomItemData>(
            r#"{ "name": " ", "options": { "unbreakable": true } }"#,
        );
        assert!(blank.is_err());

        let err = serde_json::from_str::<CustomItemData>(r#"{ "name": "plain", "options": {} }"#)
            .unwrap_err();
        assert!(err.to_string().contains("no registration options"));

        let item: CustomItemData =
            serde_json::from_str(r#"{ "name": "gem", "options": { "unbreakable": true } }"#)
                .unwrap();
        assert_eq!(item.display_name(), "gem");
    }

    #[test]
    fn test_serialized_item_reads_back() {
        let mut item = CustomItemData::new("ruby", model_data(2)).unwrap();
        item.set_display_name("Ruby");
        item.set_texture_size(64);

        let json = serde_json::to_string(&item).unwrap();
        let back: CustomItemData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }
}
