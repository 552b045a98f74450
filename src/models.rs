// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentMode {
    Exterior,
    Interior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaterialMode {
    TextPrompt,
    ColorKey,
    ReferenceImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FurnitureLayoutMode {
    Existing,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    FourThree,
    #[serde(rename = "3:4")]
    ThreeFour,
    #[serde(rename = "16:9")]
    SixteenNine,
    #[serde(rename = "9:16")]
    NineSixteen,
    Auto,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::FourThree => "4:3",
            AspectRatio::ThreeFour => "3:4",
            AspectRatio::SixteenNine => "16:9",
            AspectRatio::NineSixteen => "9:16",
            AspectRatio::Auto => "Auto",
        }
    }

    pub fn ratio(&self) -> Option<f64> {
        match self {
            AspectRatio::Square => Some(1.0),
            AspectRatio::FourThree => Some(4.0 / 3.0),
            AspectRatio::ThreeFour => Some(3.0 / 4.0),
            AspectRatio::SixteenNine => Some(16.0 / 9.0),
            AspectRatio::NineSixteen => Some(9.0 / 16.0),
            AspectRatio::Auto => None,
        }
    }
}

/// Binds one color zone of the sketch to a target material, optionally
/// anchored to a photo of the physical texture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialMapping {
    pub color: String,
    pub material: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderParams {
    pub mode: EnvironmentMode,
    pub style: String,
    #[serde(default)]
    pub angle: String,
    #[serde(default)]
    pub landscape_prompt: String,
    #[serde(default)]
    pub interior_ambiance: String,
    #[serde(default)]
    pub material_prompt: String,
    pub material_mode: MaterialMode,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub material_mappings: Vec<MaterialMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_texture_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub furniture_inspiration_image: Option<String>,
    #[serde(default = "default_furniture_layout")]
    pub furniture_layout_mode: FurnitureLayoutMode,
    #[serde(default)]
    pub furniture_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_picture: Option<String>,
    #[serde(default)]
    pub base_sketches: Vec<String>,
}

fn default_aspect_ratio() -> AspectRatio {
    AspectRatio::Auto
}

fn default_furniture_layout() -> FurnitureLayoutMode {
    FurnitureLayoutMode::Existing
}

/// Rectangle in percentage units of the displayed image's bounding box.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectionBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SelectionBox {
    /// Drag rectangles at or below 1% in either dimension are discarded
    /// as accidental clicks.
    pub fn is_significant(&self) -> bool {
        self.width > 1.0 && self.height > 1.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(flatten)]
    pub region: SelectionBox,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderResult {
    pub id: Uuid,
    pub sketch_url: String,
    pub render_url: String,
    pub mode: EnvironmentMode,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditRequest {
    pub base_image: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaskedEditRequest {
    pub base_image: String,
    pub selection: SelectionBox,
    pub instruction: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpscaleRequest {
    pub source_image: String,
}
