use serde::{Deserialize, Serialize};

/// Axis-aligned box in page units, origin at the top-left of the page as
/// displayed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    #[must_use]
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    #[must_use]
    pub fn center_x(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    #[must_use]
    pub fn horizontal_overlap(&self, other: &Rect) -> f32 {
        (self.x1.min(other.x1) - self.x0.max(other.x0)).max(0.0)
    }

    pub(crate) fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub bbox: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub bytes: Vec<u8>,
    pub bbox: Rect,
    pub format: String,
    pub content_hash: String,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    pub page_number: u32,
    pub lines: Vec<TextLine>,
    pub images: Vec<ImageRecord>,
}

/// One saved image. Field order is the manifest column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRow {
    pub page: u32,
    pub image_index_on_page: usize,
    pub filename: String,
    pub caption: String,
    #[serde(rename = "category_subfolder")]
    pub category: String,
    pub output_path: String,
    pub image_hash: String,
    pub image_size_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfigEntry {
    pub name: String,
    pub path: String,
    pub images: Vec<String>,
}
