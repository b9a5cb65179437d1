mod archive;
mod caption;
mod categorize;
mod clean;
mod config_update;
mod error;
mod font;
mod hash;
mod inline_image;
mod manifest;
mod model;
mod naming;
mod options;
mod pdf_reader;
mod pipeline;
mod target;
mod warning;

pub use caption::{
    CaptionMatch, MatchParams, SearchTier, fallback_caption, find_caption, is_product_code,
};
pub use categorize::{DEFAULT_CATEGORY, categorize};
pub use clean::clean_existing_images;
pub use config_update::{
    ConfigUpdateOutcome, ConfigUpdateSummary, category_display_name, update_category_config,
};
pub use error::ExtractError;
pub use manifest::{MANIFEST_COLUMNS, MANIFEST_FILE_NAME, category_image_map, read_manifest};
pub use model::{CategoryConfigEntry, ImageRecord, ManifestRow, PageContent, Rect, TextLine};
pub use naming::{MAX_BASE_NAME_CHARS, slugify, unique_path};
pub use options::{
    CONFIG_DIR, DEFAULT_MAX_VERTICAL_GAP, DEFAULT_MIN_OVERLAP_RATIO, ExtractOptions, ImageSuffix,
    OUTPUT_ROOT, RunConfig,
};
pub use pdf_reader::{open_document, read_page};
pub use pipeline::{ExtractionReport, ExtractionRun, extract_catalog_images};
pub use target::{TARGETS, Target, prompt_target, target_for_choice};
pub use warning::{ExtractWarning, WarningCode};
