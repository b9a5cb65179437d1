use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::caption::MatchParams;
use crate::error::ExtractError;
use crate::target::Target;

pub const DEFAULT_MAX_VERTICAL_GAP: f32 = 110.0;
pub const DEFAULT_MIN_OVERLAP_RATIO: f32 = 0.05;

/// Directory under the project root that receives one folder per target.
pub const OUTPUT_ROOT: &str = "public";
/// Directory under the project root holding `<config_name>.json` documents.
pub const CONFIG_DIR: &str = "src/config/colleges";

/// File suffix used for saved images. The bytes are written as stored in
/// the PDF whatever suffix is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSuffix {
    #[default]
    Png,
    Jpg,
}

impl ImageSuffix {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => ".png",
            Self::Jpg => ".jpg",
        }
    }
}

impl FromStr for ImageSuffix {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "png" => Ok(Self::Png),
            "jpg" => Ok(Self::Jpg),
            other => Err(format!("unsupported image format '{other}', expected png or jpg")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    pub image_suffix: ImageSuffix,
    pub archive: bool,
    pub max_vertical_gap: f32,
    pub min_overlap_ratio: f32,
    pub debug: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            image_suffix: ImageSuffix::Png,
            archive: false,
            max_vertical_gap: DEFAULT_MAX_VERTICAL_GAP,
            min_overlap_ratio: DEFAULT_MIN_OVERLAP_RATIO,
            debug: false,
        }
    }
}

impl ExtractOptions {
    pub(crate) fn validate(&self) -> Result<(), ExtractError> {
        if !self.max_vertical_gap.is_finite() || self.max_vertical_gap < 0.0 {
            return Err(ExtractError::InvalidOption(format!(
                "max vertical gap must be a non-negative number, got {}",
                self.max_vertical_gap
            )));
        }
        if !(0.0..=1.0).contains(&self.min_overlap_ratio) {
            return Err(ExtractError::InvalidOption(format!(
                "min overlap ratio must be within 0..=1, got {}",
                self.min_overlap_ratio
            )));
        }
        Ok(())
    }

    pub(crate) fn match_params(&self, debug: bool) -> MatchParams {
        MatchParams {
            max_vertical_gap: self.max_vertical_gap,
            min_overlap_ratio: self.min_overlap_ratio,
            debug,
        }
    }
}

/// Everything one extraction run needs, resolved up front so the pipeline
/// never has to prompt or look at the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub pdf_path: PathBuf,
    pub output_dir: PathBuf,
    pub config_path: PathBuf,
    pub options: ExtractOptions,
}

impl RunConfig {
    #[must_use]
    pub fn resolve(
        project_root: &Path,
        target: &Target,
        pdf_path: PathBuf,
        options: ExtractOptions,
    ) -> Self {
        Self {
            pdf_path,
            output_dir: project_root.join(OUTPUT_ROOT).join(target.folder),
            config_path: project_root
                .join(CONFIG_DIR)
                .join(format!("{}.json", target.config_name)),
            options,
        }
    }
}
