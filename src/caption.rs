use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::model::{Rect, TextLine};
use crate::options::{DEFAULT_MAX_VERTICAL_GAP, DEFAULT_MIN_OVERLAP_RATIO};

/// Captions are catalog product codes: `M` followed by six or more digits.
static PRODUCT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^M\d{6,}").expect("hardcoded product code regex is valid"));

/// Upper bound on how far above an image a caption may sit.
const MAX_ABOVE_GAP: f32 = 50.0;
const CENTER_PENALTY_WEIGHT: f32 = 0.3;
const EXTENDED_CENTER_FACTOR: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchParams {
    pub max_vertical_gap: f32,
    /// Minimum horizontal overlap, as a fraction of the image width, for a
    /// line to count as aligned with the image.
    pub min_overlap_ratio: f32,
    pub debug: bool,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            max_vertical_gap: DEFAULT_MAX_VERTICAL_GAP,
            min_overlap_ratio: DEFAULT_MIN_OVERLAP_RATIO,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTier {
    Below,
    Above,
    Extended,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionMatch {
    pub text: String,
    pub tier: SearchTier,
    pub score: f32,
}

#[must_use]
pub fn is_product_code(text: &str) -> bool {
    PRODUCT_CODE.is_match(text)
}

/// Name used for an image whose caption could not be found.
#[must_use]
pub fn fallback_caption(page: u32, image_index: usize) -> String {
    format!("page{page}_image{image_index}")
}

struct ImageGeometry {
    bbox: Rect,
    width: f32,
    center_x: f32,
}

impl ImageGeometry {
    fn new(bbox: Rect) -> Self {
        Self {
            bbox,
            width: bbox.width().max(1.0),
            center_x: bbox.center_x(),
        }
    }

    fn center_distance(&self, line: &Rect) -> f32 {
        (line.center_x() - self.center_x).abs()
    }

    fn is_aligned(&self, line: &Rect, min_overlap_ratio: f32) -> bool {
        self.bbox.horizontal_overlap(line) >= min_overlap_ratio * self.width
            || self.center_distance(line) <= self.width
    }

    fn score(&self, line: &Rect, vertical_distance: f32) -> f32 {
        vertical_distance.abs() + CENTER_PENALTY_WEIGHT * (self.center_distance(line) / self.width)
    }
}

/// Vertical distance from the image to `line` if the line qualifies for
/// `tier`, `None` otherwise.
fn tier_distance(
    tier: SearchTier,
    image: &ImageGeometry,
    line: &Rect,
    params: &MatchParams,
) -> Option<f32> {
    let bbox = &image.bbox;
    match tier {
        SearchTier::Below => {
            let gap = line.y0 - bbox.y1;
            (line.y0 >= bbox.y1
                && gap <= params.max_vertical_gap
                && image.is_aligned(line, params.min_overlap_ratio))
            .then_some(gap)
        }
        SearchTier::Above => {
            let gap = bbox.y0 - line.y1;
            let limit = MAX_ABOVE_GAP.min(params.max_vertical_gap * 0.5);
            (bbox.y0 >= line.y1 && gap <= limit && image.is_aligned(line, params.min_overlap_ratio))
                .then_some(gap)
        }
        SearchTier::Extended => {
            let distance = (line.y0 - bbox.y1).abs().min((bbox.y0 - line.y1).abs());
            (distance <= params.max_vertical_gap * 2.0
                && image.center_distance(line) <= image.width * EXTENDED_CENTER_FACTOR)
                .then_some(distance)
        }
    }
}

fn best_in_tier(
    tier: SearchTier,
    image: &ImageGeometry,
    lines: &[TextLine],
    params: &MatchParams,
) -> Option<CaptionMatch> {
    let mut best: Option<CaptionMatch> = None;

    for line in lines.iter().filter(|line| is_product_code(&line.text)) {
        let Some(distance) = tier_distance(tier, image, &line.bbox, params) else {
            continue;
        };

        let score = image.score(&line.bbox, distance);
        if best.as_ref().is_none_or(|current| score < current.score) {
            if params.debug {
                debug!(?tier, score, text = %line.text, "caption candidate");
            }
            best = Some(CaptionMatch {
                text: line.text.trim().to_string(),
                tier,
                score,
            });
        }
    }

    best
}

/// Finds the product-code line that best captions the image at `image_bbox`.
///
/// Lines directly below the image are preferred, then lines a short way
/// above it, then any product code within an extended window. Within a tier
/// the lowest score wins and earlier lines keep ties.
#[must_use]
pub fn find_caption(
    image_bbox: Rect,
    lines: &[TextLine],
    params: &MatchParams,
) -> Option<CaptionMatch> {
    let image = ImageGeometry::new(image_bbox);

    if params.debug {
        debug!(
            x0 = image_bbox.x0,
            y0 = image_bbox.y0,
            x1 = image_bbox.x1,
            y1 = image_bbox.y1,
            width = image.width,
            center_x = image.center_x,
            "searching caption for image"
        );
        for line in lines.iter().filter(|line| is_product_code(&line.text)) {
            debug!(text = %line.text, bbox = ?line.bbox, "product code line on page");
        }
    }

    let found = [SearchTier::Below, SearchTier::Above, SearchTier::Extended]
        .into_iter()
        .find_map(|tier| best_in_tier(tier, &image, lines, params));

    if params.debug {
        match &found {
            Some(caption) => debug!(text = %caption.text, tier = ?caption.tier, "caption selected"),
            None => debug!("no caption found"),
        }
    }

    found
}
