use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::archive::archive_directory;
use crate::caption::{fallback_caption, find_caption};
use crate::categorize::categorize;
use crate::error::ExtractError;
use crate::manifest::{MANIFEST_FILE_NAME, write_manifest};
use crate::model::{ImageRecord, ManifestRow, PageContent};
use crate::naming::{MAX_BASE_NAME_CHARS, slugify, unique_path};
use crate::options::ExtractOptions;
use crate::pdf_reader::{open_document, read_page};
use crate::warning::{ExtractWarning, WarningCode};

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionReport {
    pub saved_count: usize,
    pub duplicate_count: usize,
    pub fallback_caption_count: usize,
    pub rows: Vec<ManifestRow>,
    /// Saved filenames per category, in the order they were written.
    pub category_images: BTreeMap<String, Vec<String>>,
    pub warnings: Vec<ExtractWarning>,
    pub manifest_path: PathBuf,
    pub archive_path: Option<PathBuf>,
}

impl ExtractionReport {
    /// The archive when one was written, otherwise the manifest.
    #[must_use]
    pub fn output_path(&self) -> &Path {
        self.archive_path
            .as_deref()
            .unwrap_or(self.manifest_path.as_path())
    }
}

/// State for one extraction run. Pages are fed in document order through
/// [`ExtractionRun::process_page`]; [`ExtractionRun::finish`] writes the
/// manifest and, when requested, the archive.
#[derive(Debug)]
pub struct ExtractionRun {
    output_dir: PathBuf,
    options: ExtractOptions,
    seen_hashes: HashSet<String>,
    rows: Vec<ManifestRow>,
    category_images: BTreeMap<String, Vec<String>>,
    warnings: Vec<ExtractWarning>,
    pages_processed: usize,
    duplicate_count: usize,
    fallback_caption_count: usize,
}

impl ExtractionRun {
    pub fn new(output_dir: &Path, options: ExtractOptions) -> Result<Self, ExtractError> {
        options.validate()?;
        fs::create_dir_all(output_dir)?;

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            options,
            seen_hashes: HashSet::new(),
            rows: Vec::new(),
            category_images: BTreeMap::new(),
            warnings: Vec::new(),
            pages_processed: 0,
            duplicate_count: 0,
            fallback_caption_count: 0,
        })
    }

    pub fn process_page(&mut self, page: &PageContent) -> Result<(), ExtractError> {
        // Candidate logging is limited to the first page.
        let params = self
            .options
            .match_params(self.options.debug && self.pages_processed == 0);
        self.pages_processed += 1;

        info!(
            page = page.page_number,
            images = page.images.len(),
            lines = page.lines.len(),
            "processing page"
        );

        for (offset, image) in page.images.iter().enumerate() {
            let image_index = offset + 1;

            if !self.seen_hashes.insert(image.content_hash.clone()) {
                self.duplicate_count += 1;
                debug!(
                    page = page.page_number,
                    image_index,
                    hash = %short_hash(&image.content_hash),
                    "skipping duplicate image"
                );
                self.warnings.push(
                    ExtractWarning::new(
                        WarningCode::DuplicateImage,
                        "image already saved from an earlier placement",
                    )
                    .with_page(page.page_number)
                    .with_image_index(image_index),
                );
                continue;
            }

            let caption = match find_caption(image.bbox, &page.lines, &params) {
                Some(found) => found.text,
                None => {
                    let fallback = fallback_caption(page.page_number, image_index);
                    warn!(
                        page = page.page_number,
                        image_index,
                        caption = %fallback,
                        "no caption found; using fallback"
                    );
                    self.fallback_caption_count += 1;
                    self.warnings.push(
                        ExtractWarning::new(
                            WarningCode::CaptionFallback,
                            format!("no product code caption found; saved as {fallback}"),
                        )
                        .with_page(page.page_number)
                        .with_image_index(image_index),
                    );
                    fallback
                }
            };

            self.save_image(page.page_number, image_index, image, caption)?;
        }

        Ok(())
    }

    fn save_image(
        &mut self,
        page_number: u32,
        image_index: usize,
        image: &ImageRecord,
        caption: String,
    ) -> Result<(), ExtractError> {
        let category = categorize(&caption);
        let category_dir = self.output_dir.join(category);
        fs::create_dir_all(&category_dir)?;

        let base_name = slugify(&caption, MAX_BASE_NAME_CHARS);
        let path = unique_path(&category_dir, &base_name, self.options.image_suffix.extension());
        fs::write(&path, &image.bytes)?;

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(
            page = page_number,
            image_index,
            category,
            file = %filename,
            format = %image.format,
            "saved image"
        );

        self.category_images
            .entry(category.to_string())
            .or_default()
            .push(filename.clone());
        self.rows.push(ManifestRow {
            page: page_number,
            image_index_on_page: image_index,
            output_path: format!("{category}/{filename}"),
            filename,
            caption,
            category: category.to_string(),
            image_hash: image.content_hash.clone(),
            image_size_bytes: image.size_bytes,
        });
        Ok(())
    }

    pub fn finish(self) -> Result<ExtractionReport, ExtractError> {
        let manifest_path = self.output_dir.join(MANIFEST_FILE_NAME);
        write_manifest(&manifest_path, &self.rows)?;
        info!(path = %manifest_path.display(), rows = self.rows.len(), "wrote manifest");

        let archive_path = if self.options.archive {
            let path = archive_directory(&self.output_dir)?;
            info!(path = %path.display(), "wrote archive");
            Some(path)
        } else {
            None
        };

        Ok(ExtractionReport {
            saved_count: self.rows.len(),
            duplicate_count: self.duplicate_count,
            fallback_caption_count: self.fallback_caption_count,
            rows: self.rows,
            category_images: self.category_images,
            warnings: self.warnings,
            manifest_path,
            archive_path,
        })
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

/// Extracts every placed image in `pdf_path` into category folders under
/// `output_dir`, naming each file after its product-code caption.
pub fn extract_catalog_images(
    pdf_path: &Path,
    output_dir: &Path,
    options: ExtractOptions,
) -> Result<ExtractionReport, ExtractError> {
    let mut run = ExtractionRun::new(output_dir, options)?;
    let document = open_document(pdf_path)?;

    for (page_number, page_id) in document.get_pages() {
        let page = read_page(&document, page_number, page_id)?;
        run.process_page(&page)?;
    }

    run.finish()
}
