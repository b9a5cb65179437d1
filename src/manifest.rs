use std::collections::BTreeMap;
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};

use crate::error::ExtractError;
use crate::model::ManifestRow;

pub const MANIFEST_FILE_NAME: &str = "manifest.csv";

pub const MANIFEST_COLUMNS: [&str; 8] = [
    "page",
    "image_index_on_page",
    "filename",
    "caption",
    "category_subfolder",
    "output_path",
    "image_hash",
    "image_size_bytes",
];

pub(crate) fn write_manifest(path: &Path, rows: &[ManifestRow]) -> Result<(), ExtractError> {
    let mut writer = WriterBuilder::new().from_path(path)?;
    if rows.is_empty() {
        writer.write_record(MANIFEST_COLUMNS)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<Vec<ManifestRow>, ExtractError> {
    let mut reader = ReaderBuilder::new().from_path(path)?;
    let rows = reader.deserialize().collect::<Result<Vec<ManifestRow>, _>>()?;
    Ok(rows)
}

/// Groups saved filenames by category, in manifest order.
#[must_use]
pub fn category_image_map(rows: &[ManifestRow]) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in rows {
        map.entry(row.category.clone())
            .or_default()
            .push(row.filename.clone());
    }
    map
}
