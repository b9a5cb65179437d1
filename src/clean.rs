use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::ExtractError;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "svg"];

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
}

/// Deletes previously extracted images under `dir`, leaving folders and
/// any other files in place. Symlinked directories are not followed.
/// Returns how many files were removed.
pub fn clean_existing_images(dir: &Path) -> Result<usize, ExtractError> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut deleted = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            deleted += clean_existing_images(&path)?;
        } else if is_image_file(&path) {
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "removed stale image");
            deleted += 1;
        }
    }
    Ok(deleted)
}
