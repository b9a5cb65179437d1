use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::ExtractError;

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), ExtractError> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| {
            let entry = entry?;
            Ok((entry.path(), entry.file_type()?))
        })
        .collect::<Result<Vec<_>, std::io::Error>>()?;
    entries.sort_by(|(left, _), (right, _)| left.cmp(right));

    for (path, file_type) in entries {
        if file_type.is_dir() {
            collect_files(&path, files)?;
        } else if file_type.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

fn archive_name(dir: &Path, file: &Path) -> String {
    file.strip_prefix(dir)
        .unwrap_or(file)
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Zips every regular file under `dir` into `<dir>.zip` next to it and
/// returns the archive path. Symlinks are skipped.
pub(crate) fn archive_directory(dir: &Path) -> Result<PathBuf, ExtractError> {
    let dir_name = dir.file_name().ok_or_else(|| {
        ExtractError::InvalidOption(format!("cannot archive '{}': no directory name", dir.display()))
    })?;
    let mut archive_file_name = dir_name.to_os_string();
    archive_file_name.push(".zip");
    let archive_path = dir.with_file_name(archive_file_name);

    let mut files = Vec::new();
    collect_files(dir, &mut files)?;

    let mut writer = ZipWriter::new(File::create(&archive_path)?);
    for file in &files {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        writer.start_file(archive_name(dir, file), options)?;
        writer.write_all(&fs::read(file)?)?;
    }
    writer.finish()?;

    Ok(archive_path)
}
