use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

pub const MAX_BASE_NAME_CHARS: usize = 160;
const EMPTY_NAME_PLACEHOLDER: &str = "image";

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("hardcoded whitespace regex is valid"));
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-. ]").expect("hardcoded unsafe-char regex is valid"));
static SINGLE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s").expect("hardcoded whitespace regex is valid"));

/// Turns a caption into a base file name made of word characters, `-`, `.`
/// and `_`, at most `max_chars` characters long.
#[must_use]
pub fn slugify(caption: &str, max_chars: usize) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(caption, " ");
    let kept = UNSAFE_CHARS.replace_all(collapsed.trim(), "");
    let underscored = SINGLE_WHITESPACE.replace_all(&kept, "_");

    let name = if underscored.is_empty() {
        EMPTY_NAME_PLACEHOLDER
    } else {
        &*underscored
    };
    name.chars().take(max_chars).collect()
}

/// First free path among `base{ext}`, `base (2){ext}`, `base (3){ext}`, ...
#[must_use]
pub fn unique_path(dir: &Path, base_name: &str, extension: &str) -> PathBuf {
    let mut candidate = dir.join(format!("{base_name}{extension}"));
    let mut counter = 2_usize;
    while candidate.exists() {
        candidate = dir.join(format!("{base_name} ({counter}){extension}"));
        counter += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{MAX_BASE_NAME_CHARS, slugify, unique_path};

    #[test]
    fn slugify_collapses_whitespace_and_strips_specials() {
        assert_eq!(
            slugify("  M102595496   Fleece/Jacket (Maroon)!  ", MAX_BASE_NAME_CHARS),
            "M102595496_FleeceJacket_Maroon"
        );
        assert_eq!(slugify("M1 tee-shirt v2.0", MAX_BASE_NAME_CHARS), "M1_tee-shirt_v2.0");
    }

    #[test]
    fn slugify_defaults_empty_names() {
        assert_eq!(slugify("", MAX_BASE_NAME_CHARS), "image");
        assert_eq!(slugify("  %%%  ", MAX_BASE_NAME_CHARS), "image");
    }

    #[test]
    fn slugify_truncates_by_characters() {
        assert_eq!(slugify("abcdef", 4), "abcd");
        assert_eq!(slugify("ééééé", 3), "ééé");
    }

    #[test]
    fn unique_path_appends_counter_on_collision() {
        let dir = tempdir().expect("tempdir should be created");
        let first = unique_path(dir.path(), "M1", ".png");
        assert_eq!(first, dir.path().join("M1.png"));

        std::fs::write(&first, b"x").expect("write first");
        let second = unique_path(dir.path(), "M1", ".png");
        assert_eq!(second, dir.path().join("M1 (2).png"));

        std::fs::write(&second, b"x").expect("write second");
        assert_eq!(
            unique_path(dir.path(), "M1", ".png"),
            dir.path().join("M1 (3).png")
        );
    }
}
