use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::error::ExtractError;
use crate::model::CategoryConfigEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigUpdateSummary {
    pub config_path: PathBuf,
    pub updated_categories: usize,
    pub created_categories: Vec<String>,
    pub total_images: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigUpdateOutcome {
    Updated(ConfigUpdateSummary),
    /// The config document does not exist; nothing was written.
    Skipped { config_path: PathBuf },
}

/// Display name for a category path: `tshirt/women` becomes `Tshirt Women`.
#[must_use]
pub fn category_display_name(path: &str) -> String {
    let mut name = String::with_capacity(path.len());
    let mut previous_is_letter = false;
    for ch in path.replace('/', " ").chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                name.extend(ch.to_lowercase());
            } else {
                name.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            name.push(ch);
            previous_is_letter = false;
        }
    }
    name
}

fn sorted_images(images: &[String]) -> Value {
    let mut images = images.to_vec();
    images.sort();
    Value::from(images)
}

fn merge_categories(
    categories: &mut Vec<Value>,
    category_images: &BTreeMap<String, Vec<String>>,
) -> Result<Vec<String>, ExtractError> {
    let index_by_path = categories
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            entry
                .get("path")
                .and_then(Value::as_str)
                .map(|path| (path.to_string(), index))
        })
        .collect::<HashMap<_, _>>();

    let mut created = Vec::new();
    for (path, images) in category_images {
        if let Some(&index) = index_by_path.get(path) {
            let entry = categories[index].as_object_mut().ok_or_else(|| {
                ExtractError::InvalidConfig(format!("category '{path}' is not an object"))
            })?;
            entry.insert("images".to_string(), sorted_images(images));
        } else {
            let mut sorted = images.clone();
            sorted.sort();
            let entry = CategoryConfigEntry {
                name: category_display_name(path),
                path: path.clone(),
                images: sorted,
            };
            info!(name = %entry.name, path = %entry.path, "created new category");
            created.push(entry.name.clone());
            categories.push(serde_json::to_value(entry)?);
        }
    }

    let processed = category_images.keys().map(String::as_str).collect::<HashSet<_>>();
    for entry in categories.iter_mut() {
        let touched = entry
            .get("path")
            .and_then(Value::as_str)
            .is_some_and(|path| processed.contains(path));
        if touched {
            continue;
        }
        if let Some(entry) = entry.as_object_mut() {
            entry.insert("images".to_string(), Value::Array(Vec::new()));
        }
    }

    Ok(created)
}

/// Rewrites the `images` list of every category in the JSON document at
/// `config_path` so it mirrors `category_images` exactly.
///
/// Categories present in the mapping get its filenames, sorted; unknown
/// category paths are appended as new entries; every other category ends up
/// with an empty list. The rest of the document is left as it was, keys in
/// their original order.
pub fn update_category_config(
    config_path: &Path,
    category_images: &BTreeMap<String, Vec<String>>,
) -> Result<ConfigUpdateOutcome, ExtractError> {
    if !config_path.exists() {
        warn!(path = %config_path.display(), "config file not found; skipping update");
        return Ok(ConfigUpdateOutcome::Skipped {
            config_path: config_path.to_path_buf(),
        });
    }

    let raw = fs::read_to_string(config_path)?;
    let mut document: Value = serde_json::from_str(&raw)?;
    let root = document.as_object_mut().ok_or_else(|| {
        ExtractError::InvalidConfig("config root must be a JSON object".to_string())
    })?;
    let categories = root
        .entry("categories")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| ExtractError::InvalidConfig("`categories` must be an array".to_string()))?;

    let created_categories = merge_categories(categories, category_images)?;

    fs::write(config_path, serde_json::to_string_pretty(&document)?)?;

    let summary = ConfigUpdateSummary {
        config_path: config_path.to_path_buf(),
        updated_categories: category_images.len(),
        created_categories,
        total_images: category_images.values().map(Vec::len).sum(),
    };
    info!(
        path = %summary.config_path.display(),
        categories = summary.updated_categories,
        images = summary.total_images,
        "updated category config"
    );
    Ok(ConfigUpdateOutcome::Updated(summary))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tempfile::tempdir;

    use super::{ConfigUpdateOutcome, category_display_name, update_category_config};

    fn mapping(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(path, images)| {
                (
                    (*path).to_string(),
                    images.iter().map(|image| (*image).to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn title_cases_category_paths() {
        assert_eq!(category_display_name("tshirt/women"), "Tshirt Women");
        assert_eq!(category_display_name("beanie"), "Beanie");
        assert_eq!(category_display_name("3d_print"), "3D_Print");
    }

    #[test]
    fn replaces_creates_and_clears_categories() {
        let dir = tempdir().expect("tempdir should be created");
        let path = dir.path().join("arizonastate.json");
        let original = json!({
            "title": "Arizona State",
            "categories": [
                {"name": "Beanie", "path": "beanie", "images": ["old.png"]},
                {"name": "Hat", "path": "hat", "images": ["stale.png"], "order": 2}
            ]
        });
        fs::write(&path, serde_json::to_string_pretty(&original).expect("json")).expect("write");

        let outcome = update_category_config(
            &path,
            &mapping(&[
                ("beanie", &["b.png", "a.png"]),
                ("tshirt/women", &["M1_Jr_Tee.png"]),
            ]),
        )
        .expect("update should succeed");

        let ConfigUpdateOutcome::Updated(summary) = outcome else {
            panic!("config exists, update expected");
        };
        assert_eq!(summary.updated_categories, 2);
        assert_eq!(summary.total_images, 3);
        assert_eq!(summary.created_categories, vec!["Tshirt Women"]);

        let updated: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(
            updated,
            json!({
                "title": "Arizona State",
                "categories": [
                    {"name": "Beanie", "path": "beanie", "images": ["a.png", "b.png"]},
                    {"name": "Hat", "path": "hat", "images": [], "order": 2},
                    {"name": "Tshirt Women", "path": "tshirt/women", "images": ["M1_Jr_Tee.png"]}
                ]
            })
        );
    }

    #[test]
    fn writes_two_space_indent_and_keeps_non_ascii() {
        let dir = tempdir().expect("tempdir should be created");
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"categories":[{"name":"Café","path":"beanie","images":[]}]}"#,
        )
        .expect("write");

        update_category_config(&path, &mapping(&[("beanie", &["x.png"])])).expect("update");

        let written = fs::read_to_string(&path).expect("read");
        assert!(written.contains("\n  \"categories\": [\n    {\n      \"name\": \"Café\""));
    }

    #[test]
    fn second_run_is_byte_stable() {
        let dir = tempdir().expect("tempdir should be created");
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"categories":[{"name":"Beanie","path":"beanie","images":[]}],"theme":"dark"}"#,
        )
        .expect("write");
        let map = mapping(&[("beanie", &["b.png", "a.png"]), ("plush", &["p.png"])]);

        update_category_config(&path, &map).expect("first update");
        let first = fs::read(&path).expect("read first");
        update_category_config(&path, &map).expect("second update");
        let second = fs::read(&path).expect("read second");

        assert_eq!(first, second);
    }

    #[test]
    fn missing_config_is_skipped() {
        let dir = tempdir().expect("tempdir should be created");
        let path = dir.path().join("missing.json");

        let outcome =
            update_category_config(&path, &mapping(&[("beanie", &["a.png"])])).expect("no error");

        assert_eq!(outcome, ConfigUpdateOutcome::Skipped { config_path: path.clone() });
        assert!(!path.exists());
    }

    #[test]
    fn rejects_non_object_root() {
        let dir = tempdir().expect("tempdir should be created");
        let path = dir.path().join("config.json");
        fs::write(&path, "[]").expect("write");

        assert!(update_category_config(&path, &BTreeMap::new()).is_err());
    }
}
