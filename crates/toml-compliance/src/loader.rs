//! Test case discovery.
//!
//! Fixture layout, relative to the suite root:
//!
//! ```text
//! valid/<subcategory>/<name>.toml     input for decoders
//! valid/<subcategory>/<name>.json     expected encoding (and encoder input)
//! invalid/<subcategory>/<name>.toml   input decoders must reject
//! invalid/<subcategory>/<name>.json   input encoders must reject
//! ```
//!
//! Files placed directly under `valid/` or `invalid/` get an empty
//! subcategory; deeper directories are joined with `/`. Hidden entries are
//! skipped. Output is sorted by path so every run sees the same order.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{HarnessError, Result};

/// Extension of expected-output fixtures and encoder inputs.
pub const EXPECTED_EXTENSION: &str = "json";

/// Default extension of decoder inputs.
pub const DEFAULT_INPUT_EXTENSION: &str = "toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Valid,
    Invalid,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Valid, Category::Invalid];

    pub fn name(self) -> &'static str {
        match self {
            Category::Valid => "valid",
            Category::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which side of the format the subject implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Decoder,
    Encoder,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Decoder => "decoder",
            Kind::Encoder => "encoder",
        })
    }
}

/// One compliance check. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    /// Position in discovery order; reports are sorted by it.
    pub index: usize,
    pub category: Category,
    pub subcategory: String,
    pub name: String,
    pub kind: Kind,
    pub input_path: PathBuf,
    /// Present for valid cases only.
    pub expected_path: Option<PathBuf>,
}

impl TestCase {
    /// `valid/array/nested`, or `valid/nested` without a subcategory.
    pub fn id(&self) -> String {
        if self.subcategory.is_empty() {
            format!("{}/{}", self.category, self.name)
        } else {
            format!("{}/{}/{}", self.category, self.subcategory, self.name)
        }
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id(), self.kind)
    }
}

/// `<suite>/<version>` when a version is given, `<suite>` otherwise.
pub fn suite_root(suite: &Path, version: Option<&str>) -> PathBuf {
    match version {
        Some(version) => suite.join(version),
        None => suite.to_path_buf(),
    }
}

/// Discover every case of the given kind under `root`.
///
/// Decoder cases come from `*.<input_extension>` files, encoder cases from
/// `*.json` files.
///
/// # Errors
/// [`HarnessError::Config`] if `root` is not a directory, a directory cannot be
/// read, or a valid decoder input has no sibling `.json` file.
pub fn load_cases(root: &Path, kind: Kind, input_extension: &str) -> Result<Vec<TestCase>> {
    if !root.is_dir() {
        return Err(HarnessError::Config(format!(
            "suite directory not found: {}",
            root.display()
        )));
    }

    let extension = match kind {
        Kind::Decoder => input_extension,
        Kind::Encoder => EXPECTED_EXTENSION,
    };

    let mut cases = Vec::new();
    for category in Category::ALL {
        let dir = root.join(category.name());
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "category directory absent, skipping");
            continue;
        }
        let mut files = Vec::new();
        collect_files(&dir, extension, &mut files)?;
        files.sort();

        for input_path in files {
            let expected_path = match (category, kind) {
                (Category::Invalid, _) => None,
                (Category::Valid, Kind::Encoder) => Some(input_path.clone()),
                (Category::Valid, Kind::Decoder) => {
                    let sibling = input_path.with_extension(EXPECTED_EXTENSION);
                    if !sibling.is_file() {
                        return Err(HarnessError::Config(format!(
                            "missing expected output: {}",
                            sibling.display()
                        )));
                    }
                    Some(sibling)
                }
            };
            cases.push(TestCase {
                index: 0,
                category,
                subcategory: subcategory_of(&dir, &input_path),
                name: file_stem(&input_path),
                kind,
                input_path,
                expected_path,
            });
        }
    }

    // One global order by path: `invalid/...` before `valid/...`.
    cases.sort_by(|a, b| a.input_path.cmp(&b.input_path));
    for (index, case) in cases.iter_mut().enumerate() {
        case.index = index;
    }
    tracing::info!(root = %root.display(), %kind, count = cases.len(), "discovered test cases");
    Ok(cases)
}

fn collect_files(dir: &Path, extension: &str, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|err| {
        HarnessError::Config(format!("cannot read directory {}: {err}", dir.display()))
    })?;

    for entry in entries {
        let entry = entry.map_err(|err| {
            HarnessError::Config(format!("cannot read directory {}: {err}", dir.display()))
        })?;
        let path = entry.path();

        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'))
        {
            continue;
        }

        if path.is_dir() {
            collect_files(&path, extension, files)?;
        } else if path.extension().is_some_and(|e| e == extension) {
            files.push(path);
        }
    }
    Ok(())
}

fn subcategory_of(category_dir: &Path, file: &Path) -> String {
    file.parent()
        .and_then(|parent| parent.strip_prefix(category_dir).ok())
        .map(|relative| {
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
