//! File catalog
//!
//! Discovers the project's SQL files and indexes them by the names templates
//! use to refer to them. Macros are looked up by file stem. Models can be
//! referenced by any trailing part of their path, so
//! `models/staging/orders.sql` answers to `models/staging/orders`,
//! `staging/orders` and `orders`.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jinsql_core::{Config, PathsConfig};
use jinsql_jinja::{Resolver, Template};
use walkdir::WalkDir;

use crate::error::CatalogError;
use crate::file::{lookup_path, File, FileType};

#[derive(Debug, Default)]
pub struct FileCatalog {
    /// Every file, keyed by project-relative path
    files: BTreeMap<PathBuf, Arc<File>>,
    macros: HashMap<String, Arc<File>>,
    models: HashMap<String, Arc<File>>,
    tests: Vec<Arc<File>>,
}

impl FileCatalog {
    /// Scan the configured macro, model and test directories
    pub fn discover(config: &Config) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();
        let root = &config.project_root;

        let kinds = [
            (&config.paths.macros, FileType::Macro),
            (&config.paths.models, FileType::Model),
            (&config.paths.tests, FileType::Test),
        ];
        for (dirs, file_type) in kinds {
            for dir in dirs {
                catalog.scan_directory(root, Path::new(dir), file_type, &config.paths)?;
            }
        }

        tracing::info!(
            models = catalog.models().len(),
            macros = catalog.macros().len(),
            tests = catalog.tests.len(),
            "discovered project files"
        );
        Ok(catalog)
    }

    /// Build a catalog from `(path, source)` pairs, classifying each file by
    /// its leading folder (`macros/`, `models/` or `tests/`)
    pub fn in_memory<P, S>(files: impl IntoIterator<Item = (P, S)>) -> Result<Self, CatalogError>
    where
        P: Into<PathBuf>,
        S: Into<String>,
    {
        let paths = PathsConfig::default();
        let mut catalog = Self::default();

        for (path, source) in files {
            let path = path.into();
            let file_type = classify(&path, &paths);
            catalog.record(File::new(path, file_type, source))?;
        }

        Ok(catalog)
    }

    fn scan_directory(
        &mut self,
        root: &Path,
        dir: &Path,
        file_type: FileType,
        paths: &PathsConfig,
    ) -> Result<(), CatalogError> {
        let start = root.join(dir);
        if !start.exists() {
            tracing::debug!(path = %start.display(), "directory not found, skipping");
            return Ok(());
        }

        // Sorted so duplicate reports name the same pair on every run
        for entry in WalkDir::new(&start).sort_by_file_name() {
            let entry = entry.map_err(|source| CatalogError::Walk {
                path: start.clone(),
                source,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().map_or(true, |ext| ext != "sql") {
                continue;
            }

            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if paths.is_excluded(&relative_str(relative)) {
                tracing::debug!(path = %relative.display(), "excluded");
                continue;
            }

            let source = std::fs::read_to_string(entry.path()).map_err(|source| CatalogError::Io {
                path: entry.path().to_path_buf(),
                source,
            })?;
            self.record(File::new(relative, file_type, source))?;
        }

        Ok(())
    }

    fn record(&mut self, file: File) -> Result<(), CatalogError> {
        let file = Arc::new(file);

        match file.file_type {
            FileType::Macro => {
                insert_unique(&mut self.macros, FileType::Macro, file.name.clone(), &file)?;
            }
            FileType::Model => {
                for name in suffixes(&file.lookup_path()) {
                    insert_unique(&mut self.models, FileType::Model, name, &file)?;
                }
            }
            FileType::Test => self.tests.push(Arc::clone(&file)),
            FileType::Unknown => {}
        }

        self.files.insert(file.path.clone(), file);
        Ok(())
    }

    /// Look a model up by any of its path suffixes
    pub fn model(&self, name: &str) -> Option<&Arc<File>> {
        self.models.get(name.trim_end_matches(".sql"))
    }

    /// Look a macro file up by stem
    pub fn macro_file(&self, name: &str) -> Option<&Arc<File>> {
        self.macros.get(name)
    }

    /// All models, ordered by path
    pub fn models(&self) -> Vec<&Arc<File>> {
        self.of_type(FileType::Model)
    }

    /// All macro files, ordered by path
    pub fn macros(&self) -> Vec<&Arc<File>> {
        self.of_type(FileType::Macro)
    }

    /// All data tests, ordered by path
    pub fn tests(&self) -> Vec<&Arc<File>> {
        self.of_type(FileType::Test)
    }

    fn of_type(&self, file_type: FileType) -> Vec<&Arc<File>> {
        self.files
            .values()
            .filter(|file| file.file_type == file_type)
            .collect()
    }

    /// Every file, ordered by path
    pub fn files(&self) -> impl Iterator<Item = &Arc<File>> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Macros resolve by file stem. Files that fail to parse do not resolve;
/// their error is reported when the file itself is parsed.
impl Resolver for FileCatalog {
    fn resolve(&self, name: &str) -> Option<Arc<Template>> {
        self.macro_file(name).and_then(|file| file.parse().ok())
    }
}

fn insert_unique(
    table: &mut HashMap<String, Arc<File>>,
    kind: FileType,
    name: String,
    file: &Arc<File>,
) -> Result<(), CatalogError> {
    if let Some(existing) = table.get(&name) {
        return Err(CatalogError::DuplicateDefinition {
            kind,
            name,
            first: existing.path.clone(),
            second: file.path.clone(),
        });
    }
    table.insert(name, Arc::clone(file));
    Ok(())
}

/// `a/b/c` -> `a/b/c`, `b/c`, `c`
fn suffixes(path: &str) -> Vec<String> {
    let parts: Vec<&str> = path.split('/').collect();
    (0..parts.len()).map(|i| parts[i..].join("/")).collect()
}

/// Project-relative path with `/` separators, as exclude patterns are written
fn relative_str(path: &Path) -> String {
    let mut s = lookup_path(path);
    if let Some(ext) = path.extension() {
        s.push('.');
        s.push_str(&ext.to_string_lossy());
    }
    s
}

fn classify(path: &Path, paths: &PathsConfig) -> FileType {
    let lookup = lookup_path(path);
    let under = |dirs: &[String]| {
        dirs.iter()
            .any(|dir| lookup.starts_with(&format!("{}/", dir.trim_end_matches('/'))))
    };

    if under(&paths.macros) {
        FileType::Macro
    } else if under(&paths.models) {
        FileType::Model
    } else if under(&paths.tests) {
        FileType::Test
    } else {
        FileType::Unknown
    }
}
