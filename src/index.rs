//! Workspace symbol index with an on-disk cache.
//!
//! Walks every package directory under a source root and records each
//! exported top-level symbol as `package.Name -> workspace-relative path`.
//! The mapping is persisted next to the workspace as pretty-printed JSON and
//! reused for up to 24 hours; a missing, corrupt, or empty artifact is
//! rebuilt transparently.

use crate::ast::{CompilationUnit, UnitParser};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// File name of the persisted index, directly under the workspace root.
pub const CACHE_FILE_NAME: &str = ".symbol-index.json";

/// A cached artifact older than this is rebuilt.
pub const CACHE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Workspace-relative paths containing any of these fragments are excluded
/// from indexing.
const DENYLISTED_FRAGMENTS: &[&str] = &["vendor", "legacy"];

/// Flat mapping from qualified symbol (`package.Name`) to the import path of
/// the package exporting it. Insertion-ordered, so the persisted artifact is
/// stable across runs of the sorted workspace walk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceIndex {
    symbols: IndexMap<String, String>,
}

impl WorkspaceIndex {
    /// Import path for a qualified symbol, if any package exports it.
    pub fn get(&self, qualified: &str) -> Option<&str> {
        self.symbols.get(qualified).map(String::as_str)
    }

    /// Records a symbol. Last writer wins when two packages share a short
    /// name and export the same identifier.
    pub fn insert(&mut self, qualified: impl Into<String>, path: impl Into<String>) {
        self.symbols.insert(qualified.into(), path.into());
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.symbols
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Cache-aware entry point: serves the persisted artifact when it is
    /// fresh and decodes to a non-empty mapping, otherwise rebuilds from the
    /// workspace and persists the result.
    ///
    /// `force_rebuild` bypasses the artifact unconditionally. An unreadable
    /// or corrupt artifact is logged and rebuilt rather than surfaced; only
    /// a workspace root that cannot be walked is an error.
    pub fn load(root: &Path, force_rebuild: bool, parser: &dyn UnitParser) -> Result<Self> {
        let cache = root.join(CACHE_FILE_NAME);

        if !force_rebuild && cache_is_fresh(&cache) {
            match read_cache(&cache) {
                Ok(index) if index.is_empty() => {
                    log::debug!(
                        "index cache {} decoded to an empty mapping, rebuilding",
                        cache.display()
                    );
                    return Self::load(root, true, parser);
                }
                Ok(index) => return Ok(index),
                Err(err) => {
                    log::warn!(
                        "unusable index cache {}: {err:#}; rebuilding",
                        cache.display()
                    );
                    return Self::load(root, true, parser);
                }
            }
        }

        let index = Self::build(root, parser)?;
        if let Err(err) = write_cache(&cache, &index) {
            // The in-memory index is still good for this run.
            log::warn!("failed to persist index cache {}: {err:#}", cache.display());
        }
        Ok(index)
    }

    /// Full workspace scan, ignoring any cached artifact.
    ///
    /// Visits every directory under `root` in sorted order, parses the
    /// source files of each directory as one package unit, and records every
    /// exported top-level name. Files the parser rejects and entries that
    /// cannot be read are logged and skipped.
    pub fn build(root: &Path, parser: &dyn UnitParser) -> Result<Self> {
        let meta = std::fs::metadata(root)
            .with_context(|| format!("cannot access workspace root {}", root.display()))?;
        anyhow::ensure!(
            meta.is_dir(),
            "workspace root {} is not a directory",
            root.display()
        );

        let mut index = WorkspaceIndex::default();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            // The root itself is exempt from the hidden-entry filter; its
            // name is the caller's business.
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden_or_underscore(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("skipping unreadable workspace entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let Some(relative) = relative_package_path(root, entry.path()) else {
                continue;
            };
            if relative.is_empty() || is_denylisted(&relative) {
                continue;
            }
            index_package_dir(entry.path(), &relative, parser, &mut index);
        }

        Ok(index)
    }
}

fn is_hidden_or_underscore(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.') || name.starts_with('_'))
}

/// `dir` relative to `root`, `/`-joined with no leading separator. `None`
/// when the components are not valid UTF-8.
fn relative_package_path(root: &Path, dir: &Path) -> Option<String> {
    let relative = dir.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        parts.push(component.as_os_str().to_str()?);
    }
    Some(parts.join("/"))
}

fn is_denylisted(relative: &str) -> bool {
    DENYLISTED_FRAGMENTS
        .iter()
        .any(|fragment| relative.contains(fragment))
}

/// Parses every source file directly inside `dir` and records its exported
/// top-level names under `relative`.
fn index_package_dir(
    dir: &Path,
    relative: &str,
    parser: &dyn UnitParser,
    index: &mut WorkspaceIndex,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("cannot list {}: {err}", dir.display());
            return;
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == parser.extension())
        })
        .collect();
    files.sort();

    for file in files {
        let source = match std::fs::read_to_string(&file) {
            Ok(source) => source,
            Err(err) => {
                log::warn!("cannot read {}: {err}", file.display());
                continue;
            }
        };
        let unit = match parser.parse(&source) {
            Ok(unit) => unit,
            Err(err) => {
                log::warn!("skipping {}: {err:#}", file.display());
                continue;
            }
        };
        record_exports(&unit, relative, index);
    }
}

fn record_exports(unit: &CompilationUnit, relative: &str, index: &mut WorkspaceIndex) {
    for name in unit.top_level_names() {
        if is_exported(name) {
            index.insert(format!("{}.{}", unit.package_name, name), relative);
        }
    }
}

/// Exported-name test: the first byte must fall strictly inside the
/// uppercase range, so names starting with `'A'` or `'Z'` do not qualify.
pub fn is_exported(name: &str) -> bool {
    name.as_bytes()
        .first()
        .is_some_and(|&first| first > b'A' && first < b'Z')
}

fn cache_is_fresh(cache: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(cache) else {
        return false;
    };
    let Ok(modified) = meta.modified() else {
        return false;
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age <= CACHE_MAX_AGE,
        // Modified in the future; treat as fresh.
        Err(_) => true,
    }
}

fn read_cache(cache: &Path) -> Result<WorkspaceIndex> {
    let data = std::fs::read_to_string(cache)
        .with_context(|| format!("failed to read {}", cache.display()))?;
    serde_json::from_str(&data).with_context(|| format!("failed to decode {}", cache.display()))
}

/// Serializes the index as pretty-printed JSON, one entry per line, and
/// moves it into place atomically so concurrent readers never observe a
/// partial artifact.
fn write_cache(cache: &Path, index: &WorkspaceIndex) -> Result<()> {
    let text = serde_json::to_string_pretty(index).context("failed to encode index")?;
    let staging = cache.with_extension("json.tmp");
    std::fs::write(&staging, format!("{text}\n"))
        .with_context(|| format!("failed to write {}", staging.display()))?;
    std::fs::rename(&staging, cache)
        .with_context(|| format!("failed to move cache into place at {}", cache.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Decl, Item};
    use std::fs;
    use tempfile::TempDir;

    /// Line-oriented stub standing in for the external parser: a
    /// `package <name>` header, then one top-level item name per line.
    struct LineParser;

    impl UnitParser for LineParser {
        fn extension(&self) -> &str {
            "src"
        }

        fn parse(&self, source: &str) -> Result<CompilationUnit> {
            let mut lines = source.lines().filter(|line| !line.trim().is_empty());
            let header = lines.next().context("empty source file")?;
            let package = header
                .strip_prefix("package ")
                .context("missing package header")?;
            let mut unit = CompilationUnit::new(package.trim());
            for line in lines {
                unit.decls.push(Decl::Item(Item {
                    name: line.trim().to_string(),
                    body: Vec::new(),
                }));
            }
            Ok(unit)
        }
    }

    fn write_package(root: &Path, dir: &str, package: &str, names: &[&str]) {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        let mut source = format!("package {package}\n");
        for name in names {
            source.push_str(name);
            source.push('\n');
        }
        fs::write(dir.join("lib.src"), source).unwrap();
    }

    #[test]
    fn build_records_exported_symbols_per_package() {
        let root = TempDir::new().unwrap();
        write_package(root.path(), "alpha", "alpha", &["Foo", "helper"]);
        write_package(root.path(), "mylib/foo", "foo", &["Widget"]);

        let index = WorkspaceIndex::build(root.path(), &LineParser).unwrap();
        assert_eq!(index.get("alpha.Foo"), Some("alpha"));
        assert_eq!(index.get("foo.Widget"), Some("mylib/foo"));
        assert_eq!(index.get("alpha.helper"), None);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn exported_test_excludes_the_uppercase_bounds() {
        assert!(is_exported("Foo"));
        assert!(is_exported("Buffer"));
        assert!(!is_exported("Apple"));
        assert!(!is_exported("Zebra"));
        assert!(!is_exported("widget"));
        assert!(!is_exported("_Hidden"));
        assert!(!is_exported(""));
    }

    #[test]
    fn boundary_names_never_reach_the_index() {
        let root = TempDir::new().unwrap();
        write_package(
            root.path(),
            "pkg",
            "pkg",
            &["Apple", "Zebra", "Widget", "gadget"],
        );

        let index = WorkspaceIndex::build(root.path(), &LineParser).unwrap();
        assert_eq!(index.get("pkg.Widget"), Some("pkg"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn denylisted_and_hidden_subtrees_are_skipped() {
        let root = TempDir::new().unwrap();
        write_package(root.path(), "good", "good", &["Keep"]);
        write_package(root.path(), "vendor/dep", "dep", &["Dropped"]);
        write_package(root.path(), "legacy/old", "old", &["Dropped"]);
        write_package(root.path(), ".cache/pkg", "hidden", &["Dropped"]);
        write_package(root.path(), "_build/pkg", "build", &["Dropped"]);

        let index = WorkspaceIndex::build(root.path(), &LineParser).unwrap();
        assert_eq!(index.get("good.Keep"), Some("good"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn unparsable_file_is_skipped_not_fatal() {
        let root = TempDir::new().unwrap();
        write_package(root.path(), "ok", "ok", &["Good"]);
        let bad = root.path().join("broken");
        fs::create_dir_all(&bad).unwrap();
        fs::write(bad.join("lib.src"), "not a package header\nFoo\n").unwrap();

        let index = WorkspaceIndex::build(root.path(), &LineParser).unwrap();
        assert_eq!(index.get("ok.Good"), Some("ok"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn colliding_short_names_resolve_to_the_last_writer() {
        let root = TempDir::new().unwrap();
        write_package(root.path(), "first/dup", "dup", &["Same"]);
        write_package(root.path(), "second/dup", "dup", &["Same"]);

        let index = WorkspaceIndex::build(root.path(), &LineParser).unwrap();
        // Sorted walk: "second/dup" is visited after "first/dup".
        assert_eq!(index.get("dup.Same"), Some("second/dup"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn missing_root_is_an_error() {
        let root = TempDir::new().unwrap();
        let gone = root.path().join("nope");
        assert!(WorkspaceIndex::build(&gone, &LineParser).is_err());
    }

    #[test]
    fn load_persists_then_serves_the_cache() {
        let root = TempDir::new().unwrap();
        write_package(root.path(), "alpha", "alpha", &["Foo"]);

        let built = WorkspaceIndex::load(root.path(), false, &LineParser).unwrap();
        assert!(root.path().join(CACHE_FILE_NAME).is_file());

        // A workspace change is invisible while the artifact is fresh.
        write_package(root.path(), "beta", "beta", &["Bar"]);
        let cached = WorkspaceIndex::load(root.path(), false, &LineParser).unwrap();
        assert_eq!(cached, built);

        // Forcing the rebuild picks it up.
        let rebuilt = WorkspaceIndex::load(root.path(), true, &LineParser).unwrap();
        assert_eq!(rebuilt.get("beta.Bar"), Some("beta"));
    }

    #[test]
    fn cache_round_trips_through_the_artifact() {
        let root = TempDir::new().unwrap();
        write_package(root.path(), "alpha", "alpha", &["Foo"]);
        write_package(root.path(), "beta", "beta", &["Bar"]);

        let built = WorkspaceIndex::load(root.path(), true, &LineParser).unwrap();
        let reloaded = WorkspaceIndex::load(root.path(), false, &LineParser).unwrap();
        assert_eq!(built, reloaded);
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn artifact_is_human_diffable_json() {
        let root = TempDir::new().unwrap();
        write_package(root.path(), "alpha", "alpha", &["Foo"]);
        write_package(root.path(), "beta", "beta", &["Bar"]);

        WorkspaceIndex::load(root.path(), true, &LineParser).unwrap();
        let contents = fs::read_to_string(root.path().join(CACHE_FILE_NAME)).unwrap();
        insta::assert_snapshot!(contents.trim_end(), @r#"
        {
          "alpha.Foo": "alpha",
          "beta.Bar": "beta"
        }
        "#);
    }

    #[test]
    fn empty_workspace_yields_empty_mapping_and_artifact() {
        let root = TempDir::new().unwrap();
        let index = WorkspaceIndex::load(root.path(), true, &LineParser).unwrap();
        assert!(index.is_empty());

        let contents = fs::read_to_string(root.path().join(CACHE_FILE_NAME)).unwrap();
        assert_eq!(contents, "{}\n");
    }

    #[test]
    fn corrupt_cache_falls_back_to_a_rebuild() {
        let root = TempDir::new().unwrap();
        write_package(root.path(), "alpha", "alpha", &["Foo"]);
        fs::write(root.path().join(CACHE_FILE_NAME), "not json at all").unwrap();

        let index = WorkspaceIndex::load(root.path(), false, &LineParser).unwrap();
        assert_eq!(index.get("alpha.Foo"), Some("alpha"));
    }

    #[test]
    fn empty_cache_mapping_triggers_a_rebuild() {
        let root = TempDir::new().unwrap();
        write_package(root.path(), "alpha", "alpha", &["Foo"]);
        fs::write(root.path().join(CACHE_FILE_NAME), "{}\n").unwrap();

        let index = WorkspaceIndex::load(root.path(), false, &LineParser).unwrap();
        assert_eq!(index.get("alpha.Foo"), Some("alpha"));
    }

    #[test]
    fn root_level_files_are_not_indexed() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("lib.src"), "package root\nFoo\n").unwrap();

        let index = WorkspaceIndex::build(root.path(), &LineParser).unwrap();
        assert!(index.is_empty());
    }
}
