//! Fixture provisioning
//!
//! Copies a named fixture project into a fresh temporary directory so the
//! tool under test can mutate it without touching the canonical tree.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::common::config::FixturesConfig;
use crate::common::{Error, Result};

/// A per-test copy of a fixture project
///
/// The copy is deleted when this value is dropped, unless it was created
/// with artifact preservation enabled.
#[derive(Debug)]
pub struct IsolatedProject {
    name: String,
    root: PathBuf,
    fixture_root: PathBuf,
    /// Owns the temporary directory; `None` once the copy is preserved
    _temp_dir: Option<TempDir>,
}

impl IsolatedProject {
    /// Fixture name this project was copied from
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute path of the isolated copy
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the original, unmodified fixture
    pub fn fixture_root(&self) -> &Path {
        &self.fixture_root
    }

    /// Resolve a path relative to the isolated copy
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }
}

/// Copies fixture projects out of a fixed fixtures root
#[derive(Debug, Clone)]
pub struct FixtureProvisioner {
    fixtures_root: PathBuf,
    temp_root: Option<PathBuf>,
    preserve_artifacts: bool,
}

impl FixtureProvisioner {
    pub fn new(fixtures_root: impl Into<PathBuf>) -> Self {
        Self {
            fixtures_root: fixtures_root.into(),
            temp_root: None,
            preserve_artifacts: false,
        }
    }

    pub fn from_config(config: &FixturesConfig, preserve_artifacts: bool) -> Self {
        Self {
            fixtures_root: config.root.clone(),
            temp_root: config.temp_root.clone(),
            preserve_artifacts,
        }
    }

    pub fn fixtures_root(&self) -> &Path {
        &self.fixtures_root
    }

    /// Path of a fixture project in the fixtures root
    pub fn fixture_path(&self, name: &str) -> PathBuf {
        self.fixtures_root.join(name)
    }

    /// Copy the named fixture into a fresh temporary directory
    pub fn provision(&self, name: &str) -> Result<IsolatedProject> {
        let fixture_root = self.fixture_path(name);
        if !fixture_root.is_dir() {
            return Err(Error::fixture_not_found(name, &self.fixtures_root));
        }

        let temp_dir = self
            .temp_dir_for(name)
            .map_err(|e| Error::provision_failed(name, &e))?;

        // Absolute, symlink-free root so substituted arguments are stable
        let root = temp_dir
            .path()
            .canonicalize()
            .map_err(|e| Error::provision_failed(name, &e))?;

        copy_tree(&fixture_root, &root).map_err(|e| Error::provision_failed(name, &e))?;
        tracing::debug!(fixture = name, root = %root.display(), "Provisioned isolated project");

        let temp_dir = if self.preserve_artifacts {
            #[allow(deprecated)]
            let kept = temp_dir.into_path();
            tracing::info!(fixture = name, path = %kept.display(), "Preserving isolated project");
            None
        } else {
            Some(temp_dir)
        };

        Ok(IsolatedProject {
            name: name.to_string(),
            root,
            fixture_root,
            _temp_dir: temp_dir,
        })
    }

    fn temp_dir_for(&self, name: &str) -> io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(name).suffix(".isolated");
        match &self.temp_root {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
    }
}

/// Recursively copy `from` into `to`, creating each directory before its contents
pub fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;

    let mut entries = fs::read_dir(from)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let src = entry.path();
        let dst = to.join(entry.file_name());
        // Follow symlinks so the copy holds real bytes
        if fs::metadata(&src)?.is_dir() {
            copy_tree(&src, &dst)?;
        } else {
            fs::copy(&src, &dst)?;
        }
    }
    Ok(())
}

/// Map every file under `root` (relative path) to its bytes
pub fn snapshot(root: &Path) -> io::Result<BTreeMap<PathBuf, Vec<u8>>> {
    let mut files = BTreeMap::new();
    snapshot_dir(root, root, &mut files)?;
    Ok(files)
}

fn snapshot_dir(root: &Path, dir: &Path, files: &mut BTreeMap<PathBuf, Vec<u8>>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if fs::metadata(&path)?.is_dir() {
            snapshot_dir(root, &path, files)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
                .to_path_buf();
            files.insert(relative, fs::read(&path)?);
        }
    }
    Ok(())
}
