//! Publisher: make a new documentation tree visible in one step
//!
//! The live path is a symbolic link to a generation directory next to it.
//! Every artifact is written into a fresh staging directory in the same parent;
//! once all writes succeed a new link is renamed over the live one, which is
//! atomic on POSIX filesystems, and only then is the previous generation
//! removed. A failure before the swap leaves the live tree untouched.

use routedoc_common::lookup::validate_segment;
use routedoc_common::ProviderId;
use routedoc_generator::{validate_relative_path, ArtifactSet};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{PipelineError, Result};

const GENERATION_PREFIX: &str = ".routedoc-gen-";
const LINK_PREFIX: &str = ".routedoc-link-";

pub struct Publisher {
    live: PathBuf,
}

impl Publisher {
    pub fn new(live: impl Into<PathBuf>) -> Self {
        Self { live: live.into() }
    }

    pub fn live_path(&self) -> &Path {
        &self.live
    }

    /// Publish `artifacts`, carrying over the `keep` provider directories of the live tree
    ///
    /// Returns the generation directory now behind the live path.
    pub fn publish(&self, artifacts: &ArtifactSet, keep: &[ProviderId]) -> Result<PathBuf> {
        let parent = self.parent()?;
        fs::create_dir_all(&parent)?;

        let staging = tempfile::Builder::new()
            .prefix(GENERATION_PREFIX)
            .tempdir_in(&parent)
            .map_err(|e| {
                PipelineError::Publish(format!("cannot create staging directory: {}", e))
            })?;

        self.stage(&staging, artifacts, keep)?;

        self.migrate_legacy(&parent)?;
        let generation = staging.keep();
        let previous = self.current_generation(&parent);
        if let Err(e) = self.swap(&parent, &generation) {
            if let Err(cleanup) = fs::remove_dir_all(&generation) {
                warn!(
                    path = %generation.display(),
                    error = %cleanup,
                    "Failed to remove staging directory"
                );
            }
            return Err(e);
        }

        if let Some(previous) = previous.filter(|p| p != &generation) {
            if let Err(e) = fs::remove_dir_all(&previous) {
                warn!(
                    path = %previous.display(),
                    error = %e,
                    "Failed to remove previous generation"
                );
            }
        }

        info!(
            live = %self.live.display(),
            files = artifacts.len(),
            kept = keep.len(),
            "Published documentation tree"
        );
        Ok(generation)
    }

    fn stage(&self, staging: &TempDir, artifacts: &ArtifactSet, keep: &[ProviderId]) -> Result<()> {
        for (relative, bytes) in artifacts.iter() {
            validate_relative_path(relative)?;
            let target = join_relative(staging.path(), relative);
            if let Some(dir) = target.parent() {
                fs::create_dir_all(dir).map_err(|e| stage_error(relative, e))?;
            }
            fs::write(&target, bytes).map_err(|e| stage_error(relative, e))?;
        }

        for provider in keep {
            validate_segment(provider.as_str())?;
            let source = self.live.join(provider.as_str());
            if !source.is_dir() {
                debug!(provider = %provider, "No previous documentation to keep");
                continue;
            }
            let target = staging.path().join(provider.as_str());
            if target.exists() {
                return Err(PipelineError::Publish(format!(
                    "kept provider '{}' collides with new artifacts",
                    provider
                )));
            }
            copy_tree(&source, &target)?;
            debug!(provider = %provider, "Kept previous documentation");
        }
        Ok(())
    }

    fn parent(&self) -> Result<PathBuf> {
        match self.live.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => Ok(parent.to_path_buf()),
            Some(_) => Ok(PathBuf::from(".")),
            None => Err(PipelineError::Publish(format!(
                "cannot publish to {}",
                self.live.display()
            ))),
        }
    }

    fn file_name(&self) -> Result<OsString> {
        self.live
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| {
                PipelineError::Publish(format!("cannot publish to {}", self.live.display()))
            })
    }

    /// Generation directory the live link points at, if it is one of ours
    fn current_generation(&self, parent: &Path) -> Option<PathBuf> {
        let target = fs::read_link(&self.live).ok()?;
        let name = target.file_name()?.to_str()?;
        name.starts_with(GENERATION_PREFIX).then(|| parent.join(name))
    }

    /// Replace a plain live directory from an older layout by a link to it
    ///
    /// This one-time step is the only point where the live path briefly does
    /// not exist: a link cannot be renamed over a non-empty directory, so the
    /// directory is moved aside first and the link created after it.
    #[cfg(unix)]
    fn migrate_legacy(&self, parent: &Path) -> Result<()> {
        let Ok(meta) = fs::symlink_metadata(&self.live) else {
            return Ok(());
        };
        if meta.file_type().is_symlink() {
            return Ok(());
        }
        let legacy = parent.join(format!(
            "{}legacy-{}",
            GENERATION_PREFIX,
            self.file_name()?.to_string_lossy()
        ));
        fs::rename(&self.live, &legacy).map_err(|e| {
            PipelineError::Publish(format!("cannot migrate {}: {}", self.live.display(), e))
        })?;
        std::os::unix::fs::symlink(relative_name(&legacy)?, &self.live)?;
        info!(live = %self.live.display(), "Migrated published directory to a link");
        Ok(())
    }

    #[cfg(not(unix))]
    fn migrate_legacy(&self, _parent: &Path) -> Result<()> {
        Ok(())
    }

    #[cfg(unix)]
    fn swap(&self, parent: &Path, generation: &Path) -> Result<()> {
        let link = parent.join(format!("{}{:016x}", LINK_PREFIX, rand::random::<u64>()));
        std::os::unix::fs::symlink(relative_name(generation)?, &link)?;
        if let Err(e) = fs::rename(&link, &self.live) {
            let _ = fs::remove_file(&link);
            return Err(PipelineError::Publish(format!("swap failed: {}", e)));
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn swap(&self, parent: &Path, generation: &Path) -> Result<()> {
        let name = self.file_name()?;
        let aside = parent.join(format!("{}old-{}", GENERATION_PREFIX, name.to_string_lossy()));
        if self.live.exists() {
            fs::rename(&self.live, &aside)?;
        }
        if let Err(e) = fs::rename(generation, &self.live) {
            if aside.exists() {
                fs::rename(&aside, &self.live)?;
            }
            return Err(PipelineError::Publish(format!("swap failed: {}", e)));
        }
        if aside.exists() {
            fs::remove_dir_all(&aside)?;
        }
        Ok(())
    }
}

fn relative_name(path: &Path) -> std::io::Result<PathBuf> {
    path.file_name().map(PathBuf::from).ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
    })
}

fn join_relative(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

fn stage_error(relative: &str, e: std::io::Error) -> PipelineError {
    PipelineError::Publish(format!("staging {} failed: {}", relative, e))
}

/// Copy a directory tree, following the live link
fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(|e| {
            PipelineError::Publish(format!("cannot read {}: {}", source.display(), e))
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| PipelineError::Publish(e.to_string()))?;
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)?;
        } else {
            fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}
