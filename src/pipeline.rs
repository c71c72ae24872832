use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::exif::{CommitOutcome, ContainerCodec, ImageKind, MetadataCommitter};
use crate::model::{Location, SpeciesEntry};

/// One file to update.
///
/// `species: None` leaves the species tag alone while `Some(vec![])` clears
/// it. The same holds for `location` and the location/GPS tags.
///
/// A manifest is a JSON array of jobs:
///
/// ```json
/// [
///   {
///     "path": "cam01/IMG_0001.JPG",
///     "species": [
///       { "species": { "name": "Deer", "scientific_name": "Odocoileus" }, "count": 2 }
///     ],
///     "location": { "name": "SiteA", "id": 7, "latitude": 10.0, "longitude": -20.0, "elevation": 150.5 }
///   }
/// ]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateJob {
    pub path: PathBuf,
    #[serde(default)]
    pub species: Option<Vec<SpeciesEntry>>,
    #[serde(default)]
    pub location: Option<Location>,
}

/// The result of processing a single job.
#[derive(Debug, Serialize)]
pub struct ProcessResult {
    pub path: PathBuf,
    pub outcome: CommitOutcome,
    /// Set when the job ran in dry-run mode and would have written.
    pub dry_run: bool,
    pub backup_path: Option<PathBuf>,
}

/// Load update jobs from a JSON manifest.
///
/// Relative job paths are resolved against the manifest's directory.
pub fn load_manifest(path: &Path) -> Result<Vec<UpdateJob>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let mut jobs: Vec<UpdateJob> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse manifest {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    for job in &mut jobs {
        if job.path.is_relative() {
            job.path = base.join(&job.path);
        }
    }
    Ok(jobs)
}

/// Expand command-line paths into the image files a batch should tag.
///
/// Files are kept when [`ImageKind`] recognizes their extension. Camera-trap
/// card dumps are usually nested per camera and per day, so directories are
/// searched at any depth, symlinks included, in file-name order to give
/// batches a stable order across runs.
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_dir() {
            images.extend(
                WalkDir::new(path)
                    .follow_links(true)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file() && is_taggable(e.path()))
                    .map(|e| e.into_path()),
            );
        } else if !path.exists() {
            log::warn!("No such file or directory: {}", path.display());
        } else if is_taggable(path) {
            images.push(path.clone());
        } else {
            log::warn!("Not a taggable image, skipped: {}", path.display());
        }
    }

    images
}

fn is_taggable(path: &Path) -> bool {
    ImageKind::from_path(path).is_some()
}

/// Copy the untagged original next to it as `<name>.<ext>.bak`.
///
/// An existing backup is kept, so repeated runs never replace the true
/// original with an already tagged copy.
fn backup_original(path: &Path) -> Result<PathBuf> {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    let backup = path.with_file_name(name);

    if backup.exists() {
        log::debug!("Keeping existing backup {}", backup.display());
    } else {
        std::fs::copy(path, &backup)
            .with_context(|| format!("Failed to back up {}", path.display()))?;
        log::debug!("Backed up {} to {}", path.display(), backup.display());
    }

    Ok(backup)
}

/// Run one update job.
///
/// 1. **Validate** the location coordinates
/// 2. **Back up** the original if `output.backup_originals` is set
/// 3. **Commit** (or only prepare, in dry-run mode)
///
/// Any error is terminal for the job; the caller decides whether to stop.
pub fn process_job<C: ContainerCodec>(
    committer: &MetadataCommitter<C>,
    job: &UpdateJob,
    config: &Config,
) -> Result<ProcessResult> {
    if let Some(location) = &job.location {
        location
            .validate()
            .with_context(|| format!("Invalid location {:?}", location.name))?;
    }

    let species = job.species.as_deref();
    let location = job.location.as_ref();

    let mut result = ProcessResult {
        path: job.path.clone(),
        outcome: CommitOutcome::Unchanged,
        dry_run: false,
        backup_path: None,
    };

    if config.output.dry_run {
        result.dry_run = committer.prepare(&job.path, species, location)?.is_some();
        return Ok(result);
    }

    if config.output.backup_originals && (species.is_some() || location.is_some()) {
        result.backup_path = Some(backup_original(&job.path)?);
    }

    result.outcome = committer.commit(&job.path, species, location)?;
    Ok(result)
}
