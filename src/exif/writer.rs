use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use little_exif::exif_tag::ExifTag;
use little_exif::ifd::ExifTagGroup;
use little_exif::metadata::Metadata;

use super::codec::{ContainerCodec, FileCodec, MetadataContainer};
use super::error::CommitError;
use super::fields::{set_gps_in_degrees, set_text};
use crate::config::Config;
use crate::model::{Location, SpeciesEntry};

/// Private tag holding the species list.
pub const TAG_SPECIES_ENTRY: u16 = 0x0228;
/// Private tag holding `(name, elevation, id)` of the camera location.
pub const TAG_LOCATION_ENTRY: u16 = 0x0229;

/// Group that holds the species and location tags. Collections tagged by the
/// desktop tool have them in the Exif sub-IFD, so they stay there.
pub const CUSTOM_GROUP: ExifTagGroup = ExifTagGroup::EXIF;

/// Capture timestamp format: 24-hour, zero-padded, no timezone.
pub const DATE_FORMAT_FOR_DISK: &str = "%Y:%m:%d %H:%M:%S";

/// How many times a write is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total write attempts, including the first. Values below 1 count as 1.
    pub max_attempts: u32,
    /// Pause after each failed attempt that will be retried.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Result of a commit that did not fail.
///
/// `Written` is reported the same way whether the first attempt succeeded or
/// a later one did; `attempts` is informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// Neither species nor location was supplied; the file was not opened.
    Unchanged,
    Written { attempts: u32 },
}

impl CommitOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// Rewrites the species, location and capture-time tags of image files.
///
/// Each call loads the file's metadata, mutates it in memory and writes it
/// back, retrying the write according to its [`RetryPolicy`]. Nothing is
/// shared between calls. There is no locking: concurrent writers to the same
/// file can lose updates, so callers serialize per file.
///
/// # Example
///
/// ```rust,no_run
/// use sanimal_exif::exif::MetadataCommitter;
/// use sanimal_exif::model::{Location, SpeciesEntry};
/// use std::path::Path;
///
/// let committer = MetadataCommitter::new();
/// let species = [SpeciesEntry::new("Deer", "Odocoileus", 2)];
/// let site = Location {
///     name: "SiteA".into(),
///     id: "7".into(),
///     latitude: 10.0,
///     longitude: -20.0,
///     elevation: 150.5,
/// };
///
/// let outcome = committer.commit(Path::new("IMG_0001.JPG"), Some(&species), Some(&site))?;
/// assert!(outcome.is_written());
/// # Ok::<(), sanimal_exif::exif::CommitError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MetadataCommitter<C = FileCodec> {
    codec: C,
    retry: RetryPolicy,
}

impl MetadataCommitter<FileCodec> {
    /// In-place file writes, 3 attempts, 1 second apart.
    pub fn new() -> Self {
        Self::with_codec(FileCodec::new(), RetryPolicy::default())
    }

    pub fn from_config(config: &Config) -> Self {
        Self::with_codec(
            FileCodec::new().atomic(config.output.atomic_write),
            config.retry.policy(),
        )
    }
}

impl Default for MetadataCommitter<FileCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ContainerCodec> MetadataCommitter<C> {
    pub fn with_codec(codec: C, retry: RetryPolicy) -> Self {
        Self { codec, retry }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Load `path` and apply the updates in memory without writing anything.
    ///
    /// Returns `None` when there is nothing to update.
    pub fn prepare(
        &self,
        path: &Path,
        species_present: Option<&[SpeciesEntry]>,
        location: Option<&Location>,
    ) -> Result<Option<MetadataContainer>, CommitError> {
        if species_present.is_none() && location.is_none() {
            return Ok(None);
        }

        let mut container = self.codec.load(path).map_err(|source| CommitError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        apply_updates(
            container.metadata_mut(),
            species_present,
            location,
            Local::now().naive_local(),
        );
        Ok(Some(container))
    }

    /// Write species, location and a fresh capture timestamp into `path`.
    ///
    /// * `species_present` — `None` leaves the species tag alone; an empty
    ///   slice clears it.
    /// * `location` — `None` leaves the location and GPS tags alone.
    ///
    /// With both `None` the call returns [`CommitOutcome::Unchanged`] without
    /// touching the file. A load failure is returned immediately as
    /// [`CommitError::Parse`]. Write failures are retried; once every attempt
    /// has failed the last cause is returned as [`CommitError::Write`].
    pub fn commit(
        &self,
        path: &Path,
        species_present: Option<&[SpeciesEntry]>,
        location: Option<&Location>,
    ) -> Result<CommitOutcome, CommitError> {
        let Some(container) = self.prepare(path, species_present, location)? else {
            log::debug!("Nothing to update for {}", path.display());
            return Ok(CommitOutcome::Unchanged);
        };
        let attempts = self.save_with_retry(&container, path)?;
        Ok(CommitOutcome::Written { attempts })
    }

    /// Returns the number of attempts used.
    ///
    /// The backoff uses `std::thread::sleep`, which cannot be interrupted:
    /// once started, the retry sequence always runs to success or exhaustion.
    fn save_with_retry(&self, container: &MetadataContainer, path: &Path) -> Result<u32, CommitError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.codec.save(container, path) {
                Ok(()) => {
                    if attempt > 1 {
                        log::debug!("Wrote {} on attempt {attempt}", path.display());
                    }
                    return Ok(attempt);
                }
                Err(source) if attempt >= max_attempts => {
                    return Err(CommitError::Write {
                        path: path.to_path_buf(),
                        attempts: attempt,
                        source,
                    });
                }
                Err(e) => {
                    log::warn!(
                        "Write attempt {attempt}/{max_attempts} for {} failed: {e}; retrying in {:?}",
                        path.display(),
                        self.retry.backoff
                    );
                    std::thread::sleep(self.retry.backoff);
                }
            }
        }
    }
}

/// Apply the tag mutations of one commit to a metadata block.
///
/// The capture timestamp is always replaced with `now`. Species and location
/// tags are only touched when supplied; every other tag is left as loaded.
pub fn apply_updates(
    metadata: &mut Metadata,
    species_present: Option<&[SpeciesEntry]>,
    location: Option<&Location>,
    now: NaiveDateTime,
) {
    let timestamp = now.format(DATE_FORMAT_FOR_DISK).to_string();
    log::debug!("  DateTimeOriginal: {timestamp}");
    metadata.set_tag(ExifTag::DateTimeOriginal(timestamp));

    if let Some(species) = species_present {
        let values: Vec<String> = species.iter().map(SpeciesEntry::to_string).collect();
        log::debug!("  Species: [{}]", values.join("; "));
        set_text(metadata, CUSTOM_GROUP, TAG_SPECIES_ENTRY, &values);
    }

    if let Some(location) = location {
        set_gps_in_degrees(metadata, location.longitude, location.latitude);
        log::debug!("  GPS: {}, {}", location.latitude, location.longitude);

        set_text(
            metadata,
            CUSTOM_GROUP,
            TAG_LOCATION_ENTRY,
            &[location.name.as_str(), &location.elevation_text(), &location.id],
        );
        log::debug!("  Location: {} ({})", location.name, location.id);
    }
}

/// Commit with the default file codec and retry policy.
///
/// See [`MetadataCommitter::commit`].
pub fn commit_metadata(
    path: &Path,
    species_present: Option<&[SpeciesEntry]>,
    location: Option<&Location>,
) -> Result<CommitOutcome, CommitError> {
    MetadataCommitter::new().commit(path, species_present, location)
}
