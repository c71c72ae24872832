//! # sanimal-exif
//!
//! Write camera-trap tagging results into image EXIF metadata: the species
//! seen (with counts), the site they were seen at (GPS plus a location tag)
//! and a refreshed capture timestamp. Failed writes are retried with a fixed
//! backoff; a file that cannot be parsed fails immediately.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sanimal_exif::exif::commit_metadata;
//! use sanimal_exif::model::{Location, SpeciesEntry};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let species = vec![
//!         SpeciesEntry::new("Mule Deer", "Odocoileus hemionus", 2),
//!         SpeciesEntry::new("Coyote", "Canis latrans", 1),
//!     ];
//!     let site = Location {
//!         name: "Ridge Camera 3".into(),
//!         id: "RC3".into(),
//!         latitude: 32.2319,
//!         longitude: -110.9501,
//!         elevation: 1402.0,
//!     };
//!
//!     let outcome = commit_metadata(Path::new("IMG_0001.JPG"), Some(&species), Some(&site))?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Batch Usage
//!
//! The pipeline module runs a list of jobs with the settings from a config
//! file (retry policy, dry run, backups):
//!
//! ```rust,no_run
//! use sanimal_exif::config::Config;
//! use sanimal_exif::exif::MetadataCommitter;
//! use sanimal_exif::pipeline::{load_manifest, process_job};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let committer = MetadataCommitter::from_config(&config);
//!
//!     for job in load_manifest("jobs.json".as_ref())? {
//!         let result = process_job(&committer, &job, &config)?;
//!         println!("{}: {:?}", result.path.display(), result.outcome);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | Metadata location |
//! |--------|-------------------|
//! | JPEG (`.jpg`, `.jpeg`) | APP1 `Exif` segment |
//! | PNG (`.png`) | `eXIf` chunk |
//! | WebP (`.webp`) | `EXIF` RIFF chunk |
//!
//! ## Modules
//!
//! - [`config`] — Configuration types and loading/saving
//! - [`exif`] — Metadata container codec, committer and reader
//! - [`model`] — Species and location values
//! - [`pipeline`] — Update jobs, manifests and image collection

pub mod config;
pub mod exif;
pub mod model;
pub mod pipeline;

#[cfg(test)]
mod test_support;
