//! EXIF metadata reading and writing.
//!
//! - [`MetadataCommitter`] / [`commit_metadata`] — rewrite the species,
//!   location and capture-time tags of an image, retrying failed writes
//! - [`read_embedded`] — read those tags back out
//! - [`ContainerCodec`] / [`FileCodec`] — load and store the metadata block
//!   of JPEG, PNG and WebP files
//! - [`fields`] — typed access to the tags inside a decoded block

mod codec;
mod error;
pub mod fields;
mod reader;
mod writer;

pub use codec::{ContainerCodec, FileCodec, ImageKind, MetadataContainer};
pub use error::{CommitError, ContainerError};
pub use reader::{EmbeddedInfo, EmbeddedLocation, read_embedded};
pub use writer::{
    CUSTOM_GROUP, CommitOutcome, DATE_FORMAT_FOR_DISK, MetadataCommitter, RetryPolicy,
    TAG_LOCATION_ENTRY, TAG_SPECIES_ENTRY, apply_updates, commit_metadata,
};
