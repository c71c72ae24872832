use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use nom_exif::*;
use serde::Serialize;
use std::path::Path;

use little_exif::metadata::Metadata;

use super::codec::{ContainerCodec, FileCodec};
use super::fields::{capture_time_text, gps_in_degrees, text_values};
use super::writer::{DATE_FORMAT_FOR_DISK, TAG_LOCATION_ENTRY, TAG_SPECIES_ENTRY};
use crate::model::{Location, SpeciesEntry};

/// Tagging information embedded in an image.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmbeddedInfo {
    pub species: Vec<SpeciesEntry>,
    pub location: Option<EmbeddedLocation>,
    pub captured_at: Option<NaiveDateTime>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
}

/// The location tag: everything about a location except its coordinates,
/// which live in the GPS tags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddedLocation {
    pub name: String,
    pub elevation: f64,
    pub id: String,
}

impl EmbeddedInfo {
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
            && self.location.is_none()
            && self.captured_at.is_none()
            && self.gps_latitude.is_none()
            && self.gps_longitude.is_none()
    }

    /// The full location, when both the location tag and GPS are present.
    pub fn location(&self) -> Option<Location> {
        let loc = self.location.as_ref()?;
        Some(Location {
            name: loc.name.clone(),
            id: loc.id.clone(),
            latitude: self.gps_latitude?,
            longitude: self.gps_longitude?,
            elevation: loc.elevation,
        })
    }
}

/// Read species, location, capture time and GPS position from an image.
///
/// Unparseable species strings are skipped with a warning rather than
/// failing the whole read.
pub fn read_embedded(path: &Path) -> Result<EmbeddedInfo> {
    let container = FileCodec::new()
        .load(path)
        .with_context(|| format!("Failed to read metadata from {}", path.display()))?;
    let mut info = from_metadata(container.metadata());

    // nom-exif for GPS; fall back to the decoded tags for formats it can't parse
    let gps = read_gps(path).or_else(|| gps_in_degrees(container.metadata()));
    if let Some((lat, lon)) = gps {
        info.gps_latitude = Some(lat);
        info.gps_longitude = Some(lon);
    }

    Ok(info)
}

fn from_metadata(metadata: &Metadata) -> EmbeddedInfo {
    let mut info = EmbeddedInfo::default();

    if let Some(values) = text_values(metadata, TAG_SPECIES_ENTRY) {
        for value in values {
            match value.parse::<SpeciesEntry>() {
                Ok(entry) => info.species.push(entry),
                Err(e) => log::warn!("Skipping species tag value {value:?}: {e}"),
            }
        }
    }

    if let Some(values) = text_values(metadata, TAG_LOCATION_ENTRY) {
        match values.as_slice() {
            [name, elevation, id] => {
                let elevation = elevation.trim().parse::<f64>().unwrap_or_else(|_| {
                    log::warn!("Unknown elevation {elevation:?} in location tag, using 0");
                    0.0
                });
                info.location = Some(EmbeddedLocation {
                    name: name.clone(),
                    elevation,
                    id: id.clone(),
                });
            }
            other => log::warn!("Unknown location tag format: {other:?}"),
        }
    }

    info.captured_at = capture_time_text(metadata)
        .and_then(|s| NaiveDateTime::parse_from_str(s.trim(), DATE_FORMAT_FOR_DISK).ok());

    info
}

/// Read the GPS position with nom-exif's parser.
fn read_gps(path: &Path) -> Option<(f64, f64)> {
    let mut parser = MediaParser::new();
    let ms = MediaSource::file_path(path).ok()?;

    let iter: ExifIter = match parser.parse(ms) {
        Ok(iter) => iter,
        Err(_) => {
            log::debug!("nom-exif found no EXIF in {}", path.display());
            return None;
        }
    };

    let gps = iter.parse_gps_info().ok().flatten()?;
    Some((
        latlng_to_decimal(&gps.latitude, gps.latitude_ref),
        latlng_to_decimal(&gps.longitude, gps.longitude_ref),
    ))
}

/// Convert a nom-exif LatLng (3 URationals: deg, min, sec) to decimal degrees.
fn latlng_to_decimal(latlng: &LatLng, reference: char) -> f64 {
    let degrees = latlng.0.0 as f64 / latlng.0.1 as f64;
    let minutes = latlng.1.0 as f64 / latlng.1.1 as f64;
    let seconds = latlng.2.0 as f64 / latlng.2.1 as f64;

    let mut coord = degrees + minutes / 60.0 + seconds / 3600.0;

    if reference == 'S' || reference == 'W' {
        coord = -coord;
    }

    coord
}
