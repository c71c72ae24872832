//! Field access on a little_exif [`Metadata`] block: private ASCII tags,
//! the capture timestamp and GPS coordinates.

use little_exif::exif_tag::ExifTag;
use little_exif::ifd::ExifTagGroup;
use little_exif::metadata::Metadata;
use little_exif::rational::uR64;

const GPS_SECONDS_DENOMINATOR: u32 = 10_000;

/// Replace a private ASCII tag with `values`, stored NUL-separated.
///
/// An empty slice writes an empty string, which reads back as no values.
pub fn set_text<S: AsRef<str>>(metadata: &mut Metadata, group: ExifTagGroup, tag: u16, values: &[S]) {
    let joined = values
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\0");
    metadata.set_tag(ExifTag::UnknownSTRING(joined, tag, group));
}

/// The values of a private ASCII tag, or `None` if the tag is absent.
pub fn text_values(metadata: &Metadata, tag: u16) -> Option<Vec<String>> {
    metadata.into_iter().find_map(|t| match t {
        ExifTag::UnknownSTRING(s, hex, _) if *hex == tag => Some(split_text(s)),
        _ => None,
    })
}

fn split_text(raw: &str) -> Vec<String> {
    raw.split('\0')
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// The raw `DateTimeOriginal` text.
pub fn capture_time_text(metadata: &Metadata) -> Option<String> {
    match metadata
        .get_tag(&ExifTag::DateTimeOriginal(String::new()))
        .next()?
    {
        ExifTag::DateTimeOriginal(s) => Some(s.trim_end_matches('\0').to_string()),
        _ => None,
    }
}

/// Set the GPS latitude/longitude tags from signed decimal degrees.
pub fn set_gps_in_degrees(metadata: &mut Metadata, longitude: f64, latitude: f64) {
    let (lon_ref, lon) = to_gps_rationals(longitude, "E", "W");
    let (lat_ref, lat) = to_gps_rationals(latitude, "N", "S");

    metadata.set_tag(ExifTag::GPSLongitudeRef(lon_ref.to_string()));
    metadata.set_tag(ExifTag::GPSLongitude(to_ur64(lon)));
    metadata.set_tag(ExifTag::GPSLatitudeRef(lat_ref.to_string()));
    metadata.set_tag(ExifTag::GPSLatitude(to_ur64(lat)));
}

/// `(latitude, longitude)` in signed decimal degrees, if both are present.
pub fn gps_in_degrees(metadata: &Metadata) -> Option<(f64, f64)> {
    let reference = |template: ExifTag| -> Option<String> {
        match metadata.get_tag(&template).next()? {
            ExifTag::GPSLatitudeRef(s) | ExifTag::GPSLongitudeRef(s) => {
                Some(s.trim_end_matches('\0').to_string())
            }
            _ => None,
        }
    };
    let rationals = |template: ExifTag| -> Option<Vec<(u32, u32)>> {
        match metadata.get_tag(&template).next()? {
            ExifTag::GPSLatitude(r) | ExifTag::GPSLongitude(r) => {
                Some(r.iter().map(|v| (v.nominator, v.denominator)).collect())
            }
            _ => None,
        }
    };

    let lat_ref = reference(ExifTag::GPSLatitudeRef(String::new()))?;
    let lon_ref = reference(ExifTag::GPSLongitudeRef(String::new()))?;
    let lat = gps_rationals_to_degrees(&rationals(ExifTag::GPSLatitude(Vec::new()))?, &lat_ref)?;
    let lon = gps_rationals_to_degrees(&rationals(ExifTag::GPSLongitude(Vec::new()))?, &lon_ref)?;
    Some((lat, lon))
}

fn to_ur64(dms: [(u32, u32); 3]) -> Vec<uR64> {
    dms.iter()
        .map(|&(nominator, denominator)| uR64 { nominator, denominator })
        .collect()
}

/// Split signed decimal degrees into a reference letter and
/// degrees/minutes/seconds rationals.
fn to_gps_rationals(value: f64, positive: &'static str, negative: &'static str) -> (&'static str, [(u32, u32); 3]) {
    let reference = if value < 0.0 { negative } else { positive };
    let abs = value.abs();

    let mut degrees = abs.floor() as u32;
    let minutes_f = (abs - abs.floor()) * 60.0;
    let mut minutes = minutes_f.floor() as u32;
    let mut seconds =
        ((minutes_f - minutes_f.floor()) * 60.0 * GPS_SECONDS_DENOMINATOR as f64).round() as u32;

    // Rounding may carry into the next minute or degree.
    if seconds >= 60 * GPS_SECONDS_DENOMINATOR {
        seconds -= 60 * GPS_SECONDS_DENOMINATOR;
        minutes += 1;
    }
    if minutes >= 60 {
        minutes -= 60;
        degrees += 1;
    }

    (
        reference,
        [(degrees, 1), (minutes, 1), (seconds, GPS_SECONDS_DENOMINATOR)],
    )
}

/// Convert degrees/minutes/seconds rationals and a reference letter back to
/// signed decimal degrees.
pub fn gps_rationals_to_degrees(dms: &[(u32, u32)], reference: &str) -> Option<f64> {
    let component = |i: usize| -> Option<f64> {
        let (n, d) = *dms.get(i)?;
        (d != 0).then(|| n as f64 / d as f64)
    };
    let value = component(0)? + component(1)? / 60.0 + component(2)? / 3600.0;
    Some(match reference {
        "S" | "W" => -value,
        _ => value,
    })
}
