use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A species as known to the tagging application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    /// Common (display) name, e.g. "Mule Deer".
    pub name: String,
    /// Scientific name, e.g. "Odocoileus hemionus".
    pub scientific_name: String,
}

/// One species identified in an image, with the number of individuals seen.
///
/// The on-disk form is `"<name>, <scientific name>, <count>"`, one string per
/// entry. [`Display`](fmt::Display) and [`FromStr`] convert between the two.
///
/// # Example
///
/// ```rust
/// use sanimal_exif::model::SpeciesEntry;
///
/// let entry = SpeciesEntry::new("Deer", "Odocoileus", 2);
/// assert_eq!(entry.to_string(), "Deer, Odocoileus, 2");
///
/// let parsed: SpeciesEntry = "Fox, Vulpes, 1".parse().unwrap();
/// assert_eq!(parsed.count, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesEntry {
    pub species: Species,
    pub count: u32,
}

impl SpeciesEntry {
    pub fn new(name: impl Into<String>, scientific_name: impl Into<String>, count: u32) -> Self {
        Self {
            species: Species {
                name: name.into(),
                scientific_name: scientific_name.into(),
            },
            count,
        }
    }
}

impl fmt::Display for SpeciesEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}",
            self.species.name, self.species.scientific_name, self.count
        )
    }
}

/// Errors from parsing or validating model values.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("species entry must look like \"name, scientific name, count\", got {0:?}")]
    SpeciesFormat(String),
    #[error("invalid species count {0:?}")]
    SpeciesCount(String),
    #[error("latitude out of range: {0} (must be -90 to 90)")]
    Latitude(f64),
    #[error("longitude out of range: {0} (must be -180 to 180)")]
    Longitude(f64),
    #[error("elevation must be a finite number, got {0}")]
    Elevation(f64),
}

impl FromStr for SpeciesEntry {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The count is always the last component; a common name may itself
        // contain a comma, the scientific name never does.
        let (names, count) = s
            .rsplit_once(',')
            .ok_or_else(|| ModelError::SpeciesFormat(s.to_string()))?;
        let (name, scientific_name) = names
            .rsplit_once(',')
            .ok_or_else(|| ModelError::SpeciesFormat(s.to_string()))?;

        let count = count.trim();
        let count = count
            .parse::<u32>()
            .map_err(|_| ModelError::SpeciesCount(count.to_string()))?;

        let name = name.trim();
        let scientific_name = scientific_name.trim();
        if name.is_empty() || scientific_name.is_empty() {
            return Err(ModelError::SpeciesFormat(s.to_string()));
        }

        Ok(Self::new(name, scientific_name, count))
    }
}

/// A named camera location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    /// Location identifier. Manifests may carry it as a number or a string.
    #[serde(deserialize_with = "id_from_text_or_number")]
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in metres.
    pub elevation: f64,
}

impl Location {
    /// Elevation as written into the location field.
    ///
    /// Always carries a fractional part (`150.0`, `150.5`), which is what
    /// readers of already-tagged collections expect.
    pub fn elevation_text(&self) -> String {
        format!("{:?}", self.elevation)
    }

    /// Check that the coordinates can be encoded as GPS tags.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ModelError::Latitude(self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ModelError::Longitude(self.longitude));
        }
        if !self.elevation.is_finite() {
            return Err(ModelError::Elevation(self.elevation));
        }
        Ok(())
    }
}

fn id_from_text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Integer(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Integer(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site_a() -> Location {
        Location {
            name: "SiteA".into(),
            id: "7".into(),
            latitude: 10.0,
            longitude: -20.0,
            elevation: 150.5,
        }
    }

    // ── SpeciesEntry ────────────────────────────────────────────────

    #[test]
    fn species_entry_display() {
        let entry = SpeciesEntry::new("Deer", "Odocoileus", 2);
        assert_eq!(entry.to_string(), "Deer, Odocoileus, 2");
    }

    #[test]
    fn species_entry_parse_trims_whitespace() {
        let entry: SpeciesEntry = "  Fox ,Vulpes vulpes,  1 ".parse().unwrap();
        assert_eq!(entry, SpeciesEntry::new("Fox", "Vulpes vulpes", 1));
    }

    #[test]
    fn species_entry_parse_comma_in_common_name() {
        let entry: SpeciesEntry = "Squirrel, Rock, Otospermophilus variegatus, 3"
            .parse()
            .unwrap();
        assert_eq!(entry.species.name, "Squirrel, Rock");
        assert_eq!(entry.species.scientific_name, "Otospermophilus variegatus");
        assert_eq!(entry.count, 3);
    }

    #[test]
    fn species_entry_parse_rejects_missing_parts() {
        assert!(matches!(
            "Deer, 2".parse::<SpeciesEntry>(),
            Err(ModelError::SpeciesFormat(_))
        ));
        assert!(matches!(
            ", Odocoileus, 2".parse::<SpeciesEntry>(),
            Err(ModelError::SpeciesFormat(_))
        ));
    }

    #[test]
    fn species_entry_parse_rejects_bad_count() {
        assert_eq!(
            "Deer, Odocoileus, two".parse::<SpeciesEntry>(),
            Err(ModelError::SpeciesCount("two".into()))
        );
        assert!("Deer, Odocoileus, -1".parse::<SpeciesEntry>().is_err());
    }

    // ── Location ────────────────────────────────────────────────────

    #[test]
    fn elevation_text_keeps_fraction() {
        let mut loc = site_a();
        assert_eq!(loc.elevation_text(), "150.5");
        loc.elevation = 150.0;
        assert_eq!(loc.elevation_text(), "150.0");
        loc.elevation = -3.25;
        assert_eq!(loc.elevation_text(), "-3.25");
    }

    #[test]
    fn validate_ranges() {
        assert!(site_a().validate().is_ok());

        let mut loc = site_a();
        loc.latitude = 91.0;
        assert_eq!(loc.validate(), Err(ModelError::Latitude(91.0)));

        let mut loc = site_a();
        loc.longitude = -180.5;
        assert_eq!(loc.validate(), Err(ModelError::Longitude(-180.5)));

        let mut loc = site_a();
        loc.elevation = f64::NAN;
        assert!(matches!(loc.validate(), Err(ModelError::Elevation(_))));
    }

    #[test]
    fn location_id_accepts_number_or_text() {
        let json = r#"{"name":"SiteA","id":7,"latitude":10.0,"longitude":-20.0,"elevation":150.5}"#;
        let loc: Location = serde_json::from_str(json).unwrap();
        assert_eq!(loc, site_a());

        let json = r#"{"name":"SiteA","id":"7","latitude":10.0,"longitude":-20.0,"elevation":150.5}"#;
        let loc: Location = serde_json::from_str(json).unwrap();
        assert_eq!(loc.id, "7");
    }
}
