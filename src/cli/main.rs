use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

use sanimal_exif::exif::{self, EmbeddedInfo, MetadataCommitter};
use sanimal_exif::model::{Location, SpeciesEntry};
use sanimal_exif::{config, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "sanimal-exif",
    version,
    about = "Write species, location and capture-time tags into camera-trap images"
)]
struct Cli {
    /// Image files or directories to update
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Species seen in the image, as "Name, Scientific name, Count" (repeatable)
    #[arg(long, value_name = "ENTRY", conflicts_with = "clear_species")]
    species: Vec<SpeciesEntry>,

    /// Write an empty species list
    #[arg(long)]
    clear_species: bool,

    /// Location name; requires the other location options
    #[arg(long, value_name = "NAME", requires_all = ["lat", "lng", "elevation", "location_id"])]
    location_name: Option<String>,

    /// Latitude in decimal degrees
    #[arg(long, value_name = "DEG", allow_negative_numbers = true, requires = "location_name")]
    lat: Option<f64>,

    /// Longitude in decimal degrees
    #[arg(long, value_name = "DEG", allow_negative_numbers = true, requires = "location_name")]
    lng: Option<f64>,

    /// Elevation in meters
    #[arg(long, value_name = "METERS", allow_negative_numbers = true, requires = "location_name")]
    elevation: Option<f64>,

    /// Location identifier
    #[arg(long, value_name = "ID", requires = "location_name")]
    location_id: Option<String>,

    /// JSON file with a list of update jobs
    #[arg(short, long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Load and update metadata without writing to files
    #[arg(long)]
    dry_run: bool,

    /// Display the species, location and capture-time tags and exit
    #[arg(long)]
    show: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn species_update(&self) -> Option<Vec<SpeciesEntry>> {
        if self.clear_species {
            Some(Vec::new())
        } else if self.species.is_empty() {
            None
        } else {
            Some(self.species.clone())
        }
    }

    fn location_update(&self) -> Option<Location> {
        Some(Location {
            name: self.location_name.clone()?,
            id: self.location_id.clone()?,
            latitude: self.lat?,
            longitude: self.lng?,
            elevation: self.elevation?,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() && cli.manifest.is_none() {
        anyhow::bail!("No input files, directories or manifest specified. Use --help for usage.");
    }

    // Handle --show
    if cli.show {
        let images = pipeline::collect_images(&cli.paths);
        if images.is_empty() {
            anyhow::bail!("No supported image files found in the specified paths.");
        }
        return show_embedded(&images, cli.json);
    }

    // Load config
    let mut config = config::Config::load(cli.config.as_deref())?;

    // Override dry_run from CLI flag
    if cli.dry_run {
        config.output.dry_run = true;
    }

    // Build the job list: manifest first, then paths with the CLI values
    let mut jobs = match &cli.manifest {
        Some(manifest) => pipeline::load_manifest(manifest)?,
        None => Vec::new(),
    };

    if !cli.paths.is_empty() {
        let species = cli.species_update();
        let location = cli.location_update();
        if species.is_none() && location.is_none() {
            anyhow::bail!("Nothing to write. Pass --species, --clear-species or the location options.");
        }

        let images = pipeline::collect_images(&cli.paths);
        if images.is_empty() {
            anyhow::bail!("No supported image files found in the specified paths.");
        }
        jobs.extend(images.into_iter().map(|path| pipeline::UpdateJob {
            path,
            species: species.clone(),
            location: location.clone(),
        }));
    }

    log::info!("Found {} image(s) to update", jobs.len());
    if config.output.dry_run {
        log::info!("DRY RUN — no files will be modified");
    }

    let committer = MetadataCommitter::from_config(&config);
    let retry = committer.retry_policy();
    log::debug!(
        "Write retry: {} attempt(s), {:?} backoff",
        retry.max_attempts,
        retry.backoff
    );

    // Process each job; the first failure stops the run
    let mut results = Vec::new();
    let total = jobs.len();

    for (i, job) in jobs.iter().enumerate() {
        log::info!("[{}/{}] Updating: {}", i + 1, total, job.path.display());

        match pipeline::process_job(&committer, job, &config) {
            Ok(result) => {
                match result.outcome {
                    exif::CommitOutcome::Written { attempts } if attempts > 1 => {
                        log::info!("  Written after {attempts} attempts")
                    }
                    exif::CommitOutcome::Written { .. } => log::info!("  Written"),
                    exif::CommitOutcome::Unchanged if result.dry_run => {
                        log::info!("  Would write (dry run)")
                    }
                    exif::CommitOutcome::Unchanged => log::info!("  Nothing to write"),
                }
                if let Some(ref backup) = result.backup_path {
                    log::info!("  Backup: {}", backup.display());
                }
                results.push(result);
            }
            Err(err) => {
                eprintln!(
                    "Error writing metadata to the image {}!\n{err:?}",
                    file_name(&job.path)
                );
                std::process::exit(1);
            }
        }
    }

    // JSON output
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    let written = results.iter().filter(|r| r.outcome.is_written()).count();
    log::info!("Done: {written} of {total} image(s) written");

    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Print the embedded tags of each image, as a table or as JSON.
fn show_embedded(images: &[PathBuf], json: bool) -> Result<()> {
    let mut all = Vec::new();
    for path in images {
        let info = exif::read_embedded(path)?;
        if json {
            all.push(serde_json::json!({
                "path": path.display().to_string(),
                "tags": info,
            }));
        } else {
            print_embedded(path, &info);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&all)?);
    }
    Ok(())
}

fn print_embedded(path: &Path, info: &EmbeddedInfo) {
    println!();
    println!("  {BOLD}{}{RESET}", path.display());
    println!("  {DIM}{}{RESET}", "─".repeat(72));

    if info.is_empty() {
        println!("  {DIM}(no tags){RESET}");
    }

    if let Some(captured_at) = info.captured_at {
        print_row("DateTimeOriginal", &captured_at.format(exif::DATE_FORMAT_FOR_DISK).to_string());
    }
    for entry in &info.species {
        print_row("Species", &entry.to_string());
    }
    if let Some(ref location) = info.location {
        print_row("Location", &location.name);
        print_row("LocationId", &location.id);
        print_row("Elevation", &format!("{} m", location.elevation));
    }
    if let (Some(lat), Some(lon)) = (info.gps_latitude, info.gps_longitude) {
        print_row("GPSLatitude", &format!("{lat:.6}"));
        print_row("GPSLongitude", &format!("{lon:.6}"));
    }

    println!("  {DIM}{}{RESET}", "─".repeat(72));
}

fn print_row(tag: &str, value: &str) {
    println!("  {:<22} : {value}", tag);
}
