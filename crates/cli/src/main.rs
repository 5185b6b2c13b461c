//! GeoWatch CLI - multi-temporal satellite change analysis

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array3;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geowatch_algorithms::alerts::{
    group_related_alerts, Alert, AlertPrioritizer, GroupingParams, InMemoryContext,
};
use geowatch_algorithms::analysis::{AnalysisConfig, AnalysisEngine, AnalysisKind, AnalysisRequest};
use geowatch_algorithms::fusion::{Fusion, FusionConfig, FusionInput, Region};
use geowatch_algorithms::imagery::IndexSnapshot;
use geowatch_algorithms::statistics::BaselineTable;
use geowatch_algorithms::temporal::{parse_date, TemporalAnalyzer, TemporalRecord};
use geowatch_core::{Algorithm, AoiMetadata, GeoTransform, ReflectanceImage};
use geowatch_parallel::ProcessingMode;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geowatch")]
#[command(author, version, about = "Multi-temporal satellite change analysis", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write the JSON result here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Single-line JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Before/after analysis of one scene or a batch of scenes
    Analyze {
        /// Scene JSON: one object or an array of objects with `before`/`after`
        /// cubes (rows x cols x bands, Sentinel-2 band order)
        input: PathBuf,
        /// Analysis type: comprehensive, vegetation, water, coastal, construction, deforestation
        #[arg(short, long)]
        kind: Option<AnalysisKind>,
        /// Full analysis configuration as JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Force a calibration region by name
        #[arg(short, long)]
        region: Option<String>,
        /// Pixel size in metres
        #[arg(long)]
        resolution: Option<f64>,
        /// Confidence at which a detection is listed as high confidence
        #[arg(long)]
        threshold: Option<f64>,
        /// Batch processing: sequential, parallel or a thread count
        #[arg(short, long, default_value = "parallel")]
        mode: ProcessingMode,
    },
    /// Fuse the changes between two index snapshots
    Fusion {
        /// JSON with `current`, `previous` and optional `historical`, `aoi`
        input: PathBuf,
        /// Fusion configuration (thresholds, weights, risk levels) as JSON
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Calibration region by name
        #[arg(short, long, conflicts_with = "config")]
        region: Option<String>,
    },
    /// Trend, velocity, anomalies and seasonality of one index over time
    Temporal {
        /// JSON array of `{date, indices: {name: value}}` records
        input: PathBuf,
        /// Index to analyze
        #[arg(short, long, default_value = "ndvi")]
        index: String,
        /// Value whose crossing time is estimated
        #[arg(long)]
        critical: Option<f64>,
    },
    /// Calibration region and fusion configuration for a location
    Region {
        /// Latitude in degrees
        #[arg(long, allow_hyphen_values = true, required_unless_present = "name")]
        lat: Option<f64>,
        /// Longitude in degrees
        #[arg(long, allow_hyphen_values = true, required_unless_present = "name")]
        lon: Option<f64>,
        /// Region name instead of a location
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        name: Option<String>,
    },
    /// Score and rank alerts
    Prioritize {
        /// JSON array of alerts
        input: PathBuf,
        /// JSON array of AOI metadata
        #[arg(long)]
        aois: Option<PathBuf>,
        /// JSON array of past alerts
        #[arg(long)]
        history: Option<PathBuf>,
        /// Reference date for history windows (default: now)
        #[arg(long)]
        as_of: Option<String>,
        /// Keep only the top N alerts
        #[arg(short, long)]
        limit: Option<usize>,
        /// Also report groups of nearby, near-simultaneous alerts
        #[arg(short, long)]
        group: bool,
        /// Grouping distance in km
        #[arg(long, default_value = "2.0")]
        distance_km: f64,
        /// Grouping window in days
        #[arg(long, default_value = "7")]
        days: i64,
    },
}

// ─── Input documents ────────────────────────────────────────────────────

/// Reflectance cube as nested arrays; `null` cells are missing data
type NestedCube = Vec<Vec<Vec<Option<f64>>>>;

#[derive(Deserialize)]
struct SceneFile {
    before: NestedCube,
    after: NestedCube,
    #[serde(default)]
    transform: Option<GeoTransform>,
    #[serde(default)]
    aoi: Option<AoiMetadata>,
    #[serde(default)]
    historical: Vec<IndexSnapshot>,
    #[serde(default)]
    baseline: Option<BaselineTable>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SceneInput {
    One(SceneFile),
    Batch(Vec<SceneFile>),
}

#[derive(Serialize)]
struct PrioritizeOutput<A, G> {
    alerts: A,
    #[serde(skip_serializing_if = "Option::is_none")]
    groups: Option<G>,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let pb = spinner("Reading input...");
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))?;
    pb.finish_and_clear();
    Ok(value)
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>, compact: bool) -> Result<()> {
    let text = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("Failed to encode result")?;
    match output {
        Some(path) => {
            std::fs::write(path, text + "\n").with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Result saved to: {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn done(name: &str, elapsed: std::time::Duration) {
    info!("{} finished in {:.2?}", name, elapsed);
}

fn parse_region(name: &str) -> Result<Region> {
    match Region::from_name(&name.trim().to_ascii_lowercase()) {
        Some(region) => Ok(region),
        None => {
            let known: Vec<&str> = Region::ALL.iter().map(|r| r.name()).collect();
            bail!("Unknown region '{}'. Known regions: {}", name, known.join(", "))
        }
    }
}

fn cube(nested: NestedCube, label: &str) -> Result<Array3<f64>> {
    let rows = nested.len();
    let cols = nested.first().map_or(0, Vec::len);
    let bands = nested.first().and_then(|r| r.first()).map_or(0, Vec::len);
    if rows == 0 || cols == 0 || bands == 0 {
        bail!("{} image is empty", label);
    }

    let mut flat = Vec::with_capacity(rows * cols * bands);
    for (r, row) in nested.into_iter().enumerate() {
        if row.len() != cols {
            bail!("{} image row {} has {} columns, expected {}", label, r, row.len(), cols);
        }
        for (c, pixel) in row.into_iter().enumerate() {
            if pixel.len() != bands {
                bail!(
                    "{} image pixel ({}, {}) has {} bands, expected {}",
                    label,
                    r,
                    c,
                    pixel.len(),
                    bands
                );
            }
            flat.extend(pixel.into_iter().map(|v| v.unwrap_or(f64::NAN)));
        }
    }
    Array3::from_shape_vec((rows, cols, bands), flat).with_context(|| format!("Malformed {} image", label))
}

fn scene_request(scene: SceneFile) -> Result<AnalysisRequest> {
    let mut before = ReflectanceImage::sentinel2(cube(scene.before, "before")?);
    let mut after = ReflectanceImage::sentinel2(cube(scene.after, "after")?);
    if let Some(transform) = scene.transform {
        before = before.with_transform(transform);
        after = after.with_transform(transform);
    }

    let mut request = AnalysisRequest::new(before, after).with_historical(scene.historical);
    if let Some(aoi) = scene.aoi {
        request = request.with_aoi(aoi);
    }
    if let Some(baseline) = scene.baseline {
        request = request.with_baseline(baseline);
    }
    Ok(request)
}

// ─── Commands ───────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn run_analyze(
    input: &Path,
    kind: Option<AnalysisKind>,
    config: Option<&Path>,
    region: Option<&str>,
    resolution: Option<f64>,
    threshold: Option<f64>,
    mode: ProcessingMode,
    output: Option<&Path>,
    compact: bool,
) -> Result<()> {
    let mut config: AnalysisConfig = match config {
        Some(path) => read_json(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(kind) = kind {
        config.kind = kind;
    }
    if let Some(name) = region {
        config.region = Some(parse_region(name)?);
    }
    if let Some(resolution) = resolution {
        config.spatial_resolution_m = resolution;
    }
    if let Some(threshold) = threshold {
        config.confidence_threshold = threshold;
    }

    let engine = AnalysisEngine::new(config);
    let start = Instant::now();
    match read_json::<SceneInput>(input)? {
        SceneInput::One(scene) => {
            let request = scene_request(scene)?;
            let pb = spinner("Analyzing scene...");
            let results = engine.analyze(&request).context("Analysis failed")?;
            pb.finish_and_clear();
            done("Analysis", start.elapsed());
            write_json(&results, output, compact)
        }
        SceneInput::Batch(scenes) => {
            let requests = scenes
                .into_iter()
                .enumerate()
                .map(|(i, scene)| scene_request(scene).with_context(|| format!("Scene {}", i)))
                .collect::<Result<Vec<_>>>()?;
            info!("Analyzing {} scenes ({})", requests.len(), mode);
            let pb = spinner("Analyzing scenes...");
            let results = engine
                .analyze_batch(&requests, mode)
                .into_iter()
                .enumerate()
                .map(|(i, r)| r.with_context(|| format!("Analysis of scene {} failed", i)))
                .collect::<Result<Vec<_>>>()?;
            pb.finish_and_clear();
            done("Batch analysis", start.elapsed());
            write_json(&results, output, compact)
        }
    }
}

fn run_fusion(
    input: &Path,
    config: Option<&Path>,
    region: Option<&str>,
    output: Option<&Path>,
    compact: bool,
) -> Result<()> {
    let input: FusionInput = read_json(input)?;
    let config = match (config, region) {
        (Some(path), _) => read_json::<FusionConfig>(path)?,
        (None, Some(name)) => FusionConfig::new(parse_region(name)?),
        (None, None) => match input.aoi.as_ref().and_then(|a| a.center) {
            Some(center) => FusionConfig::for_point(&center),
            None => FusionConfig::default(),
        },
    };
    info!("Fusion region: {}", config.region);

    let start = Instant::now();
    let result = Fusion.execute(input, config).context("Fusion failed")?;
    done(Fusion.name(), start.elapsed());
    write_json(&result, output, compact)
}

fn run_temporal(
    input: &Path,
    index: &str,
    critical: Option<f64>,
    output: Option<&Path>,
    compact: bool,
) -> Result<()> {
    let records: Vec<TemporalRecord> = read_json(input)?;
    info!("Loaded {} records", records.len());
    let result = TemporalAnalyzer::new()
        .analyze_records(&records, index, critical)
        .with_context(|| format!("Temporal analysis of '{}' failed", index))?;
    write_json(&result, output, compact)
}

#[allow(clippy::too_many_arguments)]
fn run_prioritize(
    input: &Path,
    aois: Option<&Path>,
    history: Option<&Path>,
    as_of: Option<&str>,
    limit: Option<usize>,
    group: bool,
    params: GroupingParams,
    output: Option<&Path>,
    compact: bool,
) -> Result<()> {
    let alerts: Vec<Alert> = read_json(input)?;
    let as_of = match as_of {
        Some(raw) => parse_date(raw).with_context(|| format!("Invalid --as-of date '{}'", raw))?,
        None => chrono::Utc::now(),
    };

    let mut context = InMemoryContext::new(as_of);
    if let Some(path) = aois {
        for aoi in read_json::<Vec<AoiMetadata>>(path)? {
            context = context.with_aoi(aoi);
        }
    }
    if let Some(path) = history {
        context = context.with_history(read_json::<Vec<Alert>>(path)?);
    }

    let groups = group.then(|| group_related_alerts(&alerts, &context, params));
    let prioritizer = AlertPrioritizer::new(context);
    let ranked = prioritizer.prioritize_alerts(&alerts, limit);
    info!("Prioritized {} of {} alerts", ranked.len(), alerts.len());

    write_json(
        &PrioritizeOutput {
            alerts: ranked,
            groups,
        },
        output,
        compact,
    )
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let output = cli.output.as_deref();

    match cli.command {
        Commands::Analyze {
            input,
            kind,
            config,
            region,
            resolution,
            threshold,
            mode,
        } => run_analyze(
            &input,
            kind,
            config.as_deref(),
            region.as_deref(),
            resolution,
            threshold,
            mode,
            output,
            cli.compact,
        ),

        Commands::Fusion { input, config, region } => {
            run_fusion(&input, config.as_deref(), region.as_deref(), output, cli.compact)
        }

        Commands::Temporal { input, index, critical } => run_temporal(&input, &index, critical, output, cli.compact),

        Commands::Region { lat, lon, name } => {
            let config = match (name, lat, lon) {
                (Some(name), _, _) => FusionConfig::new(parse_region(&name)?),
                (None, Some(lat), Some(lon)) => FusionConfig::for_location(lat, lon),
                _ => bail!("Either --name or both --lat and --lon are required"),
            };
            write_json(&config, output, cli.compact)
        }

        Commands::Prioritize {
            input,
            aois,
            history,
            as_of,
            limit,
            group,
            distance_km,
            days,
        } => run_prioritize(
            &input,
            aois.as_deref(),
            history.as_deref(),
            as_of.as_deref(),
            limit,
            group,
            GroupingParams { distance_km, days },
            output,
            cli.compact,
        ),
    }
}
