//! CLI entry point for the traffic sampler.
//!
//! Provides subcommands for generating a route queue from road graphs,
//! collecting travel times for each time window, and aggregating the raw
//! results into per-segment or per-route speed features.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use traffic_sampler::{
    aggregate::{EdgeIndex, MergedRecord, SpatialKey, aggregate, merge, utility::round_to},
    collect::{
        CollectSummary, CollectTarget, Collector, HttpBrowser, Pacer, open_checkpoint_store,
    },
    config::{DEFAULT_SETTINGS_PATH, Settings, parse_duration_arg},
    export::{GeoJsonExporter, VectorExporter, edge_features, route_features},
    fetch::{BasicClient, WithHeaders},
    geocode::{AreaLabeler, NominatimGeocoder},
    graph::{load_graph, load_graphs},
    output::{RunRecord, append_record, load_results, print_json, results_path, write_results},
    rng::SamplerRng,
    sampler::{
        NetworkSampler, PoiSampler, RoutePair, RouteQueue, RouteSampler, SamplingMode,
        load_points_of_interest,
    },
    store::JsonFileStore,
    window::find_window,
};

#[derive(Parser)]
#[command(name = "traffic_sampler")]
#[command(about = "Sample travel times between road-network points", long_about = None)]
struct Cli {
    /// Settings document
    #[arg(short, long, default_value = DEFAULT_SETTINGS_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the route queue from the configured areas' road graphs
    Generate {
        #[arg(short, long, value_enum, default_value = "road")]
        mode: SamplingMode,

        /// Graph documents to use instead of the configured areas' graphs
        #[arg(short, long)]
        graph: Vec<PathBuf>,

        /// Route queue document to write
        #[arg(short, long, default_value = "data/routes.json")]
        output: PathBuf,

        /// Seed for a reproducible queue (overrides settings)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Collect travel times for the queued routes, one time window at a time
    Collect {
        /// Route queue document
        #[arg(short, long, default_value = "data/routes.json")]
        routes: PathBuf,

        /// Time windows to collect; all configured windows when omitted
        #[arg(short, long)]
        period: Vec<String>,

        /// Wall-clock budget per time window, e.g. 30m, 2h, 90s
        #[arg(short, long, value_parser = parse_duration_arg)]
        duration: Option<Duration>,

        /// Departure date (YYYY-MM-DD); today in the study area when omitted
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Only collect the first N queued routes
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Aggregate raw results and export them as GeoJSON
    Aggregate {
        #[arg(short, long, value_enum, default_value = "road")]
        mode: SamplingMode,

        /// Graph documents to use instead of the configured areas' graphs
        #[arg(short, long)]
        graph: Vec<PathBuf>,

        /// Output file; defaults to a dated file in the output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the minimum observation duration in seconds
        #[arg(long)]
        min_duration: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/traffic_sampler.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("traffic_sampler.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    match cli.command {
        Commands::Generate {
            mode,
            graph,
            output,
            seed,
        } => {
            let seed = seed.or(settings.sampling.seed);
            let queue = generate(&settings, mode, graph, seed).await?;
            queue.save(&output)?;
        }
        Commands::Collect {
            routes,
            period,
            duration,
            date,
            limit,
        } => {
            let summaries = collect(&settings, &routes, period, duration, date, limit).await?;
            log_run_summary(&summaries)?;
        }
        Commands::Aggregate {
            mode,
            graph,
            output,
            min_duration,
        } => {
            aggregate_and_export(&settings, mode, graph, output, min_duration)?;
        }
    }

    Ok(())
}

/// Samples every area's graph and concatenates the pairs into one queue.
#[tracing::instrument(skip_all, fields(?mode, ?seed))]
async fn generate(
    settings: &Settings,
    mode: SamplingMode,
    graphs: Vec<PathBuf>,
    seed: Option<u64>,
) -> Result<RouteQueue> {
    let mut rng = match seed {
        Some(seed) => SamplerRng::new(seed),
        None => SamplerRng::from_entropy(),
    };

    let areas: Vec<(String, PathBuf)> = if graphs.is_empty() {
        settings.areas.keys().cloned().zip(settings.graph_paths()).collect()
    } else {
        graphs.into_iter().map(|p| (p.display().to_string(), p)).collect()
    };

    let destinations = match mode {
        SamplingMode::PointOfInterest => load_points_of_interest(&settings.poi.csv_path)?,
        SamplingMode::Network => Vec::new(),
    };

    let queue_sampler: Box<dyn RouteSampler> = match mode {
        SamplingMode::Network => Box::new(NetworkSampler::new(settings.network_constraints())),
        SamplingMode::PointOfInterest => {
            Box::new(PoiSampler::new(settings.poi_constraints(), destinations.clone()))
        }
    };

    let mut pairs: Vec<RoutePair> = Vec::new();
    let mut seen = HashSet::new();

    for (area_id, path) in &areas {
        let graph = load_graph(path)?;
        let sampler: Box<dyn RouteSampler> = match mode {
            SamplingMode::Network => Box::new(NetworkSampler::new(settings.network_constraints())),
            SamplingMode::PointOfInterest => {
                let in_area = destinations
                    .iter()
                    .filter(|d| {
                        settings
                            .areas
                            .get(area_id)
                            .is_none_or(|a| a.bounds.contains(d.location))
                    })
                    .cloned()
                    .collect();
                Box::new(PoiSampler::new(settings.poi_constraints(), in_area))
            }
        };

        let sampled = sampler.generate(&graph, &mut rng);
        let before = pairs.len();
        for pair in sampled.pairs {
            let key = match mode {
                SamplingMode::Network => pair.unordered_key(),
                SamplingMode::PointOfInterest => (pair.origin_node, pair.dest_node),
            };
            if seen.insert(key) {
                pairs.push(pair);
            }
        }
        info!(
            area = %area_id,
            routes = pairs.len() - before,
            no_path = sampled.no_path,
            skipped_destinations = sampled.skipped_destinations,
            "Generated routes for area"
        );
    }

    if mode == SamplingMode::PointOfInterest && !pairs.is_empty() {
        let client = WithHeaders::browser(BasicClient::new(), &settings.poi.language);
        let geocoder = NominatimGeocoder::new(client, &settings.poi.geocoder_url, &settings.poi.language);
        let cache: JsonFileStore<String> = JsonFileStore::open(&settings.poi.geocode_cache)?;
        let mut labeler = AreaLabeler::new(geocoder, cache);
        labeler.label_origins(&mut pairs).await?;
        info!(lookups = labeler.lookups, "Origin areas labelled");
    }

    if pairs.is_empty() {
        warn!("No routes generated; the queue will be empty");
    }
    Ok(RouteQueue::new(queue_sampler.as_ref(), pairs))
}

/// Runs each requested window as its own session and checkpoint. The
/// wall-clock budget applies to each window separately.
#[tracing::instrument(skip_all, fields(routes = %routes.display(), ?budget))]
async fn collect(
    settings: &Settings,
    routes: &Path,
    periods: Vec<String>,
    budget: Option<Duration>,
    date: Option<NaiveDate>,
    limit: Option<usize>,
) -> Result<Vec<CollectSummary>> {
    let queue = RouteQueue::load(routes)?;
    let mut pairs = queue.routes;
    if let Some(limit) = limit {
        pairs.truncate(limit);
    }
    info!(routes = pairs.len(), mode = ?queue.mode, "Route queue loaded");

    let offset = settings.utc_offset()?;
    let date = date.unwrap_or_else(|| Utc::now().with_timezone(&offset).date_naive());
    let periods = if periods.is_empty() {
        settings.period_names()
    } else {
        periods
    };

    let timeout = Duration::from_secs(settings.collect.navigation_timeout_secs);
    let client = WithHeaders::browser(BasicClient::with_timeout(timeout)?, &settings.locale);
    let browser = HttpBrowser::new(client);
    let pacer = Pacer::new(settings.pacing, SamplerRng::from_entropy());
    let mut collector = Collector::new(settings.collect.clone(), pacer);

    let stop = collector.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current route");
            stop.store(true, Ordering::SeqCst);
        }
    });

    let mut summaries = Vec::new();

    for period in &periods {
        if collector.is_stopped() {
            warn!(period = %period, "Stopped, skipping remaining periods");
            break;
        }

        let window = find_window(&settings.windows, period)?;
        let target = CollectTarget {
            period: period.clone(),
            departure: window.departure(date, offset)?,
        };
        let mut store = open_checkpoint_store(&settings.output.raw_dir, period)?;

        let outcome = collector
            .collect_window(&browser, &pairs, &target, budget, &mut store)
            .await?;

        write_results(&results_path(&settings.output.raw_dir, period), &outcome.results)?;
        append_record(&settings.output.runs_csv, &RunRecord::from(&outcome.summary))?;
        summaries.push(outcome.summary);
    }

    Ok(summaries)
}

fn log_run_summary(summaries: &[CollectSummary]) -> Result<()> {
    for s in summaries {
        info!(
            period = %s.period,
            attempted = s.attempted,
            succeeded = s.succeeded,
            failed = s.failed,
            skipped = s.skipped,
            not_reached = s.not_reached,
            stop_reason = ?s.stop_reason,
            "Period summary"
        );
    }
    let attempted: usize = summaries.iter().map(|s| s.attempted).sum();
    let succeeded: usize = summaries.iter().map(|s| s.succeeded).sum();
    info!(periods = summaries.len(), attempted, succeeded, "Collection run finished");
    print_json(&summaries)
}

#[tracing::instrument(skip_all, fields(?mode))]
fn aggregate_and_export(
    settings: &Settings,
    mode: SamplingMode,
    graphs: Vec<PathBuf>,
    output: Option<PathBuf>,
    min_duration: Option<f64>,
) -> Result<()> {
    let periods = settings.period_names();
    let records = load_results(&settings.output.raw_dir, &periods)?;
    if records.is_empty() {
        warn!(raw_dir = %settings.output.raw_dir.display(), "No observations found; nothing to export");
        return Ok(());
    }

    let mut thresholds = settings.aggregate.clone();
    if let Some(min_duration) = min_duration {
        thresholds.min_duration_s = min_duration;
    }

    let (merged, features) = match mode {
        SamplingMode::Network => {
            let paths = if graphs.is_empty() {
                settings.graph_paths()
            } else {
                graphs
            };
            let graph = load_graphs(&paths)?;
            let index = EdgeIndex::new(&graph);
            let agg = aggregate(&records, &thresholds, |r| index.spatial_key(&graph, &r.pair));
            let merged = merge(agg.samples);
            let features = edge_features(&merged, &graph, &periods);
            (merged, features)
        }
        SamplingMode::PointOfInterest => {
            let agg = aggregate(&records, &thresholds, |r| Some(SpatialKey::route(&r.pair)));
            let merged = merge(agg.samples);
            let features = route_features(&merged, &agg.representatives, &periods);
            (merged, features)
        }
    };

    if features.is_empty() {
        warn!("No records survived aggregation; nothing to export");
        return Ok(());
    }

    let path = output.unwrap_or_else(|| {
        let tag = match mode {
            SamplingMode::Network => "road",
            SamplingMode::PointOfInterest => "poi",
        };
        settings
            .output
            .output_dir
            .join(format!("traffic_{tag}_{}.geojson", Utc::now().format("%Y%m%d")))
    });
    GeoJsonExporter.export(&features, &settings.output.crs, &path)?;
    log_speed_summary(&merged, &periods);
    Ok(())
}

/// Per-window speed range over the exported records.
fn log_speed_summary(merged: &[MergedRecord], periods: &[String]) {
    let suspicious = merged.iter().filter(|m| m.suspicious).count();
    info!(records = merged.len(), suspicious, "Aggregation summary");
    for period in periods {
        let speeds: Vec<f64> = merged.iter().filter_map(|m| m.speed(period)).collect();
        if speeds.is_empty() {
            continue;
        }
        let avg = speeds.iter().sum::<f64>() / speeds.len() as f64;
        let min = speeds.iter().copied().fold(f64::INFINITY, f64::min);
        let max = speeds.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        info!(
            period = %period,
            records = speeds.len(),
            avg_kmh = round_to(avg, 1),
            min_kmh = min,
            max_kmh = max,
            "Speed summary"
        );
    }
}
