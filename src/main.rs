use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use lane_alternates::config::EngineConfig;
use lane_alternates::directory::InMemoryDirectory;
use lane_alternates::engine::LaneEngine;
use lane_alternates::types::LaneInput;
use lane_alternates::verify::{Confidence, NominatimVerifier, VerificationCache, VerificationService};

/// Lane Alternates v0.3: exact-quota alternate city pairs for freight lanes
///
/// Expands every lane into its base pair plus K alternates drawn from nearby
/// freight markets, then posts each pair once per contact method.
///
/// Examples:
///   lanes --lanes lanes.json
///   lanes --lanes lanes.json --cities directory.json --radius 50
///   lanes --lanes lanes.json --contacts email,phone,sms
///   lanes --lanes lanes.json --verify
///   lanes --serve --port 8080
#[derive(Parser)]
#[command(name = "lanes", version, about, long_about = None)]
struct Cli {
    /// JSON array of lanes to process.
    #[arg(long)]
    lanes: Option<PathBuf>,

    /// JSON array of directory cities. Defaults to the built-in sample set.
    #[arg(long)]
    cities: Option<PathBuf>,

    /// Engine config file (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Search radius in miles (capped at 100).
    #[arg(long)]
    radius: Option<f64>,

    /// Comma-separated contact method labels, e.g. email,phone.
    #[arg(long, value_delimiter = ',')]
    contacts: Option<Vec<String>>,

    /// Verify base cities against the geocoder in the background.
    #[arg(long)]
    verify: bool,

    /// Start the HTTP API instead of processing a file.
    #[arg(long)]
    serve: bool,

    /// Bind address for --serve.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port for --serve.
    #[arg(long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // ── Configuration ───────────────────────────────────────────

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from(path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }),
        None => EngineConfig::default(),
    };
    if let Some(radius) = cli.radius {
        config.radius_miles = radius;
    }
    if let Some(contacts) = &cli.contacts {
        config.contact_methods = contacts.iter().map(|c| c.trim().to_string()).collect();
    }
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // ── Directory ───────────────────────────────────────────────

    let directory = match &cli.cities {
        Some(path) => InMemoryDirectory::load_from(path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }),
        None => InMemoryDirectory::builtin(),
    };

    let engine = LaneEngine::new(Arc::new(directory), config);

    if cli.serve {
        lane_alternates::server::start(engine, &cli.host, cli.port).await;
        return;
    }

    // ── Lanes ───────────────────────────────────────────────────

    let Some(lanes_path) = &cli.lanes else {
        eprintln!("Error: No lanes specified.");
        eprintln!();
        eprintln!("Usage:");
        eprintln!("  lanes --lanes lanes.json");
        eprintln!("  lanes --serve --port 8080");
        std::process::exit(1);
    };
    let inputs = read_lanes(lanes_path).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let result = engine.process_batch(inputs).await;

    // Verification runs beside output; it never gates the rows.
    let verification = cli.verify.then(|| {
        let config = engine.config();
        let cache = VerificationCache::load_from(config.verify_cache_path(), config.verify_cache_ttl_days);
        let verifier = NominatimVerifier::new(config.verify_timeout());
        let service = Arc::new(VerificationService::from_config(verifier, cache, config));
        service.annotate_in_background(result.base_cities())
    });

    for (lane_index, e) in result.errors() {
        eprintln!("  lane {}: {}", lane_index, e);
    }
    let r = &result.report;
    eprintln!(
        "  {} lanes ok, {} failed, {} aborted, {} rows, {} fallback pairs",
        r.lanes_ok, r.lanes_failed, r.lanes_aborted, r.total_rows, r.fallback_pairs
    );

    let rows: Vec<_> = result.rows().collect();
    match serde_json::to_string_pretty(&rows) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: cannot serialize rows: {}", e);
            std::process::exit(1);
        }
    }

    if let Some(handle) = verification {
        match handle.await {
            Ok(annotations) => {
                eprintln!("  verified {} base cities", annotations.len());
                for a in annotations.iter().filter(|a| a.confidence == Confidence::Low) {
                    match a.drift_miles {
                        Some(d) => eprintln!("  \u{26A0}\u{FE0F}  {}, {} is {:.1} mi from the geocoder", a.city, a.state, d),
                        None => eprintln!("  \u{26A0}\u{FE0F}  {}, {} not confirmed by the geocoder", a.city, a.state),
                    }
                }
            }
            Err(e) => eprintln!("  verification aborted: {}", e),
        }
    }

    if result.report.lanes_failed + result.report.lanes_aborted > 0 {
        std::process::exit(2);
    }
}

fn read_lanes(path: &Path) -> Result<Vec<LaneInput>, String> {
    let data = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&data).map_err(|e| format!("cannot parse {}: {}", path.display(), e))
}
