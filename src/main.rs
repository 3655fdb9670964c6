// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use std::{collections::BTreeMap, fs, path::PathBuf, time::Instant};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use unesco_hdx::{
    catalog::CountryTable,
    config::{load_extra_params, Config},
    fetch::{get_countries, get_endpoints_metadata, HttpDownloader},
    pipeline::{write_manifest, Pipeline, PipelineSettings},
};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Chunk, download and reshape UNESCO SDMX indicators into HDX datasets"
)]
struct Args {
    #[arg(short, long, default_value = "config/project_configuration.yml")]
    config: PathBuf,
    /// YAML map of query parameters added to every request (locale, subscription-key)
    #[arg(long)]
    extra_params: Option<PathBuf>,
    #[arg(short, long, default_value = "./output")]
    output_dir: PathBuf,
    /// One dataset per country instead of one per country and endpoint
    #[arg(long)]
    single_dataset: bool,
    /// Only process these area codes (repeatable)
    #[arg(long = "country")]
    countries: Vec<String>,
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    let args = Args::parse();

    // ─── 2) configuration ────────────────────────────────────────────
    let mut config = Config::load(&args.config)?;
    if args.single_dataset {
        config.single_dataset = true;
    }
    let extra_params = match &args.extra_params {
        Some(path) => load_extra_params(path)?,
        None => BTreeMap::new(),
    };
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let downloader = HttpDownloader::new(extra_params, &config.user_agent)?;
    let policy = config.retry_policy();
    let locations = CountryTable::new(&config.countries);

    // ─── 3) endpoint structures & area list ──────────────────────────
    let endpoints =
        get_endpoints_metadata(&config.base_url, &downloader, &config.endpoints, &policy)?;
    info!("{} endpoints with structure", endpoints.len());

    let mut countries = get_countries(&config.base_url, &downloader, &policy)?;
    if !args.countries.is_empty() {
        countries.retain(|c| args.countries.iter().any(|id| id.eq_ignore_ascii_case(&c.id)));
    }
    info!("{} areas to process", countries.len());

    // ─── 4) datasets per country ─────────────────────────────────────
    let pipeline = Pipeline::new(
        &downloader,
        &locations,
        &endpoints,
        &args.output_dir,
        PipelineSettings::from_config(&config),
    );

    let started = Instant::now();
    let mut written = 0usize;
    for country in &countries {
        for (dataset, showcase) in pipeline.generate_datasets(country) {
            match write_manifest(&args.output_dir, &dataset, &showcase) {
                Ok(path) => {
                    written += 1;
                    info!(
                        path = %path.display(),
                        resources = dataset.resources.len(),
                        "dataset ready"
                    );
                }
                Err(e) => error!(dataset = %dataset.name, error = %e, "writing manifest failed"),
            }
        }
    }

    info!(
        datasets = written,
        elapsed = ?started.elapsed(),
        "done"
    );
    Ok(())
}
