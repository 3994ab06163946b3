//! Country population extractor.
//!
//! Builds (or loads) the tile index, the coordinate index and the cropped
//! population mosaic of one country and prints a summary.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gpw_grid::{CountryExtractor, ExtractorConfig, Mosaic};

#[derive(Parser, Debug)]
#[command(name = "gpw-extractor")]
#[command(about = "Per-country extraction of gridded population tiles")]
struct Args {
    /// Country identifier to extract
    #[arg(short = 'c', long, required_unless_present = "tile_index_only")]
    country: Option<i32>,

    /// Configuration file path (YAML); environment variables are used otherwise
    #[arg(long, env = "GPW_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the raw tile folders
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory receiving the persisted artifacts
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Decimals kept in the mosaic
    #[arg(long)]
    rounding_digits: Option<u32>,

    /// Scan tiles concurrently
    #[arg(long)]
    parallel: bool,

    /// Only build or load the tile index
    #[arg(long, conflicts_with = "lookup")]
    tile_index_only: bool,

    /// Print the tiles containing the country and exit
    #[arg(long)]
    lookup: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    let config = load_config(&args)?;
    info!(
        data_dir = %config.data_dir.display(),
        output_dir = %config.output_dir.display(),
        parallel = config.parallel_tiles,
        "Loaded configuration"
    );

    let extractor = CountryExtractor::from_config(config).context("invalid configuration")?;

    if args.tile_index_only {
        let index = extractor.tile_index().context("failed to build tile index")?;
        println!("tile index: {} countries", index.len());
        return Ok(());
    }

    let country = args
        .country
        .context("--country is required unless --tile-index-only is given")?;

    if args.lookup {
        let tiles = extractor
            .lookup(country)
            .with_context(|| format!("lookup of country {} failed", country))?;
        let tiles: Vec<String> = tiles.iter().map(|t| t.to_string()).collect();
        println!("country {}: tiles {}", country, tiles.join(","));
        return Ok(());
    }

    let mosaic = extractor
        .mosaic(country)
        .with_context(|| format!("extraction of country {} failed", country))?;
    print_summary(country, &mosaic);

    Ok(())
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// YAML file or environment, then command line overrides.
fn load_config(args: &Args) -> Result<ExtractorConfig> {
    let mut config = match &args.config {
        Some(path) => ExtractorConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ExtractorConfig::from_env(),
    };

    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
        config.output_dir = dir.join("output");
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(digits) = args.rounding_digits {
        config.rounding_digits = digits;
    }
    if args.parallel {
        config.parallel_tiles = true;
    }

    Ok(config)
}

fn print_summary(country: i32, mosaic: &Mosaic) {
    let geo = mosaic.geo();
    println!("country {}", country);
    println!("  size        {} x {} cells", mosaic.ncols(), mosaic.nrows());
    println!("  lower left  {}, {}", geo.llcrnrlon, geo.llcrnrlat);
    println!("  cell size   {}", geo.cellsize);
    println!("  cells       {}", mosaic.in_country_cells());
    println!("  population  {:.0}", mosaic.total_population());
}
