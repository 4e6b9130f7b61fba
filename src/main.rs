use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use densebin::bounds::BoundsSpec;
use densebin::category::CategorySpec;
use densebin::engine::{self, EngineConfig};
use densebin::field::FieldExpr;
use densebin::project;
use densebin::sink::FileSink;
use densebin::source::CsvSource;

#[derive(Parser, Debug)]
#[command(name = "densebin")]
#[command(about = "Compute per-category heatmap buffers from CSV data", long_about = None)]
struct Args {
    /// Input csv file
    infile: PathBuf,

    /// x column name, or a ratio of two columns written as "a/b"
    x: String,

    /// y column name, or a ratio of two columns written as "a/b"
    y: String,

    /// category column name
    category: String,

    /// Width of the binned image
    #[arg(long, default_value_t = 512)]
    width: usize,

    /// Height of the binned image (derived from the bounds aspect ratio when omitted)
    #[arg(long)]
    height: Option<usize>,

    /// xmin of bbox
    #[arg(long)]
    xmin: Option<f64>,

    /// ymin of bbox
    #[arg(long)]
    ymin: Option<f64>,

    /// xmax of bbox
    #[arg(long)]
    xmax: Option<f64>,

    /// ymax of bbox
    #[arg(long)]
    ymax: Option<f64>,

    /// Geographic projection applied to these coordinates (e.g. "epsg:3857")
    #[arg(long)]
    projection: Option<String>,

    /// Force literal category names instead of numeric levels
    #[arg(long)]
    catnames: bool,

    /// Comma separated list of categories to keep (others are discarded)
    #[arg(long)]
    catfilter: Option<String>,

    /// How many categories to produce from a numeric category column
    #[arg(long)]
    catvalnum: Option<u32>,

    /// Min of values kept before turning them into categories
    #[arg(long)]
    catvalmin: Option<f64>,

    /// Max of values kept before turning them into categories
    #[arg(long)]
    catvalmax: Option<f64>,

    /// Process the file in chunks of this many rows instead of all at once
    #[arg(long)]
    chunk_size: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let source = CsvSource::open(&args.infile, args.chunk_size)
        .with_context(|| format!("Failed to open {}", args.infile.display()))?;

    let projection = match &args.projection {
        Some(name) => Some(project::by_name(name)?),
        None => None,
    };

    let config = EngineConfig {
        x: FieldExpr::parse(&args.x),
        y: FieldExpr::parse(&args.y),
        category: args.category.clone(),
        width: args.width,
        height: args.height,
        bounds: BoundsSpec {
            xmin: args.xmin,
            xmax: args.xmax,
            ymin: args.ymin,
            ymax: args.ymax,
        },
        categories: CategorySpec {
            filter: args
                .catfilter
                .as_ref()
                .map(|f| f.split(',').map(|s| s.to_string()).collect()),
            val_min: args.catvalmin,
            val_max: args.catvalmax,
            val_buckets: args.catvalnum,
            force_names: args.catnames,
        },
        projection,
        // the whole-file path reports percentages, the chunked path raw counts
        normalize: args.chunk_size.is_none(),
    };

    let mut sink = FileSink::new();
    let descriptor = engine::run(&source, &mut sink, &config)
        .context("Failed to compute data buffers")?;

    println!(
        "{} buffers, {} rows",
        descriptor.buffers.len(),
        descriptor.source.rows
    );
    Ok(())
}
