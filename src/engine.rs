use std::collections::BTreeSet;
use std::path::Path;

use log::{debug, info, warn};

use crate::accumulate::Accumulator;
use crate::assemble::{assemble, AssembleContext};
use crate::binner::bin_batch;
use crate::bounds::{derive_height, BoundsResolver, BoundsSpec};
use crate::category::{Categorizer, CategorySpec};
use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::field::{find_col_index, FieldExpr};
use crate::grid::EdgeReconciler;
use crate::project::Projection;
use crate::sink::ArtifactSink;
use crate::source::DataSource;

/// One full run's configuration.
pub struct EngineConfig {
    pub x: FieldExpr,
    pub y: FieldExpr,
    pub category: String,
    pub width: usize,
    pub height: Option<usize>,
    pub bounds: BoundsSpec,
    pub categories: CategorySpec,
    pub projection: Option<Box<dyn Projection>>,
    /// Scale each matrix to sum to 100. On for the eager whole-file path,
    /// off for the chunked path.
    pub normalize: bool,
}

/// Run the engine over `source`, writing every artifact through `sink` and
/// returning the descriptor. Batches are processed strictly in sequence; the
/// run either completes or fails with nothing written, since artifacts are
/// only emitted after accumulation has finished.
pub fn run(
    source: &dyn DataSource,
    sink: &mut dyn ArtifactSink,
    config: &EngineConfig,
) -> Result<Descriptor> {
    // the requested columns must exist in the source schema before any work
    let mut columns: Vec<String> = Vec::new();
    for col in config
        .x
        .columns()
        .into_iter()
        .chain(config.y.columns())
        .chain([config.category.as_str()])
    {
        find_col_index(source.headers(), col)?;
        if !columns.iter().any(|c| c == col) {
            columns.push(col.to_string());
        }
    }

    let mut resolver = BoundsResolver::new(&config.bounds);
    if !resolver.is_resolved() {
        if let Some(stats) = source.stats() {
            resolver.fill_from_stats(stats, &config.x, &config.y);
        }
    }

    let need_bounds_scan = !resolver.is_resolved();
    let need_cat_range = config.categories.needs_value_range();
    let need_distinct =
        config.categories.val_buckets.is_none() && !config.categories.force_names;

    let mut cat_range: Option<(f64, f64)> = None;
    let mut distinct: BTreeSet<String> = BTreeSet::new();

    if need_bounds_scan || need_cat_range || need_distinct {
        if need_bounds_scan {
            if source.stats().is_some() {
                warn!("incomplete bounds statistics, resolving by scan");
            } else {
                info!("no bounds statistics, resolving by scan");
            }
        }
        scan_for_resolution(
            source,
            &columns,
            config,
            &mut resolver,
            need_bounds_scan,
            need_cat_range.then_some(&mut cat_range),
            need_distinct.then_some(&mut distinct),
        )?;
    }

    let bounds = resolver.finish()?;
    let height = config
        .height
        .unwrap_or_else(|| derive_height(config.width, &bounds));
    info!(
        "range: [[{}, {}], [{}, {}]], bins: ({}, {})",
        bounds.xmin, bounds.xmax, bounds.ymin, bounds.ymax, config.width, height
    );

    let distinct_vec: Vec<String> = distinct.into_iter().collect();
    let categorizer = Categorizer::resolve(&config.categories, &distinct_vec, cat_range);

    let mut accumulator = Accumulator::new(config.width, height);
    accumulator.seed(categorizer.seed_keys());
    let mut reconciler = EdgeReconciler::new();

    for batch in source.scan(&columns)? {
        let batch = batch?;
        debug!("binning batch of {} rows", batch.rows.len());
        let binned = bin_batch(
            &batch,
            &config.x,
            &config.y,
            &config.category,
            &bounds,
            config.width,
            height,
            &categorizer,
            &mut reconciler,
        )?;
        for (key, histogram, rows) in binned {
            accumulator.merge(key, &histogram, rows);
        }
    }

    let root = artifact_root(source.name());
    let x_field = config.x.name();
    let y_field = config.y.name();
    let ctx = AssembleContext {
        root: &root,
        source_name: source.name(),
        source_format: source.format(),
        x_field: &x_field,
        y_field: &y_field,
        cat_field: &config.category,
        bounds,
        width: config.width,
        height,
        projection: config.projection.as_deref(),
        normalize: config.normalize,
    };
    assemble(accumulator.finish(), &ctx, sink)
}

/// One tolerant pass over the data gathering whatever the run still needs:
/// open bounds, the category column's global value range, and the distinct
/// category values. Batches missing a relevant column are skipped; only rows
/// surviving the category filters contribute.
fn scan_for_resolution(
    source: &dyn DataSource,
    columns: &[String],
    config: &EngineConfig,
    resolver: &mut BoundsResolver,
    observe_bounds: bool,
    mut cat_range: Option<&mut Option<(f64, f64)>>,
    mut distinct: Option<&mut BTreeSet<String>>,
) -> Result<()> {
    for batch in source.scan(columns)? {
        let batch = batch?;
        let (x_plan, y_plan, cat_idx) = match (
            config.x.resolve(&batch.headers),
            config.y.resolve(&batch.headers),
            find_col_index(&batch.headers, &config.category),
        ) {
            (Ok(x), Ok(y), Ok(c)) => (x, y, c),
            _ => {
                debug!("skipping batch without the requested columns");
                continue;
            }
        };

        for (i, row) in batch.rows.iter().enumerate() {
            let raw = &row[cat_idx];
            if !config.categories.accepts(raw) {
                continue;
            }
            if observe_bounds {
                let x = x_plan.eval(row, &config.x, i)?;
                let y = y_plan.eval(row, &config.y, i)?;
                resolver.observe(x, y);
            }
            if let Some(range) = cat_range.as_deref_mut() {
                if let Ok(v) = raw.parse::<f64>() {
                    *range = match *range {
                        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                        None => Some((v, v)),
                    };
                }
            }
            if let Some(set) = distinct.as_deref_mut() {
                if !set.contains(raw) {
                    set.insert(raw.clone());
                }
            }
        }
    }
    Ok(())
}

/// Artifact name stem: the source name with its extension dropped.
fn artifact_root(name: &str) -> String {
    Path::new(name).with_extension("").to_string_lossy().into_owned()
}
