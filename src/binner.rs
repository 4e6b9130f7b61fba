use std::collections::BTreeMap;

use crate::accumulate::Histogram;
use crate::bounds::Bounds;
use crate::category::{CatKey, Categorizer};
use crate::error::Result;
use crate::field::{find_col_index, FieldExpr};
use crate::grid::{bin_index, linspace_edges, EdgeReconciler, EdgeSet};
use crate::source::Batch;

/// Bin one batch: one histogram per category value present, counting (x, y)
/// pairs over a uniform grid covering `bounds`. Points outside the box are
/// excluded from the histogram but still counted toward their category's row
/// count, which tracks rows surviving the category filters.
///
/// The edge arrays are recomputed here for every category and offered to the
/// reconciler, reproducing the accumulation-step consistency check rather
/// than computing edges once and trusting them forever.
#[allow(clippy::too_many_arguments)]
pub fn bin_batch(
    batch: &Batch,
    x_expr: &FieldExpr,
    y_expr: &FieldExpr,
    category: &str,
    bounds: &Bounds,
    width: usize,
    height: usize,
    categorizer: &Categorizer,
    reconciler: &mut EdgeReconciler,
) -> Result<Vec<(CatKey, Histogram, u64)>> {
    let x_plan = x_expr.resolve(&batch.headers)?;
    let y_plan = y_expr.resolve(&batch.headers)?;
    let cat_idx = find_col_index(&batch.headers, category)?;

    // group surviving rows by category identity
    let mut groups: BTreeMap<CatKey, Vec<usize>> = BTreeMap::new();
    for (i, row) in batch.rows.iter().enumerate() {
        if let Some(key) = categorizer.key_for(&row[cat_idx]) {
            groups.entry(key).or_default().push(i);
        }
    }

    let mut out = Vec::with_capacity(groups.len());
    for (key, indices) in groups {
        let edges = EdgeSet {
            x: linspace_edges(bounds.xmin, bounds.xmax, width),
            y: linspace_edges(bounds.ymin, bounds.ymax, height),
        };
        reconciler.offer(edges.clone());

        let mut histogram = Histogram::new(width, height);
        for &i in &indices {
            let row = &batch.rows[i];
            let x = x_plan.eval(row, x_expr, i)?;
            let y = y_plan.eval(row, y_expr, i)?;
            if let (Some(ix), Some(iy)) = (bin_index(&edges.x, x), bin_index(&edges.y, y)) {
                histogram.incr(ix, iy);
            }
        }
        let rows = indices.len() as u64;
        out.push((key, histogram, rows));
    }
    Ok(out)
}
