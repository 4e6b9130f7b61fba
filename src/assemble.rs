use crate::accumulate::Histogram;
use crate::bounds::Bounds;
use crate::category::CatKey;
use crate::descriptor::{
    AxisEncoding, AxisScale, BinSpec, BufferEntry, CategoryEncoding, CategoryScale, Descriptor,
    Encoding, ProjectionMeta, SourceMeta,
};
use crate::error::Result;
use crate::project::Projection;
use crate::sink::ArtifactSink;

/// Everything the assembler needs besides the histograms themselves.
pub struct AssembleContext<'a> {
    /// Stem used to name artifacts: `<root>_cat_<key>.json`, `<root>_data.json`.
    pub root: &'a str,
    pub source_name: &'a str,
    pub source_format: &'a str,
    pub x_field: &'a str,
    pub y_field: &'a str,
    pub cat_field: &'a str,
    pub bounds: Bounds,
    pub width: usize,
    pub height: usize,
    pub projection: Option<&'a dyn Projection>,
    /// Scale each matrix so its entries sum to 100.
    pub normalize: bool,
}

/// Post-process each finished histogram in category order, emit its matrix
/// through the sink, and build the final descriptor.
pub fn assemble(
    totals: Vec<(CatKey, Histogram, u64)>,
    ctx: &AssembleContext,
    sink: &mut dyn ArtifactSink,
) -> Result<Descriptor> {
    let mut buffers = Vec::with_capacity(totals.len());
    let mut domain = Vec::with_capacity(totals.len());
    let mut total_rows = 0u64;

    for (key, histogram, rows) in &totals {
        let mut matrix = orient(histogram);
        if ctx.normalize {
            normalize_to_percent(&mut matrix);
        }
        let (lo, hi) = value_range(&matrix);

        let name = format!("{}_cat_{}.json", ctx.root, key);
        let url = sink.write_matrix(&name, &matrix)?;
        buffers.push(BufferEntry {
            url,
            count: *rows,
            value: key.clone(),
            range: [lo as i64, hi as i64],
        });
        domain.push(key.clone());
        total_rows += rows;
    }

    // reported domains are geographic when a projection is active
    let (xmin, ymin, xmax, ymax, x_kind, y_kind) = match ctx.projection {
        Some(proj) => {
            let (xmin, ymin) = proj.inverse(ctx.bounds.xmin, ctx.bounds.ymin);
            let (xmax, ymax) = proj.inverse(ctx.bounds.xmax, ctx.bounds.ymax);
            (xmin, ymin, xmax, ymax, "latitude", "longitude")
        }
        None => (
            ctx.bounds.xmin,
            ctx.bounds.ymin,
            ctx.bounds.xmax,
            ctx.bounds.ymax,
            "quantitative",
            "quantitative",
        ),
    };

    let descriptor = Descriptor {
        source: SourceMeta {
            filename: ctx.source_name.to_string(),
            kind: ctx.source_format.to_string(),
            rows: total_rows,
        },
        projection: ctx.projection.map(|p| ProjectionMeta {
            kind: p.name().to_string(),
        }),
        encoding: Encoding {
            x: AxisEncoding {
                field: ctx.x_field.to_string(),
                kind: x_kind.to_string(),
                bin: BinSpec {
                    maxbins: ctx.width,
                },
                aggregate: "count".to_string(),
                scale: AxisScale {
                    domain: [xmin, xmax],
                    range: [0, ctx.width],
                },
            },
            y: AxisEncoding {
                field: ctx.y_field.to_string(),
                kind: y_kind.to_string(),
                bin: BinSpec {
                    maxbins: ctx.height,
                },
                aggregate: "count".to_string(),
                scale: AxisScale {
                    // max-first, so screen row 0 maps to the top of the box
                    domain: [ymax, ymin],
                    range: [0, ctx.height],
                },
            },
            z: CategoryEncoding {
                field: ctx.cat_field.to_string(),
                kind: "nominal".to_string(),
                scale: CategoryScale { domain },
            },
        },
        buffers,
    };

    sink.write_descriptor(&format!("{}_data.json", ctx.root), &descriptor)?;
    Ok(descriptor)
}

/// Reorient for output: transpose (the histogram is computed x-major), then
/// flip vertically so row 0 holds the maximum-y edge, the image convention.
pub fn orient(histogram: &Histogram) -> Vec<Vec<f64>> {
    let (w, h) = (histogram.width(), histogram.height());
    (0..h)
        .map(|r| (0..w).map(|c| histogram.get(c, h - 1 - r)).collect())
        .collect()
}

/// Scale entries so the matrix sums to 100. An all-zero matrix stays zero.
pub fn normalize_to_percent(matrix: &mut [Vec<f64>]) {
    let sum: f64 = matrix.iter().flatten().sum();
    if sum > 0.0 {
        for cell in matrix.iter_mut().flatten() {
            *cell = *cell / sum * 100.0;
        }
    }
}

/// Minimum and maximum cell values of the oriented matrix.
pub fn value_range(matrix: &[Vec<f64>]) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &cell in matrix.iter().flatten() {
        lo = lo.min(cell);
        hi = hi.max(cell);
    }
    if lo > hi {
        (0.0, 0.0)
    } else {
        (lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::WebMercator;
    use crate::sink::MemorySink;

    fn make_ctx<'a>(normalize: bool, projection: Option<&'a dyn Projection>) -> AssembleContext<'a> {
        AssembleContext {
            root: "out",
            source_name: "out.csv",
            source_format: "csv",
            x_field: "x",
            y_field: "y",
            cat_field: "cat",
            bounds: Bounds {
                xmin: 0.0,
                xmax: 10.0,
                ymin: 0.0,
                ymax: 10.0,
            },
            width: 2,
            height: 2,
            projection,
            normalize,
        }
    }

    #[test]
    fn test_orient_transposes_and_flips() {
        let mut h = Histogram::new(3, 2);
        h.incr(0, 0); // min x, min y: bottom-left of the image
        h.incr(2, 1); // max x, max y: top-right
        let m = orient(&h);
        assert_eq!(m.len(), 2); // height rows
        assert_eq!(m[0].len(), 3); // width columns
        assert_eq!(m[1][0], 1.0);
        assert_eq!(m[0][2], 1.0);
        assert_eq!(m[0][0], 0.0);
    }

    #[test]
    fn test_normalize_sums_to_hundred() {
        let mut m = vec![vec![1.0, 1.0], vec![2.0, 0.0]];
        normalize_to_percent(&mut m);
        let sum: f64 = m.iter().flatten().sum();
        assert!((sum - 100.0).abs() < 1e-9);
        assert_eq!(m[1][0], 50.0);
    }

    #[test]
    fn test_normalize_empty_matrix_stays_zero() {
        let mut m = vec![vec![0.0, 0.0]];
        normalize_to_percent(&mut m);
        assert_eq!(m, vec![vec![0.0, 0.0]]);
    }

    #[test]
    fn test_assemble_buffers_and_rows() {
        let mut a = Histogram::new(2, 2);
        a.incr(0, 0);
        a.incr(1, 1);
        a.incr(1, 1);
        let mut b = Histogram::new(2, 2);
        b.incr(0, 1);
        let totals = vec![
            (CatKey::Name("A".to_string()), a, 3),
            (CatKey::Name("B".to_string()), b, 2),
        ];

        let mut sink = MemorySink::new();
        let descriptor = assemble(totals, &make_ctx(false, None), &mut sink).unwrap();

        assert_eq!(descriptor.buffers.len(), 2);
        assert_eq!(descriptor.source.rows, 5);
        assert_eq!(descriptor.buffers[0].count + descriptor.buffers[1].count, 5);
        assert_eq!(descriptor.buffers[0].url, "out_cat_A.json");
        assert_eq!(descriptor.buffers[0].range, [0, 2]);
        assert_eq!(
            descriptor.encoding.z.scale.domain,
            vec![CatKey::Name("A".to_string()), CatKey::Name("B".to_string())]
        );
        // y domain is max-first
        assert_eq!(descriptor.encoding.y.scale.domain, [10.0, 0.0]);
        assert_eq!(descriptor.encoding.x.scale.domain, [0.0, 10.0]);
        assert_eq!(sink.matrices.len(), 2);
        assert_eq!(sink.matrix("out_cat_B.json").unwrap()[0][0], 1.0);
    }

    #[test]
    fn test_assemble_normalized_range() {
        let mut h = Histogram::new(2, 2);
        for _ in 0..4 {
            h.incr(0, 0);
        }
        let totals = vec![(CatKey::Name("A".to_string()), h, 4)];
        let mut sink = MemorySink::new();
        let descriptor = assemble(totals, &make_ctx(true, None), &mut sink).unwrap();
        // all mass in one cell: normalized matrix is 100 there, 0 elsewhere
        assert_eq!(descriptor.buffers[0].range, [0, 100]);
        let m = sink.matrix("out_cat_A.json").unwrap();
        let sum: f64 = m.iter().flatten().sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_assemble_projected_domains() {
        let totals = vec![(CatKey::Name("A".to_string()), Histogram::new(2, 2), 0)];
        let mut sink = MemorySink::new();
        let mercator = WebMercator;
        let descriptor = assemble(totals, &make_ctx(false, Some(&mercator)), &mut sink).unwrap();

        assert_eq!(descriptor.projection.as_ref().unwrap().kind, "epsg:3857");
        assert_eq!(descriptor.encoding.x.kind, "latitude");
        assert_eq!(descriptor.encoding.y.kind, "longitude");
        let (lon_max, _) = mercator.inverse(10.0, 10.0);
        assert!((descriptor.encoding.x.scale.domain[1] - lon_max).abs() < 1e-12);
    }
}
