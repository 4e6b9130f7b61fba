use crate::error::{Error, Result};
use crate::field::FieldExpr;
use crate::source::ColumnStats;

/// The frozen spatial extent of the bin grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

/// Caller-supplied bounds; any field left None is resolved from source
/// statistics or by scanning.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundsSpec {
    pub xmin: Option<f64>,
    pub xmax: Option<f64>,
    pub ymin: Option<f64>,
    pub ymax: Option<f64>,
}

/// Resolves the bounding box in three stages: explicit values verbatim, then
/// precomputed column statistics, then a running min/max over scanned values
/// for whatever is still open.
#[derive(Debug)]
pub struct BoundsResolver {
    xmin: Option<f64>,
    xmax: Option<f64>,
    ymin: Option<f64>,
    ymax: Option<f64>,
    // bounds fixed by the caller or by stats never move during a scan
    scan_xmin: bool,
    scan_xmax: bool,
    scan_ymin: bool,
    scan_ymax: bool,
}

impl BoundsResolver {
    pub fn new(spec: &BoundsSpec) -> Self {
        Self {
            xmin: spec.xmin,
            xmax: spec.xmax,
            ymin: spec.ymin,
            ymax: spec.ymax,
            scan_xmin: spec.xmin.is_none(),
            scan_xmax: spec.xmax.is_none(),
            scan_ymin: spec.ymin.is_none(),
            scan_ymax: spec.ymax.is_none(),
        }
    }

    /// Fill still-open bounds from per-column statistics. Statistics are
    /// keyed by column name, so only plain column fields can use them; a
    /// ratio field always falls through to the scan.
    pub fn fill_from_stats(&mut self, stats: &ColumnStats, x: &FieldExpr, y: &FieldExpr) {
        if let FieldExpr::Column(col) = x {
            if self.xmin.is_none() {
                self.xmin = stats.min_of(col);
                self.scan_xmin = self.xmin.is_none();
            }
            if self.xmax.is_none() {
                self.xmax = stats.max_of(col);
                self.scan_xmax = self.xmax.is_none();
            }
        }
        if let FieldExpr::Column(col) = y {
            if self.ymin.is_none() {
                self.ymin = stats.min_of(col);
                self.scan_ymin = self.ymin.is_none();
            }
            if self.ymax.is_none() {
                self.ymax = stats.max_of(col);
                self.scan_ymax = self.ymax.is_none();
            }
        }
    }

    /// True once every bound has a value and no scan is required.
    pub fn is_resolved(&self) -> bool {
        self.xmin.is_some() && self.xmax.is_some() && self.ymin.is_some() && self.ymax.is_some()
    }

    /// Merge one scanned point into the open bounds. Non-finite coordinates
    /// carry no extent information and are skipped.
    pub fn observe(&mut self, x: f64, y: f64) {
        if x.is_finite() {
            if self.scan_xmin {
                self.xmin = Some(self.xmin.map_or(x, |m| m.min(x)));
            }
            if self.scan_xmax {
                self.xmax = Some(self.xmax.map_or(x, |m| m.max(x)));
            }
        }
        if y.is_finite() {
            if self.scan_ymin {
                self.ymin = Some(self.ymin.map_or(y, |m| m.min(y)));
            }
            if self.scan_ymax {
                self.ymax = Some(self.ymax.map_or(y, |m| m.max(y)));
            }
        }
    }

    /// Freeze the box. A box with zero or negative extent on either axis
    /// (including one never resolved at all) is a terminal error.
    pub fn finish(&self) -> Result<Bounds> {
        let xmin = self.xmin.unwrap_or(f64::NAN);
        let xmax = self.xmax.unwrap_or(f64::NAN);
        let ymin = self.ymin.unwrap_or(f64::NAN);
        let ymax = self.ymax.unwrap_or(f64::NAN);
        if !(xmax - xmin > 0.0) || !(ymax - ymin > 0.0) {
            return Err(Error::DegenerateBounds {
                xmin,
                xmax,
                ymin,
                ymax,
            });
        }
        Ok(Bounds {
            xmin,
            xmax,
            ymin,
            ymax,
        })
    }
}

/// Grid height from the box aspect ratio when the caller did not supply one.
pub fn derive_height(width: usize, bounds: &Bounds) -> usize {
    let ratio = (bounds.ymax - bounds.ymin) / (bounds.xmax - bounds.xmin);
    ((width as f64 * ratio).round() as usize).max(1)
}
