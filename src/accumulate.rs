use std::collections::BTreeMap;

use crate::category::CatKey;

/// A width x height matrix of occurrence counts, stored x-major: the first
/// axis is x, as a 2-D histogram is naturally computed. Output orientation
/// (transpose and vertical flip) happens at assembly time.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl Histogram {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn incr(&mut self, ix: usize, iy: usize) {
        self.data[ix * self.height + iy] += 1.0;
    }

    pub fn get(&self, ix: usize, iy: usize) -> f64 {
        self.data[ix * self.height + iy]
    }

    /// Element-wise addition. Both histograms must share the grid shape,
    /// which is frozen before any accumulation starts.
    pub fn add(&mut self, other: &Histogram) {
        debug_assert_eq!(self.width, other.width);
        debug_assert_eq!(self.height, other.height);
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }
}

/// Merges per-batch per-category histograms into running totals. Totals are
/// keyed by category identity in a sorted map, so the final iteration order
/// never depends on the order categories were first encountered.
#[derive(Debug)]
pub struct Accumulator {
    width: usize,
    height: usize,
    totals: BTreeMap<CatKey, (Histogram, u64)>,
}

impl Accumulator {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            totals: BTreeMap::new(),
        }
    }

    /// Pre-create zero histograms for keys that must appear in the output
    /// even when no row ever lands in them.
    pub fn seed(&mut self, keys: impl IntoIterator<Item = CatKey>) {
        for key in keys {
            self.totals
                .entry(key)
                .or_insert_with(|| (Histogram::new(self.width, self.height), 0));
        }
    }

    /// Fold one batch's histogram for `key` into the running total, adding
    /// `rows` to the category's row count. An unseen key starts from zeros.
    pub fn merge(&mut self, key: CatKey, histogram: &Histogram, rows: u64) {
        let entry = self
            .totals
            .entry(key)
            .or_insert_with(|| (Histogram::new(self.width, self.height), 0));
        entry.0.add(histogram);
        entry.1 += rows;
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Finished totals in key order.
    pub fn finish(self) -> Vec<(CatKey, Histogram, u64)> {
        self.totals
            .into_iter()
            .map(|(key, (histogram, rows))| (key, histogram, rows))
            .collect()
    }
}
