use serde::Serialize;

use crate::category::CatKey;

/// The final immutable result of a run: where the data came from, how each
/// axis is encoded, and one buffer entry per category histogram. Serializes
/// to the JSON consumed by the heatmap renderer.
#[derive(Debug, Clone, Serialize)]
pub struct Descriptor {
    pub source: SourceMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<ProjectionMeta>,
    pub encoding: Encoding,
    pub buffers: Vec<BufferEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceMeta {
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Total rows surviving the category filters, equal to the sum of all
    /// buffer counts.
    pub rows: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectionMeta {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Encoding {
    pub x: AxisEncoding,
    pub y: AxisEncoding,
    pub z: CategoryEncoding,
}

#[derive(Debug, Clone, Serialize)]
pub struct AxisEncoding {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub bin: BinSpec,
    pub aggregate: String,
    pub scale: AxisScale,
}

#[derive(Debug, Clone, Serialize)]
pub struct BinSpec {
    pub maxbins: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AxisScale {
    pub domain: [f64; 2],
    pub range: [usize; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryEncoding {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub scale: CategoryScale,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryScale {
    pub domain: Vec<CatKey>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BufferEntry {
    pub url: String,
    pub count: u64,
    pub value: CatKey,
    pub range: [i64; 2],
}
