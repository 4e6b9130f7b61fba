use std::fs::File;
use std::io::BufWriter;

use crate::descriptor::Descriptor;
use crate::error::Result;

/// Destination for the finished artifacts: one matrix per category plus the
/// descriptor. Returns a reference usable as a buffer URL.
pub trait ArtifactSink {
    fn write_matrix(&mut self, name: &str, matrix: &[Vec<f64>]) -> Result<String>;

    fn write_descriptor(&mut self, name: &str, descriptor: &Descriptor) -> Result<String>;
}

/// Writes artifacts as JSON files under the names given, which the engine
/// derives from the source filename.
#[derive(Debug, Default)]
pub struct FileSink;

impl FileSink {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactSink for FileSink {
    fn write_matrix(&mut self, name: &str, matrix: &[Vec<f64>]) -> Result<String> {
        let file = BufWriter::new(File::create(name)?);
        serde_json::to_writer(file, matrix)?;
        Ok(name.to_string())
    }

    fn write_descriptor(&mut self, name: &str, descriptor: &Descriptor) -> Result<String> {
        let file = BufWriter::new(File::create(name)?);
        serde_json::to_writer_pretty(file, descriptor)?;
        Ok(name.to_string())
    }
}

/// Keeps artifacts in memory. Used by tests and embedders.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub matrices: Vec<(String, Vec<Vec<f64>>)>,
    pub descriptor: Option<Descriptor>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matrix(&self, name: &str) -> Option<&Vec<Vec<f64>>> {
        self.matrices
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }
}

impl ArtifactSink for MemorySink {
    fn write_matrix(&mut self, name: &str, matrix: &[Vec<f64>]) -> Result<String> {
        self.matrices.push((name.to_string(), matrix.to_vec()));
        Ok(name.to_string())
    }

    fn write_descriptor(&mut self, name: &str, descriptor: &Descriptor) -> Result<String> {
        self.descriptor = Some(descriptor.clone());
        Ok(name.to_string())
    }
}
