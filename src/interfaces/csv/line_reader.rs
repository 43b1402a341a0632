use crate::domain::line::RawLineRecord;
use crate::error::{PipelineError, Result};
use std::io::Read;

/// Reads batch rows from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// yielding raw rows lazily so large batches stream without loading fully
/// into memory. Admission validation happens downstream.
pub struct BatchReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> BatchReader<R> {
    /// Creates a new `BatchReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn rows(self) -> impl Iterator<Item = Result<RawLineRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PipelineError::from))
    }
}
