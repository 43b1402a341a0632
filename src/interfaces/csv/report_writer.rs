use crate::application::pipeline::BatchReport;
use crate::error::Result;
use std::io::Write;

/// Writes the batch outcome report as CSV.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_report(&mut self, report: &BatchReport) -> Result<()> {
        self.writer
            .write_record(["batch_id", "line_id", "state", "detail"])?;
        for outcome in &report.outcomes {
            self.writer.write_record([
                outcome.line.batch_id.as_str(),
                outcome.line.line_id.as_str(),
                outcome.state.as_str(),
                outcome.detail.as_str(),
            ])?;
        }
        for rejected in &report.rejected {
            self.writer.write_record([
                "",
                rejected.line_id.as_str(),
                "REJECTED",
                rejected.error.as_str(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
