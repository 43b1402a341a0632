pub mod line_reader;
pub mod report_writer;
