use crate::core::error::Result;

/// Turns one stored log object into its ordered records.
pub trait LogParser {
    type Record;

    /// Reads, decompresses and parses the whole object.
    fn parse_object(&self, object_id: &str) -> Result<Vec<Self::Record>>;
}

/// Writes records to a sink (stdout, files, etc.).
pub trait RecordWriter<R> {
    /// Writes a single record and returns the number of bytes it accounted for.
    fn write_record(&mut self, record: &R) -> std::io::Result<u64>;
    /// Flushes buffered data without closing the writer.
    fn flush(&mut self) -> std::io::Result<()>;
    /// Closes the writer, flushing any remaining data.
    fn close(&mut self) -> std::io::Result<()>;
}
