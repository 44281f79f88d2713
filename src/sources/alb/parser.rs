use crate::core::error::Result;
use crate::core::object::read_gzip_text;
use crate::core::storage::ObjectStore;
use crate::core::traits::LogParser;
use crate::sources::alb::model::{LoadBalancerLogEntry, FIELD_COUNT};
use crate::sources::alb::tokenize::tokenize;
use tracing::{debug, trace};

/// Reads load balancer access-log objects from a store.
#[derive(Debug, Clone)]
pub struct LoadBalancerLogParser<S> {
    store: S,
}

impl<S: ObjectStore> LoadBalancerLogParser<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns every entry of the object, in line order.
    pub fn parse_object(&self, object_id: &str) -> Result<Vec<LoadBalancerLogEntry>> {
        let text = read_gzip_text(&self.store, object_id)?;
        let entries = parse_text(&text)?;
        debug!(object_id, entries = entries.len(), "parsed load balancer log");
        Ok(entries)
    }
}

impl<S: ObjectStore> LogParser for LoadBalancerLogParser<S> {
    type Record = LoadBalancerLogEntry;

    fn parse_object(&self, object_id: &str) -> Result<Vec<LoadBalancerLogEntry>> {
        LoadBalancerLogParser::parse_object(self, object_id)
    }
}

/// Parses decompressed access-log text.
///
/// Only the empty remainder after a final newline is dropped; an empty line
/// anywhere else is malformed.
pub fn parse_text(text: &str) -> Result<Vec<LoadBalancerLogEntry>> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }

    let mut entries = Vec::with_capacity(lines.len());
    for (index, line) in lines.into_iter().enumerate() {
        let number = index + 1;
        let tokens = tokenize(line).map_err(|err| err.at_line(number))?;
        if tokens.len() > FIELD_COUNT {
            trace!(line = number, extra = tokens.len() - FIELD_COUNT, "ignoring trailing fields");
        }
        let entry =
            LoadBalancerLogEntry::from_positional(&tokens).map_err(|err| err.at_line(number))?;
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{Error, LineFault};
    use crate::core::object::gzip;
    use crate::core::storage::MemoryObjectStore;
    use crate::sources::alb::model::SAMPLE_LINE;

    fn line_with(type_: &str, elb_status: &str) -> String {
        SAMPLE_LINE
            .replacen("h2", type_, 1)
            .replacen(" 200 200 ", &format!(" {elb_status} 200 "), 1)
    }

    fn store_with(object_id: &str, text: &str) -> MemoryObjectStore {
        let mut store = MemoryObjectStore::new();
        store.insert(object_id, gzip(text));
        store
    }

    #[test]
    fn preserves_line_order() {
        let lines = [
            line_with("http", "200"),
            line_with("https", "404"),
            line_with("h2", "502"),
            line_with("http", "200"),
        ];
        let text = format!("{}\n", lines.join("\n"));
        let parser = LoadBalancerLogParser::new(store_with("alb.log.gz", &text));

        let entries = parser.parse_object("alb.log.gz").expect("entries");
        let seen: Vec<(&str, &str)> = entries
            .iter()
            .map(|entry| (entry.type_.as_str(), entry.elb_status_code.as_str()))
            .collect();
        assert_eq!(
            seen,
            vec![("http", "200"), ("https", "404"), ("h2", "502"), ("http", "200")]
        );
        assert_eq!(entries[0], entries[3]);
    }

    #[test]
    fn trailing_newline_is_not_a_record() {
        let text = format!("{SAMPLE_LINE}\n{SAMPLE_LINE}\n");
        let entries = parse_text(&text).expect("entries");
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn last_line_without_newline_is_kept() {
        let text = format!("{SAMPLE_LINE}\n{SAMPLE_LINE}");
        let entries = parse_text(&text).expect("entries");
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn empty_object_has_no_entries() {
        assert!(parse_text("").expect("entries").is_empty());
    }

    #[test]
    fn short_line_fails_whole_object() {
        let text = format!("{SAMPLE_LINE}\nhttp 2023-01-01T00:00:00Z app/short\n{SAMPLE_LINE}\n");
        let parser = LoadBalancerLogParser::new(store_with("alb.log.gz", &text));

        let err = parser.parse_object("alb.log.gz").unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedLine {
                line: Some(2),
                fault: LineFault::TooFewFields {
                    expected: 28,
                    found: 3
                },
            }
        ));
    }

    #[test]
    fn interior_blank_line_is_malformed() {
        let text = format!("{SAMPLE_LINE}\n\n{SAMPLE_LINE}\n");
        let err = parse_text(&text).unwrap_err();
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn unterminated_quote_reports_line() {
        let text = format!("{SAMPLE_LINE}\n{SAMPLE_LINE} \"open\n");
        let err = parse_text(&text).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedLine {
                line: Some(2),
                fault: LineFault::UnterminatedQuote,
            }
        ));
    }

    #[test]
    fn crlf_line_endings() {
        let text = format!("{SAMPLE_LINE}\r\n{SAMPLE_LINE}\r\n");
        let entries = parse_text(&text).expect("entries");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].classification_reason, "-");
    }

    #[test]
    fn invalid_gzip_is_decompression_error() {
        let mut store = MemoryObjectStore::new();
        store.insert("plain.log", SAMPLE_LINE.as_bytes().to_vec());
        let parser = LoadBalancerLogParser::new(store);

        let err = parser.parse_object("plain.log").unwrap_err();
        assert!(matches!(err, Error::Decompression { .. }));
    }

    #[test]
    fn unknown_object_is_not_found() {
        let parser = LoadBalancerLogParser::new(MemoryObjectStore::new());
        let err = parser.parse_object("missing.log.gz").unwrap_err();
        assert!(matches!(err, Error::NotFound { ref object_id } if object_id == "missing.log.gz"));
    }
}
