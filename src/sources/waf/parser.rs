use crate::core::error::Result;
use crate::core::object::read_gzip_text;
use crate::core::storage::ObjectStore;
use crate::core::traits::LogParser;
use crate::sources::waf::model::FirewallLogEntry;
use tracing::debug;

/// Reads firewall log objects from a store.
#[derive(Debug, Clone)]
pub struct FirewallLogParser<S> {
    store: S,
}

impl<S: ObjectStore> FirewallLogParser<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns every entry of the object, in line order.
    pub fn parse_object(&self, object_id: &str) -> Result<Vec<FirewallLogEntry>> {
        let text = read_gzip_text(&self.store, object_id)?;
        let entries = parse_text(&text)?;
        debug!(object_id, entries = entries.len(), "parsed firewall log");
        Ok(entries)
    }
}

impl<S: ObjectStore> LogParser for FirewallLogParser<S> {
    type Record = FirewallLogEntry;

    fn parse_object(&self, object_id: &str) -> Result<Vec<FirewallLogEntry>> {
        FirewallLogParser::parse_object(self, object_id)
    }
}

/// Parses decompressed JSON-lines text, skipping blank lines.
pub fn parse_text(text: &str) -> Result<Vec<FirewallLogEntry>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            FirewallLogEntry::parse_line(line).map_err(|err| err.at_line(index + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use crate::core::object::gzip;
    use crate::core::storage::MemoryObjectStore;
    use crate::sources::waf::model::sample_json;
    use serde_json::json;

    fn line_with(action: &str, request_id: &str) -> String {
        let mut value = sample_json();
        value["action"] = json!(action);
        value["httpRequest"]["requestId"] = json!(request_id);
        value.to_string()
    }

    #[test]
    fn preserves_line_order() {
        let lines = [
            line_with("ALLOW", "r1"),
            line_with("BLOCK", "r2"),
            line_with("COUNT", "r3"),
            line_with("ALLOW", "r1"),
        ];
        let mut store = MemoryObjectStore::new();
        store.insert("waf.log.gz", gzip(&format!("{}\n", lines.join("\n"))));
        let parser = FirewallLogParser::new(store);

        let entries = parser.parse_object("waf.log.gz").expect("entries");
        let seen: Vec<(&str, &str)> = entries
            .iter()
            .map(|entry| {
                (
                    entry.action.as_str(),
                    entry.http_request.request_id.as_str(),
                )
            })
            .collect();
        assert_eq!(
            seen,
            vec![("ALLOW", "r1"), ("BLOCK", "r2"), ("COUNT", "r3"), ("ALLOW", "r1")]
        );
    }

    #[test]
    fn blank_lines_are_skipped() {
        let text = format!("\n{}\n   \n{}\n\n", line_with("ALLOW", "a"), line_with("BLOCK", "b"));
        let entries = parse_text(&text).expect("entries");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].action, "BLOCK");
    }

    #[test]
    fn invalid_json_reports_line() {
        let text = format!("{}\nnot json\n", line_with("ALLOW", "a"));
        let err = parse_text(&text).unwrap_err();
        assert!(matches!(err, Error::InvalidJson { line: Some(2), .. }));
    }

    #[test]
    fn missing_field_reports_line_and_key() {
        let mut value = sample_json();
        value["httpRequest"]
            .as_object_mut()
            .expect("object")
            .remove("clientIp");
        let text = format!("{}\n{}\n", line_with("ALLOW", "a"), value);

        let err = parse_text(&text).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField { line: Some(2), ref field } if field == "clientIp"
        ));
        assert_eq!(err.to_string(), "line 2: missing field `clientIp`");
    }

    #[test]
    fn invalid_gzip_is_decompression_error() {
        let mut store = MemoryObjectStore::new();
        store.insert("waf.json", line_with("ALLOW", "a").into_bytes());
        let parser = FirewallLogParser::new(&store);

        let err = parser.parse_object("waf.json").unwrap_err();
        assert!(matches!(err, Error::Decompression { .. }));
    }

    #[test]
    fn reads_from_local_mirror() {
        use crate::core::storage::LocalObjectStore;

        let dir = tempfile::tempdir().expect("tempdir");
        let key = dir.path().join("waf-logs/AWSLogs/2024/01/01");
        std::fs::create_dir_all(&key).expect("mkdir");
        let text = format!("{}\n{}\n", line_with("ALLOW", "a"), line_with("BLOCK", "b"));
        std::fs::write(key.join("waf.log.gz"), gzip(&text)).expect("write");

        let parser = FirewallLogParser::new(LocalObjectStore::new(dir.path()));
        let entries = parser
            .parse_object("s3://waf-logs/AWSLogs/2024/01/01/waf.log.gz")
            .expect("entries");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].http_request.request_id, "a");
    }

    #[test]
    fn unknown_object_is_not_found() {
        let store = MemoryObjectStore::new();
        let parser = FirewallLogParser::new(&store);
        let err = parser.parse_object("missing").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
