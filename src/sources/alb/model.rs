use crate::core::error::{Error, LineFault, Result};
use crate::sources::alb::tokenize::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Number of positional fields in an access-log line.
pub const FIELD_COUNT: usize = 28;

/// Field names in positional order. Also the keys of the keyed-map form.
pub const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "type",
    "time",
    "elb",
    "client_ip_port",
    "target_ip_port",
    "request_processing_time",
    "target_processing_time",
    "response_processing_time",
    "elb_status_code",
    "target_status_code",
    "received_bytes",
    "sent_bytes",
    "request",
    "user_agent",
    "ssl_cipher",
    "ssl_protocol",
    "target_group_arn",
    "trace_id",
    "domain_name",
    "chosen_cert_arn",
    "matched_rule_policy",
    "actions_executed",
    "redirect_url",
    "error_reason",
    "target_port_list",
    "target_status_code_list",
    "classification",
    "classification_reason",
];

/// Key older persisted records used for `response_processing_time`.
pub const LEGACY_RESPONSE_PROCESSING_TIME: &str = "respose_processing_time";

/// One application load balancer access-log entry.
///
/// Every field is kept exactly as it appeared in the log line, quotes removed.
///
/// See <https://docs.aws.amazon.com/elasticloadbalancing/latest/application/load-balancer-access-logs.html>
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadBalancerLogEntry {
    #[serde(rename = "type")]
    pub type_: String,
    pub time: String,
    pub elb: String,
    pub client_ip_port: String,
    pub target_ip_port: String,
    pub request_processing_time: String,
    pub target_processing_time: String,
    #[serde(alias = "respose_processing_time")]
    pub response_processing_time: String,
    pub elb_status_code: String,
    pub target_status_code: String,
    pub received_bytes: String,
    pub sent_bytes: String,
    pub request: String,
    pub user_agent: String,
    pub ssl_cipher: String,
    pub ssl_protocol: String,
    pub target_group_arn: String,
    pub trace_id: String,
    pub domain_name: String,
    pub chosen_cert_arn: String,
    pub matched_rule_policy: String,
    pub actions_executed: String,
    pub redirect_url: String,
    pub error_reason: String,
    pub target_port_list: String,
    pub target_status_code_list: String,
    pub classification: String,
    pub classification_reason: String,
}

impl LoadBalancerLogEntry {
    /// Builds an entry from already-split tokens, assigned by position.
    ///
    /// Needs at least `FIELD_COUNT` tokens; extra trailing tokens are ignored.
    pub fn from_positional<S: AsRef<str>>(tokens: &[S]) -> Result<Self> {
        if tokens.len() < FIELD_COUNT {
            return Err(Error::malformed(LineFault::TooFewFields {
                expected: FIELD_COUNT,
                found: tokens.len(),
            }));
        }

        let mut fields = tokens.iter().map(|token| token.as_ref().to_string());
        let mut next = || fields.next().unwrap_or_default();
        Ok(Self {
            type_: next(),
            time: next(),
            elb: next(),
            client_ip_port: next(),
            target_ip_port: next(),
            request_processing_time: next(),
            target_processing_time: next(),
            response_processing_time: next(),
            elb_status_code: next(),
            target_status_code: next(),
            received_bytes: next(),
            sent_bytes: next(),
            request: next(),
            user_agent: next(),
            ssl_cipher: next(),
            ssl_protocol: next(),
            target_group_arn: next(),
            trace_id: next(),
            domain_name: next(),
            chosen_cert_arn: next(),
            matched_rule_policy: next(),
            actions_executed: next(),
            redirect_url: next(),
            error_reason: next(),
            target_port_list: next(),
            target_status_code_list: next(),
            classification: next(),
            classification_reason: next(),
        })
    }

    /// Tokenizes one raw log line and maps it positionally.
    pub fn parse_line(line: &str) -> Result<Self> {
        let tokens = tokenize(line)?;
        Self::from_positional(&tokens)
    }

    /// Field values in positional order.
    pub fn to_positional(&self) -> [&str; FIELD_COUNT] {
        [
            &self.type_,
            &self.time,
            &self.elb,
            &self.client_ip_port,
            &self.target_ip_port,
            &self.request_processing_time,
            &self.target_processing_time,
            &self.response_processing_time,
            &self.elb_status_code,
            &self.target_status_code,
            &self.received_bytes,
            &self.sent_bytes,
            &self.request,
            &self.user_agent,
            &self.ssl_cipher,
            &self.ssl_protocol,
            &self.target_group_arn,
            &self.trace_id,
            &self.domain_name,
            &self.chosen_cert_arn,
            &self.matched_rule_policy,
            &self.actions_executed,
            &self.redirect_url,
            &self.error_reason,
            &self.target_port_list,
            &self.target_status_code_list,
            &self.classification,
            &self.classification_reason,
        ]
    }

    /// Builds an entry from a map keyed by `FIELD_NAMES`.
    ///
    /// `response_processing_time` may also be stored under the legacy
    /// `respose_processing_time` key. The first absent key, in field order,
    /// is reported as `MissingField`.
    pub fn from_keyed_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut tokens = Vec::with_capacity(FIELD_COUNT);
        for name in FIELD_NAMES {
            let value = match map.get(name) {
                Some(value) => value,
                None if name == "response_processing_time" => map
                    .get(LEGACY_RESPONSE_PROCESSING_TIME)
                    .ok_or_else(|| Error::missing_field(name))?,
                None => return Err(Error::missing_field(name)),
            };
            tokens.push(value.as_str());
        }
        Self::from_positional(&tokens)
    }

    /// Inverse of `from_keyed_map`, always using the `FIELD_NAMES` spelling.
    pub fn to_keyed_map(&self) -> HashMap<String, String> {
        FIELD_NAMES
            .iter()
            .zip(self.to_positional())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }
}

impl FromStr for LoadBalancerLogEntry {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        Self::parse_line(line)
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_LINE: &str = r#"h2 2023-01-01T00:00:00.123456Z app/my-alb/50dc6c495c0c9188 192.168.131.39:2817 10.0.0.1:80 0.001 0.002 0.000 200 200 34 366 "GET https://example.com:443/path with space HTTP/1.1" "curl/7.46.0" ECDHE-RSA-AES128-GCM-SHA256 TLSv1.2 arn:aws:elasticloadbalancing:us-east-2:123456789012:targetgroup/my-targets/73e2d6bc24d8a067 "Root=1-58337364-23a8c76965a2ef7629b185e3" "example.com" "arn:aws:acm:us-east-2:123456789012:certificate/12345678-1234-1234-1234-123456789012" 0 "forward" "-" "-" "10.0.0.1:80" "200" "-" "-""#;
