use crate::core::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

/// One web ACL evaluation record.
///
/// Keys are read strictly: every documented key must be present, even when
/// its value is `null`.
///
/// See <https://docs.aws.amazon.com/waf/latest/developerguide/logging-fields.html>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallLogEntry {
    pub action: String,
    pub format_version: Value,
    pub http_request: FirewallHttpRequest,
    pub timestamp: Value,
    pub http_source_id: String,
    pub http_source_name: String,
    pub non_terminating_matching_rules: Vec<Value>,
    pub request_headers_inserted: Value,
    pub rate_based_rule_list: Vec<Value>,
    pub response_code_sent: Value,
    pub rule_group_list: Vec<Value>,
    pub terminating_rule_id: String,
    pub terminating_rule_match_details: Vec<Value>,
    pub terminating_rule_type: String,
    #[serde(rename = "webaclId")]
    pub web_acl_id: String,
}

/// The request the web ACL evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallHttpRequest {
    pub args: QueryArgs,
    pub client_ip: String,
    pub country: String,
    pub headers: Vec<HttpHeader>,
    pub http_method: String,
    pub http_version: String,
    pub request_id: String,
    pub uri: String,
}

/// Query arguments of the evaluated request.
///
/// AWS writes the raw query string; structured producers write an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryArgs {
    Raw(String),
    Structured(BTreeMap<String, Value>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

impl FirewallLogEntry {
    /// Parses one JSON line.
    pub fn parse_line(line: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(line).map_err(|source| Error::InvalidJson { line: None, source })?;
        Self::from_json(value)
    }

    /// Extracts the documented keys, in documented order, from a JSON object.
    pub fn from_json(value: Value) -> Result<Self> {
        let mut fields = into_object(value, "<record>")?;
        Ok(Self {
            action: take(&mut fields, "action")?,
            format_version: take(&mut fields, "formatVersion")?,
            http_request: FirewallHttpRequest::from_json(take(&mut fields, "httpRequest")?)?,
            timestamp: take(&mut fields, "timestamp")?,
            http_source_id: take(&mut fields, "httpSourceId")?,
            http_source_name: take(&mut fields, "httpSourceName")?,
            non_terminating_matching_rules: take(&mut fields, "nonTerminatingMatchingRules")?,
            rate_based_rule_list: take(&mut fields, "rateBasedRuleList")?,
            request_headers_inserted: take(&mut fields, "requestHeadersInserted")?,
            response_code_sent: take(&mut fields, "responseCodeSent")?,
            rule_group_list: take(&mut fields, "ruleGroupList")?,
            terminating_rule_id: take(&mut fields, "terminatingRuleId")?,
            terminating_rule_match_details: take(&mut fields, "terminatingRuleMatchDetails")?,
            terminating_rule_type: take(&mut fields, "terminatingRuleType")?,
            web_acl_id: take(&mut fields, "webaclId")?,
        })
    }

    /// Value of the first header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.http_request.header(name)
    }
}

impl FromStr for FirewallLogEntry {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        Self::parse_line(line)
    }
}

impl FirewallHttpRequest {
    pub fn from_json(value: Value) -> Result<Self> {
        let mut fields = into_object(value, "httpRequest")?;
        Ok(Self {
            args: take(&mut fields, "args")?,
            client_ip: take(&mut fields, "clientIp")?,
            country: take(&mut fields, "country")?,
            headers: take(&mut fields, "headers")?,
            http_method: take(&mut fields, "httpMethod")?,
            http_version: take(&mut fields, "httpVersion")?,
            request_id: take(&mut fields, "requestId")?,
            uri: take(&mut fields, "uri")?,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }
}

fn into_object(value: Value, field: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidField {
            line: None,
            field: field.to_string(),
            source: <serde_json::Error as serde::de::Error>::custom(format!(
                "expected a JSON object, found {other}"
            )),
        }),
    }
}

fn take<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Result<T> {
    let value = fields.remove(key).ok_or_else(|| Error::missing_field(key))?;
    serde_json::from_value(value).map_err(|source| Error::InvalidField {
        line: None,
        field: key.to_string(),
        source,
    })
}

#[cfg(test)]
pub(crate) fn sample_json() -> Value {
    serde_json::json!({
        "timestamp": 1576280412771u64,
        "formatVersion": 1,
        "webaclId": "arn:aws:wafv2:ap-southeast-2:111122223333:regional/webacl/STMTest/1EXAMPLE-2ARN-3ARN-4ARN-123456EXAMPLE",
        "terminatingRuleId": "STMTest_SQLi_XSS",
        "terminatingRuleType": "REGULAR",
        "action": "BLOCK",
        "terminatingRuleMatchDetails": [
            {
                "conditionType": "SQL_INJECTION",
                "location": "UNKNOWN",
                "matchedData": ["10", "AND", "1"]
            }
        ],
        "httpSourceName": "-",
        "httpSourceId": "-",
        "ruleGroupList": [],
        "rateBasedRuleList": [],
        "nonTerminatingMatchingRules": [],
        "requestHeadersInserted": null,
        "responseCodeSent": null,
        "httpRequest": {
            "clientIp": "1.1.1.1",
            "country": "AU",
            "headers": [
                {"name": "Host", "value": "localhost:1989"},
                {"name": "User-Agent", "value": "curl/7.61.1"},
                {"name": "Accept", "value": "*/*"},
                {"name": "x-stm-test", "value": "10 AND 1=1"}
            ],
            "uri": "/myUri",
            "args": "",
            "httpVersion": "HTTP/1.1",
            "httpMethod": "GET",
            "requestId": "rid"
        },
        "labels": [{"name": "value"}]
    })
}
