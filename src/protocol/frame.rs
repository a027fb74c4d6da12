//! Inbound frames - decoded once, then routed by kind
//!
//! A frame with an `id` is a response, a frame with a `method` and no `id`
//! is a notification. Notification params are validated into typed records
//! here so handlers never probe optional keys.

use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::core::{Error, OrdStatus, Result};
use crate::protocol::request::{JSONRPC_VERSION, Method};

pub const BUSINESS_MESSAGE_REJECT: &str = "business_message_reject";
pub const EXECUTION_REPORT: &str = "execution_report";

/// Decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Response { id: u64, reply: Reply },
    Notification(Notification),
}

/// Outcome carried by a response. Exactly one of `result`/`error` exists on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Result(Value),
    Error(ErrorPayload),
}

/// Venue error, either a bare code string or a structured object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorPayload {
    pub code: Option<String>,
    pub message: String,
    pub details: Option<Value>,
}

impl ErrorPayload {
    fn from_value(value: Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) if s.is_empty() => Ok(None),
            Value::String(s) => Ok(Some(Self {
                code: None,
                message: s,
                details: None,
            })),
            Value::Object(map) if map.is_empty() => Ok(None),
            Value::Object(mut map) => {
                let code = map.remove("code").and_then(scalar_text);
                let message = map
                    .remove("message")
                    .or_else(|| map.remove("reason"))
                    .and_then(scalar_text)
                    .unwrap_or_default();
                let details = map.remove("details");
                Ok(Some(Self { code, message, details }))
            }
            other => Err(Error::MalformedFrame(format!(
                "error payload must be a string or object, got {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) if !self.message.is_empty() => write!(f, "{}: {}", code, self.message)?,
            Some(code) => write!(f, "{}", code)?,
            None => write!(f, "{}", self.message)?,
        }
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

/// Server-pushed message, one variant per handled method
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    BusinessMessageReject(BusinessMessageReject),
    ExecutionReport(ExecutionReport),
}

impl Notification {
    pub fn decode(method: &str, params: Value) -> Result<Self> {
        let malformed = |e: serde_json::Error| Error::MalformedFrame(format!("{}: {}", method, e));
        match method {
            BUSINESS_MESSAGE_REJECT => serde_json::from_value(params)
                .map(Notification::BusinessMessageReject)
                .map_err(malformed),
            EXECUTION_REPORT => serde_json::from_value(params)
                .map(Notification::ExecutionReport)
                .map_err(malformed),
            _ => Err(Error::UnhandledMethod(method.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BusinessMessageReject {
    #[serde(default)]
    pub ref_seq_num: Option<i64>,
    /// Method name or FIX MsgType of the rejected request
    #[serde(deserialize_with = "required_text")]
    pub ref_msg_type: String,
    #[serde(default, deserialize_with = "opt_text")]
    pub business_reject_ref_id: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub business_reject_reason: Option<String>,
    #[serde(default, deserialize_with = "opt_text")]
    pub text: Option<String>,
}

impl BusinessMessageReject {
    pub fn ref_method(&self) -> Option<Method> {
        Method::from_reference(&self.ref_msg_type)
    }

    /// Venue-supplied reason, verbatim
    pub fn reason(&self) -> String {
        match (&self.business_reject_reason, &self.text) {
            (Some(reason), Some(text)) => format!("{} / {}", reason, text),
            (Some(reason), None) => reason.clone(),
            (None, Some(text)) => text.clone(),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ExecutionReport {
    #[serde(deserialize_with = "opt_text")]
    pub order_id: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub cl_ord_id: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub orig_cl_ord_id: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub ord_status_req_id: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub mass_status_req_id: Option<String>,
    pub tot_num_reports: Option<i64>,
    #[serde(deserialize_with = "flag")]
    pub last_rpt_requested: bool,
    #[serde(deserialize_with = "opt_text")]
    pub exec_id: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub exec_type: Option<String>,
    #[serde(deserialize_with = "opt_status")]
    pub ord_status: Option<OrdStatus>,
    #[serde(deserialize_with = "opt_text")]
    pub ord_rej_reason: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub symbol: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub security_exchange: Option<String>,
    #[serde(deserialize_with = "opt_text")]
    pub side: Option<String>,
    #[serde(deserialize_with = "opt_decimal")]
    pub order_qty: Option<Decimal>,
    #[serde(deserialize_with = "opt_decimal")]
    pub price: Option<Decimal>,
    #[serde(deserialize_with = "opt_decimal")]
    pub leaves_qty: Option<Decimal>,
    #[serde(deserialize_with = "opt_decimal")]
    pub cum_qty: Option<Decimal>,
    #[serde(deserialize_with = "opt_decimal")]
    pub avg_px: Option<Decimal>,
    #[serde(deserialize_with = "opt_text")]
    pub text: Option<String>,
}

impl ExecutionReport {
    /// Final report of a mass-status batch
    pub fn is_mass_status_end(&self) -> bool {
        self.mass_status_req_id.is_some() && self.last_rpt_requested
    }
}

#[derive(Deserialize)]
struct RawFrame {
    jsonrpc: Option<String>,
    id: Option<Value>,
    method: Option<String>,
    params: Option<Value>,
    result: Option<Value>,
    error: Option<Value>,
}

/// Decode one text frame. Any shape problem is `MalformedFrame`.
pub fn decode(text: &str) -> Result<Frame> {
    let raw: RawFrame = serde_json::from_str(text)
        .map_err(|e| Error::MalformedFrame(format!("{}: {}", e, text)))?;

    if let Some(version) = &raw.jsonrpc {
        if version != JSONRPC_VERSION {
            return Err(Error::MalformedFrame(format!(
                "unsupported jsonrpc version {:?}",
                version
            )));
        }
    }

    if let Some(id) = raw.id {
        let id = id
            .as_u64()
            .ok_or_else(|| Error::MalformedFrame(format!("id must be an unsigned integer, got {}", id)))?;
        let error = raw.error.map(ErrorPayload::from_value).transpose()?.flatten();
        let reply = match (raw.result, error) {
            (Some(result), None) => Reply::Result(result),
            (None, Some(error)) => Reply::Error(error),
            (Some(_), Some(_)) => {
                return Err(Error::MalformedFrame(format!(
                    "response {} carries both result and error",
                    id
                )));
            }
            (None, None) => {
                return Err(Error::MalformedFrame(format!(
                    "response {} carries neither result nor error",
                    id
                )));
            }
        };
        return Ok(Frame::Response { id, reply });
    }

    match raw.method {
        Some(method) => {
            let params = match raw.params {
                None | Some(Value::Null) => Value::Object(Default::default()),
                Some(params) => params,
            };
            Ok(Frame::Notification(Notification::decode(&method, params)?))
        }
        None => Err(Error::MalformedFrame(format!(
            "frame has neither id nor method: {}",
            text
        ))),
    }
}

fn scalar_text(v: Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn opt_text<'de, D>(d: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(d)? {
        None => Ok(None),
        Some(v @ (Value::Array(_) | Value::Object(_))) => {
            Err(de::Error::custom(format!("expected text, got {}", v)))
        }
        Some(v) => Ok(scalar_text(v)),
    }
}

fn required_text<'de, D>(d: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    opt_text(d)?.ok_or_else(|| de::Error::custom("empty value"))
}

fn opt_status<'de, D>(d: D) -> std::result::Result<Option<OrdStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_text(d)?.map(OrdStatus::from))
}

fn flag<'de, D>(d: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(d)? {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(b),
        Some(Value::String(s)) => Ok(matches!(s.as_str(), "true" | "Y" | "1")),
        Some(Value::Number(n)) => Ok(n.as_i64().is_some_and(|n| n != 0)),
        Some(other) => Err(de::Error::custom(format!("expected flag, got {}", other))),
    }
}

fn opt_decimal<'de, D>(d: D) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match Option::<Value>::deserialize(d)? {
        None => return Ok(None),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if s.is_empty() => return Ok(None),
        Some(Value::String(s)) => s,
        Some(other) => return Err(de::Error::custom(format!("expected number, got {}", other))),
    };
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .map(Some)
        .map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_with_result() {
        let frame = decode(r#"{"jsonrpc":"2.0","result":"success","id":1000}"#).unwrap();
        assert_eq!(
            frame,
            Frame::Response { id: 1000, reply: Reply::Result(json!("success")) }
        );
    }

    #[test]
    fn test_response_with_string_error() {
        let frame = decode(r#"{"jsonrpc":"2.0","error":"NOT_LOGGED_ON","id":1002}"#).unwrap();
        match frame {
            Frame::Response { id, reply: Reply::Error(e) } => {
                assert_eq!(id, 1002);
                assert_eq!(e.message, "NOT_LOGGED_ON");
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_response_with_structured_error() {
        let frame = decode(
            r#"{"id":7,"error":{"code":-32601,"reason":"no such method","details":{"m":"x"}}}"#,
        )
        .unwrap();
        let Frame::Response { reply: Reply::Error(e), .. } = frame else {
            panic!("expected error response");
        };
        assert_eq!(e.code.as_deref(), Some("-32601"));
        assert_eq!(e.message, "no such method");
        assert_eq!(e.to_string(), r#"-32601: no such method ({"m":"x"})"#);
    }

    #[test]
    fn test_empty_error_counts_as_absent() {
        let frame = decode(r#"{"id":1000,"result":"success","error":""}"#).unwrap();
        assert!(matches!(frame, Frame::Response { reply: Reply::Result(_), .. }));
    }

    #[test]
    fn test_result_and_error_is_malformed() {
        let err = decode(r#"{"id":1,"result":"success","error":"NOT_READY"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)));
    }

    #[test]
    fn test_neither_result_nor_error_is_malformed() {
        let err = decode(r#"{"jsonrpc":"2.0","id":1}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)));
    }

    #[test]
    fn test_non_json_and_bad_shapes_are_malformed() {
        for text in [
            "not json",
            "[1,2,3]",
            r#"{"jsonrpc":"2.0"}"#,
            r#"{"jsonrpc":"1.0","id":1,"result":"ok"}"#,
            r#"{"id":"abc","result":"ok"}"#,
            r#"{"method":"execution_report","params":{"ord_status":["x"]}}"#,
        ] {
            let err = decode(text).unwrap_err();
            assert!(matches!(err, Error::MalformedFrame(_)), "{} -> {:?}", text, err);
        }
    }

    #[test]
    fn test_null_id_is_a_notification() {
        let frame = decode(r#"{"id":null,"method":"execution_report","params":{}}"#).unwrap();
        assert!(matches!(frame, Frame::Notification(Notification::ExecutionReport(_))));
    }

    #[test]
    fn test_unknown_notification_method() {
        let err = decode(r#"{"jsonrpc":"2.0","method":"heartbeat","params":{}}"#).unwrap_err();
        assert!(matches!(err, Error::UnhandledMethod(m) if m == "heartbeat"));
    }

    #[test]
    fn test_business_reject_decode() {
        let frame = decode(
            r#"{"jsonrpc":"2.0","method":"business_message_reject","params":{
                "ref_seq_num":3,"ref_msg_type":"AF","business_reject_ref_id":"test_000",
                "business_reject_reason":"UNSUPPORTED","text":"no orders"}}"#,
        )
        .unwrap();
        let Frame::Notification(Notification::BusinessMessageReject(r)) = frame else {
            panic!("expected business reject");
        };
        assert_eq!(r.ref_method(), Some(Method::OrderMassStatusRequest));
        assert_eq!(r.reason(), "UNSUPPORTED / no orders");
    }

    #[test]
    fn test_business_reject_requires_reference() {
        let err = decode(r#"{"method":"business_message_reject","params":{"text":"?"}}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedFrame(_)));
    }

    #[test]
    fn test_execution_report_decode() {
        let frame = decode(
            r#"{"jsonrpc":"2.0","method":"execution_report","params":{
                "order_id":"","cl_ord_id":"test_001","ord_status":"WORKING",
                "mass_status_req_id":"","last_rpt_requested":false,
                "order_qty":1.0,"price":"123.45","leaves_qty":1,"cum_qty":null}}"#,
        )
        .unwrap();
        let Frame::Notification(Notification::ExecutionReport(r)) = frame else {
            panic!("expected execution report");
        };
        assert_eq!(r.order_id, None);
        assert_eq!(r.cl_ord_id.as_deref(), Some("test_001"));
        assert_eq!(r.ord_status, Some(OrdStatus::Working));
        assert!(!r.is_mass_status_end());
        assert_eq!(r.price, Some(Decimal::new(12345, 2)));
        assert_eq!(r.leaves_qty, Some(Decimal::ONE));
        assert_eq!(r.cum_qty, None);
    }

    #[test]
    fn test_mass_status_end_marker() {
        let frame = decode(
            r#"{"method":"execution_report","params":{"mass_status_req_id":"test_000","last_rpt_requested":true}}"#,
        )
        .unwrap();
        let Frame::Notification(Notification::ExecutionReport(r)) = frame else {
            panic!("expected execution report");
        };
        assert!(r.is_mass_status_end());
    }
}
