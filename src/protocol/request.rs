//! Outbound request frames

use rust_decimal::Decimal;
use serde::Serialize;

use crate::core::{Error, OrdType, Result, Side, TimeInForce};
use crate::session::correlation::CorrelationTable;

pub const JSONRPC_VERSION: &str = "2.0";

/// Venue method names, shared by requests and business-reject references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Logon,
    Logout,
    OrderStatusRequest,
    OrderMassStatusRequest,
    NewOrderSingle,
    OrderCancelRequest,
    OrderMassCancelRequest,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Logon => "logon",
            Method::Logout => "logout",
            Method::OrderStatusRequest => "order_status_request",
            Method::OrderMassStatusRequest => "order_mass_status_request",
            Method::NewOrderSingle => "new_order_single",
            Method::OrderCancelRequest => "order_cancel_request",
            Method::OrderMassCancelRequest => "order_mass_cancel_request",
        }
    }

    /// Resolve a reference by method name or by FIX MsgType code.
    pub fn from_reference(s: &str) -> Option<Self> {
        let method = match s {
            "logon" | "A" => Method::Logon,
            "logout" | "5" => Method::Logout,
            "order_status_request" | "H" => Method::OrderStatusRequest,
            "order_mass_status_request" | "AF" => Method::OrderMassStatusRequest,
            "new_order_single" | "D" => Method::NewOrderSingle,
            "order_cancel_request" | "F" => Method::OrderCancelRequest,
            "order_mass_cancel_request" | "q" => Method::OrderMassCancelRequest,
            _ => return None,
        };
        Some(method)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogonParams {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MassStatusParams {
    pub mass_status_req_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOrderSingleParams {
    pub cl_ord_id: String,
    pub exchange: String,
    pub symbol: String,
    pub side: Side,
    pub ord_type: OrdType,
    pub time_in_force: TimeInForce,
    pub quantity: Decimal,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelParams {
    pub orig_cl_ord_id: String,
    pub cl_ord_id: String,
    pub exchange: String,
    pub symbol: String,
}

/// Parameter record, one variant per outbound method
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Params {
    Logon(LogonParams),
    OrderMassStatusRequest(MassStatusParams),
    NewOrderSingle(NewOrderSingleParams),
    OrderCancelRequest(CancelParams),
}

impl Params {
    pub fn method(&self) -> Method {
        match self {
            Params::Logon(_) => Method::Logon,
            Params::OrderMassStatusRequest(_) => Method::OrderMassStatusRequest,
            Params::NewOrderSingle(_) => Method::NewOrderSingle,
            Params::OrderCancelRequest(_) => Method::OrderCancelRequest,
        }
    }
}

/// A JSON-RPC request, ready to serialize
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub jsonrpc: &'static str,
    pub method: Method,
    pub params: Params,
    pub id: u64,
}

impl Request {
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Builds request frames. A builder made with [`RequestBuilder::against`]
/// refuses ids that are still outstanding.
#[derive(Default)]
pub struct RequestBuilder<'a> {
    pending: Option<&'a CorrelationTable>,
}

impl<'a> RequestBuilder<'a> {
    pub fn new() -> Self {
        Self { pending: None }
    }

    pub fn against(pending: &'a CorrelationTable) -> Self {
        Self { pending: Some(pending) }
    }

    /// Pure: never registers or sends.
    pub fn build(&self, method: Method, params: Params, id: u64) -> Result<Request> {
        if self.pending.is_some_and(|pending| pending.contains(id)) {
            return Err(Error::InvalidState(format!(
                "request id {} is still outstanding",
                id
            )));
        }
        if params.method() != method {
            return Err(Error::InvalidState(format!(
                "{} params supplied for {}",
                params.method(),
                method
            )));
        }
        Ok(Request {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::correlation::Purpose;
    use serde_json::{Value, json};

    fn mass_status() -> Params {
        Params::OrderMassStatusRequest(MassStatusParams {
            mass_status_req_id: "test_000".into(),
        })
    }

    #[test]
    fn test_request_wire_shape() {
        let req = RequestBuilder::new()
            .build(Method::OrderMassStatusRequest, mass_status(), 1001)
            .unwrap();
        let v: Value = serde_json::from_str(&req.to_text().unwrap()).unwrap();
        assert_eq!(
            v,
            json!({
                "jsonrpc": "2.0",
                "method": "order_mass_status_request",
                "params": {"mass_status_req_id": "test_000"},
                "id": 1001
            })
        );
    }

    #[test]
    fn test_new_order_params_serialize_as_numbers() {
        let params = Params::NewOrderSingle(NewOrderSingleParams {
            cl_ord_id: "test_001".into(),
            exchange: "deribit".into(),
            symbol: "BTC-PERPETUAL".into(),
            side: Side::Buy,
            ord_type: OrdType::Limit,
            time_in_force: TimeInForce::Gtc,
            quantity: Decimal::ONE,
            price: Decimal::new(12345, 2),
        });
        let v = serde_json::to_value(&params).unwrap();
        assert_eq!(v["side"], "BUY");
        assert_eq!(v["time_in_force"], "GTC");
        assert_eq!(v["quantity"].as_f64(), Some(1.0));
        assert_eq!(v["price"].as_f64(), Some(123.45));
    }

    #[test]
    fn test_outstanding_id_is_invalid_state() {
        let mut table = CorrelationTable::new();
        table.register(1001, Purpose::MassStatus).unwrap();
        let err = RequestBuilder::against(&table)
            .build(Method::OrderMassStatusRequest, mass_status(), 1001)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_mismatched_params_is_invalid_state() {
        let err = RequestBuilder::new()
            .build(Method::Logon, mass_status(), 1)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_reference_accepts_fix_codes() {
        assert_eq!(Method::from_reference("AF"), Some(Method::OrderMassStatusRequest));
        assert_eq!(
            Method::from_reference("order_mass_status_request"),
            Some(Method::OrderMassStatusRequest)
        );
        assert_eq!(Method::from_reference("D"), Some(Method::NewOrderSingle));
        assert_eq!(Method::from_reference("ZZ"), None);
    }
}
