//! Error policy - which venue errors a session may shrug off

use std::collections::HashMap;

use crate::core::Error;
use crate::protocol::frame::{BusinessMessageReject, ErrorPayload};
use crate::protocol::request::Method;
use crate::session::correlation::Purpose;
use crate::transport::CloseKind;

/// Where an inbound error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorSource {
    /// Error payload in the response to a request
    Response(Purpose),
    /// Business reject notification referencing a prior request
    BusinessReject(Method),
    /// Connection closure
    Close(CloseKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ignorable,
    Fatal,
}

#[derive(Debug)]
pub enum Classification {
    Ignorable,
    Fatal(Error),
}

impl Classification {
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Classification::Ignorable)
    }
}

/// Table-driven classifier. Anything not in the table is fatal.
#[derive(Debug, Clone)]
pub struct ErrorPolicy {
    rules: HashMap<ErrorSource, Disposition>,
}

impl Default for ErrorPolicy {
    /// A mass-status probe with no orders to report comes back as a
    /// business reject; that one is expected. So is a clean close.
    fn default() -> Self {
        Self::empty()
            .with_rule(
                ErrorSource::BusinessReject(Method::OrderMassStatusRequest),
                Disposition::Ignorable,
            )
            .with_rule(ErrorSource::Close(CloseKind::Ok), Disposition::Ignorable)
    }
}

impl ErrorPolicy {
    pub fn empty() -> Self {
        Self { rules: HashMap::new() }
    }

    pub fn with_rule(mut self, source: ErrorSource, disposition: Disposition) -> Self {
        self.rules.insert(source, disposition);
        self
    }

    fn disposition(&self, source: ErrorSource) -> Disposition {
        self.rules.get(&source).copied().unwrap_or(Disposition::Fatal)
    }

    pub fn classify_response(&self, purpose: Purpose, error: &ErrorPayload) -> Classification {
        match self.disposition(ErrorSource::Response(purpose)) {
            Disposition::Ignorable => Classification::Ignorable,
            Disposition::Fatal => Classification::Fatal(Error::RequestFailed {
                purpose: purpose.to_string(),
                error: error.to_string(),
            }),
        }
    }

    pub fn classify_reject(&self, reject: &BusinessMessageReject) -> Classification {
        let fatal = || {
            Classification::Fatal(Error::BusinessReject {
                ref_method: reject.ref_msg_type.clone(),
                reason: reject.reason(),
            })
        };
        match reject.ref_method() {
            Some(method) => match self.disposition(ErrorSource::BusinessReject(method)) {
                Disposition::Ignorable => Classification::Ignorable,
                Disposition::Fatal => fatal(),
            },
            None => fatal(),
        }
    }

    pub fn classify_close(&self, kind: CloseKind) -> Classification {
        match self.disposition(ErrorSource::Close(kind)) {
            Disposition::Ignorable => Classification::Ignorable,
            Disposition::Fatal => Classification::Fatal(Error::ConnectionClosed(kind.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reject(ref_msg_type: &str) -> BusinessMessageReject {
        BusinessMessageReject {
            ref_seq_num: None,
            ref_msg_type: ref_msg_type.into(),
            business_reject_ref_id: None,
            business_reject_reason: Some("UNKNOWN_SYMBOL".into()),
            text: Some("BTC-PERPETUAL".into()),
        }
    }

    #[test]
    fn test_mass_status_reject_is_ignorable() {
        let policy = ErrorPolicy::default();
        assert!(policy.classify_reject(&reject("AF")).is_ignorable());
        assert!(policy.classify_reject(&reject("order_mass_status_request")).is_ignorable());
    }

    #[test]
    fn test_other_rejects_are_fatal_with_reason() {
        let policy = ErrorPolicy::default();
        for r in ["D", "new_order_single", "F", "not_a_method"] {
            match policy.classify_reject(&reject(r)) {
                Classification::Fatal(Error::BusinessReject { ref_method, reason }) => {
                    assert_eq!(ref_method, r);
                    assert_eq!(reason, "UNKNOWN_SYMBOL / BTC-PERPETUAL");
                }
                other => panic!("{} classified as {:?}", r, other),
            }
        }
    }

    #[test]
    fn test_response_errors_default_to_fatal() {
        let policy = ErrorPolicy::default();
        let error = ErrorPayload {
            message: "NOT_LOGGED_ON".into(),
            ..Default::default()
        };
        for purpose in [Purpose::Logon, Purpose::MassStatus, Purpose::NewOrder, Purpose::Cancel] {
            match policy.classify_response(purpose, &error) {
                Classification::Fatal(Error::RequestFailed { error, .. }) => {
                    assert_eq!(error, "NOT_LOGGED_ON")
                }
                other => panic!("{} classified as {:?}", purpose, other),
            }
        }
    }

    #[test]
    fn test_rules_can_be_added() {
        let policy = ErrorPolicy::default()
            .with_rule(ErrorSource::Response(Purpose::MassStatus), Disposition::Ignorable);
        let error = ErrorPayload::default();
        assert!(policy.classify_response(Purpose::MassStatus, &error).is_ignorable());
        assert!(!policy.classify_response(Purpose::Cancel, &error).is_ignorable());
    }

    #[test]
    fn test_only_clean_close_is_ignorable() {
        let policy = ErrorPolicy::default();
        assert!(policy.classify_close(CloseKind::Ok).is_ignorable());
        for kind in [CloseKind::Error, CloseKind::Other] {
            match policy.classify_close(kind) {
                Classification::Fatal(Error::ConnectionClosed(msg)) => assert_eq!(msg, kind.to_string()),
                other => panic!("{} classified as {:?}", kind, other),
            }
        }
    }
}
