//! Order workflow - single-order lifecycle driven by venue notifications
//!
//! ```text
//! Init --logon ok--> LoggedOn --mass status--> StatusRequested
//!   StatusRequested --reject(AF) | last report--> OrderPending      (new order sent)
//!   OrderPending --WORKING--> OrderWorking --> OrderCancelling       (cancel sent)
//!   OrderCancelling --CANCELED--> Done
//!   any --fatal--> Failed
//! ```
//!
//! The one-shot gates ("new order once", "cancel once") are the phases
//! themselves: only `StatusRequested` can emit the new order and only
//! `OrderPending` can emit the cancel.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::config::{CredentialsConfig, OrderConfig};
use crate::core::{CancelPolicy, Config, Error, OrdStatus, Result};
use crate::protocol::frame::{BusinessMessageReject, ExecutionReport};
use crate::protocol::request::{
    CancelParams, LogonParams, MassStatusParams, Method, NewOrderSingleParams, Params,
};
use crate::session::correlation::Purpose;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Init,
    LoggedOn,
    StatusRequested,
    OrderPending,
    OrderWorking,
    OrderCancelling,
    Done,
    Failed(String),
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Failed(_))
    }
}

/// Venue-side status of the tracked order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    None,
    PendingNew,
    Working,
    PendingCancel,
    Rejected,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderState {
    pub client_order_id: String,
    /// Set only while a cancel is in flight
    pub prior_client_order_id: Option<String>,
    pub status: OrderStatus,
    pub logon_done: bool,
    pub mass_status_inflight: bool,
}

/// A request the workflow wants sent, not yet assigned an id
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub purpose: Purpose,
    pub params: Params,
}

pub struct OrderWorkflow {
    phase: Phase,
    order: OrderState,
    settings: OrderConfig,
    credentials: CredentialsConfig,
    on_cancel_confirmed: CancelPolicy,
    cancel_on_working: bool,
    logon_sent: bool,
    outbox: Vec<Outbound>,
}

impl OrderWorkflow {
    pub fn new(config: &Config) -> Self {
        Self {
            phase: Phase::Init,
            order: OrderState {
                client_order_id: config.order.cl_ord_id.clone(),
                prior_client_order_id: None,
                status: OrderStatus::None,
                logon_done: false,
                mass_status_inflight: false,
            },
            settings: config.order.clone(),
            credentials: config.credentials.clone(),
            on_cancel_confirmed: config.session.on_cancel_confirmed,
            cancel_on_working: config.session.cancel_on_working,
            logon_sent: false,
            outbox: Vec::new(),
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn order(&self) -> &OrderState {
        &self.order
    }

    /// Session should stop dispatching
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Done && self.on_cancel_confirmed == CancelPolicy::Terminate
    }

    /// Requests queued since the last call
    pub fn take_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    /// Queue the logon request.
    pub fn start(&mut self) -> Result<()> {
        if self.phase != Phase::Init || self.logon_sent {
            return Err(Error::InvalidState(format!(
                "logon already sent (phase {:?})",
                self.phase
            )));
        }
        self.logon_sent = true;
        self.emit(
            Purpose::Logon,
            Params::Logon(LogonParams {
                username: self.credentials.username.clone(),
                password: self.credentials.password.clone(),
            }),
        );
        Ok(())
    }

    /// Successful response to one of our requests
    pub fn on_result(&mut self, purpose: Purpose, result: &Value) -> Result<()> {
        match purpose {
            Purpose::Logon => {
                if self.phase != Phase::Init {
                    return Err(Error::InvalidState(format!(
                        "logon response in phase {:?}",
                        self.phase
                    )));
                }
                info!("✅ Logged on as {}", self.credentials.username);
                self.order.logon_done = true;
                self.transition(Phase::LoggedOn);
                self.request_mass_status();
            }
            _ => debug!("{} acknowledged: {}", purpose, result),
        }
        Ok(())
    }

    fn request_mass_status(&mut self) {
        self.order.mass_status_inflight = true;
        self.emit(
            Purpose::MassStatus,
            Params::OrderMassStatusRequest(MassStatusParams {
                mass_status_req_id: self.settings.mass_status_req_id.clone(),
            }),
        );
        self.transition(Phase::StatusRequested);
    }

    /// Business reject already classified as ignorable by the error policy
    pub fn on_business_reject(&mut self, reject: &BusinessMessageReject) {
        match reject.ref_method() {
            Some(Method::OrderMassStatusRequest) => {
                info!("==> no existing orders ({})", reject.reason());
                self.status_query_complete();
            }
            _ => debug!("ignoring business reject for {}", reject.ref_msg_type),
        }
    }

    pub fn on_execution_report(&mut self, report: &ExecutionReport) -> Result<()> {
        debug!("execution_report={:?}", report);

        if report.ord_status_req_id.is_some() {
            return Ok(());
        }
        if report.mass_status_req_id.is_some() {
            if report.last_rpt_requested {
                info!("==> got last execution report");
                self.status_query_complete();
            }
            return Ok(());
        }
        if !self.is_tracked(report) {
            debug!("report for untracked order {:?}", report.cl_ord_id);
            return Ok(());
        }

        let Some(status) = &report.ord_status else {
            warn!("execution report without ord_status ignored");
            return Ok(());
        };

        match (self.phase.clone(), status) {
            (Phase::OrderPending, OrdStatus::Rejected) => {
                let reason = report
                    .ord_rej_reason
                    .clone()
                    .or_else(|| report.text.clone())
                    .unwrap_or_default();
                self.order.status = OrderStatus::Rejected;
                self.fail(reason.clone());
                Err(Error::OrderRejected(reason))
            }
            (Phase::OrderPending, OrdStatus::Working) => {
                info!("==> order is working");
                self.order.status = OrderStatus::Working;
                self.transition(Phase::OrderWorking);
                if self.cancel_on_working {
                    self.request_cancel();
                }
                Ok(())
            }
            (
                Phase::OrderPending | Phase::OrderWorking,
                OrdStatus::Filled | OrdStatus::Canceled | OrdStatus::Expired,
            )
            | (Phase::OrderCancelling, OrdStatus::Filled) => {
                info!("==> order closed by venue ({})", status);
                self.finish();
                Ok(())
            }
            (Phase::OrderCancelling, OrdStatus::Canceled | OrdStatus::Expired) => {
                info!("==> cancel confirmed");
                self.finish();
                Ok(())
            }
            (phase, status) => {
                warn!("ignoring ord_status {} in phase {:?}", status, phase);
                Ok(())
            }
        }
    }

    /// Mark the workflow failed; the caller surfaces the error.
    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if !self.phase.is_terminal() {
            self.transition(Phase::Failed(reason));
        }
    }

    fn status_query_complete(&mut self) {
        if self.phase != Phase::StatusRequested {
            debug!("status query already complete (phase {:?})", self.phase);
            return;
        }
        self.order.mass_status_inflight = false;
        info!("==> place new order");
        self.order.status = OrderStatus::PendingNew;
        self.emit(
            Purpose::NewOrder,
            Params::NewOrderSingle(NewOrderSingleParams {
                cl_ord_id: self.order.client_order_id.clone(),
                exchange: self.settings.exchange.clone(),
                symbol: self.settings.symbol.clone(),
                side: self.settings.side,
                ord_type: self.settings.ord_type,
                time_in_force: self.settings.time_in_force,
                quantity: self.settings.quantity,
                price: self.settings.price,
            }),
        );
        self.transition(Phase::OrderPending);
    }

    fn request_cancel(&mut self) {
        info!("==> cancel order");
        let orig = std::mem::replace(
            &mut self.order.client_order_id,
            self.settings.cancel_cl_ord_id.clone(),
        );
        self.emit(
            Purpose::Cancel,
            Params::OrderCancelRequest(CancelParams {
                orig_cl_ord_id: orig.clone(),
                cl_ord_id: self.order.client_order_id.clone(),
                exchange: self.settings.exchange.clone(),
                symbol: self.settings.symbol.clone(),
            }),
        );
        self.order.prior_client_order_id = Some(orig);
        self.order.status = OrderStatus::PendingCancel;
        self.transition(Phase::OrderCancelling);
    }

    fn finish(&mut self) {
        self.order.status = OrderStatus::Done;
        self.order.prior_client_order_id = None;
        self.transition(Phase::Done);
    }

    /// Reports without a client id are taken as ours
    fn is_tracked(&self, report: &ExecutionReport) -> bool {
        let ours = |id: &Option<String>| {
            id.as_deref().is_some_and(|id| {
                id == self.order.client_order_id
                    || self.order.prior_client_order_id.as_deref() == Some(id)
            })
        };
        report.cl_ord_id.is_none() || ours(&report.cl_ord_id) || ours(&report.orig_cl_ord_id)
    }

    fn emit(&mut self, purpose: Purpose, params: Params) {
        self.outbox.push(Outbound { purpose, params });
    }

    fn transition(&mut self, next: Phase) {
        info!("workflow {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }
}
