//! Dispatcher - the session's single receive loop
//!
//! Frames are handled strictly in arrival order. Each handler may queue new
//! requests on the workflow; those are registered in the correlation table
//! and sent before the next frame is read, so a reply that arrives right
//! behind its request can always be resolved.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::core::{Config, Error, Result};
use crate::protocol::frame::{self, Frame, Notification, Reply};
use crate::protocol::request::{Params, Request, RequestBuilder};
use crate::session::correlation::{CorrelationTable, Purpose};
use crate::session::policy::{Classification, ErrorPolicy};
use crate::session::workflow::{OrderWorkflow, Outbound};
use crate::transport::{Channel, CloseKind, Inbound};

/// How a session ended without a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Workflow reached `Done` under the terminate policy
    Completed,
    /// Connection closed first
    Closed(CloseKind),
}

pub struct Dispatcher {
    table: CorrelationTable,
    policy: ErrorPolicy,
    workflow: OrderWorkflow,
    next_id: u64,
    request_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(config: &Config) -> Self {
        Self {
            table: CorrelationTable::new(),
            policy: ErrorPolicy::default(),
            workflow: OrderWorkflow::new(config),
            next_id: config.session.first_request_id,
            request_timeout: config.session.request_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn workflow(&self) -> &OrderWorkflow {
        &self.workflow
    }

    pub fn pending(&self) -> &CorrelationTable {
        &self.table
    }

    /// Drive the session until the workflow finishes, the channel closes,
    /// or a fatal error occurs.
    pub async fn run<C>(&mut self, channel: &mut C) -> Result<Outcome>
    where
        C: Channel + ?Sized,
    {
        let result = self.drive(channel).await;
        if let Err(e) = &result {
            error!("❌ session failed: {}", e);
            self.workflow.fail(e.to_string());
        }
        result
    }

    async fn drive<C>(&mut self, channel: &mut C) -> Result<Outcome>
    where
        C: Channel + ?Sized,
    {
        self.workflow.start()?;
        self.flush(channel).await?;

        loop {
            match self.next_inbound(channel).await? {
                Inbound::Text(text) => {
                    self.handle_frame(&text)?;
                    self.flush(channel).await?;
                    if self.workflow.is_finished() {
                        info!("🏁 workflow complete");
                        return Ok(Outcome::Completed);
                    }
                }
                Inbound::Closed(kind) => match self.policy.classify_close(kind) {
                    Classification::Ignorable => {
                        info!("{}", kind);
                        return Ok(Outcome::Closed(kind));
                    }
                    Classification::Fatal(e) => return Err(e),
                },
            }
        }
    }

    async fn next_inbound<C>(&mut self, channel: &mut C) -> Result<Inbound>
    where
        C: Channel + ?Sized,
    {
        match self.table.next_deadline() {
            None => channel.recv().await,
            Some((id, purpose, deadline)) => {
                match tokio::time::timeout_at(deadline, channel.recv()).await {
                    Ok(inbound) => inbound,
                    Err(_) => Err(Error::RequestTimeout { id, purpose: purpose.to_string() }),
                }
            }
        }
    }

    /// Classify and route one inbound frame.
    pub fn handle_frame(&mut self, text: &str) -> Result<()> {
        debug!("<= {}", text);

        match frame::decode(text)? {
            Frame::Response { id, reply } => {
                let purpose = self.table.resolve(id)?;
                match reply {
                    Reply::Result(result) => self.workflow.on_result(purpose, &result),
                    Reply::Error(err) => match self.policy.classify_response(purpose, &err) {
                        Classification::Ignorable => {
                            warn!("ignoring {} error: {}", purpose, err);
                            Ok(())
                        }
                        Classification::Fatal(e) => Err(e),
                    },
                }
            }
            Frame::Notification(Notification::BusinessMessageReject(reject)) => {
                match self.policy.classify_reject(&reject) {
                    Classification::Ignorable => {
                        self.workflow.on_business_reject(&reject);
                        Ok(())
                    }
                    Classification::Fatal(e) => Err(e),
                }
            }
            Frame::Notification(Notification::ExecutionReport(report)) => {
                self.workflow.on_execution_report(&report)
            }
        }
    }

    /// Send everything the workflow queued, allocating ids in order.
    async fn flush<C>(&mut self, channel: &mut C) -> Result<()>
    where
        C: Channel + ?Sized,
    {
        for Outbound { purpose, params } in self.workflow.take_outbound() {
            let id = self.next_id;
            let next = id
                .checked_add(1)
                .ok_or_else(|| Error::InvalidState(format!("request id space exhausted at {}", id)))?;
            self.send_request(channel, purpose, params, id).await?;
            self.next_id = next;
        }
        Ok(())
    }

    /// Register `id` and transmit. Fails with `DuplicateId` if `id` is outstanding.
    pub async fn send_request<C>(
        &mut self,
        channel: &mut C,
        purpose: Purpose,
        params: Params,
        id: u64,
    ) -> Result<()>
    where
        C: Channel + ?Sized,
    {
        let request = self.register(purpose, params, id)?;
        info!("=> {} id={}", request.method, id);
        let text = request.to_text()?;
        debug!("=> {}", text);
        channel.send(text).await
    }

    fn register(&mut self, purpose: Purpose, params: Params, id: u64) -> Result<Request> {
        match self.request_timeout {
            Some(timeout) if purpose.expects_response() => {
                self.table.register_with_deadline(id, purpose, Instant::now() + timeout)?
            }
            _ => self.table.register(id, purpose)?,
        }
        RequestBuilder::new()
            .build(purpose.method(), params, id)
            .inspect_err(|_| {
                let _ = self.table.resolve(id);
            })
    }
}
