//! Transfer request gateway
//!
//! Decodes an inbound request, runs the engine and maps the outcome to a
//! response. The sender identity arrives already authenticated; this layer
//! never checks credentials.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::domain::TransferRecord;
use crate::services::logging::LoggingService;
use crate::services::transfer::{CancelToken, TransferEngine};

/// Raw amount as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Text(String),
    Number(serde_json::Number),
}

impl RawAmount {
    fn to_decimal(&self) -> Result<Decimal> {
        let text = match self {
            RawAmount::Text(text) => text.trim().to_string(),
            RawAmount::Number(number) => number.to_string(),
        };
        Decimal::from_str_exact(&text)
            .map_err(|_| Error::InvalidAmount(format!("'{}' is not a number", text)))
    }
}

impl From<&str> for RawAmount {
    fn from(text: &str) -> Self {
        RawAmount::Text(text.to_string())
    }
}

impl From<Decimal> for RawAmount {
    fn from(value: Decimal) -> Self {
        RawAmount::Text(value.to_string())
    }
}

/// Inbound transfer request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[serde(alias = "sender_email")]
    pub sender_identity: String,
    pub amount: RawAmount,
    #[serde(alias = "upi_id")]
    pub recipient_handle: String,
    #[serde(default, alias = "receiver_name", skip_serializing_if = "Option::is_none")]
    pub recipient_display_name: Option<String>,
}

impl TransferRequest {
    pub fn new(
        sender_identity: impl Into<String>,
        amount: impl Into<RawAmount>,
        recipient_handle: impl Into<String>,
    ) -> Self {
        Self {
            sender_identity: sender_identity.into(),
            amount: amount.into(),
            recipient_handle: recipient_handle.into(),
            recipient_display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.recipient_display_name = Some(name.into());
        self
    }

    /// Decode a JSON body; malformed bodies are client errors
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map_err(|e| Error::invalid_request(format!("malformed transfer request: {}", e)))
    }
}

/// Which side of the exchange caused a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Ok,
    ClientError,
    ServerError,
}

/// Outcome returned to the requester
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub category: StatusCategory,
    #[serde(skip)]
    pub retryable: bool,
    #[serde(skip)]
    status: u16,
    /// The committed record, for callers that want more than the wire shape
    #[serde(skip)]
    pub record: Option<TransferRecord>,
}

impl TransferResponse {
    fn succeeded(record: TransferRecord) -> Self {
        Self {
            success: true,
            message: Some("Payment Successful".to_string()),
            error: None,
            category: StatusCategory::Ok,
            retryable: false,
            status: 200,
            record: Some(record),
        }
    }

    pub fn from_error(error: &Error) -> Self {
        let status = match error {
            Error::InvalidAmount(_)
            | Error::InvalidRequest(_)
            | Error::InsufficientFunds { .. }
            | Error::AccountExists(_) => 400,
            Error::AccountNotFound(_) => 404,
            Error::Contention(_) => 503,
            _ => 500,
        };
        let category = if error.is_client_error() {
            StatusCategory::ClientError
        } else {
            StatusCategory::ServerError
        };

        Self {
            success: false,
            message: None,
            error: Some(error.user_message()),
            category,
            retryable: error.is_retryable(),
            status,
            record: None,
        }
    }

    /// HTTP status code equivalent of this response
    pub fn http_status(&self) -> u16 {
        self.status
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"error":"Payment could not be processed"}"#.to_string()
        })
    }
}

/// Front door for transfer requests
#[derive(Clone)]
pub struct TransferGateway {
    engine: Arc<TransferEngine>,
    events: Option<Arc<LoggingService>>,
}

impl TransferGateway {
    pub fn new(engine: Arc<TransferEngine>) -> Self {
        Self {
            engine,
            events: None,
        }
    }

    /// Record every outcome in the event log
    pub fn with_event_log(mut self, events: Arc<LoggingService>) -> Self {
        self.events = Some(events);
        self
    }

    /// Process a request on the calling thread
    pub fn handle(&self, request: TransferRequest) -> TransferResponse {
        self.handle_with_cancel(request, &CancelToken::new())
    }

    /// Decode and process a raw JSON body
    pub fn handle_json(&self, body: &str) -> TransferResponse {
        match TransferRequest::from_json(body) {
            Ok(request) => self.handle(request),
            Err(e) => self.respond(Err(e)),
        }
    }

    /// Process a request on a blocking worker
    ///
    /// Dropping the returned future before it completes cancels the transfer;
    /// it either commits before noticing or rolls back in full.
    pub async fn submit(&self, request: TransferRequest) -> TransferResponse {
        let cancel = CancelToken::new();
        let abandon = cancel.cancel_on_drop();

        let gateway = self.clone();
        let token = cancel.clone();
        let joined =
            tokio::task::spawn_blocking(move || gateway.handle_with_cancel(request, &token)).await;
        abandon.disarm();

        match joined {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "transfer worker failed");
                TransferResponse::from_error(&Error::storage(format!(
                    "transfer worker failed: {}",
                    e
                )))
            }
        }
    }

    fn handle_with_cancel(
        &self,
        request: TransferRequest,
        cancel: &CancelToken,
    ) -> TransferResponse {
        let outcome = self.execute(&request, cancel);
        self.respond(outcome)
    }

    fn execute(&self, request: &TransferRequest, cancel: &CancelToken) -> Result<TransferRecord> {
        let sender = request.sender_identity.trim();
        if sender.is_empty() {
            return Err(Error::invalid_request("sender identity is required"));
        }
        let handle = request.recipient_handle.trim();
        if handle.is_empty() {
            return Err(Error::invalid_request("recipient handle is required"));
        }
        let amount = request.amount.to_decimal()?;
        let display_name = request
            .recipient_display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(handle);

        self.engine
            .transfer_with_cancel(sender, amount, handle, display_name, cancel)
    }

    fn respond(&self, outcome: Result<TransferRecord>) -> TransferResponse {
        let response = match &outcome {
            Ok(record) => TransferResponse::succeeded(record.clone()),
            Err(e) => TransferResponse::from_error(e),
        };

        match &outcome {
            Ok(_) => {}
            Err(e) if e.is_client_error() => {
                tracing::debug!(kind = e.kind().as_str(), "transfer rejected");
            }
            Err(e) => {
                tracing::warn!(kind = e.kind().as_str(), error = %e, "transfer failed");
            }
        }

        if let Some(events) = &self.events {
            let failure = outcome.as_ref().err().map(Error::kind);
            if let Err(e) = events.log_transfer(failure) {
                tracing::debug!(error = %e, "could not write event log");
            }
        }

        response
    }
}
