//! Outbound delivery ports: webhook POSTs and LINE push messages.

use std::future::Future;

use mims_domain::error::DeliveryError;

/// A signed webhook request ready to send.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub url: String,
    /// Value for the `X-Webhook-Event` header.
    pub event: String,
    /// Value for the `X-Webhook-Delivery` header.
    pub delivery_id: String,
    /// Value for the `X-Webhook-Signature` header.
    pub signature: String,
    pub body: Vec<u8>,
}

/// Sends webhook requests over HTTP.
pub trait WebhookSender {
    /// POST the request, returning the HTTP status on a 2xx answer.
    ///
    /// Non-2xx answers are reported as [`DeliveryError::Status`].
    fn send(
        &self,
        request: WebhookRequest,
    ) -> impl Future<Output = Result<u16, DeliveryError>> + Send;
}

/// Pushes text messages through the LINE Messaging API.
pub trait LineMessenger {
    fn push_text(
        &self,
        access_token: &str,
        target: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}
