//! Submission types, outbound message composition and shared app state.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use crate::{
    config::RelayConfig,
    extract::{ExtractError, Submission},
    mailer::{self, Mailer, TransportError},
    templates::{RenderError, Renderer},
};

/// Subject of every relayed contact message.
pub const CONTACT_SUBJECT: &str = "New Contact Message from Website";

/// A file uploaded with a quote request, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Bytes,
    /// MIME type declared by the client, if any.
    pub content_type: Option<String>,
}

/// Quote form submission. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct QuoteRequest {
    pub company: Option<String>,
    pub email: Option<String>,
    pub project: Option<String>,
    pub quantity: Option<String>,
    pub deadline: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl QuoteRequest {
    /// `Quote Request from <company | email | Unknown>`, first non-empty wins.
    pub fn subject(&self) -> String {
        let who = present(&self.company)
            .or_else(|| present(&self.email))
            .unwrap_or("Unknown");
        format!("Quote Request from {who}")
    }
}

impl From<Submission> for QuoteRequest {
    fn from(mut s: Submission) -> Self {
        QuoteRequest {
            company: s.take("company"),
            email: s.take("email"),
            project: s.take("project"),
            quantity: s.take("quantity"),
            deadline: s.take("deadline"),
            attachments: s.attachments,
        }
    }
}

/// Contact form submission.
#[derive(Debug, Clone, Default)]
pub struct ContactMessage {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
}

impl From<Submission> for ContactMessage {
    fn from(mut s: Submission) -> Self {
        if !s.attachments.is_empty() {
            debug!(count = s.attachments.len(), "contact form carries no attachments, dropping");
        }
        ContactMessage {
            name: s.take("name"),
            email: s.take("email"),
            message: s.take("message"),
        }
    }
}

/// A fully composed email, handed to a [`Mailer`] and not reused.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub from: String,
    /// Caller-supplied address. Not validated here.
    pub reply_to: Option<String>,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
}

/// Everything that can go wrong between receiving a submission and the relay
/// accepting it. Callers only ever see a generic failure.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Read-only state shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub company_email: String,
    pub renderer: Renderer,
    pub mailer: Arc<dyn Mailer>,
    pub max_body_bytes: usize,
}

impl AppState {
    /// Build state around an already constructed mailer.
    pub fn new(config: &RelayConfig, mailer: Arc<dyn Mailer>) -> Result<Self, RenderError> {
        Ok(Self {
            company_email: config.company_email.clone(),
            renderer: Renderer::new(config)?,
            mailer,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Build state with the transport selected by `MAIL_TRANSPORT`.
    pub fn from_config(config: &RelayConfig) -> Result<Self, anyhow::Error> {
        let mailer = mailer::build_mailer(config)?;
        Ok(Self::new(config, mailer)?)
    }

    pub fn compose_quote(&self, request: QuoteRequest) -> Result<OutboundMessage, RelayError> {
        let html_body = self.renderer.render_quote(&request)?;
        Ok(OutboundMessage {
            from: self.company_email.clone(),
            reply_to: present(&request.email).map(str::to_owned),
            to: self.company_email.clone(),
            subject: request.subject(),
            html_body,
            attachments: request.attachments,
        })
    }

    pub fn compose_contact(&self, message: ContactMessage) -> Result<OutboundMessage, RelayError> {
        let html_body = self.renderer.render_contact(&message)?;
        Ok(OutboundMessage {
            from: self.company_email.clone(),
            reply_to: present(&message.email).map(str::to_owned),
            to: self.company_email.clone(),
            subject: CONTACT_SUBJECT.to_string(),
            html_body,
            attachments: Vec::new(),
        })
    }

    /// Compose and deliver a quote request as one SMTP submission.
    pub async fn relay_quote(&self, request: QuoteRequest) -> Result<(), RelayError> {
        let message = self.compose_quote(request)?;
        debug!(subject = %message.subject, attachments = message.attachments.len(), "delivering quote request");
        self.mailer.deliver(message).await?;
        Ok(())
    }

    pub async fn relay_contact(&self, message: ContactMessage) -> Result<(), RelayError> {
        let message = self.compose_contact(message)?;
        debug!(subject = %message.subject, "delivering contact message");
        self.mailer.deliver(message).await?;
        Ok(())
    }
}

/// `Some` only for a non-empty value.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
