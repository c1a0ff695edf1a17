//! Mail transport: the `Mailer` capability and its SMTP and file backends.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment as MimeAttachment, Mailbox, MultiPart},
    transport::{
        file::AsyncFileTransport,
        smtp::{
            authentication::Credentials,
            client::{Tls, TlsParameters, TlsVersion},
        },
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    config::{RelayConfig, SmtpConfig, SmtpSecurity, TlsPolicy, TransportKind},
    email::OutboundMessage,
};

const OCTET_STREAM: &str = "application/octet-stream";

/// The single failure kind of the transport layer. Network, authentication
/// and protocol failures are not told apart.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("message build error: {0}")]
    Build(String),
    #[error("send failed: {0}")]
    Send(String),
}

/// Something that can deliver a composed message.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn deliver(&self, message: OutboundMessage) -> Result<(), TransportError>;
}

/// Build the transport selected at runtime (SMTP for prod, file for local dev).
pub fn build_mailer(config: &RelayConfig) -> Result<Arc<dyn Mailer>, TransportError> {
    match config.transport {
        TransportKind::Smtp => {
            info!(
                host = %config.smtp.host,
                port = config.smtp.port,
                pooled = config.smtp.pool,
                "Using SMTP transport"
            );
            Ok(Arc::new(SmtpMailer::new(config.smtp.clone())?))
        }
        TransportKind::File => {
            info!(dir = %config.outbox_dir.display(), "Using file transport");
            Ok(Arc::new(FileMailer::new(config.outbox_dir.clone())?))
        }
    }
}

/// SMTP delivery. Either opens one session per message or keeps a pooled
/// transport shared by every request.
pub struct SmtpMailer {
    settings: SmtpConfig,
    pooled: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpMailer {
    pub fn new(settings: SmtpConfig) -> Result<Self, TransportError> {
        let pooled = if settings.pool {
            Some(smtp_transport(&settings)?)
        } else {
            None
        };
        Ok(Self { settings, pooled })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, message: OutboundMessage) -> Result<(), TransportError> {
        let email = to_mime(&message)?;
        let response = match &self.pooled {
            Some(transport) => transport.send(email).await,
            None => smtp_transport(&self.settings)?.send(email).await,
        }
        .map_err(|e| TransportError::Send(e.to_string()))?;
        debug!(code = %response.code(), "relay accepted message");
        Ok(())
    }
}

/// Build an SMTP transport. `SMTP_SECURE` picks implicit TLS, otherwise
/// STARTTLS is used when the relay offers it.
fn smtp_transport(cfg: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, TransportError> {
    let mut params = TlsParameters::builder(cfg.host.clone());
    if cfg.tls_policy == TlsPolicy::Legacy {
        params = params.set_min_tls_version(TlsVersion::Tlsv10);
    }
    let params = params
        .build()
        .map_err(|e| TransportError::Send(format!("tls setup: {e}")))?;

    let tls = match cfg.security {
        SmtpSecurity::Implicit => Tls::Wrapper(params),
        SmtpSecurity::Opportunistic => Tls::Opportunistic(params),
    };

    let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.host)
        .port(cfg.port)
        .tls(tls);
    if !cfg.user.is_empty() {
        builder = builder.credentials(Credentials::new(cfg.user.clone(), cfg.password.clone()));
    }
    if let Some(timeout) = cfg.timeout {
        builder = builder.timeout(Some(timeout));
    }
    Ok(builder.build())
}

/// Writes `.eml` files, used for local/dev.
pub struct FileMailer {
    transport: AsyncFileTransport<Tokio1Executor>,
}

impl FileMailer {
    pub fn new(dir: PathBuf) -> Result<Self, TransportError> {
        std::fs::create_dir_all(&dir)
            .map_err(|e| TransportError::Send(format!("creating {}: {e}", dir.display())))?;
        Ok(Self {
            transport: AsyncFileTransport::new(dir),
        })
    }
}

#[async_trait]
impl Mailer for FileMailer {
    async fn deliver(&self, message: OutboundMessage) -> Result<(), TransportError> {
        let email = to_mime(&message)?;
        let id = self
            .transport
            .send(email)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        debug!(%id, "message written to outbox");
        Ok(())
    }
}

/// Build the MIME message: `multipart/alternative` (text + html), wrapped in
/// `multipart/mixed` when there are attachments.
pub(crate) fn to_mime(message: &OutboundMessage) -> Result<Message, TransportError> {
    let from: Mailbox = message
        .from
        .parse()
        .map_err(|e| TransportError::Build(format!("invalid from address: {e}")))?;
    let to: Mailbox = message
        .to
        .parse()
        .map_err(|e| TransportError::Build(format!("invalid recipient: {e}")))?;

    let mut builder = Message::builder()
        .from(from)
        .to(to)
        .subject(message.subject.clone());

    // The reply-to comes straight from the form; a bad one is dropped, not fatal.
    if let Some(reply_to) = message.reply_to.as_deref() {
        match reply_to.parse::<Mailbox>() {
            Ok(mailbox) => builder = builder.reply_to(mailbox),
            Err(e) => warn!(%reply_to, error = %e, "dropping unparseable Reply-To"),
        }
    }

    let body = MultiPart::alternative_plain_html(
        strip_html::strip(&message.html_body),
        message.html_body.clone(),
    );

    let email = if message.attachments.is_empty() {
        builder.multipart(body)
    } else {
        let mut mixed = MultiPart::mixed().multipart(body);
        for a in &message.attachments {
            let content_type = a
                .content_type
                .as_deref()
                .and_then(|ct| ContentType::parse(ct).ok())
                .map_or_else(|| ContentType::parse(OCTET_STREAM), Ok)
                .map_err(|e| TransportError::Build(format!("content type of {}: {e}", a.filename)))?;
            mixed = mixed.singlepart(
                MimeAttachment::new(a.filename.clone()).body(a.content.to_vec(), content_type),
            );
        }
        builder.multipart(mixed)
    };

    email.map_err(|e| TransportError::Build(e.to_string()))
}

/// Tiny best-effort HTML→plaintext stripper for the text alternative.
mod strip_html {
    pub fn strip(html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut in_tag = false;
        for c in html.chars() {
            match c {
                '<' => in_tag = true,
                '>' => in_tag = false,
                _ if !in_tag => out.push(c),
                _ => {}
            }
        }
        let text = out
            .replace("&nbsp;", " ")
            .replace("&copy;", "©")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#x27;", "'")
            .replace("&amp;", "&");
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::email::Attachment;
    use bytes::Bytes;

    /// Accepts everything, keeps nothing.
    pub(crate) struct NullMailer;

    #[async_trait]
    impl Mailer for NullMailer {
        async fn deliver(&self, _message: OutboundMessage) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn message(reply_to: Option<&str>, attachments: Vec<Attachment>) -> OutboundMessage {
        OutboundMessage {
            from: "sales@acme.test".into(),
            reply_to: reply_to.map(String::from),
            to: "sales@acme.test".into(),
            subject: "Quote Request from Globex".into(),
            html_body: "<p>Hello &amp; welcome</p>".into(),
            attachments,
        }
    }

    fn formatted(m: &OutboundMessage) -> String {
        String::from_utf8(to_mime(m).unwrap().formatted()).unwrap()
    }

    #[test]
    fn builds_headers() {
        let raw = formatted(&message(Some("hank@globex.test"), vec![]));
        assert!(raw.contains("From: sales@acme.test"));
        assert!(raw.contains("To: sales@acme.test"));
        assert!(raw.contains("Reply-To: hank@globex.test"));
        assert!(raw.contains("Subject: Quote Request from Globex"));
        assert!(raw.contains("multipart/alternative"));
        assert!(!raw.contains("multipart/mixed"));
    }

    #[test]
    fn invalid_reply_to_is_dropped() {
        let raw = formatted(&message(Some("not an address"), vec![]));
        assert!(!raw.contains("Reply-To"));
    }

    #[test]
    fn invalid_company_address_fails_to_build() {
        let mut m = message(None, vec![]);
        m.from = "nope".into();
        assert!(matches!(to_mime(&m), Err(TransportError::Build(_))));
    }

    #[test]
    fn attachments_become_mixed_parts() {
        let raw = formatted(&message(
            None,
            vec![
                Attachment {
                    filename: "a.txt".into(),
                    content: Bytes::from_static(b"first"),
                    content_type: Some("text/plain".into()),
                },
                Attachment {
                    filename: "b.bin".into(),
                    content: Bytes::from_static(b"second"),
                    content_type: Some("definitely not a mime type".into()),
                },
            ],
        ));

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("a.txt"));
        assert!(raw.contains("b.bin"));
        assert!(raw.contains("application/octet-stream"));
        assert!(raw.find("a.txt").unwrap() < raw.find("b.bin").unwrap());
    }

    #[test]
    fn strips_markup_for_text_part() {
        let text = strip_html::strip("<div>\n  <p>Hi &amp; bye</p>\n\n  <p>&copy; 2026 Acme</p>\n</div>");
        assert_eq!(text, "Hi & bye\n© 2026 Acme");
    }

    #[tokio::test]
    async fn file_mailer_writes_eml() {
        let dir = std::env::temp_dir().join(format!("quote-relay-outbox-{}", std::process::id()));
        let mailer = FileMailer::new(dir.clone()).unwrap();

        mailer.deliver(message(None, vec![])).await.unwrap();

        let written = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(Result::ok)
            .any(|e| e.path().extension().is_some_and(|x| x == "eml"));
        std::fs::remove_dir_all(&dir).ok();
        assert!(written);
    }
}
