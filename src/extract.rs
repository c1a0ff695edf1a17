//! Request body extraction for both form endpoints.
//!
//! Accepts `multipart/form-data`, JSON objects and urlencoded forms. Files are
//! only accepted in multipart bodies, under the [`ATTACHMENT_FIELD`] name; a
//! file under any other name fails the request. Files are held in memory and
//! the router's body limit is the only size cap.

use std::collections::HashMap;

use axum::{
    extract::{FromRequest, Multipart, Request},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::{email::Attachment, routes::Reply};

/// Multipart field name carrying uploaded files.
pub const ATTACHMENT_FIELD: &str = "attachment";

/// The body could not be read. Reported to the caller as a plain send failure.
#[derive(Debug, Error)]
#[error("malformed request body: {0}")]
pub struct ExtractError(String);

impl IntoResponse for ExtractError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(Reply::failed())).into_response()
    }
}

/// Named string fields plus uploaded files, in submission order.
/// Missing fields are simply absent.
#[derive(Debug, Default)]
pub struct Submission {
    pub fields: HashMap<String, String>,
    pub attachments: Vec<Attachment>,
}

impl Submission {
    pub fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ExtractError> {
        let mut out = Submission::default();
        while let Some(field) = multipart.next_field().await.map_err(reject)? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_owned) {
                // A file input left blank still sends a part with an empty filename.
                Some(filename) if filename.is_empty() => {
                    debug!(field = %name, "skipping empty file part");
                }
                Some(filename) if name == ATTACHMENT_FIELD => {
                    let content_type = field.content_type().map(str::to_owned);
                    let content = field.bytes().await.map_err(reject)?;
                    debug!(%filename, size = content.len(), "received attachment");
                    out.attachments.push(Attachment {
                        filename,
                        content,
                        content_type,
                    });
                }
                Some(filename) => {
                    return Err(ExtractError(format!(
                        "unexpected file {filename:?} in field {name:?}"
                    )));
                }
                None => {
                    let value = field.text().await.map_err(reject)?;
                    out.fields.insert(name, value);
                }
            }
        }
        Ok(out)
    }

    /// Strings are taken as-is, `null` means absent, other scalars and nested
    /// values are kept as their JSON text. A non-object body has no fields.
    fn from_json(value: Value) -> Self {
        let Value::Object(map) = value else {
            return Submission::default();
        };
        let fields = map
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::Null => None,
                Value::String(s) => Some((k, s)),
                other => Some((k, other.to_string())),
            })
            .collect();
        Submission {
            fields,
            attachments: Vec::new(),
        }
    }
}

impl<S> FromRequest<S> for Submission
where
    S: Send + Sync,
{
    type Rejection = ExtractError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state).await.map_err(reject)?;
            Self::from_multipart(multipart).await
        } else if content_type.starts_with("application/json") {
            let Json(value) = Json::<Value>::from_request(req, state).await.map_err(reject)?;
            Ok(Self::from_json(value))
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(reject)?;
            Ok(Submission {
                fields: pairs.into_iter().collect(),
                attachments: Vec::new(),
            })
        } else {
            debug!(%content_type, "no parseable body, treating all fields as absent");
            Ok(Submission::default())
        }
    }
}

fn reject(e: impl std::fmt::Display) -> ExtractError {
    ExtractError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    async fn extract(content_type: Option<&str>, body: impl Into<Body>) -> Result<Submission, ExtractError> {
        let mut builder = axum::http::Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        Submission::from_request(builder.body(body.into()).unwrap(), &()).await
    }

    #[tokio::test]
    async fn json_scalars_become_strings() {
        let mut s = extract(
            Some("application/json"),
            r#"{"company":"Globex","quantity":12,"urgent":true,"deadline":null}"#,
        )
        .await
        .unwrap();

        assert_eq!(s.take("company").as_deref(), Some("Globex"));
        assert_eq!(s.take("quantity").as_deref(), Some("12"));
        assert_eq!(s.take("urgent").as_deref(), Some("true"));
        assert_eq!(s.take("deadline"), None);
    }

    #[tokio::test]
    async fn json_array_has_no_fields() {
        let s = extract(Some("application/json"), "[1,2]").await.unwrap();
        assert!(s.fields.is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        assert!(extract(Some("application/json"), "{nope").await.is_err());
    }

    #[tokio::test]
    async fn urlencoded_form_is_read() {
        let mut s = extract(
            Some("application/x-www-form-urlencoded"),
            "name=Ned+Flanders&message=hi%21",
        )
        .await
        .unwrap();
        assert_eq!(s.take("name").as_deref(), Some("Ned Flanders"));
        assert_eq!(s.take("message").as_deref(), Some("hi!"));
    }

    #[tokio::test]
    async fn missing_content_type_yields_empty_submission() {
        let s = extract(None, "whatever").await.unwrap();
        assert!(s.fields.is_empty());
        assert!(s.attachments.is_empty());
    }

    #[tokio::test]
    async fn multipart_collects_attachment_files() {
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"company\"\r\n\r\n",
            "Globex\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"attachment\"; filename=\"bolts.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "bolts\r\n",
            "--XBOUNDARY--\r\n",
        );
        let mut s = extract(Some("multipart/form-data; boundary=XBOUNDARY"), body)
            .await
            .unwrap();

        assert_eq!(s.take("company").as_deref(), Some("Globex"));
        assert_eq!(s.attachments.len(), 1);
        assert_eq!(s.attachments[0].filename, "bolts.txt");
        assert_eq!(&s.attachments[0].content[..], b"bolts");
        assert_eq!(s.attachments[0].content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn blank_file_input_adds_no_attachment() {
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"company\"\r\n\r\n",
            "Globex\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"attachment\"; filename=\"\"\r\n",
            "Content-Type: application/octet-stream\r\n\r\n",
            "\r\n",
            "--XBOUNDARY--\r\n",
        );
        let mut s = extract(Some("multipart/form-data; boundary=XBOUNDARY"), body)
            .await
            .unwrap();

        assert_eq!(s.take("company").as_deref(), Some("Globex"));
        assert!(s.attachments.is_empty());
    }

    #[tokio::test]
    async fn file_outside_attachment_field_is_rejected() {
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"attachment\"; filename=\"bolts.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "bolts\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"files\"; filename=\"drawing.pdf\"\r\n",
            "Content-Type: application/pdf\r\n\r\n",
            "pdf\r\n",
            "--XBOUNDARY--\r\n",
        );
        let result = extract(Some("multipart/form-data; boundary=XBOUNDARY"), body).await;
        assert!(result.is_err());
    }
}
