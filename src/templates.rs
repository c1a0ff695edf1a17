//! HTML rendering of relayed submissions.
//!
//! Both templates share the `base` layout partial (header, footer with the
//! copyright year). Built-in templates are compiled into the binary; a
//! `TEMPLATES_DIR` can override any of `base.hbs`, `quote.hbs`, `contact.hbs`.

use std::path::Path;

use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    config::RelayConfig,
    email::{present, ContactMessage, QuoteRequest},
};

const BASE: &str = include_str!("templates/base.hbs");
const QUOTE: &str = include_str!("templates/quote.hbs");
const CONTACT: &str = include_str!("templates/contact.hbs");

/// Shown in place of an absent or empty field.
pub const PLACEHOLDER: &str = "N/A";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(#[from] handlebars::TemplateError),
    #[error("render error: {0}")]
    Render(#[from] handlebars::RenderError),
    #[error("reading template {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Serialize)]
struct Layout<'a> {
    title: String,
    origin: &'static str,
    company_name: &'a str,
    year: i32,
}

#[derive(Serialize)]
struct QuoteView<'a> {
    #[serde(flatten)]
    layout: Layout<'a>,
    company: &'a str,
    email: &'a str,
    project: &'a str,
    quantity: &'a str,
    deadline: &'a str,
}

#[derive(Serialize)]
struct ContactView<'a> {
    #[serde(flatten)]
    layout: Layout<'a>,
    name: &'a str,
    email: &'a str,
    message: &'a str,
}

/// Pure `fields -> html` renderer. No I/O after construction.
#[derive(Clone)]
pub struct Renderer {
    registry: Handlebars<'static>,
    company_name: String,
}

impl Renderer {
    pub fn new(config: &RelayConfig) -> Result<Self, RenderError> {
        let mut reg = Handlebars::new();
        reg.set_strict_mode(true);
        reg.set_prevent_indent(true);
        if !config.escape_html {
            reg.register_escape_fn(handlebars::no_escape);
        }

        let dir = config.templates_dir.as_deref();
        reg.register_partial("base", load(dir, "base", BASE)?)?;
        reg.register_template_string("quote", load(dir, "quote", QUOTE)?)?;
        reg.register_template_string("contact", load(dir, "contact", CONTACT)?)?;

        Ok(Self {
            registry: reg,
            company_name: config.company_name.clone(),
        })
    }

    pub fn render_quote(&self, q: &QuoteRequest) -> Result<String, RenderError> {
        let view = QuoteView {
            layout: self.layout(self.company_name.clone(), "quote form"),
            company: or_placeholder(&q.company),
            email: or_placeholder(&q.email),
            project: or_placeholder(&q.project),
            quantity: or_placeholder(&q.quantity),
            deadline: or_placeholder(&q.deadline),
        };
        Ok(self.registry.render("quote", &view)?)
    }

    pub fn render_contact(&self, m: &ContactMessage) -> Result<String, RenderError> {
        let view = ContactView {
            layout: self.layout(format!("{} Contact Form", self.company_name), "contact form"),
            name: or_placeholder(&m.name),
            email: or_placeholder(&m.email),
            message: or_placeholder(&m.message),
        };
        Ok(self.registry.render("contact", &view)?)
    }

    fn layout(&self, title: String, origin: &'static str) -> Layout<'_> {
        Layout {
            title,
            origin,
            company_name: &self.company_name,
            year: time::OffsetDateTime::now_utc().year(),
        }
    }
}

fn or_placeholder(value: &Option<String>) -> &str {
    present(value).unwrap_or(PLACEHOLDER)
}

/// Read `<dir>/<name>.hbs` when it exists, otherwise use the built-in source.
fn load(dir: Option<&Path>, name: &str, builtin: &'static str) -> Result<String, RenderError> {
    let Some(path) = dir.map(|d| d.join(format!("{name}.hbs"))) else {
        return Ok(builtin.to_string());
    };
    if !path.exists() {
        return Ok(builtin.to_string());
    }
    debug!("Loading template override: {}", path.display());
    std::fs::read_to_string(&path).map_err(|source| RenderError::Io {
        path: path.display().to_string(),
        source,
    })
}
