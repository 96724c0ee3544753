//! HTML rendering of stored forms.
//!
//! Templates use `{{name}}` placeholders, substituted in a single pass so a
//! value containing `{{...}}` is never expanded again. Supplied placeholders:
//!
//! - `data`: the stored form as compact JSON, embedded as a JavaScript string
//!   literal for `JSON.parse`
//! - `url`: absolute submission URL
//! - `formID`: the form identifier
//! - `clientXToken`: the static pseudo-token
//!
//! `clientXToken` is a fixed placeholder value. Nothing verifies it on
//! submission; it is not a credential.

use std::path::PathBuf;

use crate::error::RenderError;
use crate::form::FormId;

/// Value embedded as `clientXToken` in every rendered form.
pub const PLACEHOLDER_TOKEN: &str = "x.y.z";

/// Seconds the post-submit page waits before redirecting.
pub const REDIRECT_DELAY_SECS: u32 = 3;

const BUILTIN_TEMPLATE: &str = include_str!("../templates/form.html");

/// Where the form template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// The template compiled into the binary.
    Builtin,
    /// A file, re-read on every render so edits apply without a restart.
    File(PathBuf),
}

/// Everything substituted into the template for one form.
#[derive(Debug, Clone, Copy)]
pub struct FormPage<'a> {
    pub form_id: &'a FormId,
    pub form: &'a serde_json::Value,
    pub submit_url: &'a str,
    pub token: &'a str,
}

/// Renders stored forms into HTML documents.
#[derive(Debug, Clone)]
pub struct FormRenderer {
    source: TemplateSource,
}

impl FormRenderer {
    #[must_use]
    pub fn new(source: TemplateSource) -> Self {
        Self { source }
    }

    /// Render `page` into a complete HTML document.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if the template cannot be loaded, references
    /// an unknown placeholder, or the payload cannot be encoded.
    pub async fn render(&self, page: &FormPage<'_>) -> Result<String, RenderError> {
        let template = match &self.source {
            TemplateSource::Builtin => std::borrow::Cow::Borrowed(BUILTIN_TEMPLATE),
            TemplateSource::File(path) => std::borrow::Cow::Owned(
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| RenderError::TemplateLoad {
                        path: path.clone(),
                        source,
                    })?,
            ),
        };

        let json = serde_json::to_string(page.form).map_err(RenderError::Encode)?;
        let data = js_string_literal(&json)?;
        let url = escape_html(page.submit_url);
        let form_id = escape_html(page.form_id.as_str());
        let token = escape_html(page.token);

        substitute(&template, |name| match name {
            "data" => Some(data.as_str()),
            "url" => Some(url.as_str()),
            "formID" => Some(form_id.as_str()),
            "clientXToken" => Some(token.as_str()),
            _ => None,
        })
    }
}

/// Absolute URL the rendered form posts to.
#[must_use]
pub fn submit_url(domain: &str, id: &FormId) -> String {
    format!("{}/api/submit-form/{id}", domain.trim_end_matches('/'))
}

/// Minimal page that sends the browser back to `referrer` after a short
/// delay.
#[must_use]
pub fn redirect_page(referrer: &str) -> String {
    format!(
        "<meta http-equiv=\"refresh\" content=\"{REDIRECT_DELAY_SECS};url={}\" />\n\
         <h1>Form submitted successfully, you will redirect previous page in {REDIRECT_DELAY_SECS} seconds</h1>\n",
        escape_html(referrer)
    )
}

/// Replace every `{{name}}` in `template` using `lookup`.
fn substitute<'v>(
    template: &str,
    lookup: impl Fn(&str) -> Option<&'v str>,
) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            return Err(RenderError::UnterminatedPlaceholder {
                offset: offset + start,
            });
        };
        let name = after_open[..end].trim();
        let value = lookup(name).ok_or_else(|| RenderError::UnknownPlaceholder {
            name: name.to_owned(),
        })?;
        out.push_str(value);

        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Encode `s` as a double-quoted JavaScript string literal that is safe
/// inside a `<script>` element.
fn js_string_literal(s: &str) -> Result<String, RenderError> {
    let quoted = serde_json::to_string(s).map_err(RenderError::Encode)?;
    Ok(quoted.replace('<', "\\u003c"))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c if c.is_control() && c != '\n' && c != '\t' => {
                out.push_str(&format!("&#{};", u32::from(c)));
            }
            c => out.push(c),
        }
    }
    out
}
