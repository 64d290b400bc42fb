//! Consent interstitial handling and crumb body rules.

use std::sync::LazyLock;

use regex::Regex;

static INPUT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<input\b[^>]*>").expect("static regex"));
static NAME_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bname\s*=\s*["']([^"']*)["']"#).expect("static regex"));
static VALUE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bvalue\s*=\s*["']([^"']*)["']"#).expect("static regex"));

/// Hidden fields scraped from the consent page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentForm {
    /// `csrfToken` input value.
    pub csrf_token: String,
    /// `sessionId` input value.
    pub session_id: String,
}

fn hidden_field(html: &str, field: &str) -> Option<String> {
    INPUT_TAG.find_iter(html).find_map(|tag| {
        let tag = tag.as_str();
        let name = NAME_ATTR.captures(tag)?.get(1)?.as_str();
        if name != field {
            return None;
        }
        Some(VALUE_ATTR.captures(tag)?.get(1)?.as_str().to_string())
    })
}

/// Extract `csrfToken` and `sessionId`; `None` unless both are present and non-empty.
#[must_use]
pub fn parse_consent_form(html: &str) -> Option<ConsentForm> {
    let csrf_token = hidden_field(html, "csrfToken").filter(|v| !v.is_empty())?;
    let session_id = hidden_field(html, "sessionId").filter(|v| !v.is_empty())?;
    Some(ConsentForm {
        csrf_token,
        session_id,
    })
}

/// Form body accepting consent, in the order the page itself submits it.
#[must_use]
pub fn consent_fields(form: &ConsentForm, original_done_url: &str) -> Vec<(String, String)> {
    vec![
        ("agree".into(), "agree".into()),
        ("consentUUID".into(), "default".into()),
        ("sessionId".into(), form.session_id.clone()),
        ("csrfToken".into(), form.csrf_token.clone()),
        ("originalDoneUrl".into(), original_done_url.into()),
        ("namespace".into(), "yahoo".into()),
    ]
}

/// The crumb endpoint answers with the token as plain text; anything that looks
/// like an HTML page (or nothing at all) means no token was issued.
#[must_use]
pub fn crumb_from_body(body: &str) -> Option<String> {
    let crumb = body.trim();
    if crumb.is_empty() || crumb.starts_with('<') || crumb.to_ascii_lowercase().contains("<html") {
        return None;
    }
    Some(crumb.to_string())
}
