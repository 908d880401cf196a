/// Request and response shapes handled by the relay.
///
/// The browser sends loosely typed JSON, so the incoming fields are kept as [`serde_json::Value`]
/// and interpreted with the same truthiness rules the UI was written against.
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_SEARCH_LIMIT: i64 = 15;
pub const MAX_SEARCH_LIMIT: i64 = 100;

/// Multipart field carrying the PDF, both inbound and towards the backend.
pub const PDF_FIELD: &str = "pdfFile";
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Body of `POST /search`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Value,
    #[serde(default)]
    pub limit: Value,
    #[serde(default, rename = "requirePdf")]
    pub require_pdf: Value,
}

impl SearchRequest {
    /// Only a literal `true` asks the backend for PDF-backed results; `"true"` does not.
    pub fn requires_pdf(&self) -> bool {
        self.require_pdf == Value::Bool(true)
    }
}

/// The body forwarded to the backend's `/search`. `requirePdf` travels in the query string.
#[derive(Debug, Clone, Serialize)]
pub struct ForwardedSearch {
    pub query: Value,
    pub limit: i64,
}

/// Body of `POST /generate-review-url`, also forwarded as-is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewUrlRequest {
    #[serde(default, rename = "pdfUrl")]
    pub pdf_url: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForwardedReviewUrl<'a> {
    #[serde(rename = "pdfUrl")]
    pub pdf_url: &'a str,
}

/// A PDF received on `/generate-review`, held in memory for the lifetime of the request.
#[derive(Debug, Clone)]
pub struct UploadedPdf {
    pub file_name: String,
    pub content_type: String,
    pub data: axum::body::Bytes,
}

/// The only body shape the relay produces itself.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorEnvelope {
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// JSON truthiness as the browser client understands it.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Resolves the requested search limit.
///
/// Mirrors `parseInt(limit, 10) || 15`: numbers truncate, strings contribute their leading
/// (optionally signed) decimal digits, arrays read as their first element, and anything
/// unparseable or zero falls back to the default. The result is not range checked.
pub fn resolve_limit(limit: &Value) -> i64 {
    match parse_limit(limit) {
        Some(0) | None => DEFAULT_SEARCH_LIMIT,
        Some(n) => n,
    }
}

// An array stringifies to its comma-joined elements, so only the first element can contribute
// leading digits.
fn parse_limit(limit: &Value) -> Option<i64> {
    match limit {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => parse_leading_int(s),
        Value::Array(items) => items.first().and_then(parse_limit),
        _ => None,
    }
}

fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    // Out-of-range magnitudes are still out of range once saturated.
    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Whether a resolved limit is one the backend accepts.
pub fn limit_in_range(limit: i64) -> bool {
    (1..=MAX_SEARCH_LIMIT).contains(&limit)
}
