//! Input resolution: turns a decoded request body into a validated [`TransformRequest`].
//!
//! Everything here is pure. Validation happens before any workspace or
//! process exists, so a rejected request has no side effects.

use serde_json::Value;
use tracing::debug;

use crate::profile::Profile;

/// Default ceiling on the source length, in UTF-8 bytes.
pub const DEFAULT_MAX_SOURCE_BYTES: usize = 200_000;

/// Body field carrying the source text in JSON payloads.
const CODE_FIELD: &str = "code";

/// Field names consulted for the profile, in priority order. `preset` is the
/// tool's own name for the switch and is accepted as an alias.
const PROFILE_FIELDS: [&str; 2] = ["profile", "preset"];

/// Transport-neutral view of an incoming request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Raw source sent with a `text/*` content type.
    Text(String),
    /// Structured payload, expected to be an object with a `code` field.
    Json(Value),
    /// No body, or a content type we do not interpret.
    Empty,
}

impl RequestBody {
    /// Decodes raw body bytes according to the request's content type.
    ///
    /// `text/*` becomes [`RequestBody::Text`], with invalid UTF-8 sequences
    /// replaced by U+FFFD. `application/json` (and any `+json` suffix type)
    /// becomes [`RequestBody::Json`]. An empty body or any other content type
    /// decodes to [`RequestBody::Empty`], which later resolves to a
    /// missing-source error.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::MalformedBody`] if a JSON body does not parse.
    pub fn decode(content_type: Option<&str>, bytes: &[u8]) -> Result<Self, InputError> {
        if bytes.is_empty() {
            return Ok(Self::Empty);
        }

        let Some(mime) = content_type.map(essence) else {
            return Ok(Self::Empty);
        };

        if mime.starts_with("text/") {
            Ok(Self::Text(String::from_utf8_lossy(bytes).into_owned()))
        } else if mime == "application/json" || mime.ends_with("+json") {
            serde_json::from_slice(bytes)
                .map(Self::Json)
                .map_err(|e| InputError::MalformedBody(format!("invalid JSON: {e}")))
        } else {
            Ok(Self::Empty)
        }
    }

    fn source(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(value) => value.get(CODE_FIELD).and_then(Value::as_str),
            Self::Empty => None,
        }
    }

    fn profile(&self) -> Option<String> {
        let Self::Json(value) = self else {
            return None;
        };
        PROFILE_FIELDS
            .iter()
            .find_map(|field| value.get(field).and_then(coerce_to_text))
    }
}

/// Lower-cased media type without parameters (`text/plain; charset=utf-8` -> `text/plain`).
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Converts a JSON scalar into profile text.
///
/// Falsy values (`null`, `false`, `0` and `""`) count as absent so the next
/// source gets a say.
fn coerce_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64().is_some_and(|f| f == 0.0) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Limits applied while resolving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLimits {
    /// Maximum accepted source length in UTF-8 bytes.
    pub max_source_bytes: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
        }
    }
}

/// Client-side validation failures. The `Display` text is what the client sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Provide Lua source as text or {{\"code\": \"...\"}}.")]
    MissingSource,
    #[error("Provide Lua source as text or {{\"code\": \"...\"}}.")]
    EmptySource,
    #[error("Malformed request body ({0}). Provide Lua source as text or {{\"code\": \"...\"}}.")]
    MalformedBody(String),
    #[error("Source too large: {len} bytes exceeds the limit of {max} bytes.")]
    SourceTooLarge { len: usize, max: usize },
    #[error("Unsupported profile \"{given}\". Use one of: {}.", Profile::allowed_list())]
    UnknownProfile { given: String },
}

impl InputError {
    /// Whether the failure is about payload size rather than payload shape.
    #[must_use]
    pub fn is_too_large(&self) -> bool {
        matches!(self, Self::SourceTooLarge { .. })
    }
}

/// A validated unit of work for the transformer.
///
/// Fields are private so a value can only exist after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    source: String,
    profile: Profile,
}

impl TransformRequest {
    /// Validates `source` against `limits` and pairs it with `profile`.
    ///
    /// # Errors
    ///
    /// [`InputError::EmptySource`] when the source is blank after trimming,
    /// [`InputError::SourceTooLarge`] when it exceeds `limits.max_source_bytes`.
    pub fn new(
        source: impl Into<String>,
        profile: Profile,
        limits: InputLimits,
    ) -> Result<Self, InputError> {
        let source = source.into();
        validate_source(&source, limits)?;
        Ok(Self { source, profile })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn profile(&self) -> Profile {
        self.profile
    }
}

fn validate_source(source: &str, limits: InputLimits) -> Result<(), InputError> {
    if source.trim().is_empty() {
        return Err(InputError::EmptySource);
    }
    if source.len() > limits.max_source_bytes {
        return Err(InputError::SourceTooLarge {
            len: source.len(),
            max: limits.max_source_bytes,
        });
    }
    Ok(())
}

/// Resolves the body and query into a [`TransformRequest`].
///
/// The profile is taken from the body first, then `query_profile`, then the
/// default. Source checks run before the profile check, so an empty or
/// oversized payload is reported as such even when the profile is also bad.
///
/// # Errors
///
/// Any [`InputError`] describing why the request cannot be processed.
pub fn resolve(
    body: &RequestBody,
    query_profile: Option<&str>,
    limits: InputLimits,
) -> Result<TransformRequest, InputError> {
    let source = body.source().ok_or(InputError::MissingSource)?;
    validate_source(source, limits)?;

    let requested = body
        .profile()
        .or_else(|| query_profile.filter(|p| !p.is_empty()).map(str::to_string));

    let profile = match requested {
        Some(name) => name
            .parse::<Profile>()
            .map_err(|_| InputError::UnknownProfile { given: name })?,
        None => {
            debug!("no profile supplied, using default");
            Profile::default()
        }
    };

    Ok(TransformRequest {
        source: source.to_string(),
        profile,
    })
}
