//! Share links: query-string codec for `ParameterState` and the share action.

use super::{ParameterState, PartialParameters};
use std::collections::HashSet;
use url::{form_urlencoded, Url};

pub const KEY_ROTATION: &str = "rotation";
pub const KEY_SPEED: &str = "speed";
pub const KEY_IS_ANIMATING: &str = "isAnimating";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("query parameter `{key}` is not a number: {value:?}")]
    NotANumber { key: &'static str, value: String },
    #[error("query parameter `{key}` is not finite: {value:?}")]
    NotFinite { key: &'static str, value: String },
    #[error("query parameter `isAnimating` must be 1 or 0, got {value:?}")]
    NotAFlag { value: String },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard write failed: {0}")]
    Write(String),
}

/// Result of decoding a query: the fields that parsed plus the ones skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub params: PartialParameters,
    pub rejected: Vec<DecodeError>,
}

/// Canonical `rotation`, `speed`, `isAnimating` query for `state`.
pub fn encode(state: &ParameterState) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair(KEY_ROTATION, &state.rotation_degrees.to_string())
        .append_pair(KEY_SPEED, &state.speed.to_string())
        .append_pair(KEY_IS_ANIMATING, if state.is_playing { "1" } else { "0" })
        .finish()
}

/// Decodes a query string with or without the leading `?`.
///
/// Unknown keys are ignored and the first occurrence of a key wins. A field
/// that fails to parse is skipped and recorded in `rejected`; the remaining
/// fields still decode.
pub fn decode(query: &str) -> Decoded {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut decoded = Decoded::default();
    let mut seen: HashSet<&'static str> = HashSet::new();

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        let key = match key.as_ref() {
            KEY_ROTATION => KEY_ROTATION,
            KEY_SPEED => KEY_SPEED,
            KEY_IS_ANIMATING => KEY_IS_ANIMATING,
            _ => continue,
        };
        if !seen.insert(key) {
            continue;
        }
        match key {
            KEY_ROTATION => match parse_number(key, &value) {
                Ok(rotation) => decoded.params.rotation_degrees = Some(rotation),
                Err(err) => decoded.rejected.push(err),
            },
            KEY_SPEED => match parse_number(key, &value) {
                Ok(speed) => decoded.params.speed = Some(speed),
                Err(err) => decoded.rejected.push(err),
            },
            _ => match value.trim() {
                "1" => decoded.params.is_playing = Some(true),
                "0" => decoded.params.is_playing = Some(false),
                other => decoded.rejected.push(DecodeError::NotAFlag {
                    value: other.to_string(),
                }),
            },
        }
    }

    decoded
}

fn parse_number(key: &'static str, raw: &str) -> Result<f64, DecodeError> {
    let value: f64 = raw.trim().parse().map_err(|_| DecodeError::NotANumber {
        key,
        value: raw.to_string(),
    })?;
    if !value.is_finite() {
        return Err(DecodeError::NotFinite {
            key,
            value: raw.to_string(),
        });
    }
    Ok(value)
}

/// Extracts the query part of a startup link.
///
/// Accepts a full URL (`showroom://scene?rotation=90`) or a bare query
/// (`?rotation=90` / `rotation=90`).
pub fn query_from_link(link: &str) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    match Url::parse(link) {
        Ok(url) => url.query().map(str::to_string),
        Err(_) if link.contains('=') => Some(link.trim_start_matches('?').to_string()),
        Err(_) => None,
    }
}

pub trait ClipboardSink {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// System clipboard through `arboard`. The handle is kept alive so the
/// contents survive on platforms where the owner must stay around.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardSink for SystemClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        if self.inner.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|err| ClipboardError::Unavailable(err.to_string()))?;
            self.inner = Some(clipboard);
        }
        match self.inner.as_mut() {
            Some(clipboard) => clipboard
                .set_text(text.to_string())
                .map_err(|err| ClipboardError::Write(err.to_string())),
            None => Err(ClipboardError::Unavailable("not initialized".to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ShareOutcome {
    Copied { link: Url },
    /// Clipboard write failed; the link must be shown to the user as text.
    ShownAsText { link: Url, error: ClipboardError },
}

impl ShareOutcome {
    pub fn link(&self) -> &Url {
        match self {
            ShareOutcome::Copied { link } | ShareOutcome::ShownAsText { link, .. } => link,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ShareOutcome::Copied { .. } => "Link copied!".to_string(),
            ShareOutcome::ShownAsText { link, error } => {
                format!("Could not copy link ({}). Share this link:\n{}", error, link)
            }
        }
    }
}

/// Replaces the query of `location` with the encoded state and copies the
/// resulting URL to the clipboard.
pub fn share(
    state: &ParameterState,
    location: &mut Url,
    clipboard: &mut dyn ClipboardSink,
) -> ShareOutcome {
    location.set_query(Some(&encode(state)));
    let link = location.clone();
    match clipboard.write_text(link.as_str()) {
        Ok(()) => {
            log::info!("Share link copied: {}", link);
            ShareOutcome::Copied { link }
        }
        Err(error) => {
            log::warn!("{}; share link: {}", error, link);
            ShareOutcome::ShownAsText { link, error }
        }
    }
}
