//! Redaction of inline binary payloads before embedding.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Token substituted for every redacted data URI.
pub const IMAGE_PLACEHOLDER: &str = "placeholder-image";

/// `data:image/<type>;<payload>` up to the next closing parenthesis.
static DATA_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"data:image/[^;]+;[^)]+").expect("data uri pattern is valid"));

/// Replace embedded image data URIs with [`IMAGE_PLACEHOLDER`].
pub fn redact_data_uris(text: &str) -> Cow<'_, str> {
    DATA_URI.replace_all(text, IMAGE_PLACEHOLDER)
}
