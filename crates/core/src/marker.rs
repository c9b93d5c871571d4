//! The link-mode marker token.
//!
//! Transcript entries exchanged in link mode carry [`MARKER`] as a prefix.
//! Text handed to an output channel never does.

use std::borrow::Cow;

/// The prefix identifying link-mode transcript entries.
pub const MARKER: &str = "[GL MODE]:";

/// Returns whether the text already starts with the marker.
#[inline]
pub fn is_tagged(text: &str) -> bool {
    text.trim_start().starts_with(MARKER)
}

/// Prefixes the text with the marker unless it already carries one.
pub fn tag(text: &str) -> Cow<'_, str> {
    if is_tagged(text) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{MARKER} {text}"))
    }
}

/// Removes every marker occurrence from the text.
///
/// Applying this twice yields the same result as applying it once.
pub fn strip(text: &str) -> Cow<'_, str> {
    if !text.contains(MARKER) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace(MARKER, "").trim_start().to_owned())
}
