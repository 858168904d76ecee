//! Slug grammar shared by target and pin names.

/// Returns whether `value` is a non-empty string of `[a-z0-9-]` characters.
#[must_use]
pub fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|character| character.is_ascii_lowercase() || character.is_ascii_digit() || character == '-')
}
