use crate::CoreError;
use once_cell::sync::Lazy;
use regex::Regex;

// dot-separated tokens, at least two; `_` and `-` only between letters or digits
static SERVICE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[_-]+[a-z0-9]+)*(?:\.[a-z0-9]+(?:[_-]+[a-z0-9]+)*)+$")
        .expect("service name pattern is valid")
});

/// Returns true when `name` is a dotted service name such as `v1.hello.world`.
///
/// A service name is made of at least two non-empty tokens separated by `.`. Tokens may contain
/// lowercase ASCII letters, digits, `_` and `-`, and a token never starts or ends with `_` or `-`.
pub fn is_valid_service_name(name: &str) -> bool {
    SERVICE_NAME_REGEX.is_match(name)
}

/// Validate a function or monitor route.
pub fn validate_service_name(name: &str) -> Result<(), CoreError> {
    if is_valid_service_name(name) {
        Ok(())
    } else {
        Err(CoreError::InvalidRoute(name.to_string()))
    }
}
