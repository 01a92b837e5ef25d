//! Redaction for signing-key material.
//!
//! The issuer key is supplied at runtime and must never show up in logs, error
//! reports or JSON output. Wrap it in [`Redacted`]; every formatter and the
//! serde serializer print `"<redacted>"` instead of the value. Code that needs
//! the secret calls [`Redacted::expose`] at the point of use.

use std::fmt::{self, Debug, Display};

/// Wrapper that redacts its inner value when formatted or serialized.
///
/// ```ignore
/// use coupon_protocol::redact::Redacted;
///
/// let key = Redacted("0xac09...".to_string());
/// tracing::info!(key = %key, "Loaded issuer key");
/// // Logs: key = <redacted>
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Redacted<T>(pub T);

impl<T> Redacted<T> {
    /// Borrow the secret.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> From<T> for Redacted<T> {
    fn from(value: T) -> Self {
        Redacted(value)
    }
}

impl<T> Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> serde::Serialize for Redacted<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        "<redacted>".serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_formatting_hides_value() {
        let secret = Redacted(KEY.to_string());
        assert_eq!(format!("{}", secret), "<redacted>");
        assert_eq!(format!("{:?}", secret), "<redacted>");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"<redacted>\"");
    }

    #[test]
    fn test_expose_returns_value() {
        let secret: Redacted<String> = KEY.to_string().into();
        assert_eq!(secret.expose(), KEY);
    }

    #[test]
    fn test_nested_debug_hides_value() {
        #[derive(Debug)]
        #[allow(dead_code)]
        struct Holder {
            key: Redacted<String>,
        }
        let holder = Holder {
            key: Redacted(KEY.to_string()),
        };
        assert!(!format!("{:?}", holder).contains("ac0974"));
    }
}
