//! Image reference parsing for the request path.
//!
//! The path remainder may carry URL-embedded credentials in the
//! `user:pass@host/image:tag` form. Those are split off here; the rest of
//! the string is handed to `oci_distribution::Reference`, which decomposes
//! it into registry host, repository path, and tag-or-digest identifier.

use super::models::Credentials;
use oci_distribution::{ParseError, Reference};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("image name is required")]
    Empty,
    #[error("invalid image name '{reference}': {source}")]
    Invalid {
        reference: String,
        #[source]
        source: ParseError,
    },
}

/// A parsed request reference: the registry-resolvable reference plus any
/// credentials that were embedded in the URL form.
#[derive(Debug, Clone)]
pub struct ParsedReference {
    pub reference: Reference,
    pub credentials: Option<Credentials>,
}

/// Parse a raw image reference, splitting off URL-embedded credentials.
pub fn parse(raw: &str) -> Result<ParsedReference, ReferenceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ReferenceError::Empty);
    }

    let (credentials, remainder) = split_url_credentials(raw);
    let reference =
        Reference::try_from(remainder.to_string()).map_err(|source| ReferenceError::Invalid {
            reference: remainder.to_string(),
            source,
        })?;

    Ok(ParsedReference {
        reference,
        credentials,
    })
}

/// Split a leading `user:pass@` prefix from a reference string.
///
/// The prefix is only treated as credentials when it sits before the first
/// `/` and contains a `:`; this keeps digest references
/// (`repo/name@sha256:...`) intact, since their `@` always follows a slash
/// or an un-coloned name.
fn split_url_credentials(raw: &str) -> (Option<Credentials>, &str) {
    let Some(at) = raw.find('@') else {
        return (None, raw);
    };
    let prefix = &raw[..at];
    if prefix.contains('/') || !prefix.contains(':') {
        return (None, raw);
    }
    let Some((username, password)) = prefix.split_once(':') else {
        return (None, raw);
    };
    (
        Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        }),
        &raw[at + 1..],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_public_reference() {
        let parsed = parse("library/alpine:latest").unwrap();
        assert!(parsed.credentials.is_none());
        assert_eq!(parsed.reference.repository(), "library/alpine");
        assert_eq!(parsed.reference.tag(), Some("latest"));
    }

    #[test]
    fn parse_custom_registry() {
        let parsed = parse("ghcr.io/org/app:v1.0").unwrap();
        assert_eq!(parsed.reference.registry(), "ghcr.io");
        assert_eq!(parsed.reference.repository(), "org/app");
        assert_eq!(parsed.reference.tag(), Some("v1.0"));
    }

    #[test]
    fn parse_url_credentials() {
        let parsed = parse("user:pass@registry.example.com/my-image:1.0").unwrap();
        let creds = parsed.credentials.unwrap();
        assert_eq!(creds.username, "user");
        assert_eq!(creds.password, "pass");
        assert_eq!(parsed.reference.registry(), "registry.example.com");
        assert_eq!(parsed.reference.repository(), "my-image");
    }

    #[test]
    fn parse_digest_reference_is_not_credentials() {
        let parsed = parse(
            "ghcr.io/org/app@sha256:0000000000000000000000000000000000000000000000000000000000000000",
        )
        .unwrap();
        assert!(parsed.credentials.is_none());
        assert!(parsed.reference.digest().is_some());
    }

    #[test]
    fn parse_password_may_contain_colon() {
        let parsed = parse("user:pa:ss@registry.example.com/app:1").unwrap();
        let creds = parsed.credentials.unwrap();
        assert_eq!(creds.username, "user");
        assert_eq!(creds.password, "pa:ss");
    }

    #[test]
    fn parse_empty_is_an_error() {
        assert!(matches!(parse(""), Err(ReferenceError::Empty)));
        assert!(matches!(parse("   "), Err(ReferenceError::Empty)));
    }

    #[test]
    fn parse_invalid_reference_names_the_input() {
        let err = parse("UPPER CASE??").unwrap_err();
        assert!(err.to_string().contains("UPPER CASE??"));
    }
}
