use oci_distribution::manifest::Platform;
use thiserror::Error;

/// Username/password pair for a registry, from either the HTTP Basic-Auth
/// header or the `user:pass@` prefix of the reference path.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Platform variant selector for multi-architecture images.
///
/// Parsed from the `arch` query parameter in `os/architecture[/variant]`
/// form, e.g. `linux/arm64` or `linux/arm/v7`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSpec {
    pub os: String,
    pub architecture: String,
    pub variant: Option<String>,
}

#[derive(Debug, Error)]
#[error("invalid platform '{value}': expected os/architecture[/variant]")]
pub struct PlatformParseError {
    pub value: String,
}

impl PlatformSpec {
    pub fn parse(value: &str) -> Result<Self, PlatformParseError> {
        let parts: Vec<&str> = value.split('/').collect();
        let invalid = || PlatformParseError {
            value: value.to_string(),
        };

        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }
        match parts.as_slice() {
            [os, architecture] => Ok(Self {
                os: os.to_string(),
                architecture: architecture.to_string(),
                variant: None,
            }),
            [os, architecture, variant] => Ok(Self {
                os: os.to_string(),
                architecture: architecture.to_string(),
                variant: Some(variant.to_string()),
            }),
            _ => Err(invalid()),
        }
    }

    /// Whether an image-index platform entry satisfies this selector. The
    /// variant is only compared when the selector names one.
    pub fn matches(&self, platform: &Platform) -> bool {
        platform.os == self.os
            && platform.architecture == self.architecture
            && self
                .variant
                .as_ref()
                .map_or(true, |v| platform.variant.as_deref() == Some(v.as_str()))
    }
}

impl std::fmt::Display for PlatformSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{}", variant)?;
        }
        Ok(())
    }
}

/// Per-request pull configuration. The fields are independent, optional
/// settings; construction order carries no meaning.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub credentials: Option<Credentials>,
    pub platform: Option<PlatformSpec>,
}
