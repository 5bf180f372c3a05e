use oci_distribution::Reference;
use serde::Deserialize;

/// Archive extension used everywhere: usage text, filename synthesis, tests.
pub const ARCHIVE_EXTENSION: &str = ".tgz";

/// Query parameters accepted by the export endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    /// Platform selector, e.g. `linux/arm64`
    pub arch: Option<String>,
    /// Custom output base name, without extension
    pub name: Option<String>,
}

impl ExportQuery {
    /// `arch` with empty values treated as absent.
    pub fn arch(&self) -> Option<&str> {
        self.arch.as_deref().filter(|s| !s.is_empty())
    }

    /// `name` with empty values treated as absent.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|s| !s.is_empty())
    }
}

/// Synthesize the download filename for an image.
///
/// A custom name is used as-is (filename only; it never changes which image
/// is pulled). Otherwise the name is derived from the reference: repository
/// path with `/` replaced by `_`, joined to the tag-or-digest identifier.
pub fn output_filename(reference: &Reference, custom_name: Option<&str>) -> String {
    match custom_name {
        Some(name) => format!("{}{}", name, ARCHIVE_EXTENSION),
        None => format!(
            "{}_{}{}",
            reference.repository().replace('/', "_"),
            identifier(reference),
            ARCHIVE_EXTENSION
        ),
    }
}

/// Tag-or-digest identifier of a reference, digest taking precedence.
fn identifier(reference: &Reference) -> &str {
    reference
        .digest()
        .or_else(|| reference.tag())
        .unwrap_or("latest")
}
