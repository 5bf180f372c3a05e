pub mod models;
pub mod reference;

use async_trait::async_trait;
use oci_distribution::client::{ClientConfig, ImageData};
use oci_distribution::errors::{OciDistributionError, OciErrorCode};
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::{manifest, Client, Reference};
use thiserror::Error;

use models::FetchOptions;

/// Layer media types accepted on pull: OCI and Docker, plain and gzipped.
const ACCEPTED_LAYER_MEDIA_TYPES: &[&str] = &[
    manifest::IMAGE_LAYER_MEDIA_TYPE,
    manifest::IMAGE_LAYER_GZIP_MEDIA_TYPE,
    manifest::IMAGE_DOCKER_LAYER_TAR_MEDIA_TYPE,
    manifest::IMAGE_DOCKER_LAYER_GZIP_MEDIA_TYPE,
];

/// Pull failures, classified for the HTTP surface: authorization problems
/// become a Basic-Auth challenge, everything else a server error.
#[derive(Debug, Error)]
pub enum PullError {
    #[error("registry denied access to '{reference}'")]
    Unauthorized {
        reference: String,
        #[source]
        source: OciDistributionError,
    },
    #[error("failed to pull '{reference}': {source}")]
    Upstream {
        reference: String,
        #[source]
        source: OciDistributionError,
    },
}

/// Registry pull seam. The production implementation talks to the registry
/// with `oci-distribution`; tests substitute a stub.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn pull(
        &self,
        reference: &Reference,
        options: &FetchOptions,
    ) -> Result<ImageData, PullError>;
}

/// Registry client backed by `oci_distribution::Client`.
///
/// A fresh client is constructed per pull: the platform resolver is part of
/// the client configuration, and per-request clients keep requests fully
/// independent of each other.
pub struct OciRegistryClient;

impl OciRegistryClient {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OciRegistryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryClient for OciRegistryClient {
    async fn pull(
        &self,
        reference: &Reference,
        options: &FetchOptions,
    ) -> Result<ImageData, PullError> {
        let auth = match &options.credentials {
            Some(creds) => RegistryAuth::Basic(creds.username.clone(), creds.password.clone()),
            None => RegistryAuth::Anonymous,
        };

        let client = Client::new(client_config(options));
        client
            .pull(reference, &auth, ACCEPTED_LAYER_MEDIA_TYPES.to_vec())
            .await
            .map_err(|source| classify_pull_error(reference, source))
    }
}

fn client_config(options: &FetchOptions) -> ClientConfig {
    let mut config = ClientConfig::default();
    if let Some(platform) = options.platform.clone() {
        config.platform_resolver = Some(Box::new(move |entries| {
            entries
                .iter()
                .find(|entry| {
                    entry
                        .platform
                        .as_ref()
                        .map_or(false, |p| platform.matches(p))
                })
                .map(|entry| entry.digest.clone())
        }));
    }
    config
}

fn classify_pull_error(reference: &Reference, source: OciDistributionError) -> PullError {
    let reference = reference.whole();
    if is_unauthorized(&source) {
        PullError::Unauthorized { reference, source }
    } else {
        PullError::Upstream { reference, source }
    }
}

/// Whether a pull failure means the registry denied access, as opposed to
/// any other upstream problem.
fn is_unauthorized(err: &OciDistributionError) -> bool {
    match err {
        OciDistributionError::UnauthorizedError { .. } => true,
        OciDistributionError::AuthenticationFailure(_) => true,
        OciDistributionError::RegistryError { envelope, .. } => envelope
            .errors
            .iter()
            .any(|e| matches!(e.code, OciErrorCode::Unauthorized | OciErrorCode::Denied)),
        OciDistributionError::ServerError { code, .. } => *code == 401 || *code == 403,
        _ => false,
    }
}
