use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose, Engine as _};
use oci_distribution::client::ImageData;
use oci_distribution::Reference;
use tokio_util::io::{ReaderStream, SyncIoBridge};

use super::models::{output_filename, ExportQuery, ARCHIVE_EXTENSION};
use crate::server::error::ServerError;
use crate::server::registry::models::{Credentials, FetchOptions, PlatformSpec};
use crate::server::registry::reference::{self, ReferenceError};
use crate::server::registry::PullError;
use crate::server::state::AppState;
use crate::server::tarball;

/// Buffered bytes between the blocking encoder and the response stream. A
/// slow client fills this up and stalls the encoder instead of growing heap.
const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Service information and usage instructions for the bare root path.
pub async fn usage() -> String {
    format!(
        "tarcast\n\n\
         For downloading a gzipped tarball ({ext}) of a container image.\n\n\
         Public Image: /<image_name>:<tag>\n\
         Example: /alpine:latest\n\n\
         Private Image (URL Auth): /<user>:<pass>@<your_server>/<image_name>:<tag>\n\
         Example: /user:pass@10.0.0.1/my-image:1.0\n\n\
         Optional Query Parameters:\n\
         ?arch=<os/architecture>  (e.g., ?arch=linux/arm64)\n\
         ?name=<custom_name>      (e.g., ?name=my-alpine-service)\n",
        ext = ARCHIVE_EXTENSION
    )
}

/// Pull the requested image and stream it back as a gzipped tarball.
///
/// The request moves through parsing, credential/platform resolution, the
/// pull, and streaming; any failure before the pull completes short-circuits
/// into a plain-text error or a Basic-Auth challenge. Once streaming starts
/// the 200 status is committed and a mid-stream failure can only be logged.
pub async fn handle_image_request(
    State(state): State<AppState>,
    Path(image_path): Path<String>,
    Query(query): Query<ExportQuery>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    // Exactly one leading separator belongs to the route; any further
    // slashes are part of the (then invalid) reference.
    let raw = image_path.strip_prefix('/').unwrap_or(&image_path);
    let parsed = reference::parse(raw).map_err(|err| match err {
        ReferenceError::Empty => ServerError::bad_request("Bad request: image name is required."),
        invalid @ ReferenceError::Invalid { .. } => ServerError::bad_request(invalid.to_string()),
    })?;

    let options = resolve_fetch_options(&headers, parsed.credentials, &query)?;
    let reference = parsed.reference;

    tracing::info!(reference = %reference.whole(), "Processing image request");

    let image = state
        .registry
        .pull(&reference, &options)
        .await
        .map_err(|err| match err {
            PullError::Unauthorized { reference, source } => {
                tracing::debug!(reference = %reference, error = %source, "Registry denied pull");
                ServerError::unauthorized_challenge(&reference)
            }
            upstream @ PullError::Upstream { .. } => {
                let message = format!("Failed to pull image: {}", upstream);
                ServerError::upstream(upstream.into(), message)
            }
        })?;

    let filename = output_filename(&reference, query.name());
    Ok(stream_tarball(reference, image, &filename))
}

/// Build the pull configuration from the Basic-Auth header, URL-embedded
/// credentials, and the `arch` query parameter. Header credentials win over
/// URL-embedded ones; both mechanisms may be supplied.
fn resolve_fetch_options(
    headers: &HeaderMap,
    url_credentials: Option<Credentials>,
    query: &ExportQuery,
) -> Result<FetchOptions, ServerError> {
    let credentials = basic_auth_credentials(headers).or(url_credentials);
    if let Some(creds) = &credentials {
        tracing::debug!(username = %creds.username, "Using registry credentials");
    }

    let platform = query
        .arch()
        .map(|arch| {
            PlatformSpec::parse(arch)
                .map_err(|err| ServerError::bad_request(err.to_string()))
        })
        .transpose()?;
    if let Some(platform) = &platform {
        tracing::debug!(platform = %platform, "Requesting specific platform");
    }

    Ok(FetchOptions {
        credentials,
        platform,
    })
}

/// Decode credentials from an `Authorization: Basic` header, if present and
/// well-formed. Malformed headers are ignored rather than rejected, matching
/// anonymous-pull behavior.
fn basic_auth_credentials(headers: &HeaderMap) -> Option<Credentials> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Commit the response headers and stream the gzipped archive.
///
/// The encoder runs on a blocking thread, writing through a bounded duplex
/// pipe that the response body reads from; client backpressure propagates to
/// the encoder through the pipe. A failure here happens after the status is
/// committed, so it is logged and the connection is left to close — the
/// client observes a truncated archive.
fn stream_tarball(reference: Reference, image: ImageData, filename: &str) -> Response {
    let (writer, reader) = tokio::io::duplex(STREAM_BUFFER_SIZE);
    let sink = SyncIoBridge::new(writer);

    tokio::task::spawn_blocking(move || {
        match tarball::write_gzipped(&reference, &image, sink) {
            Ok(()) => {
                tracing::info!(reference = %reference.whole(), "Successfully sent gzipped image");
            }
            Err(err) => {
                tracing::error!(
                    reference = %reference.whole(),
                    error = %err,
                    "Error streaming gzipped tarball to client"
                );
            }
        }
    });

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/x-gzip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", urlencoding::encode(filename)),
            ),
        ],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response()
}
