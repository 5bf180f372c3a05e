//! Streaming tar+gzip serialization of a pulled image.
//!
//! Writes an OCI image-layout archive (`oci-layout`, `index.json`,
//! `blobs/sha256/...`) through a gzip encoder onto any `Write` sink. Entries
//! are emitted as they are serialized; the full archive is never buffered.

use flate2::write::GzEncoder;
use flate2::Compression;
use oci_distribution::client::ImageData;
use oci_distribution::manifest::{
    ImageIndexEntry, OciImageManifest, OCI_IMAGE_INDEX_MEDIA_TYPE, OCI_IMAGE_MEDIA_TYPE,
};
use oci_distribution::Reference;
use sha2::{Digest, Sha256};
use std::io::{self, Write};

/// Annotation key naming the reference an archive was exported from.
const REF_NAME_ANNOTATION: &str = "org.opencontainers.image.ref.name";

/// Write `image` as a gzip-compressed OCI layout tar onto `sink`.
///
/// The gzip trailer is flushed on every exit path; a failure partway through
/// still attempts to finish the encoder before the error is returned.
pub fn write_gzipped<W: Write>(
    reference: &Reference,
    image: &ImageData,
    sink: W,
) -> io::Result<()> {
    let mut encoder = GzEncoder::new(sink, Compression::default());
    let result = write_layout(reference, image, &mut encoder);
    let finish = encoder.finish();
    result?;
    finish?;
    Ok(())
}

/// Write the uncompressed OCI layout tar onto `out`.
fn write_layout<W: Write>(reference: &Reference, image: &ImageData, out: &mut W) -> io::Result<()> {
    let mut builder = tar::Builder::new(out);

    let manifest = match &image.manifest {
        Some(manifest) => manifest.clone(),
        None => OciImageManifest::build(&image.layers, &image.config, None),
    };
    let manifest_json = serde_json::to_vec(&manifest)?;
    let manifest_digest = sha256_digest(&manifest_json);

    append_file(&mut builder, "oci-layout", br#"{"imageLayoutVersion":"1.0.0"}"#)?;

    let index = serde_json::json!({
        "schemaVersion": 2,
        "mediaType": OCI_IMAGE_INDEX_MEDIA_TYPE,
        "manifests": [ImageIndexEntry {
            media_type: manifest
                .media_type
                .clone()
                .unwrap_or_else(|| OCI_IMAGE_MEDIA_TYPE.to_string()),
            digest: manifest_digest.clone(),
            size: manifest_json.len() as i64,
            platform: None,
            annotations: Some(
                [(REF_NAME_ANNOTATION.to_string(), reference.whole())]
                    .into_iter()
                    .collect(),
            ),
        }],
    });
    append_file(&mut builder, "index.json", &serde_json::to_vec(&index)?)?;

    append_blob(&mut builder, &sha256_digest(&image.config.data), &image.config.data)?;
    for layer in &image.layers {
        append_blob(&mut builder, &sha256_digest(&layer.data), &layer.data)?;
    }
    append_blob(&mut builder, &manifest_digest, &manifest_json)?;

    builder.finish()
}

fn append_blob<W: Write>(builder: &mut tar::Builder<W>, digest: &str, data: &[u8]) -> io::Result<()> {
    let hex = digest.strip_prefix("sha256:").unwrap_or(digest);
    append_file(builder, &format!("blobs/sha256/{}", hex), data)
}

fn append_file<W: Write>(builder: &mut tar::Builder<W>, path: &str, data: &[u8]) -> io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, data)
}

fn sha256_digest(data: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use oci_distribution::client::{Config, ImageLayer};
    use oci_distribution::manifest::IMAGE_LAYER_GZIP_MEDIA_TYPE;
    use std::collections::HashMap;
    use std::io::Read;

    fn sample_image() -> ImageData {
        ImageData {
            layers: vec![ImageLayer::new(
                b"layer-bytes".to_vec(),
                IMAGE_LAYER_GZIP_MEDIA_TYPE.to_string(),
                None,
            )],
            digest: None,
            config: Config::new(
                br#"{"architecture":"amd64","os":"linux"}"#.to_vec(),
                "application/vnd.oci.image.config.v1+json".to_string(),
                None,
            ),
            manifest: None,
        }
    }

    fn decode_entries(archive: &[u8]) -> HashMap<String, Vec<u8>> {
        let mut tar_bytes = Vec::new();
        GzDecoder::new(archive).read_to_end(&mut tar_bytes).unwrap();

        let mut entries = HashMap::new();
        for entry in tar::Archive::new(tar_bytes.as_slice()).entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            entries.insert(path, data);
        }
        entries
    }

    #[test]
    fn archive_contains_layout_index_and_blobs() {
        let reference: Reference = "ghcr.io/org/app:v1".parse().unwrap();
        let image = sample_image();

        let mut archive = Vec::new();
        write_gzipped(&reference, &image, &mut archive).unwrap();

        let entries = decode_entries(&archive);
        assert!(entries.contains_key("oci-layout"));

        let index: serde_json::Value =
            serde_json::from_slice(entries.get("index.json").unwrap()).unwrap();
        let descriptor = &index["manifests"][0];
        assert_eq!(
            descriptor["annotations"][REF_NAME_ANNOTATION],
            "ghcr.io/org/app:v1"
        );

        // The manifest blob referenced by the index must be present, and its
        // descriptors must point at blobs that are also present.
        let manifest_digest = descriptor["digest"].as_str().unwrap();
        let manifest_path = format!(
            "blobs/sha256/{}",
            manifest_digest.strip_prefix("sha256:").unwrap()
        );
        let manifest: serde_json::Value =
            serde_json::from_slice(entries.get(&manifest_path).unwrap()).unwrap();
        for descriptor in std::iter::once(&manifest["config"])
            .chain(manifest["layers"].as_array().unwrap().iter())
        {
            let digest = descriptor["digest"].as_str().unwrap();
            let path = format!("blobs/sha256/{}", digest.strip_prefix("sha256:").unwrap());
            assert!(entries.contains_key(&path), "missing blob {}", path);
        }
    }

    #[test]
    fn layer_blob_round_trips_bytes() {
        let reference: Reference = "docker.io/library/alpine:latest".parse().unwrap();
        let image = sample_image();

        let mut archive = Vec::new();
        write_gzipped(&reference, &image, &mut archive).unwrap();

        let digest = sha256_digest(b"layer-bytes");
        let path = format!("blobs/sha256/{}", digest.strip_prefix("sha256:").unwrap());
        let entries = decode_entries(&archive);
        assert_eq!(entries.get(&path).unwrap(), b"layer-bytes");
    }

    #[test]
    fn write_error_is_propagated() {
        struct FailingSink;
        impl Write for FailingSink {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let reference: Reference = "docker.io/library/alpine:latest".parse().unwrap();
        let err = write_gzipped(&reference, &sample_image(), FailingSink).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
