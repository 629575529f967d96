//! Client-side upload validation and JPEG normalization.
//!
//! The backend's compositing pipeline is happiest with JPEG input, so
//! every upload is converted before it leaves the client. Conversion is
//! best-effort: payloads that cannot be decoded are uploaded unchanged.

use std::io::Cursor;
use std::path::Path;

use log::warn;

use crate::error::UploadError;

/// JPEG start-of-image marker
const JPEG_SOI: [u8; 3] = [0xFF, 0xD8, 0xFF];
/// JPEG end-of-image marker
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Re-encode quality for converted uploads
const JPEG_QUALITY: u8 = 92;

/// A payload that passed validation and is ready for multipart upload
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Returns true when the payload carries both JPEG byte markers
pub fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= JPEG_SOI.len() + JPEG_EOI.len()
        && bytes.starts_with(&JPEG_SOI)
        && bytes.ends_with(&JPEG_EOI)
}

/// Validates an upload payload before any network call.
///
/// Rejects empty payloads and payloads whose guessed MIME type is not
/// an image. Payloads carrying JPEG markers are accepted even when the
/// filename gives no usable extension.
pub fn validate(filename: &str, bytes: &[u8]) -> Result<(), UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::EmptyFile);
    }
    if is_jpeg(bytes) {
        return Ok(());
    }
    let mime = mime_guess::from_path(filename).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::IMAGE {
        return Err(UploadError::NotAnImage {
            mime: mime.essence_str().to_string(),
        });
    }
    Ok(())
}

/// Normalizes a validated payload to JPEG.
///
/// Payloads already in JPEG form pass through byte-identical. Anything
/// else is decoded and re-encoded at quality 92 with the filename
/// extension rewritten to `.jpg`; if decoding fails the original
/// payload is kept so the upload can still proceed.
pub fn normalize_to_jpeg(filename: &str, bytes: Vec<u8>) -> PreparedUpload {
    if is_jpeg(&bytes) {
        return PreparedUpload {
            filename: filename.to_string(),
            bytes,
            mime: "image/jpeg".to_string(),
        };
    }

    match reencode_jpeg(&bytes) {
        Ok(converted) => PreparedUpload {
            filename: with_jpg_extension(filename),
            bytes: converted,
            mime: "image/jpeg".to_string(),
        },
        Err(e) => {
            warn!(
                "[normalize_to_jpeg] Could not convert {}: {}. Uploading original bytes.",
                filename, e
            );
            let mime = mime_guess::from_path(filename).first_or_octet_stream();
            PreparedUpload {
                filename: filename.to_string(),
                bytes,
                mime: mime.essence_str().to_string(),
            }
        }
    }
}

/// Decode any supported format and encode to JPEG in memory
fn reencode_jpeg(bytes: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    // JPEG has no alpha channel
    let rgb_img = img.to_rgb8();

    let mut buffer = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    rgb_img.write_with_encoder(encoder)?;
    Ok(buffer.into_inner())
}

fn with_jpg_extension(filename: &str) -> String {
    Path::new(filename)
        .with_extension("jpg")
        .to_string_lossy()
        .into_owned()
}
