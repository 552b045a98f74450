// src/services/image_input.rs
use crate::errors::RenderError;
use base64::{Engine as _, engine::general_purpose};
use image::GenericImageView;
use log::warn;
use reqwest::Client;
use std::time::{SystemTime, UNIX_EPOCH};

/// Media types accepted as-is from a remote fetch. Anything else goes
/// through the re-encode fallback.
const ACCEPTED_MIME_TYPES: [&str; 5] = [
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/heic",
    "image/heif",
];

/// Payloads below this size cannot be a decodable image and are treated
/// as corrupt at the point where pixel dimensions are needed.
const MIN_IMAGE_BYTES: usize = 128;

/// Canonical form of any image reference: raw bytes plus media type.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl NormalizedImage {
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// Resolves heterogeneous image references (remote URL, data URI, bare
/// base64) into a `NormalizedImage`.
pub struct ImageNormalizer {
    http: Client,
}

impl ImageNormalizer {
    pub fn new() -> Self {
        // No cookie store: asset fetches must not carry credentials to
        // third-party hosts.
        Self {
            http: Client::new(),
        }
    }

    pub async fn normalize(&self, reference: &str) -> Result<NormalizedImage, RenderError> {
        let value = reference.trim();

        if value.starts_with("http://") || value.starts_with("https://") {
            return self.fetch_remote(value).await;
        }

        if let Some(rest) = value.strip_prefix("data:") {
            let mime_type = rest
                .split(';')
                .next()
                .filter(|m| !m.is_empty())
                .ok_or_else(|| {
                    RenderError::ImageUnavailable("Data URI missing media type".to_string())
                })?
                .to_string();
            let payload = value.split_once(',').map(|(_, p)| p).ok_or_else(|| {
                RenderError::ImageUnavailable("Data URI missing payload".to_string())
            })?;
            let data = general_purpose::STANDARD.decode(payload).map_err(|e| {
                RenderError::ImageUnavailable(format!("Invalid data URI payload: {}", e))
            })?;
            return Ok(NormalizedImage { data, mime_type });
        }

        // Bare base64, assumed PNG
        let data = general_purpose::STANDARD
            .decode(value)
            .map_err(|e| RenderError::ImageUnavailable(format!("Invalid base64 payload: {}", e)))?;
        Ok(NormalizedImage {
            data,
            mime_type: "image/png".to_string(),
        })
    }

    async fn fetch_remote(&self, url: &str) -> Result<NormalizedImage, RenderError> {
        match self.fetch_direct(url).await {
            Ok(img) => Ok(img),
            Err(e) => {
                warn!("Direct fetch of {} failed ({}), retrying with cache buster", url, e);
                self.fetch_reencode(&cache_busted(url)).await
            }
        }
    }

    async fn fetch_direct(&self, url: &str) -> Result<NormalizedImage, RenderError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RenderError::ImageUnavailable(format!("Fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RenderError::ImageUnavailable(format!(
                "Fetch status: {}",
                response.status()
            )));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_default();

        let body = response
            .bytes()
            .await
            .map_err(|e| RenderError::ImageUnavailable(format!("Fetch body failed: {}", e)))?;

        if ACCEPTED_MIME_TYPES.contains(&mime_type.as_str()) {
            return Ok(NormalizedImage {
                data: body.to_vec(),
                mime_type,
            });
        }

        // Server declared something else (often an HTML error page);
        // only usable if the bytes still decode as an image.
        reencode_png(&body)
    }

    async fn fetch_reencode(&self, url: &str) -> Result<NormalizedImage, RenderError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RenderError::ImageUnavailable(format!("Fallback fetch failed: {}", e)))?;

        let body = response.bytes().await.map_err(|e| {
            RenderError::ImageUnavailable(format!("Fallback fetch body failed: {}", e))
        })?;

        reencode_png(&body)
    }
}

/// Decodes the image to read its pixel dimensions. This is the call site
/// where corrupt or near-empty payloads surface as `ImageUnavailable`.
pub fn decode_dimensions(img: &NormalizedImage) -> Result<(u32, u32), RenderError> {
    if img.data.len() < MIN_IMAGE_BYTES {
        return Err(RenderError::ImageUnavailable(format!(
            "Image payload too small to decode ({} bytes)",
            img.data.len()
        )));
    }
    let decoded = image::load_from_memory(&img.data)
        .map_err(|e| RenderError::ImageUnavailable(format!("Invalid image data: {}", e)))?;
    Ok(decoded.dimensions())
}

fn reencode_png(data: &[u8]) -> Result<NormalizedImage, RenderError> {
    let decoded = image::load_from_memory(data)
        .map_err(|e| RenderError::ImageUnavailable(format!("Cannot decode image: {}", e)))?;

    let mut output = Vec::new();
    decoded
        .write_to(&mut std::io::Cursor::new(&mut output), image::ImageFormat::Png)
        .map_err(|e| RenderError::ImageUnavailable(format!("PNG re-encode failed: {}", e)))?;

    Ok(NormalizedImage {
        data: output,
        mime_type: "image/png".to_string(),
    })
}

fn cache_busted(url: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    if url.contains('?') {
        format!("{}&cb={}", url, millis)
    } else {
        format!("{}?cb={}", url, millis)
    }
}
