// src/services/render_service.rs
use crate::errors::RenderError;
use crate::models::{Annotation, AspectRatio, EnvironmentMode, MaterialMode, RenderParams, RenderResult};
use crate::services::gemini::{GenerationResponse, ImageModelClient};
use crate::services::image_input::{ImageNormalizer, NormalizedImage, decode_dimensions};
use crate::services::prompt::{self, AuxImages};
use crate::services::retry::invoke_with_retry;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_RENDER_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_UPSCALE_MODEL: &str = "gemini-3-pro-image-preview";

const MAX_ATTEMPTS: u32 = 3;

// Pause between sequential batch items to smooth burst load on the
// per-account rate limit.
const BATCH_COOLDOWN: Duration = Duration::from_secs(2);

/// Outcome of a sequential batch: the renders completed before the first
/// failure, plus that failure if one occurred. Completed items are never
/// discarded by a later error.
pub struct BatchOutcome {
    pub results: Vec<RenderResult>,
    pub error: Option<RenderError>,
}

/// Public entry point of the pipeline: sequences normalization, prompt
/// assembly, and the retried remote call for every operation.
pub struct RenderService {
    client: Arc<dyn ImageModelClient>,
    normalizer: ImageNormalizer,
    render_model: String,
    upscale_model: String,
}

impl RenderService {
    pub fn new(client: Arc<dyn ImageModelClient>, render_model: String, upscale_model: String) -> Self {
        Self {
            client,
            normalizer: ImageNormalizer::new(),
            render_model,
            upscale_model,
        }
    }

    pub async fn generate_render(
        &self,
        params: &RenderParams,
        sketch: &str,
    ) -> Result<String, RenderError> {
        let sketch_image = self.normalizer.normalize(sketch).await?;
        let aux = self.resolve_aux_images(params).await?;
        let aspect_ratio = self.resolve_aspect_ratio(params, &sketch_image)?;

        let request =
            prompt::assemble_generate(params, &sketch_image, &aux, aspect_ratio, &self.render_model);
        let response = invoke_with_retry(MAX_ATTEMPTS, || self.client.generate(&request)).await?;
        extract_image(&response)
    }

    /// Generates one render per sketch, sequentially, with a cooldown
    /// between items. Each item fully completes (including its retries)
    /// before the next begins. A failing item stops the batch, but the
    /// renders already produced are kept and returned alongside the
    /// failure.
    pub async fn generate_batch(&self, params: &RenderParams) -> BatchOutcome {
        let mut results = Vec::new();

        for (index, sketch) in params.base_sketches.iter().enumerate() {
            info!("Rendering sketch {}/{}", index + 1, params.base_sketches.len());
            match self.generate_render(params, sketch).await {
                Ok(render_url) => results.push(RenderResult {
                    id: Uuid::new_v4(),
                    sketch_url: sketch.clone(),
                    render_url,
                    mode: params.mode,
                    created_at: chrono::Utc::now(),
                }),
                Err(error) => {
                    return BatchOutcome {
                        results,
                        error: Some(error),
                    };
                }
            }

            if index + 1 < params.base_sketches.len() {
                tokio::time::sleep(BATCH_COOLDOWN).await;
            }
        }

        BatchOutcome {
            results,
            error: None,
        }
    }

    pub async fn edit_image(
        &self,
        base_image: &str,
        instruction: &str,
        annotations: &[Annotation],
    ) -> Result<String, RenderError> {
        let base = self.normalizer.normalize(base_image).await?;
        let request = prompt::assemble_edit(&base, instruction, annotations, &self.render_model);
        let response = invoke_with_retry(MAX_ATTEMPTS, || self.client.generate(&request)).await?;
        extract_image(&response)
    }

    pub async fn modify_with_mask(
        &self,
        base_image: &str,
        mask_image: &str,
        instruction: &str,
    ) -> Result<String, RenderError> {
        let base = self.normalizer.normalize(base_image).await?;
        let mask = self.normalizer.normalize(mask_image).await?;
        let request = prompt::assemble_masked(&base, &mask, instruction, &self.render_model);
        let response = invoke_with_retry(MAX_ATTEMPTS, || self.client.generate(&request)).await?;
        extract_image(&response)
    }

    pub async fn upscale_image(&self, source_image: &str) -> Result<String, RenderError> {
        let source = self.normalizer.normalize(source_image).await?;
        let request = prompt::assemble_upscale(&source, &self.upscale_model);
        let response = invoke_with_retry(MAX_ATTEMPTS, || self.client.generate(&request)).await?;
        extract_image(&response)
    }

    pub async fn decode_reference_dimensions(
        &self,
        reference: &str,
    ) -> Result<(u32, u32), RenderError> {
        let image = self.normalizer.normalize(reference).await?;
        decode_dimensions(&image)
    }

    async fn resolve_aux_images(&self, params: &RenderParams) -> Result<AuxImages, RenderError> {
        let mut aux = AuxImages::default();

        if params.material_mode == MaterialMode::ColorKey {
            // Every mapping with a texture photo contributes a part, even
            // when its color or material field would not produce a rule
            // line.
            for mapping in &params.material_mappings {
                if let Some(texture) = &mapping.texture_image {
                    let image = self.normalizer.normalize(texture).await?;
                    aux.textures.push((mapping.material.clone(), image));
                }
            }
        }

        if params.material_mode == MaterialMode::ReferenceImage {
            if let Some(reference) = &params.material_texture_image {
                aux.material_reference = Some(self.normalizer.normalize(reference).await?);
            }
        }

        match params.mode {
            EnvironmentMode::Interior => {
                if let Some(inspiration) = &params.furniture_inspiration_image {
                    aux.furniture_inspiration =
                        Some(self.normalizer.normalize(inspiration).await?);
                }
            }
            EnvironmentMode::Exterior => {
                if let Some(site) = &params.site_picture {
                    aux.site_photo = Some(self.normalizer.normalize(site).await?);
                }
            }
        }

        Ok(aux)
    }

    fn resolve_aspect_ratio(
        &self,
        params: &RenderParams,
        sketch: &NormalizedImage,
    ) -> Result<AspectRatio, RenderError> {
        match params.aspect_ratio {
            AspectRatio::Auto => {
                let (width, height) = decode_dimensions(sketch)?;
                Ok(prompt::snap_aspect_ratio(width, height))
            }
            explicit => Ok(explicit),
        }
    }
}

/// Pulls the first inline image out of the response envelope as a data
/// URI. Candidates with only text parts are skipped; their text is
/// logged when no image turns up anywhere.
fn extract_image(response: &GenerationResponse) -> Result<String, RenderError> {
    let mut text_note = None;
    for candidate in &response.candidates {
        let Some(content) = &candidate.content else {
            continue;
        };
        for part in &content.parts {
            if let Some(inline) = &part.inline_data {
                if !inline.data.is_empty() {
                    return Ok(format!("data:{};base64,{}", inline.mime_type, inline.data));
                }
            }
            if text_note.is_none() {
                text_note = part.text.as_deref();
            }
        }
    }
    if let Some(note) = text_note {
        warn!("Model returned text instead of an image: {}", note);
    }
    Err(RenderError::NoImageInResponse)
}
