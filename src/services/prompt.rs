// src/services/prompt.rs
//
// Pure request assembly: no I/O happens here. Every image an instruction
// refers to must already be normalized by the caller.
use crate::models::{
    Annotation, AspectRatio, EnvironmentMode, FurnitureLayoutMode, MaterialMode, RenderParams,
};
use crate::services::gemini::{GenerationRequest, ImageConfig, Part};
use crate::services::image_input::NormalizedImage;
use base64::{Engine as _, engine::general_purpose};

/// Auxiliary images resolved ahead of assembly. Texture entries pair the
/// material name from the mapping with its normalized texture photo.
#[derive(Default)]
pub struct AuxImages {
    pub textures: Vec<(String, NormalizedImage)>,
    pub material_reference: Option<NormalizedImage>,
    pub furniture_inspiration: Option<NormalizedImage>,
    pub site_photo: Option<NormalizedImage>,
}

pub fn assemble_generate(
    params: &RenderParams,
    sketch: &NormalizedImage,
    aux: &AuxImages,
    aspect_ratio: AspectRatio,
    model: &str,
) -> GenerationRequest {
    // Part 0 is always the sketch
    let mut parts = vec![image_part(sketch)];

    let material_block = material_block(params, aux, &mut parts);
    let context_block = context_block(params, aux, &mut parts);

    let final_prompt = format!(
        "ROLE: High-end architectural visualizer.\n\
         TASK: Transform the input sketch (image #0) into a photorealistic {} render.\n\
         CAMERA ANGLE: {}\n\n\
         {}\n\n\
         {}\n\n\
         The geometry and perspective of image #0 are immutable: do not move, add, or remove any structural element.\n\
         OUTPUT QUALITY: 8k resolution, ray-traced lighting, photorealistic.",
        params.style, params.angle, material_block, context_block
    );
    parts.push(Part::Text(final_prompt));

    GenerationRequest {
        model: model.to_string(),
        parts,
        image_config: ImageConfig {
            aspect_ratio: aspect_ratio.ratio().map(|_| aspect_ratio.as_str().to_string()),
            image_size: None,
        },
    }
}

fn material_block(params: &RenderParams, aux: &AuxImages, parts: &mut Vec<Part>) -> String {
    match params.material_mode {
        MaterialMode::ColorKey => {
            // One rule line per usable mapping; duplicates are kept as-is
            let rules: Vec<String> = params
                .material_mappings
                .iter()
                .filter(|m| !m.color.is_empty() && !m.material.is_empty())
                .map(|m| format!("- Color \"{}\" maps to material \"{}\"", m.color, m.material))
                .collect();

            let mut block = format!(
                "STRICT COLOR-MATERIAL MAPPING:\n{}\n\
                 The input sketch (image #0) is color-coded. Identify every area matching the \
                 listed colors and apply the corresponding high-fidelity material. Do not change \
                 the geometry. Use context-appropriate materials for unlisted areas.",
                rules.join("\n")
            );

            for (material, texture) in &aux.textures {
                parts.push(image_part(texture));
                block.push_str(&format!(
                    "\n- Use image #{} as the physical texture reference for \"{}\".",
                    parts.len() - 1,
                    material
                ));
            }
            block
        }
        MaterialMode::ReferenceImage => match &aux.material_reference {
            Some(reference) => {
                parts.push(image_part(reference));
                let mut block = format!(
                    "STYLE & MATERIAL REFERENCE: Use image #{} as the primary source for \
                     materials, lighting, and overall aesthetic. The materials in the generated \
                     render must match the textures and finishes visible in that reference image.",
                    parts.len() - 1
                );
                if !params.material_prompt.trim().is_empty() {
                    block.push_str(&format!("\nADDITIONAL NOTES: {}", params.material_prompt));
                }
                block
            }
            // No reference supplied: behave like the text-prompt strategy
            None => text_material_block(params),
        },
        MaterialMode::TextPrompt => text_material_block(params),
    }
}

fn text_material_block(params: &RenderParams) -> String {
    format!(
        "GLOBAL MATERIAL SPECIFICATIONS & FINISHES:\n{}\n\
         Apply physically plausible material response for each named material: concrete should \
         look porous, wood should show grain, glass and metal should carry accurate roughness \
         and reflectivity.",
        params.material_prompt
    )
}

fn context_block(params: &RenderParams, aux: &AuxImages, parts: &mut Vec<Part>) -> String {
    match params.mode {
        EnvironmentMode::Interior => {
            let mut block = format!("INTERIOR AMBIANCE: {}", params.interior_ambiance);
            match &aux.furniture_inspiration {
                Some(inspiration) => {
                    parts.push(image_part(inspiration));
                    let index = parts.len() - 1;
                    match params.furniture_layout_mode {
                        FurnitureLayoutMode::Empty => block.push_str(&format!(
                            "\nTASK: VIRTUAL STAGING OF AN EMPTY SPACE.\n\
                             1. GEOMETRY PRESERVATION: The input sketch (image #0) is the \
                             architectural shell. Do not modify walls, windows, or ceilings.\n\
                             2. FURNISHING: Furnish the space based on: \"{}\".\n\
                             3. STYLE MATCHING: Use image #{} as the stylistic reference.",
                            params.furniture_prompt, index
                        )),
                        FurnitureLayoutMode::Existing => block.push_str(&format!(
                            "\nTASK: FURNITURE REPLACEMENT.\n\
                             1. SPATIAL INTEGRITY: Preserve room boundaries and furniture \
                             positions from image #0.\n\
                             2. STYLE MATCHING: The new furniture must match the style of image #{}.",
                            index
                        )),
                    }
                }
                None => block.push_str(
                    "\nTASK: INTERIOR REALIZATION. The input sketch is the ground truth. \
                     Preserve all geometry; do not invent openings, walls, or ceilings.",
                ),
            }
            block
        }
        EnvironmentMode::Exterior => match &aux.site_photo {
            // A site photo supersedes the free-text landscape description
            Some(site) => {
                parts.push(image_part(site));
                format!(
                    "SITE CONTEXT: Use image #{} as the strict background and environmental \
                     context. Composite the sketch's building realistically into that photo's \
                     perspective, lighting, and ground plane.",
                    parts.len() - 1
                )
            }
            None => format!("ENVIRONMENT & LANDSCAPE: {}", params.landscape_prompt),
        },
    }
}

pub fn assemble_edit(
    base: &NormalizedImage,
    instruction: &str,
    annotations: &[Annotation],
    model: &str,
) -> GenerationRequest {
    let mut text = format!(
        "Edit this image: {}. Maintain the original perspective and lighting.",
        instruction
    );

    if !annotations.is_empty() {
        text.push_str("\nTarget regions (percent coordinates of the image):");
        for annotation in annotations {
            text.push_str(&format!(
                "\n- \"{}\": x={} y={} width={} height={}",
                annotation.label,
                annotation.region.x.round() as i64,
                annotation.region.y.round() as i64,
                annotation.region.width.round() as i64,
                annotation.region.height.round() as i64,
            ));
        }
        text.push_str("\nPixels outside the listed regions must remain unchanged.");
    }

    GenerationRequest {
        model: model.to_string(),
        parts: vec![image_part(base), Part::Text(text)],
        image_config: ImageConfig::default(),
    }
}

pub fn assemble_masked(
    base: &NormalizedImage,
    mask: &NormalizedImage,
    instruction: &str,
    model: &str,
) -> GenerationRequest {
    let text = format!(
        "Perform a masked edit. Image #0 is the source, image #1 is the mask: the white area \
         is the only editable zone.\n\
         Task: {}.\n\
         Apply changes only inside the white area of the mask. Keep the black area exactly \
         identical to the source image, and blend lighting, perspective, and grain seamlessly \
         at the mask boundary.",
        instruction
    );

    GenerationRequest {
        model: model.to_string(),
        parts: vec![image_part(base), image_part(mask), Part::Text(text)],
        image_config: ImageConfig::default(),
    }
}

pub fn assemble_upscale(source: &NormalizedImage, model: &str) -> GenerationRequest {
    let text = "Upscale this image to 4K resolution. Enhance details, textures, and lighting \
                sharpness while strictly preserving the original composition and geometry. Do \
                not introduce new objects."
        .to_string();

    GenerationRequest {
        model: model.to_string(),
        parts: vec![image_part(source), Part::Text(text)],
        image_config: ImageConfig {
            aspect_ratio: None,
            image_size: Some("4K".to_string()),
        },
    }
}

/// Snaps pixel dimensions to the nearest supported aspect ratio by
/// minimizing the width/height ratio difference.
pub fn snap_aspect_ratio(width: u32, height: u32) -> AspectRatio {
    const SUPPORTED: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::FourThree,
        AspectRatio::ThreeFour,
        AspectRatio::SixteenNine,
        AspectRatio::NineSixteen,
    ];

    let actual = width as f64 / height.max(1) as f64;
    let mut best = AspectRatio::Square;
    let mut best_distance = f64::MAX;
    for candidate in SUPPORTED {
        let distance = (actual - candidate.ratio().unwrap_or(1.0)).abs();
        if distance < best_distance {
            best_distance = distance;
            best = candidate;
        }
    }
    best
}

fn image_part(image: &NormalizedImage) -> Part {
    Part::Image {
        mime_type: image.mime_type.clone(),
        data: general_purpose::STANDARD.encode(&image.data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MaterialMapping, SelectionBox};

    fn sketch() -> NormalizedImage {
        NormalizedImage {
            data: vec![1, 2, 3, 4],
            mime_type: "image/png".to_string(),
        }
    }

    fn base_params(mode: EnvironmentMode, material_mode: MaterialMode) -> RenderParams {
        RenderParams {
            mode,
            style: "Brutalist".to_string(),
            angle: "Eye Level".to_string(),
            landscape_prompt: "alpine meadow at dusk".to_string(),
            interior_ambiance: "warm evening light".to_string(),
            material_prompt: String::new(),
            material_mode,
            aspect_ratio: AspectRatio::Auto,
            material_mappings: Vec::new(),
            material_texture_image: None,
            furniture_inspiration_image: None,
            furniture_layout_mode: FurnitureLayoutMode::Existing,
            furniture_prompt: String::new(),
            site_picture: None,
            base_sketches: Vec::new(),
        }
    }

    fn text_of(request: &GenerationRequest) -> String {
        request
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn exterior_text_prompt_yields_two_parts_with_material_phrase() {
        let mut params = base_params(EnvironmentMode::Exterior, MaterialMode::TextPrompt);
        params.material_prompt = "exposed concrete and glass".to_string();

        let request = assemble_generate(
            &params,
            &sketch(),
            &AuxImages::default(),
            AspectRatio::FourThree,
            "render-model",
        );

        assert_eq!(request.parts.len(), 2);
        assert!(matches!(request.parts[0], Part::Image { .. }));
        let text = text_of(&request);
        assert!(text.contains("exposed concrete and glass"));
        assert!(text.contains("immutable"));
        assert_eq!(request.image_config.aspect_ratio.as_deref(), Some("4:3"));
    }

    #[test]
    fn auto_aspect_ratio_maps_to_no_explicit_config() {
        let params = base_params(EnvironmentMode::Exterior, MaterialMode::TextPrompt);
        let request = assemble_generate(
            &params,
            &sketch(),
            &AuxImages::default(),
            AspectRatio::Auto,
            "render-model",
        );
        assert!(request.image_config.aspect_ratio.is_none());
    }

    #[test]
    fn color_key_keeps_duplicate_colors_and_skips_empty_fields() {
        let mut params = base_params(EnvironmentMode::Exterior, MaterialMode::ColorKey);
        params.material_mappings = vec![
            MaterialMapping {
                color: "red".to_string(),
                material: "brick".to_string(),
                texture_image: None,
            },
            MaterialMapping {
                color: "red".to_string(),
                material: "corten steel".to_string(),
                texture_image: None,
            },
            MaterialMapping {
                color: String::new(),
                material: "ignored".to_string(),
                texture_image: None,
            },
        ];

        let request = assemble_generate(
            &params,
            &sketch(),
            &AuxImages::default(),
            AspectRatio::Square,
            "render-model",
        );
        let text = text_of(&request);
        assert!(text.contains("- Color \"red\" maps to material \"brick\""));
        assert!(text.contains("- Color \"red\" maps to material \"corten steel\""));
        assert!(!text.contains("ignored"));
    }

    #[test]
    fn color_key_textures_are_appended_and_referenced_by_index() {
        let mut params = base_params(EnvironmentMode::Exterior, MaterialMode::ColorKey);
        params.material_mappings = vec![MaterialMapping {
            color: "blue".to_string(),
            material: "zinc".to_string(),
            texture_image: Some("ignored-by-assembler".to_string()),
        }];
        let aux = AuxImages {
            textures: vec![("zinc".to_string(), sketch())],
            ..Default::default()
        };

        let request = assemble_generate(
            &params,
            &sketch(),
            &aux,
            AspectRatio::Square,
            "render-model",
        );
        // sketch + texture + text
        assert_eq!(request.parts.len(), 3);
        let text = text_of(&request);
        assert!(text.contains("image #1 as the physical texture reference for \"zinc\""));
    }

    #[test]
    fn reference_image_mode_appends_reference_part() {
        let mut params = base_params(EnvironmentMode::Interior, MaterialMode::ReferenceImage);
        params.material_prompt = "matte oak floors".to_string();
        let aux = AuxImages {
            material_reference: Some(sketch()),
            ..Default::default()
        };

        let request = assemble_generate(
            &params,
            &sketch(),
            &aux,
            AspectRatio::Square,
            "render-model",
        );
        assert_eq!(request.parts.len(), 3);
        let text = text_of(&request);
        assert!(text.contains("STYLE & MATERIAL REFERENCE: Use image #1"));
        assert!(text.contains("ADDITIONAL NOTES: matte oak floors"));
    }

    #[test]
    fn reference_image_mode_without_image_falls_back_to_text() {
        let mut params = base_params(EnvironmentMode::Interior, MaterialMode::ReferenceImage);
        params.material_prompt = "lime plaster".to_string();

        let request = assemble_generate(
            &params,
            &sketch(),
            &AuxImages::default(),
            AspectRatio::Square,
            "render-model",
        );
        assert_eq!(request.parts.len(), 2);
        assert!(text_of(&request).contains("lime plaster"));
    }

    #[test]
    fn interior_without_inspiration_preserves_geometry() {
        let params = base_params(EnvironmentMode::Interior, MaterialMode::TextPrompt);
        let request = assemble_generate(
            &params,
            &sketch(),
            &AuxImages::default(),
            AspectRatio::Square,
            "render-model",
        );
        let text = text_of(&request);
        assert!(text.contains("INTERIOR REALIZATION"));
        assert!(text.contains("do not invent openings"));
    }

    #[test]
    fn interior_staging_modes_pick_distinct_directives() {
        let mut params = base_params(EnvironmentMode::Interior, MaterialMode::TextPrompt);
        params.furniture_prompt = "mid-century lounge".to_string();
        let aux = AuxImages {
            furniture_inspiration: Some(sketch()),
            ..Default::default()
        };

        params.furniture_layout_mode = FurnitureLayoutMode::Empty;
        let staging = assemble_generate(
            &params,
            &sketch(),
            &aux,
            AspectRatio::Square,
            "render-model",
        );
        assert!(text_of(&staging).contains("VIRTUAL STAGING OF AN EMPTY SPACE"));
        assert!(text_of(&staging).contains("mid-century lounge"));

        params.furniture_layout_mode = FurnitureLayoutMode::Existing;
        let replacement = assemble_generate(
            &params,
            &sketch(),
            &aux,
            AspectRatio::Square,
            "render-model",
        );
        assert!(text_of(&replacement).contains("FURNITURE REPLACEMENT"));
    }

    #[test]
    fn site_photo_supersedes_landscape_prompt() {
        let params = base_params(EnvironmentMode::Exterior, MaterialMode::TextPrompt);
        let aux = AuxImages {
            site_photo: Some(sketch()),
            ..Default::default()
        };

        let request = assemble_generate(
            &params,
            &sketch(),
            &aux,
            AspectRatio::Square,
            "render-model",
        );
        let text = text_of(&request);
        assert!(text.contains("SITE CONTEXT"));
        assert!(!text.contains("alpine meadow at dusk"));
    }

    #[test]
    fn edit_request_renders_annotation_boxes_with_integer_coordinates() {
        let annotations = vec![
            Annotation {
                region: SelectionBox {
                    x: 10.4,
                    y: 9.6,
                    width: 20.0,
                    height: 20.0,
                },
                label: "glass".to_string(),
            },
            Annotation {
                region: SelectionBox {
                    x: 50.0,
                    y: 50.0,
                    width: 10.0,
                    height: 10.0,
                },
                label: "brick".to_string(),
            },
        ];

        let request = assemble_edit(&sketch(), "swap the facade", &annotations, "render-model");
        assert_eq!(request.parts.len(), 2);
        let text = text_of(&request);
        assert!(text.contains("- \"glass\": x=10 y=10 width=20 height=20"));
        assert!(text.contains("- \"brick\": x=50 y=50 width=10 height=10"));
        assert!(text.contains("Pixels outside the listed regions must remain unchanged."));
    }

    #[test]
    fn edit_request_without_annotations_omits_region_constraint() {
        let request = assemble_edit(&sketch(), "warmer lighting", &[], "render-model");
        let text = text_of(&request);
        assert!(text.contains("warmer lighting"));
        assert!(!text.contains("Target regions"));
    }

    #[test]
    fn masked_edit_is_three_parts_with_mask_contract() {
        let request = assemble_masked(&sketch(), &sketch(), "replace the cladding", "render-model");
        assert_eq!(request.parts.len(), 3);
        let text = text_of(&request);
        assert!(text.contains("white area"));
        assert!(text.contains("Keep the black area exactly identical"));
    }

    #[test]
    fn upscale_targets_4k_image_size() {
        let request = assemble_upscale(&sketch(), "upscale-model");
        assert_eq!(request.parts.len(), 2);
        assert_eq!(request.image_config.image_size.as_deref(), Some("4K"));
        assert!(text_of(&request).contains("Do not introduce new objects"));
    }

    #[test]
    fn aspect_ratio_snaps_to_nearest_supported() {
        assert_eq!(snap_aspect_ratio(1920, 1080), AspectRatio::SixteenNine);
        assert_eq!(snap_aspect_ratio(1080, 1920), AspectRatio::NineSixteen);
        assert_eq!(snap_aspect_ratio(1024, 1024), AspectRatio::Square);
        assert_eq!(snap_aspect_ratio(1600, 1200), AspectRatio::FourThree);
        assert_eq!(snap_aspect_ratio(1200, 1600), AspectRatio::ThreeFour);
    }
}
