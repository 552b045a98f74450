// src/services/mask.rs
use crate::errors::RenderError;
use crate::models::SelectionBox;
use base64::{Engine as _, engine::general_purpose};
use image::{GrayImage, Luma};

const FROZEN: Luma<u8> = Luma([0]);
const EDITABLE: Luma<u8> = Luma([255]);

/// Rasterizes a percentage-coordinate selection into a binary PNG mask
/// matching the source image's pixel dimensions. White pixels mark the
/// editable region, black pixels are frozen.
pub fn rasterize(
    selection: &SelectionBox,
    image_width: u32,
    image_height: u32,
) -> Result<Vec<u8>, RenderError> {
    if image_width == 0 || image_height == 0 {
        return Err(RenderError::Validation(
            "Mask dimensions must be positive".to_string(),
        ));
    }

    let mut mask = GrayImage::from_pixel(image_width, image_height, FROZEN);

    let x0 = scale(selection.x, image_width);
    let y0 = scale(selection.y, image_height);
    let rect_w = scale(selection.width, image_width);
    let rect_h = scale(selection.height, image_height);

    // Clamp so the editable region never exceeds the image bounds
    let x1 = (x0 + rect_w).min(image_width);
    let y1 = (y0 + rect_h).min(image_height);

    for y in y0.min(image_height)..y1 {
        for x in x0.min(image_width)..x1 {
            mask.put_pixel(x, y, EDITABLE);
        }
    }

    let mut output = Vec::new();
    image::DynamicImage::ImageLuma8(mask)
        .write_to(&mut std::io::Cursor::new(&mut output), image::ImageFormat::Png)
        .map_err(|e| RenderError::Validation(format!("Failed to encode mask: {}", e)))?;

    Ok(output)
}

pub fn rasterize_to_data_uri(
    selection: &SelectionBox,
    image_width: u32,
    image_height: u32,
) -> Result<String, RenderError> {
    let png = rasterize(selection, image_width, image_height)?;
    Ok(format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(png)
    ))
}

fn scale(percent: f64, pixels: u32) -> u32 {
    (percent.clamp(0.0, 100.0) / 100.0 * pixels as f64).round() as u32
}
