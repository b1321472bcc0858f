// document-toolkit/src/renderers/embed.rs

use crate::error::Result;
use crate::renderers::canvas::{PageCanvas, PendingImage, Rect};
use image::GenericImageView;
use lopdf::{dictionary, Stream};
use tracing::debug;

/// Largest rectangle with the image's aspect ratio that fits inside `bounds`,
/// anchored at the bounds' bottom-left corner.
pub fn fit_within(image_width: u32, image_height: u32, bounds: Rect) -> Rect {
    if image_width == 0 || image_height == 0 {
        return Rect { width: 0.0, height: 0.0, ..bounds };
    }
    let scale = (bounds.width / image_width as f32).min(bounds.height / image_height as f32);
    Rect {
        x: bounds.x,
        y: bounds.y,
        width: image_width as f32 * scale,
        height: image_height as f32 * scale,
    }
}

/// Decodes `image_bytes` in memory and places it on `canvas` inside `rect`.
///
/// Returns the rectangle the image actually occupies.
pub fn embed_image(canvas: &mut PageCanvas, image_bytes: &[u8], rect: Rect) -> Result<Rect> {
    let decoded = image::load_from_memory(image_bytes)?;
    let (width, height) = decoded.dimensions();

    let rgb = decoded.to_rgb8().into_raw();
    let image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
        },
        rgb,
    );

    let soft_mask = if decoded.color().has_alpha() {
        let alpha: Vec<u8> = decoded.to_rgba8().pixels().map(|p| p[3]).collect();
        Some(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8_i64,
            },
            alpha,
        ))
    } else {
        None
    };

    let placed = fit_within(width, height, rect);
    debug!(
        width,
        height,
        placed_width = placed.width,
        placed_height = placed.height,
        "Embedding image"
    );

    let name = canvas.next_image_name();
    canvas.draw_image(
        PendingImage {
            name,
            image,
            soft_mask,
        },
        placed,
    );
    Ok(placed)
}
