use std::{io::Cursor, sync::Arc};

use anyhow::Context;

use crate::foundation::error::BrushworkResult;

const INCHES_PER_METER: f64 = 0.0254;

/// Decoded raster surface in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct DecodedSurface {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// DPI recorded by the encoder, when the format carries one.
    pub source_dpi: Option<f64>,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl DecodedSurface {
    /// Number of pixel bytes retained by this surface.
    pub fn byte_len(&self) -> usize {
        self.rgba8_premul.len()
    }
}

/// Decode encoded image bytes into a premultiplied RGBA8 surface.
pub fn decode_image(bytes: &[u8]) -> BrushworkResult<DecodedSurface> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(DecodedSurface {
        width,
        height,
        source_dpi: png_dpi(bytes),
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * a + 127) / 255) as u8;
        }
    }
}

/// Horizontal DPI from a PNG `pHYs` chunk, if the unit is meters.
fn png_dpi(bytes: &[u8]) -> Option<f64> {
    let reader = png::Decoder::new(Cursor::new(bytes)).read_info().ok()?;
    let dims = reader.info().pixel_dims?;
    if dims.unit != png::Unit::Meter || dims.xppu == 0 {
        return None;
    }
    Some(f64::from(dims.xppu) * INCHES_PER_METER)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
