use tracing::debug;

use crate::error::{Error, Result};

/// Rasterizes an SVG document to PNG on a white background. `scale` multiplies
/// the SVG's intrinsic pixel size.
pub fn svg_to_png(svg: &str, scale: f32) -> Result<Vec<u8>> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(Error::Raster(format!("scale must be positive, got {scale}")));
    }

    let mut opt = usvg::Options::default();
    // Text falls back to whatever monospace face the host provides.
    opt.fontdb_mut().load_system_fonts();
    opt.font_family = "DejaVu Sans Mono".to_string();

    let tree = usvg::Tree::from_str(svg, &opt)
        .map_err(|e| Error::Raster(format!("invalid SVG: {e}")))?;

    let size = tree.size();
    let width_px = (size.width() * scale).ceil().max(1.0) as u32;
    let height_px = (size.height() * scale).ceil().max(1.0) as u32;

    let mut pixmap = tiny_skia::Pixmap::new(width_px, height_px).ok_or_else(|| {
        Error::Raster(format!("cannot allocate a {width_px}x{height_px} pixmap"))
    })?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );

    let png = pixmap
        .encode_png()
        .map_err(|e| Error::Raster(format!("PNG encoding failed: {e}")))?;
    debug!(width_px, height_px, bytes = png.len(), "rasterized diagram");
    Ok(png)
}
