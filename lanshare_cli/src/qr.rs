//! QR code rendering for the share URL

use anyhow::{Context, Result};
use qrcode::QrCode;
use qrcode::render::unicode::Dense1x2;
use std::path::Path;

/// Render `url` with half-block characters, two modules per line.
///
/// Colors are inverted so the code scans on dark terminal themes.
pub fn render_terminal(url: &str) -> Result<String> {
    let code = QrCode::new(url.as_bytes())?;
    Ok(code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Write `url` as a PNG QR code
pub fn save_png(url: &str, path: &Path) -> Result<()> {
    let code = QrCode::new(url.as_bytes())?;

    let qr_image = code
        .render::<image::Luma<u8>>()
        .min_dimensions(200, 200)
        .max_dimensions(400, 400)
        .build();

    qr_image
        .save(path)
        .with_context(|| format!("Failed to write QR code to {}", path.display()))?;
    Ok(())
}
