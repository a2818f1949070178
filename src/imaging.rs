use image::RgbImage;

/// Decodes an uploaded buffer, sniffing the format from its content, and
/// flattens it to 8-bit RGB.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}
