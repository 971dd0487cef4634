use image::{DynamicImage, ImageFormat, ImageResult};
use std::path::Path;

/// A decoded upload plus the container format its bytes were sniffed as.
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: Option<ImageFormat>,
}

pub fn decode(bytes: &[u8]) -> ImageResult<DecodedImage> {
    let format = image::guess_format(bytes).ok();
    let image = image::load_from_memory(bytes)?;
    Ok(DecodedImage { image, format })
}

/// Writes `image` with the encoder implied by the path's extension, then
/// `fallback`, then PNG.
pub fn write(path: &Path, image: &DynamicImage, fallback: Option<ImageFormat>) -> ImageResult<()> {
    let format = ImageFormat::from_path(path)
        .ok()
        .or(fallback)
        .unwrap_or(ImageFormat::Png);

    let encodable = match format {
        // JPEG has no alpha channel
        ImageFormat::Jpeg if image.color().has_alpha() => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image.clone(),
    };
    encodable.save_with_format(path, format)
}

pub fn encode_png(image: &DynamicImage) -> ImageResult<Vec<u8>> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
