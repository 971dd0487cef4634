pub mod remote;

use image::DynamicImage;
use shared::Detection;

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("Failed to prepare image for detection: {0}")]
    Encoding(#[from] image::ImageError),
    #[error("Detector request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Detector returned status {0}")]
    Status(u16),
}

/// The facial-expression classifier, treated as an opaque capability.
///
/// Returns one entry per face in the classifier's own order; an empty list
/// means no face was found.
pub trait EmotionDetector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError>;
}

impl<F> EmotionDetector for F
where
    F: Fn(&DynamicImage) -> Result<Vec<Detection>, DetectorError> + Send + Sync,
{
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
        self(image)
    }
}
