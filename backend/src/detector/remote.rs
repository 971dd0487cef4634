use image::DynamicImage;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use shared::Detection;

use super::{DetectorError, EmotionDetector};
use crate::config::DetectorConfig;
use crate::imaging::codec;

/// Sends each image as PNG to an HTTP classifier service and reads back a JSON
/// array of detections.
#[derive(Clone)]
pub struct RemoteDetector {
    client: Client,
    url: String,
}

impl RemoteDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self, DetectorError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl EmotionDetector for RemoteDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectorError> {
        let body = codec::encode_png(image)?;
        log::debug!("Sending {} byte image to detector at {}", body.len(), self.url);

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "image/png")
            .body(body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            log::error!("Detector at {} answered {}", self.url, status);
            return Err(DetectorError::Status(status.as_u16()));
        }

        let detections: Vec<Detection> = response.json()?;
        log::debug!("Detector found {} faces", detections.len());
        Ok(detections)
    }
}
