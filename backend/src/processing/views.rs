use shared::{EmotionCounts, ProcessedImage};
use std::collections::BTreeMap;

use super::naming::derive_output_name;
use super::urls::PublicUrls;
use crate::storage::emotion_log::{EmotionLogStore, LogStoreError};

/// Read-only summaries re-derived from the emotion log on every call.
#[derive(Clone)]
pub struct EmotionViews {
    log: EmotionLogStore,
}

impl EmotionViews {
    pub fn new(log: EmotionLogStore) -> Self {
        Self { log }
    }

    pub fn image_count(&self) -> Result<usize, LogStoreError> {
        Ok(self.log.read_all()?.len())
    }

    pub fn emotion_counts(&self) -> Result<EmotionCounts, LogStoreError> {
        let mut counts = BTreeMap::new();
        for record in self.log.read_all()? {
            *counts.entry(record.label).or_insert(0) += 1;
        }
        Ok(EmotionCounts::from(counts))
    }

    /// Lists the last batch's images. Output names are rebuilt with the same
    /// rule the batch processor saved them under.
    pub fn processed_images(&self, urls: &PublicUrls) -> Result<Vec<ProcessedImage>, LogStoreError> {
        let images = self
            .log
            .read_all()?
            .into_iter()
            .map(|record| {
                let filename = derive_output_name(&record.original_filename, &record.label);
                ProcessedImage {
                    url: urls.image_url(&filename),
                    filename,
                    emo_label: record.label,
                }
            })
            .collect();
        Ok(images)
    }
}
