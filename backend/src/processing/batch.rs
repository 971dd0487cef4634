use shared::{BatchResponse, Detection, ImageResult, ItemError, ItemErrorKind, NO_EXPRESSION_LABEL};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use super::naming::{derive_output_name, sanitize_filename};
use super::urls::PublicUrls;
use crate::config::BatchPolicy;
use crate::detector::EmotionDetector;
use crate::imaging::annotate::Annotator;
use crate::imaging::codec;
use crate::storage::emotion_log::{EmotionLogStore, EmotionRecord, LogStoreError};
use crate::storage::paths::StoragePaths;

/// One uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadItem {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// An image that was annotated, saved and recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedItem {
    pub original_filename: String,
    pub output_filename: String,
    pub label: String,
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Success(ProcessedItem),
    /// Saved and recorded, but also reported as an error to the client.
    SuccessWithWarning(ProcessedItem, ItemErrorKind),
    /// Nothing was saved or recorded.
    Failure {
        filename: String,
        reason: ItemErrorKind,
    },
}

impl ItemOutcome {
    pub fn record(&self) -> Option<EmotionRecord> {
        match self {
            ItemOutcome::Success(item) | ItemOutcome::SuccessWithWarning(item, _) => Some(
                EmotionRecord::new(item.original_filename.clone(), item.label.clone()),
            ),
            ItemOutcome::Failure { .. } => None,
        }
    }
}

#[derive(Debug)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    /// Flattens outcomes into the two client-facing lists. A warning outcome
    /// lands in both.
    pub fn into_response(self, urls: &PublicUrls) -> BatchResponse {
        let mut response = BatchResponse::default();
        for outcome in self.outcomes {
            match outcome {
                ItemOutcome::Success(item) => response.results.push(image_result(item, urls)),
                ItemOutcome::SuccessWithWarning(item, warning) => {
                    response.errors.push(ItemError {
                        filename: item.original_filename.clone(),
                        error: warning.to_string(),
                    });
                    response.results.push(image_result(item, urls));
                }
                ItemOutcome::Failure { filename, reason } => response.errors.push(ItemError {
                    filename,
                    error: reason.to_string(),
                }),
            }
        }
        response
    }
}

fn image_result(item: ProcessedItem, urls: &PublicUrls) -> ImageResult {
    ImageResult {
        url: urls.image_url(&item.output_filename),
        filename: item.output_filename,
        emotions: item.detections,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("No image files provided")]
    Empty,
    #[error(transparent)]
    Log(#[from] LogStoreError),
}

/// Runs uploads through decode, detect, annotate, save and record.
#[derive(Clone)]
pub struct BatchProcessor {
    paths: StoragePaths,
    log: EmotionLogStore,
    detector: Arc<dyn EmotionDetector>,
    annotator: Annotator,
    batch_lock: Option<Arc<Mutex<()>>>,
}

impl BatchProcessor {
    pub fn new(
        paths: StoragePaths,
        log: EmotionLogStore,
        detector: Arc<dyn EmotionDetector>,
        annotator: Annotator,
        policy: BatchPolicy,
    ) -> Self {
        let batch_lock = match policy {
            BatchPolicy::Unlocked => None,
            BatchPolicy::Serialized => Some(Arc::new(Mutex::new(()))),
        };
        Self {
            paths,
            log,
            detector,
            annotator,
            batch_lock,
        }
    }

    /// Processes every item in order, then replaces the log with this batch's
    /// records. Item failures never stop the batch.
    pub fn process_batch(&self, items: Vec<UploadItem>) -> Result<BatchReport, BatchError> {
        if items.is_empty() {
            return Err(BatchError::Empty);
        }

        let _guard = self
            .batch_lock
            .as_ref()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner));

        let batch_id = Uuid::new_v4();
        log::info!("Batch {}: processing {} images", batch_id, items.len());

        let outcomes: Vec<ItemOutcome> = items
            .into_iter()
            .map(|item| self.process_item(batch_id, item))
            .collect();

        let records: Vec<EmotionRecord> = outcomes.iter().filter_map(ItemOutcome::record).collect();
        self.log.write_batch(&records)?;

        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Failure { .. }))
            .count();
        log::info!(
            "Batch {}: {} recorded, {} failed",
            batch_id,
            records.len(),
            failed
        );

        Ok(BatchReport { batch_id, outcomes })
    }

    fn process_item(&self, batch_id: Uuid, item: UploadItem) -> ItemOutcome {
        let filename = sanitize_filename(&item.filename);
        if filename.is_empty() {
            log::warn!(
                "Batch {}: upload name {:?} sanitized to an empty name",
                batch_id,
                item.filename
            );
        }

        let decoded = match codec::decode(&item.bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Batch {}: could not decode {}: {}", batch_id, filename, e);
                return ItemOutcome::Failure {
                    filename,
                    reason: ItemErrorKind::UndecodableImage,
                };
            }
        };

        let detections = match self.detector.detect(&decoded.image) {
            Ok(detections) => detections,
            Err(e) => {
                log::warn!("Batch {}: detection failed for {}: {}", batch_id, filename, e);
                return ItemOutcome::Failure {
                    filename,
                    reason: ItemErrorKind::DetectionFailed,
                };
            }
        };

        let (label, annotated, detections, warning) = match detections.first() {
            None => (
                NO_EXPRESSION_LABEL.to_string(),
                self.annotator.annotate_label(&decoded.image, NO_EXPRESSION_LABEL),
                vec![Detection::label_only(NO_EXPRESSION_LABEL)],
                Some(ItemErrorKind::NoFacesDetected),
            ),
            Some(first) if !is_label_token(&first.emo_label) => {
                log::warn!(
                    "Batch {}: detector returned unusable label {:?} for {}",
                    batch_id,
                    first.emo_label,
                    filename
                );
                return ItemOutcome::Failure {
                    filename,
                    reason: ItemErrorKind::DetectionFailed,
                };
            }
            // the first face names the file even when there are several
            Some(first) => (
                first.emo_label.clone(),
                self.annotator.annotate_detections(&decoded.image, &detections),
                detections.clone(),
                None,
            ),
        };

        let output_filename = derive_output_name(&filename, &label);
        let output_path = self.paths.output_path(&output_filename);
        if let Err(e) = codec::write(&output_path, &annotated, decoded.format) {
            log::error!(
                "Batch {}: failed to write {}: {}",
                batch_id,
                output_path.display(),
                e
            );
            return ItemOutcome::Failure {
                filename,
                reason: ItemErrorKind::SaveFailed,
            };
        }
        log::debug!("Batch {}: saved {}", batch_id, output_path.display());

        let processed = ProcessedItem {
            original_filename: filename,
            output_filename,
            label,
            detections,
        };
        match warning {
            Some(warning) => ItemOutcome::SuccessWithWarning(processed, warning),
            None => ItemOutcome::Success(processed),
        }
    }
}

/// Labels end up in file names and log lines, so only `[A-Za-z0-9_-]+` is
/// accepted.
fn is_label_token(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}
