use derive_more::{Deref, From};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use strum::Display;

/// Label recorded for an image in which the detector found no face.
pub const NO_EXPRESSION_LABEL: &str = "nofacialexpressions";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FaceBounds {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl FaceBounds {
    pub fn width(&self) -> u32 {
        self.xmax.saturating_sub(self.xmin).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        self.ymax.saturating_sub(self.ymin).max(0) as u32
    }
}

/// One emotion finding for one face, in the shape the classifier reports it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Detection {
    pub emo_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emo_proba: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proba_list: Vec<HashMap<String, f32>>,
    #[serde(flatten)]
    pub bounds: Option<FaceBounds>,
}

impl Detection {
    /// A bare label with no geometry, used for the "no face" placeholder.
    pub fn label_only(label: impl Into<String>) -> Self {
        Self {
            emo_label: label.into(),
            emo_proba: None,
            proba_list: Vec::new(),
            bounds: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageResult {
    pub filename: String,
    pub emotions: Vec<Detection>,
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ItemError {
    pub filename: String,
    pub error: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BatchResponse {
    pub results: Vec<ImageResult>,
    pub errors: Vec<ItemError>,
}

/// Item-level problems reported back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ItemErrorKind {
    #[strum(serialize = "Unable to decode the image file")]
    UndecodableImage,
    #[strum(serialize = "No faces detected in the image")]
    NoFacesDetected,
    #[strum(serialize = "Emotion detection failed")]
    DetectionFailed,
    #[strum(serialize = "Unable to save the annotated image")]
    SaveFailed,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProcessedImage {
    pub filename: String,
    pub url: String,
    pub emo_label: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageCount {
    pub image_count: usize,
}

/// Label histogram, serialized as a flat `{label: count}` object.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Deref, From)]
#[serde(transparent)]
pub struct EmotionCounts(pub BTreeMap<String, usize>);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}
