//! The inference adapter: decoded image in, top-1 label out.
//!
//! [`OnnxClassifier`] loads an exported pretrained classifier from a model
//! directory once at startup:
//!
//! ```text
//! model/
//!   model.onnx                 graph and weights
//!   config.json                id2label table
//!   preprocessor_config.json   resize / rescale / normalize settings
//! ```
//!
//! Each call runs a single forward pass. There is no batching, no caching and
//! no confidence threshold: the highest-scoring class is always returned.

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};
use tract_onnx::prelude::*;

use crate::labels::LabelTable;
use crate::preprocess::Preprocessor;

pub const MODEL_FILE: &str = "model.onnx";
pub const CONFIG_FILE: &str = "config.json";
pub const PREPROCESSOR_FILE: &str = "preprocessor_config.json";

/// Errors raised while loading the model directory at startup.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("model config has no id2label table")]
    NoLabels,

    #[error("id2label key '{0}' is not a class index")]
    InvalidLabelIndex(String),

    #[error("invalid preprocessor config: {0}")]
    InvalidPreprocessor(String),

    #[error("failed to load ONNX model '{path}': {detail}")]
    Onnx { path: PathBuf, detail: String },
}

/// Errors raised while classifying a single image.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model inference failed: {0}")]
    Run(String),

    #[error("model produced no scores")]
    NoScores,

    #[error("no label for predicted class {0}")]
    UnknownClass(usize),
}

/// Anything that can turn an RGB image into a label.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &RgbImage) -> Result<String, InferenceError>;
}

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub struct OnnxClassifier {
    plan: OnnxPlan,
    preprocessor: Preprocessor,
    labels: LabelTable,
}

impl OnnxClassifier {
    pub fn load(model_dir: &Path) -> Result<Self, ModelError> {
        let labels = LabelTable::from_file(&model_dir.join(CONFIG_FILE))?;
        let preprocessor = Preprocessor::from_file(&model_dir.join(PREPROCESSOR_FILE))?;

        let model_path = model_dir.join(MODEL_FILE);
        let (height, width) = preprocessor.output_size();
        let onnx_err = |e: TractError| ModelError::Onnx {
            path: model_path.clone(),
            detail: format!("{e:#}"),
        };

        let model = tract_onnx::onnx()
            .model_for_path(&model_path)
            .map_err(onnx_err)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .map_err(onnx_err)?
            .into_typed()
            .map_err(onnx_err)?;

        let classifier = Self::from_model(model, preprocessor, labels).map_err(onnx_err)?;
        info!(
            "Loaded model {} (input 1x3x{}x{}, labels: {})",
            model_path.display(),
            height,
            width,
            classifier.labels.labels().collect::<Vec<_>>().join(", ")
        );
        Ok(classifier)
    }

    /// Optimizes an already-typed graph and pairs it with its preprocessing
    /// and label table. The graph's single input must match
    /// `preprocessor.output_size()`.
    pub fn from_model(
        model: TypedModel,
        preprocessor: Preprocessor,
        labels: LabelTable,
    ) -> TractResult<Self> {
        let plan = model.into_optimized()?.into_runnable()?;
        Ok(Self {
            plan,
            preprocessor,
            labels,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, image: &RgbImage) -> Result<String, InferenceError> {
        let input = self.preprocessor.to_tensor(image);
        debug!("Input tensor shape {:?}", input.shape());

        let outputs = self
            .plan
            .run(tvec!(input.into_tensor().into()))
            .map_err(|e| InferenceError::Run(format!("{e:#}")))?;

        let logits = outputs
            .first()
            .ok_or(InferenceError::NoScores)?
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::Run(format!("{e:#}")))?;

        let class = argmax(logits.iter().copied()).ok_or(InferenceError::NoScores)?;
        debug!("Predicted class index {}", class);

        self.labels
            .get(class)
            .map(str::to_string)
            .ok_or(InferenceError::UnknownClass(class))
    }
}

/// Index of the highest score. Ties go to the first maximum; NaN never wins.
pub fn argmax<I>(scores: I) -> Option<usize>
where
    I: IntoIterator<Item = f32>,
{
    let mut best: Option<(usize, f32)> = None;
    for (index, score) in scores.into_iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((index, score)),
        }
    }
    best.map(|(index, _)| index)
}
