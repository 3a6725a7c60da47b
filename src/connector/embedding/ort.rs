use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use tokenizers::{Encoding, Tokenizer};
use tracing::{debug, info};

use crate::application::EmbeddingProvider;
use crate::connector::embedding::profile::EmbeddingProfile;
use crate::domain::IndexError;

const DEFAULT_DIMENSIONS: usize = 384;
const DEFAULT_MAX_SEQ_LENGTH: usize = 256;
const MODEL_VERSION: &str = "1";

/// ONNX Runtime embedding provider. Token-level model outputs are
/// mean-pooled over the attention mask; all vectors leave L2-normalized.
pub struct OrtEmbeddingProvider {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    model_id: String,
    dim: usize,
    max_seq_length: usize,
}

/// Row-major padded token matrix for one inference call. Rows are padded
/// with zeros to a common width, which doubles as the attention cutoff.
struct TokenizedBatch {
    rows: usize,
    width: usize,
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
    token_type_ids: Vec<i64>,
}

impl TokenizedBatch {
    fn build(encodings: &[Encoding], width_cap: usize) -> Self {
        let width = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .clamp(1, width_cap);
        let rows = encodings.len();

        let mut batch = Self {
            rows,
            width,
            input_ids: Vec::with_capacity(rows * width),
            attention_mask: Vec::with_capacity(rows * width),
            token_type_ids: Vec::with_capacity(rows * width),
        };
        for encoding in encodings {
            push_padded(&mut batch.input_ids, encoding.get_ids(), width);
            push_padded(&mut batch.attention_mask, encoding.get_attention_mask(), width);
            push_padded(&mut batch.token_type_ids, encoding.get_type_ids(), width);
        }
        batch
    }

    fn shape(&self) -> [usize; 2] {
        [self.rows, self.width]
    }

    fn mask_row(&self, row: usize) -> &[i64] {
        &self.attention_mask[row * self.width..(row + 1) * self.width]
    }
}

/// Truncate-or-pad one token row into the flat batch buffer.
fn push_padded(buffer: &mut Vec<i64>, values: &[u32], width: usize) {
    let taken = values.len().min(width);
    buffer.extend(values[..taken].iter().map(|&v| i64::from(v)));
    buffer.resize(buffer.len() + (width - taken), 0);
}

fn int_tensor(shape: [usize; 2], data: Vec<i64>, name: &str) -> Result<Tensor<i64>, IndexError> {
    Tensor::from_array((shape, data))
        .map_err(|e| IndexError::embedding(format!("tensor build failed ({}): {}", name, e)))
}

/// Average the attended token vectors of one row.
fn mean_pooled(tokens: &[f32], mask: &[i64], hidden: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden];
    let mut attended = 0usize;

    for (position, token) in tokens.chunks_exact(hidden).enumerate() {
        if mask.get(position).copied().unwrap_or(0) == 0 {
            continue;
        }
        for (accumulator, component) in pooled.iter_mut().zip(token) {
            *accumulator += component;
        }
        attended += 1;
    }

    if attended > 0 {
        let scale = 1.0 / attended as f32;
        for value in &mut pooled {
            *value *= scale;
        }
    }
    pooled
}

fn l2_normalized(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

impl OrtEmbeddingProvider {
    pub fn for_profile(profile: EmbeddingProfile) -> Result<Self, IndexError> {
        Self::new(profile.model_id())
    }

    pub fn new(model_id: &str) -> Result<Self, IndexError> {
        info!("Initializing ORT embedding provider with model {}", model_id);
        let (model_path, tokenizer_path) = Self::fetch_from_hub(model_id)?;
        Self::from_paths(model_path, tokenizer_path, model_id)
    }

    fn fetch_from_hub(model_id: &str) -> Result<(PathBuf, PathBuf), IndexError> {
        let hub = hf_hub::api::sync::ApiBuilder::new()
            .with_progress(true)
            .build()
            .map_err(|e| IndexError::embedding(format!("hub client init failed: {}", e)))?;
        let repo = hub.model(model_id.to_string());

        let tokenizer_path = repo.get("tokenizer.json").map_err(|e| {
            IndexError::embedding(format!("tokenizer fetch failed for {}: {}", model_id, e))
        })?;
        // Some repos nest the ONNX export under onnx/.
        let model_path = repo
            .get("model.onnx")
            .or_else(|_| repo.get("onnx/model.onnx"))
            .map_err(|e| {
                IndexError::embedding(format!("ONNX fetch failed for {}: {}", model_id, e))
            })?;

        Ok((model_path, tokenizer_path))
    }

    pub fn from_paths(
        model_path: PathBuf,
        tokenizer_path: PathBuf,
        model_id: &str,
    ) -> Result<Self, IndexError> {
        info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()
            .map_err(|e| IndexError::embedding(format!("session builder init failed: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| IndexError::embedding(format!("optimizer setup failed: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| {
                IndexError::embedding(format!(
                    "model load failed from {}: {}",
                    model_path.display(),
                    e
                ))
            })?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            IndexError::embedding(format!(
                "tokenizer load failed from {}: {}",
                tokenizer_path.display(),
                e
            ))
        })?;

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            model_id: model_id.to_string(),
            dim: DEFAULT_DIMENSIONS,
            max_seq_length: DEFAULT_MAX_SEQ_LENGTH,
        })
    }

    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, IndexError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| IndexError::embedding(format!("batch tokenization failed: {}", e)))?;
        let batch = TokenizedBatch::build(&encodings, self.max_seq_length);
        let shape = batch.shape();

        let mut session = self
            .session
            .lock()
            .map_err(|_| IndexError::embedding("inference session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => int_tensor(shape, batch.input_ids.clone(), "input_ids")?,
                "attention_mask" => int_tensor(shape, batch.attention_mask.clone(), "attention_mask")?,
                "token_type_ids" => int_tensor(shape, batch.token_type_ids.clone(), "token_type_ids")?,
            ])
            .map_err(|e| IndexError::embedding(format!("inference run failed: {}", e)))?;

        let value = outputs
            .iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| IndexError::embedding("model produced no outputs"))?;
        let (raw_shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| IndexError::embedding(format!("output extraction failed: {}", e)))?;

        let dims: Vec<usize> = raw_shape.iter().map(|&d| d as usize).collect();
        debug!("Embedding output dims: {:?}", dims);

        match dims.as_slice() {
            // Token-level output: pool each row over its attention mask.
            [rows, seq, hidden] => Ok((0..*rows)
                .map(|row| {
                    let tokens = &data[row * seq * hidden..(row + 1) * seq * hidden];
                    l2_normalized(mean_pooled(tokens, batch.mask_row(row), *hidden))
                })
                .collect()),
            // Sentence-level output: rows come back already pooled.
            [_, hidden] => Ok(data
                .chunks_exact(*hidden)
                .map(|row| l2_normalized(row.to_vec()))
                .collect()),
            other => Err(IndexError::embedding(format!(
                "unsupported output rank: {:?}",
                other
            ))),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OrtEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.embed_texts(&refs)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn model_version(&self) -> &str {
        MODEL_VERSION
    }
}
