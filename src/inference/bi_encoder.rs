//! Bi-encoder sentence embeddings for tool discovery.
//!
//! Query and tool descriptions are encoded independently, so tool vectors can
//! be computed once and stored in the search index.

use crate::error::{GatewayError, Result};
use crate::inference::model::SessionPool;
use crate::inference::tokenize::TokenizerWrapper;
use crate::inference::Embedder;
use ndarray::Array2;
use ort::value::Tensor;
use std::path::Path;

/// Sentence-transformer style embedding model (mean pooling + L2 normalization).
pub struct BiEncoderModel {
    pool: SessionPool,
    tokenizer: TokenizerWrapper,
    model_id: String,
}

impl BiEncoderModel {
    /// Load bi-encoder model and tokenizer.
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `tokenizer_path` - Path to the tokenizer JSON file
    /// * `max_length` - Maximum sequence length
    /// * `pool_size` - Number of ONNX sessions for concurrent encoding
    /// * `intra_threads` - Threads per session
    pub fn load(
        model_path: &Path,
        tokenizer_path: &Path,
        max_length: usize,
        pool_size: usize,
        intra_threads: usize,
    ) -> Result<Self> {
        let tokenizer = TokenizerWrapper::load(tokenizer_path, max_length)?;
        let pool = SessionPool::load(model_path, pool_size, intra_threads)?;

        tracing::info!(
            model = %model_path.display(),
            tokenizer = %tokenizer_path.display(),
            max_length,
            pool_size = pool.size(),
            "Bi-encoder model loaded"
        );

        Ok(Self {
            pool,
            tokenizer,
            model_id: model_path.display().to_string(),
        })
    }
}

impl Embedder for BiEncoderModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Encode a batch of texts into L2-normalized embedding vectors.
    ///
    /// # Returns
    /// Array2<f32> of shape (batch_size, embedding_dim)
    fn embed_batch(&self, texts: &[String]) -> Result<Array2<f32>> {
        if texts.is_empty() {
            return Err(GatewayError::Model("Cannot embed an empty batch".to_string()));
        }

        let batch = self.tokenizer.encode_batch(texts)?;
        let (batch_size, max_len) = (batch.batch_size, batch.seq_len);

        let shape = [batch_size, max_len];
        let input_ids_tensor = Tensor::from_array((shape, batch.input_ids))
            .map_err(|e| GatewayError::Model(e.to_string()))?;
        let attention_mask_tensor = Tensor::from_array((shape, batch.attention_mask.clone()))
            .map_err(|e| GatewayError::Model(e.to_string()))?;
        let token_type_ids_tensor = Tensor::from_array((shape, batch.token_type_ids))
            .map_err(|e| GatewayError::Model(e.to_string()))?;

        let attention_mask = batch.attention_mask;

        self.pool.with_session(|session| {
            let outputs = session
                .run(ort::inputs![
                    "input_ids" => input_ids_tensor,
                    "attention_mask" => attention_mask_tensor,
                    "token_type_ids" => token_type_ids_tensor,
                ])
                .map_err(|e| GatewayError::Model(format!("Bi-encoder inference failed: {}", e)))?;

            // Extract last_hidden_state (batch, seq_len, hidden_size)
            let hidden_state = outputs.get("last_hidden_state").ok_or_else(|| {
                GatewayError::Model("No 'last_hidden_state' output found".to_string())
            })?;

            let (shape_info, data) = hidden_state
                .try_extract_tensor::<f32>()
                .map_err(|e| GatewayError::Model(e.to_string()))?;
            let hidden_size = shape_info[2] as usize;

            Ok(mean_pool(data, &attention_mask, batch_size, max_len, hidden_size))
        })
    }
}

/// Mean pooling over non-padding tokens followed by L2 normalization.
fn mean_pool(
    data: &[f32],
    attention_mask: &[i64],
    batch_size: usize,
    max_len: usize,
    hidden_size: usize,
) -> Array2<f32> {
    let mut embeddings = Array2::zeros((batch_size, hidden_size));

    for i in 0..batch_size {
        let mut sum = vec![0.0f32; hidden_size];
        let mut count = 0.0f32;

        for j in 0..max_len {
            if attention_mask[i * max_len + j] == 1 {
                let base_idx = i * max_len * hidden_size + j * hidden_size;
                for (k, sum_val) in sum.iter_mut().enumerate() {
                    *sum_val += data[base_idx + k];
                }
                count += 1.0;
            }
        }

        if count > 0.0 {
            for (k, sum_val) in sum.iter().enumerate() {
                embeddings[[i, k]] = sum_val / count;
            }
        }

        let norm: f32 = embeddings.row(i).iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            embeddings.row_mut(i).mapv_inplace(|v| v / norm);
        }
    }

    embeddings
}
