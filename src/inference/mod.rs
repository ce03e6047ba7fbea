pub mod bi_encoder;
pub mod model;
pub mod tokenize;

pub use bi_encoder::BiEncoderModel;
pub use model::SessionPool;
pub use tokenize::TokenizerWrapper;

use crate::error::{GatewayError, Result};
use ndarray::{Array1, Array2};

/// Text → fixed-length vector capability used by the search index.
pub trait Embedder: Send + Sync {
    /// Identifies the model; part of the persisted index fingerprint.
    fn model_id(&self) -> &str;

    /// Embed every text; row `i` of the result belongs to `texts[i]`.
    fn embed_batch(&self, texts: &[String]) -> Result<Array2<f32>>;

    fn embed(&self, text: &str) -> Result<Array1<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()])?;
        if embeddings.nrows() != 1 {
            return Err(GatewayError::Model(format!(
                "Expected one embedding, got {}",
                embeddings.nrows()
            )));
        }
        Ok(embeddings.row(0).to_owned())
    }
}
