use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{GatewayError, Result};

pub struct Config {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    /// Optional path to a JSON tool manifest registered at startup.
    pub tools_path: Option<PathBuf>,
    /// Path to the sentence-embedding ONNX model used for discovery.
    pub embedding_model_path: PathBuf,
    pub embedding_tokenizer_path: PathBuf,
    pub max_sequence_length: usize,
    /// Optional override for embedding session pool size. If None, uses available cores.
    pub pool_size: Option<usize>,
    /// Number of threads per ONNX session for intra-op parallelism.
    pub intra_threads: usize,
    /// Where the vector index is persisted between process starts.
    pub index_path: PathBuf,
    /// Number of nearest-neighbour candidates pulled per discovery query.
    pub search_limit: usize,
    /// Minimum similarity (0.0 to 1.0] a ranked result must reach.
    pub similarity_threshold: f32,
    /// Append parameter names and enum values to the text fed to the embedder.
    pub keyword_enrichment: bool,
    /// Optional override for concurrent discovery embeddings. If None, uses available cores.
    pub search_permits: Option<usize>,
    pub target_host: String,
    /// Ports probed when enumerating backend targets.
    pub target_ports: RangeInclusive<u16>,
    pub target_timeout_ms: u64,
    /// Command sent to a target to ask for its identity.
    pub target_identity_command: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", "8080")?,
            shutdown_timeout_secs: parse_var("SHUTDOWN_TIMEOUT", "5")?,
            tools_path: env::var("TOOLS_PATH").ok().map(PathBuf::from),
            embedding_model_path: PathBuf::from(
                env::var("EMBEDDING_MODEL_PATH")
                    .unwrap_or_else(|_| "./embedding-model/model.onnx".to_string()),
            ),
            embedding_tokenizer_path: PathBuf::from(
                env::var("EMBEDDING_TOKENIZER_PATH")
                    .unwrap_or_else(|_| "./embedding-model/tokenizer.json".to_string()),
            ),
            max_sequence_length: parse_var("MAX_SEQ_LENGTH", "256")?,
            pool_size: parse_optional_var("EMBEDDING_POOL_SIZE")?,
            intra_threads: parse_var("INTRA_THREADS", "1")?,
            index_path: PathBuf::from(
                env::var("INDEX_PATH").unwrap_or_else(|_| ".toolgate/tool_index.bin".to_string()),
            ),
            search_limit: parse_var("SEARCH_LIMIT", "10")?,
            similarity_threshold: parse_var("SIMILARITY_THRESHOLD", "0.55")?,
            keyword_enrichment: parse_var("KEYWORD_ENRICHMENT", "true")?,
            search_permits: parse_optional_var("SEARCH_PERMITS")?,
            target_host: env::var("TARGET_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            target_ports: parse_port_range(
                &env::var("TARGET_PORTS").unwrap_or_else(|_| "19723-19744".to_string()),
            )?,
            target_timeout_ms: parse_var("TARGET_TIMEOUT_MS", "3000")?,
            target_identity_command: env::var("TARGET_IDENTITY_COMMAND")
                .unwrap_or_else(|_| "API.GetProductInfo".to_string()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_secs: 5,
            tools_path: None,
            embedding_model_path: PathBuf::from("./embedding-model/model.onnx"),
            embedding_tokenizer_path: PathBuf::from("./embedding-model/tokenizer.json"),
            max_sequence_length: 256,
            pool_size: None,
            intra_threads: 1,
            index_path: PathBuf::from(".toolgate/tool_index.bin"),
            search_limit: 10,
            similarity_threshold: 0.55,
            keyword_enrichment: true,
            search_permits: None,
            target_host: "127.0.0.1".to_string(),
            target_ports: 19723..=19744,
            target_timeout_ms: 3000,
            target_identity_command: "API.GetProductInfo".to_string(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e| GatewayError::Config(format!("{name}={raw:?}: {e}")))
}

fn parse_optional_var<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| GatewayError::Config(format!("{name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse `"19723-19744"` or a single port `"19723"`.
pub fn parse_port_range(raw: &str) -> Result<RangeInclusive<u16>> {
    let invalid = |e: String| GatewayError::Config(format!("TARGET_PORTS={raw:?}: {e}"));

    let (start, end) = match raw.split_once('-') {
        Some((start, end)) => (start.trim(), end.trim()),
        None => (raw.trim(), raw.trim()),
    };
    let start: u16 = start.parse().map_err(|e| invalid(format!("{e}")))?;
    let end: u16 = end.parse().map_err(|e| invalid(format!("{e}")))?;

    if start > end {
        return Err(invalid("range start is greater than end".to_string()));
    }
    Ok(start..=end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_port_range() {
        assert_eq!(parse_port_range("19723-19744").unwrap(), 19723..=19744);
        assert_eq!(parse_port_range(" 8000 ").unwrap(), 8000..=8000);
        assert!(parse_port_range("9000-8000").is_err());
        assert!(parse_port_range("abc").is_err());
    }

    #[test]
    fn test_default_search_settings() {
        let config = Config::default();
        assert_eq!(config.search_limit, 10);
        assert!((config.similarity_threshold - 0.55).abs() < f32::EPSILON);
        assert!(config.keyword_enrichment);
    }
}
