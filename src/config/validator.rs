use crate::config::Config;
use crate::error::{Result, ValidationError, VellumError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_store(config, &mut errors);
        Self::validate_chunking(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_ingest(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(VellumError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        let mode = &config.embedding.mode;
        if mode != "local" && mode != "cloud" {
            errors.push(ValidationError::new(
                "embedding.mode",
                format!("Mode must be 'local' or 'cloud', got '{}'", mode),
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }

        if config.embedding.dimension == 0 {
            errors.push(ValidationError::new(
                "embedding.dimension",
                "Embedding dimension must be greater than 0",
            ));
        }

        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if mode == "cloud" && config.embedding.base_url.is_none() {
            errors.push(ValidationError::new(
                "embedding.base_url",
                "Base URL is required in cloud mode",
            ));
        }
    }

    fn validate_store(config: &Config, errors: &mut Vec<ValidationError>) {
        let backend = &config.store.backend;
        if backend != "memory" && backend != "rest" {
            errors.push(ValidationError::new(
                "store.backend",
                format!("Backend must be 'memory' or 'rest', got '{}'", backend),
            ));
        }

        if backend == "rest" && config.store.base_url.is_none() {
            errors.push(ValidationError::new(
                "store.base_url",
                "Base URL is required for the rest backend",
            ));
        }

        if config.store.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "store.timeout_secs",
                "Store timeout must be greater than 0",
            ));
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.chunking.target_size == 0 {
            errors.push(ValidationError::new(
                "chunking.target_size",
                "Target size must be greater than 0",
            ));
        }

        // Overlap equal to or above the target would make chunking loop on
        // its own tail.
        if config.chunking.overlap >= config.chunking.target_size {
            errors.push(ValidationError::new(
                "chunking.overlap",
                format!(
                    "Overlap ({}) must be smaller than target size ({})",
                    config.chunking.overlap, config.chunking.target_size
                ),
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be greater than 0",
            ));
        }
    }

    fn validate_ingest(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.ingest.call_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "ingest.call_timeout_secs",
                "Call timeout must be greater than 0",
            ));
        }
    }
}
