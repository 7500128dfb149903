//! Cross-encoder backends and their lifecycle.
//!
//! A [`CrossEncoder`] scores one query against a batch of documents; higher
//! scores mean more relevant. A [`ModelLoader`] builds one, and
//! [`ModelLifecycle`] loads it lazily (or on preload) and hands it out.
//!
//! Backends:
//! - [`BertCrossEncoder`] - candle BERT sequence classifier from a local directory
//! - [`LexicalCrossEncoder`] - term-overlap scorer used when no model path is set

mod bert;
mod device;
pub mod error;
mod lexical;
mod lifecycle;
mod tokenizer;

#[cfg(any(test, feature = "mock"))]
mod mock;

#[cfg(test)]
mod tests;

use std::sync::Arc;

pub use bert::{BertCrossEncoder, BertLoader};
pub use device::select_device;
pub use error::ModelError;
pub use lexical::{LexicalCrossEncoder, StubLoader};
pub use lifecycle::{ModelLifecycle, ModelState};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockCrossEncoder, MockLoader};

use crate::config::Config;

/// Scores query/document pairs.
///
/// Implementations are synchronous and may block; callers run them on a
/// blocking thread.
pub trait CrossEncoder: Send + Sync + std::fmt::Debug {
    /// Returns one score per document, in input order.
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, ModelError>;

    /// Backend name reported by logs and `/ready` (`bert`, `lexical`, ...).
    fn name(&self) -> &str;

    /// `true` for heuristic stand-ins that are not a trained cross-encoder.
    fn is_stub(&self) -> bool {
        false
    }
}

/// Builds a [`CrossEncoder`]. Called from a blocking thread.
pub trait ModelLoader: Send + Sync + std::fmt::Debug {
    fn load(&self) -> Result<Arc<dyn CrossEncoder>, ModelError>;

    /// Configured model identifier, reported by health and logs.
    fn model_id(&self) -> &str;
}

/// Hands out an encoder that already exists.
#[derive(Debug, Clone)]
pub struct InstanceLoader {
    model_id: String,
    encoder: Arc<dyn CrossEncoder>,
}

impl InstanceLoader {
    pub fn new(model_id: impl Into<String>, encoder: Arc<dyn CrossEncoder>) -> Self {
        Self {
            model_id: model_id.into(),
            encoder,
        }
    }
}

impl ModelLoader for InstanceLoader {
    fn load(&self) -> Result<Arc<dyn CrossEncoder>, ModelError> {
        Ok(Arc::clone(&self.encoder))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Picks the loader for a configuration: BERT when a model path is set,
/// otherwise the lexical stand-in.
pub fn loader_from_config(config: &Config) -> Arc<dyn ModelLoader> {
    match &config.model_path {
        Some(path) => Arc::new(BertLoader::new(
            &config.model_name,
            path.clone(),
            config.max_length,
        )),
        None => Arc::new(StubLoader::new(&config.model_name)),
    }
}
