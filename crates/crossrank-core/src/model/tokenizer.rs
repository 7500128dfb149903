use std::path::Path;

use tokenizers::{PaddingParams, Tokenizer, TruncationParams, TruncationStrategy};

use super::error::ModelError;

/// Loads `tokenizer.json` from a model directory, configured for pair encoding.
///
/// Pairs longer than `max_length` tokens are truncated from the longer side
/// first, and batches are padded to their longest member.
pub fn load_pair_tokenizer(model_dir: &Path, max_length: usize) -> Result<Tokenizer, ModelError> {
    let path = model_dir.join("tokenizer.json");
    if !path.exists() {
        return Err(ModelError::ModelNotFound { path });
    }

    let mut tokenizer =
        Tokenizer::from_file(&path).map_err(|e| ModelError::TokenizationFailed {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;

    let truncation = TruncationParams {
        max_length,
        strategy: TruncationStrategy::LongestFirst,
        ..Default::default()
    };

    tokenizer
        .with_truncation(Some(truncation))
        .map_err(|e| ModelError::TokenizationFailed {
            reason: format!("failed to configure truncation: {e}"),
        })?;

    tokenizer.with_padding(Some(PaddingParams::default()));

    Ok(tokenizer)
}
