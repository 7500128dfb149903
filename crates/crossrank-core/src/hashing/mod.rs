//! Request fingerprinting.
//!
//! A [`Fingerprint`] is the 32-byte BLAKE3 digest of the parts of a
//! [`RerankRequest`] that determine its ranking: the query, the ordered document
//! texts and the exact `top_k`. No case folding or trimming is applied because
//! cross-encoder scores are case sensitive. Every variable-length field is length
//! prefixed so `["ab", "c"]` and `["a", "bc"]` never collide.

use blake3::Hasher;

use crate::rerank::RerankRequest;

const DOMAIN_TAG: &[u8] = b"crossrank/fingerprint/v1";

/// Deterministic cache key for a rerank request.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprints a request. Document metadata is ignored.
    pub fn build(request: &RerankRequest) -> Self {
        Self::from_parts(
            &request.query,
            request.documents.iter().map(|d| d.text.as_str()),
            request.top_k,
        )
    }

    /// Fingerprints raw request fields.
    pub fn from_parts<'a, I>(query: &str, documents: I, top_k: Option<usize>) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut hasher = Hasher::new();
        hasher.update(DOMAIN_TAG);
        update_len_prefixed(&mut hasher, query.as_bytes());

        let mut count: u64 = 0;
        for text in documents {
            update_len_prefixed(&mut hasher, text.as_bytes());
            count += 1;
        }
        hasher.update(&count.to_le_bytes());

        match top_k {
            Some(k) => {
                hasher.update(&[1]);
                hasher.update(&(k as u64).to_le_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }

        Self(*hasher.finalize().as_bytes())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Truncated form for log fields.
    #[inline]
    pub fn short(&self) -> u64 {
        hash_to_u64(&self.0)
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl From<[u8; 32]> for Fingerprint {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({:016x})", self.short())
    }
}

#[inline]
fn update_len_prefixed(hasher: &mut Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// Only used for compact log/trace identifiers; cache keys always use the full
/// 32-byte [`Fingerprint`].
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes)
}
