//! Feature-hashing embedder.
//!
//! Tokens are maximal runs of alphanumeric characters, lowercased. Each token
//! adds `1.0` to bucket `fnv1a64(token) % dims`, and the result is scaled to
//! unit length. Texts sharing words land close together; no model files or
//! network access are involved, so output is identical on every machine.

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{normalize_l2, EmbeddingProvider};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub struct HashProvider {
    dims: usize,
}

impl HashProvider {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            bail!("hash embedding dims must be > 0");
        }
        Ok(Self { dims })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vec = vec![0.0f32; self.dims];
        let mut tokens = 0usize;

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a64(&token.to_lowercase()) % self.dims as u64) as usize;
            vec[bucket] += 1.0;
            tokens += 1;
        }

        if tokens == 0 {
            bail!("cannot embed text with no word tokens");
        }

        normalize_l2(&mut vec);
        Ok(vec)
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
}

fn fnv1a64(s: &str) -> u64 {
    s.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}
