use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use consent_types::IdentityMap;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, RngCore, SeedableRng};
use tracing::{debug, warn};

use crate::config::IdentityConfig;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Resolves the element identity of a script.
///
/// Anonymized identities are random tokens memoized in the caller's
/// [`IdentityMap`]; deterministic identities are the configured prefix
/// followed by the script id.
#[derive(Clone, Debug)]
pub struct IdentityAnonymizer {
    prefix: String,
    token_length: usize,
}

impl IdentityAnonymizer {
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            prefix: config.prefix.clone(),
            token_length: config.token_length,
        }
    }

    /// Resolve the identity for `script_id`.
    ///
    /// With `anonymize` set, the first call stores a fresh token in
    /// `identities` and every later call returns that token.
    pub fn resolve(&self, script_id: &str, anonymize: bool, identities: &mut IdentityMap) -> String {
        if !anonymize {
            return self.deterministic(script_id);
        }
        identities
            .get_or_assign(script_id, || {
                let token = self.generate_token();
                debug!(script_id, element_id = %token, "Assigned anonymized identity");
                token
            })
            .to_string()
    }

    pub fn deterministic(&self, script_id: &str) -> String {
        format!("{}{}", self.prefix, script_id)
    }

    /// A random token: a leading letter, then letters and digits.
    pub fn generate_token(&self) -> String {
        let mut rng = token_rng();
        let mut token = String::with_capacity(self.token_length);
        token.push(LETTERS[rng.gen_range(0..LETTERS.len())] as char);
        for _ in 1..self.token_length {
            token.push(ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())] as char);
        }
        token
    }
}

impl Default for IdentityAnonymizer {
    fn default() -> Self {
        Self::new(&IdentityConfig::default())
    }
}

/// Generator seeded from the OS source, or from the clock when that fails.
fn token_rng() -> StdRng {
    let mut seed = [0u8; 32];
    match OsRng.try_fill_bytes(&mut seed) {
        Ok(()) => StdRng::from_seed(seed),
        Err(err) => {
            warn!(error = %err, "OS random source unavailable, using clock-seeded generator");
            StdRng::seed_from_u64(clock_seed())
        }
    }
}

fn clock_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    nanos ^ FALLBACK_COUNTER
        .fetch_add(1, Ordering::Relaxed)
        .rotate_left(32)
}
