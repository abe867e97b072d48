use chrono::Utc;
use rand::Rng;

use super::repository::{ApplicationRepository, RepositoryError};

const REFERENCE_MIN: u32 = 100_000;
const REFERENCE_MAX: u32 = 999_999;
const RANDOM_ATTEMPTS: usize = 10;

/// Allocate a unique 6-digit bank-transfer reference.
///
/// Uniform random candidates are checked against the store; after ten
/// collisions the allocator falls back to a timestamp-derived suffix, which
/// is not re-checked. The reference is the sole key a human reconciler uses
/// to match an incoming wire to an application.
pub(crate) fn allocate<R>(
    repository: &dyn ApplicationRepository,
    rng: &mut R,
) -> Result<String, RepositoryError>
where
    R: Rng + ?Sized,
{
    for _ in 0..RANDOM_ATTEMPTS {
        let candidate = rng.gen_range(REFERENCE_MIN..=REFERENCE_MAX).to_string();
        if !repository.reference_in_use(&candidate)? {
            return Ok(candidate);
        }
    }

    let span = u64::from(REFERENCE_MAX - REFERENCE_MIN + 1);
    let fallback = REFERENCE_MIN as u64 + (Utc::now().timestamp_millis() as u64 % span);
    Ok(fallback.to_string())
}
