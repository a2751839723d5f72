//! Resource ID generation

use rand::Rng;

/// Generate a snowflake-style i64 for use as a resource ID.
///
/// Layout (53 bits, fits in JavaScript's Number.MAX_SAFE_INTEGER):
///   - 41 bits: milliseconds since 2024-01-01 UTC (~69 years)
///   - 12 bits: random (4096 values per ms, collision-free at venue scale)
pub fn snowflake_id() -> i64 {
    // Custom epoch: 2024-01-01 00:00:00 UTC
    const EPOCH_MS: i64 = 1_704_067_200_000;
    let now = super::time::now_millis();
    let ts = (now - EPOCH_MS) & 0x1FF_FFFF_FFFF; // 41 bits
    let rand_bits: i64 = rand::thread_rng().gen_range(0..0x1000); // 12 bits
    (ts << 12) | rand_bits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_positive_and_monotonic_per_ms() {
        let a = snowflake_id();
        assert!(a > 0);
        // 53-bit bound keeps IDs JSON-safe
        assert!(a < (1_i64 << 53));
    }

    #[test]
    fn test_ids_do_not_collide_in_small_batches() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            seen.insert(snowflake_id());
        }
        // A handful of collisions would indicate broken random bits
        assert!(seen.len() > 32);
    }
}
