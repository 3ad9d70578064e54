//! Random handle identifiers
//!
//! Every descriptor gets a random non-zero 32-bit id when it is constructed. Zero is
//! reserved to mean "invalid / not loaded". Ids are only lookup keys: the resource tables
//! add generational keys on top, so a stale table slot can never alias a newer resource.

use rand::Rng;

/// Identifier carried by every handle. `0` is never produced by [`new_id`].
pub type HandleId = u32;

/// Reserved "not a resource" identifier.
pub const INVALID_ID: HandleId = 0;

/// Draw a fresh non-zero identifier from the thread-local generator.
pub fn new_id() -> HandleId {
    rand::thread_rng().gen_range(1..=u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_never_zero() {
        for _ in 0..10_000 {
            assert_ne!(new_id(), INVALID_ID);
        }
    }

    #[test]
    fn test_ids_are_mostly_unique() {
        let mut seen = HashSet::new();
        let mut collisions = 0;
        for _ in 0..4096 {
            if !seen.insert(new_id()) {
                collisions += 1;
            }
        }
        // 4096 draws from 2^32 collide with probability ~0.2%; more than one is a broken generator.
        if collisions > 0 {
            eprintln!("flagged {collisions} random id collision(s)");
        }
        assert!(collisions <= 1);
    }
}
