use marbles_core::{
    BATCH_ID_LENGTH, BATCH_ID_PREFIX, GENERATED_ID_LENGTH, MARBLE_COLORS, MARBLE_SIZES,
};
use rand::distributions::{Alphanumeric, DistString};
use rand::seq::SliceRandom;
use rand::Rng;

pub fn alphanumeric<R: Rng>(rng: &mut R, len: usize) -> String {
    Alphanumeric.sample_string(rng, len)
}

/// `len / 2` random bytes, hex encoded.
pub fn hex_value<R: Rng>(rng: &mut R, len: usize) -> String {
    let mut bytes = vec![0u8; len / 2];
    rng.fill(bytes.as_mut_slice());
    hex::encode(bytes)
}

pub fn color<R: Rng>(rng: &mut R) -> &'static str {
    MARBLE_COLORS.choose(rng).copied().unwrap_or("red")
}

pub fn size<R: Rng>(rng: &mut R) -> u32 {
    rng.gen_range(MARBLE_SIZES)
}

/// `prefix` followed by random alphanumerics, for entities created without an id.
pub fn entity_id(prefix: &str) -> String {
    format!(
        "{prefix}{}",
        alphanumeric(&mut rand::thread_rng(), GENERATED_ID_LENGTH)
    )
}

pub fn batch_id() -> String {
    format!(
        "{BATCH_ID_PREFIX}{}",
        alphanumeric(&mut rand::thread_rng(), BATCH_ID_LENGTH)
    )
}
