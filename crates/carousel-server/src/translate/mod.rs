//! Wire-format translators between the internal chunk stream and the two
//! client dialects.

pub mod anthropic;
pub mod openai;

use rand::Rng;

/// Random lowercase-hex token of `chars` characters.
pub(crate) fn hex_token(chars: usize) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    (0..chars)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect()
}

/// Rough token estimate: ceil(chars / 4), counting Unicode scalar values.
///
/// Clients rely on these rough numbers for display; do not refine.
pub(crate) fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}
