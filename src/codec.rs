//! Base-62 conversion between sequence numbers and short codes.
//!
//! The alphabet ordering below is load-bearing: every code ever issued was
//! produced against it, so reordering it would orphan existing links.

/// Fixed encoding alphabet, index 0 first. Lowercase, then uppercase, then
/// digits.
const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const BASE: u64 = 62;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty code")]
    Empty,
    #[error("invalid character {0:?} in code")]
    InvalidChar(char),
    #[error("code is out of the supported range")]
    Overflow,
}

/// Render `value` as a base-62 code, most significant symbol first.
///
/// `encode(0)` returns the literal zero symbol (`"a"`), so the mapping stays
/// a bijection over the whole input range.
pub fn encode(mut value: u64) -> String {
    if value == 0 {
        return (ALPHABET[0] as char).to_string();
    }

    let mut reversed = String::new();
    while value > 0 {
        reversed.push(ALPHABET[(value % BASE) as usize] as char);
        value /= BASE;
    }
    reversed.chars().rev().collect()
}

/// Exact inverse of [`encode`]: `decode(encode(n)) == n`.
pub fn decode(code: &str) -> Result<u64, DecodeError> {
    if code.is_empty() {
        return Err(DecodeError::Empty);
    }

    let mut value: u64 = 0;
    for c in code.chars() {
        let digit = symbol_index(c).ok_or(DecodeError::InvalidChar(c))?;
        value = value
            .checked_mul(BASE)
            .and_then(|v| v.checked_add(digit))
            .ok_or(DecodeError::Overflow)?;
    }

    Ok(value)
}

fn symbol_index(c: char) -> Option<u64> {
    match c {
        'a'..='z' => Some(c as u64 - 'a' as u64),
        'A'..='Z' => Some(c as u64 - 'A' as u64 + 26),
        '0'..='9' => Some(c as u64 - '0' as u64 + 52),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_encodes_to_the_zero_symbol() {
        assert_eq!(encode(0), "a");
        assert_eq!(decode("a"), Ok(0));
    }

    #[test]
    fn encodes_known_values() {
        assert_eq!(encode(1), "b");
        assert_eq!(encode(61), "9");
        assert_eq!(encode(62), "ba");
        // First code issued with the default counter start of 100000.
        assert_eq!(encode(100_001), "Aa5");
    }

    #[test]
    fn decodes_the_first_issued_code() {
        assert_eq!(decode("Aa5"), Ok(100_001));
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(decode(""), Err(DecodeError::Empty));
    }

    #[test]
    fn rejects_characters_outside_the_alphabet() {
        assert_eq!(decode("ab-cd"), Err(DecodeError::InvalidChar('-')));
        assert_eq!(decode("héllo"), Err(DecodeError::InvalidChar('é')));
    }

    #[test]
    fn rejects_values_past_u64() {
        // Eleven top symbols is comfortably past u64::MAX.
        assert_eq!(decode(&"9".repeat(11)), Err(DecodeError::Overflow));
    }

    #[test]
    fn u64_max_round_trips() {
        assert_eq!(decode(&encode(u64::MAX)), Ok(u64::MAX));
    }

    proptest! {
        #[test]
        fn round_trips_across_the_supported_range(n in 0u64..62u64.pow(6)) {
            prop_assert_eq!(decode(&encode(n)), Ok(n));
        }
    }
}
