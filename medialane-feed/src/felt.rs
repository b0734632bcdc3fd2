//! Helpers for Starknet field elements as they travel over JSON-RPC: `0x`
//! prefixed hex strings of at most 252 bits.

use std::io::{Error, ErrorKind, Result};

use sha3::{Digest, Keccak256};

/// Max hex digits of a felt (252 bits).
const FELT_HEX_LEN: usize = 63;

/// Returns the canonical form of a felt: lower-case, `0x` prefixed, no leading zeros.
pub fn normalize(felt: &str) -> Result<String> {
    let digits = strip(felt)?;
    if digits.is_empty() {
        return Ok("0x0".to_owned());
    }
    Ok(format!("0x{}", digits.to_ascii_lowercase()))
}

pub fn is_zero(felt: &str) -> bool {
    matches!(strip(felt), Ok(digits) if digits.is_empty())
}

/// Parses a felt that must fit into 128 bits, e.g. one half of a u256.
pub fn to_u128(felt: &str) -> Result<u128> {
    let digits = strip(felt)?;
    if digits.is_empty() {
        return Ok(0);
    }
    if digits.len() > 32 {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("felt does not fit into u128: {}", felt),
        ));
    }
    u128::from_str_radix(digits, 16).map_err(|e| {
        Error::new(
            ErrorKind::InvalidData,
            format!("failed to parse felt {}: {}", felt, e),
        )
    })
}

/// Renders a u256 given as its (low, high) felt halves. Values that fit into
/// u128 are rendered in decimal, larger ones in hex.
pub fn u256_to_string(low: &str, high: &str) -> Result<String> {
    let low = to_u128(low)?;
    let high = to_u128(high)?;
    if high == 0 {
        return Ok(low.to_string());
    }
    Ok(format!("0x{:x}{:032x}", high, low))
}

/// Shortens an address for display: `0x1234...cdef`. Anything that is not a
/// felt is returned as is.
pub fn short(address: &str) -> String {
    let canonical = match normalize(address) {
        Ok(canonical) => canonical,
        Err(_) => return address.to_owned(),
    };
    if canonical.len() <= 12 {
        return canonical;
    }
    format!(
        "{}...{}",
        &canonical[..6],
        &canonical[canonical.len() - 4..]
    )
}

/// Starknet event/function selector: keccak-256 of the name masked to 250 bits.
pub fn starknet_keccak(name: &[u8]) -> String {
    let mut digest = Keccak256::digest(name);
    digest[0] &= 0x03;
    let encoded = hex::encode(digest);
    let trimmed = encoded.trim_start_matches('0');
    if trimmed.is_empty() {
        return "0x0".to_owned();
    }
    format!("0x{}", trimmed)
}

fn strip(felt: &str) -> Result<&str> {
    let trimmed = felt.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidData,
                format!("felt must be 0x prefixed hex: {:?}", felt),
            )
        })?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("felt contains non-hex characters: {:?}", felt),
        ));
    }
    let digits = digits.trim_start_matches('0');
    if digits.len() > FELT_HEX_LEN {
        return Err(Error::new(
            ErrorKind::InvalidData,
            format!("felt exceeds 252 bits: {:?}", felt),
        ));
    }
    Ok(digits)
}

#[test]
fn test_normalize() {
    assert_eq!(normalize("0x00ABC").unwrap(), "0xabc");
    assert_eq!(normalize("0x0").unwrap(), "0x0");
    assert_eq!(normalize("0x").unwrap(), "0x0");
    assert_eq!(normalize(" 0X01 ").unwrap(), "0x1");
    assert!(normalize("abc").is_err());
    assert!(normalize("0xzz").is_err());
    assert!(is_zero("0x0000"));
    assert!(!is_zero("0x01"));
    assert!(!is_zero("nope"));
}

#[test]
fn test_u256() {
    assert_eq!(to_u128("0x2a").unwrap(), 42);
    assert!(to_u128(&format!("0x1{}", "0".repeat(32))).is_err());
    assert_eq!(u256_to_string("0x3e8", "0x0").unwrap(), "1000");
    assert_eq!(
        u256_to_string("0x1", "0x1").unwrap(),
        format!("0x1{}1", "0".repeat(31))
    );
}

#[test]
fn test_short() {
    assert_eq!(short("0xabc"), "0xabc");
    assert_eq!(
        short("0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7"),
        "0x49d3...4dc7"
    );
    assert_eq!(short("0xé€€€€€€€€€"), "0xé€€€€€€€€€");
    assert_eq!(short("alice.stark"), "alice.stark");
}

#[test]
fn test_starknet_keccak() {
    assert_eq!(
        starknet_keccak(b"Transfer"),
        "0x99cd8bde557814842a3121e8ddfd433a539b8c9f14bf31ebf108d12e6196e9"
    );
    let selector = starknet_keccak(b"OrderCreated");
    assert!(selector.len() <= 2 + FELT_HEX_LEN);
    assert_eq!(normalize(&selector).unwrap(), selector);
}
