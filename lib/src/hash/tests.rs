use super::*;
use serde::Serialize;
use serde_json::json;

#[derive(Serialize)]
struct Inner {
    z: u32,
    a: u32,
}

#[derive(Serialize)]
struct Outer {
    beta: Inner,
    alpha: u32,
}

#[test]
fn canonical_bytes_sorts_nested_keys() {
    let v = Outer {
        beta: Inner { z: 1, a: 2 },
        alpha: 3,
    };
    let bytes = canonical_bytes(&v);
    let s = String::from_utf8(bytes).unwrap();
    assert_eq!(s, r#"{"alpha":3,"beta":{"a":2,"z":1}}"#);
}

#[test]
fn canonical_bytes_has_no_whitespace() {
    let v = json!({"b": [1, 2, 3], "a": "x"});
    let bytes = canonical_bytes(&v);
    assert!(!bytes.contains(&b' '));
    assert!(!bytes.contains(&b'\n'));
}

#[test]
fn hash_determinism() {
    let a = json!({"x": 1, "y": 2});
    let b = json!({"y": 2, "x": 1});
    assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
    assert_eq!(Hash::of(&a), Hash::of(&b));
}

#[test]
fn hash_hex_roundtrip() {
    let h = Hash::of(&json!({"anything": true}));
    let hex = h.to_hex();
    assert_eq!(hex.len(), 64);
    let h2 = Hash::from_hex(&hex).unwrap();
    assert_eq!(h, h2);
}

#[test]
fn meets_difficulty_zero_always_holds() {
    let h = Hash::from_bytes([0xFF; 32]);
    assert!(h.meets_difficulty(0));
}

#[test]
fn meets_difficulty_256_requires_zero_hash() {
    let zero = Hash::from_bytes([0; 32]);
    assert!(zero.meets_difficulty(256));
    assert!(zero.meets_difficulty(8));

    let mut bytes = [0u8; 32];
    bytes[31] = 1;
    let almost_zero = Hash::from_bytes(bytes);
    assert!(!almost_zero.meets_difficulty(256));
    // the last bit is free at difficulty 255 (first 255 bits zero)
    assert!(almost_zero.meets_difficulty(255));
}

#[test]
fn meets_difficulty_bit_boundaries() {
    // first byte 0b00000011 -> 6 leading zero bits, not 7
    let mut bytes = [0xFFu8; 32];
    bytes[0] = 0b0000_0011;
    let h = Hash::from_bytes(bytes);
    assert!(h.meets_difficulty(6));
    assert!(!h.meets_difficulty(7));
}
