use super::*;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Sample {
    a: u32,
    b: String,
}

#[test]
fn save_then_load_round_trips() {
    let sample = Sample {
        a: 7,
        b: "hi".to_string(),
    };
    let mut buf = Vec::new();
    sample.save(&mut buf).unwrap();
    let loaded = Sample::load(&buf[..]).unwrap();
    assert_eq!(sample, loaded);
}

#[test]
fn save_to_file_then_load_from_file_round_trips() {
    let dir = std::env::temp_dir().join(format!("chainlib-util-test-{}", std::process::id()));
    let sample = Sample {
        a: 1,
        b: "disk".to_string(),
    };
    sample.save_to_file(&dir).unwrap();
    let loaded = Sample::load_from_file(&dir).unwrap();
    assert_eq!(sample, loaded);
    std::fs::remove_file(&dir).ok();
}
