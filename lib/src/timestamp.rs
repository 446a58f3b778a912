use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Debug, Hash)]
pub struct Timestamp {
    unix_millis: i64,
}

impl Timestamp {
    pub fn from_millis(unix_millis: i64) -> Self {
        Timestamp { unix_millis }
    }

    pub fn now() -> Self {
        Timestamp {
            unix_millis: Utc::now().timestamp_millis(),
        }
    }

    pub fn unix_millis(&self) -> i64 {
        self.unix_millis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonic_nondecreasing() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(b.unix_millis() >= a.unix_millis());
    }

    #[test]
    fn ordering_is_by_millis() {
        let a = Timestamp::from_millis(10);
        let b = Timestamp::from_millis(20);
        assert!(a < b);
    }
}
