//! Timestamps stored as fractional seconds since the Unix epoch.
//!
//! Template records carry `created_at` in this form so that identifiers sent
//! by browser clients (`Date.now()` values) can be compared with it directly.
//! Older records stored the value as a decimal string; both shapes are
//! accepted when reading.

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;

/// Converts a UTC timestamp to fractional epoch seconds (microsecond precision).
pub fn to_epoch_seconds(ts: &DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

/// Converts fractional epoch seconds back into a UTC timestamp.
pub fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
}

struct EpochVisitor;

impl<'de> Visitor<'de> for EpochVisitor {
    type Value = DateTime<Utc>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("epoch seconds as a number or a decimal string")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        from_epoch_seconds(v).ok_or_else(|| E::custom(format!("timestamp out of range: {v}")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        self.visit_f64(v as f64)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        self.visit_f64(v as f64)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let secs: f64 = v
            .trim()
            .parse()
            .map_err(|_| E::custom(format!("invalid timestamp: {v:?}")))?;
        self.visit_f64(secs)
    }
}

pub mod epoch_seconds {
    use super::*;

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(to_epoch_seconds(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        d.deserialize_any(EpochVisitor)
    }
}

pub mod epoch_seconds_opt {
    use super::*;
    use serde::Deserialize;

    pub fn serialize<S: Serializer>(ts: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_some(&to_epoch_seconds(ts)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super::epoch_seconds")] DateTime<Utc>);

        Ok(Option::<Wrapper>::deserialize(d)?.map(|w| w.0))
    }
}
