//! ISO-8601 timestamps on the wire
//!
//! Incoming strings are accepted only if re-rendering the parsed instant in
//! the same precision and offset style gives back the exact input. This
//! rejects strings that a lenient parser would normalise (`2024-02-30`,
//! lowercase separators, out-of-range offsets).

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::schema::SchemaError;

const PRECISIONS: [SecondsFormat; 4] = [
    SecondsFormat::Secs,
    SecondsFormat::Millis,
    SecondsFormat::Micros,
    SecondsFormat::Nanos,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsoDateTime(pub DateTime<Utc>);

impl IsoDateTime {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

/// Parse `value` and require that it survives a render round-trip
pub fn parse_round_trip(value: &str) -> Result<DateTime<Utc>, SchemaError> {
    let parsed: DateTime<FixedOffset> = DateTime::parse_from_rfc3339(value)
        .map_err(|_| SchemaError::InvalidDate(value.to_string()))?;

    let round_trips = PRECISIONS.iter().any(|precision| {
        [true, false]
            .iter()
            .any(|use_z| parsed.to_rfc3339_opts(*precision, *use_z) == value)
    });

    if round_trips {
        Ok(parsed.with_timezone(&Utc))
    } else {
        Err(SchemaError::InvalidDate(value.to_string()))
    }
}

impl FromStr for IsoDateTime {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_round_trip(s).map(IsoDateTime)
    }
}

impl fmt::Display for IsoDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl From<DateTime<Utc>> for IsoDateTime {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl From<IsoDateTime> for DateTime<Utc> {
    fn from(value: IsoDateTime) -> Self {
        value.0
    }
}

impl Serialize for IsoDateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IsoDateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
