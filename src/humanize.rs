//! Human-readable interval parsing ("5 minutes", "1 hour and 30 minutes")

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid interval format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),
}

/// Interval wrapper with human-readable parsing, stored as whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct HumanInterval(pub u64);

const UNITS: &[(&str, u64)] = &[
    ("week", 7 * 24 * 60 * 60),
    ("day", 24 * 60 * 60),
    ("hour", 60 * 60),
    ("minute", 60),
    ("second", 1),
];

impl HumanInterval {
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn to_human_readable(&self) -> String {
        if self.0 == 0 {
            return "0 seconds".to_string();
        }

        let mut remaining = self.0;
        let mut parts = Vec::new();
        for &(unit, secs) in UNITS {
            let count = remaining / secs;
            if count > 0 {
                remaining %= secs;
                let plural = if count == 1 { "" } else { "s" };
                parts.push(format!("{count} {unit}{plural}"));
            }
        }
        parts.join(" and ")
    }
}

fn parse_number(word: &str) -> Result<u64, ParseError> {
    if let Ok(num) = word.parse::<u64>() {
        return Ok(num);
    }

    let num = match word {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "fifteen" => 15,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        _ => return Err(ParseError::InvalidNumber(word.to_string())),
    };
    Ok(num)
}

fn parse_unit(word: &str) -> Result<u64, ParseError> {
    let secs = match word {
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 60 * 60,
        "d" | "day" | "days" => 24 * 60 * 60,
        "w" | "week" | "weeks" => 7 * 24 * 60 * 60,
        _ => return Err(ParseError::InvalidUnit(word.to_string())),
    };
    Ok(secs)
}

impl<'de> Deserialize<'de> for HumanInterval {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct HumanIntervalVisitor;

        impl<'de> serde::de::Visitor<'de> for HumanIntervalVisitor {
            type Value = HumanInterval;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str(
                    "an interval as string (e.g., \"5 minutes\", \"1 hour and 30 minutes\") or seconds",
                )
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(HumanInterval(v))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<HumanInterval>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(HumanIntervalVisitor)
    }
}

impl FromStr for HumanInterval {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(',', " ");

        let mut words = normalized
            .split_whitespace()
            .filter(|word| *word != "and")
            .peekable();

        if words.peek() == Some(&"every") {
            words.next();
        }

        let mut total: u64 = 0;
        let mut matched = false;
        while let Some(word) = words.next() {
            // compact form: "5m", "2h"
            let (count, unit) = match word.find(|c: char| !c.is_ascii_digit()) {
                Some(pos) if pos > 0 => (parse_number(&word[..pos])?, parse_unit(&word[pos..])?),
                _ => {
                    let count = parse_number(word)?;
                    let unit = words
                        .next()
                        .ok_or_else(|| ParseError::InvalidFormat(s.to_string()))?;
                    (count, parse_unit(unit)?)
                }
            };

            total = count
                .checked_mul(unit)
                .and_then(|secs| total.checked_add(secs))
                .ok_or_else(|| ParseError::InvalidNumber(s.to_string()))?;
            matched = true;
        }

        if !matched {
            return Err(ParseError::InvalidFormat(s.to_string()));
        }

        Ok(HumanInterval(total))
    }
}

impl fmt::Display for HumanInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_unit() {
        assert_eq!("5 minutes".parse::<HumanInterval>().unwrap().as_secs(), 300);
        assert_eq!("1 hour".parse::<HumanInterval>().unwrap().as_secs(), 3600);
        assert_eq!("30 seconds".parse::<HumanInterval>().unwrap().as_secs(), 30);
    }

    #[test]
    fn test_parse_compound() {
        assert_eq!(
            "1 hour and 30 minutes".parse::<HumanInterval>().unwrap().as_secs(),
            5400
        );
        assert_eq!(
            "1 day, 2 hours".parse::<HumanInterval>().unwrap().as_secs(),
            86400 + 7200
        );
    }

    #[test]
    fn test_parse_number_words() {
        assert_eq!("two days".parse::<HumanInterval>().unwrap().as_secs(), 2 * 86400);
        assert_eq!("an hour".parse::<HumanInterval>().unwrap().as_secs(), 3600);
        assert_eq!("every ten minutes".parse::<HumanInterval>().unwrap().as_secs(), 600);
    }

    #[test]
    fn test_parse_compact() {
        assert_eq!("5m".parse::<HumanInterval>().unwrap().as_secs(), 300);
        assert_eq!("2h 15m".parse::<HumanInterval>().unwrap().as_secs(), 8100);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            "".parse::<HumanInterval>(),
            Err(ParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            "5".parse::<HumanInterval>(),
            Err(ParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            "5 fortnights".parse::<HumanInterval>(),
            Err(ParseError::InvalidUnit(_))
        ));
        assert!(matches!(
            "*/5 * * * *".parse::<HumanInterval>(),
            Err(ParseError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_to_human_readable() {
        assert_eq!(HumanInterval(300).to_human_readable(), "5 minutes");
        assert_eq!(HumanInterval(5400).to_human_readable(), "1 hour and 30 minutes");
        assert_eq!(HumanInterval(0).to_human_readable(), "0 seconds");
    }

    #[test]
    fn test_deserialize_string_and_number() {
        #[derive(Deserialize)]
        struct TestStruct {
            every: HumanInterval,
        }

        let parsed: TestStruct = serde_json::from_str(r#"{"every": "5 minutes"}"#).unwrap();
        assert_eq!(parsed.every.as_secs(), 300);

        let parsed: TestStruct = serde_json::from_str(r#"{"every": 60}"#).unwrap();
        assert_eq!(parsed.every, HumanInterval(60));
    }
}
