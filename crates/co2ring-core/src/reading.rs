//! Sensor readings and the record published for them

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::marker::PhantomData;
use core::str::FromStr;

use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One CO2/temperature/humidity sample.
///
/// Produced on every successful poll and handed to the alert state machine
/// and the publisher. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub co2_ppm: u16,
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

impl Reading {
    pub const fn new(co2_ppm: u16, temperature_c: f32, humidity_pct: f32) -> Self {
        Self {
            co2_ppm,
            temperature_c,
            humidity_pct,
        }
    }
}

/// The JSON object published on the MQTT topic.
///
/// Measurements are sent as strings, with temperature and humidity rounded
/// to two decimals:
///
/// ```json
/// {"name":"CO2_SENSOR","firmware":"1.0","co2":"612","temperature":"21.35","humidity":"40.25"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<'a> {
    #[serde(borrow)]
    pub name: Cow<'a, str>,
    #[serde(borrow)]
    pub firmware: Cow<'a, str>,
    #[serde(with = "as_text")]
    pub co2: u16,
    #[serde(with = "two_decimals")]
    pub temperature: f32,
    #[serde(with = "two_decimals")]
    pub humidity: f32,
}

impl<'a> Record<'a> {
    pub fn new(name: &'a str, firmware: &'a str, reading: &Reading) -> Self {
        Self {
            name: Cow::Borrowed(name),
            firmware: Cow::Borrowed(firmware),
            co2: reading.co2_ppm,
            temperature: reading.temperature_c,
            humidity: reading.humidity_pct,
        }
    }

    pub fn reading(&self) -> Reading {
        Reading::new(self.co2, self.temperature, self.humidity)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse a record, borrowing the string fields from `json` where no
    /// unescaping is needed.
    pub fn from_json(json: &'a str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Reads a number written as a JSON string.
struct TextVisitor<T>(PhantomData<T>);

impl<T: FromStr> Visitor<'_> for TextVisitor<T> {
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number as a string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<T, E> {
        v.trim()
            .parse()
            .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
    }
}

mod as_text {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u16, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        deserializer.deserialize_str(TextVisitor(PhantomData))
    }
}

mod two_decimals {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
        } else {
            serializer.collect_str(&format_args!("{:.2}", value))
        }
    }

    /// Accepts `"nan"`, `"inf"` and `"-inf"` as well as decimals.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        deserializer.deserialize_str(TextVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trip_keeps_every_field() {
        let reading = Reading::new(1234, 21.5, 40.25);
        let record = Record::new("CO2_SENSOR", "1.0", &reading);

        let json = record.to_json().unwrap();
        let parsed = Record::from_json(&json).unwrap();

        assert_eq!(parsed, record);
        assert_eq!(parsed.reading(), reading);
    }

    #[test]
    fn reading_survives_json() {
        let reading = Reading::new(2450, -3.75, 98.5);

        let json = serde_json::to_string(&reading).unwrap();
        let parsed: Reading = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, reading);
    }

    #[test]
    fn record_uses_published_field_names() {
        let record = Record::new("CO2_SENSOR", "1.0", &Reading::new(612, 21.5, 40.25));

        let json = record.to_json().unwrap();

        assert_eq!(
            json,
            r#"{"name":"CO2_SENSOR","firmware":"1.0","co2":"612","temperature":"21.50","humidity":"40.25"}"#
        );
    }

    #[test]
    fn measurements_are_rounded_to_two_decimals() {
        let record = Record::new("CO2_SENSOR", "1.0", &Reading::new(612, 21.346, 40.0));

        let json = record.to_json().unwrap();

        assert!(json.contains(r#""temperature":"21.35""#), "{json}");
        assert!(json.contains(r#""humidity":"40.00""#), "{json}");
        assert_eq!(Record::from_json(&json).unwrap().temperature, 21.35);
    }

    #[test]
    fn non_finite_measurements_survive_json() {
        let reading = Reading::new(400, f32::NAN, f32::INFINITY);
        let record = Record::new("CO2_SENSOR", "1.0", &reading);

        let json = record.to_json().unwrap();
        assert!(json.contains(r#""temperature":"nan""#), "{json}");
        assert!(json.contains(r#""humidity":"inf""#), "{json}");

        let parsed = Record::from_json(&json).unwrap();
        assert!(parsed.temperature.is_nan());
        assert_eq!(parsed.humidity, f32::INFINITY);
        assert_eq!(parsed.co2, 400);
    }

    #[test]
    fn escaped_name_round_trips() {
        let reading = Reading::new(800, 20.0, 50.0);
        let record = Record::new(r#"CO2 "kitchen" \ east"#, "1.0", &reading);

        let json = record.to_json().unwrap();
        let parsed = Record::from_json(&json).unwrap();

        assert_eq!(parsed.name, r#"CO2 "kitchen" \ east"#);
        assert!(matches!(parsed.name, Cow::Owned(_)));
        assert!(matches!(parsed.firmware, Cow::Borrowed("1.0")));
    }

    #[test]
    fn record_rejects_non_numeric_text() {
        let json = r#"{"name":"CO2_SENSOR","firmware":"1.0","co2":"lots","temperature":"21.50","humidity":"40.25"}"#;

        assert!(Record::from_json(json).is_err());
    }

    #[test]
    fn record_rejects_missing_fields() {
        let json = r#"{"name":"CO2_SENSOR","firmware":"1.0","co2":"612","temperature":"21.50"}"#;

        assert!(Record::from_json(json).is_err());
    }
}
