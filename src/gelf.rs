// Copyright (C) 2025 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of gelf-tracing.
//
// gelf-tracing is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// gelf-tracing is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with gelf-tracing.  If
// not, see <http://www.gnu.org/licenses/>.

//! The GELF document.
//!
//! [`GelfDocument`] is the GELF 1.1 [payload]: a handful of fixed fields plus any number of
//! "additional" fields whose names begin with an underscore. Serialized, it is a compact JSON
//! object; field order is unspecified.
//!
//! [payload]: https://go2docs.graylog.org/current/getting_in_log_data/gelf.html#GELFPayloadSpecification

use crate::{
    error::{Error, Result},
    severity::Severity,
};

use backtrace::Backtrace;
use chrono::prelude::*;
use serde::Serialize;
use serde_json::{value::RawValue, Map, Value};
use tracing::{debug, warn};

pub const GELF_VERSION: &str = "1.1";
/// `short_message` is truncated to this many characters.
pub const SHORT_MESSAGE_MAX_LENGTH: usize = 250;

/// A GELF timestamp: seconds since the Unix epoch, to millisecond precision.
///
/// Rendered as a decimal number with at most three fractional digits, trailing zeros (and a
/// trailing decimal point) removed, so 1540711622890ms is `1540711622.89` & 1540711622000ms is
/// `1540711622`. This is done with integer arithmetic; formatting the equivalent `f64` can
/// introduce binary-fraction noise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn from_millis(millis: i64) -> Timestamp {
        Timestamp(millis)
    }
    pub fn millis(&self) -> i64 {
        self.0
    }
}

impl std::convert::From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp(dt.timestamp_millis())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let (secs, frac) = (abs / 1000, abs % 1000);
        if frac == 0 {
            write!(f, "{}{}", sign, secs)
        } else {
            let digits = format!("{:03}", frac);
            write!(f, "{}{}.{}", sign, secs, digits.trim_end_matches('0'))
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::Error as _;
        RawValue::from_string(self.to_string())
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

/// Turn a property name into an additional-field name.
///
/// "id" (in any case) becomes "id_": GELF servers must not accept `_id`, which could clobber the
/// storage layer's own key. Then, if the name doesn't already begin with an underscore, one is
/// prepended.
pub fn normalize_key(key: &str) -> String {
    let key = if key.eq_ignore_ascii_case("id") {
        "id_"
    } else {
        key
    };
    if key.starts_with('_') {
        key.to_string()
    } else {
        format!("_{}", key)
    }
}

/// One entry destined for the additional fields of a [`GelfDocument`].
#[derive(Clone, Debug, PartialEq)]
pub enum AdditionalField {
    /// Ship `value` under the (normalized) name `key`
    Value { key: String, value: Value },
    /// Ship each of this object's members as its own additional field
    PromoteObject(Value),
}

/// A GELF 1.1 message.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GelfDocument {
    version: String,
    host: String,
    short_message: String,
    full_message: String,
    timestamp: Timestamp,
    level: u8,
    facility: String,
    line: String,
    file: String,
    #[serde(flatten)]
    additional: Map<String, Value>,
}

impl GelfDocument {
    /// A document with no source location & no additional fields.
    pub fn new(
        host: &str,
        message: &str,
        timestamp: Timestamp,
        severity: Severity,
        facility: &str,
    ) -> GelfDocument {
        GelfDocument {
            version: GELF_VERSION.to_string(),
            host: host.to_string(),
            short_message: message.chars().take(SHORT_MESSAGE_MAX_LENGTH).collect(),
            full_message: message.to_string(),
            timestamp,
            level: severity as u8,
            facility: facility.to_string(),
            line: String::new(),
            file: String::new(),
            additional: Map::new(),
        }
    }
    pub fn with_location(mut self, file: &str, line: u32) -> Self {
        self.file = file.to_string();
        self.line = line.to_string();
        self
    }
    /// Add `field` to this document's additional fields.
    ///
    /// Names are normalized via [`normalize_key`]; a name that normalizes to one already present
    /// replaces the earlier value. Promoting something other than a JSON object is logged & the
    /// field skipped: one bad field never costs the whole message.
    pub fn add_field(&mut self, field: AdditionalField) {
        match field {
            AdditionalField::Value { key, value } => {
                let key = normalize_key(&key);
                if self.additional.insert(key.clone(), value).is_some() {
                    debug!("Additional field {} was set more than once", key);
                }
            }
            AdditionalField::PromoteObject(Value::Object(members)) => {
                for (key, value) in members {
                    self.add_field(AdditionalField::Value { key, value });
                }
            }
            AdditionalField::PromoteObject(other) => {
                warn!(
                    "Unable to add additional fields: expected an object to promote, got {}",
                    other
                );
            }
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }
    pub fn host(&self) -> &str {
        &self.host
    }
    pub fn short_message(&self) -> &str {
        &self.short_message
    }
    pub fn full_message(&self) -> &str {
        &self.full_message
    }
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
    pub fn level(&self) -> u8 {
        self.level
    }
    pub fn facility(&self) -> &str {
        &self.facility
    }
    pub fn line(&self) -> &str {
        &self.line
    }
    pub fn file(&self) -> &str {
        &self.file
    }
    /// Look up an additional field by its (normalized) name.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.additional.get(key)
    }
    pub fn additional_fields(&self) -> &Map<String, Value> {
        &self.additional
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|err| Error::Serialization {
            source: err,
            back: Backtrace::new(),
        })
    }
}

#[cfg(test)]
mod test {

    use super::*;

    use serde_json::json;

    fn doc() -> GelfDocument {
        GelfDocument::new(
            "bree.local",
            "Hello, world!",
            Timestamp::from_millis(1540711622898),
            Severity::Informational,
            "GELF",
        )
    }

    #[test]
    fn timestamp_rendering() {
        for (millis, golden) in [
            (1540711622898, "1540711622.898"),
            (1540711622890, "1540711622.89"),
            (1540711622800, "1540711622.8"),
            (1540711622000, "1540711622"),
            (0, "0"),
            (5, "0.005"),
            (-1500, "-1.5"),
        ] {
            assert_eq!(Timestamp::from_millis(millis).to_string(), golden);
        }
        let dt = DateTime::from_timestamp_millis(1540711622890).unwrap();
        assert_eq!(Timestamp::from(dt).millis(), 1540711622890);
    }

    #[test]
    fn serialized_timestamp() {
        for (millis, golden) in [
            (1540711622898, "\"timestamp\":1540711622.898,"),
            (1540711622890, "\"timestamp\":1540711622.89,"),
            (1540711622800, "\"timestamp\":1540711622.8,"),
            (1540711622000, "\"timestamp\":1540711622,"),
        ] {
            let mut d = doc();
            d.timestamp = Timestamp::from_millis(millis);
            let text = d.to_json().unwrap();
            assert!(text.contains(golden), "{} not in {}", golden, text);
        }
    }

    #[test]
    fn fixed_fields() {
        let d = doc().with_location("src/main.rs", 17);
        let v: Value = serde_json::from_str(&d.to_json().unwrap()).unwrap();
        assert_eq!(
            v,
            json!({
                "version": "1.1",
                "host": "bree.local",
                "short_message": "Hello, world!",
                "full_message": "Hello, world!",
                "timestamp": 1540711622.898,
                "level": 6,
                "facility": "GELF",
                "line": "17",
                "file": "src/main.rs",
            })
        );
        // No location => empty strings, still present
        let v: Value = serde_json::from_str(&doc().to_json().unwrap()).unwrap();
        assert_eq!(v["line"], json!(""));
        assert_eq!(v["file"], json!(""));
    }

    #[test]
    fn short_message_truncation() {
        let long = "x".repeat(300);
        let d = GelfDocument::new("h", &long, Timestamp::from_millis(0), Severity::Debug, "f");
        assert_eq!(d.short_message().chars().count(), 250);
        assert_eq!(d.full_message(), long);
        // Truncation counts characters, not bytes
        let wide = "世".repeat(251);
        let d = GelfDocument::new("h", &wide, Timestamp::from_millis(0), Severity::Debug, "f");
        assert_eq!(d.short_message(), "世".repeat(250));
    }

    #[test]
    fn key_normalization() {
        assert_eq!(normalize_key("id"), "_id_");
        assert_eq!(normalize_key("ID"), "_id_");
        assert_eq!(normalize_key("custom"), "_custom");
        assert_eq!(normalize_key("_custom"), "_custom");
        assert_eq!(normalize_key("identity"), "_identity");

        let mut d = doc();
        d.add_field(AdditionalField::Value {
            key: "id".to_string(),
            value: json!(12),
        });
        d.add_field(AdditionalField::Value {
            key: "nothing".to_string(),
            value: Value::Null,
        });
        assert_eq!(d.field("_id_"), Some(&json!(12)));
        assert!(d.field("_id").is_none());
        let v: Value = serde_json::from_str(&d.to_json().unwrap()).unwrap();
        assert_eq!(v["_nothing"], Value::Null);
        assert!(v.as_object().unwrap().contains_key("_nothing"));
    }

    #[test]
    fn promotion() {
        let mut d = doc();
        d.add_field(AdditionalField::PromoteObject(json!({
            "id": 7,
            "name": "widget",
            "dims": {"w": 1, "h": 2},
        })));
        assert_eq!(d.field("_id_"), Some(&json!(7)));
        assert_eq!(d.field("_name"), Some(&json!("widget")));
        assert_eq!(d.field("_dims"), Some(&json!({"w": 1, "h": 2})));

        // Not an object: skipped, nothing else disturbed
        d.add_field(AdditionalField::PromoteObject(json!("just a string")));
        d.add_field(AdditionalField::PromoteObject(json!([1, 2, 3])));
        assert_eq!(d.additional_fields().len(), 3);
        assert!(d.to_json().is_ok());
    }
}
