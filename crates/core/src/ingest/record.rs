use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::IngestWarning;
use crate::time::parse_timestamp;

/// One operation record as supplied by the loading collaborator.
///
/// Fields are kept as loose JSON so the schema can be recognised by which fields are
/// present rather than by an explicit format tag.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    origin: String,
    index: usize,
    fields: Map<String, Value>,
}

impl RawRecord {
    /// Wrap the fields of the record found at `index` within `origin`.
    pub fn new(origin: impl Into<String>, index: usize, fields: Map<String, Value>) -> Self {
        Self {
            origin: origin.into(),
            index,
            fields,
        }
    }

    /// Wrap an arbitrary JSON value; anything but an object yields a record without fields.
    pub fn from_value(origin: impl Into<String>, index: usize, value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(origin, index, fields)
    }

    /// Source file or feed the record came from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Position within the origin.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether `field` holds a non-null, non-blank value.
    pub fn has(&self, field: &str) -> bool {
        self.text(field).is_some()
    }

    /// Field rendered as trimmed text; numbers and booleans are stringified.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(num) => Some(num.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// First non-blank value among `fields`.
    pub fn text_any(&self, fields: &[&str]) -> Option<String> {
        fields.iter().find_map(|field| self.text(field))
    }

    /// Human-readable locator used in warnings, e.g. `records/q1.json#4 (voyage V-12)`.
    pub fn locator(&self) -> String {
        let mut locator = format!("{}#{}", self.origin, self.index);
        if let Some(leg) = self.text("leg_id") {
            locator.push_str(&format!(" (leg {leg})"));
        } else if let Some(voyage) = self.text_any(&["voyage_id", "id"]) {
            locator.push_str(&format!(" (voyage {voyage})"));
        }
        locator
    }

    pub(crate) fn require_text(
        &self,
        field: &'static str,
        aliases: &[&str],
    ) -> Result<String, IngestWarning> {
        self.text(field)
            .or_else(|| self.text_any(aliases))
            .ok_or_else(|| IngestWarning::MissingField {
                record: self.locator(),
                field,
            })
    }

    pub(crate) fn optional_number(
        &self,
        field: &'static str,
        aliases: &[&str],
    ) -> Result<Option<f64>, IngestWarning> {
        let Some(raw) = self.text(field).or_else(|| self.text_any(aliases)) else {
            return Ok(None);
        };
        raw.replace([' ', '_'], "")
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Some)
            .ok_or_else(|| IngestWarning::InvalidField {
                record: self.locator(),
                field,
                value: raw,
            })
    }

    pub(crate) fn require_timestamp(
        &self,
        field: &'static str,
    ) -> Result<DateTime<Utc>, IngestWarning> {
        self.optional_timestamp(field)?
            .ok_or_else(|| IngestWarning::MissingField {
                record: self.locator(),
                field,
            })
    }

    pub(crate) fn optional_timestamp(
        &self,
        field: &'static str,
    ) -> Result<Option<DateTime<Utc>>, IngestWarning> {
        let Some(raw) = self.text(field) else {
            return Ok(None);
        };
        parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| IngestWarning::UnparsableTimestamp {
                record: self.locator(),
                field,
                value: raw,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stringifies_scalar_fields() {
        let record = RawRecord::from_value(
            "feed",
            0,
            json!({"leg_seq": 3, "voyage_id": " V-1 ", "berth_id": "", "cargo_id": null}),
        );
        assert_eq!(record.text("leg_seq").as_deref(), Some("3"));
        assert_eq!(record.text("voyage_id").as_deref(), Some("V-1"));
        assert!(!record.has("berth_id"));
        assert!(!record.has("cargo_id"));
        assert_eq!(record.locator(), "feed#0 (voyage V-1)");
    }

    #[test]
    fn non_objects_have_no_fields() {
        let record = RawRecord::from_value("feed", 7, json!([1, 2, 3]));
        assert!(!record.has("voyage_id"));
        assert_eq!(record.locator(), "feed#7");
    }

    #[test]
    fn numbers_accept_strings_and_reject_garbage() {
        let record = RawRecord::from_value(
            "feed",
            1,
            json!({"quantity": "5 000", "qty_mt": "lots"}),
        );
        assert_eq!(record.optional_number("quantity", &[]), Ok(Some(5000.0)));
        assert!(matches!(
            record.optional_number("qty_mt", &[]),
            Err(IngestWarning::InvalidField { field: "qty_mt", .. })
        ));
        assert_eq!(record.optional_number("missing", &[]), Ok(None));
    }

    #[test]
    fn timestamps_distinguish_missing_from_unparsable() {
        let record = RawRecord::from_value("feed", 2, json!({"start_time": "soon"}));
        assert!(matches!(
            record.require_timestamp("start_time"),
            Err(IngestWarning::UnparsableTimestamp { .. })
        ));
        assert!(matches!(
            record.require_timestamp("end_time"),
            Err(IngestWarning::MissingField { field: "end_time", .. })
        ));
    }
}
