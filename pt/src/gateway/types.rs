//! Wire-format types for the progress service

use serde::Deserialize;
use serde_json::Value;

use crate::domain::{ActionId, DutyId, ProgPoint};

/// Completion flag payload for duty and point status queries
#[derive(Debug, Deserialize)]
pub(crate) struct CompletionStatus {
    pub completed: bool,
}

/// Catalog payload: the list of progress points for one duty
#[derive(Debug, Deserialize)]
pub(crate) struct RawCatalog {
    #[serde(default)]
    pub points: Vec<RawPoint>,
}

/// One catalog entry as it arrives off the wire
///
/// The id field is left dynamic: depending on the service version it
/// arrives as an unsigned integer, a signed integer, a float, or a
/// numeric string.
#[derive(Debug, Deserialize)]
pub(crate) struct RawPoint {
    pub id: Value,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub completed: bool,
}

impl RawPoint {
    /// Convert to a typed point, dropping entries with unparseable ids
    pub fn into_point(self) -> Option<ProgPoint> {
        let id = parse_point_id(&self.id)?;
        Some(ProgPoint {
            id: ActionId(id),
            name: self.name,
            completed: self.completed,
        })
    }
}

/// Parse a progress-point id out of a dynamic JSON value
///
/// Explicit fallback chain: u64, then i64, then integral f64, then a
/// numeric string. Anything else is an unparseable id.
pub(crate) fn parse_point_id(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => {
            if let Some(unsigned) = number.as_u64() {
                u32::try_from(unsigned).ok()
            } else if let Some(signed) = number.as_i64() {
                u32::try_from(signed).ok()
            } else {
                number.as_f64().and_then(|float| {
                    if float.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&float) {
                        Some(float as u32)
                    } else {
                        None
                    }
                })
            }
        }
        Value::String(text) => text.trim().parse::<u32>().ok(),
        _ => None,
    }
}

/// Multi-Status payload for bulk completion writes
#[derive(Debug, Default, Deserialize)]
pub(crate) struct BulkResponse {
    #[serde(default)]
    pub created: Vec<u32>,
    #[serde(default)]
    pub existing: Vec<u32>,
    #[serde(default)]
    pub invalid_ids: Vec<u32>,
}

/// Body of a moderation-style rejection (422)
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RejectionBody {
    #[serde(default)]
    pub reason: String,
}

/// Client-facing result of a bulk completion write
///
/// A partial result is still an overall success: the accepted subset was
/// recorded and the rejected ids are surfaced for diagnostics, not retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkOutcome {
    AllAccepted { accepted: Vec<DutyId> },
    Partial { accepted: Vec<DutyId>, rejected: Vec<DutyId> },
}

impl BulkOutcome {
    pub fn accepted(&self) -> &[DutyId] {
        match self {
            Self::AllAccepted { accepted } => accepted,
            Self::Partial { accepted, .. } => accepted,
        }
    }

    pub fn rejected(&self) -> &[DutyId] {
        match self {
            Self::AllAccepted { .. } => &[],
            Self::Partial { rejected, .. } => rejected,
        }
    }
}

impl BulkResponse {
    pub fn into_outcome(self) -> BulkOutcome {
        let accepted: Vec<DutyId> = self
            .created
            .iter()
            .chain(self.existing.iter())
            .map(|raw| DutyId(*raw))
            .collect();
        let rejected: Vec<DutyId> = self.invalid_ids.iter().map(|raw| DutyId(*raw)).collect();
        if rejected.is_empty() {
            BulkOutcome::AllAccepted { accepted }
        } else {
            BulkOutcome::Partial { accepted, rejected }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_point_id_unsigned() {
        assert_eq!(parse_point_id(&json!(25772)), Some(25772));
    }

    #[test]
    fn test_parse_point_id_signed() {
        assert_eq!(parse_point_id(&json!(-1)), None);
        assert_eq!(parse_point_id(&Value::from(25772i64)), Some(25772));
    }

    #[test]
    fn test_parse_point_id_float() {
        assert_eq!(parse_point_id(&json!(25772.0)), Some(25772));
        assert_eq!(parse_point_id(&json!(25772.5)), None);
    }

    #[test]
    fn test_parse_point_id_string() {
        assert_eq!(parse_point_id(&json!("25772")), Some(25772));
        assert_eq!(parse_point_id(&json!(" 42 ")), Some(42));
        assert_eq!(parse_point_id(&json!("boss")), None);
    }

    #[test]
    fn test_parse_point_id_rejects_other_shapes() {
        assert_eq!(parse_point_id(&json!(null)), None);
        assert_eq!(parse_point_id(&json!([25772])), None);
        assert_eq!(parse_point_id(&json!(u64::MAX)), None);
    }

    #[test]
    fn test_raw_point_conversion() {
        let raw: RawPoint =
            serde_json::from_value(json!({"id": "101", "name": "Ravana", "completed": true}))
                .expect("should parse");
        let point = raw.into_point().expect("id should parse");
        assert_eq!(point.id, ActionId(101));
        assert_eq!(point.name, "Ravana");
        assert!(point.completed);
    }

    #[test]
    fn test_raw_point_drops_bad_id() {
        let raw: RawPoint =
            serde_json::from_value(json!({"id": {"nested": 1}, "name": "x"})).expect("should parse");
        assert!(raw.into_point().is_none());
    }

    #[test]
    fn test_bulk_response_all_accepted() {
        let response: BulkResponse =
            serde_json::from_value(json!({"created": [1, 2], "existing": [3]})).expect("parse");
        let outcome = response.into_outcome();
        assert_eq!(outcome, BulkOutcome::AllAccepted {
            accepted: vec![DutyId(1), DutyId(2), DutyId(3)],
        });
        assert!(outcome.rejected().is_empty());
    }

    #[test]
    fn test_bulk_response_partial() {
        let response: BulkResponse =
            serde_json::from_value(json!({"created": [1, 2], "invalid_ids": [3]})).expect("parse");
        let outcome = response.into_outcome();
        assert_eq!(outcome.accepted(), &[DutyId(1), DutyId(2)]);
        assert_eq!(outcome.rejected(), &[DutyId(3)]);
    }
}
