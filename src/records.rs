use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// One subject row of a submitted result. `id` is unique within its record
/// and assigned by the form (max existing id + 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectScore {
    #[serde(deserialize_with = "de_int")]
    pub id: i64,
    pub name: String,
    #[serde(serialize_with = "ser_mark", deserialize_with = "de_mark")]
    pub obtained: u32,
    #[serde(serialize_with = "ser_mark", deserialize_with = "de_mark")]
    pub maximum: u32,
}

/// One student's submitted marks plus the percentage stored at creation
/// time. Records are append-only; they are never mutated after submit.
///
/// The persisted layout keeps the register's historical shape: `obtained`
/// and `maximum` are written as strings (earlier revisions persisted raw
/// input text), `rollNo` may arrive as a number or a numeric string, and
/// `subjects` is keyed by stringified subject id. Display code derives
/// percentages from `obtained`/`maximum`; the stored `percentage` exists so
/// older readers of the same store keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    #[serde(deserialize_with = "de_int")]
    pub roll_no: i64,
    #[serde(serialize_with = "ser_mark", deserialize_with = "de_mark")]
    pub obtained: u32,
    #[serde(serialize_with = "ser_mark", deserialize_with = "de_mark")]
    pub maximum: u32,
    pub percentage: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subjects: BTreeMap<i64, SubjectScore>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

fn de_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawNumber::deserialize(deserializer)? {
        RawNumber::Int(v) => Ok(v),
        RawNumber::Float(v) => Ok(v as i64),
        RawNumber::Text(s) => {
            let t = s.trim();
            if t.is_empty() {
                return Ok(0);
            }
            t.parse::<i64>().map_err(serde::de::Error::custom)
        }
    }
}

fn de_mark<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let v = de_int(deserializer)?;
    u32::try_from(v).map_err(|_| serde::de::Error::custom("mark out of range"))
}

fn ser_mark<S>(value: &u32, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_legacy_string_typed_fields() {
        let raw = json!({
            "rollNo": "12",
            "obtained": "450",
            "maximum": "500",
            "percentage": 90.0,
            "subjects": {
                "1": { "id": 1, "name": "Maths", "obtained": "450", "maximum": "500" }
            }
        });
        let record: ResultRecord = serde_json::from_value(raw).expect("legacy record");
        assert_eq!(record.roll_no, 12);
        assert_eq!(record.obtained, 450);
        assert_eq!(record.maximum, 500);
        assert_eq!(record.subjects[&1].name, "Maths");
        assert_eq!(record.subjects[&1].maximum, 500);
    }

    #[test]
    fn reads_numeric_fields_and_missing_subjects() {
        let raw = json!({
            "rollNo": 7,
            "obtained": 300,
            "maximum": 500,
            "percentage": 60.0
        });
        let record: ResultRecord = serde_json::from_value(raw).expect("numeric record");
        assert_eq!(record.roll_no, 7);
        assert!(record.subjects.is_empty());
    }

    #[test]
    fn writes_marks_as_strings() {
        let record = ResultRecord {
            roll_no: 3,
            obtained: 88,
            maximum: 100,
            percentage: 88.0,
            subjects: BTreeMap::new(),
        };
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["rollNo"], json!(3));
        assert_eq!(value["obtained"], json!("88"));
        assert_eq!(value["maximum"], json!("100"));
        assert!(value.get("subjects").is_none());
    }

    #[test]
    fn round_trips_through_its_own_layout() {
        let mut subjects = BTreeMap::new();
        subjects.insert(
            2,
            SubjectScore {
                id: 2,
                name: "Science".to_string(),
                obtained: 40,
                maximum: 50,
            },
        );
        let record = ResultRecord {
            roll_no: 9,
            obtained: 40,
            maximum: 50,
            percentage: 80.0,
            subjects,
        };
        let text = serde_json::to_string(&record).expect("serialize");
        let back: ResultRecord = serde_json::from_str(&text).expect("reparse");
        assert_eq!(back, record);
    }

    #[test]
    fn negative_mark_is_a_parse_error() {
        let raw = json!({
            "rollNo": 1,
            "obtained": "-5",
            "maximum": "100",
            "percentage": 0.0
        });
        assert!(serde_json::from_value::<ResultRecord>(raw).is_err());
    }
}
