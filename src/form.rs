use crate::calc;
use crate::db;
use crate::records::{ResultRecord, SubjectScore};
use crate::validate::{SubjectEntry, ValidationError};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

pub const PRESET_KEY: &str = "form.preset";
pub const UNIQUE_ROLL_NO_KEY: &str = "form.enforceUniqueRollNo";

/// Entry-form layouts. The flexible subject list is the one record shape;
/// the other two reproduce the register's earlier fixed-layout revisions on
/// top of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum FormPreset {
    Flexible,
    FixedSubjects { names: Vec<String> },
    FixedTotal { maximum: u32 },
}

impl Default for FormPreset {
    fn default() -> Self {
        FormPreset::Flexible
    }
}

impl FormPreset {
    /// Rejects presets that could never produce a valid submission.
    pub fn check(&self) -> Result<(), String> {
        match self {
            FormPreset::Flexible => Ok(()),
            FormPreset::FixedSubjects { names } => {
                if names.is_empty() {
                    return Err("fixedSubjects needs at least one subject name".to_string());
                }
                if names.iter().any(|n| n.trim().is_empty()) {
                    return Err("fixedSubjects names must not be blank".to_string());
                }
                Ok(())
            }
            FormPreset::FixedTotal { maximum } => {
                if *maximum == 0 {
                    return Err("fixedTotal maximum must be at least 1".to_string());
                }
                Ok(())
            }
        }
    }

    fn locks_layout(&self) -> bool {
        !matches!(self, FormPreset::Flexible)
    }
}

pub fn load_preset(conn: &Connection) -> anyhow::Result<FormPreset> {
    let Some(value) = db::settings_get_json(conn, PRESET_KEY)? else {
        return Ok(FormPreset::default());
    };
    match serde_json::from_value(value) {
        Ok(preset) => Ok(preset),
        Err(e) => {
            tracing::warn!(error = %e, "stored form preset failed to parse; using flexible");
            Ok(FormPreset::default())
        }
    }
}

pub fn save_preset(conn: &Connection, preset: &FormPreset) -> anyhow::Result<()> {
    db::settings_set_json(conn, PRESET_KEY, &serde_json::to_value(preset)?)
}

pub fn load_unique_roll_no(conn: &Connection) -> anyhow::Result<bool> {
    Ok(db::settings_get_json(conn, UNIQUE_ROLL_NO_KEY)?
        .and_then(|v| v.as_bool())
        .unwrap_or(false))
}

pub fn save_unique_roll_no(conn: &Connection, enabled: bool) -> anyhow::Result<()> {
    db::settings_set_json(conn, UNIQUE_ROLL_NO_KEY, &serde_json::Value::Bool(enabled))
}

/// One editable subject row. Fields hold raw entry text; parsing happens at
/// submit time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectDraft {
    pub id: i64,
    pub name: String,
    pub obtained: String,
    pub maximum: String,
}

/// The editing state of the entry form. Submit validates, hands the record
/// to the store, and resets to the preset's fresh state; on failure the
/// draft is left untouched.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDraft {
    pub roll_no: String,
    pub subjects: Vec<SubjectDraft>,
}

/// Running totals for the form footer, tolerant of half-typed fields:
/// anything unparseable counts as zero.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftTotals {
    pub total_obtained: u32,
    pub total_maximum: u32,
    pub current_percentage: f64,
}

impl FormDraft {
    pub fn fresh(preset: &FormPreset) -> Self {
        let subjects = match preset {
            FormPreset::Flexible => vec![SubjectDraft {
                id: 1,
                name: "Subject 1".to_string(),
                obtained: String::new(),
                maximum: String::new(),
            }],
            FormPreset::FixedSubjects { names } => names
                .iter()
                .enumerate()
                .map(|(i, name)| SubjectDraft {
                    id: i as i64 + 1,
                    name: name.clone(),
                    obtained: String::new(),
                    maximum: String::new(),
                })
                .collect(),
            FormPreset::FixedTotal { maximum } => vec![SubjectDraft {
                id: 1,
                name: "Total".to_string(),
                obtained: String::new(),
                maximum: maximum.to_string(),
            }],
        };
        Self {
            roll_no: String::new(),
            subjects,
        }
    }

    /// True while nothing has been entered yet. Preset switches refuse to
    /// throw away a draft that fails this.
    pub fn is_pristine(&self) -> bool {
        self.roll_no.trim().is_empty()
            && self.subjects.iter().all(|s| s.obtained.trim().is_empty())
    }

    /// Appends a subject row with id = max existing id + 1 (1 when empty).
    pub fn add_subject(&mut self, preset: &FormPreset) -> Result<i64, ValidationError> {
        if preset.locks_layout() {
            return Err(ValidationError::new(
                "preset_locked",
                "The active preset has a fixed subject layout",
            ));
        }
        let id = self.subjects.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        self.subjects.push(SubjectDraft {
            id,
            name: format!("Subject {id}"),
            obtained: String::new(),
            maximum: String::new(),
        });
        Ok(id)
    }

    /// Deletes a subject row, refusing to empty the form.
    pub fn remove_subject(&mut self, preset: &FormPreset, id: i64) -> Result<(), ValidationError> {
        if preset.locks_layout() {
            return Err(ValidationError::new(
                "preset_locked",
                "The active preset has a fixed subject layout",
            ));
        }
        if !self.subjects.iter().any(|s| s.id == id) {
            return Err(ValidationError::new("not_found", "no such subject row")
                .with_details(json!({ "subjectId": id })));
        }
        if self.subjects.len() <= 1 {
            return Err(ValidationError::new(
                "last_subject",
                "You must have at least one subject",
            ));
        }
        self.subjects.retain(|s| s.id != id);
        Ok(())
    }

    pub fn update_roll_no(&mut self, value: &str) {
        self.roll_no = value.to_string();
    }

    pub fn update_subject_field(
        &mut self,
        preset: &FormPreset,
        id: i64,
        field: &str,
        value: &str,
    ) -> Result<(), ValidationError> {
        let Some(subject) = self.subjects.iter_mut().find(|s| s.id == id) else {
            return Err(ValidationError::new("not_found", "no such subject row")
                .with_details(json!({ "subjectId": id })));
        };
        match field {
            "name" => {
                if preset.locks_layout() {
                    return Err(ValidationError::new(
                        "preset_locked",
                        "Subject names are fixed by the active preset",
                    ));
                }
                subject.name = value.to_string();
            }
            "obtained" => subject.obtained = value.to_string(),
            "maximum" => {
                if matches!(preset, FormPreset::FixedTotal { .. }) {
                    return Err(ValidationError::new(
                        "preset_locked",
                        "Maximum marks are fixed by the active preset",
                    ));
                }
                subject.maximum = value.to_string();
            }
            other => {
                return Err(ValidationError::new("bad_params", "unknown form field")
                    .with_details(json!({ "field": other })));
            }
        }
        Ok(())
    }

    pub fn totals(&self) -> DraftTotals {
        let parse = |raw: &str| raw.trim().parse::<u32>().unwrap_or(0);
        let total_obtained: u32 = self.subjects.iter().map(|s| parse(&s.obtained)).sum();
        let total_maximum: u32 = self.subjects.iter().map(|s| parse(&s.maximum)).sum();
        let current_percentage = if total_maximum > 0 {
            calc::round_off_2_decimals(100.0 * f64::from(total_obtained) / f64::from(total_maximum))
        } else {
            0.0
        };
        DraftTotals {
            total_obtained,
            total_maximum,
            current_percentage,
        }
    }
}

/// Assembles the immutable record out of validated entries. The percentage
/// stored here is the creation-time value the persisted layout calls for;
/// display derives its own from the totals.
pub fn build_record(roll_no: i64, entries: Vec<SubjectEntry>) -> ResultRecord {
    let obtained: u32 = entries.iter().map(|e| e.obtained).sum();
    let maximum: u32 = entries.iter().map(|e| e.maximum).sum();
    let percentage = if maximum > 0 {
        100.0 * f64::from(obtained) / f64::from(maximum)
    } else {
        0.0
    };
    let subjects: BTreeMap<i64, SubjectScore> = entries
        .into_iter()
        .map(|e| {
            (
                e.id,
                SubjectScore {
                    id: e.id,
                    name: e.name,
                    obtained: e.obtained,
                    maximum: e.maximum,
                },
            )
        })
        .collect();
    ResultRecord {
        roll_no,
        obtained,
        maximum,
        percentage,
        subjects,
    }
}
