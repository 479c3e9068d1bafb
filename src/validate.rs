use crate::form::{FormDraft, FormPreset};
use crate::records::ResultRecord;
use serde::Serialize;
use serde_json::json;

/// A blocking validation failure. Submission aborts with no state change;
/// the message names the violated constraint the way the register's alerts
/// did.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ValidationError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// One subject row parsed out of the draft, ready to become a
/// [`crate::records::SubjectScore`].
#[derive(Debug, Clone)]
pub struct SubjectEntry {
    pub id: i64,
    pub name: String,
    pub obtained: u32,
    pub maximum: u32,
}

fn parse_mark(raw: &str, subject: &str, field: &str) -> Result<u32, ValidationError> {
    let t = raw.trim();
    // Blank fields count as zero, as the legacy entry form treated them.
    if t.is_empty() {
        return Ok(0);
    }
    t.parse::<u32>().map_err(|_| {
        ValidationError::new(
            "bad_number",
            format!("{subject}: {field} marks must be a whole number"),
        )
        .with_details(json!({ "subject": subject, "field": field, "value": raw }))
    })
}

/// Checks the draft against the domain constraints and parses it into a
/// roll number plus subject entries. The first violation aborts; there is
/// no partial acceptance.
pub fn validate_draft(
    draft: &FormDraft,
    preset: &FormPreset,
    existing: &[ResultRecord],
    enforce_unique_roll_no: bool,
) -> Result<(i64, Vec<SubjectEntry>), ValidationError> {
    let roll_raw = draft.roll_no.trim();
    if roll_raw.is_empty() {
        return Err(ValidationError::new("bad_number", "Roll number is required"));
    }
    let roll_no: i64 = roll_raw.parse().map_err(|_| {
        ValidationError::new("bad_number", "Roll number must be a whole number")
            .with_details(json!({ "value": draft.roll_no }))
    })?;

    if draft.subjects.is_empty() {
        return Err(ValidationError::new(
            "last_subject",
            "You must have at least one subject",
        ));
    }

    let mut entries = Vec::with_capacity(draft.subjects.len());
    for subject in &draft.subjects {
        let obtained = parse_mark(&subject.obtained, &subject.name, "Obtained")?;
        let maximum = parse_mark(&subject.maximum, &subject.name, "Maximum")?;
        if obtained > maximum {
            return Err(ValidationError::new(
                "marks_exceed_maximum",
                format!(
                    "{}: Obtained marks cannot exceed maximum marks",
                    subject.name
                ),
            )
            .with_details(json!({
                "subjectId": subject.id,
                "obtained": obtained,
                "maximum": maximum
            })));
        }
        if subject.name.trim().is_empty() {
            return Err(ValidationError::new(
                "empty_subject_name",
                "All subjects must have names",
            )
            .with_details(json!({ "subjectId": subject.id })));
        }
        entries.push(SubjectEntry {
            id: subject.id,
            name: subject.name.clone(),
            obtained,
            maximum,
        });
    }

    let total_obtained: u32 = entries.iter().map(|e| e.obtained).sum();
    let total_maximum: u32 = entries.iter().map(|e| e.maximum).sum();

    if let FormPreset::FixedTotal { maximum } = preset {
        if total_obtained > *maximum {
            return Err(ValidationError::new(
                "total_exceeds_maximum",
                "Obtained marks cannot exceed maximum marks",
            )
            .with_details(json!({
                "totalObtained": total_obtained,
                "maximum": maximum
            })));
        }
    }

    if total_maximum == 0 {
        return Err(ValidationError::new(
            "maximum_required",
            "Maximum marks are required",
        ));
    }

    if enforce_unique_roll_no && existing.iter().any(|r| r.roll_no == roll_no) {
        return Err(ValidationError::new(
            "duplicate_roll_no",
            format!("Roll number {roll_no} already has a submitted result"),
        )
        .with_details(json!({ "rollNo": roll_no })));
    }

    Ok((roll_no, entries))
}
