use crate::db;
use crate::records::ResultRecord;
use rusqlite::Connection;

/// Fixed key the record collection is mirrored under.
pub const RESULTS_KEY: &str = "results";

/// Owns the authoritative in-memory collection for the lifetime of the
/// session. The settings row under [`RESULTS_KEY`] is a passive durability
/// mirror: read once when the workspace opens, rewritten in full on every
/// change. Single-writer by construction; no locking.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<ResultRecord>,
}

impl RecordStore {
    /// Loads the mirrored collection. Absence or malformed data yields an
    /// empty store, never an error; only the database itself failing to
    /// answer is fatal.
    pub fn load(conn: &Connection) -> anyhow::Result<Self> {
        let Some(value) = db::settings_get_json(conn, RESULTS_KEY)? else {
            return Ok(Self::default());
        };
        match serde_json::from_value::<Vec<ResultRecord>>(value) {
            Ok(records) => Ok(Self { records }),
            Err(e) => {
                tracing::warn!(error = %e, "stored results failed to parse; starting empty");
                Ok(Self::default())
            }
        }
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains_roll_no(&self, roll_no: i64) -> bool {
        self.records.iter().any(|r| r.roll_no == roll_no)
    }

    /// Appends the record and synchronously rewrites the mirror.
    pub fn add(&mut self, conn: &Connection, record: ResultRecord) -> anyhow::Result<()> {
        self.records.push(record);
        self.persist(conn)
    }

    /// Removes every record with the given roll number (duplicates
    /// included) and rewrites the mirror.
    pub fn remove(&mut self, conn: &Connection, roll_no: i64) -> anyhow::Result<usize> {
        let before = self.records.len();
        self.records.retain(|r| r.roll_no != roll_no);
        let removed = before - self.records.len();
        self.persist(conn)?;
        Ok(removed)
    }

    fn persist(&self, conn: &Connection) -> anyhow::Result<()> {
        let value = serde_json::to_value(&self.records)?;
        db::settings_set_json(conn, RESULTS_KEY, &value)
    }
}
