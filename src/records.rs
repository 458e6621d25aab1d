//! Typed tracker records.
//!
//! The vault itself is payload-agnostic; these types give each tracker
//! category a fixed table name and a typed add/latest/all surface on the
//! facade. Every record carries a `timestamp`, which is what
//! `get_latest` selects on.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A payload type bound to a named vault table.
pub trait TrackerRecord: Serialize + DeserializeOwned {
    /// The table this record category lives in.
    const TABLE: &'static str;

    /// Event time, used for latest-record selection.
    fn timestamp(&self) -> DateTime<Utc>;
}

macro_rules! timestamped {
    ($ty:ident, $table:literal) => {
        impl TrackerRecord for $ty {
            const TABLE: &'static str = $table;

            fn timestamp(&self) -> DateTime<Utc> {
                self.timestamp
            }
        }
    };
}

/// One symptom log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymptomEntry {
    pub timestamp: DateTime<Utc>,
    /// Pain level, 0-10.
    pub pain: u8,
    pub heart_rate_current: Option<u16>,
    pub heart_rate_resting: Option<u16>,
    pub emotional_state: String,
    pub emotional_notes: String,
    pub sensory: Vec<String>,
    pub medication: Vec<String>,
}
timestamped!(SymptomEntry, "symptoms");

/// Running calorie total at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalorieEntry {
    pub timestamp: DateTime<Utc>,
    pub value: u32,
}
timestamped!(CalorieEntry, "calories");

/// A weight measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightEntry {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}
timestamped!(WeightEntry, "weight");

/// One night of sleep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepEntry {
    pub timestamp: DateTime<Utc>,
    pub hours: f64,
    pub quality: Option<u8>,
}
timestamped!(SleepEntry, "sleep");

/// A medication dose taken (or skipped).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationEntry {
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub taken: bool,
}
timestamped!(MedicationEntry, "medication");

/// Nicotine intake event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NicotineEntry {
    pub timestamp: DateTime<Utc>,
    pub count: u32,
}
timestamped!(NicotineEntry, "nicotine");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_serialize_with_timestamp_field() {
        // `get_latest` reads the `timestamp` field from the serialized
        // payload; every record type must expose it under that name.
        let entry = WeightEntry {
            timestamp: Utc::now(),
            value: 81.5,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("timestamp").is_some());
        assert_eq!(WeightEntry::TABLE, "weight");
    }
}
