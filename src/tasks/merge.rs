//! Reconciliation of DataFetch result entries into a task payload
//!
//! Pure: the caller resolves files first and supplies the `dataId` generator,
//! so the same inputs always give the same entries.

use tracing::warn;

use crate::models::{FileId, SensorData, SensorId};

/// One result entry after its file has been resolved (or not)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub sensor: SensorId,
    pub data_id: Option<String>,
    /// File created for (or re-used by) this entry; `None` if its sensor did not resolve
    pub file_id: Option<FileId>,
    pub file_name: String,
    pub bucket: String,
    pub file_path: String,
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub entries: Vec<SensorData>,
    pub updated: usize,
    pub inserted: usize,
    pub skipped: usize,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        self.updated + self.inserted > 0
    }
}

fn apply(target: &mut SensorData, incoming: &ResolvedEntry) {
    if incoming.file_id.is_some() {
        target.file_id = incoming.file_id.clone();
    }
    target.file_name = Some(incoming.file_name.clone());
    target.bucket = Some(incoming.bucket.clone());
    target.file_path = Some(incoming.file_path.clone());
    if incoming.file_url.is_some() {
        target.file_url = incoming.file_url.clone();
    }
}

/// Merge `incoming` into `existing`
///
/// Matching order per entry:
/// 1. `dataId` equal to an existing entry's: update that entry in place
/// 2. an existing entry already pointing at the same file: update in place
/// 3. a resolved file: insert a new entry with a fresh `dataId`
/// 4. otherwise the entry is skipped
pub fn merge_result_entries(
    existing: &[SensorData],
    incoming: &[ResolvedEntry],
    mut next_data_id: impl FnMut() -> String,
) -> MergeOutcome {
    let mut outcome = MergeOutcome {
        entries: existing.to_vec(),
        ..MergeOutcome::default()
    };

    for entry in incoming {
        let by_data_id = entry.data_id.as_deref().and_then(|data_id| {
            outcome
                .entries
                .iter()
                .position(|current| current.data_id == data_id)
        });

        let by_file = || {
            entry.file_id.as_ref().and_then(|file_id| {
                outcome
                    .entries
                    .iter()
                    .position(|current| current.file_id.as_ref() == Some(file_id))
            })
        };

        if let Some(idx) = by_data_id.or_else(by_file) {
            apply(&mut outcome.entries[idx], entry);
            outcome.updated += 1;
            continue;
        }

        match &entry.file_id {
            Some(file_id) => {
                outcome.entries.push(SensorData {
                    sensor: entry.sensor.clone(),
                    data_id: next_data_id(),
                    file_id: Some(file_id.clone()),
                    file_name: Some(entry.file_name.clone()),
                    bucket: Some(entry.bucket.clone()),
                    file_path: Some(entry.file_path.clone()),
                    file_url: entry.file_url.clone(),
                });
                outcome.inserted += 1;
            }
            None => {
                warn!(
                    sensor_id = %entry.sensor,
                    file_name = %entry.file_name,
                    "Result entry matches no payload entry and has no file, skipped"
                );
                outcome.skipped += 1;
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduled(sensor: &str, data_id: &str) -> SensorData {
        SensorData {
            sensor: SensorId::from(sensor),
            data_id: data_id.to_string(),
            file_id: None,
            file_name: Some("F".to_string()),
            bucket: None,
            file_path: None,
            file_url: None,
        }
    }

    fn result(sensor: &str, data_id: Option<&str>, file_id: Option<&str>) -> ResolvedEntry {
        ResolvedEntry {
            sensor: SensorId::from(sensor),
            data_id: data_id.map(str::to_string),
            file_id: file_id.map(FileId::from),
            file_name: format!("{sensor}.csv"),
            bucket: "bucket".to_string(),
            file_path: format!("out/{sensor}.csv"),
            file_url: None,
        }
    }

    fn counter() -> impl FnMut() -> String {
        let mut n = 0;
        move || {
            n += 1;
            format!("generated-{n}")
        }
    }

    #[test]
    fn test_data_id_match_updates_in_place() {
        let existing = vec![scheduled("a", "d1"), scheduled("b", "d2")];
        let incoming = vec![result("a", Some("d1"), Some("f1"))];

        let outcome = merge_result_entries(&existing, &incoming, counter());

        assert_eq!(outcome.entries.len(), 2);
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.entries[0].file_id, Some(FileId::from("f1")));
        assert_eq!(outcome.entries[0].bucket.as_deref(), Some("bucket"));
        assert_eq!(outcome.entries[1].file_id, None);
    }

    #[test]
    fn test_new_file_without_data_id_is_inserted() {
        let existing = vec![scheduled("a", "d1")];
        let incoming = vec![result("a", None, Some("f1"))];

        let outcome = merge_result_entries(&existing, &incoming, counter());

        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.entries.len(), 2);
        assert_eq!(outcome.entries[1].data_id, "generated-1");
        assert_eq!(outcome.entries[1].file_id, Some(FileId::from("f1")));
    }

    #[test]
    fn test_unmatched_entry_without_file_is_skipped() {
        let existing = vec![scheduled("a", "d1")];
        let incoming = vec![result("ghost", Some("unknown"), None)];

        let outcome = merge_result_entries(&existing, &incoming, counter());

        assert_eq!(outcome.skipped, 1);
        assert!(!outcome.changed());
        assert_eq!(outcome.entries, existing);
    }

    #[test]
    fn test_merge_is_idempotent_under_redelivery() {
        let existing = vec![scheduled("a", "d1"), scheduled("b", "d2")];
        let incoming = vec![
            result("a", Some("d1"), Some("f1")),
            result("b", None, Some("f2")),
        ];

        let once = merge_result_entries(&existing, &incoming, counter());
        let twice = merge_result_entries(&once.entries, &incoming, counter());

        assert_eq!(once.entries, twice.entries);
        assert_eq!(twice.inserted, 0);
        assert_eq!(twice.updated, 2);

        let mut data_ids: Vec<_> = twice.entries.iter().map(|e| e.data_id.clone()).collect();
        data_ids.sort();
        data_ids.dedup();
        assert_eq!(data_ids.len(), twice.entries.len());
    }
}
