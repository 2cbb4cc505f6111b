//! In-memory telemetry store.
//!
//! Implements both read contracts over records held in memory. Used by the
//! CLI (which loads a telemetry JSONL dump) and by tests. Inserts keep each
//! kind's records in `(timestamp, id)` order so fetches are already sorted.

use crate::record::{ArtifactKind, RawArtifactRecord};
use crate::source::{ConnectionDirectory, SourceError, TelemetrySource};
use kd_common::{ConnectionId, NamespaceId, TimeWindow};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::path::Path;
use tracing::debug;

/// In-memory implementation of [`TelemetrySource`] and [`ConnectionDirectory`].
#[derive(Debug, Default)]
pub struct InMemoryTelemetryStore {
    records: BTreeMap<ArtifactKind, Vec<RawArtifactRecord>>,
    connections: BTreeSet<ConnectionId>,
    namespaces: BTreeSet<NamespaceId>,
}

impl InMemoryTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a known connection ID.
    pub fn register_connection(&mut self, id: ConnectionId) {
        self.connections.insert(id);
    }

    /// Register a known namespace ID.
    pub fn register_namespace(&mut self, id: NamespaceId) {
        self.namespaces.insert(id);
    }

    /// Insert a record, keeping `(timestamp, id)` order within its kind.
    ///
    /// The record's connection and namespace are registered implicitly.
    pub fn insert(&mut self, record: RawArtifactRecord) {
        self.connections.insert(record.connection_id.clone());
        if let Some(ns) = &record.namespace_id {
            self.namespaces.insert(ns.clone());
        }
        let bucket = self.records.entry(record.kind()).or_default();
        let pos = bucket
            .binary_search_by(|r| {
                r.sort_key()
                    .cmp(&(record.timestamp, &record.id))
            })
            .unwrap_or_else(|p| p);
        bucket.insert(pos, record);
    }

    /// Total record count across all kinds.
    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load records from a JSONL file (one [`RawArtifactRecord`] per line).
    pub fn load_jsonl(path: &Path) -> Result<Self, SourceError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let mut store = Self::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: RawArtifactRecord = serde_json::from_str(&line).map_err(|e| {
                SourceError::Malformed(format!("{}:{}: {}", path.display(), lineno + 1, e))
            })?;
            store.insert(record);
        }
        debug!(
            path = %path.display(),
            records = store.len(),
            "Loaded telemetry dump"
        );
        Ok(store)
    }

    fn matches(
        record: &RawArtifactRecord,
        window: TimeWindow,
        connection_ids: Option<&[ConnectionId]>,
        namespace_id: Option<&NamespaceId>,
    ) -> bool {
        if !window.contains(record.timestamp) {
            return false;
        }
        if let Some(ids) = connection_ids {
            if !ids.contains(&record.connection_id) {
                return false;
            }
        }
        if let Some(ns) = namespace_id {
            if record.namespace_id.as_ref() != Some(ns) {
                return false;
            }
        }
        true
    }
}

impl TelemetrySource for InMemoryTelemetryStore {
    fn fetch(
        &self,
        kind: ArtifactKind,
        window: TimeWindow,
        connection_ids: Option<&[ConnectionId]>,
        namespace_id: Option<&NamespaceId>,
    ) -> Result<Vec<RawArtifactRecord>, SourceError> {
        let records = self
            .records
            .get(&kind)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|r| Self::matches(r, window, connection_ids, namespace_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    fn count(
        &self,
        kind: ArtifactKind,
        window: TimeWindow,
        connection_ids: Option<&[ConnectionId]>,
        namespace_id: Option<&NamespaceId>,
    ) -> Result<u64, SourceError> {
        let count = self
            .records
            .get(&kind)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|r| Self::matches(r, window, connection_ids, namespace_id))
                    .count() as u64
            })
            .unwrap_or(0);
        Ok(count)
    }
}

impl ConnectionDirectory for InMemoryTelemetryStore {
    fn connection_exists(&self, id: &ConnectionId) -> Result<bool, SourceError> {
        Ok(self.connections.contains(id))
    }

    fn namespace_exists(&self, id: &NamespaceId) -> Result<bool, SourceError> {
        Ok(self.namespaces.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ArtifactPayload, LogEvent, MetricSnapshot};
    use chrono::{TimeZone, Utc};
    use kd_common::ArtifactId;
    use std::collections::BTreeMap;
    use std::io::Write;

    fn log_record(id: &str, conn: &str, secs: i64) -> RawArtifactRecord {
        RawArtifactRecord {
            id: ArtifactId::from(id),
            connection_id: ConnectionId::from(conn),
            namespace_id: None,
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            payload: ArtifactPayload::Logs(LogEvent {
                level: "info".into(),
                source: "server".into(),
                message: format!("event {}", id),
                extra: BTreeMap::new(),
            }),
            sensitive_fields: Vec::new(),
        }
    }

    fn window(from: i64, to: i64) -> TimeWindow {
        TimeWindow::new(
            Utc.timestamp_opt(1_700_000_000 + from, 0).unwrap(),
            Utc.timestamp_opt(1_700_000_000 + to, 0).unwrap(),
        )
    }

    #[test]
    fn test_fetch_ordered_by_timestamp_then_id() {
        let mut store = InMemoryTelemetryStore::new();
        store.insert(log_record("b", "conn-1", 10));
        store.insert(log_record("a", "conn-1", 10));
        store.insert(log_record("c", "conn-1", 5));

        let records = store
            .fetch(ArtifactKind::Logs, window(0, 100), None, None)
            .unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.0.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_fetch_window_is_half_open() {
        let mut store = InMemoryTelemetryStore::new();
        store.insert(log_record("a", "conn-1", 0));
        store.insert(log_record("b", "conn-1", 60));

        let records = store
            .fetch(ArtifactKind::Logs, window(0, 60), None, None)
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.0, "a");
    }

    #[test]
    fn test_fetch_filters_by_connection() {
        let mut store = InMemoryTelemetryStore::new();
        store.insert(log_record("a", "conn-1", 1));
        store.insert(log_record("b", "conn-2", 2));

        let filter = vec![ConnectionId::from("conn-2")];
        let records = store
            .fetch(ArtifactKind::Logs, window(0, 100), Some(&filter), None)
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].connection_id.0, "conn-2");
    }

    #[test]
    fn test_fetch_filters_by_namespace() {
        let mut store = InMemoryTelemetryStore::new();
        let mut in_ns = log_record("a", "conn-1", 1);
        in_ns.namespace_id = Some(NamespaceId::new("prod"));
        store.insert(in_ns);
        store.insert(log_record("b", "conn-1", 2));

        let ns = NamespaceId::new("prod");
        let records = store
            .fetch(ArtifactKind::Logs, window(0, 100), None, Some(&ns))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.0, "a");
    }

    #[test]
    fn test_count_matches_fetch() {
        let mut store = InMemoryTelemetryStore::new();
        for i in 0..5 {
            store.insert(log_record(&format!("r{}", i), "conn-1", i));
        }
        let n = store
            .count(ArtifactKind::Logs, window(0, 3), None, None)
            .unwrap();
        let fetched = store
            .fetch(ArtifactKind::Logs, window(0, 3), None, None)
            .unwrap();
        assert_eq!(n as usize, fetched.len());
        assert_eq!(n, 3);
    }

    #[test]
    fn test_insert_registers_identity() {
        let mut store = InMemoryTelemetryStore::new();
        store.insert(log_record("a", "conn-7", 1));
        assert!(store
            .connection_exists(&ConnectionId::from("conn-7"))
            .unwrap());
        assert!(!store
            .connection_exists(&ConnectionId::from("conn-8"))
            .unwrap());
    }

    #[test]
    fn test_fetch_empty_kind() {
        let store = InMemoryTelemetryStore::new();
        let records = store
            .fetch(ArtifactKind::Metrics, window(0, 100), None, None)
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_load_jsonl_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("telemetry.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();

        let record = RawArtifactRecord {
            id: ArtifactId::from("m-1"),
            connection_id: ConnectionId::from("conn-1"),
            namespace_id: None,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            payload: ArtifactPayload::Metrics(MetricSnapshot {
                server_host: Some("cache-1".into()),
                metrics: BTreeMap::from([("used_memory_bytes".to_string(), 1024.0)]),
                extra: BTreeMap::new(),
            }),
            sensitive_fields: Vec::new(),
        };
        writeln!(file, "{}", serde_json::to_string(&record).unwrap()).unwrap();
        writeln!(file).unwrap();

        let store = InMemoryTelemetryStore::load_jsonl(&path).unwrap();
        assert_eq!(store.len(), 1);
        let fetched = store
            .fetch(ArtifactKind::Metrics, window(-10, 10), None, None)
            .unwrap();
        assert_eq!(fetched[0], record);
    }

    #[test]
    fn test_load_jsonl_rejects_malformed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "not json\n").unwrap();

        let err = InMemoryTelemetryStore::load_jsonl(&path).unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }
}
