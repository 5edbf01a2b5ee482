use log::{debug, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::engine::error::CatalogError;
use crate::engine::records::{Record, RecordKind};

/// Full serialized catalog, emitted after every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub key: &'static str,
    pub blob: String,
}

/// Receives a snapshot whenever a catalog changes.
#[derive(Debug, Clone)]
pub struct ChangeHook {
    tx: UnboundedSender<Snapshot>,
}

impl ChangeHook {
    pub fn new(tx: UnboundedSender<Snapshot>) -> Self {
        Self { tx }
    }

    fn notify(&self, snapshot: Snapshot) {
        if self.tx.send(snapshot).is_err() {
            warn!("Persistence writer is gone; change not saved");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
}

/// Ordered in-memory collection of one record kind.
///
/// Ids are not checked for uniqueness here; that is a form-level rule.
#[derive(Debug, Clone)]
pub struct Catalog<T: Record> {
    kind: RecordKind,
    records: Vec<T>,
    hook: Option<ChangeHook>,
}

impl<T: Record> Catalog<T> {
    pub fn new(kind: RecordKind, records: Vec<T>) -> Self {
        Self { kind, records, hook: None }
    }

    pub fn with_hook(mut self, hook: ChangeHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn list(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn create(&mut self, record: T) -> Result<(), CatalogError> {
        debug!("{}: create {}", self.kind, record.id());
        self.records.push(record);
        self.changed()
    }

    /// Replaces the first record with `id`. Returns `false`, and changes
    /// nothing, when no record has that id.
    pub fn update(&mut self, id: &str, record: T) -> Result<bool, CatalogError> {
        match self.records.iter_mut().find(|r| r.id() == id) {
            Some(slot) => {
                debug!("{}: update {}", self.kind, id);
                *slot = record;
                self.changed()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Removes every record with `id` and returns how many were removed.
    pub fn delete(&mut self, id: &str) -> Result<usize, CatalogError> {
        let before = self.records.len();
        self.records.retain(|r| r.id() != id);
        let removed = before - self.records.len();
        if removed > 0 {
            debug!("{}: delete {} ({} removed)", self.kind, id, removed);
            self.changed()?;
        }
        Ok(removed)
    }

    /// Replaces the record stored under `original_id` (or the record's own id)
    /// if present, otherwise appends it.
    pub fn save(&mut self, original_id: Option<&str>, record: T) -> Result<SaveOutcome, CatalogError> {
        let target = original_id.unwrap_or(record.id()).to_string();
        if self.contains(&target) {
            self.update(&target, record)?;
            Ok(SaveOutcome::Updated)
        } else {
            self.create(record)?;
            Ok(SaveOutcome::Created)
        }
    }

    /// Replaces the whole collection, e.g. on import.
    pub fn replace_all(&mut self, records: Vec<T>) -> Result<(), CatalogError> {
        debug!("{}: replace all ({} records)", self.kind, records.len());
        self.records = records;
        self.changed()
    }

    pub fn to_blob(&self) -> Result<String, CatalogError> {
        serde_json::to_string(&self.records).map_err(|source| CatalogError::Serialize { kind: self.kind, source })
    }

    pub fn from_blob(kind: RecordKind, blob: &str) -> Result<Self, CatalogError> {
        let records = serde_json::from_str(blob).map_err(|source| CatalogError::Deserialize { kind, source })?;
        Ok(Self::new(kind, records))
    }

    fn changed(&self) -> Result<(), CatalogError> {
        if let Some(hook) = &self.hook {
            let blob = self.to_blob()?;
            hook.notify(Snapshot { key: self.kind.storage_key(), blob });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::records::{Fish, Rarity};
    use tokio::sync::mpsc;

    fn fish(id: &str, name: &str) -> Fish {
        Fish { id: id.into(), name: name.into(), rarity: Rarity::Common, ..Fish::default() }
    }

    fn sample() -> Catalog<Fish> {
        Catalog::new(RecordKind::Fish, vec![fish("002", "Carp"), fish("010", "Pike"), fish("001", "Trout")])
    }

    #[test]
    fn update_replaces_exactly_one_record() {
        let mut catalog = sample();
        let changed = catalog.update("010", fish("010", "Northern Pike")).unwrap();

        assert!(changed);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("010").unwrap().name, "Northern Pike");
        assert_eq!(catalog.list()[1].id, "010");
    }

    #[test]
    fn update_of_absent_id_is_a_no_op() {
        let mut catalog = sample();
        assert!(!catalog.update("999", fish("999", "Ghost")).unwrap());
        assert_eq!(catalog.len(), 3);
        assert!(!catalog.contains("999"));
    }

    #[test]
    fn update_only_touches_the_first_duplicate() {
        let mut catalog = sample();
        catalog.create(fish("002", "Second Carp")).unwrap();
        catalog.update("002", fish("002", "Mirror Carp")).unwrap();

        let names: Vec<_> = catalog.list().iter().filter(|f| f.id == "002").map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Mirror Carp", "Second Carp"]);
    }

    #[test]
    fn delete_removes_all_matches_and_nothing_else() {
        let mut catalog = sample();
        catalog.create(fish("002", "Duplicate")).unwrap();

        assert_eq!(catalog.delete("002").unwrap(), 2);
        let ids: Vec<_> = catalog.list().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["010", "001"]);
        assert_eq!(catalog.delete("002").unwrap(), 0);
    }

    #[test]
    fn save_with_existing_id_keeps_length() {
        let mut catalog = sample();
        assert_eq!(catalog.save(None, fish("001", "Brook Trout")).unwrap(), SaveOutcome::Updated);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.save(None, fish("003", "Bass")).unwrap(), SaveOutcome::Created);
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn save_with_renamed_id_replaces_the_original() {
        let mut catalog = sample();
        catalog.save(Some("001"), fish("001a", "Trout")).unwrap();
        assert!(!catalog.contains("001"));
        assert_eq!(catalog.list()[2].id, "001a");
    }

    #[test]
    fn blob_round_trip_preserves_order() {
        let catalog = sample();
        let blob = catalog.to_blob().unwrap();
        let restored = Catalog::<Fish>::from_blob(RecordKind::Fish, &blob).unwrap();
        assert_eq!(restored.list(), catalog.list());
    }

    #[test]
    fn garbage_blob_is_reported() {
        let err = Catalog::<Fish>::from_blob(RecordKind::Fish, "{not json").unwrap_err();
        assert!(matches!(err, CatalogError::Deserialize { kind: RecordKind::Fish, .. }));
    }

    #[test]
    fn every_mutation_emits_a_snapshot() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut catalog = sample().with_hook(ChangeHook::new(tx));

        catalog.create(fish("020", "Eel")).unwrap();
        catalog.update("020", fish("020", "Moray")).unwrap();
        catalog.update("missing", fish("missing", "x")).unwrap();
        catalog.delete("020").unwrap();
        catalog.delete("020").unwrap();

        let mut snapshots = Vec::new();
        while let Ok(snapshot) = rx.try_recv() {
            snapshots.push(snapshot);
        }
        assert_eq!(snapshots.len(), 3);
        assert!(snapshots.iter().all(|s| s.key == "fishwiki.fish"));
        assert!(snapshots[1].blob.contains("Moray"));
        assert_eq!(snapshots[2].blob, sample().to_blob().unwrap());
    }
}
