//! Typed access to the metadata store: template records, participants and
//! the current-batch pointer.

use common::model::participant::Participant;
use common::model::template::TemplateRecord;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::{MetadataStore, StorageResult};

const TEMPLATE_PREFIX: &str = "templates:";
const PARTICIPANT_PREFIX: &str = "participants:";
const ROSTER_CHECKSUM_KEY: &str = "roster:checksum";
pub const CURRENT_BATCH_KEY: &str = "certificate:current_batch_id";

async fn get_json<T: DeserializeOwned>(kv: &dyn MetadataStore, key: &str) -> StorageResult<Option<T>> {
    match kv.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

async fn set_json<T: Serialize + Sync>(
    kv: &dyn MetadataStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> StorageResult<()> {
    let raw = serde_json::to_string(value)?;
    kv.set(key, &raw, ttl).await
}

/// Loads every record under `prefix`. Entries that expire or vanish between
/// listing and reading are skipped.
async fn load_all<T: DeserializeOwned>(kv: &dyn MetadataStore, prefix: &str) -> StorageResult<Vec<T>> {
    let mut out = Vec::new();
    for key in kv.list_by_prefix(prefix).await? {
        if let Some(record) = get_json(kv, &key).await? {
            out.push(record);
        }
    }
    Ok(out)
}

#[derive(Clone)]
pub struct TemplateRepo {
    kv: Arc<dyn MetadataStore>,
}

impl TemplateRepo {
    pub fn new(kv: Arc<dyn MetadataStore>) -> Self {
        TemplateRepo { kv }
    }

    pub async fn get(&self, id: &str) -> StorageResult<Option<TemplateRecord>> {
        get_json(self.kv.as_ref(), &format!("{TEMPLATE_PREFIX}{id}")).await
    }

    pub async fn save(&self, record: &TemplateRecord) -> StorageResult<()> {
        set_json(self.kv.as_ref(), &format!("{TEMPLATE_PREFIX}{}", record.id), record, None).await
    }

    pub async fn delete(&self, id: &str) -> StorageResult<bool> {
        self.kv.delete(&format!("{TEMPLATE_PREFIX}{id}")).await
    }

    pub async fn all(&self) -> StorageResult<Vec<TemplateRecord>> {
        load_all(self.kv.as_ref(), TEMPLATE_PREFIX).await
    }
}

#[derive(Clone)]
pub struct ParticipantRepo {
    kv: Arc<dyn MetadataStore>,
}

impl ParticipantRepo {
    pub fn new(kv: Arc<dyn MetadataStore>) -> Self {
        ParticipantRepo { kv }
    }

    pub async fn get(&self, id: &str) -> StorageResult<Option<Participant>> {
        get_json(self.kv.as_ref(), &format!("{PARTICIPANT_PREFIX}{id}")).await
    }

    pub async fn save(&self, participant: &Participant, ttl: Option<Duration>) -> StorageResult<()> {
        let key = format!("{PARTICIPANT_PREFIX}{}", participant.id);
        set_json(self.kv.as_ref(), &key, participant, ttl).await
    }

    pub async fn delete(&self, id: &str) -> StorageResult<bool> {
        self.kv.delete(&format!("{PARTICIPANT_PREFIX}{id}")).await
    }

    /// All stored participants. Records without a name are never returned.
    pub async fn all(&self) -> StorageResult<Vec<Participant>> {
        let mut all: Vec<Participant> = load_all(self.kv.as_ref(), PARTICIPANT_PREFIX).await?;
        all.retain(|p| !p.full_name.trim().is_empty());
        Ok(all)
    }

    pub async fn delete_all(&self) -> StorageResult<usize> {
        let mut count = 0;
        for key in self.kv.list_by_prefix(PARTICIPANT_PREFIX).await? {
            if self.kv.delete(&key).await? {
                count += 1;
            }
        }
        Ok(count)
    }

    pub async fn set_checksum(&self, checksum: &str, ttl: Option<Duration>) -> StorageResult<()> {
        self.kv.set(ROSTER_CHECKSUM_KEY, checksum, ttl).await
    }

    pub async fn checksum(&self) -> StorageResult<Option<String>> {
        self.kv.get(ROSTER_CHECKSUM_KEY).await
    }
}

/// The single process-wide "current batch" value. Writers do not coordinate:
/// the last `set` wins.
#[derive(Clone)]
pub struct BatchPointer {
    kv: Arc<dyn MetadataStore>,
}

impl BatchPointer {
    pub fn new(kv: Arc<dyn MetadataStore>) -> Self {
        BatchPointer { kv }
    }

    pub async fn get(&self) -> StorageResult<Option<String>> {
        self.kv.get(CURRENT_BATCH_KEY).await
    }

    pub async fn set(&self, batch_id: &str, ttl: Duration) -> StorageResult<()> {
        self.kv.set(CURRENT_BATCH_KEY, batch_id, Some(ttl)).await
    }

    pub async fn clear(&self) -> StorageResult<bool> {
        self.kv.delete(CURRENT_BATCH_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite_kv::SqliteMetadataStore;

    fn kv() -> Arc<dyn MetadataStore> {
        Arc::new(SqliteMetadataStore::open(":memory:").unwrap())
    }

    fn participant(id: &str, name: &str) -> Participant {
        Participant {
            id: id.to_string(),
            full_name: name.to_string(),
            email: String::new(),
            role: "participant".to_string(),
            place: None,
            uploaded_at: None,
        }
    }

    #[tokio::test]
    async fn participants_round_trip_and_clear() {
        let repo = ParticipantRepo::new(kv());
        repo.save(&participant("1", "Anna"), None).await.unwrap();
        repo.save(&participant("2", ""), None).await.unwrap();
        repo.save(&participant("3", "Boris"), None).await.unwrap();

        let names: Vec<_> = repo.all().await.unwrap().into_iter().map(|p| p.full_name).collect();
        assert_eq!(names, vec!["Anna", "Boris"]);
        assert_eq!(repo.delete_all().await.unwrap(), 3);
        assert!(repo.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn checksum_is_not_listed_as_participant() {
        let store = kv();
        let repo = ParticipantRepo::new(store.clone());
        repo.set_checksum("abc", None).await.unwrap();
        repo.save(&participant("1", "Anna"), None).await.unwrap();
        assert_eq!(repo.all().await.unwrap().len(), 1);
        assert_eq!(repo.checksum().await.unwrap().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn pointer_last_write_wins() {
        let pointer = BatchPointer::new(kv());
        pointer.set("aaaa1111", Duration::from_secs(60)).await.unwrap();
        pointer.set("bbbb2222", Duration::from_secs(60)).await.unwrap();
        assert_eq!(pointer.get().await.unwrap().as_deref(), Some("bbbb2222"));
        assert!(pointer.clear().await.unwrap());
        assert_eq!(pointer.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn pointer_expires() {
        let pointer = BatchPointer::new(kv());
        pointer.set("aaaa1111", Duration::ZERO).await.unwrap();
        assert_eq!(pointer.get().await.unwrap(), None);
    }
}
