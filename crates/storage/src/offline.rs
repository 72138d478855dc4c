//! Offline visit queue and cached session data

use chrono::Utc;
use log::{debug, error, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::kv::{FileStore, KeyValueStore, MemoryStore};
use crate::models::{CachedUser, QueuedVisit, VisitRecord};

/// Key holding the ordered offline queue
pub const OFFLINE_VISITS_KEY: &str = "offline-visits";
/// Key holding the cached user profile
pub const USER_KEY: &str = "user";
/// Key holding the bearer token
pub const TOKEN_KEY: &str = "token";

const LOCAL_ID_PREFIX: &str = "offline-";

/// Time based local ids, strictly increasing within the process
#[derive(Debug, Default)]
struct LocalIdGenerator {
    last: AtomicI64,
}

impl LocalIdGenerator {
    fn next(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return format!("{}{}", LOCAL_ID_PREFIX, candidate),
                Err(current) => last = current,
            }
        }
    }
}

/// Local durable store shared by the capture flow and the sync engine
///
/// Every queue mutation is a read-modify-write of the full sequence under
/// `queue_lock`, so an append racing a removal cannot drop either change.
pub struct OfflineStore {
    backend: Arc<dyn KeyValueStore>,
    queue_lock: Mutex<()>,
    ids: LocalIdGenerator,
}

impl OfflineStore {
    /// Create a store on top of any backend
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            queue_lock: Mutex::new(()),
            ids: LocalIdGenerator::default(),
        }
    }

    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Store persisted under `dir`
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let backend = FileStore::open(dir).await?;
        Ok(Self::new(Arc::new(backend)))
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.backend.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.backend.set(key, serde_json::to_value(value)?).await
    }

    async fn read_queue(&self) -> Result<Vec<QueuedVisit>> {
        Ok(self.read(OFFLINE_VISITS_KEY).await?.unwrap_or_default())
    }

    /// Queue read for a mutation: unreadable documents start a fresh queue,
    /// IO failures abort so nothing already stored gets overwritten.
    async fn read_queue_for_update(&self) -> Result<Vec<QueuedVisit>> {
        match self.read_queue().await {
            Ok(visits) => Ok(visits),
            Err(e) if e.is_corrupt_data() => {
                error!("Discarding unreadable offline queue: {}", e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Persist a visit for later synchronization
    pub async fn append_visit(&self, record: VisitRecord) -> Result<QueuedVisit> {
        let _guard = self.queue_lock.lock().await;
        let mut visits = self.read_queue_for_update().await?;

        let local_id = {
            let taken: HashSet<&str> = visits.iter().map(|v| v.local_id.as_str()).collect();
            let mut local_id = self.ids.next();
            while taken.contains(local_id.as_str()) {
                local_id = self.ids.next();
            }
            local_id
        };

        let queued = QueuedVisit::new(record, local_id);
        visits.push(queued.clone());
        self.write(OFFLINE_VISITS_KEY, &visits).await?;

        info!(
            "Queued visit {} offline ({} pending)",
            queued.local_id,
            visits.len()
        );
        Ok(queued)
    }

    /// Visits not yet accepted by the server, in insertion order
    pub async fn list_queued_visits(&self) -> Vec<QueuedVisit> {
        match self.read_queue().await {
            Ok(visits) => visits.into_iter().filter(|v| !v.synced).collect(),
            Err(e) => {
                error!("Error reading offline visits: {}", e);
                Vec::new()
            }
        }
    }

    /// Number of visits waiting for synchronization
    pub async fn pending_count(&self) -> usize {
        self.list_queued_visits().await.len()
    }

    /// Remove exactly the given visits, keeping anything queued since
    ///
    /// Returns how many entries were removed.
    pub async fn remove_visits(&self, local_ids: &[String]) -> Result<usize> {
        if local_ids.is_empty() {
            return Ok(0);
        }

        let _guard = self.queue_lock.lock().await;
        let mut visits = self.read_queue_for_update().await?;
        let targets: HashSet<&str> = local_ids.iter().map(String::as_str).collect();

        let before = visits.len();
        visits.retain(|v| !targets.contains(v.local_id.as_str()));
        let removed = before - visits.len();

        if removed > 0 {
            self.write(OFFLINE_VISITS_KEY, &visits).await?;
        }
        debug!("Removed {} synced visits, {} remain", removed, visits.len());
        Ok(removed)
    }

    /// Empty the queue unconditionally
    pub async fn clear_queue(&self) {
        let _guard = self.queue_lock.lock().await;
        let empty: Vec<QueuedVisit> = Vec::new();
        if let Err(e) = self.write(OFFLINE_VISITS_KEY, &empty).await {
            error!("Error clearing offline visits: {}", e);
        }
    }

    /// Overwrite the cached profile
    pub async fn save_user(&self, user: &CachedUser) {
        if let Err(e) = self.write(USER_KEY, user).await {
            error!("Error saving user: {}", e);
        }
    }

    /// Last cached profile, if any
    pub async fn load_user(&self) -> Option<CachedUser> {
        match self.read(USER_KEY).await {
            Ok(user) => user,
            Err(e) => {
                error!("Error getting user: {}", e);
                None
            }
        }
    }

    /// Persist the bearer token
    pub async fn save_token(&self, token: &str) {
        if let Err(e) = self.write(TOKEN_KEY, token).await {
            error!("Error saving token: {}", e);
        }
    }

    /// Persisted bearer token, if any
    pub async fn load_token(&self) -> Option<String> {
        match self.read(TOKEN_KEY).await {
            Ok(token) => token,
            Err(e) => {
                error!("Error getting token: {}", e);
                None
            }
        }
    }

    /// Forget the bearer token
    pub async fn clear_token(&self) {
        if let Err(e) = self.backend.remove(TOKEN_KEY).await {
            error!("Error removing token: {}", e);
        }
    }

    /// Logout: drop the queue, the profile and the token together
    pub async fn clear_all(&self) {
        let _guard = self.queue_lock.lock().await;
        match self.backend.clear().await {
            Ok(()) => debug!("Cleared offline store"),
            Err(e) => error!("Error clearing storage: {}", e),
        }
    }
}

impl std::fmt::Debug for OfflineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineStore").finish_non_exhaustive()
    }
}

impl Default for OfflineStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, VisitType};
    use serde_json::json;

    fn visit(checkpoint_id: i64) -> VisitRecord {
        VisitRecord::new(1, checkpoint_id, 7, -33.4489, -70.6693)
    }

    fn user() -> CachedUser {
        CachedUser {
            id: 7,
            email: "guard@example.com".to_string(),
            name: "Pedro".to_string(),
            role: Role::Guard,
            service_id: Some(1),
            service_name: Some("Mall Norte".to_string()),
        }
    }

    #[tokio::test]
    async fn test_append_keeps_insertion_order_and_unique_ids() {
        let store = OfflineStore::in_memory();

        let mut appended = Vec::new();
        for checkpoint_id in 0..25 {
            appended.push(store.append_visit(visit(checkpoint_id)).await.unwrap());
        }

        let listed = store.list_queued_visits().await;
        assert_eq!(listed, appended);
        assert!(listed.iter().all(|v| !v.synced));

        let ids: HashSet<_> = listed.iter().map(|v| v.local_id.clone()).collect();
        assert_eq!(ids.len(), 25);
        let checkpoints: Vec<i64> = listed.iter().map(|v| v.visit.checkpoint_id).collect();
        assert_eq!(checkpoints, (0..25).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let store = Arc::new(OfflineStore::in_memory());

        let mut handles = Vec::new();
        for checkpoint_id in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append_visit(visit(checkpoint_id)).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.pending_count().await, 20);
    }

    #[tokio::test]
    async fn test_list_is_empty_when_nothing_stored() {
        let store = OfflineStore::in_memory();
        assert!(store.list_queued_visits().await.is_empty());
        assert_eq!(store.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_corrupt_queue_reads_empty_and_is_replaced_on_append() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .set(OFFLINE_VISITS_KEY, json!({"not": "a list"}))
            .await
            .unwrap();
        let store = OfflineStore::new(backend);

        assert!(store.list_queued_visits().await.is_empty());

        let queued = store.append_visit(visit(1)).await.unwrap();
        assert_eq!(store.list_queued_visits().await, vec![queued]);
    }

    #[tokio::test]
    async fn test_remove_visits_only_touches_given_ids() {
        let store = OfflineStore::in_memory();
        let a = store.append_visit(visit(1)).await.unwrap();
        let b = store.append_visit(visit(2)).await.unwrap();
        let c = store.append_visit(visit(3)).await.unwrap();

        let removed = store
            .remove_visits(&[a.local_id.clone(), c.local_id.clone(), "offline-0".to_string()])
            .await
            .unwrap();

        assert_eq!(removed, 2);
        assert_eq!(store.list_queued_visits().await, vec![b]);
    }

    #[tokio::test]
    async fn test_synced_entries_are_hidden() {
        let backend = Arc::new(MemoryStore::new());
        let store = OfflineStore::new(backend.clone());
        let a = store.append_visit(visit(1)).await.unwrap();
        let mut b = store.append_visit(visit(2)).await.unwrap();
        b.synced = true;
        backend
            .set(OFFLINE_VISITS_KEY, serde_json::to_value(vec![a.clone(), b]).unwrap())
            .await
            .unwrap();

        assert_eq!(store.list_queued_visits().await, vec![a]);
    }

    #[tokio::test]
    async fn test_clear_queue() {
        let store = OfflineStore::in_memory();
        store.append_visit(visit(1)).await.unwrap();
        store
            .append_visit(visit(2).with_visit_type(VisitType::Observation))
            .await
            .unwrap();

        store.clear_queue().await;
        assert!(store.list_queued_visits().await.is_empty());
    }

    #[tokio::test]
    async fn test_user_round_trip_and_clear_all() {
        let store = OfflineStore::in_memory();
        assert_eq!(store.load_user().await, None);

        store.save_user(&user()).await;
        store.save_token("jwt-token").await;
        store.append_visit(visit(1)).await.unwrap();
        assert_eq!(store.load_user().await, Some(user()));
        assert_eq!(store.load_token().await.as_deref(), Some("jwt-token"));

        store.clear_all().await;
        assert_eq!(store.load_user().await, None);
        assert_eq!(store.load_token().await, None);
        assert!(store.list_queued_visits().await.is_empty());
    }

    #[tokio::test]
    async fn test_file_backed_queue_survives_restart() {
        let dir = tempfile::tempdir().unwrap();

        let first = OfflineStore::open(dir.path()).await.unwrap();
        let a = first.append_visit(visit(1)).await.unwrap();
        first.save_user(&user()).await;
        drop(first);

        let second = OfflineStore::open(dir.path()).await.unwrap();
        assert_eq!(second.list_queued_visits().await, vec![a.clone()]);
        assert_eq!(second.load_user().await, Some(user()));

        // a fresh generator must not reuse an id already on disk
        let b = second.append_visit(visit(2)).await.unwrap();
        assert_ne!(a.local_id, b.local_id);
    }

    #[test]
    fn test_local_ids_strictly_increase() {
        let ids = LocalIdGenerator::default();
        let values: Vec<i64> = (0..100)
            .map(|_| {
                ids.next()
                    .trim_start_matches(LOCAL_ID_PREFIX)
                    .parse()
                    .unwrap()
            })
            .collect();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }
}
