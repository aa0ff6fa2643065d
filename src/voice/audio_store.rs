//! Audio exposure: keep synthesized clips reachable by the telephony provider.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::common::ClientFuture;
use crate::common::errors::{AssistantError, AssistantResult};

/// Opaque reference to a stored clip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioRef {
    /// Clip identifier.
    pub id: String,
    /// Fetchable URL.
    pub url: String,
}

/// Capability: store audio bytes and expose them at a fetchable location.
pub trait AudioStore: Send + Sync {
    /// Store a clip and return its reference.
    ///
    /// # Errors
    /// Returns an error if the clip cannot be stored.
    fn put(&self, audio: Vec<u8>) -> ClientFuture<'_, AssistantResult<AudioRef>>;

    /// Fetch a previously stored clip.
    fn get(&self, id: &str) -> ClientFuture<'_, Option<Arc<Vec<u8>>>>;
}

/// Bounded in-memory clip store; the oldest clips are evicted first.
pub struct InMemoryAudioStore {
    public_base_url: String,
    clips: Mutex<LruCache<String, Arc<Vec<u8>>>>,
}

impl InMemoryAudioStore {
    /// Create a store serving clips under `{public_base_url}/audio/{id}`.
    ///
    /// # Errors
    /// Returns an error if `capacity` is zero.
    pub fn new(public_base_url: &str, capacity: usize) -> AssistantResult<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            AssistantError::InvalidConfig("audio cache capacity must be > 0".to_string())
        })?;

        Ok(Self {
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            clips: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Number of clips held.
    pub async fn clip_count(&self) -> usize {
        self.clips.lock().await.len()
    }
}

impl AudioStore for InMemoryAudioStore {
    fn put(&self, audio: Vec<u8>) -> ClientFuture<'_, AssistantResult<AudioRef>> {
        Box::pin(async move {
            if audio.is_empty() {
                return Err(AssistantError::AudioStore("refusing empty clip".to_string()));
            }

            let id = Uuid::new_v4().to_string();
            self.clips.lock().await.put(id.clone(), Arc::new(audio));
            let url = format!("{}/audio/{id}", self.public_base_url);
            Ok(AudioRef { id, url })
        })
    }

    fn get(&self, id: &str) -> ClientFuture<'_, Option<Arc<Vec<u8>>>> {
        let id = id.to_string();
        Box::pin(async move { self.clips.lock().await.get(&id).cloned() })
    }
}
