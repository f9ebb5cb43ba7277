//! Backend selection, dispatch and slot retention

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{ArtifactStore, NewArtifact, RequestState, SynthesisArtifact, SynthesisRequest};
use crate::audio::{DEFAULT_SAMPLE_RATE, SampleSource, decode, encode_wav, resample};
use crate::backend::{BackendRegistry, RenderBackend};
use crate::db::ProfileRepo;
use crate::error::SynthesisCause;
use crate::profile::{Provenance, VoiceProfile};
use crate::{Error, Result};

/// Default number of resolved profiles kept in memory
pub const DEFAULT_CACHE_SIZE: NonZeroUsize = NonZeroUsize::MIN.saturating_add(63);

/// Backend and voice reference a profile renders with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVoice {
    pub backend: String,
    pub voice_reference: String,
}

/// Routes synthesis requests to backends and keeps one artifact per slot
pub struct SynthesisRouter {
    profiles: ProfileRepo,
    registry: BackendRegistry,
    store: Arc<dyn ArtifactStore>,
    priority: Vec<String>,
    output_sample_rate: u32,
    resolved: Mutex<LruCache<String, ResolvedVoice>>,
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SynthesisRouter {
    /// Create a router with registration-order priority and the default output rate
    #[must_use]
    pub fn new(profiles: ProfileRepo, registry: BackendRegistry, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            profiles,
            registry,
            store,
            priority: Vec::new(),
            output_sample_rate: DEFAULT_SAMPLE_RATE,
            resolved: Mutex::new(LruCache::new(DEFAULT_CACHE_SIZE)),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Set the backend priority order
    #[must_use]
    pub fn with_priority(mut self, priority: Vec<String>) -> Self {
        self.priority = priority;
        self
    }

    /// Set the sample rate artifacts are written at
    #[must_use]
    pub fn with_output_sample_rate(mut self, rate: u32) -> Self {
        self.output_sample_rate = rate;
        self
    }

    /// Set the resolved-profile cache capacity
    #[must_use]
    pub fn with_cache_size(mut self, size: NonZeroUsize) -> Self {
        self.resolved = Mutex::new(LruCache::new(size));
        self
    }

    /// Render text with a profile's voice and store it as the newest artifact of its slot
    ///
    /// # Errors
    ///
    /// - `NotFound` if the profile does not exist
    /// - `BackendHandleMissing` if a recorded profile has no external voice
    /// - `IncompatibleBackend` if the preferred backend cannot render the profile
    /// - `SynthesisFailed` if the backend fails or returns unusable audio
    pub async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisArtifact> {
        self.run(request, None).await
    }

    /// Like `synthesize`, but give up once `timeout` elapses
    ///
    /// A request that times out writes nothing.
    ///
    /// # Errors
    ///
    /// Same as `synthesize`, plus `SynthesisFailed` with a `Cancelled` cause
    pub async fn synthesize_with_timeout(
        &self,
        request: &SynthesisRequest,
        timeout: Duration,
    ) -> Result<SynthesisArtifact> {
        self.run(request, Some(Instant::now() + timeout)).await
    }

    /// Newest artifact in a slot
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    pub fn latest(&self, slot: &str) -> Result<Option<SynthesisArtifact>> {
        Ok(self.store.list_slot(slot)?.pop())
    }

    /// All artifacts in a slot, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    pub fn artifacts(&self, slot: &str) -> Result<Vec<SynthesisArtifact>> {
        self.store.list_slot(slot)
    }

    /// Audio bytes of an artifact
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the artifact does not exist
    pub fn audio(&self, artifact_id: &str) -> Result<Vec<u8>> {
        let artifact = self
            .store
            .get(artifact_id)?
            .ok_or_else(|| Error::NotFound(format!("artifact {artifact_id}")))?;
        self.store.read_audio(&artifact)
    }

    /// Remove an artifact
    ///
    /// # Errors
    ///
    /// Returns error if the store fails
    pub async fn remove(&self, artifact_id: &str) -> Result<bool> {
        let Some(artifact) = self.store.get(artifact_id)? else {
            return Ok(false);
        };

        let lock = self.slot_lock(&artifact.slot).await;
        let removed = {
            let _guard = lock.lock().await;
            self.store.delete(artifact_id)
        };
        drop(lock);
        self.prune_slot(&artifact.slot).await;
        removed
    }

    /// Delete a profile and its cached resolution
    ///
    /// Deleting through `ProfileRepo` directly leaves the cache warm; use
    /// this, or call `forget` afterwards.
    ///
    /// # Errors
    ///
    /// Returns error if the profile cannot be deleted
    pub async fn delete_profile(&self, profile_id: &str) -> Result<bool> {
        let deleted = self.profiles.delete(profile_id)?;
        self.forget(profile_id).await;
        tracing::info!(profile_id = %profile_id, deleted, "profile deleted");
        Ok(deleted)
    }

    /// Drop a cached resolution, e.g. after a handle was attached
    pub async fn forget(&self, profile_id: &str) {
        self.resolved.lock().await.pop(profile_id);
    }

    async fn run(&self, request: &SynthesisRequest, deadline: Option<Instant>) -> Result<SynthesisArtifact> {
        log_state(request, RequestState::Requested, None);

        let result = self.dispatch(request, deadline).await;
        match &result {
            Ok(artifact) => {
                tracing::info!(
                    profile_id = %request.profile_id,
                    slot = %request.slot,
                    backend = %artifact.backend,
                    artifact_id = %artifact.id,
                    state = %RequestState::Completed,
                    "synthesis request"
                );
            }
            Err(e) => {
                tracing::warn!(
                    profile_id = %request.profile_id,
                    slot = %request.slot,
                    state = %RequestState::Failed,
                    error = %e,
                    "synthesis request"
                );
            }
        }

        result
    }

    async fn dispatch(&self, request: &SynthesisRequest, deadline: Option<Instant>) -> Result<SynthesisArtifact> {
        let voice = self
            .resolve(&request.profile_id, request.backend_preference.as_deref())
            .await?;
        let backend = self.select(&request.profile_id, &voice, request.backend_preference.as_deref())?;
        log_state(request, RequestState::BackendSelected, Some(backend.name()));

        let lock = self.slot_lock(&request.slot).await;
        let result = self
            .render_into_slot(request, &voice, backend.as_ref(), &lock, deadline)
            .await;
        drop(lock);
        self.prune_slot(&request.slot).await;
        result
    }

    /// Render and commit while holding the slot lock
    async fn render_into_slot(
        &self,
        request: &SynthesisRequest,
        voice: &ResolvedVoice,
        backend: &dyn RenderBackend,
        lock: &Mutex<()>,
        deadline: Option<Instant>,
    ) -> Result<SynthesisArtifact> {
        let name = backend.name().to_string();
        let _guard = within(deadline, lock.lock())
            .await
            .ok_or_else(|| Error::synthesis(&name, SynthesisCause::Cancelled))?;

        log_state(request, RequestState::Dispatched, Some(&name));
        let rendered = within(deadline, backend.render(&request.text, &voice.voice_reference))
            .await
            .ok_or_else(|| Error::synthesis(&name, SynthesisCause::Cancelled))?
            .map_err(|e| Error::synthesis(&name, SynthesisCause::Backend(e)))?;

        let audio = self
            .to_output_wav(rendered)
            .map_err(|e| Error::synthesis(&name, SynthesisCause::Output(e.to_string())))?;

        let artifact = self.store.write(NewArtifact {
            slot: &request.slot,
            profile_id: &request.profile_id,
            text: &request.text,
            backend: &name,
            audio: &audio,
        })?;

        self.retain_only(&artifact);
        Ok(artifact)
    }

    /// Backend and voice reference for a profile
    async fn resolve(&self, profile_id: &str, preference: Option<&str>) -> Result<ResolvedVoice> {
        if let Some(voice) = self.resolved.lock().await.get(profile_id) {
            return Ok(voice.clone());
        }

        let profile = self
            .profiles
            .get(profile_id)?
            .ok_or_else(|| Error::NotFound(format!("profile {profile_id}")))?;
        let voice = voice_of(&profile, preference)?;

        self.resolved
            .lock()
            .await
            .put(profile_id.to_string(), voice.clone());
        Ok(voice)
    }

    /// Pick the render backend for a resolved profile
    fn select(
        &self,
        profile_id: &str,
        voice: &ResolvedVoice,
        preference: Option<&str>,
    ) -> Result<Arc<dyn RenderBackend>> {
        let incompatible = |backend: &str, reason: String| Error::IncompatibleBackend {
            profile_id: profile_id.to_string(),
            backend: backend.to_string(),
            reason,
        };

        if let Some(preferred) = preference {
            if preferred != voice.backend {
                return Err(incompatible(
                    preferred,
                    format!("profile voice is provided by {}", voice.backend),
                ));
            }
            return self
                .registry
                .renderer(preferred)
                .ok_or_else(|| incompatible(preferred, "backend is not registered".to_string()));
        }

        self.registry
            .ordered(&self.priority)
            .into_iter()
            .find(|backend| backend.name() == voice.backend)
            .ok_or_else(|| incompatible(&voice.backend, "backend is not registered".to_string()))
    }

    /// Decode backend output and re-encode it as mono WAV at the output rate
    fn to_output_wav(&self, rendered: Vec<u8>) -> Result<Vec<u8>> {
        let decoded = decode(&SampleSource::bytes("backend output", rendered))?;
        if decoded.samples.is_empty() {
            return Err(Error::InvalidWaveform("backend returned no audio".to_string()));
        }

        let samples = resample(&decoded.samples, decoded.sample_rate, self.output_sample_rate)?;
        encode_wav(&samples, self.output_sample_rate)
    }

    /// Delete every artifact in the slot except `keep`
    fn retain_only(&self, keep: &SynthesisArtifact) {
        let previous = match self.store.list_slot(&keep.slot) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                tracing::warn!(slot = %keep.slot, error = %e, "failed to list slot for cleanup");
                return;
            }
        };

        for old in previous.iter().filter(|a| a.id != keep.id) {
            match self.store.delete(&old.id) {
                Ok(_) => tracing::debug!(artifact_id = %old.id, slot = %keep.slot, "superseded artifact removed"),
                Err(e) => tracing::warn!(artifact_id = %old.id, slot = %keep.slot, error = %e, "failed to remove superseded artifact"),
            }
        }
    }

    async fn slot_lock(&self, slot: &str) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(slot.to_string()).or_default())
    }

    /// Drop a slot's lock once no request holds or waits on it
    async fn prune_slot(&self, slot: &str) {
        let mut slots = self.slots.lock().await;
        if slots.get(slot).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            slots.remove(slot);
        }
    }
}

/// Backend and voice reference a profile's provenance allows
fn voice_of(profile: &VoiceProfile, preference: Option<&str>) -> Result<ResolvedVoice> {
    match &profile.provenance {
        Provenance::SystemVoice { backend, voice_id } => Ok(ResolvedVoice {
            backend: backend.clone(),
            voice_reference: voice_id.clone(),
        }),
        Provenance::Recorded => profile
            .external_voice
            .as_ref()
            .map(|external| ResolvedVoice {
                backend: external.backend.clone(),
                voice_reference: external.handle.clone(),
            })
            .ok_or_else(|| Error::BackendHandleMissing {
                profile_id: profile.id.clone(),
                backend: preference.unwrap_or("any backend").to_string(),
            }),
    }
}

/// Await `fut`, or return `None` once `deadline` passes
async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

fn log_state(request: &SynthesisRequest, state: RequestState, backend: Option<&str>) {
    tracing::debug!(
        profile_id = %request.profile_id,
        slot = %request.slot,
        backend = backend.unwrap_or(""),
        state = %state,
        "synthesis request"
    );
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::profile::ExternalVoice;

    fn profile(provenance: Provenance, external: Option<ExternalVoice>) -> VoiceProfile {
        VoiceProfile {
            id: "voice-1".to_string(),
            name: "test".to_string(),
            description: None,
            embedding: None,
            sample_rate: 22050,
            provenance,
            external_voice: external,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_system_voice_resolves_to_its_backend() {
        let p = profile(
            Provenance::SystemVoice {
                backend: "say".to_string(),
                voice_id: "alex".to_string(),
            },
            None,
        );
        let voice = voice_of(&p, None).unwrap();
        assert_eq!(voice.backend, "say");
        assert_eq!(voice.voice_reference, "alex");
    }

    #[test]
    fn test_recorded_without_handle_is_missing() {
        let p = profile(Provenance::Recorded, None);
        assert!(matches!(
            voice_of(&p, Some("elevenlabs")),
            Err(Error::BackendHandleMissing { backend, .. }) if backend == "elevenlabs"
        ));
    }

    #[test]
    fn test_recorded_resolves_to_handle() {
        let p = profile(
            Provenance::Recorded,
            Some(ExternalVoice {
                backend: "elevenlabs".to_string(),
                handle: "h-1".to_string(),
            }),
        );
        let voice = voice_of(&p, None).unwrap();
        assert_eq!(voice.voice_reference, "h-1");
    }

    fn router() -> (SynthesisRouter, tempfile::TempDir) {
        let pool = crate::db::init_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = crate::synthesis::SqliteArtifactStore::new(pool.clone(), dir.path()).unwrap();
        let router = SynthesisRouter::new(ProfileRepo::new(pool), BackendRegistry::new(), Arc::new(store));
        (router, dir)
    }

    #[tokio::test]
    async fn test_idle_slot_locks_are_pruned() {
        let (router, _dir) = router();

        let held = router.slot_lock("busy").await;
        drop(router.slot_lock("idle").await);
        router.prune_slot("busy").await;
        router.prune_slot("idle").await;

        let slots = router.slots.lock().await;
        assert!(slots.contains_key("busy"));
        assert!(!slots.contains_key("idle"));
        drop(slots);

        drop(held);
        router.prune_slot("busy").await;
        assert!(router.slots.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_unknown_artifact_leaves_no_lock() {
        let (router, _dir) = router();
        assert!(!router.remove("nope").await.unwrap());
        assert!(router.slots.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_within_deadline() {
        let past = Instant::now();
        assert!(within(Some(past), tokio::time::sleep(Duration::from_secs(5))).await.is_none());
        assert_eq!(within(None, async { 7 }).await, Some(7));
    }
}
