//! Shared test utilities

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use beacon_voiceprint::audio::encode_wav;
use beacon_voiceprint::synthesis::NewArtifact;
use beacon_voiceprint::{
    ArtifactStore, BoxError, CloningBackend, DbPool, EnrollmentSample, Error, ProfileRepo,
    RenderBackend, Result, SqliteArtifactStore, SynthesisArtifact, SystemVoice, SystemVoiceCatalog,
    db,
};

pub const SAMPLE_RATE: u32 = 22050;

/// Sixteen MPEG-2 layer III frames, 22050 Hz mono, behind an ID3v2 tag
pub const MP3_FIXTURE: &[u8] = include_bytes!("../data/tone.mp3");
pub const MP3_FIXTURE_RATE: u32 = 22050;
pub const MP3_FIXTURE_FRAMES: usize = 16;

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Generate sine wave audio samples
pub fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32, rate: u32) -> Vec<f32> {
    let num_samples = (rate as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / rate as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
pub fn generate_silence(duration_secs: f32, rate: u32) -> Vec<f32> {
    vec![0.0; (rate as f32 * duration_secs) as usize]
}

/// A voiced-sounding test signal: harmonic tone with a slow amplitude pulse
pub fn generate_voice_like(pitch: f32, duration_secs: f32, rate: u32) -> Vec<f32> {
    let num_samples = (rate as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / rate as f32;
            let envelope = 0.6 + 0.4 * (2.0 * std::f32::consts::PI * 2.0 * t).sin();
            let tone: f32 = (1..=4)
                .map(|h| (2.0 * std::f32::consts::PI * pitch * h as f32 * t).sin() / h as f32)
                .sum();
            0.4 * envelope * tone
        })
        .collect()
}

/// Render backend producing a WAV tone, optionally failing, delaying or returning MP3 or garbage
pub struct MockRenderer {
    name: String,
    voices: Vec<SystemVoice>,
    rate: u32,
    delay: Option<Duration>,
    fail: bool,
    garbage: bool,
    mp3: bool,
    pub calls: AtomicUsize,
}

impl MockRenderer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            voices: Vec::new(),
            rate: 24000,
            delay: None,
            fail: false,
            garbage: false,
            mp3: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_voices(mut self, ids: &[&str]) -> Self {
        self.voices = ids.iter().map(|id| SystemVoice::new(*id, id.to_uppercase())).collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn garbage(mut self) -> Self {
        self.garbage = true;
        self
    }

    pub fn mp3(mut self) -> Self {
        self.mp3 = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SystemVoiceCatalog for MockRenderer {
    fn system_voices(&self) -> Vec<SystemVoice> {
        self.voices.clone()
    }
}

#[async_trait]
impl RenderBackend for MockRenderer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn render(&self, text: &str, _voice_reference: &str) -> std::result::Result<Vec<u8>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err("backend unavailable".into());
        }
        if self.garbage {
            return Ok(b"<html>rate limited</html>".to_vec());
        }
        if self.mp3 {
            return Ok(MP3_FIXTURE.to_vec());
        }

        // Text length picks the pitch so different requests render differently
        let pitch = 200.0 + text.len() as f32;
        let samples = generate_sine_samples(pitch, 0.25, 0.5, self.rate);
        Ok(encode_wav(&samples, self.rate)?)
    }
}

/// Cloning backend returning a fixed handle or an error
pub struct MockCloner {
    name: String,
    fail: bool,
    pub received: AtomicUsize,
}

impl MockCloner {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            received: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }
}

#[async_trait]
impl CloningBackend for MockCloner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enroll(&self, name: &str, samples: &[EnrollmentSample]) -> std::result::Result<String, BoxError> {
        self.received.store(samples.len(), Ordering::SeqCst);
        if self.fail {
            return Err("quota exceeded".into());
        }
        assert!(samples.iter().all(|s| s.wav.starts_with(b"RIFF")));
        Ok(format!("{}-handle-{name}", self.name))
    }
}

/// Artifact store wrapper that can fail writes or deletes and records operation order
pub struct FlakyStore {
    inner: SqliteArtifactStore,
    pub fail_write: AtomicBool,
    pub fail_delete: AtomicBool,
    pub log: std::sync::Mutex<Vec<String>>,
}

impl FlakyStore {
    pub fn new(pool: DbPool, root: &Path) -> Self {
        Self {
            inner: SqliteArtifactStore::new(pool, root).expect("failed to create store"),
            fail_write: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            log: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn operations(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, op: String) {
        self.log.lock().unwrap().push(op);
    }
}

impl ArtifactStore for FlakyStore {
    fn write(&self, artifact: NewArtifact<'_>) -> Result<SynthesisArtifact> {
        if self.fail_write.load(Ordering::SeqCst) {
            self.record("write-failed".to_string());
            return Err(Error::Io(std::io::Error::other("disk full")));
        }
        let written = self.inner.write(artifact)?;
        self.record(format!("write:{}", written.id));
        Ok(written)
    }

    fn get(&self, id: &str) -> Result<Option<SynthesisArtifact>> {
        self.inner.get(id)
    }

    fn list_slot(&self, slot: &str) -> Result<Vec<SynthesisArtifact>> {
        self.inner.list_slot(slot)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        if self.fail_delete.load(Ordering::SeqCst) {
            self.record(format!("delete-failed:{id}"));
            return Err(Error::Io(std::io::Error::other("interrupted")));
        }
        self.record(format!("delete:{id}"));
        self.inner.delete(id)
    }

    fn read_audio(&self, artifact: &SynthesisArtifact) -> Result<Vec<u8>> {
        self.inner.read_audio(artifact)
    }
}

/// Profile repository on a fresh in-memory database
pub fn profile_repo(pool: &DbPool) -> ProfileRepo {
    ProfileRepo::new(pool.clone())
}

/// Shorthand for an `Arc`'d mock renderer
pub fn renderer(backend: MockRenderer) -> Arc<MockRenderer> {
    Arc::new(backend)
}
