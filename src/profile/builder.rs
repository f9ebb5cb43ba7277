//! Profile construction from raw samples

use std::sync::Arc;

use super::{ExternalVoice, VoiceProfile, aggregate};
use crate::audio::{SampleSource, Waveform, encode_wav, ingest};
use crate::backend::{CloningBackend, EnrollmentSample, RenderBackend};
use crate::db::ProfileRepo;
use crate::features::{FeatureBundle, extract};
use crate::{BoxError, Error, Result};

/// A sample left out of a profile, with the reason
#[derive(Debug)]
pub struct SkippedSample {
    pub sample: String,
    pub reason: Error,
}

/// What happened to the optional cloning enrollment
#[derive(Debug, Default)]
pub enum EnrollmentOutcome {
    /// No cloning backend configured
    #[default]
    NotAttempted,

    /// Handle attached to the profile
    Enrolled(ExternalVoice),

    /// Backend rejected the samples; the profile was kept without a handle
    Failed(Error),
}

/// Result of a successful build
#[derive(Debug)]
pub struct BuiltProfile {
    /// The persisted profile
    pub profile: VoiceProfile,

    /// Samples that did not contribute
    pub skipped: Vec<SkippedSample>,

    /// Cloning enrollment result
    pub enrollment: EnrollmentOutcome,
}

/// Builds and persists voice profiles
#[derive(Clone)]
pub struct ProfileBuilder {
    repo: ProfileRepo,
    sample_rate: u32,
    cloner: Option<Arc<dyn CloningBackend>>,
}

impl ProfileBuilder {
    /// Create a builder normalizing samples to `sample_rate`
    #[must_use]
    pub const fn new(repo: ProfileRepo, sample_rate: u32) -> Self {
        Self {
            repo,
            sample_rate,
            cloner: None,
        }
    }

    /// Enroll every recorded profile with a cloning backend
    #[must_use]
    pub fn with_cloner(mut self, cloner: Arc<dyn CloningBackend>) -> Self {
        self.cloner = Some(cloner);
        self
    }

    /// Profile repository the builder writes to
    #[must_use]
    pub const fn repo(&self) -> &ProfileRepo {
        &self.repo
    }

    /// Build a recorded profile from samples
    ///
    /// Samples that fail ingestion or extraction are skipped and reported in
    /// the result; the build fails only when none survive.
    ///
    /// # Errors
    ///
    /// - `NoValidSamples` if no sample survives (including an empty list)
    /// - `Database`/`Sqlite` if the profile cannot be persisted
    pub async fn build(
        &self,
        name: &str,
        description: Option<&str>,
        samples: &[SampleSource],
    ) -> Result<BuiltProfile> {
        let mut accepted: Vec<(String, Waveform, FeatureBundle)> = Vec::with_capacity(samples.len());
        let mut skipped = Vec::new();

        for source in samples {
            let label = source.label();
            match self.analyze(source) {
                Ok((waveform, features)) => accepted.push((label, waveform, features)),
                Err(e) => {
                    tracing::warn!(profile = %name, sample = %label, error = %e, "skipping sample");
                    skipped.push(SkippedSample {
                        sample: label,
                        reason: e,
                    });
                }
            }
        }

        let bundles: Vec<FeatureBundle> = accepted.iter().map(|(_, _, f)| f.clone()).collect();
        let Some(embedding) = aggregate(&bundles) else {
            return Err(Error::NoValidSamples {
                skipped: skipped.len(),
            });
        };

        let mut profile = self
            .repo
            .insert_recorded(name, description, &embedding, self.sample_rate)?;

        tracing::info!(
            profile_id = %profile.id,
            samples = accepted.len(),
            skipped = skipped.len(),
            avg_pitch = embedding.avg_pitch,
            tempo = embedding.tempo,
            "profile built"
        );

        let enrollment = match &self.cloner {
            Some(cloner) => {
                let outcome = self.enroll(cloner.as_ref(), &profile, &accepted).await;
                if let EnrollmentOutcome::Enrolled(voice) = &outcome {
                    profile.external_voice = Some(voice.clone());
                }
                outcome
            }
            None => EnrollmentOutcome::NotAttempted,
        };

        Ok(BuiltProfile {
            profile,
            skipped,
            enrollment,
        })
    }

    /// Register a pass-through profile for each of a backend's system voices
    ///
    /// Existing profiles are left untouched. Returns only newly created ones.
    ///
    /// # Errors
    ///
    /// Returns error if a profile cannot be persisted
    pub fn seed_system_voices(&self, backend: &dyn RenderBackend) -> Result<Vec<VoiceProfile>> {
        let mut created = Vec::new();
        for voice in backend.system_voices() {
            if let Some(profile) = self.repo.insert_system(backend.name(), &voice, self.sample_rate)? {
                created.push(profile);
            }
        }

        tracing::info!(backend = %backend.name(), created = created.len(), "seeded system voices");
        Ok(created)
    }

    fn analyze(&self, source: &SampleSource) -> Result<(Waveform, FeatureBundle)> {
        let waveform = ingest(source, self.sample_rate)?;
        let features = extract(&waveform)?;
        Ok((waveform, features))
    }

    async fn enroll(
        &self,
        cloner: &dyn CloningBackend,
        profile: &VoiceProfile,
        accepted: &[(String, Waveform, FeatureBundle)],
    ) -> EnrollmentOutcome {
        let backend = cloner.name().to_string();
        let failed = |cause: BoxError| {
            let error = Error::EnrollmentFailed {
                backend: backend.clone(),
                cause,
            };
            tracing::warn!(profile_id = %profile.id, backend = %backend, error = %error, "enrollment failed");
            EnrollmentOutcome::Failed(error)
        };

        let mut staged = Vec::with_capacity(accepted.len());
        for (label, waveform, _) in accepted {
            match encode_wav(waveform.samples(), waveform.sample_rate()) {
                Ok(wav) => staged.push(EnrollmentSample {
                    label: label.clone(),
                    wav,
                }),
                Err(e) => return failed(e.into()),
            }
        }

        let handle = match cloner.enroll(&profile.name, &staged).await {
            Ok(handle) => handle,
            Err(e) => return failed(e),
        };

        let voice = ExternalVoice {
            backend: backend.clone(),
            handle,
        };
        match self.repo.attach_external_voice(&profile.id, &voice) {
            Ok(_) => EnrollmentOutcome::Enrolled(voice),
            Err(e) => failed(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn builder() -> ProfileBuilder {
        ProfileBuilder::new(ProfileRepo::new(init_memory().unwrap()), 22050)
    }

    #[tokio::test]
    async fn test_empty_build_fails() {
        let result = builder().build("nobody", None, &[]).await;
        assert!(matches!(result, Err(Error::NoValidSamples { skipped: 0 })));
    }

    #[tokio::test]
    async fn test_all_bad_samples_fail() {
        let samples = [
            SampleSource::mono("silent", vec![0.0; 8192], 22050),
            SampleSource::bytes("garbage", b"not audio at all".to_vec()),
        ];
        let result = builder().build("nobody", None, &samples).await;
        assert!(matches!(result, Err(Error::NoValidSamples { skipped: 2 })));
    }

    #[tokio::test]
    async fn test_build_without_cloner() {
        let tone: Vec<f32> = (0..22050)
            .map(|i| (2.0 * std::f32::consts::PI * 200.0 * i as f32 / 22050.0).sin())
            .collect();
        let builder = builder();
        let built = builder
            .build("tone", Some("test"), &[SampleSource::mono("tone", tone, 22050)])
            .await
            .unwrap();

        assert!(matches!(built.enrollment, EnrollmentOutcome::NotAttempted));
        assert!(built.skipped.is_empty());
        assert_eq!(built.profile.embedding.as_ref().map(|e| e.sample_count), Some(1));
        assert_eq!(builder.repo().get(&built.profile.id).unwrap(), Some(built.profile));
    }
}
