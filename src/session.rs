//! Service session wiring configuration, storage and backends together

use std::sync::Arc;

use crate::backend::BackendRegistry;
use crate::db::{self, DbPool, ProfileRepo};
use crate::profile::{ProfileBuilder, VoiceProfile};
use crate::synthesis::{SqliteArtifactStore, SynthesisRequest, SynthesisRouter};
use crate::{Config, Error, Result};

/// Profile builder and synthesis router sharing one database
pub struct VoiceSession {
    config: Config,
    pool: DbPool,
    registry: BackendRegistry,
    builder: ProfileBuilder,
    router: SynthesisRouter,
}

impl VoiceSession {
    /// Open a session backed by the configured data directory
    ///
    /// # Errors
    ///
    /// Returns error if the data directory or database cannot be opened, or
    /// the configured enrollment backend is not registered
    pub fn open(config: Config, registry: BackendRegistry) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let pool = db::init(config.database_path())?;
        Self::with_pool(config, registry, pool)
    }

    /// Open a session on an existing pool
    ///
    /// # Errors
    ///
    /// Returns error if the artifact directory cannot be created or the
    /// configured enrollment backend is not registered
    pub fn with_pool(config: Config, registry: BackendRegistry, pool: DbPool) -> Result<Self> {
        config.validate()?;

        let repo = ProfileRepo::new(pool.clone());
        let mut builder = ProfileBuilder::new(repo.clone(), config.sample_rate);
        if let Some(name) = &config.enrollment_backend {
            let cloner = registry
                .cloner(name)
                .ok_or_else(|| Error::Config(format!("enrollment backend {name} is not registered")))?;
            builder = builder.with_cloner(cloner);
        }

        let store = SqliteArtifactStore::new(pool.clone(), config.artifact_dir())?;
        let router = SynthesisRouter::new(repo, registry.clone(), Arc::new(store))
            .with_priority(config.backend_priority.clone())
            .with_output_sample_rate(config.output_sample_rate)
            .with_cache_size(config.profile_cache_size);

        tracing::info!(
            data_dir = %config.data_dir.display(),
            sample_rate = config.sample_rate,
            enrollment = config.enrollment_backend.as_deref().unwrap_or("none"),
            "voice session opened"
        );

        Ok(Self {
            config,
            pool,
            registry,
            builder,
            router,
        })
    }

    /// Seed pass-through profiles for every registered render backend
    ///
    /// # Errors
    ///
    /// Returns error if a profile cannot be persisted
    pub fn seed_system_voices(&self) -> Result<Vec<VoiceProfile>> {
        let mut created = Vec::new();
        for backend in self.registry.renderers() {
            created.extend(self.builder.seed_system_voices(backend.as_ref())?);
        }
        Ok(created)
    }

    /// Request for the configured default slot
    #[must_use]
    pub fn request(&self, profile_id: &str, text: &str) -> SynthesisRequest {
        SynthesisRequest::new(profile_id, text).in_slot(self.config.default_slot.clone())
    }

    /// Delete a profile and drop the router's cached resolution of it
    ///
    /// # Errors
    ///
    /// Returns error if the profile cannot be deleted
    pub async fn delete_profile(&self, profile_id: &str) -> Result<bool> {
        self.router.delete_profile(profile_id).await
    }

    /// Effective configuration
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Shared database pool
    #[must_use]
    pub const fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Profile builder
    #[must_use]
    pub const fn builder(&self) -> &ProfileBuilder {
        &self.builder
    }

    /// Synthesis router
    #[must_use]
    pub const fn router(&self) -> &SynthesisRouter {
        &self.router
    }

    /// Profile repository
    #[must_use]
    pub const fn profiles(&self) -> &ProfileRepo {
        self.builder.repo()
    }
}
