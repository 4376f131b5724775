//! Fachada de comandos del orquestador.
//!
//! Traduce los verbos de la capa de UI a eventos de sesión. Acá no se
//! muta estado de reproducción: cada verbo localiza (o crea) la sesión
//! del guild y le envía el comando; el actor de la sesión hace el resto.
//! Los verbos que no son intención de reproducir nunca crean sesiones.

use std::sync::Arc;
use tracing::info;

use crate::audio::registry::SessionRegistry;
use crate::audio::session::{
    CommandOutcome, Placement, SessionCommand, SessionContext, SessionHandle, SessionSnapshot,
};
use crate::cache::artifact_store::ArtifactStore;
use crate::config::Config;
use crate::error::{PlayerError, UserInputError};
use crate::notify::NowPlayingPublisher;
use crate::sources::{MediaProvider, Resolver, TrackCandidate};
use crate::transport::VoiceTransport;
use crate::{ChannelId, GuildId};

pub struct Orchestrator {
    registry: SessionRegistry,
    resolver: Arc<Resolver>,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        provider: Arc<dyn MediaProvider>,
        transport: Arc<dyn VoiceTransport>,
        publisher: Arc<dyn NowPlayingPublisher>,
    ) -> Self {
        let config = Arc::new(config);
        let artifacts = Arc::new(ArtifactStore::new(
            config.cache_dir.clone(),
            config.max_cached_artifacts,
        ));
        let resolver = Arc::new(Resolver::new(provider, config.cache_ttl(), artifacts));

        info!("🎛️ Orquestador inicializado\n{}", config.summary());

        let ctx = Arc::new(SessionContext {
            resolver: Arc::clone(&resolver),
            transport,
            publisher,
            config,
        });

        Self {
            registry: SessionRegistry::new(ctx),
            resolver,
        }
    }

    /// Encola al final; si la sesión está inactiva, arranca la reproducción.
    pub async fn play(
        &self,
        guild_id: GuildId,
        channel: ChannelId,
        query: &str,
    ) -> Result<CommandOutcome, PlayerError> {
        self.enqueue(guild_id, channel, query, Placement::Tail).await
    }

    /// Encola al principio: será la próxima pista.
    pub async fn play_next(
        &self,
        guild_id: GuildId,
        channel: ChannelId,
        query: &str,
    ) -> Result<CommandOutcome, PlayerError> {
        self.enqueue(guild_id, channel, query, Placement::Head).await
    }

    /// Corta la pista actual y reproduce esto ya mismo.
    pub async fn play_now(
        &self,
        guild_id: GuildId,
        channel: ChannelId,
        query: &str,
    ) -> Result<CommandOutcome, PlayerError> {
        self.enqueue(guild_id, channel, query, Placement::Immediate)
            .await
    }

    pub async fn skip(&self, guild_id: GuildId) -> Result<CommandOutcome, PlayerError> {
        self.existing(guild_id)?.command(SessionCommand::Skip).await
    }

    pub async fn stop(&self, guild_id: GuildId) -> Result<CommandOutcome, PlayerError> {
        self.existing(guild_id)?.command(SessionCommand::Stop).await
    }

    pub async fn pause_toggle(&self, guild_id: GuildId) -> Result<CommandOutcome, PlayerError> {
        self.existing(guild_id)?
            .command(SessionCommand::PauseToggle)
            .await
    }

    /// Posiciones 1-based tal como las ve el usuario.
    pub async fn move_track(
        &self,
        guild_id: GuildId,
        from: usize,
        to: usize,
    ) -> Result<CommandOutcome, PlayerError> {
        self.existing(guild_id)?
            .command(SessionCommand::Move { from, to })
            .await
    }

    pub async fn remove(
        &self,
        guild_id: GuildId,
        position: usize,
    ) -> Result<CommandOutcome, PlayerError> {
        self.existing(guild_id)?
            .command(SessionCommand::Remove { position })
            .await
    }

    pub async fn shuffle(&self, guild_id: GuildId) -> Result<CommandOutcome, PlayerError> {
        self.existing(guild_id)?
            .command(SessionCommand::Shuffle)
            .await
    }

    pub async fn loop_toggle(&self, guild_id: GuildId) -> Result<CommandOutcome, PlayerError> {
        self.existing(guild_id)?
            .command(SessionCommand::LoopToggle)
            .await
    }

    /// Ajuste relativo de volumen; el resultado se clampa a [0, 100].
    pub async fn set_volume(
        &self,
        guild_id: GuildId,
        delta: i32,
    ) -> Result<CommandOutcome, PlayerError> {
        self.existing(guild_id)?
            .command(SessionCommand::SetVolume { delta })
            .await
    }

    pub async fn status(&self, guild_id: GuildId) -> Result<SessionSnapshot, PlayerError> {
        match self
            .existing(guild_id)?
            .command(SessionCommand::Status)
            .await?
        {
            CommandOutcome::Status(snapshot) => Ok(snapshot),
            other => Err(PlayerError::Internal(format!(
                "respuesta inesperada a Status: {other:?}"
            ))),
        }
    }

    /// Búsqueda pura contra el proveedor, sin tocar ninguna sesión.
    pub async fn search(&self, query: &str) -> Result<Vec<TrackCandidate>, PlayerError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(UserInputError::EmptyQuery.into());
        }
        Ok(self.resolver.search(query).await?)
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }

    async fn enqueue(
        &self,
        guild_id: GuildId,
        channel: ChannelId,
        query: &str,
        placement: Placement,
    ) -> Result<CommandOutcome, PlayerError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(UserInputError::EmptyQuery.into());
        }

        let handle = self.registry.get_or_create(guild_id, channel);
        handle
            .command(SessionCommand::Enqueue {
                query: query.to_string(),
                placement,
            })
            .await
    }

    fn existing(&self, guild_id: GuildId) -> Result<SessionHandle, PlayerError> {
        self.registry
            .get(guild_id)
            .ok_or_else(|| UserInputError::NoActiveSession.into())
    }
}
