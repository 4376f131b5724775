//! Sesión de reproducción por guild.
//!
//! Cada sesión es un actor single-writer: un task de tokio que drena su
//! propia cola FIFO de eventos (comandos de usuario, señales de fin de
//! pista del transporte, disparos de standby). Toda mutación de estado y
//! de la cola pasa por ese task, así que dos eventos del mismo guild nunca
//! corren en paralelo; sesiones de guilds distintos son independientes.
//!
//! Las señales de fin de pista llevan un número de secuencia de
//! reproducción. Skip y stop lo incrementan antes de cortar la pista, de
//! modo que la señal que el transporte emite por la pista cortada llega
//! vieja y se descarta.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::audio::queue::{LoopMode, Track, TrackQueue};
use crate::audio::standby::StandbyTimer;
use crate::cache::artifact_store::ArtifactPin;
use crate::config::Config;
use crate::error::{PlayerError, TransportError, UserInputError};
use crate::notify::NowPlayingPublisher;
use crate::sources::{Resolver, StreamHandle};
use crate::transport::{Connection, TrackEndReason, VoiceTransport};
use crate::{ChannelId, GuildId};

/// Estados del ciclo de vida de una sesión.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Playing,
    Paused,
    /// Terminal: la sesión se quita del registro y su task termina.
    Disconnected,
}

/// Dónde insertar un track encolado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Tail,
    Head,
    Index(usize),
    /// Al principio de la cola y cortando la pista actual (`PlayNow`).
    Immediate,
}

#[derive(Debug)]
pub enum SessionCommand {
    Enqueue { query: String, placement: Placement },
    Skip,
    Stop,
    PauseToggle,
    /// Posiciones 1-based de cara al usuario
    Move { from: usize, to: usize },
    Remove { position: usize },
    Shuffle,
    LoopToggle,
    SetVolume { delta: i32 },
    Status,
}

/// Respuesta tipada de cada comando; la capa de UI la renderiza.
#[derive(Debug, Clone)]
pub enum CommandOutcome {
    Queued { track: Track, position: usize },
    Started { track: Track },
    Skipped { now_playing: Option<Track> },
    Stopped,
    PauseState { paused: bool },
    Moved { track: Track, to: usize },
    Removed { track: Track },
    ShuffleState { enabled: bool },
    LoopState { mode: LoopMode },
    Volume { volume: u8 },
    Status(SessionSnapshot),
}

/// Foto inmutable del estado de una sesión para el verbo `Status`.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub guild_id: GuildId,
    pub state: SessionState,
    pub current: Option<Track>,
    pub queue: Vec<Track>,
    pub loop_mode: LoopMode,
    pub shuffle_enabled: bool,
    pub volume: u8,
    pub last_activity: DateTime<Utc>,
}

/// Evento entrante a la cola del actor.
#[derive(Debug)]
pub enum SessionEvent {
    Command {
        command: SessionCommand,
        reply: oneshot::Sender<Result<CommandOutcome, PlayerError>>,
    },
    TrackEnded {
        seq: u64,
        reason: TrackEndReason,
    },
    StandbyFired {
        generation: u64,
    },
}

/// Dependencias compartidas por todas las sesiones.
pub(crate) struct SessionContext {
    pub resolver: Arc<Resolver>,
    pub transport: Arc<dyn VoiceTransport>,
    pub publisher: Arc<dyn NowPlayingPublisher>,
    pub config: Arc<Config>,
}

/// Handle clonable para inyectar eventos en una sesión.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    guild_id: GuildId,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// El actor terminó (sesión desconectada).
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    pub async fn command(&self, command: SessionCommand) -> Result<CommandOutcome, PlayerError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(SessionEvent::Command { command, reply })
            .map_err(|_| PlayerError::Internal("la sesión ya terminó".into()))?;
        response
            .await
            .map_err(|_| PlayerError::Internal("la sesión no respondió".into()))?
    }
}

pub struct Session {
    guild_id: GuildId,
    home_channel: ChannelId,
    state: SessionState,
    queue: TrackQueue,
    current: Option<Track>,
    current_pin: Option<ArtifactPin>,
    loop_mode: LoopMode,
    shuffle_enabled: bool,
    volume: u8,
    connection: Option<Connection>,
    play_seq: u64,
    consecutive_failures: u32,
    last_activity: DateTime<Utc>,
    standby: StandbyTimer,
    events: mpsc::UnboundedSender<SessionEvent>,
    ctx: Arc<SessionContext>,
    registry: Arc<DashMap<GuildId, SessionHandle>>,
}

impl Session {
    /// Crea la sesión en `Idle` y lanza su task; devuelve el handle.
    pub(crate) fn spawn(
        guild_id: GuildId,
        home_channel: ChannelId,
        ctx: Arc<SessionContext>,
        registry: Arc<DashMap<GuildId, SessionHandle>>,
    ) -> SessionHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = SessionHandle {
            guild_id,
            events: events_tx.clone(),
        };

        let session = Session {
            guild_id,
            home_channel,
            state: SessionState::Idle,
            queue: TrackQueue::new(ctx.config.max_queue_size),
            current: None,
            current_pin: None,
            loop_mode: LoopMode::Off,
            shuffle_enabled: false,
            volume: ctx.config.default_volume,
            connection: None,
            play_seq: 0,
            consecutive_failures: 0,
            last_activity: Utc::now(),
            standby: StandbyTimer::new(ctx.config.standby_timeout(), events_tx.clone()),
            events: events_tx,
            ctx,
            registry,
        };

        tokio::spawn(session.run(events_rx));
        handle
    }

    async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        debug!("🎧 Sesión creada para guild {}", self.guild_id);
        // El actor retiene un sender propio (para standby y señales de fin),
        // así que el canal nunca se cierra solo: el loop termina únicamente
        // al pasar a Disconnected.
        while let Some(event) = events.recv().await {
            if !self.handle_event(event).await {
                break;
            }
        }

        self.registry.remove(&self.guild_id);
        self.standby.cancel();
        if let Some(connection) = self.connection.take() {
            let _ = self.ctx.transport.disconnect(connection).await;
        }
        debug!("👋 Sesión de guild {} finalizada", self.guild_id);
    }

    /// Devuelve `false` cuando la sesión debe terminar.
    async fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Command { command, reply } => {
                self.last_activity = Utc::now();
                let result = self.handle_command(command).await;
                if let Err(ref e) = result {
                    debug!("Comando con error en guild {}: {}", self.guild_id, e);
                }
                let _ = reply.send(result);
            }
            SessionEvent::TrackEnded { seq, reason } => {
                if seq != self.play_seq {
                    debug!(
                        "Señal de fin vieja en guild {} (seq {} != {}), ignorada",
                        self.guild_id, seq, self.play_seq
                    );
                    return true;
                }
                self.last_activity = Utc::now();
                let error = match reason {
                    TrackEndReason::Finished => None,
                    TrackEndReason::Errored(message) => Some(message),
                };
                self.on_track_ended(error).await;
            }
            SessionEvent::StandbyFired { generation } => {
                return self.on_standby_fired(generation).await;
            }
        }

        self.sync_standby();
        true
    }

    async fn handle_command(
        &mut self,
        command: SessionCommand,
    ) -> Result<CommandOutcome, PlayerError> {
        match command {
            SessionCommand::Enqueue { query, placement } => self.enqueue(query, placement).await,
            SessionCommand::Skip => self.force_skip().await,
            SessionCommand::Stop => self.stop().await,
            SessionCommand::PauseToggle => self.pause_toggle().await,
            SessionCommand::Move { from, to } => self.move_track(from, to),
            SessionCommand::Remove { position } => self.remove_track(position),
            SessionCommand::Shuffle => Ok(self.toggle_shuffle()),
            SessionCommand::LoopToggle => {
                self.loop_mode = self.loop_mode.toggled();
                info!("🔁 Loop en guild {}: {:?}", self.guild_id, self.loop_mode);
                Ok(CommandOutcome::LoopState { mode: self.loop_mode })
            }
            SessionCommand::SetVolume { delta } => self.set_volume(delta).await,
            SessionCommand::Status => Ok(CommandOutcome::Status(self.snapshot())),
        }
    }

    async fn enqueue(
        &mut self,
        query: String,
        placement: Placement,
    ) -> Result<CommandOutcome, PlayerError> {
        // Resolver primero: la respuesta "encolado" necesita la metadata y
        // la reproducción posterior pega en el caché dentro del TTL.
        let stream = self.ctx.resolver.resolve(&query).await?;
        let track = Track {
            title: stream.title.clone(),
            source_query: query,
            artist: stream.artist.clone(),
            duration: stream.duration,
            added_at: Utc::now(),
        };

        match placement {
            Placement::Tail => self.queue.push_back(track.clone())?,
            Placement::Head | Placement::Immediate => self.queue.push_front(track.clone())?,
            Placement::Index(index) => self.queue.insert_at(index, track.clone())?,
        }

        if placement == Placement::Immediate
            && matches!(self.state, SessionState::Playing | SessionState::Paused)
        {
            return self.force_skip().await;
        }

        if self.state == SessionState::Idle {
            return self.start_playback().await;
        }

        let position = match placement {
            Placement::Head | Placement::Immediate => 1,
            Placement::Index(index) => index + 1,
            Placement::Tail => self.queue.len(),
        };
        Ok(CommandOutcome::Queued { track, position })
    }

    /// `PlayRequested`: conecta el transporte y arranca la cabeza de la cola.
    ///
    /// Cualquier fallo deja la sesión en `Idle` y se reporta al llamador,
    /// sin reintento automático.
    async fn start_playback(&mut self) -> Result<CommandOutcome, PlayerError> {
        self.state = SessionState::Connecting;

        if self.connection.is_none() {
            debug!(
                "🔌 Guild {} conectando al canal {}",
                self.guild_id, self.home_channel
            );
            match self.ctx.transport.connect(self.home_channel).await {
                Ok(connection) => self.connection = Some(connection),
                Err(e) => {
                    warn!("❌ Conexión fallida en guild {}: {}", self.guild_id, e);
                    self.state = SessionState::Idle;
                    return Err(e.into());
                }
            }
        }

        match self.play_next_track(false).await {
            Ok(Some(track)) => Ok(CommandOutcome::Started { track }),
            Ok(None) => {
                self.state = SessionState::Idle;
                Err(PlayerError::Internal(
                    "se pidió reproducir con la cola vacía".into(),
                ))
            }
            Err(e) => {
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    /// Saca la cabeza de la cola, la resuelve y la reproduce.
    ///
    /// Con `auto_advance` (camino de `TrackEnded`) los fallos saltean al
    /// siguiente track, acotados por el contador de fallos consecutivos
    /// para no drenar la cola entera en silencio ante una caída sistémica
    /// del proveedor. Sin `auto_advance` (play inicial) el primer fallo se
    /// reporta y no se reintenta.
    async fn play_next_track(&mut self, auto_advance: bool) -> Result<Option<Track>, PlayerError> {
        loop {
            let Some(track) = self.queue.pop_front() else {
                return Ok(None);
            };

            let failure: PlayerError =
                match self.ctx.resolver.resolve(&track.source_query).await {
                    Ok(stream) => match self.begin_playback(&track, &stream).await {
                        Ok(()) => return Ok(Some(track)),
                        Err(e) => e.into(),
                    },
                    Err(e) => e.into(),
                };

            warn!(
                "⚠️ No se pudo reproducir '{}' en guild {}: {}",
                track.title, self.guild_id, failure
            );

            if !auto_advance {
                return Err(failure);
            }

            self.consecutive_failures += 1;
            if self.consecutive_failures >= self.ctx.config.max_consecutive_failures {
                error!(
                    "🛑 {} fallos consecutivos en guild {}, se corta el salteo automático",
                    self.consecutive_failures, self.guild_id
                );
                self.ctx
                    .publisher
                    .notice(
                        self.guild_id,
                        "Demasiados fallos seguidos; detengo la reproducción automática.",
                    )
                    .await;
                return Err(failure);
            }
            // Salteo automático: probamos con el siguiente de la cola
        }
    }

    async fn begin_playback(
        &mut self,
        track: &Track,
        stream: &StreamHandle,
    ) -> Result<(), TransportError> {
        let connection = self.connection.as_ref().ok_or(TransportError::Disconnected)?;
        let end_signal = self
            .ctx
            .transport
            .play(connection, stream, self.volume)
            .await?;

        self.play_seq += 1;
        let seq = self.play_seq;
        let events = self.events.clone();
        tokio::spawn(async move {
            // Un sender descartado (stop/skip del transporte) cuenta como
            // fin limpio; la secuencia lo cerca de todos modos.
            let reason = end_signal.await.unwrap_or(TrackEndReason::Finished);
            let _ = events.send(SessionEvent::TrackEnded { seq, reason });
        });

        // El artefacto local queda a salvo del desalojo mientras suena
        self.current_pin = stream
            .local_path
            .as_deref()
            .map(|path| self.ctx.resolver.artifacts().pin(path));
        self.current = Some(track.clone());
        self.state = SessionState::Playing;
        self.consecutive_failures = 0;

        info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, track.title);
        self.ctx
            .publisher
            .publish(self.guild_id, track, self.queue.len())
            .await;
        Ok(())
    }

    /// `TrackEnded`: avanza la máquina de estados al terminar una pista.
    async fn on_track_ended(&mut self, error: Option<String>) {
        let finished = self.current.take();
        self.current_pin = None;

        match error {
            Some(message) => {
                warn!(
                    "⚠️ Pista terminó con error en guild {}: {}",
                    self.guild_id, message
                );
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.ctx.config.max_consecutive_failures {
                    self.ctx
                        .publisher
                        .notice(
                            self.guild_id,
                            "Demasiados fallos seguidos; detengo la reproducción automática.",
                        )
                        .await;
                    self.enter_idle().await;
                    return;
                }
            }
            None => {
                if self.loop_mode == LoopMode::Queue {
                    if let Some(track) = finished {
                        debug!("🔁 Loop de cola: re-encolando {}", track.title);
                        if let Err(e) = self.queue.push_back(track) {
                            warn!("⚠️ No se pudo re-encolar por loop: {}", e);
                        }
                    }
                }
            }
        }

        match self.play_next_track(true).await {
            Ok(Some(_)) => {}
            Ok(None) => self.enter_idle().await,
            Err(_) => self.enter_idle().await,
        }
    }

    /// Cola drenada o cascada de fallos: `Playing/Paused → Idle`.
    async fn enter_idle(&mut self) {
        self.state = SessionState::Idle;
        self.current = None;
        self.current_pin = None;
        self.ctx.publisher.retract(self.guild_id).await;
        debug!("📭 Guild {} en reposo", self.guild_id);
    }

    /// `SkipRequested`: fuerza un `TrackEnded` sin error sobre la pista
    /// actual, cercando la señal real que emitirá el transporte al cortar.
    async fn force_skip(&mut self) -> Result<CommandOutcome, PlayerError> {
        if self.current.is_none() {
            return Err(UserInputError::NothingPlaying.into());
        }

        self.play_seq += 1;
        if let Some(ref connection) = self.connection {
            if let Err(e) = self.ctx.transport.stop(connection).await {
                debug!("stop best-effort falló en guild {}: {}", self.guild_id, e);
            }
        }

        info!("⏭️ Skip en guild {}", self.guild_id);
        self.on_track_ended(None).await;
        Ok(CommandOutcome::Skipped {
            now_playing: self.current.clone(),
        })
    }

    async fn stop(&mut self) -> Result<CommandOutcome, PlayerError> {
        self.queue.clear();
        self.play_seq += 1; // Cerca cualquier señal de fin pendiente
        self.current = None;
        self.current_pin = None;

        if let Some(connection) = self.connection.take() {
            let _ = self.ctx.transport.stop(&connection).await;
            if let Err(e) = self.ctx.transport.disconnect(connection).await {
                warn!(
                    "⚠️ Desconexión con error en guild {}: {}",
                    self.guild_id, e
                );
            }
        }

        self.state = SessionState::Idle;
        self.ctx.publisher.retract(self.guild_id).await;
        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
        Ok(CommandOutcome::Stopped)
    }

    async fn pause_toggle(&mut self) -> Result<CommandOutcome, PlayerError> {
        match self.state {
            SessionState::Playing => {
                if let Some(ref connection) = self.connection {
                    self.ctx.transport.pause(connection).await?;
                }
                self.state = SessionState::Paused;
                if let Some(track) = self.current.clone() {
                    self.ctx.publisher.update(self.guild_id, &track, true).await;
                }
                info!("⏸️ Pausado guild {}", self.guild_id);
                Ok(CommandOutcome::PauseState { paused: true })
            }
            SessionState::Paused => {
                if let Some(ref connection) = self.connection {
                    self.ctx.transport.resume(connection).await?;
                }
                self.state = SessionState::Playing;
                if let Some(track) = self.current.clone() {
                    self.ctx.publisher.update(self.guild_id, &track, false).await;
                }
                info!("▶️ Reanudado guild {}", self.guild_id);
                Ok(CommandOutcome::PauseState { paused: false })
            }
            _ => Err(UserInputError::NothingPlaying.into()),
        }
    }

    fn move_track(&mut self, from: usize, to: usize) -> Result<CommandOutcome, PlayerError> {
        let from_index = self.to_index(from)?;
        let to_index = self.to_index(to)?;
        self.queue.move_track(from_index, to_index)?;
        let track = self.queue.peek_at(to_index)?.clone();
        Ok(CommandOutcome::Moved { track, to })
    }

    fn remove_track(&mut self, position: usize) -> Result<CommandOutcome, PlayerError> {
        let index = self.to_index(position)?;
        let track = self.queue.remove_at(index)?;
        Ok(CommandOutcome::Removed { track })
    }

    /// Posición 1-based del usuario → índice interno, validada contra el
    /// largo actual de la cola.
    fn to_index(&self, position: usize) -> Result<usize, UserInputError> {
        if position == 0 || position > self.queue.len() {
            return Err(UserInputError::InvalidPosition {
                position,
                len: self.queue.len(),
            });
        }
        Ok(position - 1)
    }

    fn toggle_shuffle(&mut self) -> CommandOutcome {
        self.shuffle_enabled = !self.shuffle_enabled;
        if self.shuffle_enabled && !self.queue.is_empty() {
            self.queue.shuffle();
        }
        info!(
            "🔀 Shuffle en guild {}: {}",
            self.guild_id, self.shuffle_enabled
        );
        CommandOutcome::ShuffleState {
            enabled: self.shuffle_enabled,
        }
    }

    async fn set_volume(&mut self, delta: i32) -> Result<CommandOutcome, PlayerError> {
        // Clampa, nunca falla
        let volume = (self.volume as i32 + delta).clamp(0, 100) as u8;
        self.volume = volume;

        if matches!(self.state, SessionState::Playing | SessionState::Paused) {
            if let Some(ref connection) = self.connection {
                if let Err(e) = self.ctx.transport.set_volume(connection, volume).await {
                    warn!("⚠️ No se pudo ajustar el volumen: {}", e);
                }
            }
        }

        info!("🔊 Volumen en guild {} ajustado a {}%", self.guild_id, volume);
        Ok(CommandOutcome::Volume { volume })
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            guild_id: self.guild_id,
            state: self.state,
            current: self.current.clone(),
            queue: self.queue.iter().cloned().collect(),
            loop_mode: self.loop_mode,
            shuffle_enabled: self.shuffle_enabled,
            volume: self.volume,
            last_activity: self.last_activity,
        }
    }

    /// `StandbyFired`: asesor, no autoritativo. Devuelve `false` si la
    /// sesión se desconectó y su task debe terminar.
    async fn on_standby_fired(&mut self, generation: u64) -> bool {
        if !self.standby.is_current(generation) {
            debug!(
                "Standby viejo ignorado en guild {} (generación {})",
                self.guild_id, generation
            );
            return true;
        }
        // Re-validar: pudo arrancar una pista entre agendar y disparar
        if self.state == SessionState::Playing {
            debug!(
                "Standby ignorado: guild {} está reproduciendo",
                self.guild_id
            );
            return true;
        }
        let Some(connection) = self.connection.take() else {
            return true;
        };

        info!(
            "💤 Guild {} inactivo por {}s, desconectando",
            self.guild_id, self.ctx.config.standby_timeout_secs
        );
        if let Err(e) = self.ctx.transport.disconnect(connection).await {
            warn!("⚠️ Desconexión de standby con error: {}", e);
        }

        self.state = SessionState::Disconnected;
        self.current = None;
        self.current_pin = None;
        self.ctx.publisher.retract(self.guild_id).await;
        self.ctx
            .publisher
            .notice(
                self.guild_id,
                "Estuve un rato sin actividad, así que me desconecto.",
            )
            .await;
        false
    }

    /// Mantiene el invariante: standby armado sii no está reproduciendo y
    /// sigue conectada. Cada evento re-arma el timer completo.
    fn sync_standby(&mut self) {
        if self.state != SessionState::Playing && self.connection.is_some() {
            self.standby.reset();
        } else {
            self.standby.cancel();
        }
    }
}
