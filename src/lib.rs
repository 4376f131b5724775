//! Núcleo de orquestación de reproducción de audio por guild.
//!
//! Este crate no habla con Discord ni decodifica audio: expone un
//! [`Orchestrator`] de comandos de reproducción y deja el transporte de
//! voz, el proveedor de media y las notificaciones detrás de traits que
//! el binario anfitrión implementa ([`VoiceTransport`], [`MediaProvider`],
//! [`NowPlayingPublisher`]).
//!
//! Cada guild tiene su propia sesión actor con cola, estado y timer de
//! standby independientes; el registro global solo mapea guild → sesión.

pub mod audio;
pub mod cache;
pub mod config;
pub mod error;
pub mod notify;
pub mod player;
pub mod sources;
pub mod transport;

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing_subscriber::EnvFilter;

/// Identificador de guild (servidor de Discord).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuildId(pub u64);

/// Identificador de canal de voz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub use audio::queue::{LoopMode, Track, TrackQueue};
pub use audio::session::{
    CommandOutcome, Placement, SessionCommand, SessionHandle, SessionSnapshot, SessionState,
};
pub use config::Config;
pub use error::{PlayerError, ResolveError, TransportError, UserInputError};
pub use notify::{NoopPublisher, NowPlayingPublisher};
pub use player::Orchestrator;
pub use sources::{FetchedStream, MediaProvider, Resolver, StreamHandle, TrackCandidate};
pub use transport::{Connection, TrackEndReason, TrackEndReceiver, VoiceTransport};

/// Inicializa el logging estructurado del proceso anfitrión.
///
/// Respeta `RUST_LOG`; sin esa variable queda en `info` global con el
/// crate en `debug`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,open_player=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
