//! Interfaz de capacidad sobre el transporte de voz.
//!
//! El driver real (songbird, Lavalink) se enchufa desde afuera. La sesión
//! solo necesita primitivas connect/play/pause/stop/disconnect más una
//! notificación asíncrona de fin de pista.

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::TransportError;
use crate::sources::StreamHandle;
use crate::ChannelId;

/// Conexión de voz activa. Opaca para la sesión; `token` es el handle
/// interno del transporte.
#[derive(Debug)]
pub struct Connection {
    pub channel: ChannelId,
    pub token: u64,
}

/// Cómo terminó una pista.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEndReason {
    Finished,
    Errored(String),
}

/// Señal one-shot de fin de pista que devuelve [`VoiceTransport::play`].
pub type TrackEndReceiver = oneshot::Receiver<TrackEndReason>;

#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(&self, channel: ChannelId) -> Result<Connection, TransportError>;

    /// Inicia la reproducción y devuelve la señal de fin de pista.
    ///
    /// El transporte debe resolver la señal exactamente una vez: cuando la
    /// pista termina sola o con error. Un `stop` explícito puede descartar
    /// el sender; la sesión ya habrá cercado esa señal por secuencia.
    async fn play(
        &self,
        connection: &Connection,
        stream: &StreamHandle,
        volume: u8,
    ) -> Result<TrackEndReceiver, TransportError>;

    async fn pause(&self, connection: &Connection) -> Result<(), TransportError>;

    async fn resume(&self, connection: &Connection) -> Result<(), TransportError>;

    async fn set_volume(&self, connection: &Connection, volume: u8) -> Result<(), TransportError>;

    async fn stop(&self, connection: &Connection) -> Result<(), TransportError>;

    async fn disconnect(&self, connection: Connection) -> Result<(), TransportError>;
}
