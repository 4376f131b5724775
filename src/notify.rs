//! Sink de notificaciones "now playing".
//!
//! Fire-and-forget: las implementaciones loguean sus propios fallos; nada
//! de lo que pase acá puede afectar la reproducción. El estado "último
//! mensaje publicado por sesión" vive en la implementación, no en la
//! sesión.

use async_trait::async_trait;

use crate::audio::queue::Track;
use crate::GuildId;

#[async_trait]
pub trait NowPlayingPublisher: Send + Sync {
    /// Publica el "now playing" y retrae el anterior de la misma sesión.
    async fn publish(&self, guild: GuildId, track: &Track, queue_len: usize);

    /// Actualiza el mensaje publicado en el lugar (p. ej. estado pausado).
    async fn update(&self, guild: GuildId, track: &Track, paused: bool);

    /// Borra el mensaje publicado, si lo hay.
    async fn retract(&self, guild: GuildId);

    /// Aviso suelto al canal de la sesión (desconexión por inactividad,
    /// cascada de fallos, etc.).
    async fn notice(&self, guild: GuildId, message: &str);
}

/// Publisher que no hace nada; útil para tests y embebidos sin UI.
pub struct NoopPublisher;

#[async_trait]
impl NowPlayingPublisher for NoopPublisher {
    async fn publish(&self, _guild: GuildId, _track: &Track, _queue_len: usize) {}

    async fn update(&self, _guild: GuildId, _track: &Track, _paused: bool) {}

    async fn retract(&self, _guild: GuildId) {}

    async fn notice(&self, _guild: GuildId, _message: &str) {}
}
