//! Directorio proceso-global de sesiones: guild id → handle.
//!
//! La única estructura compartida entre sesiones. El mapa concurrente da
//! get-or-create atómico por shard (exactamente una sesión por guild aun
//! con primeros comandos simultáneos) y las sesiones se auto-quitan al
//! desconectarse; no hay desalojo por TTL.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::session::{Session, SessionContext, SessionHandle};
use crate::{ChannelId, GuildId};

pub struct SessionRegistry {
    sessions: Arc<DashMap<GuildId, SessionHandle>>,
    ctx: Arc<SessionContext>,
}

impl SessionRegistry {
    pub(crate) fn new(ctx: Arc<SessionContext>) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ctx,
        }
    }

    /// Devuelve la sesión del guild, creándola en `Idle` si no existe.
    ///
    /// Un handle con actor muerto (carrera con la desconexión) se
    /// reemplaza acá mismo por una sesión fresca.
    pub fn get_or_create(&self, guild_id: GuildId, home_channel: ChannelId) -> SessionHandle {
        match self.sessions.entry(guild_id) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().is_closed() {
                    debug!("Sesión muerta para guild {}, recreando", guild_id);
                    let handle = Session::spawn(
                        guild_id,
                        home_channel,
                        Arc::clone(&self.ctx),
                        Arc::clone(&self.sessions),
                    );
                    occupied.insert(handle.clone());
                    handle
                } else {
                    occupied.get().clone()
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                info!("🎧 Creando sesión para guild {}", guild_id);
                let handle = Session::spawn(
                    guild_id,
                    home_channel,
                    Arc::clone(&self.ctx),
                    Arc::clone(&self.sessions),
                );
                vacant.insert(handle.clone());
                handle
            }
        }
    }

    /// Sesión existente y viva, o nada. No crea.
    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        let handle = self.sessions.get(&guild_id)?.clone();
        if handle.is_closed() {
            None
        } else {
            Some(handle)
        }
    }

    pub fn remove(&self, guild_id: GuildId) {
        self.sessions.remove(&guild_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
