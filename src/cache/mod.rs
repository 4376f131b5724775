//! # Cache Module
//!
//! Memoización TTL de resoluciones query → stream, con deduplicación
//! single-flight de búsquedas concurrentes idénticas.
//!
//! ## Cache Types
//!
//! - **Stream URLs**: resultado completo de resolver una búsqueda
//!   ([`StreamHandle`](crate::sources::StreamHandle)), válido mientras
//!   `age < TTL` (1 hora por defecto).
//! - **Disk Artifacts**: archivos de audio descargados, acotados en número
//!   y con desalojo oldest-first (ver [`artifact_store`]).
//!
//! ## Single-flight
//!
//! Si N llamadores piden la misma búsqueda a la vez, se emite exactamente
//! una consulta externa; todos reciben el mismo resultado o el mismo fallo.
//! El mecanismo usa futures compartidos ([`futures::future::Shared`])
//! indexados por query, así sesiones de guilds distintos nunca se
//! serializan entre sí por búsquedas no relacionadas.
//!
//! Los fallos nunca se cachean: el próximo llamador reintenta contra el
//! proveedor.

pub mod artifact_store;

use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::ResolveError;
use crate::sources::StreamHandle;

type FlightFuture = Shared<BoxFuture<'static, Result<StreamHandle, ResolveError>>>;

/// Entrada del caché; propiedad exclusiva de [`ResolverCache`].
#[derive(Debug, Clone)]
struct CacheEntry {
    handle: StreamHandle,
    resolved_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.resolved_at.elapsed() < ttl
    }
}

/// Caché de resoluciones con TTL y single-flight.
pub struct ResolverCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    in_flight: Arc<DashMap<String, FlightFuture>>,
    ttl: Duration,
}

impl ResolverCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Busca una entrada fresca; las expiradas se eliminan al tocarlas.
    pub fn get(&self, query: &str) -> Option<StreamHandle> {
        let entry = self.entries.get(query)?;
        if entry.is_fresh(self.ttl) {
            debug!("✅ Cache hit para '{}'", query);
            Some(entry.handle.clone())
        } else {
            drop(entry);
            self.entries.remove(query);
            debug!("⌛ Entrada expirada para '{}'", query);
            None
        }
    }

    /// Devuelve la entrada cacheada o ejecuta `lookup` con single-flight.
    ///
    /// `lookup` se invoca solo si este llamador gana la carrera por la
    /// entrada; el resto espera el mismo future compartido. El resultado
    /// exitoso queda cacheado con timestamp actual.
    pub async fn get_or_resolve<F, Fut>(
        &self,
        query: &str,
        lookup: F,
    ) -> Result<StreamHandle, ResolveError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<StreamHandle, ResolveError>> + Send + 'static,
    {
        if let Some(hit) = self.get(query) {
            return Ok(hit);
        }

        let flight = match self.in_flight.entry(query.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => {
                debug!("🛫 Búsqueda en vuelo para '{}', esperando", query);
                occupied.get().clone()
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let entries = Arc::clone(&self.entries);
                let in_flight = Arc::clone(&self.in_flight);
                let key = query.to_string();
                let fut = lookup();
                let flight: FlightFuture = async move {
                    let result = fut.await;
                    if let Ok(ref handle) = result {
                        entries.insert(
                            key.clone(),
                            CacheEntry {
                                handle: handle.clone(),
                                resolved_at: Instant::now(),
                            },
                        );
                    }
                    in_flight.remove(&key);
                    result
                }
                .boxed()
                .shared();
                vacant.insert(flight.clone());
                flight
            }
        };

        flight.await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Limpia entradas expiradas y retorna el número de elementos removidos
    pub fn cleanup_expired(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.is_fresh(ttl));
        let removed = before - self.entries.len();
        if removed > 0 {
            info!("🧹 Cache cleanup: removed {} expired entries", removed);
        }
        removed
    }
}
