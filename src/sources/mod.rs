//! Resolución de búsquedas a streams reproducibles.
//!
//! El proveedor concreto (yt-dlp, Lavalink, API propia) vive fuera de este
//! crate detrás de [`MediaProvider`]; acá solo se orquesta: caché TTL,
//! single-flight y registro de artefactos descargados.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::artifact_store::ArtifactStore;
use crate::cache::ResolverCache;
use crate::error::ResolveError;

/// Candidato rankeado devuelto por la búsqueda del proveedor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackCandidate {
    pub title: String,
    pub url: String,
    pub artist: Option<String>,
    pub duration: Option<Duration>,
}

/// Stream obtenido del proveedor: URL remota y, si descargó, el archivo local.
#[derive(Debug, Clone)]
pub struct FetchedStream {
    pub url: String,
    pub local_path: Option<PathBuf>,
}

/// Resultado final de resolver una búsqueda: algo reproducible más metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamHandle {
    pub url: String,
    pub local_path: Option<PathBuf>,
    pub title: String,
    pub artist: Option<String>,
    pub duration: Option<Duration>,
}

/// Proveedor externo de búsqueda y extracción de streams.
///
/// Los errores no se reintentan acá adentro; el llamador decide si saltear
/// al siguiente track o reportar al usuario.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Busca candidatos rankeados para una consulta
    async fn search(&self, query: &str) -> Result<Vec<TrackCandidate>, ResolveError>;

    /// Obtiene un handle reproducible para un candidato
    async fn fetch_stream(&self, candidate: &TrackCandidate)
        -> Result<FetchedStream, ResolveError>;
}

/// Convierte consultas humanas en [`StreamHandle`]s, memoizando por TTL.
pub struct Resolver {
    provider: Arc<dyn MediaProvider>,
    cache: ResolverCache,
    artifacts: Arc<ArtifactStore>,
}

impl Resolver {
    pub fn new(
        provider: Arc<dyn MediaProvider>,
        cache_ttl: Duration,
        artifacts: Arc<ArtifactStore>,
    ) -> Self {
        Self {
            provider,
            cache: ResolverCache::new(cache_ttl),
            artifacts,
        }
    }

    /// Resuelve una consulta a un stream reproducible.
    ///
    /// Hit de caché fresco ⇒ sin llamada externa. Miss ⇒ exactamente una
    /// búsqueda en vuelo por consulta distinta, compartida entre todos los
    /// llamadores concurrentes. Los fallos se propagan sin cachear.
    pub async fn resolve(&self, query: &str) -> Result<StreamHandle, ResolveError> {
        let provider = Arc::clone(&self.provider);
        let artifacts = Arc::clone(&self.artifacts);
        let owned_query = query.to_string();

        self.cache
            .get_or_resolve(query, move || async move {
                debug!("🔍 Resolviendo '{}'", owned_query);
                let candidates = provider.search(&owned_query).await?;
                let best = candidates
                    .into_iter()
                    .next()
                    .ok_or_else(|| ResolveError::NoResults {
                        query: owned_query.clone(),
                    })?;

                let fetched = provider.fetch_stream(&best).await?;
                if let Some(ref path) = fetched.local_path {
                    artifacts.register(path.clone());
                }

                info!("🎶 Resuelto '{}' → {}", owned_query, best.title);
                Ok(StreamHandle {
                    url: fetched.url,
                    local_path: fetched.local_path,
                    title: best.title,
                    artist: best.artist,
                    duration: best.duration,
                })
            })
            .await
    }

    /// Passthrough de búsqueda para el verbo `search` de la UI.
    pub async fn search(&self, query: &str) -> Result<Vec<TrackCandidate>, ResolveError> {
        self.provider.search(query).await
    }

    pub fn artifacts(&self) -> &Arc<ArtifactStore> {
        &self.artifacts
    }

    pub fn cache(&self) -> &ResolverCache {
        &self.cache
    }
}
