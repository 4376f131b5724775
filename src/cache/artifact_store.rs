//! Almacén acotado de artefactos de audio en disco.
//!
//! Compartido por todas las sesiones (no particionado por guild). Mantiene
//! a lo sumo `max_artifacts` archivos; al excederse desaloja el más antiguo
//! por orden de registro. Un archivo en reproducción se "pinea" con un
//! guard RAII y el desalojo lo saltea hasta que se libere.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct ArtifactEntry {
    path: PathBuf,
    registered_at: DateTime<Utc>,
}

/// Ledger de artefactos con desalojo oldest-first.
pub struct ArtifactStore {
    root: PathBuf,
    max_artifacts: usize,
    // Orden de inserción == orden de antigüedad
    ledger: Mutex<Vec<ArtifactEntry>>,
    pins: Arc<DashMap<PathBuf, usize>>,
}

impl ArtifactStore {
    pub fn new(root: PathBuf, max_artifacts: usize) -> Self {
        Self {
            root,
            max_artifacts,
            ledger: Mutex::new(Vec::new()),
            pins: Arc::new(DashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Nombre de archivo normalizado para una búsqueda o identificador.
    pub fn artifact_name(query: &str) -> String {
        let mut name: String = query
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        name.truncate(64);
        while name.contains("--") {
            name = name.replace("--", "-");
        }
        name.trim_matches('-').to_string()
    }

    /// Registra un artefacto recién descargado y aplica el límite.
    ///
    /// Si el archivo ya estaba registrado solo refresca su posición.
    pub fn register(&self, path: PathBuf) {
        {
            let mut ledger = self.ledger.lock();
            ledger.retain(|entry| entry.path != path);
            ledger.push(ArtifactEntry {
                path: path.clone(),
                registered_at: Utc::now(),
            });
            debug!("💾 Artefacto registrado: {}", path.display());
        }
        self.evict_excess();
    }

    /// Pinea un artefacto mientras está en reproducción.
    pub fn pin(&self, path: &Path) -> ArtifactPin {
        *self.pins.entry(path.to_path_buf()).or_insert(0) += 1;
        ArtifactPin {
            path: path.to_path_buf(),
            pins: Arc::clone(&self.pins),
        }
    }

    pub fn is_pinned(&self, path: &Path) -> bool {
        self.pins.get(path).map(|count| *count > 0).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.ledger.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.lock().is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.ledger.lock().iter().any(|entry| entry.path == path)
    }

    /// Desaloja los más antiguos no pineados hasta volver al límite.
    ///
    /// Los pineados quedan diferidos: cuentan para el tamaño pero no se
    /// tocan; un desalojo posterior los reintenta ya liberados. Fallos de
    /// borrado se loguean y se tragan, nunca bloquean la reproducción.
    fn evict_excess(&self) {
        let mut ledger = self.ledger.lock();
        let mut index = 0;
        while ledger.len() > self.max_artifacts && index < ledger.len() {
            if self.is_pinned(&ledger[index].path) {
                debug!(
                    "📌 Artefacto en uso, desalojo diferido: {}",
                    ledger[index].path.display()
                );
                index += 1;
                continue;
            }

            let entry = ledger.remove(index);
            match std::fs::remove_file(&entry.path) {
                Ok(()) => info!(
                    "🗑️ Artefacto desalojado ({}): {}",
                    entry.registered_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.path.display()
                ),
                Err(e) => warn!(
                    "⚠️ No se pudo borrar {}: {}",
                    entry.path.display(),
                    e
                ),
            }
        }
    }
}

/// Guard RAII que mantiene un artefacto a salvo del desalojo.
pub struct ArtifactPin {
    path: PathBuf,
    pins: Arc<DashMap<PathBuf, usize>>,
}

impl Drop for ArtifactPin {
    fn drop(&mut self) {
        if let Some(mut count) = self.pins.get_mut(&self.path) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                drop(count);
                self.pins.remove(&self.path);
            }
        }
    }
}
