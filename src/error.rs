//! Taxonomía de errores del orquestador.
//!
//! Cada operación externa devuelve `Result<_, PlayerError>`; la capa de UI
//! decide cómo renderizar cada variante. Los errores de resolución son
//! `Clone` porque el mecanismo single-flight comparte el mismo fallo entre
//! todos los llamadores concurrentes de una misma búsqueda.

use thiserror::Error;

/// Errores causados por la entrada del usuario. No cambian estado.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserInputError {
    #[error("La consulta está vacía")]
    EmptyQuery,

    #[error("Posición inválida {position}: la cola tiene {len} canciones")]
    InvalidPosition { position: usize, len: usize },

    #[error("La cola está llena (máximo {max} canciones)")]
    QueueFull { max: usize },

    #[error("No hay una sesión activa en este servidor")]
    NoActiveSession,

    #[error("No hay nada reproduciéndose")]
    NothingPlaying,
}

/// Fallos del proveedor de búsqueda/extracción. Nunca se cachean.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("No se encontraron resultados para '{query}'")]
    NoResults { query: String },

    #[error("Error del proveedor: {message}")]
    Provider { message: String },

    #[error("No se pudo obtener el stream: {message}")]
    Fetch { message: String },
}

/// Fallos del transporte de voz.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("No se pudo conectar al canal de voz: {0}")]
    Connect(String),

    #[error("Fallo de reproducción: {0}")]
    Playback(String),

    #[error("La conexión de voz se perdió")]
    Disconnected,
}

/// Error paraguas que exponen todas las operaciones del orquestador.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error(transparent)]
    UserInput(#[from] UserInputError),

    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Error interno: {0}")]
    Internal(String),
}

impl PlayerError {
    /// Verifica si el error es atribuible al usuario (sin reintento).
    pub fn is_user_error(&self) -> bool {
        matches!(self, PlayerError::UserInput(_))
    }
}
