use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use crate::error::UserInputError;

/// Una unidad reproducible más su metadata. Inmutable una vez creada;
/// su identidad es la posición en la cola, no un ID persistente.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub source_query: String,
    pub artist: Option<String>,
    pub duration: Option<Duration>,
    pub added_at: DateTime<Utc>,
}

impl Track {
    pub fn new(title: impl Into<String>, source_query: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_query: source_query.into(),
            artist: None,
            duration: None,
            added_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopMode {
    Off,
    Queue,
}

impl LoopMode {
    pub fn toggled(self) -> Self {
        match self {
            LoopMode::Off => LoopMode::Queue,
            LoopMode::Queue => LoopMode::Off,
        }
    }
}

/// Cola ordenada de tracks pendientes para una sesión.
///
/// Solo la sesión dueña la muta (single-writer); los índices son base cero
/// y toda operación posicional valida contra el largo actual.
#[derive(Debug)]
pub struct TrackQueue {
    items: VecDeque<Track>,
    max_size: usize,
}

impl TrackQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Agrega un track al final de la cola
    pub fn push_back(&mut self, track: Track) -> Result<(), UserInputError> {
        self.check_capacity()?;
        info!("➕ Agregado a la cola: {}", track.title);
        self.items.push_back(track);
        Ok(())
    }

    /// Agrega un track al principio de la cola (será el próximo)
    pub fn push_front(&mut self, track: Track) -> Result<(), UserInputError> {
        self.check_capacity()?;
        info!("⏫ Agregado al principio de la cola: {}", track.title);
        self.items.push_front(track);
        Ok(())
    }

    /// Inserta en una posición arbitraria; `index == len` equivale a push_back
    pub fn insert_at(&mut self, index: usize, track: Track) -> Result<(), UserInputError> {
        self.check_capacity()?;
        if index > self.items.len() {
            return Err(self.out_of_range(index));
        }
        self.items.insert(index, track);
        Ok(())
    }

    pub fn pop_front(&mut self) -> Option<Track> {
        let next = self.items.pop_front();
        if let Some(ref track) = next {
            info!("➡️ Siguiente en cola (FIFO): {}", track.title);
        } else {
            debug!("📭 Cola vacía, no hay siguiente track");
        }
        next
    }

    pub fn remove_at(&mut self, index: usize) -> Result<Track, UserInputError> {
        if index >= self.items.len() {
            return Err(self.out_of_range(index));
        }
        let track = self
            .items
            .remove(index)
            .ok_or_else(|| self.out_of_range(index))?;
        debug!("❌ Track eliminado en posición {}", index);
        Ok(track)
    }

    pub fn peek_at(&self, index: usize) -> Result<&Track, UserInputError> {
        self.items.get(index).ok_or_else(|| self.out_of_range(index))
    }

    /// Mueve un track a una nueva posición
    pub fn move_track(&mut self, from: usize, to: usize) -> Result<(), UserInputError> {
        if from >= self.items.len() {
            return Err(self.out_of_range(from));
        }
        if to >= self.items.len() {
            return Err(self.out_of_range(to));
        }

        if from != to {
            let track = self
                .items
                .remove(from)
                .ok_or_else(|| self.out_of_range(from))?;
            self.items.insert(to, track);
            debug!("📍 Track movido de posición {} a {}", from, to);
        }

        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
        info!("🗑️ Cola limpiada");
    }

    /// Mezcla la cola con una permutación uniforme (Fisher-Yates)
    pub fn shuffle(&mut self) {
        let mut items: Vec<_> = self.items.drain(..).collect();
        let mut rng = rand::thread_rng();
        items.shuffle(&mut rng);
        self.items.extend(items);
        info!("🔀 Cola mezclada");
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    fn check_capacity(&self) -> Result<(), UserInputError> {
        if self.items.len() >= self.max_size {
            return Err(UserInputError::QueueFull { max: self.max_size });
        }
        Ok(())
    }

    fn out_of_range(&self, index: usize) -> UserInputError {
        // Posición 1-based de cara al usuario
        UserInputError::InvalidPosition {
            position: index + 1,
            len: self.items.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(title: &str) -> Track {
        Track::new(title, title)
    }

    fn titles(queue: &TrackQueue) -> Vec<&str> {
        queue.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn tail_appends_preserve_insertion_order() {
        let mut queue = TrackQueue::new(10);
        for name in ["a", "b", "c"] {
            queue.push_back(track(name)).unwrap();
        }
        assert_eq!(titles(&queue), vec!["a", "b", "c"]);
        assert_eq!(queue.pop_front().unwrap().title, "a");
        assert_eq!(queue.pop_front().unwrap().title, "b");
    }

    #[test]
    fn push_front_yields_next() {
        let mut queue = TrackQueue::new(10);
        queue.push_back(track("a")).unwrap();
        queue.push_back(track("b")).unwrap();
        queue.push_front(track("urgent")).unwrap();
        assert_eq!(queue.pop_front().unwrap().title, "urgent");
    }

    #[test]
    fn move_and_move_back_restores_order() {
        let mut queue = TrackQueue::new(10);
        for name in ["a", "b", "c", "d"] {
            queue.push_back(track(name)).unwrap();
        }
        queue.move_track(0, 2).unwrap();
        assert_eq!(titles(&queue), vec!["b", "c", "a", "d"]);
        queue.move_track(2, 0).unwrap();
        assert_eq!(titles(&queue), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn out_of_range_is_reported_one_based() {
        let mut queue = TrackQueue::new(10);
        queue.push_back(track("a")).unwrap();

        let err = queue.remove_at(4).unwrap_err();
        assert_eq!(err, UserInputError::InvalidPosition { position: 5, len: 1 });
        // La cola no cambió
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn rejects_when_full() {
        let mut queue = TrackQueue::new(2);
        queue.push_back(track("a")).unwrap();
        queue.push_back(track("b")).unwrap();
        assert_eq!(
            queue.push_back(track("c")).unwrap_err(),
            UserInputError::QueueFull { max: 2 }
        );
    }

    #[test]
    fn shuffle_preserves_multiset() {
        let mut queue = TrackQueue::new(100);
        for i in 0..20 {
            queue.push_back(track(&format!("t{i}"))).unwrap();
        }
        let mut before: Vec<String> = queue.iter().map(|t| t.title.clone()).collect();

        // Con 20 elementos la probabilidad de obtener el mismo orden tres
        // veces seguidas es despreciable.
        let mut changed = false;
        for _ in 0..3 {
            queue.shuffle();
            let after: Vec<String> = queue.iter().map(|t| t.title.clone()).collect();
            if after != before {
                changed = true;
            }
            let mut sorted_after = after.clone();
            sorted_after.sort();
            before.sort();
            assert_eq!(sorted_after, before);
            before = after;
        }
        assert!(changed, "shuffle nunca cambió el orden");
    }

    #[test]
    fn insert_at_tail_position_is_allowed() {
        let mut queue = TrackQueue::new(10);
        queue.push_back(track("a")).unwrap();
        queue.insert_at(1, track("b")).unwrap();
        assert_eq!(titles(&queue), vec!["a", "b"]);
        assert!(queue.insert_at(5, track("c")).is_err());
    }
}
