//! Watchdog de inactividad por sesión.
//!
//! Un sleep one-shot que al vencer inyecta `StandbyFired` en la cola de
//! eventos de la propia sesión. Re-armar siempre supersede al timer
//! pendiente: a lo sumo un timer vivo por sesión. El disparo es asesor,
//! no autoritativo: lleva un número de generación y la sesión además
//! re-valida su estado al recibirlo, porque pudo haber actividad entre
//! agendar y disparar.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::audio::session::SessionEvent;

pub struct StandbyTimer {
    timeout: Duration,
    events: mpsc::UnboundedSender<SessionEvent>,
    pending: Option<JoinHandle<()>>,
    generation: u64,
}

impl StandbyTimer {
    pub fn new(timeout: Duration, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            timeout,
            events,
            pending: None,
            generation: 0,
        }
    }

    /// Agenda un disparo único, cancelando cualquier timer previo.
    pub fn arm(&mut self) {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let timeout = self.timeout;
        let events = self.events.clone();

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            debug!("💤 Standby vencido (generación {})", generation);
            // Si la sesión ya murió el send falla; no hay nada que hacer
            let _ = events.send(SessionEvent::StandbyFired { generation });
        }));
    }

    /// Cancela y re-arma con el timeout completo.
    pub fn reset(&mut self) {
        self.arm();
    }

    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    /// Un disparo con generación vieja fue superseded por un re-arm.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

impl Drop for StandbyTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fired(event: SessionEvent) -> u64 {
        match event {
            SessionEvent::StandbyFired { generation } => generation,
            other => panic!("evento inesperado: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_exactly_once_after_timeout() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = StandbyTimer::new(Duration::from_secs(900), tx);
        timer.arm();

        tokio::time::sleep(Duration::from_secs(901)).await;
        let generation = fired(rx.recv().await.unwrap());
        assert!(timer.is_current(generation));

        // Sin re-armado no hay segundo disparo
        tokio::time::sleep(Duration::from_secs(2000)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_supersedes_pending_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = StandbyTimer::new(Duration::from_secs(900), tx);
        timer.arm();

        tokio::time::sleep(Duration::from_secs(800)).await;
        timer.reset();

        // El timer original habría vencido acá; el reset lo superseded
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(701)).await;
        let generation = fired(rx.recv().await.unwrap());
        assert!(timer.is_current(generation));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = StandbyTimer::new(Duration::from_secs(900), tx);
        timer.arm();
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(2000)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_is_detectable() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = StandbyTimer::new(Duration::from_secs(10), tx);
        timer.arm();

        tokio::time::sleep(Duration::from_secs(11)).await;
        let stale = fired(rx.recv().await.unwrap());

        timer.arm();
        assert!(!timer.is_current(stale));
    }
}
