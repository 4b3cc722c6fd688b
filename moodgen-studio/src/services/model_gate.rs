//! One-shot readiness barrier for the music generator
//!
//! The generator is loaded once in a background task. Requests arriving
//! earlier wait on a `watch` channel until the gate leaves `Loading`; a failed
//! load is reported to every waiter.

use super::generator::{GeneratorError, MusicGenerator};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Clone)]
enum GateState {
    Loading,
    Ready(Arc<dyn MusicGenerator>),
    Failed(String),
}

/// Externally visible gate state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelState {
    Loading,
    Ready,
    Failed(String),
}

impl ModelState {
    pub fn label(&self) -> &'static str {
        match self {
            ModelState::Loading => "loading",
            ModelState::Ready => "ready",
            ModelState::Failed(_) => "failed",
        }
    }
}

pub struct ModelGate {
    tx: watch::Sender<GateState>,
}

impl Default for ModelGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelGate {
    /// Gate in the `Loading` state
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(GateState::Loading);
        Self { tx }
    }

    /// Gate that is already open
    pub fn ready(generator: Arc<dyn MusicGenerator>) -> Self {
        let gate = Self::new();
        gate.set_ready(generator);
        gate
    }

    pub fn set_ready(&self, generator: Arc<dyn MusicGenerator>) {
        self.tx.send_replace(GateState::Ready(generator));
    }

    pub fn set_failed(&self, reason: impl Into<String>) {
        self.tx.send_replace(GateState::Failed(reason.into()));
    }

    /// Run `loader` in the background and open the gate with its result
    pub fn spawn_load<F>(self: &Arc<Self>, loader: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<Arc<dyn MusicGenerator>, GeneratorError>> + Send + 'static,
    {
        let gate = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!("Loading music generator in background");
            match loader.await {
                Ok(generator) => {
                    gate.set_ready(generator);
                    tracing::info!("Music generator loaded");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Music generator failed to load");
                    gate.set_failed(e.to_string());
                }
            }
        })
    }

    pub fn state(&self) -> ModelState {
        match &*self.tx.borrow() {
            GateState::Loading => ModelState::Loading,
            GateState::Ready(_) => ModelState::Ready,
            GateState::Failed(reason) => ModelState::Failed(reason.clone()),
        }
    }

    /// Wait until loading finishes; `Err` carries the load failure
    pub async fn wait_ready(&self) -> Result<Arc<dyn MusicGenerator>, String> {
        let mut rx = self.tx.subscribe();
        let state = rx
            .wait_for(|s| !matches!(s, GateState::Loading))
            .await
            .map_err(|_| "model gate closed".to_string())?;

        let result = match &*state {
            GateState::Ready(generator) => Ok(Arc::clone(generator)),
            GateState::Failed(reason) => Err(reason.clone()),
            GateState::Loading => Err("model still loading".to_string()),
        };
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use moodgen_common::Waveform;
    use std::time::Duration;

    struct SilentGenerator;

    #[async_trait]
    impl MusicGenerator for SilentGenerator {
        async fn generate(&self, _prompt: &str, _max_new_tokens: u32) -> Result<Waveform, GeneratorError> {
            Ok(Waveform::mono(vec![0.0; 10], 32000))
        }
    }

    #[tokio::test]
    async fn test_waiters_released_on_ready() {
        let gate = Arc::new(ModelGate::new());
        assert_eq!(gate.state(), ModelState::Loading);

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.wait_ready().await.is_ok() })
        };

        gate.spawn_load(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(Arc::new(SilentGenerator) as Arc<dyn MusicGenerator>)
        });

        assert!(waiter.await.unwrap());
        assert_eq!(gate.state(), ModelState::Ready);
    }

    #[tokio::test]
    async fn test_failed_load_reported_to_waiters() {
        let gate = Arc::new(ModelGate::new());
        gate.spawn_load(async { Err(GeneratorError::NotReady("connection refused".to_string())) })
            .await
            .unwrap();

        let err = gate.wait_ready().await.err().unwrap();
        assert!(err.contains("connection refused"));
        assert_eq!(gate.state().label(), "failed");
    }

    #[tokio::test]
    async fn test_ready_gate_does_not_block() {
        let gate = ModelGate::ready(Arc::new(SilentGenerator));
        let generator = tokio::time::timeout(Duration::from_secs(1), gate.wait_ready())
            .await
            .unwrap()
            .unwrap();
        let wave = generator.generate("x", 256).await.unwrap();
        assert_eq!(wave.frames(), 10);
    }
}
