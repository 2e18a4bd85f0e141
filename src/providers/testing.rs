//! In-process backend used by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use super::traits::GenerationBackend;
use super::types::*;

pub struct ScriptedBackend {
    fragments: Vec<String>,
    stream_error: Option<ProviderError>,
    open_error: Option<ProviderError>,
    gate: Option<Arc<Notify>>,
    generate_result: Result<GenerateResponse, ProviderError>,
    imagen_result: Result<Vec<ImageAttachment>, ProviderError>,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            fragments: Vec::new(),
            stream_error: None,
            open_error: None,
            gate: None,
            generate_result: Ok(GenerateResponse::default()),
            imagen_result: Ok(Vec::new()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn streaming(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            ..Self::new()
        }
    }

    /// Emit the scripted fragments, then fail in-band.
    pub fn failing_after(mut self, error: ProviderError) -> Self {
        self.stream_error = Some(error);
        self
    }

    /// Fail before the stream opens.
    pub fn refusing(mut self, error: ProviderError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Hold the stream open after the first fragment until notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn responding(mut self, result: Result<GenerateResponse, ProviderError>) -> Self {
        self.generate_result = result;
        self
    }

    pub fn with_images(mut self, result: Result<Vec<ImageAttachment>, ProviderError>) -> Self {
        self.imagen_result = result;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, request: &GenerateRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        Ok(vec![ModelInfo {
            id: "scripted".to_string(),
            name: "Scripted".to_string(),
        }])
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        self.record(&request);
        self.generate_result.clone()
    }

    async fn stream_generate(
        &self,
        request: GenerateRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        self.record(&request);
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }

        for (i, fragment) in self.fragments.iter().enumerate() {
            let _ = tx.send(StreamEvent::Token(fragment.clone())).await;
            if i == 0 {
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
            }
        }

        let last = match &self.stream_error {
            Some(err) => StreamEvent::Error(err.clone()),
            None => StreamEvent::Done {
                tokens_in: None,
                tokens_out: None,
            },
        };
        let _ = tx.send(last).await;
        Ok(())
    }

    async fn generate_images(
        &self,
        request: ImagenRequest,
    ) -> Result<Vec<ImageAttachment>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let images = self.imagen_result.clone()?;
        Ok(images.into_iter().take(request.count as usize).collect())
    }
}
