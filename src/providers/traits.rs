use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{
    GenerateRequest, GenerateResponse, ImageAttachment, ImagenRequest, ModelInfo, ProviderError,
    StreamEvent,
};

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError>;

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError>;

    /// Stream text fragments into `tx`. Ends with `Done` or `Error` unless
    /// the call itself fails before the stream opens.
    async fn stream_generate(
        &self,
        request: GenerateRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError>;

    async fn generate_images(
        &self,
        request: ImagenRequest,
    ) -> Result<Vec<ImageAttachment>, ProviderError>;
}
