pub mod gemini;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod testing;

pub use gemini::GeminiProvider;
pub use traits::GenerationBackend;
pub use types::{
    ChatMessage, GenerateRequest, ImageAttachment, ImagenRequest, ProviderError, ResponseFormat,
    StreamEvent,
};
