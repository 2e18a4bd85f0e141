use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tokio::sync::mpsc;

use super::models::*;
use crate::config::GEMINI_BASE_URL;
use crate::models::{GroundingSource, Role};
use crate::providers::traits::GenerationBackend;
use crate::providers::types::*;

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, GEMINI_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Parse an API error response body into a user-friendly message.
    fn parse_error_message(status: StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(body) {
            let error = &parsed["error"];
            if let Some(msg) = error["message"].as_str() {
                return match error["status"].as_str() {
                    Some(code) => format!("HTTP {} {}: {}", status.as_u16(), code, msg),
                    None => format!("HTTP {}: {}", status.as_u16(), msg),
                };
            }
        }
        format!("HTTP {}: Request failed", status.as_u16())
    }

    fn translate_role(role: &Role) -> &'static str {
        match role {
            Role::User => "user",
            Role::Assistant => "model",
        }
    }

    fn build_contents(messages: &[ChatMessage]) -> Vec<GeminiContent> {
        messages
            .iter()
            .map(|msg| {
                let mut parts: Vec<GeminiPart> = msg
                    .images
                    .iter()
                    .map(|img| GeminiPart {
                        text: None,
                        inline_data: Some(GeminiInlineData {
                            mime_type: img.mime_type.clone(),
                            data: img.to_base64(),
                        }),
                    })
                    .collect();

                if !msg.content.is_empty() {
                    parts.push(GeminiPart::text(msg.content.clone()));
                }

                GeminiContent {
                    role: Some(Self::translate_role(&msg.role).to_string()),
                    parts,
                }
            })
            .collect()
    }

    pub(crate) fn build_request(request: &GenerateRequest) -> GeminiRequest {
        let mut config = GeminiGenerationConfig {
            temperature: request.temperature,
            ..Default::default()
        };
        match &request.format {
            ResponseFormat::Text => {}
            ResponseFormat::Json { schema } => {
                config.response_mime_type = Some("application/json".to_string());
                config.response_schema = Some(schema.clone());
            }
            ResponseFormat::Image { aspect_ratio } => {
                config.response_modalities = Some(vec!["IMAGE".to_string(), "TEXT".to_string()]);
                config.image_config = aspect_ratio.map(|ar| GeminiImageConfig {
                    aspect_ratio: ar.as_str().to_string(),
                });
            }
        }

        let system_instruction = request.system_prompt.as_ref().map(|prompt| GeminiContent {
            role: None,
            parts: vec![GeminiPart::text(prompt.clone())],
        });

        let tools = request.google_search.then(|| {
            vec![GeminiTool {
                google_search: serde_json::json!({}),
            }]
        });

        GeminiRequest {
            contents: Self::build_contents(&request.messages),
            system_instruction,
            generation_config: (!config.is_empty()).then_some(config),
            tools,
        }
    }

    pub(crate) fn into_response(
        model: String,
        response: GeminiResponse,
    ) -> Result<GenerateResponse, ProviderError> {
        if let Some(error) = &response.error {
            return Err(ProviderError::RequestFailed(error.describe()));
        }

        let text = response.text();
        let mut images = Vec::new();
        let mut sources = Vec::new();

        if let Some(candidate) = response.candidates.as_ref().and_then(|c| c.first()) {
            if let Some(content) = &candidate.content {
                for part in &content.parts {
                    if let Some(inline) = &part.inline_data {
                        images.push(ImageAttachment::from_base64(&inline.mime_type, &inline.data)?);
                    }
                }
            }
            if let Some(meta) = &candidate.grounding_metadata {
                for chunk in &meta.grounding_chunks {
                    let Some(web) = &chunk.web else { continue };
                    let Some(uri) = web.uri.as_ref().filter(|u| !u.is_empty()) else {
                        continue;
                    };
                    sources.push(GroundingSource {
                        uri: uri.clone(),
                        title: web
                            .title
                            .clone()
                            .filter(|t| !t.is_empty())
                            .unwrap_or_else(|| uri.clone()),
                    });
                }
            }
        }

        let (tokens_in, tokens_out) = response
            .usage_metadata
            .map(|u| (u.prompt_token_count, u.candidates_token_count))
            .unwrap_or((None, None));

        Ok(GenerateResponse {
            text,
            images,
            sources,
            model,
            tokens_in,
            tokens_out,
        })
    }

    /// Map non-success statuses onto `ProviderError`.
    async fn check_status(response: Response) -> Result<Response, ProviderError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::AuthError("Invalid API key".to_string()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        Ok(response)
    }

    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;
        Self::check_status(response).await
    }
}

#[async_trait]
impl GenerationBackend for GeminiProvider {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let models_response: GeminiModelsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let models = models_response
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods
                    .as_ref()
                    .is_some_and(|methods| {
                        methods
                            .iter()
                            .any(|m| m == "generateContent" || m == "predict")
                    })
            })
            .map(|m| {
                let name = m.name.strip_prefix("models/").unwrap_or(&m.name);
                ModelInfo {
                    id: name.to_string(),
                    name: m.display_name.unwrap_or_else(|| name.to_string()),
                }
            })
            .collect();

        Ok(models)
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = Self::build_request(&request);

        tracing::debug!(model = %request.model, "generateContent");
        let response = self.post_json(&url, &body).await?;

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Self::into_response(request.model, gemini_response)
    }

    async fn stream_generate(
        &self,
        request: GenerateRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        use super::stream::parse_sse_stream;

        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, request.model
        );
        let body = Self::build_request(&request);

        tracing::debug!(model = %request.model, "streamGenerateContent");
        let response = self.post_json(&url, &body).await?;

        parse_sse_stream(response.bytes_stream(), tx).await;

        Ok(())
    }

    async fn generate_images(
        &self,
        request: ImagenRequest,
    ) -> Result<Vec<ImageAttachment>, ProviderError> {
        let url = format!("{}/models/{}:predict", self.base_url, request.model);
        let body = ImagenPredictRequest {
            instances: vec![ImagenInstance {
                prompt: request.prompt.clone(),
            }],
            parameters: ImagenParameters {
                sample_count: request.count,
                aspect_ratio: request.aspect_ratio.as_str().to_string(),
                output_options: ImagenOutputOptions {
                    mime_type: request.mime_type.clone(),
                },
            },
        };

        tracing::debug!(model = %request.model, count = request.count, "predict");
        let response = self.post_json(&url, &body).await?;

        let predict: ImagenPredictResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        predict
            .predictions
            .into_iter()
            .filter_map(|p| {
                let data = p.bytes_base64_encoded?;
                let mime = p.mime_type.unwrap_or_else(|| request.mime_type.clone());
                Some(ImageAttachment::from_base64(&mime, &data))
            })
            .collect()
    }
}
