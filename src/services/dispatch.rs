use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::future::try_join_all;

use crate::config::MAX_IMAGE_COUNT;
use crate::models::research::dedupe_sources;
use crate::models::{
    AspectRatio, CodeLanguage, ImageQuality, ImageStyle, ResearchResult, StudyPlan, WritingFormat,
    WritingLength, WritingTone,
};
use crate::providers::types::GenerateResponse;
use crate::providers::{
    ChatMessage, GenerateRequest, GenerationBackend, ImageAttachment, ImagenRequest,
    ProviderError, ResponseFormat,
};
use crate::services::aggregator::collect_stream;
use crate::services::errors::StudioError;
use crate::services::languages::language_instruction;
use crate::services::markdown::extract_code;
use crate::services::prompts;
use crate::services::settings::AppSettings;

const NO_SUMMARY: &str = "No summary generated.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Studio {
    Image,
    Write,
    Build,
    Research,
    Learn,
    Enhance,
}

impl Studio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Studio::Image => "image",
            Studio::Write => "write",
            Studio::Build => "build",
            Studio::Research => "research",
            Studio::Learn => "learn",
            Studio::Enhance => "enhance",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub prompt: String,
    pub tone: WritingTone,
    pub format: WritingFormat,
    pub length: WritingLength,
}

#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub prompt: String,
    pub language: CodeLanguage,
    /// Code to edit; `None` generates from scratch.
    pub existing_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutput {
    pub raw: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub enum ImageMode {
    Generate {
        style: ImageStyle,
        aspect_ratio: AspectRatio,
        quality: ImageQuality,
    },
    Edit {
        references: Vec<ImageAttachment>,
    },
}

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    pub count: u8,
    pub mode: ImageMode,
}

/// Model ids and response language shared by all studios.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub text_model: String,
    pub image_model: String,
    pub imagen_model: String,
    pub language: String,
}

impl From<&AppSettings> for DispatchConfig {
    fn from(settings: &AppSettings) -> Self {
        Self {
            text_model: settings.text_model.clone(),
            image_model: settings.image_model.clone(),
            imagen_model: settings.imagen_model.clone(),
            language: settings.language.clone(),
        }
    }
}

fn require<'a>(
    value: &'a str,
    field: &'static str,
    message: &'static str,
) -> Result<&'a str, StudioError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(StudioError::validation(field, message))
    } else {
        Ok(trimmed)
    }
}

fn log_usage(studio: Studio, response: &GenerateResponse) {
    tracing::debug!(
        studio = studio.as_str(),
        model = %response.model,
        tokens_in = ?response.tokens_in,
        tokens_out = ?response.tokens_out,
        "generation complete"
    );
}

/// Marks a studio busy until dropped.
struct InFlight {
    busy: Arc<Mutex<HashSet<Studio>>>,
    studio: Studio,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.busy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.studio);
        tracing::debug!(studio = self.studio.as_str(), "settled");
    }
}

/// Turns studio parameters into backend calls.
pub struct Dispatcher {
    backend: Arc<dyn GenerationBackend>,
    config: DispatchConfig,
    busy: Arc<Mutex<HashSet<Studio>>>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn GenerationBackend>, config: DispatchConfig) -> Self {
        Self {
            backend,
            config,
            busy: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn lang(&self) -> String {
        language_instruction(&self.config.language)
    }

    fn begin(&self, studio: Studio) -> Result<InFlight, StudioError> {
        let mut busy = self.busy.lock().unwrap_or_else(|e| e.into_inner());
        if !busy.insert(studio) {
            return Err(StudioError::Busy);
        }
        tracing::debug!(studio = studio.as_str(), "submitting");
        Ok(InFlight {
            busy: self.busy.clone(),
            studio,
        })
    }

    pub fn is_busy(&self, studio: Studio) -> bool {
        self.busy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&studio)
    }

    pub async fn write<F>(&self, request: WriteRequest, on_partial: F) -> Result<String, StudioError>
    where
        F: FnMut(&str) + Send,
    {
        let prompt = require(&request.prompt, "prompt", "Please enter a prompt.")?;
        let _guard = self.begin(Studio::Write)?;

        let full_prompt = prompts::write_prompt(
            prompt,
            request.tone,
            request.format,
            request.length,
            &self.lang(),
        );
        let generate = GenerateRequest::prompt(&self.config.text_model, full_prompt);

        collect_stream(self.backend.clone(), generate, on_partial)
            .await
            .map_err(|e| {
                tracing::error!("Write failed: {}", e);
                StudioError::from(e)
            })
    }

    pub async fn build<F>(&self, request: BuildRequest, on_partial: F) -> Result<BuildOutput, StudioError>
    where
        F: FnMut(&str) + Send,
    {
        let prompt = require(&request.prompt, "prompt", "Please enter a prompt.")?;
        let existing = match &request.existing_code {
            Some(code) => Some(require(
                code,
                "existing_code",
                "Please provide the code you want to edit.",
            )?),
            None => None,
        };
        let _guard = self.begin(Studio::Build)?;

        let full_prompt = prompts::code_prompt(prompt, request.language, existing, &self.lang());
        let generate = GenerateRequest::prompt(&self.config.text_model, full_prompt);

        let raw = collect_stream(self.backend.clone(), generate, on_partial)
            .await
            .map_err(|e| {
                tracing::error!("Build failed: {}", e);
                StudioError::from(e)
            })?;
        let code = extract_code(&raw);
        Ok(BuildOutput { raw, code })
    }

    /// Returns one data URI per generated image.
    pub async fn image(&self, request: ImageRequest) -> Result<Vec<String>, StudioError> {
        let prompt = require(&request.prompt, "prompt", "Please enter a prompt.")?;
        if let ImageMode::Edit { references } = &request.mode {
            if references.is_empty() {
                return Err(StudioError::validation(
                    "images",
                    "Please upload at least one reference image.",
                ));
            }
        }
        let _guard = self.begin(Studio::Image)?;
        let count = request.count.clamp(1, MAX_IMAGE_COUNT);

        let images = match request.mode {
            ImageMode::Generate {
                style,
                aspect_ratio,
                quality: ImageQuality::High,
            } => {
                self.backend
                    .generate_images(ImagenRequest {
                        model: self.config.imagen_model.clone(),
                        prompt: prompts::imagen_prompt(prompt, style),
                        count,
                        aspect_ratio,
                        mime_type: "image/jpeg".to_string(),
                    })
                    .await?
            }
            ImageMode::Generate {
                style,
                aspect_ratio,
                quality: ImageQuality::Standard,
            } => {
                let mut generate = GenerateRequest::prompt(
                    &self.config.image_model,
                    prompts::image_prompt(prompt, style),
                );
                generate.format = ResponseFormat::Image {
                    aspect_ratio: Some(aspect_ratio),
                };
                self.generate_image_variants(generate, count).await?
            }
            ImageMode::Edit { references } => {
                let mut generate = GenerateRequest::text(
                    &self.config.image_model,
                    vec![ChatMessage {
                        images: references,
                        ..ChatMessage::user(prompt)
                    }],
                );
                generate.format = ResponseFormat::Image { aspect_ratio: None };
                self.generate_image_variants(generate, count).await?
            }
        };

        if images.is_empty() {
            return Err(StudioError::NoImages);
        }
        tracing::info!(count = images.len(), "images generated");
        Ok(images.iter().map(ImageAttachment::to_data_uri).collect())
    }

    /// The same request issued `count` times in parallel; any failure fails all.
    async fn generate_image_variants(
        &self,
        request: GenerateRequest,
        count: u8,
    ) -> Result<Vec<ImageAttachment>, ProviderError> {
        let calls = (0..count).map(|_| self.backend.generate(request.clone()));
        let responses = try_join_all(calls).await?;
        for response in &responses {
            log_usage(Studio::Image, response);
        }
        Ok(responses.into_iter().flat_map(|r| r.images).collect())
    }

    pub async fn research(&self, query: &str) -> Result<ResearchResult, StudioError> {
        let query = require(query, "query", "Please enter a research query.")?;
        let _guard = self.begin(Studio::Research)?;

        let mut generate = GenerateRequest::prompt(
            &self.config.text_model,
            prompts::research_prompt(query, &self.lang()),
        );
        generate.google_search = true;

        let response = self.backend.generate(generate).await.map_err(|e| {
            tracing::error!("Research failed: {}", e);
            StudioError::from(e)
        })?;
        log_usage(Studio::Research, &response);

        Ok(ResearchResult {
            summary: response.text.unwrap_or_else(|| NO_SUMMARY.to_string()),
            sources: dedupe_sources(response.sources),
        })
    }

    pub async fn learn(&self, topic: &str) -> Result<StudyPlan, StudioError> {
        let topic = require(topic, "topic", "Please enter a topic to learn.")?;
        let _guard = self.begin(Studio::Learn)?;

        let mut generate = GenerateRequest::prompt(
            &self.config.text_model,
            prompts::study_plan_prompt(topic, &self.lang()),
        );
        generate.format = ResponseFormat::Json {
            schema: StudyPlan::response_schema(),
        };

        let response = self.backend.generate(generate).await.map_err(|e| {
            tracing::error!("Study plan failed: {}", e);
            StudioError::from(e)
        })?;
        log_usage(Studio::Learn, &response);

        let text = response
            .text
            .ok_or_else(|| ProviderError::InvalidResponse("Empty study plan".to_string()))?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!("Study plan did not match schema: {}", e);
            StudioError::from(ProviderError::InvalidResponse(e.to_string()))
        })
    }

    /// Rewrite a rough prompt into a detailed one. Falls back to the input.
    pub async fn enhance_prompt(&self, prompt: &str) -> Result<String, StudioError> {
        let trimmed = require(prompt, "prompt", "Please enter a prompt.")?;
        let _guard = self.begin(Studio::Enhance)?;

        let generate = GenerateRequest::prompt(
            &self.config.text_model,
            prompts::enhance_prompt(trimmed, &self.lang()),
        );
        match self.backend.generate(generate).await {
            Ok(response) => {
                log_usage(Studio::Enhance, &response);
                Ok(response
                    .text
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| prompt.to_string()))
            }
            Err(e) => {
                tracing::warn!("Prompt enhancement failed, keeping original: {}", e);
                Ok(prompt.to_string())
            }
        }
    }
}
