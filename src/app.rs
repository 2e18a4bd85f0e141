use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::{DRIVE_TOKEN_ENV, MAX_IMAGE_COUNT};
use crate::models::{
    AspectRatio, CodeLanguage, Conversation, ImageQuality, ImageStyle, WritingFormat,
    WritingLength, WritingTone,
};
use crate::providers::{GeminiProvider, GenerationBackend, ImageAttachment};
use crate::services::aggregator::{AggregateState, ChatSession, SubmitOutcome};
use crate::services::backup::{self, BackupStore, DriveBackupStore};
use crate::services::dispatch::{BuildRequest, ImageMode, ImageRequest, WriteRequest};
use crate::services::export;
use crate::services::keyring::resolve_api_key;
use crate::services::settings::Theme;
use crate::services::{
    languages, AppSettings, Database, DispatchConfig, Dispatcher, KeyringService, SettingsService,
    StudioError,
};

#[derive(Debug, Parser)]
#[command(name = "agent-studio", version, about = "Chat, write, code, draw, research and learn with Gemini")]
pub struct Cli {
    /// API key for this run only; overrides the environment and keyring
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Response language for this run, e.g. fr-FR
    #[arg(long, global = true)]
    pub language: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive chat. `/new` starts over, `/exit` quits.
    Chat,
    /// Generate or edit images
    Image(ImageArgs),
    /// Draft text in a given tone, format and length
    Write {
        prompt: String,
        #[arg(long, value_enum, default_value_t = WritingTone::Professional)]
        tone: WritingTone,
        #[arg(long, value_enum, default_value_t = WritingFormat::BlogPost)]
        format: WritingFormat,
        #[arg(long, value_enum, default_value_t = WritingLength::Medium)]
        length: WritingLength,
    },
    /// Generate code, or edit an existing file
    Build {
        prompt: String,
        #[arg(long, short = 'l', value_enum, default_value_t = CodeLanguage::JavaScript)]
        code_language: CodeLanguage,
        /// File whose contents should be edited
        #[arg(long)]
        edit: Option<PathBuf>,
        /// Write the extracted code here
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Grounded web research with cited sources
    Research { query: String },
    /// Week-by-week study plan
    Learn {
        topic: String,
        /// Print the plan as JSON instead of markdown
        #[arg(long)]
        json: bool,
    },
    /// Rewrite a rough prompt into a detailed one
    Enhance { prompt: String },
    /// List models available to the API key
    Models,
    /// Show or change persisted settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Manage the API key stored in the keyring
    #[command(subcommand)]
    Key(KeyCommand),
    /// Back up or restore settings and chat history on Google Drive
    Backup(BackupArgs),
    /// Print the saved chat as markdown
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct ImageArgs {
    prompt: String,
    #[arg(long, value_enum, default_value_t = ImageStyle::Photorealistic)]
    style: ImageStyle,
    #[arg(long, value_enum, default_value_t = AspectRatio::Square)]
    aspect_ratio: AspectRatio,
    #[arg(long, value_enum, default_value_t = ImageQuality::Standard)]
    quality: ImageQuality,
    #[arg(long, short = 'n', default_value_t = 1,
          value_parser = clap::value_parser!(u8).range(1..=MAX_IMAGE_COUNT as i64))]
    count: u8,
    /// Reference image to edit; switches to edit mode. Repeatable.
    #[arg(long = "reference", short = 'r')]
    references: Vec<PathBuf>,
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    Show,
    Theme {
        #[arg(value_enum)]
        theme: Theme,
    },
    Language { code: String },
    Model {
        #[arg(value_enum)]
        kind: ModelKind,
        id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModelKind {
    Text,
    Image,
    Imagen,
}

#[derive(Debug, Subcommand)]
pub enum KeyCommand {
    /// Store the API key in the keyring; reads stdin when omitted
    Set { key: Option<String> },
    Clear,
}

#[derive(Debug, Args)]
pub struct BackupArgs {
    /// OAuth access token with the drive.file scope
    #[arg(long, env = DRIVE_TOKEN_ENV, hide_env_values = true)]
    token: String,
    #[command(subcommand)]
    action: BackupCommand,
}

#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    List,
    Save {
        /// Leave the API key out of the backup
        #[arg(long)]
        no_key: bool,
    },
    Restore { id: String },
}

/// Prints only the suffix of each partial that has not been printed yet.
#[derive(Debug, Default)]
struct DeltaPrinter {
    printed: usize,
}

impl DeltaPrinter {
    fn print(&mut self, partial: &str) {
        if let Some(delta) = partial.get(self.printed..) {
            print!("{}", delta);
            let _ = std::io::stdout().flush();
        }
        self.printed = partial.len();
    }

    fn finish(&mut self) {
        if self.printed > 0 {
            println!();
        }
        self.printed = 0;
    }
}

pub struct App {
    db: Database,
    keyring: Option<KeyringService>,
    settings: AppSettings,
    api_key: Option<String>,
}

impl App {
    pub async fn init(cli: &Cli) -> Result<Self> {
        let db = Database::new().await?;
        let keyring = match KeyringService::new().await {
            Ok(keyring) => Some(keyring),
            Err(e) => {
                tracing::warn!("Keyring unavailable: {:#}", e);
                None
            }
        };

        let mut settings = SettingsService::load(&db).await;
        if let Some(code) = &cli.language {
            if !settings.set_language(code) {
                bail!("Unsupported language: {}", code);
            }
        }

        Ok(Self {
            db,
            keyring,
            settings,
            api_key: cli.api_key.clone(),
        })
    }

    async fn backend(&self) -> Result<Arc<dyn GenerationBackend>> {
        let key = match &self.api_key {
            Some(key) => key.clone(),
            None => match resolve_api_key(self.keyring.as_ref()).await {
                Some((key, source)) => {
                    tracing::debug!(?source, "using API key");
                    key
                }
                None => bail!(
                    "No API key found. Set GEMINI_API_KEY or run `agent-studio key set`."
                ),
            },
        };
        Ok(Arc::new(GeminiProvider::new(key)))
    }

    async fn dispatcher(&self) -> Result<Dispatcher> {
        Ok(Dispatcher::new(
            self.backend().await?,
            DispatchConfig::from(&self.settings),
        ))
    }

    pub async fn run(mut self, command: Command) -> Result<()> {
        match command {
            Command::Chat => self.chat().await,
            Command::Image(args) => self.image(args).await,
            Command::Write {
                prompt,
                tone,
                format,
                length,
            } => {
                let dispatcher = self.dispatcher().await?;
                let mut printer = DeltaPrinter::default();
                dispatcher
                    .write(
                        WriteRequest {
                            prompt,
                            tone,
                            format,
                            length,
                        },
                        |partial| printer.print(partial),
                    )
                    .await?;
                printer.finish();
                Ok(())
            }
            Command::Build {
                prompt,
                code_language,
                edit,
                output,
            } => {
                let existing_code = match &edit {
                    Some(path) => Some(
                        tokio::fs::read_to_string(path)
                            .await
                            .with_context(|| format!("Failed to read {}", path.display()))?,
                    ),
                    None => None,
                };
                let dispatcher = self.dispatcher().await?;
                let mut printer = DeltaPrinter::default();
                let result = dispatcher
                    .build(
                        BuildRequest {
                            prompt,
                            language: code_language,
                            existing_code,
                        },
                        |partial| printer.print(partial),
                    )
                    .await?;
                printer.finish();

                if let Some(path) = output {
                    tokio::fs::write(&path, &result.code)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("Saved code to {}", path.display());
                }
                Ok(())
            }
            Command::Research { query } => {
                let result = self.dispatcher().await?.research(&query).await?;
                print!("{}", export::export_research(&query, &result));
                Ok(())
            }
            Command::Learn { topic, json } => {
                let plan = self.dispatcher().await?.learn(&topic).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&plan)?);
                } else {
                    print!("{}", export::export_study_plan(&plan));
                }
                Ok(())
            }
            Command::Enhance { prompt } => {
                let enhanced = self.dispatcher().await?.enhance_prompt(&prompt).await?;
                println!("{}", enhanced);
                Ok(())
            }
            Command::Models => {
                let backend = self.backend().await?;
                let models = backend
                    .list_models()
                    .await
                    .map_err(StudioError::from)?;
                for model in models {
                    println!("{}\t{}", model.id, model.name);
                }
                Ok(())
            }
            Command::Settings(action) => self.settings(action).await,
            Command::Key(action) => self.key(action).await,
            Command::Backup(args) => self.backup(args).await,
            Command::Export { output } => {
                let history = self.db.load_chat_history().await?;
                let markdown = export::export_conversation(&Conversation::with_messages(history));
                match output {
                    Some(path) => tokio::fs::write(&path, markdown)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?,
                    None => print!("{}", markdown),
                }
                Ok(())
            }
        }
    }

    async fn chat(&self) -> Result<()> {
        let session = ChatSession::new(
            self.backend().await?,
            &self.settings.text_model,
            &self.settings.language,
        );

        let saved = self.db.load_chat_history().await?;
        if !saved.is_empty() {
            tracing::info!("Resuming chat with {} messages", saved.len());
            session.restore(saved);
        }
        for message in session.messages() {
            println!("[{}] {}\n", message.role.as_str(), message.content);
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("> ");
            let _ = std::io::stdout().flush();

            let Some(line) = lines.next_line().await? else {
                break;
            };
            match line.trim() {
                "" => continue,
                "/exit" | "/quit" => break,
                "/new" => {
                    if session.new_chat() {
                        self.db.clear_chat_history().await?;
                        for message in session.messages() {
                            println!("{}\n", message.content);
                        }
                    }
                    continue;
                }
                _ => {}
            }

            let mut printer = DeltaPrinter::default();
            let outcome = session
                .submit(&line, |state| match state {
                    AggregateState::Pending(partial) => printer.print(partial),
                    AggregateState::Complete(_) | AggregateState::Failed(_) => printer.finish(),
                })
                .await?;

            match outcome {
                SubmitOutcome::Completed(_) => {}
                SubmitOutcome::Failed { reply, error } => {
                    eprintln!("{}", error);
                    println!("{}", reply.content);
                }
                SubmitOutcome::Busy => continue,
            }
            println!();

            if let Err(e) = self.db.replace_chat_history(&session.messages()).await {
                tracing::error!("Failed to save chat history: {:#}", e);
            }
        }

        Ok(())
    }

    async fn image(&self, args: ImageArgs) -> Result<()> {
        let mode = if args.references.is_empty() {
            ImageMode::Generate {
                style: args.style,
                aspect_ratio: args.aspect_ratio,
                quality: args.quality,
            }
        } else {
            let mut references = Vec::with_capacity(args.references.len());
            for path in &args.references {
                references.push(read_image(path).await?);
            }
            ImageMode::Edit { references }
        };

        let uris = self
            .dispatcher()
            .await?
            .image(ImageRequest {
                prompt: args.prompt,
                count: args.count,
                mode,
            })
            .await?;

        tokio::fs::create_dir_all(&args.out_dir)
            .await
            .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        for (i, uri) in uris.iter().enumerate() {
            let image = ImageAttachment::from_data_uri(uri)?;
            let path = args
                .out_dir
                .join(format!("image-{}-{}.{}", stamp, i + 1, image.file_extension()));
            tokio::fs::write(&path, &image.data)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{}", path.display());
        }
        Ok(())
    }

    async fn settings(&mut self, action: SettingsCommand) -> Result<()> {
        match action {
            SettingsCommand::Show => {
                let language = languages::language_name(&self.settings.language)
                    .unwrap_or(self.settings.language.as_str());
                println!("theme:        {}", self.settings.theme.as_str());
                println!("language:     {} ({})", self.settings.language, language);
                println!("text model:   {}", self.settings.text_model);
                println!("image model:  {}", self.settings.image_model);
                println!("imagen model: {}", self.settings.imagen_model);
                return Ok(());
            }
            SettingsCommand::Theme { theme } => self.settings.theme = theme,
            SettingsCommand::Language { code } => {
                if !self.settings.set_language(&code) {
                    bail!("Unsupported language: {}", code);
                }
            }
            SettingsCommand::Model { kind, id } => {
                let id = id.trim().to_string();
                if id.is_empty() {
                    bail!("Model id cannot be empty");
                }
                match kind {
                    ModelKind::Text => self.settings.text_model = id,
                    ModelKind::Image => self.settings.image_model = id,
                    ModelKind::Imagen => self.settings.imagen_model = id,
                }
            }
        }
        SettingsService::save(&self.db, &self.settings).await?;
        tracing::info!("Settings saved");
        Ok(())
    }

    async fn key(&self, action: KeyCommand) -> Result<()> {
        let keyring = self
            .keyring
            .as_ref()
            .context("No keyring available; set GEMINI_API_KEY instead")?;
        match action {
            KeyCommand::Set { key } => {
                let key = match key {
                    Some(key) => key,
                    None => {
                        let mut lines = BufReader::new(tokio::io::stdin()).lines();
                        lines.next_line().await?.unwrap_or_default()
                    }
                };
                let key = key.trim();
                if key.is_empty() {
                    bail!("API key cannot be empty");
                }
                keyring.store_api_key(key).await?;
                println!("API key saved.");
            }
            KeyCommand::Clear => {
                keyring.clear_api_key().await?;
                println!("API key removed.");
            }
        }
        Ok(())
    }

    async fn backup(&self, args: BackupArgs) -> Result<()> {
        let store = DriveBackupStore::new(args.token);
        match args.action {
            BackupCommand::List => {
                for file in store.list().await? {
                    let created = file
                        .created_time
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    println!("{}\t{}\t{}", file.id, created, file.name);
                }
            }
            BackupCommand::Save { no_key } => {
                let api_key = if no_key {
                    None
                } else {
                    resolve_api_key(self.keyring.as_ref())
                        .await
                        .map(|(key, _)| key)
                };
                let history = self.db.load_chat_history().await?;
                let data = backup::snapshot(&self.settings, api_key, history);
                let file = store.save(&data).await?;
                println!("Backup saved: {} ({})", file.name, file.id);
            }
            BackupCommand::Restore { id } => {
                let restored = backup::restore(&store, &id, &self.db).await?;
                if let (Some(key), Some(keyring)) = (&restored.api_key, &self.keyring) {
                    keyring.store_api_key(key).await?;
                }
                println!(
                    "Restored {} messages (theme {}, language {}).",
                    restored.history.len(),
                    restored.settings.theme.as_str(),
                    restored.settings.language
                );
            }
        }
        Ok(())
    }
}

async fn read_image(path: &Path) -> Result<ImageAttachment> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    Ok(ImageAttachment {
        mime_type: ImageAttachment::mime_for_extension(ext).to_string(),
        data,
    })
}
