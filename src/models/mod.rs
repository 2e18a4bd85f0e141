pub mod backup;
pub mod conversation;
pub mod message;
pub mod options;
pub mod research;
pub mod study_plan;

pub use backup::{BackupData, BackupSettings, DriveFile};
pub use conversation::Conversation;
pub use message::{Message, Role};
pub use options::{
    AspectRatio, CodeLanguage, ImageQuality, ImageStyle, WritingFormat, WritingLength,
    WritingTone,
};
pub use research::{GroundingSource, ResearchResult};
pub use study_plan::StudyPlan;
