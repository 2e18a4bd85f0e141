use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

macro_rules! labelled_enum {
    ($name:ident { $($variant:ident => ($cli:literal, $label:literal)),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
        pub enum $name {
            $(
                #[value(name = $cli)]
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// Label as it is written into prompts and request configs.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labelled_enum!(ImageStyle {
    Photorealistic => ("photorealistic", "photorealistic"),
    Isometric => ("isometric", "isometric"),
    FlatVector => ("flat-vector", "flat vector"),
    Cinematic => ("cinematic", "cinematic"),
});

labelled_enum!(AspectRatio {
    Square => ("1:1", "1:1"),
    Landscape => ("16:9", "16:9"),
    Portrait => ("9:16", "9:16"),
    Classic => ("4:3", "4:3"),
    ClassicPortrait => ("3:4", "3:4"),
});

labelled_enum!(ImageQuality {
    Standard => ("standard", "standard"),
    High => ("high", "high"),
});

labelled_enum!(WritingTone {
    Professional => ("professional", "Professional"),
    Casual => ("casual", "Casual"),
    Persuasive => ("persuasive", "Persuasive"),
    Informative => ("informative", "Informative"),
    Creative => ("creative", "Creative"),
});

labelled_enum!(WritingFormat {
    BlogPost => ("blog-post", "Blog Post"),
    Email => ("email", "Email"),
    Report => ("report", "Report"),
    SocialMediaPost => ("social-media-post", "Social Media Post"),
    Essay => ("essay", "Essay"),
});

labelled_enum!(WritingLength {
    Short => ("short", "Short (~100 words)"),
    Medium => ("medium", "Medium (~300 words)"),
    Long => ("long", "Long (~500+ words)"),
});

labelled_enum!(CodeLanguage {
    JavaScript => ("javascript", "JavaScript"),
    Python => ("python", "Python"),
    HtmlCss => ("html-css", "HTML/CSS"),
    TypeScript => ("typescript", "TypeScript"),
    Sql => ("sql", "SQL"),
});

impl CodeLanguage {
    /// Info string used on fenced code blocks, e.g. `html` for HTML/CSS.
    pub fn fence_tag(&self) -> String {
        self.as_str()
            .split('/')
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }
}
