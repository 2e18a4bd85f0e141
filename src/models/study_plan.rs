use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlan {
    pub learning_topic: String,
    pub duration_weeks: u32,
    pub weekly_breakdown: Vec<StudyPlanWeek>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPlanWeek {
    pub week: u32,
    pub title: String,
    #[serde(default)]
    pub topics: Vec<StudyPlanTopic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPlanTopic {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub resources: Vec<StudyPlanResource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPlanResource {
    pub description: String,
    pub url: String,
}

impl StudyPlan {
    /// JSON schema handed to the model as `responseSchema`.
    pub fn response_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "OBJECT",
            "properties": {
                "learningTopic": { "type": "STRING" },
                "durationWeeks": { "type": "INTEGER" },
                "weeklyBreakdown": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "week": { "type": "INTEGER" },
                            "title": { "type": "STRING" },
                            "topics": {
                                "type": "ARRAY",
                                "items": {
                                    "type": "OBJECT",
                                    "properties": {
                                        "title": { "type": "STRING" },
                                        "description": { "type": "STRING" },
                                        "resources": {
                                            "type": "ARRAY",
                                            "items": {
                                                "type": "OBJECT",
                                                "properties": {
                                                    "description": { "type": "STRING" },
                                                    "url": { "type": "STRING" }
                                                },
                                                "required": ["description", "url"]
                                            }
                                        }
                                    },
                                    "required": ["title", "description", "resources"]
                                }
                            }
                        },
                        "required": ["week", "title", "topics"]
                    }
                }
            },
            "required": ["learningTopic", "durationWeeks", "weeklyBreakdown"]
        })
    }
}
