use crate::models::{Conversation, ResearchResult, Role, StudyPlan};

pub fn export_conversation(conversation: &Conversation) -> String {
    let mut output = String::from("# Chat\n\n");
    output.push_str(&format!(
        "> Date: {} | Messages: {}\n\n",
        conversation.created_at.format("%Y-%m-%d %H:%M"),
        conversation.len()
    ));
    output.push_str("---\n\n");

    for msg in &conversation.messages {
        let role_label = match msg.role {
            Role::User => "You",
            Role::Assistant => "Assistant",
        };
        output.push_str(&format!("### {}\n\n{}\n\n", role_label, msg.content));
    }

    output
}

pub fn export_research(query: &str, result: &ResearchResult) -> String {
    let mut output = format!("# Research: {}\n\n{}\n", query.trim(), result.summary.trim_end());

    if !result.sources.is_empty() {
        output.push_str("\n## Sources\n\n");
        for (i, source) in result.sources.iter().enumerate() {
            output.push_str(&format!("{}. [{}]({})\n", i + 1, source.title, source.uri));
        }
    }

    output
}

pub fn export_study_plan(plan: &StudyPlan) -> String {
    let mut output = format!(
        "# Study Plan: {}\n\n> Duration: {} weeks\n",
        plan.learning_topic, plan.duration_weeks
    );

    for week in &plan.weekly_breakdown {
        output.push_str(&format!("\n## Week {}: {}\n", week.week, week.title));
        for topic in &week.topics {
            output.push_str(&format!("\n### {}\n", topic.title));
            if !topic.description.is_empty() {
                output.push_str(&format!("\n{}\n", topic.description));
            }
            if !topic.resources.is_empty() {
                output.push('\n');
                for resource in &topic.resources {
                    output.push_str(&format!("- [{}]({})\n", resource.description, resource.url));
                }
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::study_plan::{StudyPlanResource, StudyPlanTopic, StudyPlanWeek};
    use crate::models::{GroundingSource, Message};

    #[test]
    fn test_conversation_labels_roles() {
        let conversation = Conversation::with_messages(vec![
            Message::user("What is Rust?"),
            Message::assistant("A systems language."),
        ]);
        let md = export_conversation(&conversation);
        assert!(md.contains("Messages: 2"));
        assert!(md.contains("### You\n\nWhat is Rust?"));
        assert!(md.contains("### Assistant\n\nA systems language."));
    }

    #[test]
    fn test_research_numbers_sources() {
        let result = ResearchResult {
            summary: "Summary text.".into(),
            sources: vec![
                GroundingSource {
                    uri: "https://a.example".into(),
                    title: "A".into(),
                },
                GroundingSource {
                    uri: "https://b.example".into(),
                    title: "B".into(),
                },
            ],
        };
        let md = export_research(" tides ", &result);
        assert!(md.starts_with("# Research: tides\n\nSummary text.\n"));
        assert!(md.contains("1. [A](https://a.example)\n2. [B](https://b.example)\n"));
    }

    #[test]
    fn test_research_without_sources_has_no_section() {
        let result = ResearchResult {
            summary: "Only text".into(),
            sources: vec![],
        };
        assert!(!export_research("q", &result).contains("## Sources"));
    }

    #[test]
    fn test_study_plan_outline() {
        let plan = StudyPlan {
            learning_topic: "Linear algebra".into(),
            duration_weeks: 1,
            weekly_breakdown: vec![StudyPlanWeek {
                week: 1,
                title: "Vectors".into(),
                topics: vec![StudyPlanTopic {
                    title: "Dot product".into(),
                    description: "Projection and angles.".into(),
                    resources: vec![StudyPlanResource {
                        description: "Lecture".into(),
                        url: "https://example.com/dot".into(),
                    }],
                }],
            }],
        };
        let md = export_study_plan(&plan);
        assert!(md.starts_with("# Study Plan: Linear algebra\n\n> Duration: 1 weeks\n"));
        assert!(md.contains("## Week 1: Vectors"));
        assert!(md.contains("### Dot product\n\nProjection and angles.\n"));
        assert!(md.contains("- [Lecture](https://example.com/dot)"));
    }
}
