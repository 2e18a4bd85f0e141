use crate::models::{CodeLanguage, ImageStyle, WritingFormat, WritingLength, WritingTone};

pub fn chat_system_prompt(lang: &str) -> String {
    format!("You are a helpful, clever, and friendly AI assistant.{}", lang)
}

pub fn write_prompt(
    prompt: &str,
    tone: WritingTone,
    format: WritingFormat,
    length: WritingLength,
    lang: &str,
) -> String {
    format!(
        "You are an expert writer. Tone: {}. Format: {}. Length: {}.{}\n\nTask: {}",
        tone, format, length, lang, prompt
    )
}

pub fn code_prompt(
    prompt: &str,
    language: CodeLanguage,
    existing_code: Option<&str>,
    lang: &str,
) -> String {
    let system = format!(
        "You are an expert developer specializing in {}.{}",
        language, lang
    );

    let task = match existing_code {
        Some(code) => format!(
            "EDIT the provided code. USER REQUEST: {}\n\nEXISTING CODE:\n```{}\n{}\n```",
            prompt,
            language.fence_tag(),
            code
        ),
        None if language == CodeLanguage::HtmlCss => format!(
            "GENERATE a single, self-contained HTML file. USER REQUEST: {}\n\
             Include all CSS within a single <style> tag in the <head> and all JavaScript \
             within a single <script> tag at the end of the <body>. Do not use external \
             libraries or assets unless asked.",
            prompt
        ),
        None => format!("GENERATE new code from scratch. USER REQUEST: {}", prompt),
    };

    format!(
        "{}\n\n{}\n\nProvide ONLY the code, wrapped in a single ```{} block.",
        system,
        task,
        language.fence_tag()
    )
}

pub fn image_prompt(prompt: &str, style: ImageStyle) -> String {
    format!(
        "{} in {} style. Highly detailed and professional quality.",
        prompt, style
    )
}

pub fn imagen_prompt(prompt: &str, style: ImageStyle) -> String {
    format!("{}, {} style", prompt, style)
}

pub fn research_prompt(query: &str, lang: &str) -> String {
    format!(
        "Research the following query in detail: \"{}\". Provide a comprehensive summary.{}",
        query, lang
    )
}

pub fn enhance_prompt(prompt: &str, lang: &str) -> String {
    format!(
        "Improve this prompt to be more detailed: \"{}\". Return ONLY the enhanced text.{}",
        prompt, lang
    )
}

pub fn study_plan_prompt(topic: &str, lang: &str) -> String {
    format!(
        "Create a detailed, week-by-week study plan for someone wanting to learn about \"{}\". \
         The plan should span a reasonable number of weeks (e.g., 4-8 weeks) and for each week, \
         include a main theme and specific topics to cover. For each topic, provide a brief \
         description and suggest 1-2 online resources (like articles, videos, or tutorials) \
         with their URLs.{}",
        topic, lang
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_prompt_carries_options() {
        let p = write_prompt(
            "launch notes",
            WritingTone::Casual,
            WritingFormat::Email,
            WritingLength::Short,
            "",
        );
        assert!(p.starts_with("You are an expert writer. Tone: Casual. Format: Email."));
        assert!(p.ends_with("Task: launch notes"));
    }

    #[test]
    fn test_code_prompt_edit_mode_embeds_code() {
        let p = code_prompt(
            "rename x",
            CodeLanguage::Python,
            Some("x = 1"),
            " Please provide the response in Deutsch.",
        );
        assert!(p.contains("EDIT the provided code"));
        assert!(p.contains("```python\nx = 1\n```"));
        assert!(p.contains("Deutsch"));
    }

    #[test]
    fn test_code_prompt_html_is_self_contained() {
        let p = code_prompt("a clock", CodeLanguage::HtmlCss, None, "");
        assert!(p.contains("self-contained HTML"));
        assert!(p.ends_with("```html block."));
    }

    #[test]
    fn test_image_prompts() {
        assert_eq!(
            image_prompt("a fox", ImageStyle::FlatVector),
            "a fox in flat vector style. Highly detailed and professional quality."
        );
        assert_eq!(imagen_prompt("a fox", ImageStyle::Cinematic), "a fox, cinematic style");
    }
}
