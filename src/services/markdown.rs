use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
}

/// All fenced code blocks in `input`, in document order.
pub fn code_blocks(input: &str) -> Vec<CodeBlock> {
    let parser = Parser::new_ext(input, Options::ENABLE_TABLES);

    let mut blocks = Vec::new();
    let mut current: Option<CodeBlock> = None;

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(lang))) => {
                let lang = lang.trim().to_string();
                current = Some(CodeBlock {
                    language: (!lang.is_empty()).then_some(lang),
                    code: String::new(),
                });
            }
            Event::Text(text) => {
                if let Some(block) = current.as_mut() {
                    block.code.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(mut block) = current.take() {
                    // Trim trailing newline
                    if block.code.ends_with('\n') {
                        block.code.pop();
                    }
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }

    blocks
}

/// The code a build request produced: the first fenced block, or the whole
/// response when the model skipped the fence.
pub fn extract_code(input: &str) -> String {
    code_blocks(input)
        .into_iter()
        .next()
        .map(|b| b.code)
        .unwrap_or_else(|| input.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_block_wins() {
        let text = "Here:\n```python\nprint(1)\n```\nand\n```js\nconsole.log(2)\n```";
        let blocks = code_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].language.as_deref(), Some("python"));
        assert_eq!(extract_code(text), "print(1)");
    }

    #[test]
    fn test_no_fence_falls_back_to_text() {
        assert_eq!(extract_code("  SELECT 1;\n"), "SELECT 1;");
    }

    #[test]
    fn test_fence_without_language() {
        let blocks = code_blocks("```\n<html></html>\n```");
        assert_eq!(
            blocks,
            vec![CodeBlock {
                language: None,
                code: "<html></html>".to_string()
            }]
        );
    }

    #[test]
    fn test_indented_code_is_not_a_fence() {
        assert!(code_blocks("para\n\n    indented code\n").is_empty());
    }
}
