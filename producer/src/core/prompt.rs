//! Prompt construction for article requests

/// Length hint that asks for the longest article
pub const MAX_LENGTH_HINT: &str = "Max";

/// Character count used when the hint is `Max`
pub const MAX_LENGTH_CHARS: &str = "6000";

/// System message describing the expected Markdown layout
pub const SYSTEM_PROMPT: &str = r#"You are a senior editor. Using the topic tags the user provides, write a blog article in Markdown. Requirements:
1. Title: compelling and precisely on topic
2. Structure: clear logic and distinct core sections (second-level headings), with substantial content backed by practical information, examples or opinions
3. Style: adapt to the topic (rigorous for technology, warm for lifestyle), fluent and easy to read
4. Ending: optionally close with a summary or an invitation to comment

The output must follow this layout exactly:
# Article Title

# Tags: {tags}

## Section 1: [Section title 1]
[Section 1 content, specific and detailed]

## Section 2: [Section title 2]
[Section 2 content, continuing the previous section]

## Section 3: [Section title 3]
[Section 3 content, extending the topic or comparing solutions]

(Add or remove sections as needed, with no fewer than 3 core sections)
"#;

/// Human-readable length instruction for a hint
pub fn length_instruction(length_hint: &str) -> String {
    let chars = if length_hint == MAX_LENGTH_HINT {
        MAX_LENGTH_CHARS
    } else {
        length_hint
    };
    format!("about {} characters or fewer", chars)
}

/// User message carrying the composite seed and length instruction
pub fn build_user_prompt(seed: &str, length_hint: &str) -> String {
    format!(
        "Candidate topics: {}\nArticle length: {}\nPick one or several of the topics and write the article around them, keeping within the requested length.\n",
        seed,
        length_instruction(length_hint)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_hint_uses_upper_bound() {
        assert_eq!(length_instruction("Max"), "about 6000 characters or fewer");
        assert_eq!(length_instruction("1500"), "about 1500 characters or fewer");
    }

    #[test]
    fn test_user_prompt_contains_seed() {
        let prompt = build_user_prompt("travel, Paris, Rome", "3000");
        assert!(prompt.contains("Candidate topics: travel, Paris, Rome"));
        assert!(prompt.contains("about 3000 characters"));
    }
}
