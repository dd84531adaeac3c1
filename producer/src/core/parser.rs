//! Parsing of raw model output into title, tags and content

pub const DEFAULT_TITLE: &str = "Untitled Article";
pub const FALLBACK_TAGS: [&str; 2] = ["blog", "article"];

/// Line prefixes that mark a tag line
const TAG_PREFIXES: [&str; 6] = ["# Tags:", "# 标签：", "**Tags:**", "**标签：**", "Tags:", "标签："];

/// Article fields extracted from a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArticle {
    pub title: String,
    pub tags: Vec<String>,
    pub content: String,
}

/// Split a response into title, tags and body
///
/// The first `# ` heading becomes the title and tag lines are removed from
/// the body. The body is re-headed with the title.
pub fn parse_article(raw: &str) -> ParsedArticle {
    let mut title = String::new();
    let mut tags: Vec<String> = Vec::new();
    let mut body: Vec<&str> = Vec::new();

    for line in raw.trim().lines() {
        let stripped = line.trim();

        if let Some(rest) = tag_line_rest(stripped) {
            tags.extend(split_tag_line(rest));
            continue;
        }

        if title.is_empty() {
            if let Some(heading) = stripped.strip_prefix("# ") {
                title = heading.trim().to_string();
                continue;
            }
        }

        body.push(line);
    }

    if tags.is_empty() && raw.contains("##") {
        tags = fallback_tags(&title);
    }

    let first_filled = body.iter().position(|line| !line.trim().is_empty()).unwrap_or(body.len());
    let mut content = body[first_filled..].join("\n");
    if !title.is_empty() {
        content = format!("# {}\n\n{}", title, content);
    }

    if title.is_empty() {
        title = DEFAULT_TITLE.to_string();
    }
    if tags.is_empty() {
        tags = FALLBACK_TAGS.iter().map(|tag| tag.to_string()).collect();
    }

    ParsedArticle { title, tags, content }
}

fn tag_line_rest(line: &str) -> Option<&str> {
    TAG_PREFIXES
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix))
        .map(str::trim)
}

fn split_tag_line(rest: &str) -> impl Iterator<Item = String> + '_ {
    rest.split([',', '，'])
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
}

/// First two title words (or the whole title) plus the generic tags
fn fallback_tags(title: &str) -> Vec<String> {
    let words: Vec<&str> = title.split_whitespace().collect();
    let mut tags: Vec<String> = if words.len() >= 2 {
        words[..2].iter().map(|word| word.to_string()).collect()
    } else if !title.trim().is_empty() {
        vec![title.trim().to_string()]
    } else {
        Vec::new()
    };
    tags.extend(FALLBACK_TAGS.iter().map(|tag| tag.to_string()));
    tags
}
