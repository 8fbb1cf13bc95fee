//! Prompt construction and output parsing

use crate::providers::{Prompt, PromptKind};
use regex_lite::Regex;

/// Outlines longer than this are truncated
const MAX_OUTLINE_SECTIONS: usize = 20;

const SYSTEM_PROMPT: &str = "You are an experienced editorial writer. Write original, accurate, \
    well-structured content in the voice you are given. Never invent statistics or quotes.";

/// Writing context shared by the outline and draft prompts
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub topic: &'a str,
    pub primary_keyword: Option<&'a str>,
    pub content_type: &'a str,
    pub voice_profile: Option<&'a str>,
    pub target_word_count: i32,
}

impl PromptContext<'_> {
    fn header(&self) -> String {
        let mut header = format!(
            "Topic: {}\nContent type: {}\nTarget length: about {} words\n",
            self.topic, self.content_type, self.target_word_count
        );
        if let Some(keyword) = self.primary_keyword {
            header.push_str(&format!("Primary keyword: {}\n", keyword));
        }
        if let Some(voice) = self.voice_profile {
            header.push_str(&format!("Voice profile: {}\n", voice));
        }
        header
    }
}

pub fn outline_prompt(ctx: &PromptContext<'_>) -> Prompt {
    Prompt {
        kind: PromptKind::Outline,
        system: SYSTEM_PROMPT.to_string(),
        user: format!(
            "{}\nReturn an outline for this piece as a numbered list of section headings, \
            one per line, with no other text.",
            ctx.header()
        ),
    }
}

/// The banned-phrase list is part of the instruction; output is scanned
/// separately with `find_banned_phrases`.
pub fn draft_prompt(ctx: &PromptContext<'_>, outline: &[String], banned_phrases: &[String]) -> Prompt {
    let mut user = ctx.header();
    user.push_str("\nOutline:\n");
    for (i, section) in outline.iter().enumerate() {
        user.push_str(&format!("{}. {}\n", i + 1, section));
    }
    user.push_str(
        "\nWrite the full piece in Markdown. Use a `#` title, `##` section headings \
        following the outline, and at least one bulleted list where it helps the reader.\n",
    );
    if !banned_phrases.is_empty() {
        user.push_str("\nNever use any of these phrases:\n");
        for phrase in banned_phrases {
            user.push_str(&format!("- {}\n", phrase));
        }
    }

    Prompt {
        kind: PromptKind::Draft,
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Strip list markers, numbering and heading hashes from each line
pub fn parse_outline(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            let line = line.trim().trim_start_matches('#').trim();
            let line = line
                .strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .or_else(|| line.strip_prefix("• "))
                .unwrap_or(line);
            let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
            let line = if digits > 0 {
                line[digits..]
                    .strip_prefix('.')
                    .or_else(|| line[digits..].strip_prefix(')'))
                    .unwrap_or(line)
            } else {
                line
            };
            line.trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .take(MAX_OUTLINE_SECTIONS)
        .collect()
}

/// Banned phrases occurring in `text` as whole words, ignoring case
pub fn find_banned_phrases(text: &str, banned_phrases: &[String]) -> Vec<String> {
    banned_phrases
        .iter()
        .filter(|phrase| !phrase.trim().is_empty())
        .filter(|phrase| {
            let pattern = format!(r"(?i)\b{}\b", regex_lite::escape(phrase.trim()));
            match Regex::new(&pattern) {
                Ok(re) => re.is_match(text),
                Err(_) => text.to_lowercase().contains(&phrase.to_lowercase()),
            }
        })
        .cloned()
        .collect()
}

/// First Markdown `#` heading, else `fallback`
pub fn extract_title(content: &str, fallback: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .find_map(|l| l.strip_prefix("# "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PromptContext<'static> {
        PromptContext {
            topic: "Async Rust",
            primary_keyword: Some("tokio"),
            content_type: "blog_post",
            voice_profile: Some("Friendly and direct"),
            target_word_count: 1200,
        }
    }

    #[test]
    fn test_parse_outline_strips_markers() {
        let text = "1. Introduction\n2) Why async\n\n- Runtimes\n## Summary\n   ";
        assert_eq!(
            parse_outline(text),
            vec!["Introduction", "Why async", "Runtimes", "Summary"]
        );
    }

    #[test]
    fn test_draft_prompt_lists_banned_phrases() {
        let outline = vec!["Introduction".to_string()];
        let banned = vec!["game changer".to_string()];
        let prompt = draft_prompt(&ctx(), &outline, &banned);
        assert_eq!(prompt.kind, PromptKind::Draft);
        assert!(prompt.user.contains("1. Introduction"));
        assert!(prompt.user.contains("- game changer"));
        assert!(prompt.user.contains("Primary keyword: tokio"));

        let unrestricted = draft_prompt(&ctx(), &outline, &[]);
        assert!(!unrestricted.user.contains("Never use"));
    }

    #[test]
    fn test_find_banned_phrases_whole_words() {
        let banned = vec!["Delve".to_string(), "game changer".to_string(), " ".to_string()];
        let hits = find_banned_phrases("Let us delve into this. Gameplay matters.", &banned);
        assert_eq!(hits, vec!["Delve".to_string()]);
        assert!(find_banned_phrases("delved deeper", &banned).is_empty());
    }

    #[test]
    fn test_title_and_slug() {
        let content = "Intro line\n# Async Rust: A Field Guide\n\nBody";
        let title = extract_title(content, "fallback");
        assert_eq!(title, "Async Rust: A Field Guide");
        assert_eq!(slugify(&title), "async-rust-a-field-guide");
        assert_eq!(extract_title("no heading", "Topic"), "Topic");
    }
}
