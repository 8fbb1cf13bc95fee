//! Structural quality heuristic
//!
//! `min(100, words + headings + lists + 35)` where words scores 30 at 80% of
//! the target length (else 15), headings 20 (else 10) and lists 15 (else 5).

/// Fixed base contribution
const BASE_COMPONENT: i32 = 35;

/// Share of the target word count that earns the full length component
const WORD_COUNT_THRESHOLD: f64 = 0.8;

pub fn count_words(text: &str) -> usize {
    text.split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count()
}

/// ATX heading (`#` to `######` then a space) or an HTML `<h1>`..`<h6>`
pub fn has_heading(text: &str) -> bool {
    text.lines().any(|l| {
        let l = l.trim_start();
        let hashes = l.chars().take_while(|&c| c == '#').count();
        if (1..=6).contains(&hashes) && l[hashes..].starts_with(' ') {
            return true;
        }
        l.to_ascii_lowercase()
            .strip_prefix("<h")
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| ('1'..='6').contains(&c))
    })
}

pub fn has_list(text: &str) -> bool {
    text.lines().any(|l| {
        let l = l.trim_start();
        if l.starts_with("- ") || l.starts_with("* ") || l.starts_with("+ ") || l.contains("<li") {
            return true;
        }
        let digits = l.chars().take_while(|c| c.is_ascii_digit()).count();
        digits > 0 && l[digits..].starts_with(". ")
    })
}

pub fn quality_score(content: &str, target_word_count: i32) -> i32 {
    let words = count_words(content) as f64;
    let word_component = if words >= f64::from(target_word_count.max(0)) * WORD_COUNT_THRESHOLD {
        30
    } else {
        15
    };
    let heading_component = if has_heading(content) { 20 } else { 10 };
    let list_component = if has_list(content) { 15 } else { 5 };

    (word_component + heading_component + list_component + BASE_COMPONENT).min(100)
}
