//! Response parser
//!
//! Turns a final assistant message into a [`PlanningQuestion`]. Parsing is
//! total: input that does not follow the expected layout ends up in
//! `body_text` rather than failing.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}#{1,6}\s+(.+?)\s*#*\s*$").expect("header regex should compile"));
static OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)[.)]\s+\*\*(.+?)\*\*(.*)$").expect("option regex should compile"));
static BOLD_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\*\*(.+?)\*\*\s*:?\s*$").expect("bold line regex should compile"));
static RECOMMENDED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\(recommended\)|\[recommended\]|⭐").expect("recommended marker regex should compile")
});

/// A question posed to the user, possibly with numbered options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningQuestion {
    pub header: String,
    pub body_text: String,
    pub option_prompt: Option<String>,
    pub options: Vec<QuestionOption>,
}

/// One numbered option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    /// Number as written in the list
    pub id: String,
    pub title: String,
    pub description: String,
    pub recommended: bool,
}

impl PlanningQuestion {
    /// Question with body text only
    pub fn plain(body_text: impl Into<String>) -> Self {
        Self {
            body_text: body_text.into(),
            ..Default::default()
        }
    }

    pub fn recommended(&self) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.recommended)
    }

    /// Map a reply onto an option title when it names an option by number
    pub fn resolve_reply(&self, reply: &str) -> String {
        let trimmed = reply.trim();
        self.options
            .iter()
            .find(|o| o.id == trimmed)
            .map(|o| o.title.clone())
            .unwrap_or_else(|| trimmed.to_string())
    }

    /// Mark at most one option recommended, defaulting to the first
    pub(crate) fn normalize_recommendation(&mut self) {
        let mut seen = false;
        for option in &mut self.options {
            if option.recommended && !seen {
                seen = true;
            } else {
                option.recommended = false;
            }
        }
        if !seen && let Some(first) = self.options.first_mut() {
            first.recommended = true;
        }
    }
}

/// Strip any recommendation marker, reporting whether one was present
fn take_marker(text: &str) -> (String, bool) {
    match RECOMMENDED.find(text) {
        Some(m) => {
            let mut out = String::with_capacity(text.len());
            out.push_str(&text[..m.start()]);
            out.push_str(&text[m.end()..]);
            (out.trim().to_string(), true)
        }
        None => (text.trim().to_string(), false),
    }
}

fn clean_description(rest: &str) -> String {
    rest.trim()
        .trim_start_matches(['-', ':', '–', '—'])
        .trim()
        .to_string()
}

fn join_trimmed(lines: &[&str]) -> String {
    lines.join("\n").trim().to_string()
}

/// Parse a final assistant message
pub fn parse(text: &str) -> PlanningQuestion {
    debug!(len = %text.len(), "parse: called");
    let lines: Vec<&str> = text.lines().collect();

    // Only a leading header counts; later ones stay in the text
    let header_idx = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .filter(|&i| HEADER.is_match(lines[i]));
    let header = header_idx
        .and_then(|i| HEADER.captures(lines[i]))
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();
    let start = header_idx.map_or(0, |i| i + 1);

    let Some(first_option) = (start..lines.len()).find(|&i| OPTION.is_match(lines[i])) else {
        return PlanningQuestion {
            header,
            body_text: join_trimmed(&lines[start..]),
            option_prompt: None,
            options: Vec::new(),
        };
    };

    // A bold line right before the list is the option prompt
    let mut body_end = first_option;
    let mut option_prompt = None;
    if let Some(prev) = (start..first_option).rev().find(|&i| !lines[i].trim().is_empty())
        && let Some(caps) = BOLD_LINE.captures(lines[prev])
    {
        option_prompt = Some(caps[1].trim().to_string());
        body_end = prev;
    }

    let mut options: Vec<QuestionOption> = Vec::new();
    let mut trailing: Vec<&str> = Vec::new();
    let mut in_list = true;
    for &line in &lines[first_option..] {
        if !in_list {
            trailing.push(line);
            continue;
        }
        if let Some(caps) = OPTION.captures(line) {
            let (title, title_marked) = take_marker(&caps[2]);
            let (description, desc_marked) = take_marker(&caps[3]);
            let description = clean_description(&description);
            options.push(QuestionOption {
                id: caps[1].to_string(),
                title,
                description,
                recommended: title_marked || desc_marked,
            });
        } else if line.trim().is_empty() {
            continue;
        } else if line.starts_with([' ', '\t'])
            && let Some(last) = options.last_mut()
        {
            let (extra, marked) = take_marker(line);
            if !last.description.is_empty() {
                last.description.push('\n');
            }
            last.description.push_str(&extra);
            last.recommended |= marked;
        } else {
            in_list = false;
            trailing.push(line);
        }
    }

    let mut body_text = join_trimmed(&lines[start..body_end]);
    let trailing = join_trimmed(&trailing);
    if !trailing.is_empty() {
        if !body_text.is_empty() {
            body_text.push_str("\n\n");
        }
        body_text.push_str(&trailing);
    }

    let mut question = PlanningQuestion {
        header,
        body_text,
        option_prompt,
        options,
    };
    question.normalize_recommendation();
    question
}

#[cfg(test)]
mod tests {
    use super::*;

    const DARK_MODE: &str = "\
## Theme storage

Dark mode needs somewhere to keep the user's choice.

**Where should the theme preference live?**

1. **Local storage** - survives reloads, per browser
2. **User profile** - syncs across devices
3. **System preference only** - no storage at all
";

    #[test]
    fn test_parse_header_body_prompt_and_options() {
        let q = parse(DARK_MODE);
        assert_eq!(q.header, "Theme storage");
        assert_eq!(q.body_text, "Dark mode needs somewhere to keep the user's choice.");
        assert_eq!(q.option_prompt.as_deref(), Some("Where should the theme preference live?"));
        assert_eq!(q.options.len(), 3);
        assert_eq!(q.options[1].title, "User profile");
        assert_eq!(q.options[1].description, "syncs across devices");
        assert!(q.options[0].recommended);
        assert!(!q.options[1].recommended);
    }

    #[test]
    fn test_explicit_marker_wins() {
        let text = "# Q\n\n1. **A** - first\n2. **B** (recommended) - second\n3. **C** ⭐\n";
        let q = parse(text);
        assert_eq!(q.options[1].title, "B");
        assert_eq!(q.options[1].description, "second");
        assert!(q.options[1].recommended);
        assert!(!q.options[0].recommended);
        assert!(!q.options[2].recommended);
        assert_eq!(q.options[2].title, "C");
    }

    #[test]
    fn test_indented_continuation_joins_description() {
        let text = "# Q\n1. **A**\n   spans two\n   lines\n2. **B**\n\nAnything else?";
        let q = parse(text);
        assert_eq!(q.options[0].description, "spans two\nlines");
        assert_eq!(q.body_text, "Anything else?");
    }

    #[test]
    fn test_plain_text_is_all_body() {
        let q = parse("Could you say more about the users?");
        assert_eq!(q.header, "");
        assert_eq!(q.body_text, "Could you say more about the users?");
        assert!(q.options.is_empty());
        assert!(q.option_prompt.is_none());
    }

    #[test]
    fn test_numbered_list_without_bold_is_body() {
        let q = parse("# Steps\n1. first\n2. second");
        assert!(q.options.is_empty());
        assert_eq!(q.body_text, "1. first\n2. second");
    }

    #[test]
    fn test_text_before_a_later_header_is_kept() {
        let q = parse("Thanks, that settles storage.\n\n# Theme scope\n\nNext question.\n");
        assert_eq!(q.header, "");
        assert_eq!(q.body_text, "Thanks, that settles storage.\n\n# Theme scope\n\nNext question.");
    }

    #[test]
    fn test_options_before_trailing_header_are_parsed() {
        let q = parse("**Which?**\n\n1. **A** - a\n2. **B** - b\n\n## Notes\n\nmore\n");
        assert_eq!(q.header, "");
        assert_eq!(q.option_prompt.as_deref(), Some("Which?"));
        assert_eq!(q.options.len(), 2);
        assert_eq!(q.options[1].title, "B");
        assert_eq!(q.body_text, "## Notes\n\nmore");
    }

    #[test]
    fn test_resolve_reply() {
        let q = parse(DARK_MODE);
        assert_eq!(q.resolve_reply(" 2 "), "User profile");
        assert_eq!(q.resolve_reply("9"), "9");
        assert_eq!(q.resolve_reply("cookies please"), "cookies please");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_is_total_and_deterministic(text in "(?s).{0,400}") {
                let a = parse(&text);
                let b = parse(&text);
                prop_assert_eq!(&a, &b);
            }

            #[test]
            fn at_most_one_recommended(titles in proptest::collection::vec("[a-z]{1,8}", 0..6),
                                       marked in proptest::collection::vec(any::<bool>(), 6)) {
                let mut text = String::from("# Choose\n\n");
                for (i, title) in titles.iter().enumerate() {
                    let marker = if marked[i] { " (recommended)" } else { "" };
                    text.push_str(&format!("{}. **{}**{} - option\n", i + 1, title, marker));
                }
                let q = parse(&text);
                prop_assert_eq!(q.options.len(), titles.len());
                let count = q.options.iter().filter(|o| o.recommended).count();
                prop_assert_eq!(count, usize::from(!titles.is_empty()));
            }
        }
    }
}
