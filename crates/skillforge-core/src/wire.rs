//! Completion wire format: delimiter split and file-block grammar.
//!
//! Every completion the generation engine consumes has the shape
//!
//! ```text
//! <conversational message, one or two sentences>
//! ---SKILL_START---
//! ===FILE: SKILL.md===
//! <content>
//! ===FILE: scripts/check.sh===
//! <content>
//! ===END_FILES===
//! ```
//!
//! Parsing is total and prefix-safe: it never fails, it may be called on
//! any prefix of an in-flight stream, and missing structure degrades to a
//! coarser but valid result (whole response as message, or whole remainder
//! as a single `SKILL.md`) rather than erroring.

use crate::artifact::{ParsedResponse, SkillFile, SKILL_FILE_NAME};
use std::collections::HashSet;

/// Separates the conversational message from the file package.
pub const SKILL_DELIMITER: &str = "---SKILL_START---";

/// Opens a file block: `===FILE: <relative/path>===`.
pub const FILE_MARKER_PREFIX: &str = "===FILE:";

/// Explicitly terminates the file package. Optional: the next `===FILE:`
/// marker or end of stream also closes a block.
pub const END_FILES_MARKER: &str = "===END_FILES===";

/// Splits a raw completion at the first delimiter occurrence.
///
/// Returns the message part and, when the delimiter has arrived, the
/// package part. Safe to call on any stream prefix: before the delimiter
/// shows up the whole text is the message.
pub fn split_message(raw: &str) -> (&str, Option<&str>) {
    match raw.find(SKILL_DELIMITER) {
        Some(at) => {
            let message = &raw[..at];
            let package = &raw[at + SKILL_DELIMITER.len()..];
            (message, Some(package))
        }
        None => (raw, None),
    }
}

/// Parses a complete (or partial) completion into message + files.
///
/// - No delimiter: the entire output is treated as single-document file
///   content (message stays empty), never discarded.
/// - No file markers after the delimiter: the remainder becomes one
///   implicit `SKILL.md`.
/// - A missing trailing `===END_FILES===` is fine; end of input closes the
///   last block.
pub fn parse_completion(raw: &str) -> ParsedResponse {
    match split_message(raw) {
        (message, Some(package)) => ParsedResponse {
            message: message.trim().to_string(),
            files: parse_package(package),
        },
        (whole, None) => {
            let content = whole.trim();
            let files = if content.is_empty() {
                Vec::new()
            } else {
                vec![SkillFile::new(SKILL_FILE_NAME, content)]
            };
            ParsedResponse {
                message: String::new(),
                files,
            }
        }
    }
}

/// Tokenizes the post-delimiter package text into files.
pub fn parse_package(package: &str) -> Vec<SkillFile> {
    let mut files: Vec<SkillFile> = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    let mut preamble: Vec<&str> = Vec::new();
    let mut saw_file_marker = false;

    for line in package.lines() {
        let trimmed = line.trim();
        if trimmed == END_FILES_MARKER {
            // Anything after the explicit terminator is ambiguous trailing
            // content and is not part of any file.
            break;
        }
        if let Some(path) = parse_file_marker(trimmed) {
            saw_file_marker = true;
            if let Some((prev_path, lines)) = current.take() {
                files.push(SkillFile::new(prev_path, join_block(&lines)));
            }
            current = Some((path, Vec::new()));
            continue;
        }
        match current.as_mut() {
            Some((_, lines)) => lines.push(line),
            None => preamble.push(line),
        }
    }

    if let Some((path, lines)) = current.take() {
        files.push(SkillFile::new(path, join_block(&lines)));
    }

    if !saw_file_marker {
        let content = join_block(&preamble);
        if content.trim().is_empty() {
            return Vec::new();
        }
        return vec![SkillFile::new(SKILL_FILE_NAME, content.trim().to_string())];
    }

    dedup_last_wins(files)
}

/// Encodes a file set into the file-block grammar, terminated by the
/// explicit `===END_FILES===` marker.
pub fn encode_package(files: &[SkillFile]) -> String {
    let mut out = String::new();
    for file in files {
        out.push_str(FILE_MARKER_PREFIX);
        out.push(' ');
        out.push_str(&file.path);
        out.push_str("===\n");
        out.push_str(&file.content);
        if !file.content.ends_with('\n') {
            out.push('\n');
        }
    }
    out.push_str(END_FILES_MARKER);
    out.push('\n');
    out
}

/// Encodes a full completion: message, delimiter line, file package.
pub fn encode_completion(message: &str, files: &[SkillFile]) -> String {
    format!(
        "{}\n{}\n{}",
        message.trim(),
        SKILL_DELIMITER,
        encode_package(files)
    )
}

/// Detects a bracketed placeholder standing in for a supplied config
/// value, e.g. `[website_url]`, `{{website_url}}` or `<your website url>`.
///
/// The generation instructions forbid placeholders once a value has been
/// collected; a surviving one is a prompting defect the caller may warn
/// about, never a structural failure.
pub fn contains_placeholder(content: &str, field_id: &str) -> bool {
    let content_lower = content.to_lowercase();
    let id = field_id.to_lowercase();
    let spellings = [
        id.clone(),
        id.replace('_', " "),
        id.replace('_', "-"),
        format!("your {}", id.replace('_', " ")),
    ];
    for spelling in &spellings {
        for (open, close) in [("[", "]"), ("{{", "}}"), ("{", "}"), ("<", ">")] {
            if content_lower.contains(&format!("{}{}{}", open, spelling, close)) {
                return true;
            }
        }
    }
    false
}

fn parse_file_marker(trimmed_line: &str) -> Option<String> {
    let rest = trimmed_line.strip_prefix(FILE_MARKER_PREFIX)?;
    let inner = rest.strip_suffix("===")?;
    let path = inner.trim().replace('\\', "/");
    if path.is_empty() {
        // Marker with no path still opens a block; degrade to SKILL.md.
        return Some(SKILL_FILE_NAME.to_string());
    }
    Some(path)
}

/// Joins block lines, dropping the blank lines the encoder (or the model)
/// puts around content, but preserving interior structure.
fn join_block(lines: &[&str]) -> String {
    let mut start = 0;
    let mut end = lines.len();
    while start < end && lines[start].trim().is_empty() {
        start += 1;
    }
    while end > start && lines[end - 1].trim().is_empty() {
        end -= 1;
    }
    lines[start..end].join("\n")
}

/// Keeps the last block for a repeated path, preserving first-seen order.
fn dedup_last_wins(files: Vec<SkillFile>) -> Vec<SkillFile> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept: Vec<SkillFile> = Vec::new();
    for file in files.into_iter().rev() {
        if seen.insert(file.path.clone()) {
            kept.push(file);
        }
    }
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion_with_two_files() -> String {
        [
            "Here is your skill.",
            SKILL_DELIMITER,
            "===FILE: SKILL.md===",
            "# Watcher",
            "",
            "Watch https://example.com for changes.",
            "===FILE: scripts/check.sh===",
            "#!/bin/sh",
            "curl -s https://example.com",
            END_FILES_MARKER,
        ]
        .join("\n")
    }

    #[test]
    fn test_parse_two_files() {
        let parsed = parse_completion(&completion_with_two_files());
        assert_eq!(parsed.message, "Here is your skill.");
        assert_eq!(parsed.files.len(), 2);
        assert_eq!(parsed.files[0].path, "SKILL.md");
        assert!(parsed.files[0].content.contains("Watch https://example.com"));
        assert_eq!(parsed.files[1].path, "scripts/check.sh");
        assert_eq!(
            parsed.files[1].content,
            "#!/bin/sh\ncurl -s https://example.com"
        );
    }

    #[test]
    fn test_parse_idempotent() {
        // P1: parsing the same string twice yields identical results.
        let raw = completion_with_two_files();
        assert_eq!(parse_completion(&raw), parse_completion(&raw));
    }

    #[test]
    fn test_progressive_arrival_equals_whole() {
        // P1: parsing the concatenation of two halves at the final token
        // equals parsing the whole string at once.
        let raw = completion_with_two_files();
        for split_at in [1, raw.len() / 3, raw.len() / 2, raw.len() - 1] {
            let mut accumulated = String::new();
            accumulated.push_str(&raw[..split_at]);
            accumulated.push_str(&raw[split_at..]);
            assert_eq!(parse_completion(&accumulated), parse_completion(&raw));
        }
    }

    #[test]
    fn test_prefix_parse_never_panics() {
        let raw = completion_with_two_files();
        for (i, _) in raw.char_indices() {
            let _ = parse_completion(&raw[..i]);
        }
    }

    #[test]
    fn test_no_delimiter_degrades_to_single_document() {
        // P2: no delimiter means the whole output is the file content.
        let raw = "# A skill without any framing\n\nJust instructions.";
        let parsed = parse_completion(raw);
        assert_eq!(parsed.message, "");
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].path, SKILL_FILE_NAME);
        assert_eq!(parsed.files[0].content, raw.trim());
    }

    #[test]
    fn test_no_markers_degrades_to_implicit_skill_md() {
        let raw = format!("Sounds good.\n{}\n# Just markdown\n\nBody.", SKILL_DELIMITER);
        let parsed = parse_completion(&raw);
        assert_eq!(parsed.message, "Sounds good.");
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].path, SKILL_FILE_NAME);
        assert_eq!(parsed.files[0].content, "# Just markdown\n\nBody.");
    }

    #[test]
    fn test_missing_end_marker_closes_at_eof() {
        let raw = format!(
            "Done.\n{}\n===FILE: SKILL.md===\nUnterminated content",
            SKILL_DELIMITER
        );
        let parsed = parse_completion(&raw);
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].content, "Unterminated content");
    }

    #[test]
    fn test_empty_package_yields_no_files() {
        let raw = format!("Let me ask a question first.\n{}\n   \n", SKILL_DELIMITER);
        let parsed = parse_completion(&raw);
        assert_eq!(parsed.message, "Let me ask a question first.");
        assert!(parsed.files.is_empty());
    }

    #[test]
    fn test_triple_equals_in_content_is_ordinary() {
        // P3 corner: "===" that does not match a marker line stays content.
        let files = vec![SkillFile::new(
            "SKILL.md",
            "Header\n===\nA line with === inside\nfoo === bar",
        )];
        let parsed = parse_completion(&encode_completion("ok", &files));
        assert_eq!(parsed.files, files);
    }

    #[test]
    fn test_round_trip() {
        // P3: encode-then-parse returns the original set, 0..N files.
        let cases: Vec<Vec<SkillFile>> = vec![
            vec![],
            vec![SkillFile::new("SKILL.md", "# Only file")],
            vec![
                SkillFile::new("SKILL.md", "# Main"),
                SkillFile::new("config/settings.toml", "interval = 30"),
                SkillFile::new("scripts/run.sh", "#!/bin/sh\necho run"),
            ],
        ];
        for files in cases {
            let encoded = encode_completion("A message.", &files);
            let parsed = parse_completion(&encoded);
            assert_eq!(parsed.message, "A message.");
            assert_eq!(parsed.files, files);
        }
    }

    #[test]
    fn test_duplicate_path_last_wins() {
        let raw = format!(
            "m\n{}\n===FILE: SKILL.md===\nold\n===FILE: SKILL.md===\nnew\n{}",
            SKILL_DELIMITER, END_FILES_MARKER
        );
        let parsed = parse_completion(&raw);
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].content, "new");
    }

    #[test]
    fn test_content_after_end_marker_ignored() {
        let raw = format!(
            "m\n{}\n===FILE: SKILL.md===\nbody\n{}\ntrailing chatter",
            SKILL_DELIMITER, END_FILES_MARKER
        );
        let parsed = parse_completion(&raw);
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].content, "body");
    }

    #[test]
    fn test_unmarked_text_before_end_marker_becomes_implicit_file() {
        let raw = format!(
            "m\n{}\n# No file markers here\n\nJust text.\n{}",
            SKILL_DELIMITER, END_FILES_MARKER
        );
        let parsed = parse_completion(&raw);
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].path, SKILL_FILE_NAME);
        assert_eq!(parsed.files[0].content, "# No file markers here\n\nJust text.");
    }

    #[test]
    fn test_marker_path_normalization() {
        let raw = format!(
            "m\n{}\n===FILE:  scripts\\helper.py ===\nprint('hi')\n{}",
            SKILL_DELIMITER, END_FILES_MARKER
        );
        let parsed = parse_completion(&raw);
        assert_eq!(parsed.files[0].path, "scripts/helper.py");
    }

    #[test]
    fn test_split_message_before_delimiter() {
        let (message, package) = split_message("Still thinking");
        assert_eq!(message, "Still thinking");
        assert!(package.is_none());
    }

    #[test]
    fn test_contains_placeholder() {
        assert!(contains_placeholder("Visit [website_url] daily", "website_url"));
        assert!(contains_placeholder("Visit {{website_url}}", "website_url"));
        assert!(contains_placeholder("Visit <your website url>", "website_url"));
        assert!(!contains_placeholder(
            "Visit https://example.com daily",
            "website_url"
        ));
    }
}
