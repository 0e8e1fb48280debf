/// Checkbox task parser.
///
/// Handles the inline task format:
///   - [ ] Description #tag 🔁 every week ⛔ abc123 📅 2026-01-10 🔺
///
/// Metadata tokens sit at the end of the line. They are peeled off the tail by
/// a list of independent matchers until no matcher accepts the last token;
/// anything left over (including malformed dates) stays in the description.
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

use crate::types::{Priority, Task, UNTITLED_SECTION};

static CHECKBOX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*+]\s\[(.)\](?:\s+(.*?))?\s*$").unwrap());

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}#{1,6}\s+(.*?)(?:\s+#+)?\s*$").unwrap());

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#([\w/-]*[^\W\d][\w/-]*)").unwrap());

static TAG_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[\w/-]*[^\W\d][\w/-]*$").unwrap());

static ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

static BLOCKING_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:blocked|waiting (?:on|for)|on hold|needs approval|paused)\b").unwrap()
});

const DUE_SIGIL: &str = "📅";
const SCHEDULED_SIGIL: &str = "⏳";
const START_SIGIL: &str = "🛫";
const CREATED_SIGIL: &str = "➕";
const DONE_SIGIL: &str = "✅";
const RECURRENCE_SIGIL: &str = "🔁";
const DEPENDS_SIGIL: &str = "⛔";
const ID_SIGIL: &str = "🆔";

const PRIORITY_GLYPHS: &[(&str, Priority)] = &[
    ("🔺", Priority::Highest),
    ("⏫", Priority::High),
    ("🔼", Priority::Medium),
    ("🔽", Priority::Low),
    ("⏬", Priority::Lowest),
];

const DATE_SIGILS: &[&str] = &[DUE_SIGIL, SCHEDULED_SIGIL, START_SIGIL, CREATED_SIGIL, DONE_SIGIL];

/// Checkbox glyphs that mark a task as blocked.
const BLOCKED_GLYPHS: &[char] = &['b', 'B'];

/// A value extracted from the tail of a task line.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskField {
    Due(NaiveDate),
    Scheduled(NaiveDate),
    Start(NaiveDate),
    Created(NaiveDate),
    Done(NaiveDate),
    Priority(Priority),
    Recurrence(String),
    DependsOn(Vec<String>),
    Id(String),
    /// Trailing tag; it stays in the description.
    Tag(String),
}

/// A pure tail matcher: returns the extracted field and the text before it.
pub type TokenMatcher = fn(&str) -> Option<(TaskField, &str)>;

/// Matchers tried, in order, against the current tail.
pub const TOKEN_MATCHERS: &[TokenMatcher] = &[
    match_due,
    match_scheduled,
    match_start,
    match_created,
    match_done,
    match_priority,
    // Before recurrence, whose rule runs to the end of the line.
    match_tag,
    match_recurrence,
    match_depends_on,
    match_id,
];

/// Split `text` into (head, last whitespace-separated word).
fn split_last_word(text: &str) -> Option<(&str, &str)> {
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind(char::is_whitespace) {
        Some(pos) => {
            let ws_len = trimmed[pos..].chars().next().map(char::len_utf8).unwrap_or(1);
            Some((&trimmed[..pos], &trimmed[pos + ws_len..]))
        }
        None => Some(("", trimmed)),
    }
}

/// A sigil only starts a token at the beginning of the text or after whitespace.
fn at_token_boundary(before: &str) -> bool {
    before.is_empty() || before.ends_with(char::is_whitespace)
}

/// Split `text` at its last occurrence of `sigil`, requiring a token boundary.
fn split_at_last_sigil<'a>(text: &'a str, sigil: &str) -> Option<(&'a str, &'a str)> {
    let trimmed = text.trim_end();
    let pos = trimmed.rfind(sigil)?;
    let before = &trimmed[..pos];
    if !at_token_boundary(before) {
        return None;
    }
    Some((before, trimmed[pos + sigil.len()..].trim()))
}

fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// `<sigil> YYYY-MM-DD` (or `<sigil>YYYY-MM-DD`) at the end of `text`.
fn match_date_token<'a>(text: &'a str, sigil: &str) -> Option<(NaiveDate, &'a str)> {
    let (head, word) = split_last_word(text)?;
    if let Some(value) = word.strip_prefix(sigil) {
        return parse_iso_date(value).map(|d| (d, head.trim_end()));
    }
    let rest = head.trim_end().strip_suffix(sigil)?;
    if !at_token_boundary(rest) {
        return None;
    }
    parse_iso_date(word).map(|d| (d, rest.trim_end()))
}

pub fn match_due(text: &str) -> Option<(TaskField, &str)> {
    match_date_token(text, DUE_SIGIL).map(|(d, rest)| (TaskField::Due(d), rest))
}

pub fn match_scheduled(text: &str) -> Option<(TaskField, &str)> {
    match_date_token(text, SCHEDULED_SIGIL).map(|(d, rest)| (TaskField::Scheduled(d), rest))
}

pub fn match_start(text: &str) -> Option<(TaskField, &str)> {
    match_date_token(text, START_SIGIL).map(|(d, rest)| (TaskField::Start(d), rest))
}

pub fn match_created(text: &str) -> Option<(TaskField, &str)> {
    match_date_token(text, CREATED_SIGIL).map(|(d, rest)| (TaskField::Created(d), rest))
}

pub fn match_done(text: &str) -> Option<(TaskField, &str)> {
    match_date_token(text, DONE_SIGIL).map(|(d, rest)| (TaskField::Done(d), rest))
}

pub fn match_priority(text: &str) -> Option<(TaskField, &str)> {
    let trimmed = text.trim_end().trim_end_matches('\u{FE0F}');
    PRIORITY_GLYPHS.iter().find_map(|(glyph, priority)| {
        let rest = trimmed.strip_suffix(glyph)?;
        at_token_boundary(rest).then_some((TaskField::Priority(*priority), rest))
    })
}

pub fn match_recurrence(text: &str) -> Option<(TaskField, &str)> {
    let (rest, value) = split_at_last_sigil(text, RECURRENCE_SIGIL)?;
    if value.is_empty() || contains_known_sigil(value) {
        return None;
    }
    Some((TaskField::Recurrence(value.to_string()), rest))
}

pub fn match_depends_on(text: &str) -> Option<(TaskField, &str)> {
    let (rest, value) = split_at_last_sigil(text, DEPENDS_SIGIL)?;
    let ids: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() || !ids.iter().all(|id| ID_RE.is_match(id)) {
        return None;
    }
    Some((TaskField::DependsOn(ids), rest))
}

pub fn match_id(text: &str) -> Option<(TaskField, &str)> {
    let (rest, value) = split_at_last_sigil(text, ID_SIGIL)?;
    if !ID_RE.is_match(value) {
        return None;
    }
    Some((TaskField::Id(value.to_string()), rest))
}

pub fn match_tag(text: &str) -> Option<(TaskField, &str)> {
    let (head, word) = split_last_word(text)?;
    if !TAG_TOKEN_RE.is_match(word) {
        return None;
    }
    Some((TaskField::Tag(word[1..].to_string()), head))
}

fn contains_known_sigil(value: &str) -> bool {
    DATE_SIGILS
        .iter()
        .chain([RECURRENCE_SIGIL, DEPENDS_SIGIL, ID_SIGIL].iter())
        .any(|s| value.contains(s))
        || PRIORITY_GLYPHS.iter().any(|(g, _)| value.contains(g))
}

/// Metadata peeled off one task line.
#[derive(Debug, Default)]
struct TailMetadata {
    due_date: Option<NaiveDate>,
    scheduled_date: Option<NaiveDate>,
    start_date: Option<NaiveDate>,
    created_date: Option<NaiveDate>,
    completion_date: Option<NaiveDate>,
    priority: Option<Priority>,
    recurrence: Option<String>,
    depends_on: Vec<String>,
    task_id: Option<String>,
}

impl TailMetadata {
    /// The token nearest the end of the line wins when a field repeats.
    fn apply(&mut self, field: TaskField) {
        match field {
            TaskField::Due(d) => {
                self.due_date.get_or_insert(d);
            }
            TaskField::Scheduled(d) => {
                self.scheduled_date.get_or_insert(d);
            }
            TaskField::Start(d) => {
                self.start_date.get_or_insert(d);
            }
            TaskField::Created(d) => {
                self.created_date.get_or_insert(d);
            }
            TaskField::Done(d) => {
                self.completion_date.get_or_insert(d);
            }
            TaskField::Priority(p) => {
                self.priority.get_or_insert(p);
            }
            TaskField::Recurrence(r) => {
                self.recurrence.get_or_insert(r);
            }
            TaskField::DependsOn(ids) => {
                for id in ids {
                    if !self.depends_on.contains(&id) {
                        self.depends_on.push(id);
                    }
                }
            }
            TaskField::Id(id) => {
                self.task_id.get_or_insert(id);
            }
            TaskField::Tag(_) => {}
        }
    }
}

/// Peel metadata tokens off the tail. Returns (description, metadata).
fn strip_metadata(body: &str) -> (String, TailMetadata) {
    let mut meta = TailMetadata::default();
    let mut rest = body.trim_end();
    // Trailing tags are stepped over but kept, in original order.
    let mut kept_tags: Vec<String> = Vec::new();

    'outer: loop {
        for matcher in TOKEN_MATCHERS {
            if let Some((field, remaining)) = matcher(rest) {
                if let TaskField::Tag(ref tag) = field {
                    kept_tags.insert(0, format!("#{}", tag));
                }
                meta.apply(field);
                rest = remaining.trim_end();
                continue 'outer;
            }
        }
        break;
    }

    let mut description = rest.trim().to_string();
    for tag in kept_tags {
        if !description.is_empty() {
            description.push(' ');
        }
        description.push_str(&tag);
    }
    (description, meta)
}

fn extract_tags(description: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for caps in TAG_RE.captures_iter(description) {
        let tag = caps[1].to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Parse one line into a task, or `None` when it is not a checkbox line.
pub fn parse_line(line: &str, current_section: &str) -> Option<Task> {
    parse_line_at(line, current_section, "", 0)
}

/// Like [`parse_line`], recording where the line came from.
pub fn parse_line_at(
    line: &str,
    current_section: &str,
    source_note: &str,
    line_number: usize,
) -> Option<Task> {
    let caps = CHECKBOX_RE.captures(line)?;
    let state = caps[1].chars().next().unwrap_or(' ');
    let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");

    let checked = matches!(state, 'x' | 'X');
    let blocked_glyph = BLOCKED_GLYPHS.contains(&state);

    let (description, meta) = strip_metadata(body);
    if DATE_SIGILS.iter().any(|s| description.contains(s)) {
        log::debug!(
            "[vaultkeep.tasks] Unparsed date token kept in description at {}:{}",
            source_note,
            line_number
        );
    }

    let blocked = blocked_glyph
        || !meta.depends_on.is_empty()
        || BLOCKING_KEYWORD_RE.is_match(&description);
    let tags = extract_tags(&description);
    let section = if current_section.trim().is_empty() {
        UNTITLED_SECTION.to_string()
    } else {
        current_section.to_string()
    };

    Some(Task {
        checked,
        description,
        due_date: meta.due_date,
        scheduled_date: meta.scheduled_date,
        start_date: meta.start_date,
        created_date: meta.created_date,
        completion_date: meta.completion_date,
        priority: meta.priority,
        recurrence: meta.recurrence,
        blocked,
        depends_on: meta.depends_on,
        task_id: meta.task_id,
        tags,
        section,
        source_note: source_note.to_string(),
        line_number,
    })
}

/// Heading text of a markdown heading line, if it is one.
pub fn heading_text(line: &str) -> Option<&str> {
    HEADING_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

/// Number of leading lines occupied by YAML frontmatter (0 when absent or unclosed).
fn frontmatter_len(lines: &[&str]) -> usize {
    if lines.first().map(|l| l.trim_end()) != Some("---") {
        return 0;
    }
    lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, l)| matches!(l.trim_end(), "---" | "..."))
        .map(|(i, _)| i + 1)
        .unwrap_or(0)
}

/// Parse every task of a note, tracking the nearest heading and skipping
/// frontmatter and fenced code blocks. Line numbers are 1-based.
pub fn parse_note(text: &str, note_id: &str) -> Vec<Task> {
    let lines: Vec<&str> = text.lines().collect();
    let skip = frontmatter_len(&lines);

    let mut tasks = Vec::new();
    let mut section = UNTITLED_SECTION.to_string();
    let mut fence: Option<&str> = None;

    for (index, line) in lines.iter().enumerate().skip(skip) {
        let trimmed = line.trim_start();
        if let Some(open) = fence {
            if trimmed.starts_with(open) {
                fence = None;
            }
            continue;
        }
        if trimmed.starts_with("```") {
            fence = Some("```");
            continue;
        }
        if trimmed.starts_with("~~~") {
            fence = Some("~~~");
            continue;
        }

        if let Some(heading) = heading_text(line) {
            section = heading.to_string();
            continue;
        }

        if let Some(task) = parse_line_at(line, &section, note_id, index + 1) {
            tasks.push(task);
        }
    }

    tasks
}
