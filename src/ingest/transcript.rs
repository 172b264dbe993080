//! Transcript derivation from artifact bodies.
//!
//! Bodies arrive as WebVTT captions, HTML notification mail, or plain
//! text. Each is reduced to the spoken text the classifier and the
//! generator work on.

use std::sync::OnceLock;

use regex::Regex;

/// Transcripts shorter than this are not worth analyzing
pub const MIN_TRANSCRIPT_CHARS: usize = 50;

/// Subject prefixes stripped when deriving a meeting title
const TITLE_PREFIXES: &[&str] = &[
    "fw:",
    "fwd:",
    "re:",
    "webex:",
    "recording:",
    "recording available:",
    "recording of",
];

/// Lines that start the transcript part of a notification mail
const TRANSCRIPT_HEADERS: &[&str] = &["transcript", "meeting notes", "conversation"];

/// Notification boilerplate dropped from plain-text transcripts
const FOOTER_MARKERS: &[&str] = &[
    "unsubscribe",
    "privacy",
    "cisco.com",
    "copyright",
    "do not reply",
    "automatic message",
    "webex teams",
];

/// Body phrases suggesting the mail carries or points to a transcript
const TRANSCRIPT_MARKERS: &[&str] = &[
    "transcript",
    "meeting notes",
    "conversation summary",
    "meeting summary",
    "closed captions",
    "captions",
    "webex.com/meet/",
    "webex.com/m/",
];

fn regex(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn tag_regex() -> Option<&'static Regex> {
    static TAG: OnceLock<Option<Regex>> = OnceLock::new();
    regex(&TAG, r"(?s)<[^>]*>")
}

fn block_regex() -> Option<&'static Regex> {
    static BLOCK: OnceLock<Option<Regex>> = OnceLock::new();
    regex(&BLOCK, r"(?i)<\s*(br|/p|/div|/tr|/li|/h[1-6])\s*/?\s*>")
}

fn hidden_regex() -> Option<&'static Regex> {
    static HIDDEN: OnceLock<Option<Regex>> = OnceLock::new();
    regex(&HIDDEN, r"(?is)<(script|style|head)[^>]*>.*?</(script|style|head)\s*>")
}

fn link_regex() -> Option<&'static Regex> {
    static LINK: OnceLock<Option<Regex>> = OnceLock::new();
    regex(&LINK, r#"https?://[^\s"'<>]*webex\.com/[^\s"'<>]+"#)
}

/// Patterns for meeting identifiers, most specific first
const MEETING_ID_PATTERNS: &[&str] = &[
    r"(?i)meeting\s+(?:number|id|#)[\s:]+(\d{9,15})",
    r#"(?i)meetingKey["']?\s*[:=]\s*["']?([a-f0-9]{32})"#,
    r#"(?i)meetingUUID["']?\s*[:=]\s*["']?([a-f0-9\-]{36})"#,
    r"(?i)webex\.com/meet/([a-zA-Z0-9\-_]+)",
    r"(?i)webex\.com/m/([a-zA-Z0-9\-_]+)",
];

fn meeting_id_regexes() -> &'static [Regex] {
    static IDS: OnceLock<Vec<Regex>> = OnceLock::new();
    IDS.get_or_init(|| {
        MEETING_ID_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

/// Meeting title from a mail subject
pub fn normalize_title(subject: &str, subject_pattern: &str) -> String {
    let pattern = subject_pattern.trim().to_lowercase();
    let mut title = subject.trim();

    // Prefixes can stack ("Fw: Re: Webex: ...")
    loop {
        let lower = title.to_lowercase();
        let prefix = TITLE_PREFIXES
            .iter()
            .copied()
            .chain((!pattern.is_empty()).then_some(pattern.as_str()))
            .find(|p| lower.starts_with(p));
        match prefix {
            Some(p) => match title.get(p.len()..) {
                Some(rest) => title = rest.trim_start(),
                None => break,
            },
            None => break,
        }
    }

    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        "Untitled".to_string()
    } else {
        title
    }
}

/// File-name-safe form of a title, at most 50 characters
pub fn safe_file_stem(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .take(50)
        .collect();
    let cleaned = cleaned.trim().replace(' ', "_");
    if cleaned.is_empty() {
        "meeting".to_string()
    } else {
        cleaned
    }
}

pub fn is_vtt(body: &str) -> bool {
    body.trim_start().starts_with("WEBVTT")
}

pub fn is_html(body: &str) -> bool {
    let lower = body.to_lowercase();
    ["<html", "<body", "<div", "<p>", "<br", "<table"]
        .iter()
        .any(|t| lower.contains(t))
}

/// Cue text from WebVTT captions, joined with spaces
pub fn vtt_to_text(vtt: &str) -> String {
    let mut text = Vec::new();
    let mut in_cue = false;
    for line in vtt.lines() {
        let line = line.trim();
        if line.is_empty() {
            in_cue = false;
            continue;
        }
        if line.contains("-->") {
            in_cue = true;
            continue;
        }
        if line.starts_with("WEBVTT") || line.starts_with("NOTE") {
            continue;
        }
        if in_cue {
            text.push(line);
        }
    }
    text.join(" ")
}

/// Reduce an HTML body to plain text, one block per line
pub fn strip_html(html: &str) -> String {
    let mut text = html.to_string();
    if let Some(re) = hidden_regex() {
        text = re.replace_all(&text, "").into_owned();
    }
    if let Some(re) = block_regex() {
        text = re.replace_all(&text, "\n").into_owned();
    }
    if let Some(re) = tag_regex() {
        text = re.replace_all(&text, "").into_owned();
    }
    let text = decode_entities(&text);

    text.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// True if the body mentions a transcript or links to a meeting
pub fn has_transcript_markers(body: &str) -> bool {
    let lower = body.to_lowercase();
    TRANSCRIPT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Lines after the first transcript header, with mail footer lines removed.
/// Without a header every line is kept.
pub fn extract_embedded(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let start = lines
        .iter()
        .position(|l| {
            let lower = l.to_lowercase();
            TRANSCRIPT_HEADERS.iter().any(|h| lower.contains(h))
        })
        .map(|idx| idx + 1)
        .unwrap_or(0);

    lines[start..]
        .iter()
        .filter(|l| {
            let lower = l.to_lowercase();
            !FOOTER_MARKERS.iter().any(|f| lower.contains(f))
        })
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

/// First meeting or recording link in the body
pub fn recording_link(body: &str) -> Option<String> {
    link_regex()?.find(body).map(|m| m.as_str().to_string())
}

/// Meeting number, key, or room name found in the body
pub fn meeting_id(body: &str) -> Option<String> {
    meeting_id_regexes()
        .iter()
        .find_map(|re| re.captures(body))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Derive the transcript for an artifact body.
///
/// Returns `None` when what remains is shorter than
/// [`MIN_TRANSCRIPT_CHARS`].
pub fn derive_transcript(body: &str) -> Option<String> {
    let text = if is_vtt(body) {
        vtt_to_text(body)
    } else {
        let plain = if is_html(body) {
            strip_html(body)
        } else {
            body.to_string()
        };
        extract_embedded(&plain)
    };

    let text = text.trim().to_string();
    if text.chars().count() < MIN_TRANSCRIPT_CHARS {
        None
    } else {
        Some(text)
    }
}
