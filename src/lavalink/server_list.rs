//! Parses candidate Lavalink nodes out of loosely formatted text.
//!
//! Public server lists are usually copy-pasted from READMEs and Discord posts:
//! JS object literals with unquoted keys, single quotes, trailing commas and
//! prose between entries. Rather than insisting on valid JSON, every
//! brace-delimited fragment is scanned for `key: value` pairs and handed to
//! [`NodeDescriptor::from_fields`], which decides whether it is usable.

use regex::Regex;
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::{debug, info};
use url::Url;

use super::{NodeDescriptor, RawValue, SelectionError, SelectionResult};

/// Nesting beyond this is not a server list.
const MAX_DEPTH: usize = 32;

static FIELD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        (?: "(?P<dq_key>[A-Za-z_]\w*)" | '(?P<sq_key>[A-Za-z_]\w*)' | \b(?P<bare_key>[A-Za-z_]\w*) )
        \s* : \s*
        (?: "(?P<dq>(?:[^"\\]|\\.)*)" | '(?P<sq>(?:[^'\\]|\\.)*)' | (?P<bare>[\w.\-]+) )
        "#,
    )
    .unwrap()
});

/// A brace-delimited fragment: its own text (comments and nested objects
/// removed) plus any nested fragments.
#[derive(Debug, Default)]
struct Fragment {
    own: String,
    children: Vec<Fragment>,
}

/// Extracts every valid node descriptor from `raw`, in source order, keeping the
/// first occurrence of each `host:port`.
pub fn parse(raw: &str) -> Vec<NodeDescriptor> {
    let mut nodes = Vec::new();
    for fragment in scan_fragments(raw) {
        collect(&fragment, &mut nodes);
    }

    let mut seen = HashSet::new();
    nodes.retain(|node| {
        let fresh = seen.insert((node.host.to_ascii_lowercase(), node.port));
        if !fresh {
            debug!("Dropping duplicate entry for {} ({})", node.address(), node.name);
        }
        fresh
    });
    nodes
}

/// Loads and parses a server list from a local path or an `http(s)` URL.
///
/// Only an unreadable source is an error; a readable source with no usable
/// entries yields an empty list.
pub async fn load(source: &str, http: &Client) -> SelectionResult<Vec<NodeDescriptor>> {
    let raw = read_source(source, http).await?;
    let nodes = parse(&raw);
    info!("Parsed {} candidate node(s) from {}", nodes.len(), source);
    Ok(nodes)
}

async fn read_source(source: &str, http: &Client) -> SelectionResult<String> {
    let unavailable = |e: &dyn std::fmt::Display| {
        SelectionError::SourceUnavailable(format!("{}: {}", source, e))
    };

    match Url::parse(source) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            debug!("Fetching server list from {}", url);
            let response = http
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| unavailable(&e))?;
            response.text().await.map_err(|e| unavailable(&e))
        }
        _ => tokio::fs::read_to_string(source)
            .await
            .map_err(|e| unavailable(&e)),
    }
}

fn collect(fragment: &Fragment, out: &mut Vec<NodeDescriptor>) {
    match NodeDescriptor::from_fields(&extract_fields(&fragment.own)) {
        Ok(node) => out.push(node),
        // Wrapper objects such as `{"nodes": [...]}` hold the real entries.
        Err(_) if !fragment.children.is_empty() => {
            for child in &fragment.children {
                collect(child, out);
            }
        }
        Err(reason) => debug!("Skipping server list entry: {}", reason),
    }
}

/// Pulls `key: value` pairs out of a fragment. The first occurrence of a key wins.
fn extract_fields(text: &str) -> HashMap<String, RawValue> {
    let mut fields = HashMap::new();
    for caps in FIELD_REGEX.captures_iter(text) {
        let Some(key) = caps
            .name("dq_key")
            .or_else(|| caps.name("sq_key"))
            .or_else(|| caps.name("bare_key"))
        else {
            continue;
        };

        let value = if let Some(m) = caps.name("dq") {
            RawValue::Text(unescape(m.as_str()))
        } else if let Some(m) = caps.name("sq") {
            RawValue::Text(m.as_str().replace("\\'", "'"))
        } else if let Some(value) = caps.name("bare").and_then(|m| classify_bare(m.as_str())) {
            value
        } else {
            continue;
        };

        fields
            .entry(key.as_str().to_ascii_lowercase())
            .or_insert(value);
    }
    fields
}

/// Types an unquoted token. `null` and `undefined` count as absent.
fn classify_bare(token: &str) -> Option<RawValue> {
    let value = match token {
        "null" | "undefined" => return None,
        "true" => RawValue::Bool(true),
        "false" => RawValue::Bool(false),
        _ => match token.parse::<i64>() {
            Ok(i) => RawValue::Integer(i),
            Err(_) => RawValue::Text(token.to_string()),
        },
    };
    Some(value)
}

/// Decodes JSON escapes in a double-quoted value, falling back to the raw text.
fn unescape(inner: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", inner)).unwrap_or_else(|_| inner.to_string())
}

/// Finds every top-level `{ ... }` fragment. Text outside braces is ignored.
///
/// A fragment that never closes is dropped on its own: scanning resumes right
/// after its opening brace, so a stray `{` in prose or an unbalanced quote
/// costs at most that one entry.
fn scan_fragments(text: &str) -> Vec<Fragment> {
    let chars: Vec<char> = text.chars().collect();
    let mut fragments = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        if chars[pos] != '{' {
            pos += 1;
            continue;
        }
        match read_fragment(&chars, pos + 1, 1) {
            Some((fragment, end)) => {
                fragments.push(fragment);
                pos = end;
            }
            None => {
                debug!("Skipping unterminated fragment at character {}", pos);
                pos += 1;
            }
        }
    }
    fragments
}

/// Reads the body of a fragment starting at `start`, just past its opening
/// brace. Returns the fragment and the position after its closing brace.
///
/// Quoted strings end at the end of their line at the latest.
fn read_fragment(chars: &[char], start: usize, depth: usize) -> Option<(Fragment, usize)> {
    if depth > MAX_DEPTH {
        return None;
    }

    let mut fragment = Fragment::default();
    let mut quote: Option<char> = None;
    let mut pos = start;

    while pos < chars.len() {
        let c = chars[pos];
        pos += 1;

        if let Some(q) = quote {
            fragment.own.push(c);
            if c == '\n' {
                quote = None;
            } else if c == '\\' {
                if let Some(&escaped) = chars.get(pos).filter(|&&e| e != '\n') {
                    fragment.own.push(escaped);
                    pos += 1;
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                fragment.own.push(c);
            }
            '/' if chars.get(pos) == Some(&'/') => {
                while pos < chars.len() && chars[pos] != '\n' {
                    pos += 1;
                }
            }
            '/' if chars.get(pos) == Some(&'*') => {
                pos += 1;
                let mut prev = '\0';
                while pos < chars.len() {
                    let skipped = chars[pos];
                    pos += 1;
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
                fragment.own.push(' ');
            }
            '{' => {
                let (child, end) = read_fragment(chars, pos, depth + 1)?;
                fragment.children.push(child);
                fragment.own.push(' ');
                pos = end;
            }
            '}' => return Some((fragment, pos)),
            _ => fragment.own.push(c),
        }
    }

    None
}
