//! Command Interpreter – free-form model text to validated [`Command`]s.
//!
//! The vision model returns unstructured text.  [`interpret`] runs it
//! through four stages:
//!
//! 1. **Extraction** – an outermost balanced `[...]` group if the text has
//!    one (the last group holding a call), otherwise every `name(args)` call
//!    found anywhere in the text.
//! 2. **Tokenization** – the region is split by line, then each line by
//!    top-level comma (commas inside parentheses or quotes do not split).
//!    Surrounding quotes, commas and whitespace are stripped from each item.
//! 3. **Validation** – each item must be `name(args)` with `name` in the
//!    [`VOCABULARY`][vlabot_types::VOCABULARY], the declared number of
//!    arguments, and every argument a finite real number.  Empty arguments
//!    are accepted only in optional trailing positions.
//! 4. **Output** – the valid commands in their original order.  Invalid
//!    items are dropped, never repaired.  If nothing survives, the result is
//!    [`InterpretError::NoValidCommands`] carrying the untouched input so the
//!    operator can see what the model actually said.

use thiserror::Error;
use tracing::debug;
use vlabot_types::{Command, CommandKind};

/// Interpretation produced no executable command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpretError {
    #[error("no valid commands in model output: {raw:?}")]
    NoValidCommands { raw: String },
}

impl InterpretError {
    /// The unmodified model output.
    pub fn raw(&self) -> &str {
        match self {
            Self::NoValidCommands { raw } => raw,
        }
    }
}

/// Why a single candidate item was dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    #[error("not a function call")]
    NotACall,
    #[error("unknown command '{0}'")]
    UnknownName(String),
    #[error("{name} takes {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: String,
        got: usize,
    },
    #[error("argument '{0}' is not a finite number")]
    BadArgument(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Turn model output into an ordered batch of validated commands.
///
/// # Errors
///
/// Returns [`InterpretError::NoValidCommands`] when extraction finds no
/// candidates or every candidate is rejected.
pub fn interpret(text: &str) -> Result<Vec<Command>, InterpretError> {
    let candidates = extract(text);
    let mut commands = Vec::with_capacity(candidates.len());
    for item in &candidates {
        match parse_command(item) {
            Ok(cmd) => commands.push(cmd),
            Err(e) => debug!(item = %item, reason = %e, "dropping command"),
        }
    }
    if commands.is_empty() {
        return Err(InterpretError::NoValidCommands {
            raw: text.to_string(),
        });
    }
    Ok(commands)
}

/// Textual call form of a command, accepted back by [`interpret`].
pub fn format(command: &Command) -> String {
    command.to_string()
}

/// A batch rendered as a bracketed list of quoted calls, e.g.
/// `["go_ahead(1)", "turn_left(90)"]`.
pub fn format_batch(commands: &[Command]) -> String {
    let items: Vec<String> = commands.iter().map(|c| format!("\"{c}\"")).collect();
    format!("[{}]", items.join(", "))
}

/// Extraction and tokenization: the candidate items in `text`, cleaned but
/// not yet validated.
pub fn extract(text: &str) -> Vec<String> {
    match bracketed_region(text) {
        Some(region) => tokenize(region),
        None => scan_calls(text),
    }
}

/// Validate one candidate item.
///
/// # Errors
///
/// Returns the reason the item cannot be executed.
pub fn parse_command(item: &str) -> Result<Command, ItemError> {
    let item = clean(item);
    let open = item.find('(').ok_or(ItemError::NotACall)?;
    let body = item[open + 1..]
        .strip_suffix(')')
        .ok_or(ItemError::NotACall)?;
    if body.contains(['(', ')']) {
        return Err(ItemError::NotACall);
    }
    let name = item[..open].trim();
    let entry = CommandKind::lookup(name).ok_or_else(|| ItemError::UnknownName(name.to_string()))?;
    let arity = entry.arity;

    let arity_error = |got| ItemError::Arity {
        name: name.to_string(),
        expected: if arity.optional == 0 {
            arity.required.to_string()
        } else {
            format!("{}..={}", arity.required, arity.max())
        },
        got,
    };

    let body = body.trim();
    if body.is_empty() {
        if arity.required == 0 {
            return Command::new(entry.kind, Vec::new()).map_err(|_| arity_error(0));
        }
        return Err(arity_error(0));
    }
    if arity.max() == 0 {
        return Err(arity_error(body.split(',').count()));
    }

    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    if parts.len() < arity.required || parts.len() > arity.max() {
        return Err(arity_error(parts.len()));
    }

    let mut args = Vec::with_capacity(parts.len());
    let mut gap = false;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            if i < arity.required {
                return Err(ItemError::BadArgument(String::new()));
            }
            gap = true;
            continue;
        }
        if gap {
            // A value after an omitted optional argument would shift positions.
            return Err(ItemError::BadArgument(part.to_string()));
        }
        let value: f64 = part
            .parse()
            .map_err(|_| ItemError::BadArgument(part.to_string()))?;
        if !value.is_finite() {
            return Err(ItemError::BadArgument(part.to_string()));
        }
        args.push(value);
    }

    Command::new(entry.kind, args).map_err(|_| arity_error(parts.len()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Contents of an outermost balanced `[...]` group.
///
/// Prose around the list may carry its own brackets (`Step [1]: [...]`), so
/// the last top-level group holding a call wins, else the last group.
fn bracketed_region(text: &str) -> Option<&str> {
    let mut groups = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' => {
                if depth == 0 {
                    start = i + 1;
                }
                depth += 1;
            }
            ']' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    groups.push(&text[start..i]);
                }
            }
            _ => {}
        }
    }
    groups
        .iter()
        .rev()
        .find(|g| g.contains('('))
        .or(groups.last())
        .copied()
}

/// Lines first, then top-level commas within each line.
fn tokenize(region: &str) -> Vec<String> {
    region
        .trim()
        .lines()
        .flat_map(split_top_level)
        .map(clean)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split on commas that are outside parentheses and quotes.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                out.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out
}

fn clean(item: &str) -> &str {
    item.trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '"' | '\''))
}

/// Fallback extraction: every `identifier(...)` in free text, where the
/// parenthesised part contains no nested parentheses.
fn scan_calls(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find('(') {
        let open = search_from + rel;
        let mut name_start = open;
        while name_start > 0 && is_ident_byte(bytes[name_start - 1]) {
            name_start -= 1;
        }
        let Some(close_rel) = text[open + 1..].find([')', '(']) else {
            break;
        };
        let close = open + 1 + close_rel;
        if bytes[close] == b'(' {
            search_from = close;
            continue;
        }
        if name_start < open {
            out.push(text[name_start..=close].to_string());
        }
        search_from = close + 1;
    }
    out
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
