//! Display names and search keys.
//!
//! A display name is free text that may carry inline color/style markup. A
//! search key is the canonical lookup form of a display name: markup removed,
//! surrounding whitespace trimmed, and every space replaced with an underscore.
//! Case is preserved in both forms.
//!
//! The key transform is lossy. `Old Town`, `Old_Town` and `&aOld Town` all
//! collapse to the key `Old_Town`, and converting that key back gives the
//! display name `Old Town`. The reverse direction exists only as a display
//! fallback for rows that lost their display name.

use std::fmt;

use thiserror::Error;

/// Why a name or key could not be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum NameReason {
    #[error("no name was supplied")]
    Null,
    #[error("name is blank")]
    Blank,
}

/// Legacy single-character format codes: colors `0-9a-f`, styles `k-o`, reset `r`.
fn is_format_code(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), '0'..='9' | 'a'..='f' | 'k'..='o' | 'r')
}

fn is_marker(c: char) -> bool {
    c == '&' || c == '§'
}

/// `&#RRGGBB`
fn hex_color_len(chars: &[char], start: usize) -> Option<usize> {
    let digits = chars.get(start + 2..start + 8)?;
    (chars.get(start + 1) == Some(&'#') && digits.iter().all(char::is_ascii_hexdigit)).then_some(8)
}

/// `&x&R&R&G&G&B&B`
fn expanded_hex_len(chars: &[char], start: usize) -> Option<usize> {
    let marker = *chars.get(start)?;
    if !matches!(chars.get(start + 1), Some('x' | 'X')) {
        return None;
    }
    let pairs = chars.get(start + 2..start + 14)?;
    pairs
        .chunks(2)
        .all(|pair| pair[0] == marker && pair[1].is_ascii_hexdigit())
        .then_some(14)
}

/// Remove recognized inline color/style markup from `text`.
///
/// Unrecognized sequences (a lone `&`, `&z`, a truncated hex color) are left untouched.
pub fn strip_markup(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while let Some(&c) = chars.get(i) {
        if is_marker(c) {
            let skip = hex_color_len(&chars, i)
                .or_else(|| expanded_hex_len(&chars, i))
                .or_else(|| {
                    chars
                        .get(i + 1)
                        .filter(|next| is_format_code(**next))
                        .map(|_| 2)
                });
            if let Some(len) = skip {
                i += len;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Canonical key form of arbitrary text. Returns `None` when nothing but markup
/// and whitespace remains.
fn normalize_key(text: &str) -> Option<String> {
    let stripped = strip_markup(text);
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.replace(' ', "_"))
    }
}

/// A display name that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidDisplayName(String);

impl ValidDisplayName {
    /// The name as entered, markup included.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name with markup removed, for logs and plain-text output.
    pub fn plain(&self) -> String {
        strip_markup(&self.0)
    }

    pub fn to_search_key(&self) -> ValidSearchKey {
        // construction guarantees non-blank text once markup is stripped
        ValidSearchKey(normalize_key(&self.0).unwrap_or_else(|| self.0.replace(' ', "_")))
    }
}

impl fmt::Display for ValidDisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of [`DisplayName::of`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayName {
    Valid(ValidDisplayName),
    Invalid {
        raw: Option<String>,
        reason: NameReason,
    },
}

impl DisplayName {
    /// Validate a user supplied display name. Surrounding whitespace is trimmed;
    /// a name consisting only of markup and whitespace is blank.
    pub fn of(text: Option<&str>) -> Self {
        let Some(text) = text else {
            return DisplayName::Invalid {
                raw: None,
                reason: NameReason::Null,
            };
        };
        if normalize_key(text).is_none() {
            return DisplayName::Invalid {
                raw: Some(text.to_string()),
                reason: NameReason::Blank,
            };
        }
        DisplayName::Valid(ValidDisplayName(text.trim().to_string()))
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, DisplayName::Valid(_))
    }

    pub fn as_valid(&self) -> Option<&ValidDisplayName> {
        match self {
            DisplayName::Valid(name) => Some(name),
            DisplayName::Invalid { .. } => None,
        }
    }

    pub fn into_valid(self) -> Result<ValidDisplayName, NameReason> {
        match self {
            DisplayName::Valid(name) => Ok(name),
            DisplayName::Invalid { reason, .. } => Err(reason),
        }
    }
}

/// A search key that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValidSearchKey(String);

impl ValidSearchKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Best-effort display form: underscores become spaces.
    pub fn to_display_name(&self) -> ValidDisplayName {
        ValidDisplayName(self.0.replace('_', " "))
    }
}

impl fmt::Display for ValidSearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of [`SearchKey::of`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    Valid(ValidSearchKey),
    Invalid {
        raw: Option<String>,
        reason: NameReason,
    },
}

impl SearchKey {
    pub fn of(text: Option<&str>) -> Self {
        let Some(text) = text else {
            return SearchKey::Invalid {
                raw: None,
                reason: NameReason::Null,
            };
        };
        match normalize_key(text) {
            Some(key) => SearchKey::Valid(ValidSearchKey(key)),
            None => SearchKey::Invalid {
                raw: Some(text.to_string()),
                reason: NameReason::Blank,
            },
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, SearchKey::Valid(_))
    }

    pub fn as_valid(&self) -> Option<&ValidSearchKey> {
        match self {
            SearchKey::Valid(key) => Some(key),
            SearchKey::Invalid { .. } => None,
        }
    }

    pub fn into_valid(self) -> Result<ValidSearchKey, NameReason> {
        match self {
            SearchKey::Valid(key) => Ok(key),
            SearchKey::Invalid { reason, .. } => Err(reason),
        }
    }
}

/// Normalize an interactive completion prefix the same way keys are derived,
/// without rejecting blank input. Trailing spaces are kept so `"Old "` still
/// narrows to keys starting with `Old_`.
pub fn normalize_prefix(prefix: Option<&str>) -> String {
    prefix
        .map(|p| strip_markup(p).trim_start().replace(' ', "_"))
        .unwrap_or_default()
}
