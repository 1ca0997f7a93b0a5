//! Word-level diff for caption and extracted-text history.
//!
//! Text is split into runs of non-whitespace and runs of whitespace, so
//! whitespace changes show up as tokens of their own. The edit script comes
//! from a longest-common-subsequence table and is deterministic: when two
//! scripts are equally short, additions are preferred over removals during
//! the backtrack.
//!
//! The table is `(m + 1) * (n + 1)` cells for `m` old and `n` new tokens, so
//! both time and memory grow quadratically. That is fine for captions and
//! OCR snippets; callers diffing whole documents should guard the input size
//! (see [`table_cells`]).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Runs of whitespace. Matches become tokens alongside the text between them.
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

/// How a token relates the old text to the new text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Same,
    Added,
    Removed,
}

impl DiffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Same => "same",
            Self::Added => "added",
            Self::Removed => "removed",
        }
    }
}

impl std::fmt::Display for DiffKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single span of the edit script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffToken {
    pub kind: DiffKind,
    pub text: String,
}

impl DiffToken {
    fn new(kind: DiffKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
        }
    }
}

/// Ordered edit script from an old text to a new text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub tokens: Vec<DiffToken>,
}

impl DiffResult {
    /// Rebuild the old text (every token except additions).
    pub fn old_text(&self) -> String {
        self.concat_except(DiffKind::Added)
    }

    /// Rebuild the new text (every token except removals).
    pub fn new_text(&self) -> String {
        self.concat_except(DiffKind::Removed)
    }

    /// `true` when no token was added or removed.
    pub fn is_unchanged(&self) -> bool {
        self.tokens.iter().all(|t| t.kind == DiffKind::Same)
    }

    pub fn added_count(&self) -> usize {
        self.count(DiffKind::Added)
    }

    pub fn removed_count(&self) -> usize {
        self.count(DiffKind::Removed)
    }

    /// Number of added plus removed tokens.
    pub fn change_count(&self) -> usize {
        self.added_count() + self.removed_count()
    }

    fn count(&self, kind: DiffKind) -> usize {
        self.tokens.iter().filter(|t| t.kind == kind).count()
    }

    fn concat_except(&self, skipped: DiffKind) -> String {
        self.tokens
            .iter()
            .filter(|t| t.kind != skipped)
            .map(|t| t.text.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// Split `text` into alternating word and whitespace tokens.
///
/// Every whitespace run is kept as its own token and empty pieces are
/// dropped, so concatenating the result gives back `text` exactly.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut last = 0;

    for m in WHITESPACE_RE.find_iter(text) {
        if m.start() > last {
            tokens.push(&text[last..m.start()]);
        }
        tokens.push(m.as_str());
        last = m.end();
    }
    if last < text.len() {
        tokens.push(&text[last..]);
    }

    tokens
}

/// Number of LCS table cells a diff of these two texts would allocate.
pub fn table_cells(old_text: &str, new_text: &str) -> usize {
    (tokenize(old_text).len() + 1).saturating_mul(tokenize(new_text).len() + 1)
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Compute the token-level edit script turning `old_text` into `new_text`.
pub fn diff(old_text: &str, new_text: &str) -> DiffResult {
    let old = tokenize(old_text);
    let new = tokenize(new_text);
    let m = old.len();
    let n = new.len();

    // dp[i * w + j] = LCS length of old[..i] and new[..j].
    let w = n + 1;
    let mut dp = vec![0u32; (m + 1) * w];
    for i in 1..=m {
        for j in 1..=n {
            dp[i * w + j] = if old[i - 1] == new[j - 1] {
                dp[(i - 1) * w + (j - 1)] + 1
            } else {
                dp[(i - 1) * w + j].max(dp[i * w + (j - 1)])
            };
        }
    }

    let mut tokens = Vec::with_capacity(m.max(n));
    let mut i = m;
    let mut j = n;
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && old[i - 1] == new[j - 1] {
            tokens.push(DiffToken::new(DiffKind::Same, old[i - 1]));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || dp[i * w + (j - 1)] >= dp[(i - 1) * w + j]) {
            tokens.push(DiffToken::new(DiffKind::Added, new[j - 1]));
            j -= 1;
        } else {
            tokens.push(DiffToken::new(DiffKind::Removed, old[i - 1]));
            i -= 1;
        }
    }
    tokens.reverse();

    DiffResult { tokens }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
