#![forbid(unsafe_code)]

//! Completion candidates and their generation.
//!
//! The host registers a [`Completer`]; the editor calls it with the text
//! and cursor and collects [`Candidate`]s into a budgeted, deduplicating
//! [`CandidateSet`]. The decision logic for 0/1/many candidates (including
//! the spell-correction fallback) lives with the editor; this module owns
//! the data types, the default filename completer, candidate application,
//! and the edit-distance scoring the fallback uses.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tideline_text::{TextBuffer, WordKind, markup};

/// Default per-invocation candidate budget.
pub const DEFAULT_BUDGET: usize = 500;
/// Hard cap on candidates loaded into the expanded menu.
pub const EXPANDED_CAP: usize = 1000;

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Text inserted into the buffer.
    pub replacement: String,
    /// Menu display text, markup-escaped; `replacement` shown when absent.
    pub display: Option<String>,
    /// One-line help shown next to the entry.
    pub help: Option<String>,
    /// Provenance tag ("file", "history", a plugin name).
    pub source: Option<String>,
    /// Bytes before the cursor this candidate supersedes.
    pub delete_before: usize,
    /// Bytes after the cursor this candidate supersedes.
    pub delete_after: usize,
}

impl Candidate {
    /// A candidate that inserts `replacement` at the cursor, superseding
    /// nothing.
    #[must_use]
    pub fn new(replacement: impl Into<String>) -> Self {
        Self {
            replacement: replacement.into(),
            display: None,
            help: None,
            source: None,
            delete_before: 0,
            delete_after: 0,
        }
    }

    /// Set the span of existing text this candidate replaces.
    #[must_use]
    pub fn replacing(mut self, delete_before: usize, delete_after: usize) -> Self {
        self.delete_before = delete_before;
        self.delete_after = delete_after;
        self
    }

    /// Set the display text, escaping it for safe menu rendering.
    #[must_use]
    pub fn display(mut self, display: &str) -> Self {
        self.display = Some(markup::escape(display));
        self
    }

    /// Set the help text.
    #[must_use]
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Set the provenance tag.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Menu text for this candidate.
    #[must_use]
    pub fn display_text(&self) -> &str {
        self.display.as_deref().unwrap_or(&self.replacement)
    }

    /// Apply this candidate to the buffer at its cursor: delete the
    /// superseded span, insert the replacement, land the cursor after it.
    pub fn apply(&self, buffer: &mut TextBuffer) {
        let cursor = buffer.cursor();
        let start = cursor.saturating_sub(self.delete_before);
        let end = (cursor + self.delete_after).min(buffer.len());
        buffer.delete_range(start, end);
        buffer.set_cursor(start);
        buffer.insert_at_cursor(&self.replacement);
    }
}

/// Ordered candidate collection with exact-replacement dedup and a
/// decrementing try budget.
#[derive(Debug)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
    seen: HashSet<String>,
    budget: usize,
    truncated: bool,
}

impl CandidateSet {
    /// An empty set with the given try budget.
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self {
            candidates: Vec::new(),
            seen: HashSet::new(),
            budget,
            truncated: false,
        }
    }

    /// Offer a candidate.
    ///
    /// Duplicates (same replacement) are silently dropped without touching
    /// the budget. Once the budget is spent the set marks itself truncated
    /// and refuses further candidates; a well-behaved completer checks the
    /// return value and stops generating.
    pub fn push(&mut self, candidate: Candidate) -> bool {
        if self.budget == 0 {
            self.truncated = true;
            return false;
        }
        if !self.seen.insert(candidate.replacement.clone()) {
            return true;
        }
        self.budget -= 1;
        self.candidates.push(candidate);
        true
    }

    /// The collected candidates, in offer order.
    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Number of collected candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Whether the budget ran out before the completer finished.
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Consume the set.
    #[must_use]
    pub fn into_candidates(self) -> Vec<Candidate> {
        self.candidates
    }
}

/// Host-supplied candidate generator.
pub trait Completer {
    /// Generate candidates for `text` with the cursor at byte `cursor`,
    /// pushing them into `out` until done or refused.
    fn complete(&mut self, text: &str, cursor: usize, out: &mut CandidateSet);
}

impl<F> Completer for F
where
    F: FnMut(&str, usize, &mut CandidateSet),
{
    fn complete(&mut self, text: &str, cursor: usize, out: &mut CandidateSet) {
        self(text, cursor, out)
    }
}

/// The default completer: file and directory names for the path-like word
/// before the cursor.
#[derive(Debug, Default)]
pub struct FilenameCompleter {
    /// Base for relative paths; the process cwd when `None`.
    pub base_dir: Option<PathBuf>,
}

impl FilenameCompleter {
    /// Complete relative to the process working directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(&self, dir: &str) -> PathBuf {
        let dir: &Path = if dir.is_empty() { Path::new(".") } else { Path::new(dir) };
        match (&self.base_dir, dir.is_relative()) {
            (Some(base), true) => base.join(dir),
            _ => dir.to_owned(),
        }
    }
}

impl Completer for FilenameCompleter {
    fn complete(&mut self, text: &str, cursor: usize, out: &mut CandidateSet) {
        let buffer = {
            let mut b = TextBuffer::from_text(text);
            b.set_cursor(cursor);
            b
        };
        // The path-like word is the whitespace-delimited one.
        let start = buffer.word_boundary_back(cursor, WordKind::Whitespace);
        let word = &text[start..cursor];
        let (dir_part, name_part) = match word.rfind('/') {
            Some(slash) => (&word[..=slash], &word[slash + 1..]),
            None => ("", word),
        };
        let dir = self.resolve(dir_part);
        let Ok(entries) = fs::read_dir(&dir) else {
            return;
        };
        let mut names: Vec<(String, bool)> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().into_string().ok()?;
                let is_dir = e.file_type().ok()?.is_dir();
                Some((name, is_dir))
            })
            .filter(|(name, _)| {
                name.starts_with(name_part) && (!name.starts_with('.') || name_part.starts_with('.'))
            })
            .collect();
        names.sort();
        for (name, is_dir) in names {
            let mut replacement = format!("{dir_part}{name}");
            if is_dir {
                replacement.push('/');
            }
            let display = if is_dir { format!("{name}/") } else { name };
            let candidate = Candidate::new(replacement)
                .replacing(word.len(), 0)
                .display(&display)
                .source("file");
            if !out.push(candidate) {
                return;
            }
        }
    }
}

/// Case-insensitive Levenshtein distance in codepoints.
#[must_use]
pub fn levenshtein_ci(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().flat_map(char::to_lowercase).collect();
    let b: Vec<char> = b.chars().flat_map(char::to_lowercase).collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for (i, &ac) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, &bc) in b.iter().enumerate() {
            let sub = prev[j] + usize::from(ac != bc);
            cur[j + 1] = sub.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Maximum edit distance accepted when correcting `word` against a
/// candidate of `other_len` codepoints: 1 for short words, growing to half
/// the longer string's length.
#[must_use]
pub fn correction_threshold(word_len: usize, other_len: usize) -> usize {
    (word_len.max(other_len) / 2).max(1)
}

/// Pick the candidate closest to `word` by case-insensitive edit distance.
///
/// Ties prefer the smaller length difference. The winner is accepted only
/// within [`correction_threshold`]; `None` otherwise.
#[must_use]
pub fn best_correction<'a>(word: &str, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
    let word_len = word.chars().count();
    let mut best: Option<(&Candidate, usize, usize)> = None;
    for candidate in candidates {
        let len = candidate.replacement.chars().count();
        let dist = levenshtein_ci(word, &candidate.replacement);
        let len_diff = word_len.abs_diff(len);
        let better = match best {
            None => true,
            Some((_, d, ld)) => dist < d || (dist == d && len_diff < ld),
        };
        if better {
            best = Some((candidate, dist, len_diff));
        }
    }
    let (candidate, dist, _) = best?;
    let other_len = candidate.replacement.chars().count();
    (dist <= correction_threshold(word_len, other_len)).then_some(candidate)
}

/// Longest common prefix of every candidate's resulting text, as a
/// candidate-applicable (prefix of each replacement) string.
///
/// Returns the shared prefix of the replacements themselves, on a char
/// boundary; empty when the candidates diverge immediately.
#[must_use]
pub fn common_replacement_prefix(candidates: &[Candidate]) -> String {
    let Some(first) = candidates.first() else {
        return String::new();
    };
    let mut prefix = first.replacement.clone();
    for candidate in &candidates[1..] {
        let shared = prefix
            .char_indices()
            .zip(candidate.replacement.char_indices())
            .take_while(|((_, a), (_, b))| a == b)
            .last()
            .map(|((i, c), _)| i + c.len_utf8())
            .unwrap_or(0);
        prefix.truncate(shared);
        if prefix.is_empty() {
            break;
        }
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_replaces_span_and_lands_cursor() {
        let mut buf = TextBuffer::from_text("cat fil.txt");
        buf.set_cursor(7); // after "fil"
        let candidate = Candidate::new("file").replacing(3, 4);
        candidate.apply(&mut buf);
        assert_eq!(buf.text(), "cat file");
        assert_eq!(buf.cursor(), 4 - 3 + 7);
    }

    #[test]
    fn apply_with_no_span_inserts() {
        let mut buf = TextBuffer::from_text("ab");
        buf.set_cursor(1);
        Candidate::new("XY").apply(&mut buf);
        assert_eq!(buf.text(), "aXYb");
        assert_eq!(buf.cursor(), 3);
    }

    #[test]
    fn set_dedups_by_replacement() {
        let mut set = CandidateSet::new(10);
        assert!(set.push(Candidate::new("ls")));
        assert!(set.push(Candidate::new("ls").help("again")));
        assert!(set.push(Candidate::new("cat")));
        assert_eq!(set.len(), 2);
        assert!(!set.truncated());
    }

    #[test]
    fn set_enforces_budget() {
        let mut set = CandidateSet::new(2);
        assert!(set.push(Candidate::new("a")));
        assert!(set.push(Candidate::new("b")));
        assert!(!set.push(Candidate::new("c")));
        assert_eq!(set.len(), 2);
        assert!(set.truncated());
    }

    #[test]
    fn generation_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["beta", "alpha", "banana"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let mut completer = FilenameCompleter {
            base_dir: Some(dir.path().to_owned()),
        };
        let run = |completer: &mut FilenameCompleter| {
            let mut set = CandidateSet::new(DEFAULT_BUDGET);
            completer.complete("cat b", 5, &mut set);
            set.into_candidates()
        };
        let first = run(&mut completer);
        let second = run(&mut completer);
        assert_eq!(first, second);
        let names: Vec<&str> = first.iter().map(|c| c.replacement.as_str()).collect();
        assert_eq!(names, ["banana", "beta"]);
        assert!(first.iter().all(|c| c.delete_before == 1));
    }

    #[test]
    fn filename_completer_marks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("srv.txt"), "").unwrap();
        let mut completer = FilenameCompleter {
            base_dir: Some(dir.path().to_owned()),
        };
        let mut set = CandidateSet::new(DEFAULT_BUDGET);
        completer.complete("ls sr", 5, &mut set);
        let mut names: Vec<&str> = set.candidates().iter().map(|c| c.replacement.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, ["src/", "srv.txt"]);
    }

    #[test]
    fn hidden_files_need_a_dot_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".hidden"), "").unwrap();
        std::fs::write(dir.path().join("shown"), "").unwrap();
        let mut completer = FilenameCompleter {
            base_dir: Some(dir.path().to_owned()),
        };
        let mut set = CandidateSet::new(DEFAULT_BUDGET);
        completer.complete("ls ", 3, &mut set);
        assert_eq!(set.len(), 1);
        let mut set = CandidateSet::new(DEFAULT_BUDGET);
        completer.complete("ls .", 4, &mut set);
        assert_eq!(set.candidates()[0].replacement, ".hidden");
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein_ci("kitten", "sitting"), 3);
        assert_eq!(levenshtein_ci("", "abc"), 3);
        assert_eq!(levenshtein_ci("same", "same"), 0);
        assert_eq!(levenshtein_ci("CASE", "case"), 0);
    }

    #[test]
    fn correction_accepts_close_and_rejects_far() {
        let candidates = vec![Candidate::new("status"), Candidate::new("stash")];
        let hit = best_correction("statsu", &candidates).unwrap();
        assert_eq!(hit.replacement, "status");
        assert!(best_correction("zzzzzzzz", &candidates).is_none());
    }

    #[test]
    fn correction_tie_breaks_on_length() {
        // Both are distance 1 from "cart"; "cart"-length "card" wins over
        // "carts".
        let candidates = vec![Candidate::new("carts"), Candidate::new("card")];
        let hit = best_correction("cart", &candidates).unwrap();
        assert_eq!(hit.replacement, "card");
    }

    #[test]
    fn common_prefix() {
        let candidates = vec![
            Candidate::new("config.rs"),
            Candidate::new("config.toml"),
            Candidate::new("confirm"),
        ];
        assert_eq!(common_replacement_prefix(&candidates), "confi");
        let divergent = vec![Candidate::new("abc"), Candidate::new("xyz")];
        assert_eq!(common_replacement_prefix(&divergent), "");
        assert_eq!(common_replacement_prefix(&[]), "");
    }
}
