#![forbid(unsafe_code)]

//! Command history: bounded ring, flat-file persistence, search.
//!
//! # Design
//!
//! The backing store is a `VecDeque` ring (index 0 oldest) persisted as one
//! escaped line per entry in a flat log. Writes are append-only; the file
//! is never rewritten, so a dedup-deleted entry lives on in the file until
//! the next full load re-applies dedup. Lines starting with `#` are
//! headers/comments and are skipped on load.
//!
//! Three search primitives back the editor's recall modes: prefix search
//! (up/down with a typed prefix), exact substring search (incremental
//! reverse search), and fuzzy subsequence search with heuristic scoring.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default ring capacity.
pub const DEFAULT_CAPACITY: usize = 200;
/// Capacity ceiling; `set_capacity` clamps here.
pub const HARD_CAP: usize = 5000;
/// Fuzzy search keeps at most this many results.
pub const FUZZY_RESULT_CAP: usize = 50;

/// One stored command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Command text, trimmed of leading/trailing blank lines.
    pub text: String,
    /// Exit code of the command, when the host reported one.
    pub exit_code: Option<i32>,
    /// Unix timestamp of the push (0 for entries loaded from file).
    pub timestamp: u64,
}

/// One fuzzy-search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryMatch {
    /// Ring index of the entry.
    pub index: usize,
    /// Heuristic score; higher is better.
    pub score: i32,
    /// Byte offset of the first matched character in the entry.
    pub start: usize,
    /// Byte length of the matched span.
    pub len: usize,
}

/// Direction for index-relative searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDir {
    /// Toward older entries (decreasing index).
    Back,
    /// Toward newer entries (increasing index).
    Forward,
}

/// The history ring.
#[derive(Debug, Default)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    dedup: bool,
    path: Option<PathBuf>,
}

impl History {
    /// An empty, memory-only history with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: DEFAULT_CAPACITY,
            dedup: true,
            path: None,
        }
    }

    /// Load `path` (tolerating a missing file) and remember it for
    /// append-on-push.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut history = Self::new();
        history.attach_file(path)?;
        Ok(history)
    }

    /// Attach a log file: load what exists, append future pushes.
    pub fn attach_file(&mut self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line?;
                    if line.starts_with('#') || line.is_empty() {
                        continue;
                    }
                    self.insert(HistoryEntry {
                        text: unescape_entry(&line),
                        exit_code: None,
                        timestamp: 0,
                    });
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.path = Some(path.to_owned());
        Ok(())
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ring is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index` (0 oldest).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Current capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Set the capacity (clamped to [`HARD_CAP`]), evicting oldest entries
    /// immediately if needed.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.clamp(1, HARD_CAP);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Toggle duplicate collapsing for future pushes.
    pub fn set_dedup(&mut self, dedup: bool) {
        self.dedup = dedup;
    }

    /// Store a command.
    ///
    /// Leading and trailing all-blank lines are trimmed first; a push that
    /// trims to nothing is ignored. With dedup on, an identical stored
    /// entry is removed so the new push is the single surviving copy (and
    /// carries this push's exit code). The escaped text is appended to the
    /// attached log file, best-effort.
    pub fn push(&mut self, text: &str, exit_code: Option<i32>) {
        let text = trim_blank_lines(text);
        if text.is_empty() {
            return;
        }
        let entry = HistoryEntry {
            text: text.to_owned(),
            exit_code,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        self.append_to_file(&entry.text);
        self.insert(entry);
    }

    fn insert(&mut self, entry: HistoryEntry) {
        if self.dedup {
            self.entries.retain(|e| e.text != entry.text);
        }
        while self.entries.len() >= self.capacity.min(HARD_CAP) {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    fn append_to_file(&self, text: &str) {
        let Some(path) = &self.path else {
            return;
        };
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| writeln!(f, "{}", escape_entry(text)));
        if let Err(e) = result {
            tracing::debug!(path = %path.display(), error = %e, "history append failed");
        }
    }

    /// First entry whose text starts with `prefix`, scanning from `from`
    /// (inclusive) in `dir`.
    #[must_use]
    pub fn prefix_search(&self, prefix: &str, from: usize, dir: SearchDir) -> Option<usize> {
        self.scan(from, dir, |e| e.text.starts_with(prefix).then_some(0))
            .map(|(i, _)| i)
    }

    /// First entry containing `query` as an exact substring, scanning from
    /// `from` (inclusive) in `dir`. Returns (index, byte position of the
    /// match).
    #[must_use]
    pub fn substring_search(&self, query: &str, from: usize, dir: SearchDir) -> Option<(usize, usize)> {
        self.scan(from, dir, |e| e.text.find(query))
    }

    fn scan<F>(&self, from: usize, dir: SearchDir, probe: F) -> Option<(usize, usize)>
    where
        F: Fn(&HistoryEntry) -> Option<usize>,
    {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        let mut index = from.min(last);
        loop {
            if let Some(pos) = probe(&self.entries[index]) {
                return Some((index, pos));
            }
            match dir {
                SearchDir::Back => {
                    if index == 0 {
                        return None;
                    }
                    index -= 1;
                }
                SearchDir::Forward => {
                    if index == last {
                        return None;
                    }
                    index += 1;
                }
            }
        }
    }

    /// Fuzzy subsequence search over the whole ring.
    ///
    /// Every query character must appear in order in the entry. Results are
    /// capped at [`FUZZY_RESULT_CAP`]; once full, a better match replaces
    /// the current lowest scorer. Final order is score descending, recency
    /// (higher index) breaking ties.
    #[must_use]
    pub fn fuzzy_search(&self, query: &str) -> Vec<HistoryMatch> {
        let mut results: Vec<HistoryMatch> = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            let Some((score, start, len)) = fuzzy_score(query, &entry.text) else {
                continue;
            };
            let m = HistoryMatch { index, score, start, len };
            if results.len() < FUZZY_RESULT_CAP {
                results.push(m);
            } else if let Some(worst) = results
                .iter()
                .enumerate()
                .min_by_key(|(_, r)| (r.score, r.index))
                .map(|(i, _)| i)
            {
                if m.score > results[worst].score {
                    results[worst] = m;
                }
            }
        }
        results.sort_by(|a, b| b.score.cmp(&a.score).then(b.index.cmp(&a.index)));
        results
    }
}

/// Strip leading and trailing all-blank lines (interior blanks stay).
#[must_use]
pub fn trim_blank_lines(text: &str) -> &str {
    let mut start = 0;
    let mut end = text.len();
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            start += line.len();
        } else {
            break;
        }
    }
    while end > start {
        let tail = &text[start..end];
        let line_start = match tail.rfind('\n') {
            Some(nl) => nl + 1,
            None => 0,
        };
        if tail[line_start..].trim().is_empty() {
            // Drop the blank line and the newline that preceded it.
            end = start + line_start.saturating_sub(1);
        } else {
            break;
        }
    }
    &text[start..end]
}

/// Escape one entry for the log file: backslash, newline, tab, and other
/// control bytes.
#[must_use]
pub fn escape_entry(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

/// Undo [`escape_entry`]. Malformed escape tails are kept verbatim so a
/// hand-edited or truncated log never fails to load.
#[must_use]
pub fn unescape_entry(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('x') => {
                let hi = chars.peek().copied().and_then(|c| c.to_digit(16));
                let hex = match hi {
                    Some(hi) => {
                        chars.next();
                        let lo = chars.peek().copied().and_then(|c| c.to_digit(16));
                        match lo {
                            Some(lo) => {
                                chars.next();
                                Some(hi * 16 + lo)
                            }
                            None => Some(hi),
                        }
                    }
                    None => None,
                };
                match hex.and_then(char::from_u32) {
                    Some(c) => out.push(c),
                    None => out.push_str("\\x"),
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Score `query` against `entry` as a case-insensitive in-order
/// subsequence. `None` when the query does not match at all.
///
/// Returns (score, match start byte, match span bytes). The constants are
/// tuned, not derived; consecutive runs dominate, separator-anchored runs
/// and exact case add, spread-out matches and long entries subtract.
#[must_use]
pub fn fuzzy_score(query: &str, entry: &str) -> Option<(i32, usize, usize)> {
    if query.is_empty() {
        return Some((0, 0, 0));
    }
    let mut score: i32 = 0;
    let mut query_chars = query.chars();
    let mut want = query_chars.next()?;
    let mut first_match: Option<usize> = None;
    let mut last_match_end = 0usize;
    let mut prev_matched_at: Option<usize> = None;
    let mut prev_char: Option<char> = None;
    let mut run_len = 0usize;
    let mut longest_run = 0usize;
    let mut done = false;

    for (i, c) in entry.char_indices() {
        if !done && c.to_lowercase().eq(want.to_lowercase()) {
            score += 1;
            if c == want {
                score += 2;
            }
            let consecutive = prev_matched_at == Some(i.wrapping_sub(prev_char_len(entry, i)));
            if consecutive {
                run_len += 1;
                score += 5;
            } else {
                // A fresh run anchored at the start or right after a
                // separator scores the boundary bonus.
                if first_match.is_none() && i == 0 {
                    score += 10;
                } else if matches!(prev_char, Some(' ' | '/' | '-' | '_')) {
                    score += 10;
                }
                run_len = 1;
            }
            longest_run = longest_run.max(run_len);
            first_match.get_or_insert(i);
            last_match_end = i + c.len_utf8();
            prev_matched_at = Some(i);
            match query_chars.next() {
                Some(next) => want = next,
                None => done = true,
            }
        }
        prev_char = Some(c);
    }
    if !done {
        return None;
    }
    let start = first_match.unwrap_or(0);
    let span_chars = entry[start..last_match_end].chars().count();
    score += 2 * longest_run as i32;
    score -= (span_chars / 2) as i32;
    score -= (entry.chars().count() / 10) as i32;
    Some((score, start, last_match_end - start))
}

/// Byte length of the character ending at byte `i` of `s` (0 when `i` is
/// the start).
fn prev_char_len(s: &str, i: usize) -> usize {
    s[..i].chars().next_back().map_or(0, char::len_utf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_evicts_oldest() {
        let mut h = History::new();
        h.set_capacity(2);
        h.push("a", None);
        h.push("b", None);
        h.push("c", None);
        assert_eq!(h.len(), 2);
        assert_eq!(h.get(0).unwrap().text, "b");
        assert_eq!(h.get(1).unwrap().text, "c");
    }

    #[test]
    fn dedup_keeps_latest_exit_code() {
        let mut h = History::new();
        h.push("make", Some(1));
        h.push("ls", None);
        h.push("make", Some(0));
        assert_eq!(h.len(), 2);
        let survivor = h.get(1).unwrap();
        assert_eq!(survivor.text, "make");
        assert_eq!(survivor.exit_code, Some(0));
    }

    #[test]
    fn dedup_off_retains_duplicates() {
        let mut h = History::new();
        h.set_dedup(false);
        h.push("make", Some(1));
        h.push("make", Some(0));
        assert_eq!(h.len(), 2);
        assert_eq!(h.get(0).unwrap().exit_code, Some(1));
        assert_eq!(h.get(1).unwrap().exit_code, Some(0));
    }

    #[test]
    fn blank_line_trimming() {
        assert_eq!(trim_blank_lines("  \n\ncmd\n  \n"), "cmd");
        assert_eq!(trim_blank_lines("a\n\nb"), "a\n\nb");
        assert_eq!(trim_blank_lines("   \n \n"), "");
        let mut h = History::new();
        h.push("  \n  ", None);
        assert!(h.is_empty());
    }

    #[test]
    fn entry_escaping_round_trips() {
        for text in ["plain", "two\nlines", "tab\there", "back\\slash", "bell\x07"] {
            let escaped = escape_entry(text);
            assert!(!escaped.contains('\n'));
            assert_eq!(unescape_entry(&escaped), text);
        }
    }

    #[test]
    fn unescape_tolerates_malformed_tails() {
        assert_eq!(unescape_entry("a\\q"), "a\\q");
        assert_eq!(unescape_entry("trailing\\"), "trailing\\");
        assert_eq!(unescape_entry("bad\\xzz"), "bad\\xzz");
    }

    #[test]
    fn file_round_trip_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");
        std::fs::write(&path, "# tideline history v1\nls -l\necho \\\"two\\nlines\\\"\n").unwrap();
        let h = History::open(&path).unwrap();
        assert_eq!(h.len(), 2);
        assert_eq!(h.get(0).unwrap().text, "ls -l");
        assert!(h.get(1).unwrap().text.contains('\n'));
    }

    #[test]
    fn push_appends_without_rewriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");
        let mut h = History::open(&path).unwrap();
        h.push("first", None);
        h.push("second\nline", None);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\\nline\n");

        // Dedup deletes in memory only; the file keeps growing.
        h.push("first", None);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn prefix_search_directions() {
        let mut h = History::new();
        for cmd in ["git status", "ls", "git push", "make"] {
            h.push(cmd, None);
        }
        assert_eq!(h.prefix_search("git", 3, SearchDir::Back), Some(2));
        assert_eq!(h.prefix_search("git", 1, SearchDir::Back), Some(0));
        assert_eq!(h.prefix_search("git", 1, SearchDir::Forward), Some(2));
        assert_eq!(h.prefix_search("nope", 3, SearchDir::Back), None);
    }

    #[test]
    fn substring_search_reports_position() {
        let mut h = History::new();
        h.push("echo hello", None);
        h.push("make test", None);
        assert_eq!(h.substring_search("test", 1, SearchDir::Back), Some((1, 5)));
        assert_eq!(h.substring_search("hello", 1, SearchDir::Back), Some((0, 5)));
    }

    #[test]
    fn fuzzy_requires_in_order_subsequence() {
        assert!(fuzzy_score("gts", "git status").is_some());
        assert!(fuzzy_score("stg", "git status").is_none());
    }

    #[test]
    fn fuzzy_verbatim_beats_subsequence() {
        let entry = "git commit";
        let (full, _, _) = fuzzy_score(entry, entry).unwrap();
        let (sub, _, _) = fuzzy_score("gcm", entry).unwrap();
        assert!(full >= sub, "full={full} sub={sub}");
    }

    #[test]
    fn fuzzy_prefers_consecutive_and_boundary_matches() {
        let (anchored, _, _) = fuzzy_score("sta", "git status").unwrap();
        let (scattered, _, _) = fuzzy_score("sta", "suitcase anthem").unwrap();
        assert!(anchored > scattered, "anchored={anchored} scattered={scattered}");
    }

    #[test]
    fn fuzzy_reports_match_span() {
        let (_, start, len) = fuzzy_score("status", "git status").unwrap();
        assert_eq!(start, 4);
        assert_eq!(len, 6);
    }

    #[test]
    fn fuzzy_results_ordered_and_capped() {
        let mut h = History::new();
        h.set_dedup(false);
        h.set_capacity(HARD_CAP);
        for i in 0..80 {
            h.push(&format!("command-{i}"), None);
        }
        let results = h.fuzzy_search("command");
        assert_eq!(results.len(), FUZZY_RESULT_CAP);
        for pair in results.windows(2) {
            assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].index > pair[1].index)
            );
        }
    }

    #[test]
    fn fuzzy_case_bonus() {
        let (exact, _, _) = fuzzy_score("Make", "Make all").unwrap();
        let (folded, _, _) = fuzzy_score("make", "Make all").unwrap();
        assert!(exact > folded);
    }
}
