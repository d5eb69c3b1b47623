//! Obfuscated-name generation.
//!
//! Names come out of one ordered stream: a short list of source-language
//! keywords that are perfectly legal class-file identifiers (they confuse
//! decompilers, which is a bonus), then generated names of growing length
//! over a mixed-radix counter - the first character drawn from `a..z`, later
//! characters from `a..z0..9`. Candidates in the caller's exclusion set are
//! skipped; past the keyword region, generated candidates that spell a
//! keyword again or sit in the forbidden-word set are skipped too (class
//! names become file names, and some file names are reserved by the host
//! filesystem).

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

/// Keywords emitted before generated names. All are legal JVM identifiers.
const KEYWORDS: &[&str] = &[
    "if", "do", "for", "int", "new", "try", "byte", "case", "char", "else", "goto", "long",
    "this", "void", "break", "while", "catch", "class", "final", "super", "throw", "float",
    "short", "const",
];

/// File names reserved by common host filesystems; forbidden for class and
/// package names because those become file names in the output container.
pub const DEVICE_WORDS: &[&str] = &[
    "aux", "con", "nul", "prn", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Session-wide counter of how often each output name was handed out.
/// Thread-safe; the report renders it sorted by descending count.
#[derive(Debug, Default)]
pub struct FrequencyTable {
    counts: DashMap<String, u64>,
}

impl FrequencyTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> FrequencyTable {
        FrequencyTable::default()
    }

    /// Count one use of `name`.
    pub fn record(&self, name: &str) {
        *self.counts.entry(name.to_string()).or_insert(0) += 1;
    }

    /// All `(name, count)` pairs, descending by count, ties broken by name.
    #[must_use]
    pub fn sorted(&self) -> Vec<(String, u64)> {
        let mut pairs: Vec<(String, u64)> = self
            .counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        pairs
    }

    /// `true` when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// One ordered name stream. Each generator owns its position; distinct
/// generators emit overlapping streams on purpose (method overloads of
/// different argument shapes may legally share a name).
#[derive(Debug)]
pub struct NameGenerator {
    /// Position in [`KEYWORDS`], or past its end.
    keyword_pos: usize,
    /// Mixed-radix counter for generated names.
    counter: u64,
    /// Candidates skipped past the keyword region.
    forbidden: HashSet<String>,
    frequencies: Option<Arc<FrequencyTable>>,
}

impl NameGenerator {
    /// A generator with no forbidden words and no frequency recording.
    #[must_use]
    pub fn new() -> NameGenerator {
        NameGenerator {
            keyword_pos: 0,
            counter: 0,
            forbidden: HashSet::new(),
            frequencies: None,
        }
    }

    /// Skip `words` in the generated region (keywords are never in it).
    #[must_use]
    pub fn with_forbidden<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forbidden.extend(words.into_iter().map(Into::into));
        self
    }

    /// Record every emitted name in `table`.
    #[must_use]
    pub fn with_frequencies(mut self, table: Arc<FrequencyTable>) -> Self {
        self.frequencies = Some(table);
        self
    }

    /// The next name not contained in `exclude`.
    pub fn next(&mut self, exclude: &HashSet<String>) -> String {
        loop {
            let candidate = if self.keyword_pos < KEYWORDS.len() {
                let word = KEYWORDS[self.keyword_pos];
                self.keyword_pos += 1;
                word.to_string()
            } else {
                let name = nth_name(self.counter);
                self.counter += 1;
                // The counter regenerates short keyword strings; those were
                // already emitted by the keyword region.
                if KEYWORDS.contains(&name.as_str()) || self.forbidden.contains(&name) {
                    continue;
                }
                name
            };
            if exclude.contains(&candidate) {
                continue;
            }
            if let Some(table) = &self.frequencies {
                table.record(&candidate);
            }
            return candidate;
        }
    }
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// The `n`-th generated name: all 1-character names (`a..z`), then all
/// 2-character names (first char `a..z`, second `a..z0..9`), and so on.
fn nth_name(mut n: u64) -> String {
    let mut length = 1u32;
    let mut block = 26u64;
    while n >= block {
        n -= block;
        length += 1;
        block = 26 * 36u64.pow(length - 1);
    }

    let tail = 36u64.pow(length - 1);
    let mut name = String::with_capacity(length as usize);
    name.push((b'a' + (n / tail) as u8) as char);
    let mut rest = n % tail;
    for position in (0..length - 1).rev() {
        let digit = (rest / 36u64.pow(position)) % 36;
        rest %= 36u64.pow(position);
        name.push(if digit < 26 {
            (b'a' + digit as u8) as char
        } else {
            (b'0' + (digit - 26) as u8) as char
        });
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_starts_with_keywords() {
        let mut generator = NameGenerator::new();
        let exclude = HashSet::new();
        assert_eq!(generator.next(&exclude), "if");
        assert_eq!(generator.next(&exclude), "do");
        assert_eq!(generator.next(&exclude), "for");
    }

    #[test]
    fn generated_names_follow_mixed_radix_order() {
        assert_eq!(nth_name(0), "a");
        assert_eq!(nth_name(25), "z");
        assert_eq!(nth_name(26), "aa");
        assert_eq!(nth_name(26 + 25), "az");
        assert_eq!(nth_name(26 + 26), "a0");
        assert_eq!(nth_name(26 + 35), "a9");
        assert_eq!(nth_name(26 + 36), "ba");
        assert_eq!(nth_name(26 + 26 * 36), "aaa");
    }

    #[test]
    fn exclusion_skips_candidates() {
        let mut generator = NameGenerator::new();
        let exclude: HashSet<String> = ["if", "do"].iter().map(|s| s.to_string()).collect();
        assert_eq!(generator.next(&exclude), "for");
    }

    #[test]
    fn forbidden_words_skipped_past_keywords() {
        let mut generator = NameGenerator::new().with_forbidden(["a", "b"]);
        let exclude = HashSet::new();
        for _ in 0..KEYWORDS.len() {
            generator.next(&exclude);
        }
        assert_eq!(generator.next(&exclude), "c");
    }

    #[test]
    fn emissions_are_recorded() {
        let table = Arc::new(FrequencyTable::new());
        let mut generator = NameGenerator::new().with_frequencies(Arc::clone(&table));
        let exclude = HashSet::new();
        let first = generator.next(&exclude);
        generator.next(&exclude);
        let sorted = table.sorted();
        assert_eq!(sorted.len(), 2);
        assert!(sorted.iter().any(|(name, count)| *name == first && *count == 1));
    }

    #[test]
    fn streams_never_repeat_within_one_generator() {
        let mut generator = NameGenerator::new();
        let exclude = HashSet::new();
        let mut seen = HashSet::new();
        for _ in 0..2_000 {
            assert!(seen.insert(generator.next(&exclude)));
        }
    }
}
