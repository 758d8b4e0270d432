use crate::normalize::Normalizer;
use crate::normalize::error::NormalizerError;
use crate::normalize::variants::VariantTable;
use crate::types::{NormalizerConfig, NumericFragmentConfig};

/// The default normalizer.
///
/// Lowercases, unifies dash variants, optionally folds Cyrillic
/// look-alikes onto Latin, and collapses whitespace and punctuation other
/// than the significant characters into single spaces.
pub struct StandardNormalizer {
    fold_confusables: bool,
    max_query_chars: usize,
    max_cell_chars: usize,
    significant_chars: Vec<char>,
    fragments: NumericFragmentConfig,
    variant_table: VariantTable,
    fingerprint: u64,
}

impl StandardNormalizer {
    pub fn new(config: &NormalizerConfig) -> Result<Self, NormalizerError> {
        Ok(Self {
            fold_confusables: config.fold_confusables,
            max_query_chars: config.max_query_chars,
            max_cell_chars: config.max_cell_chars,
            significant_chars: config.significant_chars.clone(),
            fragments: config.numeric_fragments.clone(),
            variant_table: VariantTable::compile(&config.variant_rules)?,
            fingerprint: index_fingerprint(config),
        })
    }

    fn canonicalize(&self, text: &str, max_chars: usize) -> String {
        let mut out = String::with_capacity(text.len().min(max_chars * 2));
        let mut emitted = 0usize;
        let mut pending_space = false;

        'outer: for raw in text.chars() {
            for lower in raw.to_lowercase() {
                let ch = self.fold(lower);
                if ch == '\0'
                    || ch.is_whitespace()
                    || (ch.is_ascii_punctuation() && !self.significant_chars.contains(&ch))
                {
                    pending_space = !out.is_empty();
                    continue;
                }

                if pending_space {
                    if emitted + 2 > max_chars {
                        break 'outer;
                    }
                    out.push(' ');
                    emitted += 1;
                    pending_space = false;
                }
                if emitted >= max_chars {
                    break 'outer;
                }
                out.push(ch);
                emitted += 1;
            }
        }

        out
    }

    fn fold(&self, ch: char) -> char {
        let ch = match ch {
            '\u{2010}'..='\u{2014}' | '\u{2212}' => '-',
            'ё' => 'е',
            other => other,
        };
        if !self.fold_confusables {
            return ch;
        }
        match ch {
            'а' => 'a',
            'в' => 'b',
            'с' => 'c',
            'е' => 'e',
            'н' => 'h',
            'к' => 'k',
            'м' => 'm',
            'о' => 'o',
            'р' => 'p',
            'т' => 't',
            'х' => 'x',
            'у' => 'y',
            other => other,
        }
    }
}

impl Normalizer for StandardNormalizer {
    fn normalize(&self, text: &str) -> String {
        self.canonicalize(text, self.max_cell_chars)
    }

    fn normalize_query(&self, text: &str) -> String {
        self.canonicalize(text, self.max_query_chars)
    }

    /// Digit runs of `min_len..=max_len` inside a token that holds a digit.
    ///
    /// Longer runs are cut into `max_len` chunks from the left; a trailing
    /// chunk shorter than `min_len` is dropped.
    fn derived_tokens(&self, token: &str) -> Vec<String> {
        let mut fragments = Vec::new();
        let NumericFragmentConfig {
            min_len,
            max_len,
            max_per_token,
        } = self.fragments;
        if max_len == 0 || max_per_token == 0 || !token.bytes().any(|b| b.is_ascii_digit()) {
            return fragments;
        }

        for run in token.split(|c: char| !c.is_ascii_digit()) {
            let mut rest = run;
            while !rest.is_empty() {
                let take = rest.len().min(max_len);
                let (chunk, tail) = rest.split_at(take);
                rest = tail;
                if chunk.len() < min_len {
                    continue;
                }
                if chunk != token && !fragments.iter().any(|f| f == chunk) {
                    fragments.push(chunk.to_string());
                }
                if fragments.len() >= max_per_token {
                    return fragments;
                }
            }
        }

        fragments
    }

    fn variants(&self, normalized: &str) -> Vec<String> {
        let mut candidates = vec![normalized.to_string()];

        let compact: String = normalized.chars().filter(|c| !c.is_whitespace()).collect();
        candidates.push(compact);

        self.variant_table.expand(normalized, &mut candidates);

        let mut variants: Vec<String> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if candidate.trim().is_empty() || variants.contains(&candidate) {
                continue;
            }
            variants.push(candidate);
        }
        variants
    }

    fn significant_chars(&self) -> &[char] {
        &self.significant_chars
    }

    fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

/// BLAKE3 over the settings that shape cell tokens. Query limits and
/// variant rules are left out.
fn index_fingerprint(config: &NormalizerConfig) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"standard");
    hasher.update(&[u8::from(config.fold_confusables)]);
    hasher.update(&(config.max_cell_chars as u64).to_le_bytes());
    hasher.update(&(config.significant_chars.len() as u64).to_le_bytes());
    for ch in &config.significant_chars {
        hasher.update(&u32::from(*ch).to_le_bytes());
    }
    let fragments = &config.numeric_fragments;
    for value in [fragments.min_len, fragments.max_len, fragments.max_per_token] {
        hasher.update(&(value as u64).to_le_bytes());
    }

    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(head)
}
