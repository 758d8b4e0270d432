use super::*;
use crate::types::{NormalizerConfig, VariantRuleConfig};
use common::standard;
use proptest::prelude::*;

mod common {
    use super::*;

    pub(super) fn standard() -> StandardNormalizer {
        StandardNormalizer::new(&NormalizerConfig::default()).unwrap()
    }
}

mod normalize {
    use super::*;

    #[test]
    fn test_lowercases_and_trims() {
        assert_eq!(standard().normalize("  Pump Valve  "), "pump valve");
    }

    #[test]
    fn test_collapses_punctuation_and_whitespace() {
        assert_eq!(standard().normalize("Pump,  valve.\t(main)"), "pump valve main");
        assert_eq!(standard().normalize("x_y"), "x y");
    }

    #[test]
    fn test_keeps_significant_chars() {
        assert_eq!(standard().normalize("A-0 / B-1"), "a-0 / b-1");
        assert_eq!(standard().normalize("A-1/1"), "a-1/1");
    }

    #[test]
    fn test_unifies_dash_variants() {
        assert_eq!(standard().normalize("A\u{2014}0"), "a-0");
        assert_eq!(standard().normalize("A\u{2212}0"), "a-0");
        assert_eq!(standard().normalize("A\u{2010}0"), "a-0");
    }

    #[test]
    fn test_folds_cyrillic_lookalikes() {
        // Cyrillic "С" and "Т" render like Latin "C" and "T".
        assert_eq!(standard().normalize("\u{0421}\u{0422}-20"), "ct-20");
        assert_eq!(standard().normalize("ct-20"), "ct-20");
    }

    #[test]
    fn test_fold_can_be_disabled() {
        let config = NormalizerConfig {
            fold_confusables: false,
            ..NormalizerConfig::default()
        };
        let normalizer = StandardNormalizer::new(&config).unwrap();

        assert_eq!(normalizer.normalize("\u{0421}-20"), "\u{0441}-20");
    }

    #[test]
    fn test_nul_and_nbsp_become_spaces() {
        assert_eq!(standard().normalize("a\0b\u{00A0}c"), "a b c");
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert_eq!(standard().normalize(""), "");
        assert_eq!(standard().normalize(" ,.; "), "");
    }

    #[test]
    fn test_cell_truncation() {
        let config = NormalizerConfig {
            max_cell_chars: 5,
            max_query_chars: 3,
            ..NormalizerConfig::default()
        };
        let normalizer = StandardNormalizer::new(&config).unwrap();

        assert_eq!(normalizer.normalize("abcdefgh"), "abcde");
        assert_eq!(normalizer.normalize_query("abcdefgh"), "abc");
        assert_eq!(normalizer.normalize("abcd efgh"), "abcd");
    }
}

mod tokens {
    use super::*;

    #[test]
    fn test_tokenize_splits_on_spaces() {
        let normalizer = standard();
        assert_eq!(normalizer.tokenize("a-0 b c"), vec!["a-0", "b", "c"]);
        assert!(normalizer.tokenize("").is_empty());
    }

    #[test]
    fn test_numeric_fragments() {
        let normalizer = standard();

        assert_eq!(normalizer.derived_tokens("m-95"), vec!["95".to_string()]);
        assert_eq!(
            normalizer.derived_tokens("x12-345-6"),
            vec!["12".to_string(), "345".to_string()]
        );
        assert!(normalizer.derived_tokens("pump").is_empty());
        assert!(normalizer.derived_tokens("a-1").is_empty());
    }

    #[test]
    fn test_numeric_fragments_split_long_runs() {
        assert_eq!(
            standard().derived_tokens("n12345678"),
            vec!["123456".to_string(), "78".to_string()]
        );
    }

    #[test]
    fn test_numeric_fragments_are_capped_per_token() {
        assert_eq!(standard().derived_tokens("11-22-33-44").len(), 3);
    }

    #[test]
    fn test_numeric_token_is_not_repeated() {
        assert!(standard().derived_tokens("95").is_empty());
    }

    #[test]
    fn test_index_tokens_include_fragments() {
        assert_eq!(
            standard().index_tokens("Motor M-95"),
            vec!["motor".to_string(), "m-95".to_string(), "95".to_string()]
        );
    }
}

mod variants {
    use super::*;

    #[test]
    fn test_first_variant_is_the_query() {
        let variants = standard().variants("pump valve");
        assert_eq!(variants[0], "pump valve");
        assert_eq!(variants[1], "pumpvalve");
        assert_eq!(variants.len(), 2);
    }

    #[test]
    fn test_letter_number_expansion() {
        assert_eq!(standard().variants("a0"), vec!["a0", "a-0", "a 0"]);
        assert_eq!(standard().variants("a 0"), vec!["a 0", "a0", "a-0"]);
        assert_eq!(standard().variants("a-0"), vec!["a-0", "a0", "a 0"]);
    }

    #[test]
    fn test_letter_dash_expansion() {
        assert_eq!(standard().variants("a-"), vec!["a-", "a"]);
    }

    #[test]
    fn test_no_duplicates() {
        let variants = standard().variants("b");
        assert_eq!(variants, vec!["b"]);
    }

    #[test]
    fn test_custom_rules() {
        let config = NormalizerConfig {
            variant_rules: vec![VariantRuleConfig {
                pattern: r"^no\.?(\d+)$".to_string(),
                expansions: vec!["no ${1}".to_string(), "${1}".to_string()],
            }],
            ..NormalizerConfig::default()
        };
        let normalizer = StandardNormalizer::new(&config).unwrap();

        assert_eq!(normalizer.variants("no7"), vec!["no7", "no 7", "7"]);
    }

    #[test]
    fn test_invalid_rule_is_rejected() {
        let config = NormalizerConfig {
            variant_rules: vec![VariantRuleConfig {
                pattern: "(".to_string(),
                expansions: vec![],
            }],
            ..NormalizerConfig::default()
        };

        assert!(matches!(
            StandardNormalizer::new(&config),
            Err(error::NormalizerError::InvalidPattern { .. })
        ));
    }
}

mod fingerprint {
    use super::*;

    fn with(config: NormalizerConfig) -> u64 {
        StandardNormalizer::new(&config).unwrap().fingerprint()
    }

    #[test]
    fn test_same_config_same_fingerprint() {
        assert_eq!(standard().fingerprint(), standard().fingerprint());
    }

    #[test]
    fn test_index_settings_change_fingerprint() {
        let base = standard().fingerprint();

        let folded = with(NormalizerConfig {
            fold_confusables: false,
            ..NormalizerConfig::default()
        });
        let truncated = with(NormalizerConfig {
            max_cell_chars: 8,
            ..NormalizerConfig::default()
        });
        let significant = with(NormalizerConfig {
            significant_chars: vec!['-'],
            ..NormalizerConfig::default()
        });
        let mut fragments = NormalizerConfig::default();
        fragments.numeric_fragments.min_len += 1;

        assert_ne!(folded, base);
        assert_ne!(truncated, base);
        assert_ne!(significant, base);
        assert_ne!(with(fragments), base);
    }

    #[test]
    fn test_query_settings_keep_fingerprint() {
        let base = standard().fingerprint();

        let query_limit = with(NormalizerConfig {
            max_query_chars: 10,
            ..NormalizerConfig::default()
        });
        let rules = with(NormalizerConfig {
            variant_rules: vec![],
            ..NormalizerConfig::default()
        });

        assert_eq!(query_limit, base);
        assert_eq!(rules, base);
    }
}

proptest! {
    #[test]
    fn normalize_is_idempotent(text in "\\PC{0,64}") {
        let normalizer = standard();
        let once = normalizer.normalize(&text);
        prop_assert_eq!(normalizer.normalize(&once), once.clone());
    }

    #[test]
    fn normalized_text_has_no_edge_or_double_spaces(text in "[ a-zA-Z0-9.,;_-]{0,48}") {
        let normalized = standard().normalize(&text);
        prop_assert_eq!(normalized.trim(), normalized.as_str());
        prop_assert!(!normalized.contains("  "));
    }
}
