use crate::normalize::error::NormalizerError;
use crate::types::VariantRuleConfig;
use regex::Regex;

struct VariantRule {
    pattern: Regex,
    expansions: Vec<String>,
}

/// Ordered `(pattern, expansions)` table. The first matching rule wins.
pub(crate) struct VariantTable {
    rules: Vec<VariantRule>,
}

impl VariantTable {
    pub(crate) fn compile(configs: &[VariantRuleConfig]) -> Result<Self, NormalizerError> {
        let rules = configs
            .iter()
            .map(|config| {
                let pattern =
                    Regex::new(&config.pattern).map_err(|source| NormalizerError::InvalidPattern {
                        pattern: config.pattern.clone(),
                        source,
                    })?;
                Ok(VariantRule {
                    pattern,
                    expansions: config.expansions.clone(),
                })
            })
            .collect::<Result<Vec<_>, NormalizerError>>()?;

        Ok(Self { rules })
    }

    /// Appends the expansions of the first rule matching `normalized`.
    pub(crate) fn expand(&self, normalized: &str, out: &mut Vec<String>) {
        let Some((rule, captures)) = self
            .rules
            .iter()
            .find_map(|rule| rule.pattern.captures(normalized).map(|c| (rule, c)))
        else {
            return;
        };

        for template in &rule.expansions {
            let mut expanded = String::new();
            captures.expand(template, &mut expanded);
            out.push(expanded);
        }
    }
}
