//! Model pricing table and provider derivation.
//!
//! Two independent lookups live here because the spec keeps them independent:
//! provider derivation is a pure function of the model name prefix and never
//! fails (unknown prefixes fall back to [`Provider::Unknown`]); price lookup
//! is a best-effort table scan that returns zero cost for unknown models
//! without affecting provider derivation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Upstream LLM provider, derived from the model name (§4.11.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    DeepSeek,
    /// The model name didn't match any known prefix. Still routable if a
    /// caller configured an explicit base URL, but the gateway cannot price
    /// it and cannot derive an API key header for it.
    Unknown,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::DeepSeek => "deepseek",
            Provider::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the upstream provider from a model name.
///
/// Matches `spec.md` §4.11.1 verbatim: `gpt-*` / `o1*` / `o3*` / `o4*` are
/// OpenAI, `claude-*` is Anthropic, `deepseek-*` is DeepSeek. Anything else
/// is [`Provider::Unknown`] — callers still record it (cost zero) rather
/// than treating it as an error.
pub fn derive_provider(model: &str) -> Provider {
    let m = model.to_ascii_lowercase();
    if m.starts_with("gpt-") || m.starts_with("o1") || m.starts_with("o3") || m.starts_with("o4") {
        Provider::OpenAi
    } else if m.starts_with("claude-") {
        Provider::Anthropic
    } else if m.starts_with("deepseek-") {
        Provider::DeepSeek
    } else {
        Provider::Unknown
    }
}

/// USD price per 1,000,000 tokens for a single model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPrice {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self { input_per_million, output_per_million }
    }

    /// Cost in USD for the given token counts.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (self.input_per_million * input_tokens as f64
            + self.output_per_million * output_tokens as f64)
            / 1_000_000.0
    }
}

/// A bundled, overridable model→price table.
///
/// Lookup order (§4.13): case-insensitive exact match first, then the
/// longest configured prefix of the model name. A model that matches
/// nothing prices at zero but is still recorded with its derived provider.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    entries: HashMap<String, ModelPrice>,
}

impl PricingTable {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Build a table from the bundled static defaults.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for (model, price) in STATIC_PRICES {
            table.insert(model, *price);
        }
        table
    }

    pub fn insert(&mut self, model: impl Into<String>, price: ModelPrice) {
        self.entries.insert(model.into().to_ascii_lowercase(), price);
    }

    /// List every priced model id, sorted for deterministic `/v1/models` output.
    pub fn model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Look up a price: exact match, then longest-prefix match.
    ///
    /// `gpt-4o-2024-08-06` resolves to `gpt-4o` because `gpt-4o` is the
    /// longest registered key that is a prefix of the queried model name.
    pub fn lookup(&self, model: &str) -> Option<ModelPrice> {
        let needle = model.to_ascii_lowercase();
        if let Some(p) = self.entries.get(&needle) {
            return Some(*p);
        }
        self.entries
            .keys()
            .filter(|k| needle.starts_with(k.as_str()))
            .max_by_key(|k| k.len())
            .map(|k| self.entries[k])
    }

    /// Cost for the given model and token counts. Zero for an unpriced model
    /// (still recorded by the caller — see `spec.md` §3 invariants).
    pub fn cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        self.lookup(model)
            .map(|p| p.cost(input_tokens, output_tokens))
            .unwrap_or(0.0)
    }
}

/// Bundled default prices, USD per 1M tokens. Not exhaustive — operators
/// extend via [`PricingTable::insert`] from their own config.
static STATIC_PRICES: &[(&str, ModelPrice)] = &[
    ("gpt-4o", ModelPrice::new(2.50, 10.00)),
    ("gpt-4o-mini", ModelPrice::new(0.15, 0.60)),
    ("gpt-4-turbo", ModelPrice::new(10.00, 30.00)),
    ("gpt-4", ModelPrice::new(30.00, 60.00)),
    ("gpt-3.5-turbo", ModelPrice::new(0.50, 1.50)),
    ("o1", ModelPrice::new(15.00, 60.00)),
    ("o1-mini", ModelPrice::new(1.10, 4.40)),
    ("o3-mini", ModelPrice::new(1.10, 4.40)),
    ("claude-opus-4", ModelPrice::new(15.00, 75.00)),
    ("claude-sonnet-4", ModelPrice::new(3.00, 15.00)),
    ("claude-3-5-sonnet", ModelPrice::new(3.00, 15.00)),
    ("claude-3-5-haiku", ModelPrice::new(0.80, 4.00)),
    ("claude-3-haiku", ModelPrice::new(0.25, 1.25)),
    ("deepseek-chat", ModelPrice::new(0.27, 1.10)),
    ("deepseek-reasoner", ModelPrice::new(0.55, 2.19)),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_known_prefixes() {
        assert_eq!(derive_provider("gpt-4o"), Provider::OpenAi);
        assert_eq!(derive_provider("o1-mini"), Provider::OpenAi);
        assert_eq!(derive_provider("o3-mini"), Provider::OpenAi);
        assert_eq!(derive_provider("claude-sonnet-4-5-20250929"), Provider::Anthropic);
        assert_eq!(derive_provider("deepseek-chat"), Provider::DeepSeek);
        assert_eq!(derive_provider("llama3"), Provider::Unknown);
    }

    #[test]
    fn longest_prefix_wins() {
        let table = PricingTable::with_defaults();
        let p = table.lookup("gpt-4o-2024-08-06").unwrap();
        assert_eq!(p, table.lookup("gpt-4o").unwrap());
    }

    #[test]
    fn unknown_model_costs_zero() {
        let table = PricingTable::with_defaults();
        assert_eq!(table.cost("some-unlisted-model", 1000, 1000), 0.0);
    }

    #[test]
    fn cost_preservation() {
        let table = PricingTable::with_defaults();
        let price = table.lookup("gpt-4o").unwrap();
        let expected = price.input_per_million * 1234.0 / 1_000_000.0
            + price.output_per_million * 56.0 / 1_000_000.0;
        assert!((table.cost("gpt-4o", 1234, 56) - expected).abs() < 1e-9);
    }

    #[test]
    fn case_insensitive_exact_match() {
        let table = PricingTable::with_defaults();
        assert_eq!(table.lookup("GPT-4O"), table.lookup("gpt-4o"));
    }
}
