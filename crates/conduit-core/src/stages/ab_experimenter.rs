// SPDX-License-Identifier: Apache-2.0
//! A/B experimentation (`spec.md` §4.9): deterministic, non-cryptographic
//! hash of `(experiment name, agent_name)` decides which side of the split
//! an agent falls on — the same agent always lands in the same bucket for
//! a given experiment, so results aren't noise from re-randomizing every
//! request.

use conduit_config::ExperimentConfig;

/// FNV-1a, picked for speed and determinism, not collision resistance —
/// this is a traffic splitter, not a security boundary.
fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in s.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Find the first enabled experiment whose `control_model` matches
/// `model`, and decide whether `agent_name` falls into its variant bucket.
/// Returns the substitute model, or `None` if no experiment applies or the
/// agent landed in the control bucket.
pub fn maybe_substitute(experiments: &[ExperimentConfig], agent_name: &str, model: &str) -> Option<String> {
    let exp = experiments.iter().find(|e| e.enabled && e.control_model == model)?;
    let bucket = fnv1a(&format!("{}:{}", exp.name, agent_name)) % 100;
    if (bucket as u8) < exp.traffic_pct {
        Some(exp.variant_model.clone())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experiment(traffic_pct: u8) -> ExperimentConfig {
        ExperimentConfig {
            name: "sonnet-vs-haiku".into(),
            enabled: true,
            control_model: "claude-sonnet-4".into(),
            variant_model: "claude-3-5-haiku".into(),
            traffic_pct,
        }
    }

    #[test]
    fn zero_traffic_never_substitutes() {
        let experiments = vec![experiment(0)];
        for i in 0..50 {
            assert_eq!(maybe_substitute(&experiments, &format!("agent-{i}"), "claude-sonnet-4"), None);
        }
    }

    #[test]
    fn full_traffic_always_substitutes() {
        let experiments = vec![experiment(100)];
        for i in 0..50 {
            assert_eq!(
                maybe_substitute(&experiments, &format!("agent-{i}"), "claude-sonnet-4"),
                Some("claude-3-5-haiku".to_string())
            );
        }
    }

    #[test]
    fn same_agent_is_always_bucketed_the_same_way() {
        let experiments = vec![experiment(50)];
        let first = maybe_substitute(&experiments, "agent-x", "claude-sonnet-4");
        for _ in 0..5 {
            assert_eq!(maybe_substitute(&experiments, "agent-x", "claude-sonnet-4"), first);
        }
    }

    #[test]
    fn non_matching_model_is_untouched() {
        let experiments = vec![experiment(100)];
        assert_eq!(maybe_substitute(&experiments, "agent-x", "gpt-4o"), None);
    }

    #[test]
    fn disabled_experiment_is_ignored() {
        let mut exp = experiment(100);
        exp.enabled = false;
        assert_eq!(maybe_substitute(&[exp], "agent-x", "claude-sonnet-4"), None);
    }
}
