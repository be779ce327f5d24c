//! On-disk run configuration: tier stack, trace selection and per-tier
//! policy slots, deserialized from TOML with a `Config` struct per
//! devices/cache/placement section.

use std::time::Duration;

use duration_str::deserialize_duration;
use serde::Deserialize;

use crate::policy::PolicyKind;
use crate::tier::Tier;
use crate::trace::TraceFormat;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub tiers: Vec<TierConfig>,
    pub trace: TraceConfig,
    #[serde(default)]
    pub simulate_perfect_prefetch: bool,
    #[serde(default)]
    pub strict_trace: bool,
}

/// One entry of the tier stack, in fastest-to-slowest order. `policy` decides
/// who, if anyone, listens for this tier's `on_tier_nearly_full` — mirroring
/// the original's `'commandline-policy'` / `'no-policy'` / named-policy slots
/// per tier.
#[derive(Deserialize, Debug, Clone)]
pub struct TierConfig {
    pub name: String,
    pub max_size: u64,
    /// Human-readable duration (`"100us"`, `"10ms"`, ...) via
    /// `duration_str::deserialize_duration`, rather than a bare float of
    /// seconds, so a config reads `latency = "100us"` instead of
    /// `latency = 0.0001`.
    #[serde(deserialize_with = "deserialize_duration")]
    pub latency: Duration,
    pub throughput: f64,
    #[serde(default)]
    pub target_occupation: Option<f64>,
    #[serde(default)]
    pub policy: TierPolicySlot,
}

/// Which policy, if any, watches a given tier. Spelled in TOML as a single
/// flat string — `"commandline-policy"`, `"no-policy"`, or a policy name
/// (`"lru"`, `"fifo"`, ...) — mirroring the original config's flat
/// `policy_str` slot rather than an externally-tagged enum.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TierPolicySlot {
    /// Whatever policy was selected on the command line for this run.
    #[default]
    CommandlinePolicy,
    /// No listener attached; the tier is a pure capacity sink (e.g. tape).
    NoPolicy,
    /// A specific policy regardless of what's running elsewhere in the stack.
    Named(PolicyKind),
}

impl<'de> Deserialize<'de> for TierPolicySlot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "commandline-policy" => Ok(TierPolicySlot::CommandlinePolicy),
            "no-policy" => Ok(TierPolicySlot::NoPolicy),
            other => other
                .parse::<PolicyKind>()
                .map(TierPolicySlot::Named)
                .map_err(|_| serde::de::Error::custom(format!("unknown policy slot \"{other}\""))),
        }
    }
}

impl TierConfig {
    pub fn build(&self) -> Tier {
        let tier = Tier::new(
            self.name.clone(),
            self.max_size,
            self.latency.as_secs_f64(),
            self.throughput,
        );
        match self.target_occupation {
            Some(occ) => tier.with_target_occupation(occ),
            None => tier,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct TraceConfig {
    pub path: String,
    pub format: TraceFormat,
    /// Default record cap when `-l`/`--limit-trace` isn't passed on the CLI.
    #[serde(default)]
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_tier_stack() {
        let toml = r#"
            [[tiers]]
            name = "SSD"
            max_size = 100
            latency = "100us"
            throughput = 2000000000.0

            [[tiers]]
            name = "HDD"
            max_size = 1000
            latency = "10ms"
            throughput = 250000000.0
            policy = "no-policy"

            [trace]
            path = "trace.txt"
            format = "custom"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.tiers.len(), 2);
        assert_eq!(config.tiers[0].policy, TierPolicySlot::CommandlinePolicy);
        assert_eq!(config.tiers[1].policy, TierPolicySlot::NoPolicy);
        assert!(!config.simulate_perfect_prefetch);
        assert_eq!(config.tiers[0].latency, Duration::from_micros(100));
        assert_eq!(config.tiers[1].latency, Duration::from_millis(10));
    }

    #[test]
    fn a_named_policy_slot_overrides_the_commandline_choice() {
        let toml = r#"
            [[tiers]]
            name = "SSD"
            max_size = 100
            latency = "100us"
            throughput = 2000000000.0
            policy = "lru"

            [trace]
            path = "trace.txt"
            format = "snia"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.tiers[0].policy,
            TierPolicySlot::Named(PolicyKind::Lru)
        );
    }

    #[test]
    fn an_unknown_policy_slot_is_a_parse_error() {
        let toml = r#"
            [[tiers]]
            name = "SSD"
            max_size = 100
            latency = "100us"
            throughput = 2000000000.0
            policy = "not-a-real-policy"

            [trace]
            path = "trace.txt"
            format = "custom"
        "#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn tier_config_build_applies_a_custom_target_occupation() {
        let tc = TierConfig {
            name: "ssd".to_string(),
            max_size: 100,
            latency: Duration::ZERO,
            throughput: 1.0,
            target_occupation: Some(0.5),
            policy: TierPolicySlot::NoPolicy,
        };
        let tier = tc.build();
        assert_eq!(tier.target_occupation, 0.5);
    }
}
