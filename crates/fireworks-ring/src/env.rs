//! Environment overrides shared by the binaries.

use std::str::FromStr;

use fireworks_protocol::{Node0Exit, RingConfig};

use crate::error::{Error, Result};

pub const HOST_VAR: &str = "FIREWORKS_HOST";
pub const FANOUT_GROUP_VAR: &str = "FIREWORKS_FANOUT_GROUP";
pub const SEED_VAR: &str = "FIREWORKS_SEED";
/// `await-return` or `immediate`
pub const NODE0_EXIT_VAR: &str = "FIREWORKS_NODE0_EXIT";
/// `true` or `false`
pub const MONITOR_VAR: &str = "FIREWORKS_MONITOR";

/// Parse `name` if it is set and non-empty.
pub fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Env { name, value }),
        _ => Ok(None),
    }
}

/// Run seed from `FIREWORKS_SEED`, if set.
pub fn seed() -> Result<Option<u64>> {
    parse_var(SEED_VAR)
}

/// Apply `FIREWORKS_SEED`, `FIREWORKS_NODE0_EXIT` and `FIREWORKS_MONITOR`
/// to `config`. Unset variables leave the field alone.
pub fn ring_overrides(mut config: RingConfig) -> Result<RingConfig> {
    if let Some(seed) = seed()? {
        config = config.with_seed(seed);
    }
    if let Some(exit) = parse_var::<Node0Exit>(NODE0_EXIT_VAR)? {
        config = config.with_node0_exit(exit);
    }
    if let Some(enabled) = parse_var::<bool>(MONITOR_VAR)? {
        config = config.with_monitoring(enabled);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The only test in this crate that mutates the process environment.
    #[test]
    fn test_ring_overrides() {
        std::env::remove_var(SEED_VAR);
        std::env::remove_var(NODE0_EXIT_VAR);
        std::env::remove_var(MONITOR_VAR);
        let base = RingConfig::new(4);
        assert_eq!(ring_overrides(base.clone()).unwrap(), base);

        std::env::set_var(SEED_VAR, " 99 ");
        std::env::set_var(NODE0_EXIT_VAR, "immediate");
        std::env::set_var(MONITOR_VAR, "false");
        let config = ring_overrides(base.clone()).unwrap();
        assert_eq!(config.seed, 99);
        assert_eq!(config.node0_exit, Node0Exit::Immediate);
        assert!(!config.monitor_consistency);

        std::env::set_var(NODE0_EXIT_VAR, "sometimes");
        let err = ring_overrides(base).unwrap_err();
        assert!(matches!(err, Error::Env { name: NODE0_EXIT_VAR, .. }));

        std::env::remove_var(SEED_VAR);
        std::env::remove_var(NODE0_EXIT_VAR);
        std::env::remove_var(MONITOR_VAR);
    }
}
