//! Load config from file, environment and command line.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use pager_core::{NodeId, PagerConfig};
use serde::Deserialize;

/// Pager configuration. File: ~/.config/pager/config.toml or /etc/pager/config.toml.
/// Env overrides: PAGER_NODE_ID, PAGER_DEST, PAGER_FREQ, PAGER_MULTICAST_GROUP, PAGER_BASE_PORT.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// This node's address (default 1).
    #[serde(default = "default_node_id")]
    pub node_id: NodeId,
    /// Destination of outgoing messages (default 2).
    #[serde(default = "default_dest")]
    pub dest: NodeId,
    /// Radio frequency in MHz (default 915.0).
    #[serde(default = "default_frequency")]
    pub frequency_mhz: f64,
    /// Multicast group standing in for the shared band (default 239.255.42.99).
    #[serde(default = "default_multicast_group")]
    pub multicast_group: Ipv4Addr,
    /// UDP port of channel 0; each frequency maps to an offset from it (default 40000).
    #[serde(default = "default_base_port")]
    pub base_port: u16,
}

fn default_node_id() -> NodeId {
    1
}
fn default_dest() -> NodeId {
    2
}
fn default_frequency() -> f64 {
    915.0
}
fn default_multicast_group() -> Ipv4Addr {
    Ipv4Addr::new(239, 255, 42, 99)
}
fn default_base_port() -> u16 {
    40000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            dest: default_dest(),
            frequency_mhz: default_frequency(),
            multicast_group: default_multicast_group(),
            base_port: default_base_port(),
        }
    }
}

/// Values given on the command line; they win over file and env.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub node_id: Option<NodeId>,
    pub dest: Option<NodeId>,
    pub frequency_mhz: Option<f64>,
}

impl Config {
    pub fn pager_config(&self) -> PagerConfig {
        PagerConfig {
            node_id: self.node_id,
            dest: self.dest,
            frequency_mhz: self.frequency_mhz,
            ..PagerConfig::default()
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        override_from(&var, "PAGER_NODE_ID", &mut self.node_id);
        override_from(&var, "PAGER_DEST", &mut self.dest);
        override_from(&var, "PAGER_FREQ", &mut self.frequency_mhz);
        override_from(&var, "PAGER_MULTICAST_GROUP", &mut self.multicast_group);
        override_from(&var, "PAGER_BASE_PORT", &mut self.base_port);
    }

    fn apply_overrides(&mut self, o: &Overrides) {
        if let Some(id) = o.node_id {
            self.node_id = id;
        }
        if let Some(dest) = o.dest {
            self.dest = dest;
        }
        if let Some(f) = o.frequency_mhz {
            self.frequency_mhz = f;
        }
    }
}

fn override_from<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    let Some(s) = var(key) else {
        return;
    };
    match s.parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value = %s, "ignoring unparseable environment override"),
    }
}

/// Load config: defaults, then config file (if present), then env vars, then CLI values.
/// A file named with `--config` must exist and parse; the default locations are optional.
pub fn load(explicit: Option<&Path>, overrides: &Overrides) -> anyhow::Result<Config> {
    let mut c = match explicit {
        Some(path) => read_file(path)?,
        None => load_file().unwrap_or_default(),
    };
    c.apply_env(|k| std::env::var(k).ok());
    c.apply_overrides(overrides);
    if !(c.frequency_mhz.is_finite() && c.frequency_mhz > 0.0) {
        anyhow::bail!("frequency must be a positive number of MHz, got {}", c.frequency_mhz);
    }
    Ok(c)
}

fn read_file(path: &Path) -> anyhow::Result<Config> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parsing config {}", path.display()))
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/pager/config.toml"));
    }
    out.push(PathBuf::from("/etc/pager/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    let path = config_paths().into_iter().find(|p| p.exists())?;
    match read_file(&path) {
        Ok(c) => Some(c),
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "ignoring config file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_the_cli_defaults() {
        let c = Config::default();
        assert_eq!(c.dest, 2);
        assert_eq!(c.frequency_mhz, 915.0);
        assert_eq!(c.node_id, 1);
        assert_eq!(c.pager_config().dest, 2);
    }

    #[test]
    fn file_fills_missing_keys_with_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "node_id = 7\nfrequency_mhz = 868.1").unwrap();
        let c = load(Some(f.path()), &Overrides::default()).unwrap();
        assert_eq!(c.frequency_mhz, 868.1);
        assert_eq!(c.base_port, 40000);
        assert_eq!(c.dest, 2);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "node = 7").unwrap();
        assert!(load(Some(f.path()), &Overrides::default()).is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(load(Some(&path), &Overrides::default()).is_err());
    }

    #[test]
    fn env_then_cli_take_precedence() {
        let mut c = Config::default();
        c.apply_env(env(&[
            ("PAGER_NODE_ID", "5"),
            ("PAGER_DEST", "6"),
            ("PAGER_MULTICAST_GROUP", "239.1.2.3"),
            ("PAGER_BASE_PORT", "not a port"),
        ]));
        assert_eq!(c.node_id, 5);
        assert_eq!(c.dest, 6);
        assert_eq!(c.multicast_group, Ipv4Addr::new(239, 1, 2, 3));
        assert_eq!(c.base_port, 40000);

        c.apply_overrides(&Overrides {
            dest: Some(9),
            frequency_mhz: Some(433.92),
            ..Overrides::default()
        });
        assert_eq!(c.node_id, 5);
        assert_eq!(c.dest, 9);
        assert_eq!(c.frequency_mhz, 433.92);
    }

    #[test]
    fn rejects_non_positive_frequency() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let o = Overrides {
            frequency_mhz: Some(-1.0),
            ..Overrides::default()
        };
        assert!(load(Some(f.path()), &o).is_err());
    }
}
