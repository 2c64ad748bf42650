use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context as _;

/// Startup settings, read once and handed to producers by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub runtime_dir: PathBuf,
    pub instance_signature: String,
    pub disk_path: PathBuf,
    /// Fixed interface. Auto-detected when unset.
    pub net_iface: Option<String>,
    pub sink: String,
    pub tick: Duration,
    pub workspace_refresh: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|val| !val.is_empty());
        let required = |key: &str| get(key).with_context(|| format!("Missing ${key}"));
        fn parsed<T: FromStr>(key: &str, val: Option<String>) -> anyhow::Result<Option<T>>
        where
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            val.map(|val| {
                val.trim()
                    .parse()
                    .with_context(|| format!("Invalid value {val:?} for ${key}"))
            })
            .transpose()
        }

        let tick_ms: u64 =
            parsed("HYPRSTAT_TICK_MS", get("HYPRSTAT_TICK_MS"))?.unwrap_or(500);
        let refresh_secs: u64 = parsed(
            "HYPRSTAT_WORKSPACE_REFRESH_SECS",
            get("HYPRSTAT_WORKSPACE_REFRESH_SECS"),
        )?
        .unwrap_or(10);
        if tick_ms == 0 || refresh_secs == 0 {
            anyhow::bail!("$HYPRSTAT_TICK_MS and $HYPRSTAT_WORKSPACE_REFRESH_SECS must be positive");
        }

        Ok(Self {
            runtime_dir: required("XDG_RUNTIME_DIR")?.into(),
            instance_signature: required("HYPRLAND_INSTANCE_SIGNATURE")?,
            disk_path: get("HYPRSTAT_DISK_PATH").unwrap_or_else(|| "/".into()).into(),
            net_iface: get("HYPRSTAT_NET_IFACE"),
            sink: get("HYPRSTAT_SINK").unwrap_or_else(|| "@DEFAULT_SINK@".into()),
            tick: Duration::from_millis(tick_ms),
            workspace_refresh: Duration::from_secs(refresh_secs),
        })
    }

    pub fn socket_path(&self) -> PathBuf {
        crate::compositor::event_socket_path(&self.runtime_dir, &self.instance_signature)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|&(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("XDG_RUNTIME_DIR", "/run/user/1000"),
        ("HYPRLAND_INSTANCE_SIGNATURE", "sig"),
    ];

    #[test]
    fn defaults() {
        let cfg = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(cfg.disk_path, PathBuf::from("/"));
        assert_eq!(cfg.net_iface, None);
        assert_eq!(cfg.sink, "@DEFAULT_SINK@");
        assert_eq!(cfg.tick, Duration::from_millis(500));
        assert_eq!(cfg.workspace_refresh, Duration::from_secs(10));
        assert_eq!(
            cfg.socket_path(),
            PathBuf::from("/run/user/1000/hypr/sig/.socket2.sock")
        );
    }

    #[test]
    fn missing_or_empty_signature_is_fatal() {
        let err = Config::from_lookup(lookup(&REQUIRED[..1])).unwrap_err();
        assert!(format!("{err:#}").contains("HYPRLAND_INSTANCE_SIGNATURE"));

        let err = Config::from_lookup(lookup(&[
            REQUIRED[0],
            ("HYPRLAND_INSTANCE_SIGNATURE", ""),
        ]))
        .unwrap_err();
        assert!(format!("{err:#}").contains("HYPRLAND_INSTANCE_SIGNATURE"));
    }

    #[test]
    fn overrides_and_bad_numbers() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("HYPRSTAT_NET_IFACE", "wlan0"),
            ("HYPRSTAT_TICK_MS", "250"),
            ("HYPRSTAT_DISK_PATH", "/home"),
        ]);
        let cfg = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(cfg.net_iface.as_deref(), Some("wlan0"));
        assert_eq!(cfg.tick, Duration::from_millis(250));
        assert_eq!(cfg.disk_path, PathBuf::from("/home"));

        vars.push(("HYPRSTAT_WORKSPACE_REFRESH_SECS", "soon"));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(format!("{err:#}").contains("HYPRSTAT_WORKSPACE_REFRESH_SECS"));
    }
}
