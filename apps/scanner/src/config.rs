use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "scanner.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub inference_url: String,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inference_url: "http://127.0.0.1:8000".into(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    inference_url: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// Defaults, then the TOML file, then environment variables.
///
/// An explicit `config_path` must exist; the default `scanner.toml` is optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match config_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            apply_file(&mut settings, &raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?;
        }
        None => {
            if let Ok(raw) = fs::read_to_string(DEFAULT_CONFIG_FILE) {
                apply_file(&mut settings, &raw)
                    .with_context(|| format!("invalid config file '{DEFAULT_CONFIG_FILE}'"))?;
            }
        }
    }

    apply_env(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.inference_url {
        settings.inference_url = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = non_empty("INFERENCE_API_URL") {
        settings.inference_url = v;
    }
    if let Some(v) = non_empty("APP__INFERENCE_API_URL") {
        settings.inference_url = v;
    }

    if let Some(v) = non_empty("APP__REQUEST_TIMEOUT_SECS") {
        match v.trim().parse::<u64>() {
            Ok(parsed) => settings.request_timeout_secs = parsed,
            Err(err) => tracing::warn!(value = %v, %err, "ignoring invalid APP__REQUEST_TIMEOUT_SECS"),
        }
    }
}

impl Settings {
    pub fn apply_overrides(&mut self, inference_url: Option<String>, timeout_secs: Option<u64>) {
        if let Some(v) = inference_url {
            self.inference_url = v;
        }
        if let Some(v) = timeout_secs {
            self.request_timeout_secs = v;
        }
    }

    /// Base URL with any trailing `/` removed, ready for `/process_lidar`.
    pub fn validated_inference_url(&self) -> anyhow::Result<String> {
        let raw = self.inference_url.trim();
        let url = Url::parse(raw).with_context(|| format!("invalid inference url '{raw}'"))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("inference url '{raw}' must use http or https");
        }
        if url.host_str().is_none() {
            bail!("inference url '{raw}' has no host");
        }
        Ok(raw.trim_end_matches('/').to_string())
    }

    pub fn request_timeout(&self) -> anyhow::Result<Duration> {
        if self.request_timeout_secs == 0 {
            bail!("request timeout must be at least one second");
        }
        Ok(Duration::from_secs(self.request_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            "inference_url = \"http://gpu-box:9000/\"\nrequest_timeout_secs = 5\n",
        )
        .expect("valid toml");
        assert_eq!(settings.inference_url, "http://gpu-box:9000/");
        assert_eq!(settings.request_timeout_secs, 5);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let mut settings = Settings::default();
        assert!(apply_file(&mut settings, "bind_addr = \"0.0.0.0:1\"").is_err());
    }

    #[test]
    fn prefixed_env_wins_over_plain_env() {
        let mut settings = Settings::default();
        apply_env(
            &mut settings,
            env_from(&[
                ("INFERENCE_API_URL", "http://plain:8000"),
                ("APP__INFERENCE_API_URL", "http://prefixed:8000"),
                ("APP__REQUEST_TIMEOUT_SECS", "12"),
            ]),
        );
        assert_eq!(settings.inference_url, "http://prefixed:8000");
        assert_eq!(settings.request_timeout_secs, 12);
    }

    #[test]
    fn empty_or_invalid_env_values_are_ignored() {
        let mut settings = Settings::default();
        apply_env(
            &mut settings,
            env_from(&[("INFERENCE_API_URL", "  "), ("APP__REQUEST_TIMEOUT_SECS", "soon")]),
        );
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn cli_overrides_take_precedence() {
        let mut settings = Settings::default();
        settings.apply_overrides(Some("https://scan.example.com".into()), Some(90));
        assert_eq!(settings.inference_url, "https://scan.example.com");
        assert_eq!(settings.request_timeout().expect("timeout"), Duration::from_secs(90));
    }

    #[test]
    fn validates_scheme_and_trims_trailing_slash() {
        let mut settings = Settings::default();
        settings.inference_url = "http://127.0.0.1:8000/".into();
        assert_eq!(
            settings.validated_inference_url().expect("valid"),
            "http://127.0.0.1:8000"
        );

        settings.inference_url = "ftp://files.example.com".into();
        assert!(settings.validated_inference_url().is_err());

        settings.inference_url = "not a url".into();
        assert!(settings.validated_inference_url().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let settings = Settings {
            request_timeout_secs: 0,
            ..Settings::default()
        };
        assert!(settings.request_timeout().is_err());
    }

    #[test]
    fn explicit_config_path_must_exist_and_is_loaded() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("scanner_config_test_{suffix}.toml"));

        assert!(load_settings(Some(&path)).is_err());

        fs::write(&path, "request_timeout_secs = 7\n").expect("write config");
        let settings = load_settings(Some(&path)).expect("load");
        assert_eq!(settings.request_timeout_secs, 7);
        fs::remove_file(&path).expect("cleanup");
    }
}
