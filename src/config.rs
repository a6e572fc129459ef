use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Process configuration, read once from `INNKEEP_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub reconcile_interval: Duration,
    pub nlu_url: String,
    pub nlu_model: String,
    pub nlu_api_key: Option<String>,
    pub stt_url: String,
    pub stt_model: String,
    pub stt_api_key: Option<String>,
    pub external_timeout: Duration,
    /// Multi-turn slot filling is off when unset.
    pub session_ttl: Option<Duration>,
    pub media_auth: Option<(String, String)>,
}

#[derive(Debug)]
pub struct ConfigError {
    var: &'static str,
    value: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.var, self.value)
    }
}

impl std::error::Error for ConfigError {}

const DEFAULT_NLU_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_NLU_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_STT_MODEL: &str = "whisper-large-v3";

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |var: &'static str| -> Result<Option<u64>, ConfigError> { parse(var, get(var)) };

        let nlu_url = get("INNKEEP_NLU_URL").unwrap_or_else(|| DEFAULT_NLU_URL.into());
        let nlu_api_key = get("INNKEEP_NLU_API_KEY").or_else(|| get("GROQ_API_KEY"));
        let media_auth = match (get("INNKEEP_MEDIA_AUTH_USER"), get("INNKEEP_MEDIA_AUTH_PASSWORD")) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        };

        Ok(Config {
            bind: get("INNKEEP_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse("INNKEEP_PORT", get("INNKEEP_PORT"))?.unwrap_or(8080),
            data_dir: get("INNKEEP_DATA_DIR").unwrap_or_else(|| "./data".into()).into(),
            compact_threshold: parsed("INNKEEP_COMPACT_THRESHOLD")?.unwrap_or(1000),
            metrics_port: parse("INNKEEP_METRICS_PORT", get("INNKEEP_METRICS_PORT"))?,
            reconcile_interval: Duration::from_secs(parsed("INNKEEP_RECONCILE_SECS")?.unwrap_or(60).max(1)),
            stt_url: get("INNKEEP_STT_URL").unwrap_or_else(|| nlu_url.clone()),
            stt_model: get("INNKEEP_STT_MODEL").unwrap_or_else(|| DEFAULT_STT_MODEL.into()),
            stt_api_key: get("INNKEEP_STT_API_KEY").or_else(|| nlu_api_key.clone()),
            nlu_url,
            nlu_model: get("INNKEEP_NLU_MODEL").unwrap_or_else(|| DEFAULT_NLU_MODEL.into()),
            nlu_api_key,
            external_timeout: Duration::from_secs(parsed("INNKEEP_EXTERNAL_TIMEOUT_SECS")?.unwrap_or(20).max(1)),
            session_ttl: parsed("INNKEEP_SESSION_TTL_SECS")?
                .filter(|s| *s > 0)
                .map(Duration::from_secs),
            media_auth,
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("innkeep.wal")
    }
}

fn parse<T: FromStr>(var: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| {
            v.trim().parse().map_err(|_| ConfigError { var, value: v })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.bind, "0.0.0.0");
        assert_eq!(c.port, 8080);
        assert_eq!(c.compact_threshold, 1000);
        assert_eq!(c.reconcile_interval, Duration::from_secs(60));
        assert_eq!(c.external_timeout, Duration::from_secs(20));
        assert!(c.session_ttl.is_none());
        assert!(c.metrics_port.is_none());
        assert!(c.media_auth.is_none());
        assert_eq!(c.wal_path(), PathBuf::from("./data/innkeep.wal"));
    }

    #[test]
    fn overrides_and_fallbacks() {
        let c = config(&[
            ("INNKEEP_PORT", "9090"),
            ("GROQ_API_KEY", "gsk"),
            ("INNKEEP_SESSION_TTL_SECS", "900"),
            ("INNKEEP_MEDIA_AUTH_USER", "AC1"),
            ("INNKEEP_MEDIA_AUTH_PASSWORD", "secret"),
        ])
        .unwrap();
        assert_eq!(c.port, 9090);
        assert_eq!(c.nlu_api_key.as_deref(), Some("gsk"));
        assert_eq!(c.stt_api_key.as_deref(), Some("gsk"));
        assert_eq!(c.session_ttl, Some(Duration::from_secs(900)));
        assert_eq!(c.media_auth, Some(("AC1".into(), "secret".into())));
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = config(&[("INNKEEP_PORT", "eighty")]).unwrap_err();
        assert_eq!(err.to_string(), "invalid value for INNKEEP_PORT: \"eighty\"");
    }
}
