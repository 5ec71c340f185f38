//! Worker configuration.
//!
//! Everything the launcher needs is carried in [`WorkerConfig`]. The runtime
//! never reads the process environment itself; the binary builds a config
//! (including [`ProviderEnv`] overrides) and hands it in.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crew_models::StagePlan;

/// Default wall-clock budget for one worker run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default interpreter binary.
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Interpreters tried, in order, when the configured one is not on `PATH`.
pub const FALLBACK_INTERPRETERS: &[&str] = &["python3", "python"];

/// Default size of the stderr tail kept for diagnostics.
pub const DEFAULT_STDERR_LIMIT: usize = 64 * 1024;

/// Primary provider key variable.
pub const OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";
/// Secondary provider key variable.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Provider base URL override.
pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
/// Provider model override.
pub const OPENAI_MODEL: &str = "OPENAI_MODEL";

/// Configuration for launching crew workers.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Interpreter binary name or path.
    pub interpreter: String,
    /// Fixed arguments selecting "run from stdin" mode.
    pub args: Vec<String>,
    /// Working directory for the worker.
    pub working_dir: PathBuf,
    /// Environment overrides applied on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Whether the worker inherits the server's environment.
    pub inherit_env: bool,
    /// Hard wall-clock timeout.
    pub timeout: Duration,
    /// Expected pipeline stages, in order.
    pub stages: StagePlan,
    /// Kill the worker when a buffered client disconnects.
    pub kill_on_disconnect: bool,
    /// Bytes of stderr kept for error diagnostics.
    pub stderr_limit: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interpreter: DEFAULT_INTERPRETER.to_string(),
            args: vec!["-m".into(), "crew.run".into(), "--stdin".into()],
            working_dir: PathBuf::from("."),
            env: BTreeMap::new(),
            inherit_env: true,
            timeout: DEFAULT_TIMEOUT,
            stages: StagePlan::content_pipeline(),
            kill_on_disconnect: false,
            stderr_limit: DEFAULT_STDERR_LIMIT,
        }
    }
}

impl WorkerConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the interpreter.
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Sets the worker arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Adds one environment override.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Adds provider overrides.
    pub fn with_provider(mut self, provider: &ProviderEnv) -> Self {
        self.env.extend(provider.overrides());
        self
    }

    /// Controls environment inheritance.
    pub fn with_inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the stage plan.
    pub fn with_stages(mut self, stages: StagePlan) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the buffered-mode disconnect policy.
    pub fn with_kill_on_disconnect(mut self, kill: bool) -> Self {
        self.kill_on_disconnect = kill;
        self
    }

    /// Sets the stderr diagnostics limit.
    pub fn with_stderr_limit(mut self, limit: usize) -> Self {
        self.stderr_limit = limit;
        self
    }

    /// Resolves the interpreter against `PATH`.
    ///
    /// An explicit path or a binary found on `PATH` is kept. Otherwise the
    /// first available fallback wins. If nothing resolves, the configured
    /// name is returned unchanged and the spawn reports the failure.
    pub fn resolve_interpreter(mut self) -> Self {
        if which::which(&self.interpreter).is_ok() {
            return self;
        }
        if let Some(found) = FALLBACK_INTERPRETERS
            .iter()
            .find(|candidate| which::which(candidate).is_ok())
        {
            tracing::debug!(
                configured = %self.interpreter,
                resolved = %found,
                "interpreter not found, using fallback"
            );
            self.interpreter = (*found).to_string();
        }
        self
    }
}

/// Provider credentials and model overrides passed to the worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderEnv {
    /// Cleaned provider API key.
    pub api_key: Option<String>,
    /// Provider base URL.
    pub base_url: Option<String>,
    /// Model name.
    pub model: Option<String>,
}

impl ProviderEnv {
    /// Builds provider settings from a set of environment variables.
    ///
    /// The key comes from `OPENROUTER_API_KEY`, falling back to
    /// `OPENAI_API_KEY`. Keys pasted with quotes, line breaks or a BOM are
    /// cleaned before use.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();

        let api_key = [OPENROUTER_API_KEY, OPENAI_API_KEY]
            .iter()
            .filter_map(|name| vars.get(*name))
            .map(|raw| clean_api_key(raw))
            .find(|key| !key.is_empty());

        let non_empty = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            api_key,
            base_url: non_empty(OPENAI_BASE_URL),
            model: non_empty(OPENAI_MODEL),
        }
    }

    /// Environment overrides for the worker.
    pub fn overrides(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("PYTHONIOENCODING".to_string(), "utf-8".to_string());
        if let Some(key) = &self.api_key {
            env.insert(OPENROUTER_API_KEY.to_string(), key.clone());
            env.insert(OPENAI_API_KEY.to_string(), key.clone());
        }
        if let Some(url) = &self.base_url {
            env.insert(OPENAI_BASE_URL.to_string(), url.clone());
        }
        if let Some(model) = &self.model {
            env.insert(OPENAI_MODEL.to_string(), model.clone());
        }
        env
    }
}

/// Strips quotes, BOM and all whitespace from a pasted API key.
pub fn clean_api_key(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .chars()
        .filter(|c| *c != '\u{feff}' && !c.is_whitespace())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();

        assert_eq!(config.interpreter, "python3");
        assert_eq!(config.args, vec!["-m", "crew.run", "--stdin"]);
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.stages.len(), 3);
        assert!(config.inherit_env);
        assert!(!config.kill_on_disconnect);
    }

    #[test]
    fn test_config_builder() {
        let config = WorkerConfig::new()
            .with_interpreter("/usr/bin/python3.12")
            .with_args(["run.py"])
            .with_working_dir("/srv/crew")
            .with_env("CREW_MODE", "test")
            .with_timeout(Duration::from_secs(5))
            .with_kill_on_disconnect(true)
            .with_inherit_env(false);

        assert_eq!(config.interpreter, "/usr/bin/python3.12");
        assert_eq!(config.args, vec!["run.py"]);
        assert_eq!(config.working_dir, PathBuf::from("/srv/crew"));
        assert_eq!(config.env.get("CREW_MODE").map(String::as_str), Some("test"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.kill_on_disconnect);
        assert!(!config.inherit_env);
    }

    #[test]
    fn test_clean_api_key() {
        assert_eq!(clean_api_key("  \"sk-or-v1-abc\"\r\n"), "sk-or-v1-abc");
        assert_eq!(clean_api_key("'sk-or-v1-\u{feff}abc'"), "sk-or-v1-abc");
        assert_eq!(clean_api_key("sk or v1"), "skorv1");
        assert_eq!(clean_api_key("  "), "");
    }

    #[test]
    fn test_provider_prefers_openrouter_key() {
        let provider = ProviderEnv::from_vars([
            ("OPENAI_API_KEY", "sk-openai"),
            ("OPENROUTER_API_KEY", " 'sk-or' "),
            ("OPENAI_MODEL", "openrouter/openai/gpt-4o-mini"),
            ("UNRELATED", "x"),
        ]);

        assert_eq!(provider.api_key.as_deref(), Some("sk-or"));
        assert_eq!(provider.model.as_deref(), Some("openrouter/openai/gpt-4o-mini"));
        assert!(provider.base_url.is_none());
    }

    #[test]
    fn test_provider_falls_back_to_openai_key() {
        let provider = ProviderEnv::from_vars([
            ("OPENROUTER_API_KEY", "   "),
            ("OPENAI_API_KEY", "sk-openai"),
        ]);
        assert_eq!(provider.api_key.as_deref(), Some("sk-openai"));
    }

    #[test]
    fn test_provider_overrides() {
        let provider = ProviderEnv {
            api_key: Some("sk-1".into()),
            base_url: Some("https://openrouter.ai/api/v1".into()),
            model: None,
        };
        let env = provider.overrides();

        assert_eq!(env.get(OPENROUTER_API_KEY).map(String::as_str), Some("sk-1"));
        assert_eq!(env.get(OPENAI_API_KEY).map(String::as_str), Some("sk-1"));
        assert_eq!(
            env.get(OPENAI_BASE_URL).map(String::as_str),
            Some("https://openrouter.ai/api/v1")
        );
        assert!(!env.contains_key(OPENAI_MODEL));
        assert_eq!(env.get("PYTHONIOENCODING").map(String::as_str), Some("utf-8"));

        let config = WorkerConfig::new().with_provider(&provider);
        assert_eq!(config.env.len(), env.len());
    }

    #[test]
    fn test_resolve_interpreter_keeps_missing_name() {
        let config = WorkerConfig::new()
            .with_interpreter("definitely-not-an-interpreter-xyz")
            .resolve_interpreter();
        // Either a fallback was found on PATH or the name is kept for the
        // spawn to report.
        assert!(
            config.interpreter == "definitely-not-an-interpreter-xyz"
                || FALLBACK_INTERPRETERS.contains(&config.interpreter.as_str())
        );
    }
}
