use crate::{
    ConfigurationError, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_DURATION, DEFAULT_QUERY_ID,
    DEFAULT_QUERY_SQL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SUCCESS_SENTINEL, DEFAULT_TICK,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Declarative scenario descriptor.
///
/// Keys are camelCase so the same document reads naturally in JSON or TOML:
///
/// ```json
/// {
///   "executor": "rate-ramped",
///   "startTarget": 1000,
///   "stages": [
///     { "target": 1000, "duration": "5s" },
///     { "target": 50000, "duration": "1s" },
///     { "target": 50000, "duration": "10s" },
///     { "target": 0, "duration": "5s" }
///   ],
///   "preallocated": 1000,
///   "maxConcurrency": 10000
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub executor: ExecutorKind,
    /// Target before the first stage begins. Only meaningful for `rate-ramped`.
    #[serde(default)]
    pub start_target: f64,
    pub stages: Vec<Stage>,
    /// Clients spawned before any traffic is generated.
    #[serde(default)]
    pub preallocated: usize,
    /// Hard ceiling on live clients (pre-allocated plus burst).
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_iterations")]
    pub iterations_per_client: u64,
    /// Global run deadline. Defaults to the summed stage durations.
    #[serde(default, with = "duration_str::option")]
    pub max_duration: Option<Duration>,
    #[serde(default = "default_request_timeout", with = "duration_str")]
    pub request_timeout: Duration,
    /// Optional sleep between two iterations of the same client.
    #[serde(default, with = "duration_str::option")]
    pub pacing: Option<Duration>,
    #[serde(default = "default_tick", with = "duration_str")]
    pub tick: Duration,
    #[serde(default)]
    pub request: RequestTemplate,
    #[serde(default = "default_sentinel")]
    pub success_sentinel: String,
    /// When false, only the transport layer decides success. Needed for servers that
    /// return raw rows without an application status.
    #[serde(default = "default_true")]
    pub check_application_status: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutorKind {
    /// Target is an arrival rate (req/s), linearly interpolated between stages.
    RateRamped,
    /// Target is a client count; each client runs `iterations_per_client` iterations.
    FixedPopulation,
    /// Target is a client count held for each stage; clients loop until retired.
    ConstantConcurrency,
}

impl ExecutorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateRamped => "rate-ramped",
            Self::FixedPopulation => "fixed-population",
            Self::ConstantConcurrency => "constant-concurrency",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub target: f64,
    #[serde(with = "duration_str")]
    pub duration: Duration,
}

impl Stage {
    pub fn new(target: f64, duration: Duration) -> Self {
        Self { target, duration }
    }
}

/// Shape of the query each client sends.
///
/// `queryId` and `querySql` may contain `{vu}`, `{iter}` and `{rand}` placeholders. `{rand}` is
/// drawn once per request from `randomRange` (inclusive), so the id and the SQL agree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTemplate {
    #[serde(default = "default_query_id")]
    pub query_id: String,
    #[serde(default = "default_query_sql")]
    pub query_sql: String,
    #[serde(default)]
    pub random_range: Option<(u64, u64)>,
}

impl Default for RequestTemplate {
    fn default() -> Self {
        Self {
            query_id: default_query_id(),
            query_sql: default_query_sql(),
            random_range: None,
        }
    }
}

impl ScenarioConfig {
    pub fn new(name: &str, executor: ExecutorKind, stages: Vec<Stage>) -> Self {
        Self {
            name: name.to_string(),
            executor,
            start_target: 0.,
            stages,
            preallocated: 0,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            iterations_per_client: default_iterations(),
            max_duration: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            pacing: None,
            tick: DEFAULT_TICK,
            request: RequestTemplate::default(),
            success_sentinel: default_sentinel(),
            check_application_status: true,
        }
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigurationError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigurationError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a descriptor, picking the format from the file extension.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("toml") => Self::from_toml(&content),
            other => Err(ConfigurationError::UnsupportedFormat(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.stages.is_empty() {
            return Err(ConfigurationError::EmptyStages);
        }

        if !self.start_target.is_finite() || self.start_target < 0. {
            return Err(ConfigurationError::InvalidStartTarget(self.start_target));
        }

        for (index, stage) in self.stages.iter().enumerate() {
            if !stage.target.is_finite() || stage.target < 0. {
                return Err(ConfigurationError::InvalidTarget {
                    index,
                    target: stage.target,
                });
            }
        }

        if self.max_concurrency == 0 {
            return Err(ConfigurationError::ZeroCeiling);
        }

        if self.preallocated > self.max_concurrency {
            return Err(ConfigurationError::PreallocatedExceedsCeiling {
                preallocated: self.preallocated,
                ceiling: self.max_concurrency,
            });
        }

        if self.executor == ExecutorKind::FixedPopulation && self.iterations_per_client == 0 {
            return Err(ConfigurationError::ZeroIterations);
        }

        if self.tick.is_zero() {
            return Err(ConfigurationError::ZeroDuration("tick"));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigurationError::ZeroDuration("requestTimeout"));
        }

        if let Some((low, high)) = self.request.random_range {
            if low > high {
                return Err(ConfigurationError::EmptyRandomRange { low, high });
            }
        }

        Ok(())
    }

    pub fn total_stage_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// Point at which the run stops regardless of progress.
    pub fn deadline(&self) -> Duration {
        match self.max_duration {
            Some(max) => max,
            None => {
                let total = self.total_stage_duration();
                if total.is_zero() {
                    DEFAULT_MAX_DURATION
                } else {
                    total
                }
            }
        }
    }
}

fn default_name() -> String {
    "scenario".to_string()
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_iterations() -> u64 {
    1
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_tick() -> Duration {
    DEFAULT_TICK
}

fn default_sentinel() -> String {
    DEFAULT_SUCCESS_SENTINEL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_query_id() -> String {
    DEFAULT_QUERY_ID.to_string()
}

fn default_query_sql() -> String {
    DEFAULT_QUERY_SQL.to_string()
}

/// Durations are written as humantime strings (`"5s"`, `"250ms"`) or as plain seconds.
mod duration_str {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(f64),
    }

    impl Raw {
        fn into_duration<E: Error>(self) -> Result<Duration, E> {
            match self {
                Raw::Text(text) => humantime::parse_duration(text.trim())
                    .map_err(|err| E::custom(format!("invalid duration '{text}': {err}"))),
                Raw::Seconds(secs) if secs.is_finite() && secs >= 0. => {
                    Ok(Duration::from_secs_f64(secs))
                }
                Raw::Seconds(secs) => Err(E::custom(format!(
                    "durations must be non-negative, found {secs}"
                ))),
            }
        }
    }

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Raw::deserialize(deserializer)?.into_duration()
    }

    pub mod option {
        use super::Raw;
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S: Serializer>(
            duration: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match duration {
                Some(duration) => super::serialize(duration, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<Raw>::deserialize(deserializer)?
                .map(Raw::into_duration)
                .transpose()
        }
    }
}
