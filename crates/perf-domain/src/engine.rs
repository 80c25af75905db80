use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::DomainError;
use crate::task::TaskConfig;

/// Dataset name the engine resolves to its built-in prompt set.
pub const BUILTIN_DATASET_NAME: &str = "openqa";
/// Dataset name telling the engine to read prompts from `dataset_path`.
pub const CUSTOM_DATASET_NAME: &str = "custom_dataset";
pub const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
pub const DEFAULT_API: &str = "openai";
/// Connect/read timeout handed to the engine, far above any single request.
pub const NETWORK_TIMEOUT_SECS: u64 = 6000;

static ENDPOINT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[\w.-]+(?::\d+)?(?:/.*)?$").expect("endpoint url pattern is valid")
});

/// Check that `url` is an http(s) URL with a plausible host.
pub fn validate_endpoint_url(url: &str) -> Result<(), DomainError> {
    if ENDPOINT_URL.is_match(url.trim()) {
        Ok(())
    } else {
        Err(DomainError::validation(
            "endpoint_id",
            format!("malformed endpoint url: {url}"),
        ))
    }
}

/// Model identifiers must be non-empty, and well-formed when given as a URL.
pub fn validate_model_identifier(model: &str) -> Result<(), DomainError> {
    let model = model.trim();
    if model.is_empty() {
        return Err(DomainError::validation(
            "endpoint_id",
            "model identifier is empty",
        ));
    }
    if model.starts_with("http") {
        validate_endpoint_url(model)?;
    }
    Ok(())
}

/// Normalize an API base URL to its chat completions route.
pub fn chat_completions_url(base: &str) -> String {
    let base = base.trim();
    if base.ends_with(CHAT_COMPLETIONS_PATH) {
        return base.to_string();
    }
    format!("{}{CHAT_COMPLETIONS_PATH}", base.trim_end_matches('/'))
}

/// Resolved model endpoint a task will benchmark.
#[derive(Debug, Clone)]
pub struct EngineTarget {
    pub model: String,
    pub api_base_url: String,
    pub api_key: Option<String>,
}

/// Where the engine reads prompts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    BuiltIn,
    File { name: String, path: String },
}

impl DatasetSource {
    /// Name recorded on the task for display.
    pub fn display_name(&self) -> &str {
        match self {
            Self::BuiltIn => BUILTIN_DATASET_NAME,
            Self::File { name, .. } => name,
        }
    }
}

/// Configuration handed to the external benchmark engine.
#[derive(Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    pub url: String,
    pub api: String,
    pub model: String,
    pub parallel: u32,
    pub number: u32,
    pub dataset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_path: Option<String>,
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_prompt_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_prompt_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_args: Option<Map<String, Value>>,
    pub connect_timeout: u64,
    pub read_timeout: u64,
}

impl EngineConfig {
    pub fn for_task(target: &EngineTarget, dataset: &DatasetSource, config: &TaskConfig) -> Self {
        let (dataset, dataset_path) = match dataset {
            DatasetSource::BuiltIn => (BUILTIN_DATASET_NAME.to_string(), None),
            DatasetSource::File { path, .. } => {
                (CUSTOM_DATASET_NAME.to_string(), Some(path.clone()))
            }
        };
        Self {
            url: chat_completions_url(&target.api_base_url),
            api: DEFAULT_API.to_string(),
            model: target.model.clone(),
            parallel: config.concurrency,
            number: config.total_requests,
            dataset,
            dataset_path,
            stream: true,
            api_key: target.api_key.clone(),
            min_prompt_length: config.bounds.min_prompt_length,
            max_prompt_length: config.bounds.max_prompt_length,
            max_tokens: config.bounds.max_tokens,
            extra_args: config.bounds.extra_args.clone(),
            connect_timeout: NETWORK_TIMEOUT_SECS,
            read_timeout: NETWORK_TIMEOUT_SECS,
        }
    }
}

// Keeps the api key out of logs.
impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("url", &self.url)
            .field("api", &self.api)
            .field("model", &self.model)
            .field("parallel", &self.parallel)
            .field("number", &self.number)
            .field("dataset", &self.dataset)
            .field("dataset_path", &self.dataset_path)
            .field("stream", &self.stream)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("min_prompt_length", &self.min_prompt_length)
            .field("max_prompt_length", &self.max_prompt_length)
            .field("max_tokens", &self.max_tokens)
            .field("extra_args", &self.extra_args)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{DatasetRef, EndpointId};
    use crate::task::RequestBounds;

    fn target() -> EngineTarget {
        EngineTarget {
            model: "qwen2.5-7b-instruct".to_string(),
            api_base_url: "http://10.0.0.5:8000/v1/".to_string(),
            api_key: Some("sk-secret".to_string()),
        }
    }

    fn task_config() -> TaskConfig {
        TaskConfig {
            endpoint_id: EndpointId::new(1),
            dataset: DatasetRef::BuiltIn,
            concurrency: 8,
            total_requests: 100,
            bounds: RequestBounds {
                max_tokens: Some(512),
                ..RequestBounds::default()
            },
        }
    }

    #[test]
    fn url_gets_chat_completions_suffix_once() {
        assert_eq!(
            chat_completions_url("http://host:8000/v1/"),
            "http://host:8000/v1/chat/completions"
        );
        assert_eq!(
            chat_completions_url("http://host/v1/chat/completions"),
            "http://host/v1/chat/completions"
        );
    }

    #[test]
    fn builtin_dataset_config() {
        let cfg = EngineConfig::for_task(&target(), &DatasetSource::BuiltIn, &task_config());
        assert_eq!(cfg.url, "http://10.0.0.5:8000/v1/chat/completions");
        assert_eq!(cfg.dataset, BUILTIN_DATASET_NAME);
        assert!(cfg.dataset_path.is_none());
        assert_eq!(cfg.parallel, 8);
        assert_eq!(cfg.number, 100);
        assert!(cfg.stream);
        assert_eq!(cfg.max_tokens, Some(512));
        assert_eq!(cfg.read_timeout, NETWORK_TIMEOUT_SECS);
    }

    #[test]
    fn custom_dataset_config_carries_path() {
        let source = DatasetSource::File {
            name: "support-tickets".to_string(),
            path: "/data/tickets.jsonl".to_string(),
        };
        let cfg = EngineConfig::for_task(&target(), &source, &task_config());
        assert_eq!(cfg.dataset, CUSTOM_DATASET_NAME);
        assert_eq!(cfg.dataset_path.as_deref(), Some("/data/tickets.jsonl"));
        assert_eq!(source.display_name(), "support-tickets");
    }

    #[test]
    fn debug_redacts_api_key() {
        let cfg = EngineConfig::for_task(&target(), &DatasetSource::BuiltIn, &task_config());
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn serialized_config_omits_unset_options() {
        let mut cfg = EngineConfig::for_task(&target(), &DatasetSource::BuiltIn, &task_config());
        cfg.api_key = None;
        let value = serde_json::to_value(&cfg).unwrap();
        assert!(value.get("api_key").is_none());
        assert!(value.get("min_prompt_length").is_none());
        assert_eq!(value["max_tokens"], 512);
    }

    #[test]
    fn endpoint_url_validation() {
        assert!(validate_endpoint_url("http://localhost:8000/v1").is_ok());
        assert!(validate_endpoint_url("https://api.example.com").is_ok());
        assert!(validate_endpoint_url("ftp://example.com").is_err());
        assert!(validate_endpoint_url("http://").is_err());
        assert!(validate_endpoint_url("http://bad host/v1").is_err());
    }

    #[test]
    fn model_identifier_validation() {
        assert!(validate_model_identifier("qwen-7b").is_ok());
        assert!(validate_model_identifier("  ").is_err());
        assert!(validate_model_identifier("http://not a url").is_err());
    }
}
