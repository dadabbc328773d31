//! OpenAI 兼容的 chat completions 后端
//!
//! 每批文本发送一次请求，要求模型返回 `{"translations": [...]}`。
//! 也适用于提供相同接口的自建服务（通过 `base_url` 指定）。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{TranslateRequest, TranslationBackend};
use crate::translation::core::languages::{language_name, locale_clarification};
use crate::translation::error::{helpers, TranslationError, TranslationResult};

pub use crate::translation::config::constants::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::translation::config::constants::DEFAULT_PROVIDER_TIMEOUT;

/// 错误信息中出现这些片段时认为是瞬时故障
const RETRYABLE_PATTERNS: &[&str] = &[
    "rate limit",
    "timeout",
    "connection refused",
    "temporary",
    "overloaded",
    "503",
    "502",
    "429",
];

/// OpenAI 后端配置
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct ContextItem<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
}

/// OpenAI 兼容后端
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
    endpoint: String,
}

impl OpenAiBackend {
    pub fn new(mut config: OpenAiConfig) -> TranslationResult<Self> {
        if config.model.trim().is_empty() {
            config.model = DEFAULT_MODEL.to_string();
        }
        if config.temperature <= 0.0 {
            config.temperature = DEFAULT_TEMPERATURE;
        }
        if config.base_url.trim().is_empty() {
            config.base_url = DEFAULT_BASE_URL.to_string();
        }

        let base = url::Url::parse(config.base_url.trim()).map_err(|e| {
            helpers::config_error(format!("无效的后端地址 {}: {}", config.base_url, e))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(helpers::config_error(format!(
                "后端地址必须使用 http 或 https: {}",
                config.base_url
            )));
        }
        let endpoint = format!("{}/chat/completions", base.as_str().trim_end_matches('/'));

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| helpers::config_error(format!("无法创建HTTP客户端: {}", e)))?;

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    async fn send(&self, body: &ChatRequest<'_>) -> TranslationResult<String> {
        let mut builder = self.client.post(&self.endpoint).json(body);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TranslationError::Provider {
                message: format!("OpenAI API 返回 {}: {}", status, truncate(&text, 300)),
                retryable: is_retryable_status(status) || is_retryable_message(&text),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            helpers::fatal_provider_error(format!("无法解析 OpenAI 响应: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| helpers::retryable_provider_error("OpenAI 未返回任何结果"))
    }
}

#[async_trait]
impl TranslationBackend for OpenAiBackend {
    async fn translate(
        &self,
        cancel: &CancellationToken,
        request: TranslateRequest,
    ) -> TranslationResult<Vec<String>> {
        if request.is_empty() {
            return Ok(Vec::new());
        }

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: build_system_prompt(&request),
                },
                ChatMessage {
                    role: "user",
                    content: build_user_message(&request)?,
                },
            ],
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        tracing::debug!(
            "向 {} 发送 {} 条文本 (模型 {})",
            self.endpoint,
            request.len(),
            self.config.model
        );

        let content = tokio::select! {
            _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
            result = self.send(&body) => result?,
        };

        parse_response(&content, request.len())
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

/// 构建系统提示词
pub fn build_system_prompt(request: &TranslateRequest) -> String {
    let target = language_name(&request.target_lang);
    let context = if request.context.is_empty() {
        "The content is general web content.".to_string()
    } else {
        format!(
            "The content is for: {}. Adapt the tone to be appropriate for this context.",
            request.context
        )
    };

    let mut prompt = format!(
        "# Role\n\
You are an expert native translator. You translate content to {target} with the fluency and nuance of a highly educated native speaker.\n\
\n\
# Context\n\
{context}\n\
\n\
# Register\n\
{register}\n\
\n\
# Task\n\
Translate the provided texts into idiomatic {target}.\n\
\n\
# Style Guide\n\
- **Natural Flow**: Avoid literal translations. Rephrase sentences to sound completely natural to a native speaker.\n\
- **Vocabulary**: Use precise, culturally relevant terminology. Avoid awkward \"translationese\" or robotic phrasing.\n\
- **Tone**: Maintain the original intent but adapt the wording to fit the target culture's expectations.\n\
- **Idioms**: Never translate idioms literally. Replace idioms with natural {target} equivalents.\n\
- **HTML/Code Safety**: Do NOT translate HTML tags, class names, IDs, attributes, URLs, email addresses, or content inside backticks or <code> blocks.\n\
- **Interpolation**: Do NOT translate variables or placeholders (e.g., {{{{name}}}}, {{count}}, %s, $1).\n\
- **Formatting**: Preserve meaningful whitespace (leading/trailing spaces, multiple spaces, newlines). Use idiomatic punctuation for the target language.",
        target = target,
        context = context,
        register = request.style.description(),
    );

    if let Some(hint) = locale_clarification(&request.target_lang) {
        prompt.push_str(&format!("\n- **Locale**: {}", hint));
    }

    if !request.source_lang.is_empty() {
        prompt.push_str(&format!(
            "\n- **Source**: The source texts are written in {}.",
            language_name(&request.source_lang)
        ));
    }

    if !request.glossary.is_empty() {
        prompt.push_str(
            "\n\n# Glossary\nWhen you encounter these phrases, prefer these translations (unless context demands otherwise):",
        );
        for (source, target) in &request.glossary {
            prompt.push_str(&format!("\n- \"{}\" → {}", source, target));
        }
    }

    prompt.push_str(&format!(
        "\n\n# Quality Check\nAfter translating each string, verify it sounds like native {} and not a calque. If any phrase sounds like a literal translation, rewrite it naturally.",
        target
    ));

    prompt.push_str(
        "\n\n# Format\n\
Return a valid JSON object with a single key \"translations\" containing an array of strings in the exact same order as the input.\n\
Example: { \"translations\": [\"translated string 1\", \"translated string 2\"] }\n\
- Do NOT wrap in Markdown code blocks.\n\
- If an input item has a \"context\" field, use it only to disambiguate. Never include it in the output.",
    );

    if !request.excluded_terms.is_empty() {
        prompt.push_str(&format!(
            "\n\n# Exclusions\nDo NOT translate the following terms. Keep them exactly as they appear in the source:\n- {}",
            request.excluded_terms.join("\n- ")
        ));
    }

    prompt
}

/// 构建用户消息
///
/// 没有单条上下文时发送字符串数组，否则发送 `{"items": [{"text", "context"}]}`。
pub fn build_user_message(request: &TranslateRequest) -> TranslationResult<String> {
    if !request.has_text_contexts() {
        return Ok(serde_json::to_string(&request.texts)?);
    }

    let items: Vec<ContextItem<'_>> = request
        .texts
        .iter()
        .enumerate()
        .map(|(i, text)| ContextItem {
            text,
            context: request
                .text_contexts
                .get(i)
                .map(String::as_str)
                .filter(|c| !c.is_empty()),
        })
        .collect();

    Ok(serde_json::to_string(&serde_json::json!({ "items": items }))?)
}

/// 解析模型输出
///
/// 依次尝试 `translations` 键、对象中的第一个数组、顶层数组。
pub fn parse_response(content: &str, expected: usize) -> TranslationResult<Vec<String>> {
    let content = strip_code_fence(content);

    let array = match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => match map.get("translations") {
            Some(Value::Array(items)) => Some(items.clone()),
            _ => map.values().find_map(|value| match value {
                Value::Array(items) => Some(items.clone()),
                _ => None,
            }),
        },
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    };

    let items = array
        .ok_or_else(|| helpers::fatal_provider_error("OpenAI 返回的格式无效"))?;

    let translations: Vec<String> = items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect();

    if translations.len() != expected {
        return Err(TranslationError::CountMismatch {
            expected,
            got: translations.len(),
        });
    }

    Ok(translations)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn is_retryable_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    RETRYABLE_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}…", head)
    }
}
