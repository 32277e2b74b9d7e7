use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Configuration for talking to a local Ollama server.
///
/// This crate intentionally only supports Ollama's local HTTP API.
/// It refuses to run if the configured base URL is not local.
#[derive(Debug, Clone)]
pub struct OllamaClientConfig {
    pub base_url: String,
    pub model: String,
}

impl OllamaClientConfig {
    /// Loads config from env vars:
    /// - `OLLAMA_BASE_URL` (default: `http://localhost:11434`)
    /// - `OLLAMA_MODEL`    (default: `llama3.2`)
    pub fn from_env() -> Self {
        let base_url = std::env::var("OLLAMA_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
        Self { base_url, model }
    }
}

/// Column letters (A-Z) identifying where each holding field lives in the
/// source sheet. Key names match the JSON the model is asked to return.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnLetters {
    pub isin: String,
    pub instrument_name: String,
    pub market_value: String,
    pub quantity: String,
}

/// Result of schema inference over the first rows of a holdings sheet:
/// which columns hold what, and the first 1-based row of actual data.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetAnalysis {
    pub data_start_row: usize,
    pub columns: ColumnLetters,
}

const STRUCTURE_SYSTEM_PROMPT: &str = "\
You are a data analyst identifying the structure of mutual fund portfolio \
disclosure sheets. The user sends the first rows of a spreadsheet, one row \
per line, with cells separated by ' | ' and columns labelled A, B, C, ... \
Identify the single-letter column holding each of: the ISIN (12-character \
code starting with IN), the instrument/company name, the market value, and \
the quantity. Also identify the first 1-based row number that contains \
actual holdings data (not headers). Respond with ONLY a JSON object of the \
exact shape \
{\"dataStartRow\": <number>, \"columns\": {\"isin\": \"<letter>\", \
\"instrumentName\": \"<letter>\", \"marketValue\": \"<letter>\", \
\"quantity\": \"<letter>\"}} and nothing else.";

/// Minimal Ollama chat client (blocking HTTP).
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: Url,
    model: String,
}

impl OllamaClient {
    pub fn new(config: OllamaClientConfig) -> Result<Self> {
        let base_url = validate_local_base_url(&config.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            model: config.model,
        })
    }

    /// Generic helper for a single-turn chat call.
    pub fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let endpoint = self
            .base_url
            .join("api/chat")
            .context("Failed to build Ollama /api/chat URL")?;

        let request = OllamaChatRequest {
            model: self.model.clone(),
            stream: false,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            options: Some(OllamaOptions {
                temperature: Some(0.0),
            }),
        };

        let response: OllamaChatResponse = self
            .http
            .post(endpoint.clone())
            .json(&request)
            .send()
            .with_context(|| format!("POST {endpoint} failed"))?
            .error_for_status()
            .with_context(|| format!("POST {endpoint} returned non-success status"))?
            .json()
            .with_context(|| format!("Failed to parse JSON response from {endpoint}"))?;

        let content = response
            .message
            .map(|m| m.content)
            .ok_or_else(|| anyhow!("Ollama response had no message content"))?;

        Ok(content.trim().to_string())
    }

    /// Infers the column mapping and data start row from a preview of the
    /// first rows of a sheet (the caller limits the preview, typically to
    /// 15 rows).
    pub fn infer_sheet_structure(&self, rows_preview: &str) -> Result<SheetAnalysis> {
        let raw = self.chat(STRUCTURE_SYSTEM_PROMPT, rows_preview)?;
        parse_analysis_response(&raw)
    }
}

/// Models wrap JSON in prose or markdown fences more often than not; pull
/// out the outermost object before deserializing.
pub fn parse_analysis_response(raw: &str) -> Result<SheetAnalysis> {
    let start = raw
        .find('{')
        .ok_or_else(|| anyhow!("No JSON object in model response: {raw}"))?;
    let end = raw
        .rfind('}')
        .ok_or_else(|| anyhow!("Unterminated JSON object in model response: {raw}"))?;
    if end < start {
        return Err(anyhow!("Malformed JSON object in model response: {raw}"));
    }

    let analysis: SheetAnalysis = serde_json::from_str(&raw[start..=end])
        .with_context(|| format!("Model response was not a valid sheet analysis: {raw}"))?;

    if analysis.data_start_row == 0 {
        return Err(anyhow!("Model returned dataStartRow 0 (rows are 1-based)"));
    }

    Ok(analysis)
}

fn validate_local_base_url(base_url: &str) -> Result<Url> {
    let url =
        Url::parse(base_url).with_context(|| format!("Invalid OLLAMA_BASE_URL: {base_url}"))?;

    match url.scheme() {
        "http" => {}
        other => {
            return Err(anyhow!(
                "Unsupported scheme '{other}' for OLLAMA_BASE_URL (use http://localhost:11434)"
            ))
        }
    }

    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("OLLAMA_BASE_URL is missing a host"))?;

    let is_local = host.eq_ignore_ascii_case("localhost") || host == "127.0.0.1" || host == "::1";

    if !is_local {
        return Err(anyhow!(
            "Refusing non-local OLLAMA_BASE_URL host '{host}'. This project only uses local Ollama (use http://localhost:11434)."
        ));
    }

    Ok(url)
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<Message>,
}
