//! Prompt-templated helpers backed by a local Ollama-compatible inference
//! endpoint. Every operation funnels through one non-streaming
//! `POST /api/generate` call; nothing is retried.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::error::{Error, Result};
use crate::sanitize::strip_html;

const SUMMARY_BUDGET: usize = 2000;
const REPLY_BUDGET: usize = 1500;
const SUBJECT_BUDGET: usize = 500;

// -- Ollama API wire types --

#[derive(Serialize)]
struct GenRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Serialize)]
struct GenOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenResponse {
    #[serde(default)]
    response: String,
}

pub struct AiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    model: String,
    temperature: f64,
    num_predict: u32,
}

impl AiClient {
    pub fn new(config: &AiConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Ai(e.to_string()))?;

        Ok(AiClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            num_predict: config.num_predict,
        })
    }

    /// Single blocking generate call. Returns the trimmed `response` field.
    pub fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        let body = GenRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenOptions {
                temperature: self.temperature,
                num_predict: self.num_predict,
            },
            system,
        };

        tracing::info!(model = %self.model, "calling inference service");
        let resp = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .map_err(classify_request_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().unwrap_or_default();
            tracing::error!(%status, "inference service returned an error");
            return Err(Error::Ai(format!("HTTP {}: {}", status, text)));
        }

        let gen: GenResponse = resp
            .json()
            .map_err(|e| Error::Ai(format!("parse failed: {}", e)))?;
        Ok(gen.response.trim().to_string())
    }

    /// Short summary of one email.
    pub fn summarize(&self, subject: &str, body_html: &str) -> Result<String> {
        let content = truncate(&strip_html(body_html), SUMMARY_BUDGET);

        let system = "You are an assistant that summarizes emails concisely. \
                      Write a summary of 2-3 sentences at most. \
                      Keep the key facts: who, what, when, and any important requests.";
        let prompt = format!(
            "Summarize this email:\n\nSubject: {}\n\nContent:\n{}\n\nSummary:",
            subject, content
        );

        self.generate(&prompt, Some(system))
    }

    /// Suggested professional reply to an email.
    pub fn suggest_reply(
        &self,
        subject: &str,
        body_html: &str,
        sender_name: &str,
    ) -> Result<String> {
        let content = truncate(&strip_html(body_html), REPLY_BUDGET);

        let system = "You are a professional assistant that helps write email replies. \
                      Write a polite, professional reply. \
                      Keep it short (3-5 sentences) but complete. \
                      Start directly with the greeting.";
        let prompt = format!(
            "Write a professional reply to this email:\n\nFrom: {}\nSubject: {}\n\nMessage received:\n{}\n\nSuggested reply:",
            sender_name, subject, content
        );

        self.generate(&prompt, Some(system))
    }

    /// Full email body from a free-form user instruction. No subject line.
    pub fn draft(&self, instruction: &str) -> Result<String> {
        let system = "You are an assistant that writes professional emails. \
                      Produce a complete email with an appropriate greeting, \
                      a clear and professional body, and a closing formula. \
                      Do not generate the subject, only the message content.";
        let prompt = format!(
            "Write a professional email based on this request:\n\n{}\n\nEmail:",
            instruction
        );

        self.generate(&prompt, Some(system))
    }

    /// Subject line for a message body, ten words at most.
    pub fn generate_subject(&self, body_html: &str) -> Result<String> {
        let content = truncate(&strip_html(body_html), SUBJECT_BUDGET);

        let system = "You generate short, relevant email subjects. Maximum 10 words.";
        let prompt = format!(
            "Generate an email subject for this content:\n\n{}\n\nSubject:",
            content
        );

        self.generate(&prompt, Some(system))
    }
}

fn classify_request_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        tracing::error!("inference service timed out");
        Error::AiTimeout
    } else if e.is_connect() {
        tracing::error!("cannot connect to inference service");
        Error::AiUnreachable
    } else {
        tracing::error!(error = %e, "inference request failed");
        Error::Ai(e.to_string())
    }
}

fn truncate(text: &str, budget: usize) -> String {
    text.chars().take(budget).collect()
}
