// src/risk.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ClassifierError;
use crate::models::{RiskVerdict, WalletSnapshot};
use crate::normalizer::shorten;

/// Text-in/text-out classification capability
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, prompt: &str) -> Result<String, ClassifierError>;
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

/// OpenAI chat-completions backed classifier
pub struct OpenAiClassifier {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClassifier {
    pub const MAX_TOKENS: u32 = 100;

    pub fn new(http: Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, prompt: &str) -> Result<String, ClassifierError> {
        let payload = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": Self::MAX_TOKENS
        });

        let resp = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ClassifierError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ClassifierError::Status(resp.status().as_u16()));
        }

        let completion: ChatCompletion = resp
            .json()
            .await
            .map_err(|e| ClassifierError::Request(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(ClassifierError::EmptyResponse)
    }
}

pub struct RiskSummarizer {
    classifier: Option<Arc<dyn Classifier>>,
}

impl RiskSummarizer {
    pub fn new(classifier: Option<Arc<dyn Classifier>>) -> Self {
        Self { classifier }
    }

    /// Fixed-shape feature summary sent to the classifier
    pub fn prompt(snapshot: &WalletSnapshot) -> String {
        format!(
            "Wallet: {}\nNetwork: {}\n{}: {:.2}, stablecoins: {}\nTotal: ${:.2}, recent transfers: {}\n\
             Is this a scam? Answer briefly: SCAM / OK / RISK + one-line reason.",
            shorten(&snapshot.address.raw, 10, 4),
            snapshot.network,
            snapshot.native_asset,
            snapshot.native_balance,
            snapshot
                .stablecoin_total()
                .map(|total| format!("{:.2}", total))
                .unwrap_or_else(|| "out of range".to_string()),
            snapshot.fiat_total,
            snapshot.recent_transfers.len()
        )
    }

    /// Never fails: any classifier problem yields the "unavailable" sentinel
    pub async fn summarize(&self, snapshot: &WalletSnapshot) -> RiskVerdict {
        match self.verdict(snapshot).await {
            Ok(text) => RiskVerdict(text),
            Err(ClassifierError::NotConfigured) => {
                debug!("No classifier configured, skipping {}", snapshot.address.raw);
                RiskVerdict::unavailable()
            }
            Err(e) => {
                warn!("Risk classification failed for {}: {}", snapshot.address.raw, e);
                RiskVerdict::unavailable()
            }
        }
    }

    async fn verdict(&self, snapshot: &WalletSnapshot) -> Result<String, ClassifierError> {
        let classifier = self.classifier.as_ref().ok_or(ClassifierError::NotConfigured)?;
        debug!("🧠 Classifying {}", snapshot.address.raw);
        classifier.classify(&Self::prompt(snapshot)).await
    }
}
