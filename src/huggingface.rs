use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;

/// Client for the hosted Hugging Face Inference API. Serves both the embedding
/// pipeline and the text-generation model.
#[derive(Clone)]
pub struct HuggingFaceClient {
    client: Client,
    base_url: String,
    api_token: String,
}

#[derive(Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddingResp {
    Vector(Vec<f32>),
    Matrix(Vec<Vec<f32>>),
}

impl HuggingFaceClient {
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build hugging face http client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
        })
    }

    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct EmbedReq<'a> {
            inputs: &'a str,
            options: InferenceOptions,
        }

        let input = text.trim();
        if input.is_empty() {
            anyhow::bail!("cannot embed empty text input");
        }

        let url = format!("{}/pipeline/feature-extraction/{}", self.base_url, model);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_token)
            .json(&EmbedReq {
                inputs: input,
                options: InferenceOptions {
                    wait_for_model: true,
                },
            })
            .send()
            .await
            .context("failed to call hugging face feature-extraction endpoint")?;

        let response = check_status(response, "feature-extraction").await?;
        let decoded = response
            .json::<EmbeddingResp>()
            .await
            .context("failed to decode hugging face feature-extraction response")?;

        match decoded {
            EmbeddingResp::Vector(vector) if !vector.is_empty() => Ok(vector),
            EmbeddingResp::Matrix(rows) => mean_pool(rows),
            EmbeddingResp::Vector(_) => {
                anyhow::bail!("hugging face feature-extraction returned an empty vector")
            }
        }
    }

    pub async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct EmbedBatchReq<'a> {
            inputs: &'a [String],
            options: InferenceOptions,
        }

        if texts.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}/pipeline/feature-extraction/{}", self.base_url, model);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_token)
            .json(&EmbedBatchReq {
                inputs: texts,
                options: InferenceOptions {
                    wait_for_model: true,
                },
            })
            .send()
            .await
            .context("failed to call hugging face feature-extraction endpoint")?;

        let response = check_status(response, "feature-extraction").await?;
        let vectors = response
            .json::<Vec<Vec<f32>>>()
            .await
            .context("failed to decode hugging face batch embedding response")?;

        if vectors.len() != texts.len() {
            anyhow::bail!(
                "hugging face returned {} embeddings for {} inputs",
                vectors.len(),
                texts.len()
            );
        }

        Ok(vectors)
    }

    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        params: &GenerationConfig,
    ) -> Result<String> {
        #[derive(Serialize)]
        struct GenerateReq<'a> {
            inputs: &'a str,
            parameters: GenerateParams,
            options: InferenceOptions,
        }

        #[derive(Serialize)]
        struct GenerateParams {
            temperature: f32,
            max_new_tokens: usize,
            top_p: f32,
            repetition_penalty: f32,
            return_full_text: bool,
        }

        #[derive(Deserialize)]
        struct Generation {
            generated_text: String,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum GenerateResp {
            List(Vec<Generation>),
            Single(Generation),
        }

        let url = format!("{}/models/{}", self.base_url, model);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_token)
            .json(&GenerateReq {
                inputs: prompt,
                parameters: GenerateParams {
                    temperature: params.temperature,
                    max_new_tokens: params.max_new_tokens,
                    top_p: params.top_p,
                    repetition_penalty: params.repetition_penalty,
                    return_full_text: false,
                },
                options: InferenceOptions {
                    wait_for_model: true,
                },
            })
            .send()
            .await
            .context("failed to call hugging face text-generation endpoint")?;

        let response = check_status(response, "text-generation").await?;
        let decoded = response
            .json::<GenerateResp>()
            .await
            .context("failed to decode hugging face text-generation response")?;

        let text = match decoded {
            GenerateResp::Single(generation) => generation.generated_text,
            GenerateResp::List(generations) => generations
                .into_iter()
                .next()
                .map(|g| g.generated_text)
                .ok_or_else(|| anyhow::anyhow!("hugging face returned no generations"))?,
        };

        Ok(text.trim().to_string())
    }
}

async fn check_status(response: reqwest::Response, task: &str) -> Result<reqwest::Response> {
    if response.status() == StatusCode::OK {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!(
        "hugging face {task} returned {status}: {}",
        normalize_err_body(&body)
    )
}

/// Token-level outputs are averaged into one sentence vector.
fn mean_pool(rows: Vec<Vec<f32>>) -> Result<Vec<f32>> {
    let Some(width) = rows.first().map(Vec::len) else {
        anyhow::bail!("hugging face feature-extraction returned no rows");
    };
    if width == 0 || rows.iter().any(|row| row.len() != width) {
        anyhow::bail!("hugging face feature-extraction returned ragged rows");
    }

    let count = rows.len() as f32;
    let mut pooled = vec![0.0f32; width];
    for row in &rows {
        for (acc, value) in pooled.iter_mut().zip(row) {
            *acc += value;
        }
    }
    pooled.iter_mut().for_each(|v| *v /= count);
    Ok(pooled)
}

pub(crate) fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(err) = json.get("error").and_then(|v| v.as_str()) {
            return err.to_string();
        }
        if let Some(err) = json.get("message").and_then(|v| v.as_str()) {
            return err.to_string();
        }
    }

    trimmed.to_string()
}
