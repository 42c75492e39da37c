use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::PineconeConfig;
use crate::huggingface::normalize_err_body;

#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PineconeVector {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
}

/// Data-plane client for one existing Pinecone index.
#[derive(Clone)]
pub struct PineconeStore {
    client: Client,
    host: String,
    api_key: String,
    namespace: Option<String>,
}

impl PineconeStore {
    /// Connects to an existing index, resolving its data-plane host through the
    /// control plane unless one is configured.
    pub async fn connect(config: &PineconeConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build pinecone http client")?;

        let host = match &config.index_host {
            Some(host) => host.clone(),
            None => describe_index_host(&client, config).await?,
        };

        Ok(Self::with_client(
            client,
            host,
            config.api_key.clone(),
            config.namespace.clone(),
        ))
    }

    pub fn with_client(
        client: Client,
        host: impl AsRef<str>,
        api_key: impl Into<String>,
        namespace: Option<String>,
    ) -> Self {
        Self {
            client,
            host: normalize_host(host.as_ref()),
            api_key: api_key.into(),
            namespace,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<VectorMatch>> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct QueryReq<'a> {
            vector: &'a [f32],
            top_k: usize,
            include_metadata: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            namespace: Option<&'a str>,
        }

        if vector.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }

        let url = format!("{}/query", self.host);
        let response = self
            .client
            .post(url)
            .header("Api-Key", &self.api_key)
            .json(&QueryReq {
                vector,
                top_k,
                include_metadata: true,
                namespace: self.namespace.as_deref(),
            })
            .send()
            .await
            .context("failed to contact pinecone during query")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "pinecone query returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        let response = response
            .json::<PineconeQueryResponse>()
            .await
            .context("failed to decode pinecone query response")?;

        Ok(response
            .matches
            .into_iter()
            .map(|m| VectorMatch {
                id: m.id,
                score: m.score.unwrap_or(0.0),
                metadata: m.metadata.unwrap_or_default(),
            })
            .collect())
    }

    pub async fn upsert(&self, vectors: &[PineconeVector]) -> Result<usize> {
        #[derive(Serialize)]
        struct UpsertReq<'a> {
            vectors: &'a [PineconeVector],
            #[serde(skip_serializing_if = "Option::is_none")]
            namespace: Option<&'a str>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct UpsertResp {
            #[serde(default)]
            upserted_count: usize,
        }

        if vectors.is_empty() {
            return Ok(0);
        }

        let url = format!("{}/vectors/upsert", self.host);
        let response = self
            .client
            .post(url)
            .header("Api-Key", &self.api_key)
            .json(&UpsertReq {
                vectors,
                namespace: self.namespace.as_deref(),
            })
            .send()
            .await
            .context("failed to contact pinecone during upsert")?
            .error_for_status()
            .context("pinecone upsert returned non-success status")?
            .json::<UpsertResp>()
            .await
            .context("failed to decode pinecone upsert response")?;

        Ok(response.upserted_count)
    }
}

async fn describe_index_host(client: &Client, config: &PineconeConfig) -> Result<String> {
    #[derive(Deserialize)]
    struct DescribeIndexResp {
        host: String,
    }

    let url = format!(
        "{}/indexes/{}",
        config.control_url.trim_end_matches('/'),
        config.index_name
    );

    let response = client
        .get(url)
        .header("Api-Key", &config.api_key)
        .send()
        .await
        .context("failed to contact pinecone control plane")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!(
            "pinecone describe index {} returned {status}: {}",
            config.index_name,
            normalize_err_body(&body)
        );
    }

    let described = response
        .json::<DescribeIndexResp>()
        .await
        .context("failed to decode pinecone describe index response")?;

    Ok(described.host)
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

#[derive(Debug, Deserialize)]
struct PineconeQueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Debug, Deserialize)]
struct PineconeMatch {
    id: String,
    score: Option<f32>,
    metadata: Option<Map<String, Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn config(control_url: String) -> PineconeConfig {
        PineconeConfig {
            api_key: "pc-test".to_string(),
            control_url,
            index_name: "medicalbot".to_string(),
            index_host: None,
            namespace: None,
        }
    }

    #[test]
    fn bare_hosts_get_https_scheme() {
        assert_eq!(
            normalize_host("medicalbot-abc.svc.pinecone.io/"),
            "https://medicalbot-abc.svc.pinecone.io"
        );
        assert_eq!(normalize_host("http://127.0.0.1:1234"), "http://127.0.0.1:1234");
    }

    #[tokio::test]
    async fn connect_resolves_host_from_control_plane() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let mock = server
            .mock("GET", "/indexes/medicalbot")
            .match_header("api-key", "pc-test")
            .with_status(200)
            .with_body(json!({ "name": "medicalbot", "host": url }).to_string())
            .create_async()
            .await;

        let store = PineconeStore::connect(&config(server.url()), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(store.host(), url);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn connect_fails_for_unknown_index() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/indexes/medicalbot")
            .with_status(404)
            .with_body(r#"{"error":{"code":"NOT_FOUND"},"status":404}"#)
            .create_async()
            .await;

        let err = PineconeStore::connect(&config(server.url()), Duration::from_secs(5))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn query_requests_metadata_and_maps_matches() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/query")
            .match_header("api-key", "pc-test")
            .match_body(Matcher::PartialJson(json!({
                "topK": 3,
                "includeMetadata": true
            })))
            .with_status(200)
            .with_body(
                json!({
                    "matches": [
                        { "id": "a", "score": 0.91, "metadata": { "text": "Acne is common." } },
                        { "id": "b", "score": 0.5 }
                    ],
                    "namespace": ""
                })
                .to_string(),
            )
            .create_async()
            .await;

        let store = PineconeStore::with_client(Client::new(), server.url(), "pc-test", None);
        let matches = store.query(&[0.1, 0.2], 3).await.unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a");
        assert_eq!(
            matches[0].metadata.get("text").and_then(|v| v.as_str()),
            Some("Acne is common.")
        );
        assert!(matches[1].metadata.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upsert_sends_namespace_when_configured() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/vectors/upsert")
            .match_body(Matcher::PartialJson(json!({ "namespace": "books" })))
            .with_status(200)
            .with_body(r#"{"upsertedCount": 1}"#)
            .create_async()
            .await;

        let store = PineconeStore::with_client(
            Client::new(),
            server.url(),
            "pc-test",
            Some("books".to_string()),
        );
        let count = store
            .upsert(&[PineconeVector {
                id: "x".to_string(),
                values: vec![0.5],
                metadata: Map::new(),
            }])
            .await
            .unwrap();

        assert_eq!(count, 1);
        mock.assert_async().await;
    }
}
