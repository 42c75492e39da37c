use crate::config::GenerationConfig;
use crate::error::ChainError;
use crate::huggingface::HuggingFaceClient;
use crate::models::ChainOutput;
use crate::prompt::{render_for_completion, PromptTemplate};
use crate::retrieval::Retriever;

/// Retrieval → prompt assembly → generation.
#[derive(Clone)]
pub struct RagChain {
    retriever: Retriever,
    prompt: PromptTemplate,
    huggingface: HuggingFaceClient,
    answer_model: String,
    generation: GenerationConfig,
}

impl RagChain {
    pub fn new(
        retriever: Retriever,
        prompt: PromptTemplate,
        huggingface: HuggingFaceClient,
        answer_model: impl Into<String>,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            retriever,
            prompt,
            huggingface,
            answer_model: answer_model.into(),
            generation,
        }
    }

    pub async fn invoke(&self, input: &str) -> Result<ChainOutput, ChainError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ChainError::EmptyInput);
        }

        let context = self.retriever.retrieve(input).await?;
        let messages = self.prompt.assemble(&context, input);
        let prompt = render_for_completion(&messages);

        let answer = self
            .huggingface
            .generate(&self.answer_model, &prompt, &self.generation)
            .await
            .map_err(ChainError::Generation)?;

        Ok(ChainOutput {
            input: input.to_string(),
            context,
            answer,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::Matcher;
    use reqwest::Client;
    use serde_json::json;

    use super::*;
    use crate::pinecone_store::PineconeStore;

    fn generation() -> GenerationConfig {
        GenerationConfig {
            temperature: 0.4,
            max_new_tokens: 300,
            top_p: 0.85,
            repetition_penalty: 1.1,
        }
    }

    fn chain(url: String) -> RagChain {
        let hf = HuggingFaceClient::new(url.clone(), "hf", Duration::from_secs(5)).unwrap();
        let pinecone = PineconeStore::with_client(Client::new(), url, "pc", None);
        let retriever = Retriever::new(hf.clone(), pinecone, "embedder", 3);
        RagChain::new(
            retriever,
            PromptTemplate::medical().unwrap(),
            hf,
            "answerer",
            generation(),
        )
    }

    #[tokio::test]
    async fn retrieved_text_reaches_the_generation_prompt() {
        let mut server = mockito::Server::new_async().await;
        let _embed = server
            .mock("POST", "/pipeline/feature-extraction/embedder")
            .with_status(200)
            .with_body("[0.3, 0.4]")
            .create_async()
            .await;
        let _query = server
            .mock("POST", "/query")
            .with_status(200)
            .with_body(
                json!({ "matches": [
                    { "id": "1", "score": 0.9, "metadata": { "text": "Malaria is spread by mosquitoes." } }
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        let generate = server
            .mock("POST", "/models/answerer")
            .match_body(Matcher::Regex(
                "Malaria is spread by mosquitoes\\..*Human: what causes malaria\\?".to_string(),
            ))
            .with_status(200)
            .with_body(r#"[{"generated_text": "A parasite carried by mosquitoes."}]"#)
            .create_async()
            .await;

        let output = chain(server.url()).invoke("  what causes malaria?  ").await.unwrap();

        assert_eq!(output.input, "what causes malaria?");
        assert_eq!(output.context.len(), 1);
        assert_eq!(output.answer, "A parasite carried by mosquitoes.");
        generate.assert_async().await;
    }

    #[tokio::test]
    async fn empty_index_still_generates() {
        let mut server = mockito::Server::new_async().await;
        let _embed = server
            .mock("POST", "/pipeline/feature-extraction/embedder")
            .with_status(200)
            .with_body("[0.3, 0.4]")
            .create_async()
            .await;
        let _query = server
            .mock("POST", "/query")
            .with_status(200)
            .with_body(r#"{"matches": []}"#)
            .create_async()
            .await;
        let _generate = server
            .mock("POST", "/models/answerer")
            .with_status(200)
            .with_body(r#"[{"generated_text": "I am not sure."}]"#)
            .create_async()
            .await;

        let output = chain(server.url()).invoke("what is lupus").await.unwrap();
        assert!(output.context.is_empty());
        assert_eq!(output.answer, "I am not sure.");
    }

    #[tokio::test]
    async fn blank_input_short_circuits() {
        let mut server = mockito::Server::new_async().await;
        let any = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = chain(server.url()).invoke(" \n ").await.unwrap_err();
        assert!(matches!(err, ChainError::EmptyInput));
        any.assert_async().await;
    }

    #[tokio::test]
    async fn generation_failure_is_tagged() {
        let mut server = mockito::Server::new_async().await;
        let _embed = server
            .mock("POST", "/pipeline/feature-extraction/embedder")
            .with_status(200)
            .with_body("[0.3]")
            .create_async()
            .await;
        let _query = server
            .mock("POST", "/query")
            .with_status(200)
            .with_body(r#"{"matches": []}"#)
            .create_async()
            .await;
        let _generate = server
            .mock("POST", "/models/answerer")
            .with_status(429)
            .with_body(r#"{"error": "Rate limit reached"}"#)
            .create_async()
            .await;

        let err = chain(server.url()).invoke("what is lupus").await.unwrap_err();
        assert_eq!(err.stage(), "generation");
        assert!(err.to_string().contains("Rate limit reached"));
    }
}
