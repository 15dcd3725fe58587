use anyhow::Result;
use async_trait::async_trait;
use callscript_core::RawUpdate;

use crate::prompts::FunctionSchema;

/// The language-model boundary. The conversation loop owns the actual
/// HTTP client, timeouts and retries; the core only produces prompts
/// and consumes raw responses.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Free-text completion for the generation and normalization
    /// prompts.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Function-calling completion for the extraction prompt. Returns
    /// the raw field updates, untrusted until staged.
    async fn extract(&self, prompt: &str, schema: &FunctionSchema) -> Result<RawUpdate>;
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use async_trait::async_trait;
    use callscript_core::RawUpdate;
    use serde_json::json;

    use super::LlmClient;
    use crate::prompts::FunctionSchema;

    struct EchoClient;

    #[async_trait]
    impl LlmClient for EchoClient {
        async fn complete(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }

        async fn extract(&self, _prompt: &str, schema: &FunctionSchema) -> Result<RawUpdate> {
            let mut update = RawUpdate::new();
            for name in schema.property_names() {
                update.insert(name.to_string(), json!(null));
            }
            Ok(update)
        }
    }

    #[tokio::test]
    async fn trait_objects_work_across_await_points() -> Result<()> {
        let client: Box<dyn LlmClient> = Box::new(EchoClient);
        let completion = client.complete("Dobrý den.").await?;
        assert_eq!(completion, "Dobrý den.");

        let schema = crate::prompts::function_schema(
            &callscript_core::DialogueSchema::new(vec![
                callscript_core::FieldDescriptor::new(
                    "users_car_price",
                    callscript_core::FieldKind::Integer,
                ),
            ])?,
            crate::prompts::SchemaMode::Extraction,
        );
        let update = client.extract("prompt", &schema).await?;
        assert!(update.contains_key("users_car_price"));
        Ok(())
    }
}
