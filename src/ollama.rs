use log::{info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::errors::{PipelineError, PipelineResult};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    health_client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
    num_predict: i32,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatResponseMessage>,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PipelineError::internal(format!("failed to build Ollama HTTP client: {e}")))?;

        let health_client = Client::builder()
            .timeout(Duration::from_secs(config.health_check_timeout_seconds))
            .build()
            .map_err(|e| PipelineError::internal(format!("failed to build Ollama health client: {e}")))?;

        Ok(Self {
            client,
            health_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// `GET /api/tags` on a short timeout; swallows the error, matching the
    /// "not available" verdict a caller needs regardless of failure mode.
    pub async fn is_available(&self) -> bool {
        match self.health_client.get(format!("{}/api/tags", self.base_url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Ollama not available: {}", e);
                false
            }
        }
    }

    async fn generate(&self, prompt: String, system_prompt: &str, temperature: f64, max_tokens: i32) -> PipelineResult<Option<String>> {
        if !self.is_available().await {
            return Ok(None);
        }

        let mut messages = Vec::new();
        if !system_prompt.is_empty() {
            messages.push(ChatMessage { role: "system", content: system_prompt.to_string() });
        }
        messages.push(ChatMessage { role: "user", content: prompt });

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            options: ChatOptions { temperature, num_predict: max_tokens },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::external_unavailable(format!(
                "Ollama API returned status {}",
                response.status()
            )));
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response.message.map(|m| m.content.trim().to_string()).filter(|c| !c.is_empty());

        Ok(content)
    }

    /// Enhances a single bullet point, incorporating up to five missing keywords
    /// without inventing metrics that weren't implied by the original text.
    pub async fn enhance_bullet(&self, bullet_text: &str, job_title: &str, keywords: &[String]) -> PipelineResult<Option<String>> {
        let system_prompt = "You are an expert resume writer and ATS optimization specialist.\n\
Your job is to enhance resume bullet points to be:\n\
1. ATS-friendly with relevant keywords\n\
2. Achievement-focused with quantifiable results\n\
3. Action-verb driven\n\
4. Concise (under 25 words)\n\
5. Natural and professional\n\n\
DO NOT:\n\
- Make up fake numbers or achievements\n\
- Add information not implied in the original\n\
- Use buzzwords or clich\u{e9}s\n\
- Exceed 25 words";

        let keywords_str = keywords.iter().take(5).cloned().collect::<Vec<_>>().join(", ");

        let prompt = format!(
            "Original bullet point:\n{bullet_text}\n\n\
Target role: {job_title}\n\
Priority keywords to naturally incorporate: {keywords_str}\n\n\
Enhance this bullet point while maintaining truthfulness. If the bullet already includes metrics, keep them. \
If not, you may suggest adding \"[X]\" as a placeholder for a metric.\n\n\
Return ONLY the enhanced bullet point, nothing else."
        );

        info!("requesting bullet enhancement from model {}", self.model);
        self.generate(prompt, system_prompt, self.enhancement_temperature(), 100).await
    }

    /// Generates a 3-4 sentence professional summary positioning the candidate for `job_title`.
    pub async fn generate_summary(
        &self,
        experience_bullets: &[String],
        skills: &[String],
        job_title: &str,
        keywords: &[String],
    ) -> PipelineResult<Option<String>> {
        let system_prompt = "You are an expert resume writer. Create compelling professional summaries that:\n\
1. Highlight relevant experience and skills\n\
2. Incorporate target job keywords naturally\n\
3. Are 3-4 sentences (60-80 words)\n\
4. Use third-person perspective without pronouns\n\
5. Focus on value proposition";

        let bullets_block = experience_bullets
            .iter()
            .take(5)
            .map(|b| format!("- {}", b.chars().take(100).collect::<String>()))
            .collect::<Vec<_>>()
            .join("\n");
        let skills_str = skills.iter().take(10).cloned().collect::<Vec<_>>().join(", ");
        let keywords_str = keywords.iter().take(5).cloned().collect::<Vec<_>>().join(", ");

        let prompt = format!(
            "Target Job: {job_title}\n\n\
Key Experience:\n{bullets_block}\n\n\
Top Skills: {skills_str}\n\n\
Priority Keywords: {keywords_str}\n\n\
Write a professional summary that positions the candidate as an ideal fit for this {job_title} role."
        );

        info!("requesting summary generation from model {}", self.model);
        self.generate(prompt, system_prompt, 0.5, 150).await
    }

    /// Model-specific temperature tuning: Mistral and Qwen behave differently
    /// at the same nominal temperature for short, constrained rewrites.
    fn enhancement_temperature(&self) -> f64 {
        let model_lower = self.model.to_lowercase();
        if model_lower.contains("mistral") {
            0.25
        } else if model_lower.contains("qwen") {
            0.3
        } else {
            0.3
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LlmConfig {
        LlmConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            model: "mistral".to_string(),
            timeout_seconds: 1,
            health_check_timeout_seconds: 1,
        }
    }

    #[tokio::test]
    async fn unreachable_host_reports_unavailable() {
        let client = OllamaClient::new(&test_config()).unwrap();
        assert!(!client.is_available().await);
    }

    #[tokio::test]
    async fn enhance_bullet_returns_none_when_unavailable() {
        let client = OllamaClient::new(&test_config()).unwrap();
        let result = client
            .enhance_bullet("Built internal tooling", "Platform Engineer", &["Kubernetes".to_string()])
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn mistral_model_gets_lower_enhancement_temperature() {
        let client = OllamaClient::new(&LlmConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            model: "mistral".to_string(),
            timeout_seconds: 1,
            health_check_timeout_seconds: 1,
        })
        .unwrap();
        assert_eq!(client.enhancement_temperature(), 0.25);
    }
}
