use std::env;

use sadam_common::define_module_client;

use async_openai::{config::OpenAIConfig, Client};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

define_module_client! {
    (struct LlmClient, "llm")
    client_type: Client<OpenAIConfig>,
    env: ["OPENAI_API_KEY"],
    setup: async {
        let api_key = env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY is not set");
        let base_url = env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let openai_config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key(api_key);

        Client::build(
            reqwest::Client::new(),
            openai_config,
            Default::default()
        )
    }
}
