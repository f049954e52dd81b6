mod llm;
mod postgres;
mod r2;

pub use llm::LlmClient;
pub use postgres::PostgresClient;
pub use r2::R2Client;
