pub mod advice;
pub mod client;
pub mod types;

pub use advice::GeminiAdvisorClient;
