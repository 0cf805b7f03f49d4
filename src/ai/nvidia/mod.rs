pub mod advice;
pub mod types;

pub use advice::NvidiaAdvisorClient;
