use super::{DiagnosisPrompt, DiagnosisProvider};
use crate::models::MechanicResponse;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Scripted provider for tests and harnesses.
///
/// Replies are served in the order they were queued. Every call is recorded
/// with the prompt and credential it received.
#[derive(Clone)]
pub struct MockDiagnosisProvider {
    name: String,
    replies: Arc<Mutex<VecDeque<Result<MechanicResponse>>>>,
    calls: Arc<Mutex<Vec<(DiagnosisPrompt, Option<String>)>>>,
}

impl MockDiagnosisProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_report(self, report: MechanicResponse) -> Self {
        self.replies.lock().unwrap().push_back(Ok(report));
        self
    }

    pub fn with_error(self, error: Error) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(DiagnosisPrompt, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiagnosisProvider for MockDiagnosisProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn diagnose(
        &self,
        prompt: &DiagnosisPrompt,
        credential: Option<&str>,
    ) -> Result<MechanicResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.clone(), credential.map(str::to_string)));

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::provider(None, "no scripted reply")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::sample_report_json;

    fn prompt() -> DiagnosisPrompt {
        DiagnosisPrompt {
            system_instruction: String::new(),
            user_text: "noise".to_string(),
            media: None,
        }
    }

    #[tokio::test]
    async fn test_replies_served_in_order() {
        let report: MechanicResponse = serde_json::from_value(sample_report_json()).unwrap();
        let provider = MockDiagnosisProvider::new("mock")
            .with_report(report.clone())
            .with_error(Error::MalformedResponse("bad".to_string()));

        assert_eq!(provider.diagnose(&prompt(), None).await.unwrap(), report);
        assert!(matches!(
            provider.diagnose(&prompt(), None).await,
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            provider.diagnose(&prompt(), None).await,
            Err(Error::Provider { .. })
        ));
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let provider = MockDiagnosisProvider::new("mock");
        assert_eq!(provider.get_call_count(), 0);

        let _ = provider.diagnose(&prompt(), Some("key")).await;
        assert_eq!(provider.get_call_count(), 1);
        assert_eq!(provider.calls()[0].1.as_deref(), Some("key"));
    }
}
