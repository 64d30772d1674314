// chat-client/src/http.rs
use common::{ApiConfig, ChatQuestion, InboundFrame};
use reqwest::RequestBuilder;
use url::Url;

use crate::error::ClientError;

/// Request/response chat variant: one `POST {base_url}/chat` per question
#[derive(Clone)]
pub struct HttpChatClient {
    http: reqwest::Client,
    base: Url,
    base_url: String,
}

fn segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|parts| parts.filter(|part| !part.is_empty()).collect())
        .unwrap_or_default()
}

impl HttpChatClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let base = Url::parse(&config.base_url)?;
        let base_url = base.as_str().trim_end_matches('/').to_string();
        Ok(Self {
            http: reqwest::Client::new(),
            base,
            base_url,
        })
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat", self.base_url)
    }

    /// Same origin and every path segment of the base, so `/dev-other`
    /// does not count as being under `/dev`
    pub fn is_own_api(&self, url: &str) -> bool {
        let Ok(target) = Url::parse(url) else {
            return false;
        };
        target.origin() == self.base.origin() && segments(&target).starts_with(&segments(&self.base))
    }

    /// Attach the bearer token, but only to requests aimed at our own API
    pub fn authorize(&self, url: &str, request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) if self.is_own_api(url) => request.bearer_auth(token),
            _ => request,
        }
    }

    /// Ask a question. The body is `{sessionId, question, lang}`; the
    /// response is usually a JSON string wrapping the answer object.
    pub async fn ask(
        &self,
        question: &ChatQuestion,
        token: Option<&str>,
    ) -> Result<InboundFrame, ClientError> {
        let body = ChatQuestion {
            history: Vec::new(),
            ..question.clone()
        };

        let url = self.chat_url();
        tracing::debug!(%url, "Sending chat question over HTTP");

        let request = self.authorize(&url, self.http.post(&url).json(&body), token);
        let response = request.send().await?.error_for_status()?;
        // A body that is not JSON is a malformed frame, not a transport failure
        let body = response.text().await?;

        Ok(InboundFrame::parse(&body))
    }
}
