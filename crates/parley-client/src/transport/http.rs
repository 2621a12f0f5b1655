//! HTTP collaborators.

use parley_proto::{Contact, HistoryMessage, PeerId, Profile};
use reqwest::{Client, RequestBuilder, Url, header::COOKIE};
use serde::de::DeserializeOwned;

use super::cookie_header;
use crate::{Backend, BackendError};

/// Default address of the chat service API.
pub const DEFAULT_API_URL: &str = "http://localhost:4040";

/// [`Backend`] over the chat service's REST API.
///
/// - `GET /profile`
/// - `GET /people`
/// - `GET /messages/{peer}`
/// - `POST /logout`
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    /// Create a backend for `base_url`, authenticating with `token`.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http: Client::new(), base_url, token }
    }

    /// API address in use.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base address with `segments` appended, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let invalid =
            |reason: String| BackendError::InvalidUrl(format!("{}: {reason}", self.base_url));

        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(COOKIE, cookie_header(token)),
            None => request,
        }
    }

    async fn get<T>(&self, segments: &[&str]) -> Result<T, BackendError>
    where
        T: DeserializeOwned,
    {
        let request = self.authorize(self.http.get(self.url(segments)?));
        let res = request.send().await.map_err(transport)?;
        let res = check_status(res).await?;
        res.json::<T>().await.map_err(|e| BackendError::Decode(e.to_string()))
    }
}

impl Backend for HttpBackend {
    async fn fetch_profile(&self) -> Result<Profile, BackendError> {
        self.get(&["profile"]).await
    }

    async fn fetch_contacts(&self) -> Result<Vec<Contact>, BackendError> {
        self.get(&["people"]).await
    }

    async fn fetch_history(&self, peer: &PeerId) -> Result<Vec<HistoryMessage>, BackendError> {
        self.get(&["messages", peer.as_str()]).await
    }

    async fn logout(&self) -> Result<(), BackendError> {
        let request = self.authorize(self.http.post(self.url(&["logout"])?));
        let res = request.send().await.map_err(transport)?;
        check_status(res).await.map(|_| ())
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(BackendError::Unauthorized);
    }

    let body = res.text().await.unwrap_or_default();
    Err(BackendError::UnexpectedStatus { status: status.as_u16(), body })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let backend = HttpBackend::new("http://localhost:4040/", None);
        assert_eq!(backend.base_url(), "http://localhost:4040");
        assert_eq!(backend.url(&["people"]).unwrap().as_str(), "http://localhost:4040/people");
    }

    #[test]
    fn history_path_embeds_peer() {
        let backend = HttpBackend::new(DEFAULT_API_URL, Some("abc".to_string()));
        let url = backend.url(&["messages", PeerId::new("u2").as_str()]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4040/messages/u2");
    }

    #[test]
    fn peer_ids_are_percent_encoded() {
        let backend = HttpBackend::new("http://localhost:4040/api", None);
        let url = backend.url(&["messages", "a/b c?x#y"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4040/api/messages/a%2Fb%20c%3Fx%23y");
        assert_eq!(url.path_segments().unwrap().count(), 3);
    }

    #[test]
    fn unusable_base_is_reported() {
        let backend = HttpBackend::new("not a url", None);
        assert!(matches!(backend.url(&["people"]), Err(BackendError::InvalidUrl(_))));
    }
}
