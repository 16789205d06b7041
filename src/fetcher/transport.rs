use anyhow::{Context, Result};
use futures::future::BoxFuture;
use reqwest::{Client, Method, Request, Url};

use crate::error::FetchError;

/// Produces the request for one fetch cycle. A builder error is recorded as
/// a failed fetch without touching the network.
pub trait RequestSource: Send + Sync {
    fn build_request(&self) -> Result<Request>;
}

impl<F> RequestSource for F
where
    F: Fn() -> Result<Request> + Send + Sync,
{
    fn build_request(&self) -> Result<Request> {
        self()
    }
}

/// Plain GET against a fixed URL.
#[derive(Debug, Clone)]
pub struct StaticUrl(pub Url);

impl StaticUrl {
    pub fn parse(url: &str) -> Result<Self> {
        Ok(Self(Url::parse(url).with_context(|| format!("invalid url {url:?}"))?))
    }
}

impl RequestSource for StaticUrl {
    fn build_request(&self) -> Result<Request> {
        Ok(Request::new(Method::GET, self.0.clone()))
    }
}

/// Executes a request and hands back the body of a successful response.
pub trait Transport: Send + Sync {
    fn execute(&self, request: Request) -> BoxFuture<'_, Result<Vec<u8>, FetchError>>;
}

/// [`Transport`] over a shared `reqwest` client. Any non-2xx status is a
/// failure.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("signboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: Request) -> BoxFuture<'_, Result<Vec<u8>, FetchError>> {
        Box::pin(async move {
            let response = self
                .client
                .execute(request)
                .await
                .map_err(|err| FetchError::Transport(Box::new(err)))?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            let body = response
                .bytes()
                .await
                .map_err(|err| FetchError::Body(Box::new(err)))?;
            Ok(body.to_vec())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_url_builds_get() {
        let source = StaticUrl::parse("https://api.weather.gov/points/1,2").unwrap();
        let request = source.build_request().unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.url().host_str(), Some("api.weather.gov"));
    }

    #[test]
    fn closures_are_request_sources() {
        let source = || -> Result<Request> { anyhow::bail!("station id missing") };
        assert!(source.build_request().is_err());
    }

    #[test]
    fn rejects_malformed_urls() {
        assert!(StaticUrl::parse("not a url").is_err());
    }
}
