use super::{
    Reply,
    Request,
    Transport,
    TransportError,
};
use std::{
    future::Future,
    pin::Pin,
    time::Duration,
};

/// [`Transport`] over a shared `reqwest` client.
///
/// The client is cheap to clone and safe to share between all reporters. The
/// timeout covers one attempt, from connecting until the body has been read.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn round_trip<'a>(
        &'a self,
        request: &'a Request,
    ) -> Pin<Box<dyn Future<Output = Result<Reply, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .request(request.method.clone(), request.url.clone())
                .headers(request.headers.clone())
                .body(request.body.clone())
                .send()
                .await?;

            let status = response.status();
            // Reading the body to the end hands the connection back to the pool.
            let body = response.bytes().await?;
            trace!(url = %request.url, %status, bytes = body.len(), "round trip finished");

            Ok(Reply { status, body })
        })
    }
}
