use crate::{
    snapshot::Snapshot,
    transport::{
        Request,
        Transport,
        TransportError,
    },
};
use bytes::Bytes;
use flate2::{
    write::GzEncoder,
    Compression,
};
use flume::Receiver;
use hmac::{
    Hmac,
    Mac,
};
use reqwest::{
    header::{
        HeaderName,
        HeaderValue,
        CONTENT_ENCODING,
        CONTENT_TYPE,
    },
    StatusCode,
};
use sha2::Sha256;
use std::{
    fmt,
    io::Write as _,
    sync::Arc,
};
use tokio_util::sync::CancellationToken;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

pub const UPDATES_PATH: &str = "/updates/";
pub const SIGNATURE_HEADER: &str = "HashSHA256";

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("failed to encode the snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to compress the snapshot: {0}")]
    Compress(#[from] std::io::Error),
    #[error("failed to sign the snapshot: {0}")]
    Sign(#[from] hmac::digest::InvalidLength),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("ingestion endpoint answered {0}")]
    Status(StatusCode),
}

/// HMAC-SHA256 key used to sign the compressed body.
#[derive(Clone)]
pub struct SigningKey(Arc<[u8]>);

impl SigningKey {
    /// An empty key means the body is sent unsigned.
    pub fn new(key: impl AsRef<[u8]>) -> Option<Self> {
        let key = key.as_ref();
        (!key.is_empty()).then(|| Self(Arc::from(key)))
    }

    /// Lowercase hex of HMAC-SHA256 over `data`.
    pub fn sign(&self, data: &[u8]) -> Result<String, ReportError> {
        let mut mac = HmacSha256::new_from_slice(&self.0)?;
        mac.update(data);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

/// JSON array of metric records, gzip compressed.
pub fn encode(snapshot: Snapshot) -> Result<Bytes, ReportError> {
    let json = serde_json::to_vec(&snapshot.into_metrics())?;
    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?.into())
}

/// Delivers snapshots to the ingestion endpoint, one at a time.
#[derive(Clone)]
pub struct Reporter {
    transport: Arc<dyn Transport>,
    endpoint: Url,
    key: Option<SigningKey>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("endpoint", &self.endpoint.as_str())
            .field("signed", &self.key.is_some())
            .finish_non_exhaustive()
    }
}

impl Reporter {
    pub fn new(transport: Arc<dyn Transport>, endpoint: Url, key: Option<SigningKey>) -> Self {
        Self {
            transport,
            endpoint,
            key,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Builds the fully buffered `POST` for one snapshot.
    pub fn request(&self, snapshot: Snapshot) -> Result<Request, ReportError> {
        let body = encode(snapshot)?;

        let mut request = Request::post(self.endpoint.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(CONTENT_ENCODING, HeaderValue::from_static("gzip"));

        if let Some(key) = &self.key {
            let signature = key.sign(&body)?;
            // Hex digits are always a valid header value.
            if let Ok(value) = HeaderValue::from_str(&signature) {
                request = request.header(HeaderName::from_static("hashsha256"), value);
            }
        }

        Ok(request.body(body))
    }

    pub async fn report(&self, snapshot: Snapshot) -> Result<(), ReportError> {
        let request = self.request(snapshot)?;
        let reply = self.transport.round_trip(&request).await?;
        match reply.status {
            StatusCode::OK => Ok(()),
            status => Err(ReportError::Status(status)),
        }
    }

    /// Receives and delivers until the channel closes or the token is
    /// cancelled. A delivery in progress always runs to completion.
    pub async fn run(self, worker: usize, snapshots: Receiver<Snapshot>, cancel: CancellationToken) {
        debug!(worker, endpoint = %self.endpoint, "reporter started");
        loop {
            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,

                received = snapshots.recv_async() => match received {
                    Ok(snapshot) => snapshot,
                    Err(_) => break,
                },
            };

            let metrics = snapshot.len();
            match self.report(snapshot).await {
                Ok(()) => debug!(worker, metrics, "snapshot delivered"),
                Err(err) => error!(worker, metrics, "failed to deliver snapshot: {err}"),
            }
        }
        debug!(worker, "reporter stopped");
    }
}
