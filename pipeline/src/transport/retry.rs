use super::{
    Reply,
    Request,
    Transport,
    TransportError,
};
use reqwest::StatusCode;
use std::{
    future::Future,
    pin::Pin,
    time::Duration,
};

/// Additional attempts after the first one.
pub const MAX_RETRIES: u32 = 3;

/// Decorates a [`Transport`] with bounded, linearly backed-off retries.
///
/// A request is attempted again when the round trip fails at the network level
/// or the server answers 502, 503 or 504. The waits before the retries are
/// 1s, 3s and 5s. Once the retries are used up the last outcome is returned
/// unchanged, whatever it is.
#[derive(Debug, Clone)]
pub struct RetryableTransport<T> {
    inner: T,
    retries: u32,
}

impl<T> RetryableTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            retries: MAX_RETRIES,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

/// Wait before the zero-based `retry`.
pub fn backoff(retry: u32) -> Duration {
    Duration::from_secs(1 + 2 * u64::from(retry))
}

fn is_transient(outcome: &Result<Reply, TransportError>) -> bool {
    match outcome {
        Ok(reply) => matches!(
            reply.status,
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        ),
        Err(err) => err.is_retryable(),
    }
}

impl<T: Transport> Transport for RetryableTransport<T> {
    fn round_trip<'a>(
        &'a self,
        request: &'a Request,
    ) -> Pin<Box<dyn Future<Output = Result<Reply, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let mut outcome = self.inner.round_trip(request).await;

            for retry in 0..self.retries {
                if !is_transient(&outcome) {
                    break;
                }

                let delay = backoff(retry);
                match &outcome {
                    Ok(reply) => {
                        warn!(url = %request.url, status = %reply.status, attempt = retry + 1, ?delay, "transient status, retrying")
                    }
                    Err(err) => warn!(url = %request.url, attempt = retry + 1, ?delay, "request failed, retrying: {err}"),
                }

                tokio::time::sleep(delay).await;
                outcome = self.inner.round_trip(request).await;
            }

            outcome
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{
        collections::VecDeque,
        io,
        sync::Mutex,
    };
    use tokio::time::Instant;

    /// Answers from a script and records when each attempt happened.
    struct Scripted {
        script: Mutex<VecDeque<Result<StatusCode, io::ErrorKind>>>,
        attempts: Mutex<Vec<(Instant, bytes::Bytes)>>,
    }

    impl Scripted {
        fn new(script: impl IntoIterator<Item = Result<StatusCode, io::ErrorKind>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> Vec<(Instant, bytes::Bytes)> {
            self.attempts.lock().unwrap().clone()
        }

        fn gaps(&self) -> Vec<Duration> {
            self.attempts()
                .windows(2)
                .map(|pair| pair[1].0.duration_since(pair[0].0))
                .collect()
        }
    }

    impl Transport for Scripted {
        fn round_trip<'a>(
            &'a self,
            request: &'a Request,
        ) -> Pin<Box<dyn Future<Output = Result<Reply, TransportError>> + Send + 'a>> {
            Box::pin(async move {
                self.attempts.lock().unwrap().push((Instant::now(), request.body.clone()));
                let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(StatusCode::OK));
                match next {
                    Ok(status) => Ok(Reply::new(status)),
                    Err(kind) => Err(io::Error::new(kind, "scripted failure").into()),
                }
            })
        }
    }

    fn request() -> Request {
        Request::post("http://localhost:8080/updates/".parse().unwrap()).body(&b"payload"[..])
    }

    #[test]
    fn backoff_is_linear() {
        let delays: Vec<_> = (0..MAX_RETRIES).map(backoff).collect();
        assert_eq!(
            delays,
            vec![Duration::from_secs(1), Duration::from_secs(3), Duration::from_secs(5)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retries_unavailable_until_success() {
        let transport = RetryableTransport::new(Scripted::new([
            Ok(StatusCode::SERVICE_UNAVAILABLE),
            Ok(StatusCode::SERVICE_UNAVAILABLE),
            Ok(StatusCode::OK),
        ]));

        let reply = transport.round_trip(&request()).await.unwrap();

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(transport.inner().attempts().len(), 3);
        assert_eq!(transport.inner().gaps(), vec![Duration::from_secs(1), Duration::from_secs(3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn replays_the_same_body() {
        let transport = RetryableTransport::new(Scripted::new([
            Ok(StatusCode::BAD_GATEWAY),
            Err(io::ErrorKind::ConnectionReset),
            Ok(StatusCode::OK),
        ]));

        transport.round_trip(&request()).await.unwrap();

        let bodies: Vec<_> = transport.inner().attempts().into_iter().map(|(_, body)| body).collect();
        assert_eq!(bodies.len(), 3);
        assert!(bodies.iter().all(|body| body.as_ref() == b"payload"));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_three_retries_with_the_last_reply() {
        let transport = RetryableTransport::new(Scripted::new([
            Ok(StatusCode::GATEWAY_TIMEOUT),
            Ok(StatusCode::GATEWAY_TIMEOUT),
            Ok(StatusCode::GATEWAY_TIMEOUT),
            Ok(StatusCode::BAD_GATEWAY),
            Ok(StatusCode::OK),
        ]));

        let reply = transport.round_trip(&request()).await.unwrap();

        assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
        assert_eq!(transport.inner().attempts().len(), 4);
        assert_eq!(
            transport.inner().gaps(),
            vec![Duration::from_secs(1), Duration::from_secs(3), Duration::from_secs(5)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_with_the_last_error() {
        let transport = RetryableTransport::new(Scripted::new([
            Err(io::ErrorKind::ConnectionRefused),
            Err(io::ErrorKind::ConnectionRefused),
            Err(io::ErrorKind::ConnectionRefused),
            Err(io::ErrorKind::TimedOut),
        ]));

        let err = transport.round_trip(&request()).await.unwrap_err();

        assert!(matches!(err, TransportError::Io(ref source) if source.kind() == io::ErrorKind::TimedOut));
        assert_eq!(transport.inner().attempts().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_statuses_are_not_retried() {
        for status in [StatusCode::BAD_REQUEST, StatusCode::INTERNAL_SERVER_ERROR, StatusCode::OK] {
            let transport = RetryableTransport::new(Scripted::new([Ok(status)]));
            let reply = transport.round_trip(&request()).await.unwrap();
            assert_eq!(reply.status, status);
            assert_eq!(transport.inner().attempts().len(), 1);
        }
    }
}
