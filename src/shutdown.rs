use tokio_util::sync::CancellationToken;

/// Cancels `cancel` on the first SIGINT, SIGTERM or SIGQUIT.
#[cfg(unix)]
pub async fn on_signal(cancel: CancellationToken) {
    use tokio::signal::unix::{
        signal,
        SignalKind,
    };

    let streams = [
        ("SIGINT", SignalKind::interrupt()),
        ("SIGTERM", SignalKind::terminate()),
        ("SIGQUIT", SignalKind::quit()),
    ]
    .into_iter()
    .filter_map(|(name, kind)| match signal(kind) {
        Ok(stream) => Some((name, stream)),
        Err(err) => {
            warn!("cannot listen for {name}: {err}");
            None
        }
    })
    .collect::<Vec<_>>();

    if streams.is_empty() {
        // Without any handler the agent can only be killed.
        return;
    }

    let received = futures::future::select_all(streams.into_iter().map(|(name, mut stream)| {
        Box::pin(async move {
            stream.recv().await;
            name
        })
    }))
    .await
    .0;

    info!(signal = received, "shutting down");
    cancel.cancel();
}

#[cfg(not(unix))]
pub async fn on_signal(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!(signal = "ctrl-c", "shutting down");
            cancel.cancel();
        }
        Err(err) => warn!("cannot listen for ctrl-c: {err}"),
    }
}
