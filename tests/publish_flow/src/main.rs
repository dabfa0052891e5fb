fn main() {
    println!("Run `cargo test -p publish-flow` to execute the end-to-end publish flow tests.");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::SinkExt;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;
    use tokio_tungstenite::WebSocketStream;
    use tokio_tungstenite::tungstenite::Message;

    use skypress_pipeline::{AttemptError, OverallStatus, PipelineSnapshot, StageStatus};
    use skypress_protocol::StageId;
    use skypress_session::{PublishSession, SessionConfig};

    fn init_logging() {
        use tracing_subscriber::EnvFilter;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Binds a loopback listener and returns it with its `ws://` URL.
    async fn bind_server() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/publish", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (stream, _) = listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    }

    fn frame(stage: StageId, status: &str) -> Message {
        let json = serde_json::json!({
            "stage": stage.wire_name(),
            "status": status,
        });
        Message::Text(json.to_string().into())
    }

    fn tagged_frame(stage: StageId, status: &str, local_id: &str) -> Message {
        let json = serde_json::json!({
            "stage": stage.wire_name(),
            "status": status,
            "localId": local_id,
        });
        Message::Text(json.to_string().into())
    }

    /// Active + succeeded frames for every stage, with the dashboard URL on
    /// the terminal frame.
    fn success_script(dashboard_url: &str) -> Vec<Message> {
        let mut script = Vec::new();
        for stage in StageId::ALL {
            script.push(frame(stage, "active"));
            if stage.is_last() {
                let json = serde_json::json!({
                    "stage": stage.wire_name(),
                    "status": "succeeded",
                    "dashboardUrl": dashboard_url,
                });
                script.push(Message::Text(json.to_string().into()));
            } else {
                script.push(frame(stage, "succeeded"));
            }
        }
        script
    }

    async fn send_all(ws: &mut WebSocketStream<TcpStream>, script: Vec<Message>) {
        for msg in script {
            // The client may already have hung up after a terminal event.
            if ws.send(msg).await.is_err() {
                break;
            }
        }
    }

    async fn wait_for<F>(
        rx: &mut tokio::sync::watch::Receiver<PipelineSnapshot>,
        mut predicate: F,
    ) -> PipelineSnapshot
    where
        F: FnMut(&PipelineSnapshot) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if predicate(&rx.borrow()) {
                    return rx.borrow().clone();
                }
                rx.changed().await.expect("session dropped");
            }
        })
        .await
        .expect("snapshot never reached the expected state")
    }

    fn session_for(url: &str) -> PublishSession {
        PublishSession::new(SessionConfig::new(url, "acct-1", "content-1"))
    }

    #[tokio::test]
    async fn full_success_run() {
        init_logging();
        let (listener, url) = bind_server().await;

        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            send_all(&mut ws, success_script("https://connect.example.com/content/7")).await;
        });

        let session = session_for(&url);
        let mut rx = session.subscribe();
        session.start_publish();

        let snapshot = wait_for(&mut rx, PipelineSnapshot::is_terminal).await;
        assert_eq!(snapshot.overall, OverallStatus::Succeeded);
        assert!(snapshot.stages().all(|(_, s)| s == StageStatus::Succeeded));
        assert_eq!(
            snapshot.dashboard_url.as_deref(),
            Some("https://connect.example.com/content/7")
        );

        server.await.unwrap();
    }

    #[tokio::test]
    async fn stage_failure_skips_the_rest() {
        init_logging();
        let (listener, url) = bind_server().await;

        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            let script = vec![
                frame(StageId::CapabilityCheck, "active"),
                frame(StageId::CapabilityCheck, "succeeded"),
                frame(StageId::CreateDeployment, "active"),
                frame(StageId::CreateDeployment, "succeeded"),
                frame(StageId::SetEnvVars, "active"),
                frame(StageId::SetEnvVars, "succeeded"),
                frame(StageId::CreateBundle, "active"),
                frame(StageId::CreateBundle, "failed"),
            ];
            send_all(&mut ws, script).await;
        });

        let session = session_for(&url);
        let mut rx = session.subscribe();
        session.start_publish();

        let snapshot = wait_for(&mut rx, PipelineSnapshot::is_terminal).await;
        assert_eq!(snapshot.overall, OverallStatus::Failed);
        assert_eq!(snapshot.stage(StageId::CreateBundle), StageStatus::Failed);
        assert_eq!(snapshot.stage(StageId::UploadBundle), StageStatus::Skipped);
        assert_eq!(snapshot.stage(StageId::WrapUp), StageStatus::Skipped);
        assert!(matches!(
            snapshot.error,
            Some(AttemptError::Stage {
                stage: StageId::CreateBundle,
                ..
            })
        ));

        server.await.unwrap();
    }

    #[tokio::test]
    async fn connection_drop_fails_the_attempt() {
        init_logging();
        let (listener, url) = bind_server().await;

        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            let script = vec![
                frame(StageId::CapabilityCheck, "active"),
                frame(StageId::CapabilityCheck, "succeeded"),
            ];
            send_all(&mut ws, script).await;
            // Drop the connection mid-pipeline.
        });

        let session = session_for(&url);
        let mut rx = session.subscribe();
        session.start_publish();

        let snapshot = wait_for(&mut rx, PipelineSnapshot::is_terminal).await;
        assert_eq!(snapshot.overall, OverallStatus::Failed);
        assert!(matches!(
            snapshot.error,
            Some(AttemptError::Connection { .. })
        ));
        // The stages that finished before the drop keep their statuses.
        assert_eq!(
            snapshot.stage(StageId::CapabilityCheck),
            StageStatus::Succeeded
        );

        server.await.unwrap();
    }

    #[tokio::test]
    async fn cancel_mid_stream_leaves_active_stage_in_place() {
        init_logging();
        let (listener, url) = bind_server().await;
        let (hold_tx, hold_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            let script = vec![
                frame(StageId::CapabilityCheck, "active"),
                frame(StageId::CapabilityCheck, "succeeded"),
                frame(StageId::CreateDeployment, "active"),
                frame(StageId::CreateDeployment, "succeeded"),
                frame(StageId::SetEnvVars, "active"),
                frame(StageId::SetEnvVars, "succeeded"),
                frame(StageId::CreateBundle, "active"),
            ];
            send_all(&mut ws, script).await;
            // Hold the connection open until the test is done with it.
            let _ = hold_rx.await;
        });

        let session = session_for(&url);
        let mut rx = session.subscribe();
        session.start_publish();

        wait_for(&mut rx, |snap| {
            snap.stage(StageId::CreateBundle) == StageStatus::Active
        })
        .await;

        session.cancel_publish();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.overall, OverallStatus::Cancelled);
        assert_eq!(snapshot.stage(StageId::CreateBundle), StageStatus::Active);
        assert!(snapshot.error.is_none());

        let _ = hold_tx.send(());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn new_attempt_retires_the_old_connection() {
        init_logging();
        let (listener, url) = bind_server().await;

        // First connection drips early frames, then tries to poison the
        // snapshot with a late failure. Second connection runs the full
        // success script.
        let server = tokio::spawn(async move {
            let mut first = accept_ws(&listener).await;
            let _ = first
                .send(frame(StageId::CapabilityCheck, "active"))
                .await;

            let mut second = accept_ws(&listener).await;
            send_all(
                &mut second,
                success_script("https://connect.example.com/content/9"),
            )
            .await;

            // Late frames from the retired connection. The client has
            // already torn this socket down, so errors are expected.
            let _ = first.send(frame(StageId::CapabilityCheck, "failed")).await;
        });

        let session = session_for(&url);
        let mut rx = session.subscribe();

        session.start_publish();
        wait_for(&mut rx, |snap| {
            snap.stage(StageId::CapabilityCheck) == StageStatus::Active
        })
        .await;

        session.start_publish();
        let snapshot = wait_for(&mut rx, PipelineSnapshot::is_terminal).await;
        assert_eq!(snapshot.overall, OverallStatus::Succeeded);

        // Give any late traffic from the first connection time to arrive,
        // then confirm the second attempt's snapshot is untouched.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let settled = session.snapshot();
        assert_eq!(settled.overall, OverallStatus::Succeeded);
        assert!(settled.stages().all(|(_, s)| s == StageStatus::Succeeded));

        server.await.unwrap();
    }

    #[tokio::test]
    async fn frames_for_another_attempt_are_ignored() {
        init_logging();
        let (listener, url) = bind_server().await;
        let (id_tx, id_rx) = oneshot::channel::<String>();

        let server = tokio::spawn(async move {
            let mut ws = accept_ws(&listener).await;
            let local_id = id_rx.await.unwrap();

            // A failure tagged for some other attempt must be dropped; the
            // frames tagged for this attempt then run to success.
            let mut script = vec![tagged_frame(
                StageId::CapabilityCheck,
                "failed",
                "someone-elses-attempt",
            )];
            for stage in StageId::ALL {
                script.push(tagged_frame(stage, "active", &local_id));
                script.push(tagged_frame(stage, "succeeded", &local_id));
            }
            send_all(&mut ws, script).await;
        });

        let session = session_for(&url);
        let mut rx = session.subscribe();
        let attempt = session.start_publish();
        id_tx.send(attempt.local_id.clone()).unwrap();

        let snapshot = wait_for(&mut rx, PipelineSnapshot::is_terminal).await;
        assert_eq!(snapshot.overall, OverallStatus::Succeeded);
        assert!(snapshot.error.is_none());

        server.await.unwrap();
    }
}
