//! End-to-end tests across every stage of the chain.

#[cfg(test)]
mod tests {
    use crate::codec::{DecoderKind, MultilineConfig};
    use crate::core::{Action, Context, Event, FileIdentity, Payload};
    use crate::observability::{Attributes, ChainLogger, CollectingLogger};
    use crate::pipeline::{ChainBuilder, Channel, WatchSession};
    use crate::stages::{GlobalMeta, LocalMeta, Stage};
    use crate::testing::{
        assert_actions, assert_event_field, assert_has_tag, assert_messages, CollectingQueue,
        RecordingStage, ScriptedWatcher, TracingDecoderFactory,
    };
    use pretty_assertions::assert_eq;
    use parking_lot::Mutex;
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;
    use tracing::Level;

    fn global_meta() -> GlobalMeta {
        GlobalMeta::new("bar")
            .with_type("foo")
            .with_tag("nginx")
            .with_field("baz", "quux")
    }

    fn recording_channel(
        watcher: Arc<ScriptedWatcher>,
        kind: &DecoderKind,
    ) -> (Channel, Arc<RecordingStage>) {
        let recorder = Arc::new(RecordingStage::new("recorder"));
        let channel = ChainBuilder::new()
            .with_watcher(watcher)
            .with_decoder_factory(kind.build_factory().unwrap())
            .with_tail(recorder.clone())
            .with_local_meta(LocalMeta::with_host("foo"))
            .with_global_meta(global_meta())
            .build()
            .unwrap();
        (channel, recorder)
    }

    #[test]
    fn test_five_notifications_five_downstream_calls() {
        let watcher = Arc::new(
            ScriptedWatcher::new()
                .notify("/tmp/f", Action::Created)
                .line("/tmp/f", "L1")
                .line("/tmp/f", "L2")
                .notify("/tmp/f", Action::Eof)
                .notify("/tmp/f", Action::Eof),
        );
        let (channel, recorder) = recording_channel(watcher, &DecoderKind::Line);
        let session = WatchSession::new(channel);

        session.run().unwrap();

        assert_actions(
            &recorder.actions(),
            &[Action::Created, Action::Event, Action::Event, Action::Eof, Action::Eof],
        );

        let calls = recorder.calls();
        for (ctx, payload) in &calls {
            assert_eq!(ctx.path(), "/tmp/f");
            match ctx.action() {
                Action::Event => {
                    let event = payload.as_event().unwrap();
                    assert_event_field(event, "host", "foo");
                    assert_event_field(event, "path", "/tmp/f");
                    assert_event_field(event, "[@metadata][path]", "/tmp/f");
                    assert_event_field(event, "type", "foo");
                    assert_event_field(event, "baz", "quux");
                    assert_has_tag(event, "nginx");
                }
                _ => assert!(payload.is_empty()),
            }
        }
        assert_messages(&recorder.events(), &["L1", "L2"]);
        assert_eq!(session.channel().identity_count(), 1);
    }

    #[test]
    fn test_idle_file_is_flushed_and_evicted() {
        let watcher = Arc::new(
            ScriptedWatcher::new()
                .line("/tmp/f", "Exception: boom")
                .line("/tmp/f", "  at foo()")
                .notify("/tmp/f", Action::TimedOut),
        );
        let kind = DecoderKind::Multiline(MultilineConfig::new(r"^\s"));
        let (channel, recorder) = recording_channel(watcher, &kind);
        let session = WatchSession::new(channel);

        session.run().unwrap();

        assert_actions(&recorder.actions(), &[Action::Event]);
        let event = &recorder.events()[0];
        assert_event_field(event, "message", "Exception: boom\n  at foo()");
        assert_has_tag(event, "multiline");
        assert_has_tag(event, "nginx");
        assert_event_field(event, "host", "foo");
        assert_eq!(session.channel().identity_count(), 0);
    }

    #[test]
    fn test_stop_flushes_partial_records() {
        let watcher = Arc::new(
            ScriptedWatcher::new()
                .line("/var/log/a.log", "a1")
                .line("/var/log/a.log", " a2")
                .line("/var/log/b.log", "b1"),
        );
        let kind = DecoderKind::Multiline(MultilineConfig::new(r"^\s"));
        let (channel, recorder) = recording_channel(watcher.clone(), &kind);
        let session = WatchSession::new(channel);

        session.run().unwrap();
        assert!(recorder.is_empty());
        assert_eq!(session.channel().identity_count(), 2);

        session.stop().unwrap();

        let mut messages: Vec<String> = recorder
            .events()
            .iter()
            .filter_map(|e| e.get_str("message").map(str::to_string))
            .collect();
        messages.sort();
        assert_eq!(messages, vec!["a1\n a2", "b1"]);
        assert_eq!(session.channel().identity_count(), 0);
        assert_eq!(watcher.quit_count(), 1);
    }

    #[test]
    fn test_identities_are_decoded_independently() {
        let watcher = Arc::new(
            ScriptedWatcher::new()
                .push(
                    Context::new("/a", Action::Line).with_identity(FileIdentity::new(1, 0, 1)),
                    Payload::Line("a1".to_string()),
                )
                .push(
                    Context::new("/b", Action::Line).with_identity(FileIdentity::new(2, 0, 1)),
                    Payload::Line("b1".to_string()),
                )
                .push(
                    Context::new("/a", Action::Line).with_identity(FileIdentity::new(1, 0, 1)),
                    Payload::Line(" a2".to_string()),
                )
                .push(
                    Context::new("/a", Action::TimedOut).with_identity(FileIdentity::new(1, 0, 1)),
                    Payload::Empty,
                ),
        );
        let kind = DecoderKind::Multiline(MultilineConfig::new(r"^\s"));
        let (channel, recorder) = recording_channel(watcher, &kind);
        let session = WatchSession::new(channel);

        session.run().unwrap();

        assert_messages(&recorder.events(), &["a1\n a2"]);
        assert_eq!(session.channel().identity_count(), 1);
    }

    #[test]
    fn test_delivery_to_tokio_channel() {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Event>(8);
        let watcher = Arc::new(
            ScriptedWatcher::new()
                .line("/tmp/f", "L1")
                .line("/tmp/f", "L2"),
        );
        let channel = ChainBuilder::new()
            .with_watcher(watcher)
            .with_decoder_factory(DecoderKind::Line.build_factory().unwrap())
            .with_queue(Arc::new(tx))
            .with_local_meta(LocalMeta::with_host("foo"))
            .with_global_meta(global_meta())
            .build()
            .unwrap();
        let session = WatchSession::new(channel);

        let driver = thread::spawn(move || session.run());
        driver.join().unwrap().unwrap();

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.get_str("message"), Some("L1"));
        assert_eq!(second.get_str("message"), Some("L2"));
        assert_eq!(first.get_str("type"), Some("foo"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_backpressure_blocks_until_consumed() {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Event>(1);
        let lines = (0..16).fold(ScriptedWatcher::new(), |w, i| w.line("/tmp/f", &format!("L{i}")));
        let channel = ChainBuilder::new()
            .with_watcher(Arc::new(lines))
            .with_decoder_factory(DecoderKind::Line.build_factory().unwrap())
            .with_queue(Arc::new(tx))
            .build()
            .unwrap();
        let session = WatchSession::new(channel);

        let driver = thread::spawn(move || session.run());

        let mut received = Vec::new();
        while let Some(event) = rx.blocking_recv() {
            received.push(event.get_str("message").unwrap_or_default().to_string());
        }
        driver.join().unwrap().unwrap();

        assert_eq!(received.len(), 16);
        assert_eq!(received[0], "L0");
        assert_eq!(received[15], "L15");
    }

    #[test]
    fn test_injected_logger_sees_every_stage() {
        let logger = Arc::new(CollectingLogger::with_max_level(Level::DEBUG));
        let watcher = Arc::new(ScriptedWatcher::new().line("/tmp/f", "L1"));
        let queue = Arc::new(CollectingQueue::new());
        let channel = ChainBuilder::new()
            .with_watcher(watcher)
            .with_decoder_factory(Arc::new(TracingDecoderFactory::new()))
            .with_queue(queue.clone())
            .with_global_meta(global_meta())
            .with_logger(logger.clone())
            .build()
            .unwrap();

        channel.start().unwrap();
        channel
            .head()
            .accept(
                Context::new("/tmp/f", Action::Line),
                Payload::Line("L1".to_string()),
            )
            .unwrap();

        let messages: Vec<String> = logger
            .trace_for(Level::DEBUG)
            .into_iter()
            .map(|(message, _)| message)
            .collect();
        assert_eq!(
            messages,
            vec![
                "Received line",
                "Created decoder",
                "bar: adding value to field",
                "bar: adding tag",
            ]
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_decoder_error_surfaces_from_run() {
        let watcher = Arc::new(
            ScriptedWatcher::new()
                .line("/tmp/f", "ok")
                .line("/tmp/f", "boom")
                .line("/tmp/f", "never"),
        );
        let factory = Arc::new(TracingDecoderFactory::new().failing_on("boom"));
        let queue = Arc::new(CollectingQueue::new());
        let channel = ChainBuilder::new()
            .with_watcher(watcher)
            .with_decoder_factory(factory.clone())
            .with_queue(queue.clone())
            .build()
            .unwrap();

        let result = WatchSession::new(channel).run();

        assert!(matches!(result, Err(crate::errors::ChainError::Decode(_))));
        assert_eq!(queue.messages(), vec!["ok"]);
        assert_eq!(factory.lines(), vec!["ok", "boom"]);
    }

    #[test]
    fn test_head_is_first_stage() {
        let (channel, _recorder) =
            recording_channel(Arc::new(ScriptedWatcher::new()), &DecoderKind::Line);
        assert_eq!(channel.head().name(), channel.stages()[0].name());
    }

    /// Parks the notifying thread inside the head stage until released.
    #[derive(Debug)]
    struct GateLogger {
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl ChainLogger for GateLogger {
        fn enabled(&self, _level: Level) -> bool {
            true
        }

        fn log(&self, _level: Level, message: &str, _attributes: Attributes) {
            if message == "Received line" {
                let _ = self.entered.lock().send(());
                let _ = self.release.lock().recv();
            }
        }
    }

    #[test]
    fn test_stop_waits_for_line_in_flight() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let logger = Arc::new(GateLogger {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        let recorder = Arc::new(RecordingStage::new("recorder"));
        let kind = DecoderKind::Multiline(MultilineConfig::new(r"^\s"));
        let channel = Arc::new(
            ChainBuilder::new()
                .with_watcher(Arc::new(ScriptedWatcher::new()))
                .with_decoder_factory(kind.build_factory().unwrap())
                .with_tail(recorder.clone())
                .with_logger(logger)
                .build()
                .unwrap(),
        );
        channel.start().unwrap();

        let head = channel.head();
        let notifier = thread::spawn(move || {
            head.accept(
                Context::new("/tmp/f", Action::Line),
                Payload::Line("partial".to_string()),
            )
        });
        entered_rx.recv().unwrap();

        let stopper = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.stop())
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!stopper.is_finished());

        release_tx.send(()).unwrap();
        notifier.join().unwrap().unwrap();
        stopper.join().unwrap().unwrap();

        assert_eq!(channel.identity_count(), 0);
        assert_messages(&recorder.events(), &["partial"]);
    }
}
