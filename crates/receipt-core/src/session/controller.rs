//! Tokio host for the scan state machine.

use std::time::Duration;

use receipt_inference::VisionBackend;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{SessionEvent, SessionMachine, SessionOptions, SessionState, Ticket};
use crate::client::ExtractionClient;
use crate::encoder::{encode, ImageFile};
use crate::error::SessionError;
use crate::history::HistoryStore;

struct Inner<H> {
    machine: SessionMachine,
    history: H,
    reselect: Option<JoinHandle<()>>,
}

impl<H> Inner<H> {
    fn cancel_reselect(&mut self) {
        if let Some(handle) = self.reselect.take() {
            handle.abort();
        }
    }
}

impl<H> Drop for Inner<H> {
    fn drop(&mut self) {
        self.cancel_reselect();
    }
}

/// Controller for scans of one user session.
pub struct ScanSession<B: VisionBackend, H: HistoryStore> {
    client: ExtractionClient<B>,
    inner: Mutex<Inner<H>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    reselect_delay: Duration,
}

impl<B: VisionBackend, H: HistoryStore> ScanSession<B, H> {
    /// Create an idle session and the receiver for its events.
    pub fn new(
        client: ExtractionClient<B>,
        history: H,
        options: SessionOptions,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = Self {
            client,
            inner: Mutex::new(Inner {
                machine: SessionMachine::new(options.locale),
                history,
                reselect: None,
            }),
            events,
            reselect_delay: options.reselect_delay,
        };
        (session, receiver)
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.machine.state().clone()
    }

    /// Run `f` against the history store.
    pub async fn with_history<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        let inner = self.inner.lock().await;
        f(&inner.history)
    }

    /// Scan one image.
    ///
    /// Returns the state the scan ended in. Fails with [`SessionError::Busy`]
    /// if a scan is already in flight and with [`SessionError::Superseded`] if
    /// the session was reset before the response arrived.
    pub async fn scan(&self, image: ImageFile) -> Result<SessionState, SessionError> {
        let preview = encode(&image).data_uri();

        let ticket = {
            let mut inner = self.inner.lock().await;
            let ticket = inner.machine.begin(preview)?;
            inner.cancel_reselect();
            ticket
        };

        info!("Scanning {}", image.name().unwrap_or("image"));
        let outcome = self.client.extract(&image).await;

        let mut inner = self.inner.lock().await;
        let Inner {
            machine, history, ..
        } = &mut *inner;
        let completion = machine.finish(&ticket, outcome, history)?;

        if let Some(e) = &completion.history_error {
            self.emit(SessionEvent::HistoryNotSaved {
                message: e.to_string(),
            });
        }
        if let Some(record) = completion.saved {
            self.emit(SessionEvent::ScanCompleted(record));
        }
        if let Some(ticket) = completion.reselect {
            inner.reselect = Some(self.schedule_reselect(ticket));
        }

        Ok(completion.state)
    }

    /// Return to `Idle`, cancelling any pending reselect signal.
    ///
    /// An in-flight request is not aborted; its response is discarded.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.cancel_reselect();
        inner.machine.reset();
    }

    fn schedule_reselect(&self, ticket: Ticket) -> JoinHandle<()> {
        let events = self.events.clone();
        let delay = self.reselect_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if ticket.is_current() {
                info!("Requesting credential reselection");
                let _ = events.send(SessionEvent::CredentialReselectRequested);
            }
        })
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("Session event dropped, no receiver");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::testing::ScriptedBackend;
    use crate::client::StaticCredential;
    use crate::error::FailureKind;
    use crate::history::testing::BrokenSlot;
    use crate::history::{MemoryHistory, SlotHistory};
    use crate::messages::Locale;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::{timeout, Instant};

    type TestSession = ScanSession<ScriptedBackend, MemoryHistory>;

    fn session(backend: ScriptedBackend) -> (TestSession, mpsc::UnboundedReceiver<SessionEvent>) {
        let client = ExtractionClient::new(backend, StaticCredential(Some("key".into())));
        ScanSession::new(client, MemoryHistory::empty(), SessionOptions::default())
    }

    fn receipt() -> ImageFile {
        ImageFile::new(b"receipt-bytes".to_vec(), "image/png")
    }

    async fn history_texts(session: &TestSession) -> Vec<String> {
        session
            .with_history(|h| h.load().iter().map(|r| r.extracted_text().to_string()).collect())
            .await
    }

    #[tokio::test]
    async fn test_success_appends_trimmed_record() {
        let (session, mut events) = session(ScriptedBackend::text("Total: 5.00\n"));

        let state = session.scan(receipt()).await.unwrap();
        assert_eq!(state.text(), Some("Total: 5.00"));
        assert_eq!(state.preview(), Some("data:image/png;base64,cmVjZWlwdC1ieXRlcw=="));
        assert_eq!(history_texts(&session).await, vec!["Total: 5.00"]);

        match events.try_recv().unwrap() {
            SessionEvent::ScanCompleted(record) => {
                assert_eq!(record.extracted_text(), "Total: 5.00");
                assert_eq!(record.image_preview(), state.preview().unwrap());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsaved_record_stays_in_memory() {
        let client = ExtractionClient::new(
            ScriptedBackend::text("Total: 6.00"),
            StaticCredential(Some("key".into())),
        );
        let history = SlotHistory::open(BrokenSlot).unwrap();
        let (session, mut events) = ScanSession::new(client, history, SessionOptions::default());

        let state = session.scan(receipt()).await.unwrap();
        assert_eq!(state.text(), Some("Total: 6.00"));
        assert_eq!(session.state().await, state);

        let saved = session
            .with_history(|h| h.load().iter().map(|r| r.extracted_text().to_string()).collect::<Vec<_>>())
            .await;
        assert_eq!(saved, vec!["Total: 6.00"]);

        match events.try_recv().unwrap() {
            SessionEvent::HistoryNotSaved { message } => {
                assert!(message.contains("quota exceeded"), "{message}");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(events.try_recv(), Ok(SessionEvent::ScanCompleted(_))));
    }

    #[tokio::test]
    async fn test_empty_result_leaves_history_unchanged() {
        let (session, mut events) = session(ScriptedBackend::text(""));

        let state = session.scan(receipt()).await.unwrap();
        assert_eq!(state.failure(), Some(FailureKind::EmptyResult));
        assert!(history_texts(&session).await.is_empty());
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_unconfigured_fails_without_network() {
        let backend = ScriptedBackend::text("unused");
        let client = ExtractionClient::new(backend.clone(), StaticCredential(None));
        let (session, _events) =
            ScanSession::new(client, MemoryHistory::empty(), SessionOptions::default());

        let state = session.scan(receipt()).await.unwrap();
        assert_eq!(state.failure(), Some(FailureKind::Unconfigured));
        assert_eq!(backend.call_count(), 0);
        assert!(history_texts(&session).await.is_empty());
    }

    #[tokio::test]
    async fn test_failure_message_is_localized() {
        let client = ExtractionClient::new(
            ScriptedBackend::error(500, Some("INTERNAL"), "boom"),
            StaticCredential(Some("key".into())),
        );
        let options = SessionOptions {
            locale: Locale::Ko,
            ..Default::default()
        };
        let (session, _events) = ScanSession::new(client, MemoryHistory::empty(), options);

        match session.scan(receipt()).await.unwrap() {
            SessionState::Failed { kind, message, .. } => {
                assert_eq!(kind, FailureKind::Generic);
                assert_eq!(message, "영수증 처리 중 오류가 발생했습니다. 다시 시도해 주세요.");
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthorized_requests_reselect_once_after_delay() {
        let backend = ScriptedBackend::error(404, Some("NOT_FOUND"), "Requested entity was not found.");
        let (session, mut events) = session(backend);

        let start = Instant::now();
        let state = session.scan(receipt()).await.unwrap();
        assert_eq!(state.failure(), Some(FailureKind::Unauthorized));

        // Nothing before the delay elapses.
        let early = timeout(Duration::from_millis(1900), events.recv()).await;
        assert!(early.is_err());

        let event = events.recv().await.unwrap();
        assert_eq!(event, SessionEvent::CredentialReselectRequested);
        assert!(start.elapsed() >= Duration::from_millis(2000));

        let again = timeout(Duration::from_secs(10), events.recv()).await;
        assert!(again.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_pending_reselect() {
        let backend = ScriptedBackend::error(401, Some("UNAUTHENTICATED"), "bad key");
        let (session, mut events) = session(backend);

        session.scan(receipt()).await.unwrap();
        session.reset().await;
        assert_eq!(session.state().await, SessionState::Idle);

        let fired = timeout(Duration::from_secs(10), events.recv()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_scan_cancels_pending_reselect() {
        let backend = ScriptedBackend::new(vec![
            crate::client::testing::Reply::Error {
                status: 404,
                code: None,
                message: "Requested entity was not found.".into(),
            },
            crate::client::testing::Reply::Text("Total: 1.00".into()),
        ]);
        let (session, mut events) = session(backend);

        session.scan(receipt()).await.unwrap();
        let state = session.scan(receipt()).await.unwrap();
        assert_eq!(state.text(), Some("Total: 1.00"));

        assert!(matches!(events.recv().await, Some(SessionEvent::ScanCompleted(_))));
        let fired = timeout(Duration::from_secs(10), events.recv()).await;
        assert!(fired.is_err());
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let backend = ScriptedBackend::new(vec![
            crate::client::testing::Reply::Text("first".into()),
            crate::client::testing::Reply::Text("second".into()),
        ]);
        let (session, _events) = session(backend);

        session.scan(receipt()).await.unwrap();
        session.scan(receipt()).await.unwrap();
        assert_eq!(history_texts(&session).await, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_reset_discards_late_response() {
        let (backend, gate) = ScriptedBackend::text("Total: 9.99").gated();
        let (session, mut events) = session(backend);
        let session = Arc::new(session);

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.scan(receipt()).await }
        });

        while !session.state().await.is_loading() {
            tokio::task::yield_now().await;
        }
        session.reset().await;
        gate.notify_one();

        let result = task.await.unwrap();
        assert_eq!(result, Err(SessionError::Superseded));
        assert_eq!(session.state().await, SessionState::Idle);
        assert!(history_texts(&session).await.is_empty());
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn test_second_scan_while_loading_is_rejected() {
        let (backend, gate) = ScriptedBackend::text("Total: 3.00").gated();
        let (session, _events) = session(backend.clone());
        let session = Arc::new(session);

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.scan(receipt()).await }
        });

        while !session.state().await.is_loading() {
            tokio::task::yield_now().await;
        }
        assert_eq!(session.scan(receipt()).await, Err(SessionError::Busy));

        gate.notify_one();
        let state = task.await.unwrap().unwrap();
        assert_eq!(state.text(), Some("Total: 3.00"));
        assert_eq!(backend.call_count(), 1);
        assert_eq!(history_texts(&session).await, vec!["Total: 3.00"]);
    }
}
