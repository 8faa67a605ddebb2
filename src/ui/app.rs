//! Dashboard state and event handling.
//!
//! The app is purely reactive: it subscribes to the sensor watch channels,
//! owns the conversation state, and relays input events. The chat exchange
//! runs as a spawned task so the event loop never blocks on the network.

use crate::chat::{ChatBackend, ConversationController};
use crate::dictation::{DictationController, RecognitionEvent};
use crate::error::Result;
use crate::sensor::hub::{SensorHandles, SensorStatus};
use crate::sensor::messages::EmotionSnapshot;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Capacity of the per-session dictation event channel.
const DICTATION_EVENT_CAPACITY: usize = 32;

/// Top-level UI state.
pub struct App {
    pub controller: ConversationController,
    backend: ChatBackend,
    snapshots: watch::Receiver<EmotionSnapshot>,
    sensor_status: watch::Receiver<SensorStatus>,
    pub dictation: DictationController,
    dictation_events: Option<mpsc::Receiver<RecognitionEvent>>,
    /// Compose input; dictation rewrites it with interim transcripts.
    pub input: String,
    /// Transient user-facing notice (capability errors and the like).
    pub notice: Option<String>,
    reply_task: Option<tokio::task::JoinHandle<Result<String>>>,
    pub spinner_frame: usize,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        backend: ChatBackend,
        sensors: &SensorHandles,
        dictation: DictationController,
    ) -> Self {
        Self {
            controller: ConversationController::new(),
            backend,
            snapshots: sensors.snapshots.clone(),
            sensor_status: sensors.status.clone(),
            dictation,
            dictation_events: None,
            input: String::new(),
            notice: None,
            reply_task: None,
            spinner_frame: 0,
            should_quit: false,
        }
    }

    /// Latest merged emotion snapshot.
    pub fn snapshot(&self) -> EmotionSnapshot {
        *self.snapshots.borrow()
    }

    /// Current sensing subsystem status.
    pub fn sensor_status(&self) -> SensorStatus {
        self.sensor_status.borrow().clone()
    }

    /// Handle one key press.
    pub async fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => self.should_quit = true,
                KeyCode::Char('d') => self.toggle_dictation().await,
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Enter => self.submit(),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
    }

    /// Submit the compose input if the controller accepts it.
    ///
    /// While a reply is outstanding the submit affordance is disabled, so
    /// a rejected submission is simply ignored here.
    fn submit(&mut self) {
        if !self.controller.can_send(&self.input) {
            return;
        }

        let text = self.input.clone();
        if self.controller.begin_send(&text).is_err() {
            return;
        }
        self.input.clear();
        self.notice = None;

        let backend = self.backend.clone();
        let snapshot = self.snapshot();
        self.reply_task = Some(tokio::spawn(async move {
            backend.send(&text, &snapshot).await
        }));
    }

    /// Start or stop the dictation session.
    async fn toggle_dictation(&mut self) {
        let (tx, rx) = mpsc::channel(DICTATION_EVENT_CAPACITY);
        match self.dictation.toggle(tx).await {
            Ok(true) => {
                self.dictation_events = Some(rx);
                self.notice = None;
            }
            Ok(false) => {
                self.dictation_events = None;
            }
            Err(e) => {
                self.dictation_events = None;
                self.notice = Some(e.to_string());
            }
        }
    }

    /// Periodic housekeeping: finish the reply task, drain dictation
    /// events, advance the spinner.
    pub async fn on_tick(&mut self) {
        self.poll_reply().await;
        self.drain_dictation_events();
        if self.controller.awaiting_reply() {
            self.spinner_frame = self.spinner_frame.wrapping_add(1);
        }
    }

    /// Fold a finished chat exchange into the transcript.
    async fn poll_reply(&mut self) {
        let finished = self
            .reply_task
            .as_ref()
            .is_some_and(|task| task.is_finished());
        if !finished {
            return;
        }
        if let Some(task) = self.reply_task.take() {
            match task.await {
                Ok(outcome) => self.controller.complete(outcome),
                Err(e) => {
                    debug!("reply task join failed: {e}");
                    self.controller
                        .complete(Err(crate::error::EmpaError::Chat(e.to_string())));
                }
            }
        }
    }

    /// Apply pending dictation events to the compose input.
    fn drain_dictation_events(&mut self) {
        let Some(ref mut rx) = self.dictation_events else {
            return;
        };

        let mut session_failed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                RecognitionEvent::Transcript { text, .. } => self.input = text,
                RecognitionEvent::Error(message) => {
                    self.notice = Some(message);
                    session_failed = true;
                }
            }
        }
        if session_failed {
            self.dictation_events = None;
        }
    }

    /// Wind down background work before exit.
    pub async fn shutdown(&mut self) {
        self.dictation.stop().await;
    }
}
