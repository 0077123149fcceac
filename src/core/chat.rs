//! Chat engine: the conversation orchestrator
//!
//! The ChatEngine handles one user message at a time:
//! 1. Rejects empty input
//! 2. Classifies the message as on- or off-topic
//! 3. Off-topic: picks a non-repeating redirect, no remote call
//! 4. On-topic: builds a prompt from persona, safety rules, energy level and
//!    recent history, then asks the completion service
//! 5. Formats the reply for display and speech
//! 6. Returns the updated session state to the caller
//!
//! Session state is passed in and handed back; the engine keeps none.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analysis::{detect_energy, is_relevant, EnergyLevel};
use crate::config::client::{ClientConfig, HistorySettings, NotificationSettings, SpeechSettings};
use crate::config::{prompts_builtin, PromptTemplate};
use crate::conversation::{ConversationHistory, Exchange, Message};
use crate::format::{excerpt, FormattedText};
use crate::providers::{CompletionService, ProviderError};
use crate::speech::{
    Listener, Speaker, SpeechError, SpeechRecognizer, SpeechSynthesizer, Unavailable,
};

use super::notification::Notification;
use super::preferences::PreferenceStore;
use super::redirect::RedirectSelector;
use super::session::ChatSession;

/// Shown in place of a reply when the completion service fails
pub const FALLBACK_REPLY: &str = "I'm sorry, I'm having trouble responding right now. Please take a slow breath with me and try again in a moment.";

const REMOTE_ERROR_NOTICE: &str = "Couldn't reach the assistant. Please try again.";
const NO_SPEECH_NOTICE: &str = "I didn't catch that. Please try speaking again.";

/// How a reply was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Off-topic input answered with a canned redirect
    Redirected,
    /// Reply generated by the completion service
    Answered,
    /// Completion failed; fallback apology shown
    Fallback,
}

/// Processing stage of the message currently being handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Classifying,
    Redirecting,
    Composing,
    AwaitingResponse,
    Formatting,
}

fn enter(phase: Phase) {
    tracing::debug!(?phase, "Chat phase");
}

/// An assistant message with its display and speech renditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub message: Message,
    #[serde(flatten)]
    pub formatted: FormattedText,
}

impl AssistantReply {
    pub fn new(raw: impl Into<String>) -> Self {
        let message = Message::assistant(raw);
        let formatted = FormattedText::from_raw(message.text());
        Self { message, formatted }
    }
}

/// Result of handling one message
#[derive(Debug, Clone)]
pub struct Turn {
    pub reply: AssistantReply,
    pub route: Route,
    /// Energy label used in the prompt; `None` for redirects
    pub energy: Option<EnergyLevel>,
    /// Session state after this turn
    pub session: ChatSession,
}

/// What the caller shows after a message, with all errors already handled
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    /// Recognized text, for voice input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<AssistantReply>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub energy: Option<EnergyLevel>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,

    /// Session state to store for the next message
    #[serde(skip)]
    pub session: ChatSession,
}

impl ChatOutcome {
    fn from_turn(turn: Turn) -> Self {
        Self {
            transcript: None,
            reply: Some(turn.reply),
            route: Some(turn.route),
            energy: turn.energy,
            notification: None,
            session: turn.session,
        }
    }

    fn notice_only(notification: Notification, session: &ChatSession) -> Self {
        Self {
            transcript: None,
            reply: None,
            route: None,
            energy: None,
            notification: Some(notification),
            session: session.clone(),
        }
    }
}

/// Errors from the chat engine
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Remote service error: {0}")]
    RemoteService(#[from] ProviderError),

    #[error("Speech error: {0}")]
    Speech(#[from] SpeechError),

    #[error("Preference store error: {0}")]
    Preferences(#[from] sqlx::Error),
}

/// The conversation orchestrator
pub struct ChatEngine {
    completion: Arc<dyn CompletionService>,
    preferences: Arc<PreferenceStore>,
    template: PromptTemplate,
    redirects: RedirectSelector,
    history: HistorySettings,
    notifications: NotificationSettings,
    listener: Listener,
    speaker: Speaker,
}

impl ChatEngine {
    /// Create a new chat engine with the built-in persona and no speech support
    pub fn new(completion: Arc<dyn CompletionService>, preferences: Arc<PreferenceStore>) -> Self {
        let client = ClientConfig::default();
        Self {
            completion,
            preferences,
            template: PromptTemplate::builtin(&client.assistant.name),
            redirects: RedirectSelector::default(),
            history: client.history,
            notifications: client.notifications,
            listener: Listener::new(Arc::new(Unavailable)),
            speaker: Speaker::new(Arc::new(Unavailable), client.speech),
        }
    }

    /// Apply history, notification and redirect settings
    pub fn with_client_config(mut self, client: &ClientConfig) -> Self {
        self.history = client.history.clone();
        self.notifications = client.notifications.clone();
        self.redirects = RedirectSelector::new(client.redirects.messages.clone());
        self
    }

    /// Replace the persona
    pub fn with_prompt_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Attach speech capabilities
    pub fn with_speech(
        mut self,
        recognizer: Arc<dyn SpeechRecognizer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        settings: SpeechSettings,
    ) -> Self {
        self.listener = Listener::new(recognizer);
        self.speaker = Speaker::new(synthesizer, settings);
        self
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    pub fn speech_capture_supported(&self) -> bool {
        self.listener.is_supported()
    }

    pub fn speech_synthesis_supported(&self) -> bool {
        self.speaker.is_supported()
    }

    /// Handle one user message.
    ///
    /// Returns `Ok(None)` for empty input. Errors are returned as-is; use
    /// [`ChatEngine::respond`] for the error-handling boundary.
    pub async fn handle_user_message(
        &self,
        text: &str,
        session: &ChatSession,
    ) -> Result<Option<Turn>, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("Ignoring empty message");
            return Ok(None);
        }

        enter(Phase::Classifying);
        if !is_relevant(text) {
            enter(Phase::Redirecting);
            let (message, redirect) = {
                let mut rng = rand::thread_rng();
                let (message, state) = self.redirects.next(session.redirect, &mut rng);
                (message.to_string(), state)
            };
            tracing::info!(index = ?redirect.last_index(), "Off-topic message redirected");

            let mut next = session.clone();
            next.redirect = redirect;
            enter(Phase::Idle);

            return Ok(Some(Turn {
                reply: AssistantReply::new(message),
                route: Route::Redirected,
                energy: None,
                session: next,
            }));
        }

        enter(Phase::Composing);
        let energy = detect_energy(text);
        let prompt = self.build_prompt(text, energy, &session.history);

        enter(Phase::AwaitingResponse);
        let raw = self.completion.complete(&prompt).await?;

        enter(Phase::Formatting);
        let reply = AssistantReply::new(raw);
        let mut next = session.clone();
        next.history.push(Exchange::new(Message::user(text), reply.message.clone()));
        tracing::info!(%energy, history = next.history.len(), "Reply generated");
        enter(Phase::Idle);

        Ok(Some(Turn {
            reply,
            route: Route::Answered,
            energy: Some(energy),
            session: next,
        }))
    }

    /// Handle one message and absorb any failure.
    ///
    /// A failed completion yields the fallback reply plus one error
    /// notification, and the session comes back unchanged. Returns `None`
    /// only for empty input.
    pub async fn respond(&self, text: &str, session: &ChatSession) -> Option<ChatOutcome> {
        match self.handle_user_message(text, session).await {
            Ok(Some(turn)) => {
                if let Err(e) = self.speak_if_enabled(&turn.reply.formatted.speech).await {
                    tracing::warn!(error = %e, "Could not start speech output");
                }
                Some(ChatOutcome::from_turn(turn))
            }
            Ok(None) => None,
            Err(e) => {
                let status = match &e {
                    ChatError::RemoteService(p) => p.status(),
                    _ => None,
                };
                tracing::error!(error = %e, ?status, "Chat turn failed");

                Some(ChatOutcome {
                    transcript: None,
                    reply: Some(AssistantReply::new(FALLBACK_REPLY)),
                    route: Some(Route::Fallback),
                    energy: None,
                    notification: Some(Notification::error(
                        REMOTE_ERROR_NOTICE,
                        self.notifications.dismiss_after_ms,
                    )),
                    session: session.clone(),
                })
            }
        }
    }

    /// Capture one spoken message and respond to it.
    ///
    /// Returns `None` when the capture was superseded by a newer one.
    pub async fn respond_to_voice(&self, session: &ChatSession) -> Option<ChatOutcome> {
        let dismiss = self.notifications.dismiss_after_ms;

        let transcript = match self.capture().await {
            Ok(t) => t,
            Err(ChatError::Speech(SpeechError::Cancelled)) => return None,
            Err(ChatError::Speech(SpeechError::Unsupported(capability))) => {
                let notice = format!("Voice input is unavailable: {} is not supported here.", capability);
                return Some(ChatOutcome::notice_only(Notification::info(notice, dismiss), session));
            }
            Err(e) => {
                return Some(ChatOutcome::notice_only(
                    Notification::error(e.to_string(), dismiss),
                    session,
                ));
            }
        };

        match self.respond(&transcript, session).await {
            Some(mut outcome) => {
                outcome.transcript = Some(transcript);
                Some(outcome)
            }
            None => Some(ChatOutcome::notice_only(
                Notification::info(NO_SPEECH_NOTICE, dismiss),
                session,
            )),
        }
    }

    /// Stop any capture or speech in progress
    pub fn stop_speech(&self) {
        self.listener.stop();
        self.speaker.stop();
    }

    async fn capture(&self) -> Result<String, ChatError> {
        // Don't let the microphone pick up our own voice.
        self.speaker.stop();
        Ok(self.listener.listen().await?)
    }

    /// Speak `text` when auto-speak is on and synthesis exists. Returns whether speech started.
    async fn speak_if_enabled(&self, text: &str) -> Result<bool, ChatError> {
        if !self.speaker.is_supported() || text.is_empty() {
            return Ok(false);
        }
        if !self.preferences.auto_speak().await? {
            return Ok(false);
        }
        self.speaker.speak(text)?;
        Ok(true)
    }

    /// Build the single-turn prompt sent to the completion service
    fn build_prompt(&self, text: &str, energy: EnergyLevel, history: &ConversationHistory) -> String {
        let name = &self.template.persona.name;
        let mut prompt = format!(
            "{}\n\n{}\n\nThe user's current energy level is {}. {}",
            self.template.instructions(),
            prompts_builtin::SAFETY,
            energy.label(),
            energy.guidance()
        );

        let recent: Vec<String> = history
            .recent(self.history.prompt_exchanges)
            .map(|exchange| {
                format!(
                    "User: {}\n{}: {}",
                    exchange.user.text(),
                    name,
                    excerpt(exchange.assistant.text(), self.history.reply_excerpt_chars)
                )
            })
            .collect();

        if !recent.is_empty() {
            prompt.push_str("\n\nRecent conversation:\n");
            prompt.push_str(&recent.join("\n"));
        }

        prompt.push_str(&format!("\n\nUser: {}\n{}:", text, name));
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::notification::NotificationLevel;
    use crate::core::redirect::RedirectState;
    use crate::speech::testing::{RecordingSynthesizer, ScriptedRecognizer};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    /// Replays canned results and records every prompt it receives
    #[derive(Default)]
    struct MockCompletion {
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl MockCompletion {
        fn with(replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn answering(n: usize) -> Arc<Self> {
            Self::with((1..=n).map(|i| Ok(format!("**Reply {i}**"))).collect())
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionService for MockCompletion {
        async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::InvalidResponse("no reply queued".into())))
        }
    }

    async fn engine(completion: Arc<MockCompletion>) -> ChatEngine {
        let prefs = Arc::new(PreferenceStore::new_in_memory().await.unwrap());
        ChatEngine::new(completion, prefs)
    }

    fn remote_failure() -> ProviderError {
        ProviderError::Remote {
            status: 503,
            message: "overloaded".into(),
        }
    }

    #[tokio::test]
    async fn test_empty_input_is_ignored() {
        let completion = MockCompletion::answering(1);
        let engine = engine(completion.clone()).await;

        let turn = assert_ok!(engine.handle_user_message("   ", &ChatSession::default()).await);
        assert!(turn.is_none());
        assert!(engine.respond("", &ChatSession::default()).await.is_none());
        assert!(completion.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_off_topic_redirects_without_remote_call() {
        let completion = MockCompletion::answering(1);
        let engine = engine(completion.clone()).await;
        let session = ChatSession::default();

        let turn = engine
            .handle_user_message("what's the weather", &session)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(turn.route, Route::Redirected);
        assert!(turn.energy.is_none());
        assert!(turn.reply.formatted.display.starts_with("<p>"));
        assert!(!turn.reply.formatted.speech.contains('*'));
        assert!(turn.session.redirect.last_index().is_some());
        assert!(turn.session.history.is_empty());
        assert!(completion.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_consecutive_redirects_differ() {
        let engine = engine(MockCompletion::answering(0)).await;
        let mut session = ChatSession::default();
        let mut previous = RedirectState::default();

        for _ in 0..50 {
            let turn = engine
                .handle_user_message("who won the game", &session)
                .await
                .unwrap()
                .unwrap();
            assert_ne!(turn.session.redirect, previous);
            previous = turn.session.redirect;
            session = turn.session;
        }
    }

    #[tokio::test]
    async fn test_relevant_message_is_answered() {
        let completion = MockCompletion::with(vec![Ok("**Breathe** with me:\n\n- in\n- out".into())]);
        let engine = engine(completion.clone()).await;

        let turn = engine
            .handle_user_message("I feel anxious", &ChatSession::default())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(turn.route, Route::Answered);
        assert_eq!(turn.energy, Some(EnergyLevel::Neutral));
        assert_eq!(
            turn.reply.formatted.display,
            "<p><strong>Breathe</strong> with me:</p><ul><li class=\"bullet\">• in</li><li class=\"bullet\">• out</li></ul>"
        );
        assert_eq!(turn.reply.formatted.speech, "Breathe with me, in, out");
        assert_eq!(turn.session.history.len(), 1);

        let prompts = completion.prompts();
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];
        assert!(prompt.contains("You are MindEase"));
        assert!(prompt.contains("Safety rules:"));
        assert!(prompt.contains("energy level is neutral"));
        assert!(prompt.ends_with("User: I feel anxious\nMindEase:"));
        assert!(!prompt.contains("Recent conversation:"));
    }

    #[tokio::test]
    async fn test_prompt_uses_last_two_exchanges_truncated() {
        let long_reply = format!("**Start** {}", "x".repeat(300));
        let completion = MockCompletion::with(vec![
            Ok("first reply".into()),
            Ok("second reply".into()),
            Ok(long_reply),
            Ok("final".into()),
        ]);
        let engine = engine(completion.clone()).await;

        let mut session = ChatSession::default();
        for text in ["I feel sad", "still sad", "stress at work", "thanks for the support"] {
            session = engine
                .handle_user_message(text, &session)
                .await
                .unwrap()
                .unwrap()
                .session;
        }

        let prompts = completion.prompts();
        let last = prompts.last().unwrap();
        assert!(!last.contains("User: I feel sad\n"));
        assert!(last.contains("User: still sad\nMindEase: second reply"));
        assert!(last.contains("User: stress at work\nMindEase: Start xxx"));
        assert!(!last.contains("**Start**"));

        let excerpt_line = last
            .lines()
            .find(|l| l.starts_with("MindEase: Start"))
            .unwrap();
        let excerpt = excerpt_line.trim_start_matches("MindEase: ");
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.chars().count(), 103);
    }

    #[tokio::test]
    async fn test_history_keeps_last_five() {
        let completion = MockCompletion::answering(6);
        let engine = engine(completion).await;

        let mut session = ChatSession::default();
        for i in 1..=6 {
            session = engine
                .handle_user_message(&format!("feeling stressed {i}"), &session)
                .await
                .unwrap()
                .unwrap()
                .session;
            assert!(session.history.len() <= 5);
        }

        assert_eq!(session.history.len(), 5);
        let first = session.history.iter().next().unwrap();
        assert_eq!(first.user.text(), "feeling stressed 2");
        assert_eq!(first.assistant.text(), "**Reply 2**");
    }

    #[tokio::test]
    async fn test_remote_failure_surfaces_error() {
        let engine = engine(MockCompletion::with(vec![Err(remote_failure())])).await;
        let err = assert_err!(
            engine
                .handle_user_message("I feel anxious", &ChatSession::default())
                .await
        );
        assert!(matches!(err, ChatError::RemoteService(ref p) if p.status() == Some(503)));
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_once() {
        let completion = MockCompletion::with(vec![Ok("ok".into()), Err(remote_failure())]);
        let engine = engine(completion).await;

        let session = engine
            .handle_user_message("I feel anxious", &ChatSession::default())
            .await
            .unwrap()
            .unwrap()
            .session;

        let outcome = engine.respond("I still feel anxious", &session).await.unwrap();

        assert_eq!(outcome.route, Some(Route::Fallback));
        let reply = outcome.reply.unwrap();
        assert_eq!(reply.message.text(), FALLBACK_REPLY);
        let notification = outcome.notification.unwrap();
        assert_eq!(notification.level, NotificationLevel::Error);
        assert_eq!(notification.dismiss_after_ms, 4000);
        assert_eq!(outcome.session, session);
        assert_eq!(outcome.session.history.len(), 1);
    }

    #[tokio::test]
    async fn test_auto_speak_speaks_reply() {
        let synth = Arc::new(RecordingSynthesizer::default());
        let engine = engine(MockCompletion::with(vec![Ok("**Rest:** drink water".into())]))
            .await
            .with_speech(Arc::new(Unavailable), synth.clone(), SpeechSettings::default());
        engine.preferences().set_auto_speak(true).await.unwrap();

        let outcome = engine.respond("I feel tired", &ChatSession::default()).await.unwrap();
        assert_eq!(outcome.route, Some(Route::Answered));
        assert!(outcome.notification.is_none());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let started = synth.started.lock().unwrap().clone();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].text, "Rest, drink water");
    }

    #[tokio::test]
    async fn test_no_speech_when_auto_speak_off() {
        let synth = Arc::new(RecordingSynthesizer::default());
        let engine = engine(MockCompletion::answering(1))
            .await
            .with_speech(Arc::new(Unavailable), synth.clone(), SpeechSettings::default());

        engine.respond("I feel tired", &ChatSession::default()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(synth.started.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_voice_message_is_answered() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![Some(Ok(
            "I'm worried about tomorrow".into(),
        ))]));
        let engine = engine(MockCompletion::answering(1))
            .await
            .with_speech(recognizer, Arc::new(Unavailable), SpeechSettings::default());

        let outcome = engine.respond_to_voice(&ChatSession::default()).await.unwrap();
        assert_eq!(outcome.transcript.as_deref(), Some("I'm worried about tomorrow"));
        assert_eq!(outcome.route, Some(Route::Answered));
        assert_eq!(outcome.session.history.len(), 1);
    }

    #[tokio::test]
    async fn test_voice_capture_error_notifies_only() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![Some(Err(
            SpeechError::Capture("network".into()),
        ))]));
        let completion = MockCompletion::answering(1);
        let engine = engine(completion.clone())
            .await
            .with_speech(recognizer, Arc::new(Unavailable), SpeechSettings::default());

        let session = ChatSession::default();
        let outcome = engine.respond_to_voice(&session).await.unwrap();
        assert!(outcome.reply.is_none());
        let notification = outcome.notification.unwrap();
        assert!(notification.message.contains("network"));
        assert_eq!(outcome.session, session);
        assert!(completion.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_voice_unsupported() {
        let engine = engine(MockCompletion::answering(1)).await;
        assert!(!engine.speech_capture_supported());

        let outcome = engine.respond_to_voice(&ChatSession::default()).await.unwrap();
        let notification = outcome.notification.unwrap();
        assert_eq!(notification.level, NotificationLevel::Info);
        assert!(notification.message.contains("speech capture"));
    }

    #[tokio::test]
    async fn test_custom_redirect_pool() {
        let mut client = ClientConfig::default();
        client.redirects.messages = vec!["*Back to you*".into(), "**How are you?**".into()];
        let engine = engine(MockCompletion::answering(0))
            .await
            .with_client_config(&client);

        let turn = engine
            .handle_user_message("stock prices", &ChatSession::default())
            .await
            .unwrap()
            .unwrap();
        let display = turn.reply.formatted.display;
        assert!(display == "<p><em>Back to you</em></p>" || display == "<p><strong>How are you?</strong></p>");
    }
}
