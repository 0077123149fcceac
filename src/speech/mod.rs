//! Speech input and output capabilities
//!
//! Recognition and synthesis are provided by the host environment, so they
//! are modelled as injected traits. The [`Listener`] and [`Speaker`]
//! controllers enforce at most one active capture and at most one active
//! utterance: starting a new one cancels whatever was running.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::client::SpeechSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    SpeechCapture,
    SpeechSynthesis,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::SpeechCapture => write!(f, "speech capture"),
            Capability::SpeechSynthesis => write!(f, "speech synthesis"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpeechError {
    #[error("Speech capture failed: {0}")]
    Capture(String),

    #[error("{0} is not supported in this environment")]
    Unsupported(Capability),

    #[error("Superseded by a newer request")]
    Cancelled,
}

/// Text plus voice parameters for one spoken reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub voice: Option<String>,
}

impl Utterance {
    pub fn new(text: impl Into<String>, settings: &SpeechSettings) -> Self {
        Self {
            text: text.into(),
            rate: settings.rate,
            pitch: settings.pitch,
            volume: settings.volume,
            voice: settings.voice.clone(),
        }
    }
}

/// Turns one spoken phrase into text
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Capture a single utterance and return its transcript
    async fn recognize(&self) -> Result<String, SpeechError>;

    /// Abort an in-progress capture
    fn stop(&self);
}

/// Speaks text aloud
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Resolves when the utterance finishes playing
    async fn speak(&self, utterance: Utterance) -> Result<(), SpeechError>;

    /// Silence any utterance currently playing
    fn cancel(&self);
}

/// Stand-in for environments with no speech support at all
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

#[async_trait]
impl SpeechRecognizer for Unavailable {
    fn is_supported(&self) -> bool {
        false
    }

    async fn recognize(&self) -> Result<String, SpeechError> {
        Err(SpeechError::Unsupported(Capability::SpeechCapture))
    }

    fn stop(&self) {}
}

#[async_trait]
impl SpeechSynthesizer for Unavailable {
    fn is_supported(&self) -> bool {
        false
    }

    async fn speak(&self, _utterance: Utterance) -> Result<(), SpeechError> {
        Err(SpeechError::Unsupported(Capability::SpeechSynthesis))
    }

    fn cancel(&self) {}
}

/// Owns the single active capture session
pub struct Listener {
    recognizer: Arc<dyn SpeechRecognizer>,
    active: Mutex<Option<(u64, oneshot::Sender<()>)>>,
    next_id: AtomicU64,
}

impl Listener {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            active: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.recognizer.is_supported()
    }

    /// Capture one utterance. A capture already running resolves with
    /// [`SpeechError::Cancelled`].
    pub async fn listen(&self) -> Result<String, SpeechError> {
        if !self.recognizer.is_supported() {
            return Err(SpeechError::Unsupported(Capability::SpeechCapture));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let previous = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace((id, tx));
        if let Some((_, previous)) = previous {
            tracing::debug!("Cancelling previous capture session");
            let _ = previous.send(());
            self.recognizer.stop();
        }

        let result = tokio::select! {
            result = self.recognizer.recognize() => result,
            _ = rx => Err(SpeechError::Cancelled),
        };

        // Only clear the slot if a newer capture hasn't taken it.
        {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            if matches!(*active, Some((current, _)) if current == id) {
                active.take();
            }
        }

        match &result {
            Ok(text) => tracing::debug!(chars = text.len(), "Captured utterance"),
            Err(SpeechError::Cancelled) => {}
            Err(e) => tracing::warn!(error = %e, "Speech capture ended with an error"),
        }
        result
    }

    /// Stop the active capture, if any
    pub fn stop(&self) {
        if let Some((_, active)) = self.active.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = active.send(());
            self.recognizer.stop();
        }
    }
}

/// Owns the single active utterance
pub struct Speaker {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    settings: SpeechSettings,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl Speaker {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, settings: SpeechSettings) -> Self {
        Self {
            synthesizer,
            settings,
            current: Mutex::new(None),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.synthesizer.is_supported()
    }

    /// Start speaking `text` in the background, cancelling anything already playing.
    pub fn speak(&self, text: &str) -> Result<(), SpeechError> {
        if !self.synthesizer.is_supported() {
            return Err(SpeechError::Unsupported(Capability::SpeechSynthesis));
        }

        self.stop();

        let utterance = Utterance::new(text, &self.settings);
        let synthesizer = Arc::clone(&self.synthesizer);
        let handle = tokio::spawn(async move {
            if let Err(e) = synthesizer.speak(utterance).await {
                tracing::warn!(error = %e, "Speech synthesis failed");
            }
        });

        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    /// Stop the current utterance, if any
    pub fn stop(&self) {
        if let Some(handle) = self.current.lock().unwrap_or_else(|e| e.into_inner()).take() {
            if !handle.is_finished() {
                tracing::debug!("Cancelling previous utterance");
            }
            handle.abort();
        }
        self.synthesizer.cancel();
    }
}

impl Drop for Speaker {
    fn drop(&mut self) {
        self.stop();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listen_returns_transcript() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![Some(Ok("I feel calm".into()))]));
        let listener = Listener::new(recognizer);
        assert_eq!(listener.listen().await, Ok("I feel calm".to_string()));
    }

    #[tokio::test]
    async fn test_new_capture_cancels_previous() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![
            None,
            Some(Ok("second".into())),
        ]));
        let listener = Arc::new(Listener::new(recognizer.clone()));

        let first = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.listen().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = listener.listen().await;
        assert_eq!(second, Ok("second".to_string()));
        assert_eq!(first.await.unwrap(), Err(SpeechError::Cancelled));
        assert_eq!(recognizer.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_capture_error_is_reported() {
        let recognizer = Arc::new(ScriptedRecognizer::new(vec![Some(Err(
            SpeechError::Capture("no-speech".into()),
        ))]));
        let listener = Listener::new(recognizer);
        assert_eq!(
            listener.listen().await,
            Err(SpeechError::Capture("no-speech".into()))
        );
    }

    #[tokio::test]
    async fn test_unavailable_capabilities() {
        let listener = Listener::new(Arc::new(Unavailable));
        assert!(!listener.is_supported());
        assert_eq!(
            listener.listen().await,
            Err(SpeechError::Unsupported(Capability::SpeechCapture))
        );

        let speaker = Speaker::new(Arc::new(Unavailable), SpeechSettings::default());
        assert_eq!(
            speaker.speak("hello"),
            Err(SpeechError::Unsupported(Capability::SpeechSynthesis))
        );
    }

    #[tokio::test]
    async fn test_new_utterance_cancels_previous() {
        let synth = Arc::new(RecordingSynthesizer {
            duration: Duration::from_millis(200),
            ..Default::default()
        });
        let speaker = Speaker::new(synth.clone(), SpeechSettings::default());

        speaker.speak("first").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        speaker.speak("second").unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        let started: Vec<_> = synth
            .started
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.text.clone())
            .collect();
        assert_eq!(started, vec!["first", "second"]);
        // the first utterance was aborted before it finished
        assert_eq!(synth.finished.load(Ordering::SeqCst), 1);
        assert!(synth.cancels.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_utterance_uses_settings() {
        let settings = SpeechSettings {
            rate: 0.8,
            pitch: 1.1,
            volume: 0.5,
            voice: Some("Daniel".into()),
        };
        let utterance = Utterance::new("hi", &settings);
        assert_eq!(utterance.rate, 0.8);
        assert_eq!(utterance.voice.as_deref(), Some("Daniel"));
    }
}
