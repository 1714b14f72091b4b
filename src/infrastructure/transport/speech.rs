use crate::domain::call::port::{SpeechChannel, SpeechError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Speech channel that records what it was asked to say
#[derive(Debug, Default)]
pub struct ScriptedSpeech {
    spoken: RwLock<Vec<String>>,
    replies: AtomicUsize,
    closed: AtomicBool,
    fail_say: bool,
    fail_reply: bool,
    fail_close: bool,
}

impl ScriptedSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    /// `say` returns an error
    pub fn failing_say(mut self) -> Self {
        self.fail_say = true;
        self
    }

    /// `generate_reply` returns an error
    pub fn failing_reply(mut self) -> Self {
        self.fail_reply = true;
        self
    }

    /// `close` returns an error
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub async fn spoken(&self) -> Vec<String> {
        self.spoken.read().await.clone()
    }

    pub fn reply_count(&self) -> usize {
        self.replies.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechChannel for ScriptedSpeech {
    async fn say(&self, text: &str) -> Result<(), SpeechError> {
        if self.fail_say {
            return Err(SpeechError::Synthesis("voice unavailable".to_string()));
        }
        self.spoken.write().await.push(text.to_string());
        Ok(())
    }

    async fn generate_reply(&self) -> Result<(), SpeechError> {
        self.replies.fetch_add(1, Ordering::SeqCst);
        if self.fail_reply {
            return Err(SpeechError::Unavailable("language model unreachable".to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), SpeechError> {
        if self.fail_close {
            return Err(SpeechError::Unavailable("audio buffers still locked".to_string()));
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_spoken_lines() {
        let speech = ScriptedSpeech::new();
        speech.say("Hello!").await.unwrap();
        speech.generate_reply().await.unwrap();
        speech.close().await.unwrap();

        assert_eq!(speech.spoken().await, vec!["Hello!".to_string()]);
        assert_eq!(speech.reply_count(), 1);
        assert!(speech.is_closed());
    }

    #[test]
    fn test_configured_failures() {
        let speech = ScriptedSpeech::new().failing_say().failing_close();

        tokio_test::block_on(async {
            tokio_test::assert_err!(speech.say("Goodbye!").await);
            tokio_test::assert_ok!(speech.generate_reply().await);
            tokio_test::assert_err!(speech.close().await);
            assert!(speech.spoken().await.is_empty());
        });
        assert!(!speech.is_closed());
    }
}
