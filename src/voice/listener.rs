//! Continuous listening loop. Pulls transcribed phrases from a `PhraseSource`
//! on a background task and forwards them, normalized, over a channel.

use std::future::Future;
use std::io::{self, BufRead, BufReader};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const PHRASE_CHANNEL_SIZE: usize = 16;
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum TranscriptionError {
    /// The recognizer heard audio it could not turn into words
    #[error("speech was not understood")]
    Unintelligible,

    #[error("transcription service unavailable: {0}")]
    Unavailable(String),

    #[error("audio input error: {0}")]
    Input(#[from] std::io::Error),
}

/// Supplier of transcribed phrases. `None` means the source is exhausted.
pub trait PhraseSource: Send + 'static {
    fn next_phrase(
        &mut self,
    ) -> impl Future<Output = Option<Result<String, TranscriptionError>>> + Send;
}

impl PhraseSource for mpsc::Receiver<String> {
    async fn next_phrase(&mut self) -> Option<Result<String, TranscriptionError>> {
        self.recv().await.map(Ok)
    }
}

/// One phrase per line from standard input.
///
/// Lines are read on a dedicated OS thread. A blocked read there does not hold
/// up the runtime on shutdown, so stopping the listener never waits for input.
pub struct StdinPhrases {
    lines: mpsc::Receiver<io::Result<String>>,
}

impl StdinPhrases {
    pub fn new() -> Self {
        Self::from_reader(BufReader::new(io::stdin()))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel(PHRASE_CHANNEL_SIZE);
        let spawned = thread::Builder::new()
            .name("stdin-phrases".to_string())
            .spawn(move || {
                for line in reader.lines() {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
            });
        if let Err(e) = spawned {
            warn!("Failed to start stdin reader: {}", e);
        }

        Self { lines: rx }
    }
}

impl Default for StdinPhrases {
    fn default() -> Self {
        Self::new()
    }
}

impl PhraseSource for StdinPhrases {
    async fn next_phrase(&mut self) -> Option<Result<String, TranscriptionError>> {
        self.lines.recv().await.map(|line| line.map_err(TranscriptionError::from))
    }
}

/// Runs a phrase source in the background until stopped or exhausted
pub struct VoiceListener {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    grace: Duration,
}

impl VoiceListener {
    pub fn new(grace: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            handle: None,
            grace,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start listening. Returns the phrase channel, or `None` if already listening.
    pub fn start<S: PhraseSource>(&mut self, source: S) -> Option<mpsc::Receiver<String>> {
        if self.is_listening() {
            return None;
        }

        let (tx, rx) = mpsc::channel(PHRASE_CHANNEL_SIZE);
        self.cancel = CancellationToken::new();
        let cancel = self.cancel.clone();
        self.handle = Some(tokio::spawn(listen_loop(source, tx, cancel)));
        info!("Voice recognition started");
        Some(rx)
    }

    /// Stop the loop, waiting at most the grace period before aborting it
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        let Some(mut handle) = self.handle.take() else {
            return;
        };

        if tokio::time::timeout(self.grace, &mut handle).await.is_err() {
            warn!("Voice listener did not stop within {:?}; aborting", self.grace);
            handle.abort();
            let _ = handle.await;
        }
        info!("Voice recognition stopped");
    }
}

impl Default for VoiceListener {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Drop for VoiceListener {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn listen_loop<S: PhraseSource>(
    mut source: S,
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = source.next_phrase() => next,
        };

        match next {
            None => {
                debug!("Phrase source exhausted");
                break;
            }
            Some(Ok(text)) => {
                let phrase = text.trim().to_lowercase();
                if phrase.is_empty() {
                    continue;
                }
                if tx.send(phrase).await.is_err() {
                    break;
                }
            }
            Some(Err(TranscriptionError::Unintelligible)) => {}
            Some(Err(e)) => {
                warn!("Error in voice recognition: {}", e);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                }
            }
        }
    }
}
