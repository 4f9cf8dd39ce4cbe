use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender, TrySendError};
use nexus_ecs::{Family, Nexus};
use tracing::{debug, info, warn};

use crate::config::AudioConfig;
use crate::error::AudioError;
use crate::request::{AudioRequests, PlayRequest};

/// Device side of playback. Runs on the worker thread only.
pub trait SoundSink: Send + 'static {
    fn play(&mut self, request: &PlayRequest) -> Result<(), AudioError>;
}

/// Sink that only logs what it would play. Used by the headless demo.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl SoundSink for LoggingSink {
    fn play(&mut self, request: &PlayRequest) -> Result<(), AudioError> {
        debug!(
            sound = %request.sound,
            source = %request.source,
            volume = request.volume,
            "play"
        );
        Ok(())
    }
}

/// Drains every entity's [`AudioRequests`] once per frame and forwards the sounds
/// to a background worker.
///
/// Requests are moved by value into a bounded channel. When the worker falls behind
/// and the channel is full, further requests are dropped rather than stalling the
/// frame.
pub struct AudioDispatcher {
    family: Family<&'static mut AudioRequests>,
    sender: Option<Sender<PlayRequest>>,
    worker: Option<JoinHandle<usize>>,
    config: AudioConfig,
    dropped: usize,
}

impl AudioDispatcher {
    /// Register the request family and start the worker that owns `sink`.
    pub fn new<S: SoundSink>(
        nexus: &mut Nexus,
        mut sink: S,
        config: AudioConfig,
    ) -> Result<Self, AudioError> {
        let (sender, receiver) = bounded::<PlayRequest>(config.queue_capacity.max(1));
        let worker = thread::Builder::new()
            .name("nexus-audio".into())
            .spawn(move || {
                let mut played = 0;
                for request in receiver.iter() {
                    match sink.play(&request) {
                        Ok(()) => played += 1,
                        Err(e) => warn!("Failed to play '{}': {}", request.sound, e),
                    }
                }
                played
            })
            .map_err(AudioError::WorkerSpawn)?;

        info!("Audio worker started");

        Ok(Self {
            family: nexus.family::<&'static mut AudioRequests>(),
            sender: Some(sender),
            worker: Some(worker),
            config,
            dropped: 0,
        })
    }

    /// Move every queued request to the worker. Returns how many were sent.
    pub fn update(&mut self, nexus: &mut Nexus) -> Result<usize, AudioError> {
        let sender = self.sender.as_ref().ok_or(AudioError::WorkerGone)?;
        let volume = self.config.effective_sfx_volume();
        let mut sent = 0;
        let mut dropped = 0;
        let mut disconnected = false;

        nexus.for_each(&self.family, |source, requests, _| {
            for sound in requests.drain() {
                match sender.try_send(PlayRequest {
                    sound,
                    source,
                    volume,
                }) {
                    Ok(()) => sent += 1,
                    Err(TrySendError::Full(_)) => dropped += 1,
                    Err(TrySendError::Disconnected(_)) => disconnected = true,
                }
            }
        })?;

        if dropped > 0 {
            warn!("Audio queue full, dropped {} sounds", dropped);
            self.dropped += dropped;
        }
        if disconnected {
            return Err(AudioError::WorkerGone);
        }
        Ok(sent)
    }

    /// Requests dropped so far because the queue was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Close the queue, wait for the worker to play what is left and return how
    /// many sounds it played in total.
    pub fn shutdown(mut self) -> Result<usize, AudioError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<usize, AudioError> {
        self.sender.take();
        let worker = self.worker.take().ok_or(AudioError::WorkerGone)?;
        worker.join().map_err(|_| AudioError::WorkerGone)
    }
}

impl Drop for AudioDispatcher {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.stop();
        }
    }
}
