//! Bounded FIFO of pending tracks for one guild.

use std::collections::VecDeque;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use super::music_manager::{MusicError, MusicResult};
use crate::commands::music::audio_sources::Track;

/// Pending tracks of one guild, in request order.
///
/// Producers are command handlers, the single consumer is the guild's playback episode.
/// `dequeue` parks the consumer until something arrives.
pub struct PlaybackQueue {
    tracks: Mutex<VecDeque<Track>>,
    available: Notify,
    capacity: usize,
}

impl PlaybackQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            tracks: Mutex::new(VecDeque::new()),
            available: Notify::new(),
            capacity,
        }
    }

    /// Appends a track and returns its 1-based position in the queue.
    pub async fn enqueue(&self, track: Track) -> MusicResult<usize> {
        let position = {
            let mut tracks = self.tracks.lock().await;
            if tracks.len() >= self.capacity {
                return Err(MusicError::QueueFull(self.capacity));
            }
            tracks.push_back(track);
            tracks.len()
        };

        self.available.notify_one();
        Ok(position)
    }

    /// Removes the oldest track, waiting for one if the queue is empty.
    pub async fn dequeue(&self) -> Track {
        loop {
            // Register interest before checking so a concurrent enqueue is not missed
            let notified = self.available.notified();

            if let Some(track) = self.try_dequeue().await {
                return track;
            }

            notified.await;
        }
    }

    /// Removes the oldest track if there is one.
    pub async fn try_dequeue(&self) -> Option<Track> {
        self.tracks.lock().await.pop_front()
    }

    /// Discards every pending track and returns how many there were.
    pub async fn drain(&self) -> usize {
        let mut tracks = self.tracks.lock().await;
        let count = tracks.len();
        tracks.clear();
        debug!("Drained {} track(s) from queue", count);
        count
    }

    pub async fn len(&self) -> usize {
        self.tracks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tracks.lock().await.is_empty()
    }

    /// Copy of the pending tracks, oldest first.
    pub async fn snapshot(&self) -> Vec<Track> {
        self.tracks.lock().await.iter().cloned().collect()
    }
}
