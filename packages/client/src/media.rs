//! Media resource acquisition and the local playback surface
//!
//! Audio resources are addressed by song identifier, fetched over HTTP, and
//! probed with symphonia to validate the container before playback state is
//! attached to them. Acquisition is scoped: a [`LoadedMedia`] is released
//! when dropped, and the [`MediaSession`] guarantees the previous resource
//! is gone before the next one is acquired.

use std::io::Cursor;
use std::time::Instant;

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use showlink_shared_config::MediaConfig;

/// Failures while acquiring an audio resource
#[derive(Error, Debug)]
pub enum MediaError {
    /// The HTTP fetch failed
    #[error("failed to fetch audio resource: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The media host answered with a non-success status
    #[error("audio resource unavailable: HTTP {0}")]
    Status(u16),

    /// The fetched bytes are not a playable container
    #[error("failed to probe audio container: {0}")]
    Probe(String),

    /// The container holds no decodable track
    #[error("audio container has no default track")]
    NoDefaultTrack,
}

/// A local, continuously advancing media position source.
///
/// The reconciler drives playback exclusively through this trait, which
/// keeps it independent of how positions are actually produced.
pub trait MediaSurface: Send {
    /// Current playback position in seconds
    fn position_seconds(&self) -> f64;

    /// Whether local playback is advancing
    fn is_playing(&self) -> bool;

    /// Move playback to an absolute position
    fn seek(&mut self, seconds: f64);

    /// Start advancing
    fn play(&mut self);

    /// Stop advancing, keeping the position
    fn pause(&mut self);

    /// Stop advancing and rewind to zero
    fn stop(&mut self);
}

/// A fetched and validated audio resource
#[derive(Debug)]
pub struct LoadedMedia {
    /// Song identifier the resource was loaded for
    pub song_id: String,

    /// Track duration, when the container declares one
    pub duration_seconds: Option<f64>,

    /// Size of the fetched resource
    pub size_bytes: usize,
}

impl Drop for LoadedMedia {
    fn drop(&mut self) {
        tracing::debug!(song = %self.song_id, "audio resource released");
    }
}

/// Fetches song resources from the media host
pub struct MediaLoader {
    http: reqwest::Client,
    config: MediaConfig,
}

impl MediaLoader {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// URL of a song's audio resource
    pub fn resource_url(&self, song_id: &str) -> String {
        self.config.resource_url(song_id)
    }

    /// Availability check ahead of the real fetch.
    ///
    /// Diagnostic only: the outcome is logged and never blocks the load
    /// attempt.
    pub async fn preflight(&self, song_id: &str) {
        let url = self.resource_url(song_id);
        match self.http.head(&url).send().await {
            Ok(response) => {
                tracing::debug!(%url, status = response.status().as_u16(), "media preflight");
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "media preflight failed");
            }
        }
    }

    /// Fetch and probe a song's audio resource
    pub async fn load(&self, song_id: &str) -> Result<LoadedMedia, MediaError> {
        self.preflight(song_id).await;

        let url = self.resource_url(song_id);
        tracing::info!(%url, "loading audio resource");

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(MediaError::Status(response.status().as_u16()));
        }

        let bytes = response.bytes().await?;
        let size_bytes = bytes.len();
        let duration_seconds = probe_duration(bytes.to_vec(), &self.config.extension)?;

        tracing::info!(
            song = %song_id,
            size_bytes,
            duration_seconds = duration_seconds.unwrap_or(0.0),
            "audio resource ready"
        );

        Ok(LoadedMedia {
            song_id: song_id.to_string(),
            duration_seconds,
            size_bytes,
        })
    }
}

/// Validate the container and extract the declared duration
fn probe_duration(data: Vec<u8>, extension: &str) -> Result<Option<f64>, MediaError> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());
    let mut hint = Hint::new();
    hint.with_extension(extension);

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| MediaError::Probe(e.to_string()))?;

    let track = probed
        .format
        .default_track()
        .ok_or(MediaError::NoDefaultTrack)?;

    let params = &track.codec_params;
    Ok(match (params.time_base, params.n_frames) {
        (Some(time_base), Some(frames)) => {
            let time = time_base.calc_time(frames);
            Some(time.seconds as f64 + time.frac)
        }
        _ => None,
    })
}

/// Monotonic playback clock for an attached resource
#[derive(Debug)]
struct PlaybackClock {
    base_seconds: f64,
    playing_since: Option<Instant>,
    duration_seconds: Option<f64>,
}

impl PlaybackClock {
    fn new(duration_seconds: Option<f64>) -> Self {
        Self {
            base_seconds: 0.0,
            playing_since: None,
            duration_seconds,
        }
    }

    fn position(&self) -> f64 {
        let elapsed = self
            .playing_since
            .map(|since| since.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let position = self.base_seconds + elapsed;
        match self.duration_seconds {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn seek(&mut self, seconds: f64) {
        self.base_seconds = seconds.max(0.0);
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
    }

    fn play(&mut self) {
        if self.playing_since.is_none() {
            self.playing_since = Some(Instant::now());
        }
    }

    fn pause(&mut self) {
        if let Some(since) = self.playing_since.take() {
            self.base_seconds += since.elapsed().as_secs_f64();
        }
    }

    fn stop(&mut self) {
        self.playing_since = None;
        self.base_seconds = 0.0;
    }

    fn is_playing(&self) -> bool {
        self.playing_since.is_some()
    }
}

/// Owns the audio resource and playback clock for the current song.
///
/// Before a song is loaded every playback operation is a logged no-op; the
/// surface never acquires anything while the session has no song.
pub struct MediaSession {
    attached: Option<(LoadedMedia, PlaybackClock)>,
    loading: bool,
}

impl MediaSession {
    pub fn new() -> Self {
        Self {
            attached: None,
            loading: false,
        }
    }

    /// Attach a freshly loaded resource, resetting playback state
    pub fn attach(&mut self, media: LoadedMedia) {
        tracing::info!(song = %media.song_id, "media attached");
        let clock = PlaybackClock::new(media.duration_seconds);
        self.attached = Some((media, clock));
        self.loading = false;
    }

    /// Release the current resource, if any
    pub fn release(&mut self) {
        self.attached = None;
    }

    /// Flag that a load is in flight (cleared by attach or failure)
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Song the attached resource belongs to
    pub fn current_song(&self) -> Option<&str> {
        self.attached.as_ref().map(|(media, _)| media.song_id.as_str())
    }

    /// Duration of the attached resource
    pub fn duration_seconds(&self) -> Option<f64> {
        self.attached
            .as_ref()
            .and_then(|(media, _)| media.duration_seconds)
    }
}

impl Default for MediaSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaSurface for MediaSession {
    fn position_seconds(&self) -> f64 {
        self.attached
            .as_ref()
            .map(|(_, clock)| clock.position())
            .unwrap_or(0.0)
    }

    fn is_playing(&self) -> bool {
        self.attached
            .as_ref()
            .map(|(_, clock)| clock.is_playing())
            .unwrap_or(false)
    }

    fn seek(&mut self, seconds: f64) {
        match self.attached.as_mut() {
            Some((_, clock)) => clock.seek(seconds),
            None => tracing::debug!("seek ignored, no media attached"),
        }
    }

    fn play(&mut self) {
        match self.attached.as_mut() {
            Some((_, clock)) => clock.play(),
            None => tracing::debug!("play ignored, no media attached"),
        }
    }

    fn pause(&mut self) {
        match self.attached.as_mut() {
            Some((_, clock)) => clock.pause(),
            None => tracing::debug!("pause ignored, no media attached"),
        }
    }

    fn stop(&mut self) {
        match self.attached.as_mut() {
            Some((_, clock)) => clock.stop(),
            None => tracing::debug!("stop ignored, no media attached"),
        }
    }
}
