//! Media resource addressing configuration

use crate::{get_env_or_default, ConfigResult};

/// Where playable song files are served from
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Base URL of the media host
    pub base_url: String,

    /// Path prefix under which songs are served
    pub song_path: String,

    /// File extension of served songs, without the leading dot
    pub extension: String,
}

impl MediaConfig {
    /// Load media configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            base_url: get_env_or_default("SHOWLINK_MEDIA_URL", "http://localhost:5000"),
            song_path: get_env_or_default("SHOWLINK_SONG_PATH", "/songs"),
            extension: get_env_or_default("SHOWLINK_SONG_EXTENSION", "mp3"),
        })
    }

    /// Resolve the URL of a song's audio resource.
    ///
    /// Songs are addressed by composing the base URL, the song path, the
    /// song identifier, and the configured extension.
    pub fn resource_url(&self, song_id: &str) -> String {
        format!(
            "{}/{}/{}.{}",
            self.base_url.trim_end_matches('/'),
            self.song_path.trim_matches('/'),
            song_id,
            self.extension.trim_start_matches('.'),
        )
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            song_path: "/songs".to_string(),
            extension: "mp3".to_string(),
        }
    }
}
