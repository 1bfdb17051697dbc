//! Pre-configured test data fixtures for session testing.
//!
//! Provides builders and test data for:
//! - Remote streams with various media configurations
//! - Remote connections with optional application data
//! - Credentials and configuration

use common::types::{ConnectionId, StreamId};
use session_client::entities::{Connection, Stream, VideoType};
use session_client::Config;
use uuid::Uuid;

/// A well-formed session credential.
pub const VALID_CREDENTIAL: &str = "T1==cGFydG5lcl9pZD00NTgyODA2Mg==";

/// Application key used by test configs.
pub const TEST_API_KEY: &str = "45828062";

/// Configuration with default limits for a random session ID.
#[must_use]
pub fn test_config() -> Config {
    Config::new(TEST_API_KEY, format!("session-{}", Uuid::new_v4()))
}

/// Test stream fixture.
#[derive(Debug, Clone)]
pub struct TestStream {
    /// Stream ID.
    pub stream_id: StreamId,
    /// Owning connection ID.
    pub connection_id: ConnectionId,
    /// Display name.
    pub name: Option<String>,
    /// Carries audio.
    pub has_audio: bool,
    /// Carries video.
    pub has_video: bool,
    /// Video source kind.
    pub video_type: VideoType,
    /// Audio muted at creation.
    pub audio_muted: bool,
}

impl TestStream {
    /// Create a camera stream with the given ID owned by a remote connection.
    #[must_use]
    pub fn new(stream_id: impl Into<StreamId>) -> Self {
        Self {
            stream_id: stream_id.into(),
            connection_id: ConnectionId::new("remote-connection"),
            name: None,
            has_audio: true,
            has_video: true,
            video_type: VideoType::Camera,
            audio_muted: false,
        }
    }

    /// Create a stream with a random ID.
    #[must_use]
    pub fn random() -> Self {
        Self::new(format!("stream-{}", Uuid::new_v4()))
    }

    /// Set the owning connection.
    #[must_use]
    pub fn owned_by(mut self, connection_id: impl Into<ConnectionId>) -> Self {
        self.connection_id = connection_id.into();
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Audio-only stream.
    #[must_use]
    pub fn audio_only(mut self) -> Self {
        self.has_video = false;
        self
    }

    /// Screen-share stream without audio.
    #[must_use]
    pub fn screen_share(mut self) -> Self {
        self.video_type = VideoType::Screen;
        self.has_audio = false;
        self
    }

    /// Start with audio muted.
    #[must_use]
    pub fn muted(mut self) -> Self {
        self.audio_muted = true;
        self
    }

    /// Build the stream entity.
    #[must_use]
    pub fn build(&self) -> Stream {
        let mut stream = Stream::new(self.stream_id.clone(), self.connection_id.clone());
        stream.name.clone_from(&self.name);
        stream.has_audio = self.has_audio;
        stream.has_video = self.has_video;
        stream.video_type = self.video_type;
        stream.audio_muted = self.audio_muted;
        stream
    }
}

/// Test connection fixture.
#[derive(Debug, Clone)]
pub struct TestConnection {
    /// Connection ID.
    pub connection_id: ConnectionId,
    /// Application data.
    pub data: Option<String>,
}

impl TestConnection {
    /// Create a connection with the given ID.
    #[must_use]
    pub fn new(connection_id: impl Into<ConnectionId>) -> Self {
        Self {
            connection_id: connection_id.into(),
            data: None,
        }
    }

    /// Create a connection with a random ID.
    #[must_use]
    pub fn random() -> Self {
        Self::new(format!("connection-{}", Uuid::new_v4()))
    }

    /// Attach application data.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Build the connection entity.
    #[must_use]
    pub fn build(&self) -> Connection {
        let connection = Connection::new(self.connection_id.clone());
        match &self.data {
            Some(data) => connection.with_data(data.clone()),
            None => connection,
        }
    }
}
