//! Session entities: connections, streams, and locally owned media objects.

use chrono::{DateTime, Utc};
use common::types::{ArchiveId, ConnectionId, PublisherId, StreamId, SubscriberId};
use serde::{Deserialize, Serialize};

/// One participant's presence in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Opaque connection identifier.
    pub connection_id: ConnectionId,
    /// When the connection was created.
    pub creation_time: DateTime<Utc>,
    /// Application-supplied per-connection data.
    pub data: Option<String>,
}

impl Connection {
    /// Create a connection record timestamped now.
    #[must_use]
    pub fn new(connection_id: impl Into<ConnectionId>) -> Self {
        Self {
            connection_id: connection_id.into(),
            creation_time: Utc::now(),
            data: None,
        }
    }

    /// Attach application data.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }
}

/// Video source kind of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoType {
    /// Camera capture.
    #[default]
    Camera,
    /// Screen capture.
    Screen,
    /// Application-provided frames.
    Custom,
}

/// One published audio/video stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    /// Stream identifier assigned by the signaling backend.
    pub stream_id: StreamId,
    /// Connection that owns the stream.
    pub connection_id: ConnectionId,
    /// Display name set by the publisher.
    pub name: Option<String>,
    /// When the stream was created.
    pub creation_time: DateTime<Utc>,
    /// Whether the stream carries audio.
    pub has_audio: bool,
    /// Whether the stream carries video.
    pub has_video: bool,
    /// Video source kind.
    pub video_type: VideoType,
    /// Whether the stream's audio is currently muted.
    pub audio_muted: bool,
}

impl Stream {
    /// Create an audio+video camera stream timestamped now.
    #[must_use]
    pub fn new(stream_id: impl Into<StreamId>, connection_id: impl Into<ConnectionId>) -> Self {
        Self {
            stream_id: stream_id.into(),
            connection_id: connection_id.into(),
            name: None,
            creation_time: Utc::now(),
            has_audio: true,
            has_video: true,
            video_type: VideoType::Camera,
            audio_muted: false,
        }
    }
}

/// A publisher owned by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publisher {
    /// Local identifier.
    pub publisher_id: PublisherId,
    /// Display name for the published stream.
    pub name: Option<String>,
    /// Publish audio.
    pub publish_audio: bool,
    /// Publish video.
    pub publish_video: bool,
    /// Video source kind.
    pub video_type: VideoType,
}

impl Publisher {
    /// Create an audio+video camera publisher with a generated ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            publisher_id: PublisherId::generate(),
            name: None,
            publish_audio: true,
            publish_video: true,
            video_type: VideoType::Camera,
        }
    }

    /// Set the stream display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the video source kind.
    #[must_use]
    pub fn with_video_type(mut self, video_type: VideoType) -> Self {
        self.video_type = video_type;
        self
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscriber owned by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Local identifier.
    pub subscriber_id: SubscriberId,
    /// Stream being subscribed to.
    pub stream_id: StreamId,
    /// Receive audio.
    pub subscribe_to_audio: bool,
    /// Receive video.
    pub subscribe_to_video: bool,
}

impl Subscriber {
    /// Create an audio+video subscriber for a stream with a generated ID.
    #[must_use]
    pub fn new(stream_id: impl Into<StreamId>) -> Self {
        Self {
            subscriber_id: SubscriberId::generate(),
            stream_id: stream_id.into(),
            subscribe_to_audio: true,
            subscribe_to_video: true,
        }
    }
}

/// A session recording in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    /// Archive identifier.
    pub archive_id: ArchiveId,
    /// Optional archive name.
    pub name: Option<String>,
}
