//! Entity registry: the authoritative map of live connections and streams.
//!
//! Only transport-reported events mutate the registry, so it always reflects
//! server-confirmed state. Creates for an already-present identifier and
//! removals of an absent identifier are no-ops, which tolerates redundant event
//! delivery after a reconnect.

use crate::entities::{Connection, Stream};
use common::types::{ConnectionId, StreamId};
use std::collections::HashMap;
use tracing::debug;

/// Live connections and streams for one session.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    connections: HashMap<ConnectionId, Connection>,
    streams: HashMap<StreamId, Stream>,
}

impl EntityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a stream. Returns `true` if it was not already present.
    pub fn upsert_stream(&mut self, stream: Stream) -> bool {
        if self.streams.contains_key(&stream.stream_id) {
            debug!(
                target: "session.registry",
                stream_id = %stream.stream_id,
                "Duplicate stream create ignored"
            );
            return false;
        }
        self.streams.insert(stream.stream_id.clone(), stream);
        true
    }

    /// Remove a stream, returning it if it was present.
    pub fn remove_stream(&mut self, stream_id: &StreamId) -> Option<Stream> {
        let removed = self.streams.remove(stream_id);
        if removed.is_none() {
            debug!(
                target: "session.registry",
                stream_id = %stream_id,
                "Destroy for unknown stream ignored"
            );
        }
        removed
    }

    /// Update a stream's audio-muted flag. Returns the updated stream if the
    /// flag changed.
    pub fn set_stream_audio_muted(&mut self, stream_id: &StreamId, muted: bool) -> Option<&Stream> {
        let stream = self.streams.get_mut(stream_id)?;
        if stream.audio_muted == muted {
            return None;
        }
        stream.audio_muted = muted;
        Some(stream)
    }

    /// Insert a connection. Returns `true` if it was not already present.
    pub fn upsert_connection(&mut self, connection: Connection) -> bool {
        if self.connections.contains_key(&connection.connection_id) {
            debug!(
                target: "session.registry",
                connection_id = %connection.connection_id,
                "Duplicate connection create ignored"
            );
            return false;
        }
        self.connections
            .insert(connection.connection_id.clone(), connection);
        true
    }

    /// Remove a connection, returning it if it was present.
    pub fn remove_connection(&mut self, connection_id: &ConnectionId) -> Option<Connection> {
        self.connections.remove(connection_id)
    }

    /// Look up a stream.
    #[must_use]
    pub fn stream(&self, stream_id: &StreamId) -> Option<&Stream> {
        self.streams.get(stream_id)
    }

    /// Whether a stream is registered.
    #[must_use]
    pub fn contains_stream(&self, stream_id: &StreamId) -> bool {
        self.streams.contains_key(stream_id)
    }

    /// Look up a connection.
    #[must_use]
    pub fn connection(&self, connection_id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(connection_id)
    }

    /// All registered streams (unordered).
    pub fn streams(&self) -> impl Iterator<Item = &Stream> {
        self.streams.values()
    }

    /// All registered connections (unordered).
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Registered stream IDs (unordered).
    pub fn stream_ids(&self) -> impl Iterator<Item = &StreamId> {
        self.streams.keys()
    }

    /// Number of registered streams.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Drop everything (session teardown).
    pub fn clear(&mut self) {
        self.connections.clear();
        self.streams.clear();
    }
}
