/// Errors a relay can report synchronously from a request.
///
/// Most relay failures are NOT errors here: a refused host start or a
/// lost connection arrives later as
/// [`RelayEvent::Disconnected`](crate::RelayEvent::Disconnected). These
/// variants cover requests the relay rejects on the spot.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A start request was made while this endpoint still holds a
    /// connection. Shut down first.
    #[error("endpoint already connected as {0}")]
    AlreadyConnected(tether_protocol::PeerId),

    /// A send was attempted without an active room connection.
    #[error("not connected to a room")]
    NotConnected,

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The relay service itself is gone.
    #[error("relay shut down")]
    Shutdown,
}
