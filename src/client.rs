use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

use crate::handshake::Handshake;
use crate::tracker::Peer;
use crate::{Error, Result, HANDSHAKE_BYTES_LEN, HASH_LEN};

/// Progress of a handshake with a single peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Connecting,
    HandshakeSent,
    HandshakeConfirmed,
    Failed,
}

/// Connection to a peer that performs the opening handshake
pub struct Client<T> {
    socket: T,
    state: HandshakeState,
}

impl<T> Client<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(socket: T) -> Client<T> {
        Client {
            socket,
            state: HandshakeState::Connecting,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Send our handshake and wait for the peer's, returning the peer's id
    pub async fn handshake(
        &mut self,
        info_hash: [u8; HASH_LEN],
        peer_id: [u8; HASH_LEN],
    ) -> Result<[u8; HASH_LEN]> {
        match self.exchange(info_hash, peer_id).await {
            Ok(their_peer_id) => {
                self.state = HandshakeState::HandshakeConfirmed;
                debug!("Handshake confirmed");
                Ok(their_peer_id)
            }
            Err(e) => {
                self.state = HandshakeState::Failed;
                Err(e)
            }
        }
    }

    async fn exchange(
        &mut self,
        info_hash: [u8; HASH_LEN],
        peer_id: [u8; HASH_LEN],
    ) -> Result<[u8; HASH_LEN]> {
        let initial_handshake = Handshake::new(info_hash, peer_id);
        self.socket
            .write_all(&initial_handshake.serialise())
            .await
            .map_err(|e| Error::HandshakeIncomplete(format!("unable to send handshake: {}", e)))?;
        self.socket
            .flush()
            .await
            .map_err(|e| Error::HandshakeIncomplete(format!("unable to send handshake: {}", e)))?;
        self.state = HandshakeState::HandshakeSent;
        debug!("Handshake sent");

        let mut buf = BytesMut::with_capacity(HANDSHAKE_BYTES_LEN);
        while buf.len() < HANDSHAKE_BYTES_LEN {
            let read = self.socket.read_buf(&mut buf).await.map_err(|e| {
                Error::HandshakeIncomplete(format!("unable to read handshake: {}", e))
            })?;
            if read == 0 {
                return Err(Error::HandshakeIncomplete(format!(
                    "peer closed connection after {} of {} bytes",
                    buf.len(),
                    HANDSHAKE_BYTES_LEN
                )));
            }
        }

        let mut response = [0; HANDSHAKE_BYTES_LEN];
        response.copy_from_slice(&buf[..HANDSHAKE_BYTES_LEN]);
        // Protocol string and reserved bytes of the reply are accepted as-is
        let response_handshake = Handshake::deserialise(&response);
        if response_handshake.info_hash != info_hash {
            debug!(
                "Peer replied with info hash {}",
                hex::encode(response_handshake.info_hash)
            );
        }
        Ok(response_handshake.peer_id)
    }
}

/// Connect to `peer` and perform the handshake within `deadline`, returning the peer's id
#[instrument(skip(peer, info_hash, peer_id), fields(peer = %peer))]
pub async fn handshake(
    peer: Peer,
    info_hash: [u8; HASH_LEN],
    peer_id: [u8; HASH_LEN],
    deadline: Duration,
) -> Result<[u8; HASH_LEN]> {
    let attempt = async move {
        let socket = TcpStream::connect(peer.socket_addr()).await.map_err(|e| {
            warn!("Unable to establish TCP connection: {}", e);
            Error::HandshakeIncomplete(format!("unable to connect: {}", e))
        })?;
        info!("Established TCP connection");
        let mut client = Client::new(socket);
        client.handshake(info_hash, peer_id).await
    };
    tokio::time::timeout(deadline, attempt)
        .await
        .map_err(|_| Error::HandshakeIncomplete(format!("no handshake within {:?}", deadline)))?
}
