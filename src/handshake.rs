use crate::{HANDSHAKE_BYTES_LEN, HASH_LEN, PSTR};

const PROTOCOL_ID_LEN: u8 = 0x13;
const RESERVED_LEN: usize = 8;
const INFO_HASH_OFFSET: usize = 1 + PSTR.len() + RESERVED_LEN;
const PEER_ID_OFFSET: usize = INFO_HASH_OFFSET + HASH_LEN;

/// BitTorrent handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// SHA1 hash of bencoded `info` dict of file
    pub info_hash: [u8; HASH_LEN],
    /// Identifier of peer
    pub peer_id: [u8; HASH_LEN],
}

impl Handshake {
    pub fn new(info_hash: [u8; HASH_LEN], peer_id: [u8; HASH_LEN]) -> Handshake {
        Handshake { info_hash, peer_id }
    }

    /// Serialise handshake data
    pub fn serialise(&self) -> [u8; HANDSHAKE_BYTES_LEN] {
        let mut output = [0; HANDSHAKE_BYTES_LEN];
        output[0] = PROTOCOL_ID_LEN;
        output[1..INFO_HASH_OFFSET - RESERVED_LEN].copy_from_slice(PSTR.as_bytes());
        output[INFO_HASH_OFFSET..PEER_ID_OFFSET].copy_from_slice(&self.info_hash);
        output[PEER_ID_OFFSET..].copy_from_slice(&self.peer_id);
        output
    }

    /// Deserialise a received handshake.
    ///
    /// Only the info hash and peer id are read. The length prefix, protocol string and
    /// reserved bytes are not checked.
    pub fn deserialise(data: &[u8; HANDSHAKE_BYTES_LEN]) -> Handshake {
        let mut info_hash = [0; HASH_LEN];
        info_hash.copy_from_slice(&data[INFO_HASH_OFFSET..PEER_ID_OFFSET]);
        let mut peer_id = [0; HASH_LEN];
        peer_id.copy_from_slice(&data[PEER_ID_OFFSET..]);
        Handshake { info_hash, peer_id }
    }
}
