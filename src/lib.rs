use std::collections::BTreeMap;

pub mod client;
pub mod decode;
pub mod encode;
pub mod error;
pub mod handshake;
pub mod metainfo;
pub mod peer_id;
pub mod tracker;

pub use error::{Error, Result};

/// Protocol identifier sent in the handshake
pub const PSTR: &str = "BitTorrent protocol";
/// Length in bytes of a handshake message
pub const HANDSHAKE_BYTES_LEN: usize = 68;
/// Port reported to the tracker
pub const DEFAULT_PORT: u16 = 6881;
/// Client identifier prefixed to generated peer ids
pub const PEER_ID_PREFIX: &[u8; 8] = b"-BT0001-";
/// Length of SHA1 hashes and peer ids
pub const HASH_LEN: usize = 20;

/// Decoded bencode value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BencodeType {
    Integer(i64),
    ByteString(Vec<u8>),
    List(Vec<BencodeType>),
    /// Keys are raw bytes, ordered by byte value
    Dict(BTreeMap<Vec<u8>, BencodeType>),
}

impl BencodeType {
    /// Look up `key` if this value is a dict
    pub fn get(&self, key: &str) -> Option<&BencodeType> {
        match self {
            BencodeType::Dict(dict) => dict.get(key.as_bytes()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            BencodeType::Integer(int) => Some(*int),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BencodeType::ByteString(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Render as JSON, byte strings are converted lossily to UTF-8
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            BencodeType::Integer(int) => serde_json::Value::from(*int),
            BencodeType::ByteString(bytes) => {
                serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
            }
            BencodeType::List(items) => {
                serde_json::Value::Array(items.iter().map(BencodeType::to_json).collect())
            }
            BencodeType::Dict(dict) => serde_json::Value::Object(
                dict.iter()
                    .map(|(key, value)| (String::from_utf8_lossy(key).into_owned(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<i64> for BencodeType {
    fn from(val: i64) -> BencodeType {
        BencodeType::Integer(val)
    }
}

impl From<&str> for BencodeType {
    fn from(val: &str) -> BencodeType {
        BencodeType::ByteString(val.as_bytes().to_vec())
    }
}

impl From<&[u8]> for BencodeType {
    fn from(val: &[u8]) -> BencodeType {
        BencodeType::ByteString(val.to_vec())
    }
}

impl From<Vec<u8>> for BencodeType {
    fn from(val: Vec<u8>) -> BencodeType {
        BencodeType::ByteString(val)
    }
}

impl From<Vec<BencodeType>> for BencodeType {
    fn from(val: Vec<BencodeType>) -> BencodeType {
        BencodeType::List(val)
    }
}

impl TryFrom<u64> for BencodeType {
    type Error = Error;

    fn try_from(val: u64) -> Result<BencodeType> {
        i64::try_from(val)
            .map(BencodeType::Integer)
            .map_err(|_| Error::UnsupportedValue(format!("integer {} exceeds i64 range", val)))
    }
}

impl TryFrom<usize> for BencodeType {
    type Error = Error;

    fn try_from(val: usize) -> Result<BencodeType> {
        BencodeType::try_from(val as u64)
    }
}
