use crate::{encode::encode, BencodeType, Error, Result, HASH_LEN};

const ANNOUNCE_KEY: &str = "announce";
const INFO_KEY: &str = "info";
const NAME_KEY: &str = "name";
const LENGTH_KEY: &str = "length";
const PIECE_LENGTH_KEY: &str = "piece length";
const PIECES_KEY: &str = "pieces";

/// Metainfo (`.torrent`) file
#[derive(Debug, Clone, PartialEq)]
pub struct Metainfo {
    /// URL of the tracker
    pub announce: String,
    /// Info dict
    pub info: Info,
    /// SHA1 hash of the bencoded `info` dict
    pub info_hash: [u8; HASH_LEN],
}

impl Metainfo {
    /// Extract metainfo from a decoded `.torrent` file
    pub fn new(data: &BencodeType) -> Result<Metainfo> {
        if !matches!(data, BencodeType::Dict(_)) {
            return Err(Error::MissingField(INFO_KEY));
        }
        let announce = data
            .get(ANNOUNCE_KEY)
            .and_then(BencodeType::as_bytes)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .ok_or(Error::MissingField(ANNOUNCE_KEY))?
            .to_string();
        let info_value = data
            .get(INFO_KEY)
            .filter(|value| matches!(value, BencodeType::Dict(_)))
            .ok_or(Error::MissingField(INFO_KEY))?;
        let info = Info::new(info_value)?;
        let info_hash = sha1_smol::Sha1::from(encode(info_value)).digest().bytes();

        Ok(Metainfo {
            announce,
            info,
            info_hash,
        })
    }

    /// Info hash as lowercase hex
    pub fn info_hash_hex(&self) -> String {
        hex::encode(self.info_hash)
    }
}

/// Info dict within metainfo file
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    /// Name of the file
    pub name: Vec<u8>,
    /// Length of the file in bytes
    pub length: u64,
    /// Length of a piece of the file in bytes
    pub piece_length: u64,
    /// Concatenated SHA1 hashes of all pieces
    pieces: Vec<u8>,
}

impl Info {
    fn new(data: &BencodeType) -> Result<Info> {
        let name = data
            .get(NAME_KEY)
            .and_then(BencodeType::as_bytes)
            .ok_or(Error::MissingField(NAME_KEY))?
            .to_vec();
        let length = non_negative(data, LENGTH_KEY)?;
        let piece_length = non_negative(data, PIECE_LENGTH_KEY)?;
        let pieces = data
            .get(PIECES_KEY)
            .and_then(BencodeType::as_bytes)
            .ok_or(Error::MissingField(PIECES_KEY))?;
        if pieces.len() % HASH_LEN != 0 {
            return Err(Error::MalformedPieceList(pieces.len()));
        }

        Ok(Info {
            name,
            length,
            piece_length,
            pieces: pieces.to_vec(),
        })
    }

    /// Iterate over the SHA1 hash of each piece, in file order
    pub fn pieces(&self) -> impl Iterator<Item = &[u8]> {
        self.pieces.chunks_exact(HASH_LEN)
    }

    /// Get single piece hash from `pieces`
    pub fn piece(&self, number: usize) -> Option<&[u8]> {
        self.pieces().nth(number)
    }

    pub fn no_of_pieces(&self) -> usize {
        self.pieces.len() / HASH_LEN
    }
}

fn non_negative(data: &BencodeType, key: &'static str) -> Result<u64> {
    data.get(key)
        .and_then(BencodeType::as_integer)
        .and_then(|int| u64::try_from(int).ok())
        .ok_or(Error::MissingField(key))
}
