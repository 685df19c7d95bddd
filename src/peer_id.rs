use rand::{distr::Alphanumeric, Rng};

use crate::{HASH_LEN, PEER_ID_PREFIX};

/// Generate a local peer id: the client prefix followed by random alphanumerics
pub fn generate() -> [u8; HASH_LEN] {
    let mut id = [0; HASH_LEN];
    id[..PEER_ID_PREFIX.len()].copy_from_slice(PEER_ID_PREFIX);
    let rng = rand::rng();
    for (slot, byte) in id[PEER_ID_PREFIX.len()..]
        .iter_mut()
        .zip(rng.sample_iter(Alphanumeric))
    {
        *slot = byte;
    }
    id
}
