/// Number of hash slots partitioning a cluster keyspace
pub const SLOT_COUNT: u16 = 16384;

/// Implement hash_slot algorithm
/// see. https://redis.io/docs/reference/cluster-spec/#hash-tags
///
/// The hashed region is the substring between the first `{` and the next
/// `}`; an empty tag (`{}`) or an unclosed brace fall back to the whole
/// key.
pub fn hash_slot(key: &[u8]) -> u16 {
    let mut key = key;

    // { found
    if let Some(s) = memchr::memchr(b'{', key) {
        // } found
        if let Some(e) = memchr::memchr(b'}', &key[s + 1..]) {
            // hash tag non empty
            if e != 0 {
                key = &key[s + 1..s + 1 + e];
            }
        }
    }

    crc16(key) % SLOT_COUNT
}

/// `Some(slot)` iff every key hashes to the same slot; `None` for an empty
/// key set or mismatched slots.
pub fn same_slot<'a>(keys: impl IntoIterator<Item = &'a [u8]>) -> Option<u16> {
    let mut iter = keys.into_iter();
    let slot = hash_slot(iter.next()?);

    for key in iter {
        if hash_slot(key) != slot {
            return None;
        }
    }

    Some(slot)
}

fn crc16(key: &[u8]) -> u16 {
    crc16::State::<crc16::XMODEM>::calculate(key)
}
