use crate::cluster::{hash_slot, same_slot};

#[test]
fn known_slots() {
    assert_eq!(12182, hash_slot(b"foo"));
    assert_eq!(5474, hash_slot(b"{user1000}.following"));
    assert_eq!(5474, hash_slot(b"{user1000}.followers"));
}

#[test]
fn hash_tag() {
    // only the tag region is hashed
    assert_eq!(hash_slot(b"bar"), hash_slot(b"foo{bar}baz"));
    assert_eq!(hash_slot(b"{u}:a"), hash_slot(b"{u}:b"));

    // the first tag wins
    assert_eq!(hash_slot(b"one"), hash_slot(b"{one}{two}"));
}

#[test]
fn empty_braces_hash_the_whole_key() {
    let expected = crc16::State::<crc16::XMODEM>::calculate(b"{}foo") % 16384;
    assert_eq!(expected, hash_slot(b"{}foo"));
}

#[test]
fn unclosed_brace_hashes_the_whole_key() {
    let expected = crc16::State::<crc16::XMODEM>::calculate(b"{foo") % 16384;
    assert_eq!(expected, hash_slot(b"{foo"));
}

#[test]
fn same_slot_check() {
    assert_eq!(
        Some(5474),
        same_slot([b"{user1000}.following".as_ref(), b"{user1000}.followers"])
    );
    assert_eq!(None, same_slot([b"foo".as_ref(), b"bar"]));
    assert_eq!(None, same_slot(std::iter::empty::<&[u8]>()));
    assert_eq!(Some(12182), same_slot([b"foo".as_ref()]));
}
