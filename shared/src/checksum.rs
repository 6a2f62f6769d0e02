use crc32fast::Hasher;

/// CRC-32 (IEEE, reflected) over `mac || key || blob`.
///
/// The device computes the same value over its buffered and stored slot
/// contents, so this is what both checksum readbacks are compared against.
pub fn secrets_crc32(mac: &[u8], key: &[u8], blob: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(mac);
    hasher.update(key);
    hasher.update(blob);
    hasher.finalize()
}

/// Wire form of a checksum: eight lowercase hex digits, zero padded.
pub fn format_crc(crc: u32) -> String {
    format!("{crc:08x}")
}
