/// Sniff the mime type of a photo or engine recording from its magic bytes.
pub fn detect_media_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x41, 0x56, 0x45, ..] => Some("audio/wav"),
        [0x1A, 0x45, 0xDF, 0xA3, ..] => Some("audio/webm"),
        [0x4F, 0x67, 0x67, 0x53, ..] => Some("audio/ogg"),
        [0x49, 0x44, 0x33, ..] | [0xFF, 0xFB, ..] | [0xFF, 0xF3, ..] => Some("audio/mpeg"),
        [_, _, _, _, 0x66, 0x74, 0x79, 0x70, 0x4D, 0x34, 0x41, ..] => Some("audio/mp4"),
        _ => {
            tracing::warn!(
                "Unrecognized media format (first 4 bytes: {:02X?})",
                &bytes[..bytes.len().min(4)]
            );
            None
        }
    }
}
