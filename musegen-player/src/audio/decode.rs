//! Chunk decoder
//!
//! Converts one encoded audio payload into raw PCM bytes. Pure and
//! stateless: safe to call concurrently for independent chunks, though the
//! controller still writes results to the sink in arrival order.

use crate::error::{Error, Result};
use base64::prelude::*;

/// Decode one chunk payload (base64) into raw 16-bit PCM bytes
///
/// # Errors
/// Returns [`Error::Decode`] if the payload is not valid base64. The
/// controller treats this as a per-chunk failure: the chunk is dropped and
/// playback continues.
pub fn decode_chunk(data: &str) -> Result<Vec<u8>> {
    BASE64_STANDARD
        .decode(data)
        .map_err(|e| Error::Decode(format!("invalid chunk payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_chunk() {
        // 4 bytes = one stereo 16-bit frame
        let encoded = BASE64_STANDARD.encode([0x01, 0x02, 0x03, 0x04]);
        let pcm = decode_chunk(&encoded).unwrap();
        assert_eq!(pcm, vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_decode_empty_chunk() {
        let pcm = decode_chunk("").unwrap();
        assert!(pcm.is_empty());
    }

    #[test]
    fn test_decode_malformed_chunk_is_decode_error() {
        let err = decode_chunk("not base64!!!").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_decode_roundtrips_pcm_payload() {
        let pcm: Vec<u8> = (0..=255).collect();
        let encoded = BASE64_STANDARD.encode(&pcm);
        assert_eq!(decode_chunk(&encoded).unwrap(), pcm);
    }
}
