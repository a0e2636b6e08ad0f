//! Fuzz-style property tests for the wire codec.
//!
//! Decoders must never panic on arbitrary input, and partial input must
//! always read as an underrun rather than an error.

use gate_server::protocol::codec::{varint_len, write_varint, MAX_VARINT_LEN};
use gate_server::protocol::{ByteCursor, FrameCodec, PacketBuilder};
use gate_server::ProtocolError;
use proptest::prelude::*;

proptest! {
    /// Property: Arbitrary bytes don't crash the plain frame decoder
    #[test]
    fn arbitrary_bytes_dont_crash_plain_frames(
        random_bytes in prop::collection::vec(any::<u8>(), 0..2000),
    ) {
        let mut cursor = ByteCursor::from_bytes(random_bytes);
        let _result = FrameCodec::new().extract_frame(&mut cursor);
    }

    /// Property: Arbitrary bytes don't crash the compressed frame decoder
    #[test]
    fn arbitrary_bytes_dont_crash_compressed_frames(
        random_bytes in prop::collection::vec(any::<u8>(), 0..2000),
    ) {
        let mut cursor = ByteCursor::from_bytes(random_bytes);
        let _result = FrameCodec::with_compression(256).extract_frame(&mut cursor);
    }

    /// Property: VarInts roundtrip in their minimal length
    #[test]
    fn varint_roundtrips_minimally(value in any::<i32>()) {
        let mut out = Vec::new();
        write_varint(&mut out, value);
        prop_assert_eq!(out.len(), varint_len(value));
        prop_assert!(out.len() <= MAX_VARINT_LEN);

        let mut cursor = ByteCursor::from_bytes(out);
        prop_assert_eq!(cursor.read_varint().unwrap(), value);
        prop_assert_eq!(cursor.remaining(), 0);
    }

    /// Property: Any strict prefix of a varint is an underrun
    #[test]
    fn truncated_varint_underruns(value in any::<i32>()) {
        let mut out = Vec::new();
        write_varint(&mut out, value);
        for cut in 0..out.len() {
            let mut cursor = ByteCursor::from_bytes(out[..cut].to_vec());
            prop_assert_eq!(cursor.read_varint(), Err(ProtocolError::Underrun));
        }
    }

    /// Property: Strings keep their UTF-8 content
    #[test]
    fn string_roundtrips(text in ".{0,300}") {
        let body = PacketBuilder::new().string(&text).into_bytes();
        let mut cursor = ByteCursor::from_bytes(body);
        prop_assert_eq!(cursor.read_string().unwrap(), text);
    }

    /// Property: Frames roundtrip on either side of the compression threshold
    #[test]
    fn frames_roundtrip_around_threshold(
        id in 0i32..0x80,
        body in prop::collection::vec(any::<u8>(), 200..320),
        compressed in any::<bool>(),
    ) {
        let codec = if compressed { FrameCodec::with_compression(256) } else { FrameCodec::new() };
        let frame = codec.build_frame(id, &body).unwrap();

        let mut cursor = ByteCursor::from_bytes(frame);
        let decoded = codec.extract_frame(&mut cursor).unwrap();
        prop_assert_eq!(decoded.id, id);
        prop_assert_eq!(decoded.body, body);
        prop_assert_eq!(cursor.buffered(), 0);
    }

    /// Property: Delivering a frame byte by byte yields it exactly once, at the end
    #[test]
    fn byte_by_byte_delivery_underruns_until_complete(
        body in prop::collection::vec(any::<u8>(), 0..600),
        compressed in any::<bool>(),
    ) {
        let codec = if compressed { FrameCodec::with_compression(256) } else { FrameCodec::new() };
        let frame = codec.build_frame(0x21, &body).unwrap();
        let last = frame.len() - 1;

        let mut cursor = ByteCursor::new();
        for (index, byte) in frame.iter().enumerate() {
            cursor.add(&[*byte]);
            let result = codec.extract_frame(&mut cursor);
            if index < last {
                prop_assert_eq!(result.err(), Some(ProtocolError::Underrun));
            } else {
                prop_assert_eq!(result.unwrap().body, body.clone());
            }
        }
    }
}
