// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format tests: length-prefix framing and JSON encoding.

use super::*;

#[tokio::test]
async fn read_write_frame_roundtrip() {
    let original = b"hello world";

    let mut buffer = Vec::new();
    write_frame(&mut buffer, original).await.unwrap();
    assert_eq!(buffer.len(), 4 + original.len());

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_frame(&mut cursor).await.unwrap();
    assert_eq!(read_back, original);
}

#[tokio::test]
async fn write_frame_adds_length_prefix() {
    let data = b"test data";
    let mut buffer = Vec::new();
    write_frame(&mut buffer, data).await.unwrap();

    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    assert_eq!(len, data.len());
    assert_eq!(&buffer[4..], data);
}

#[tokio::test]
async fn oversized_prefix_is_rejected() {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&(MAX_FRAME_BYTES + 1).to_be_bytes());
    let mut cursor = std::io::Cursor::new(buffer);
    assert!(matches!(
        read_frame(&mut cursor).await,
        Err(ProtocolError::FrameTooLarge(_))
    ));
}

#[tokio::test]
async fn truncated_stream_is_connection_closed() {
    let mut buffer = Vec::new();
    write_frame(&mut buffer, b"full frame").await.unwrap();
    buffer.truncate(buffer.len() - 3);
    let mut cursor = std::io::Cursor::new(buffer);
    assert!(matches!(
        read_frame(&mut cursor).await,
        Err(ProtocolError::ConnectionClosed)
    ));
}

#[test]
fn encode_returns_json_without_length_prefix() {
    let encoded = encode(&serde_json::json!({"method": "ping"})).unwrap();
    let json_str = std::str::from_utf8(&encoded).unwrap();
    assert!(json_str.starts_with('{'), "should be JSON object: {}", json_str);
    let back: serde_json::Value = decode(&encoded).unwrap();
    assert_eq!(back["method"], "ping");
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn any_payload_roundtrips(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            let read_back = runtime.block_on(async {
                let mut buffer = Vec::new();
                write_frame(&mut buffer, &payload).await.unwrap();
                let mut cursor = std::io::Cursor::new(buffer);
                read_frame(&mut cursor).await.unwrap()
            });
            prop_assert_eq!(read_back, payload);
        }
    }
}
