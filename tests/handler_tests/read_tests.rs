//! Single-key Command Tests
//!
//! GAT, delete and touch, connection shutdown, and malformed responses.

use memlink::protocol::{write_response, Opcode, ResponseHeader, Status};
use memlink::{DeleteRequest, GatRequest, MemlinkError, TouchRequest};

use crate::mock::{hit, hit_with_key, not_found, ok, setup_handler, status};

fn gat(key: &str, exptime: u32, opaque: u32) -> GatRequest {
    GatRequest {
        key: key.as_bytes().to_vec(),
        exptime,
        opaque,
    }
}

// =============================================================================
// GAT Tests
// =============================================================================

#[test]
fn test_gat_hit() {
    let (conn, mut handler) = setup_handler();
    conn.reply(&hit(Opcode::Gat, 0x1234, b"cached"));

    let resp = handler.gat(&gat("session", 900, 17)).unwrap();
    assert!(!resp.miss);
    assert!(!resp.quiet);
    assert_eq!(resp.opaque, 17);
    assert_eq!(resp.flags, 0x1234);
    assert_eq!(resp.key, b"session");
    assert_eq!(resp.data.as_deref(), Some(&b"cached"[..]));

    let sent = &conn.requests()[0];
    assert_eq!(sent.header.opcode, Opcode::Gat);
    assert_eq!(sent.extras_u32(0), Some(900));
    assert_eq!(sent.header.opaque, 17);
}

#[test]
fn test_gat_miss_is_not_an_error() {
    let (conn, mut handler) = setup_handler();
    conn.reply(&not_found(Opcode::Gat));
    conn.reply(&ok(Opcode::Touch));

    let resp = handler.gat(&gat("gone", 60, 3)).unwrap();
    assert!(resp.miss);
    assert_eq!(resp.opaque, 3);
    assert_eq!(resp.flags, 0);
    assert_eq!(resp.data, None);

    // The miss body was consumed
    handler
        .touch(&TouchRequest {
            key: b"other".to_vec(),
            exptime: 60,
        })
        .unwrap();

    let snapshot = handler.metrics().snapshot();
    assert_eq!(snapshot.misses, 1);
    assert_eq!(snapshot.errors, 0);
}

#[test]
fn test_gat_skips_key_echo() {
    let (conn, mut handler) = setup_handler();
    conn.reply(&hit_with_key(Opcode::Gat, 9, b"echoed-key", b"value"));
    conn.reply(&ok(Opcode::Delete));

    let resp = handler.gat(&gat("echoed-key", 0, 0)).unwrap();
    assert_eq!(resp.flags, 9);
    assert_eq!(resp.data.as_deref(), Some(&b"value"[..]));

    handler
        .delete(&DeleteRequest {
            key: b"echoed-key".to_vec(),
        })
        .unwrap();
}

#[test]
fn test_gat_server_error() {
    let (conn, mut handler) = setup_handler();
    conn.reply(&status(Opcode::Gat, Status::Busy as u16, "Busy"));

    let err = handler.gat(&gat("k", 0, 0)).unwrap_err();
    assert_eq!(err.status(), Some(Status::Busy as u16));
    assert!(!err.is_fatal());
}

#[test]
fn test_gat_short_extras_is_protocol_error() {
    let (conn, mut handler) = setup_handler();
    let mut reply = Vec::new();
    write_response(
        &mut reply,
        ResponseHeader::new(Opcode::Gat as u8, Status::NoError as u16),
        &[0, 1],
        b"",
        b"value",
    )
    .unwrap();
    conn.reply(&reply);

    let err = handler.gat(&gat("k", 0, 0)).unwrap_err();
    assert!(matches!(err, MemlinkError::Protocol(_)));
    assert!(err.is_fatal());
}

// =============================================================================
// Delete / Touch Tests
// =============================================================================

#[test]
fn test_delete_outcomes() {
    let (conn, mut handler) = setup_handler();
    conn.reply(&ok(Opcode::Delete));
    conn.reply(&not_found(Opcode::Delete));

    let request = DeleteRequest {
        key: b"k".to_vec(),
    };
    handler.delete(&request).unwrap();
    let err = handler.delete(&request).unwrap_err();
    assert!(matches!(err, MemlinkError::KeyNotFound));

    let requests = conn.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].header.opcode, Opcode::Delete);
    assert_eq!(requests[0].header.extras_length, 0);
    assert_eq!(&requests[0].key[..], b"k");
}

#[test]
fn test_success_body_is_consumed() {
    let (conn, mut handler) = setup_handler();
    // Some servers attach a body even to a successful delete
    conn.reply(&status(Opcode::Delete, Status::NoError as u16, "Deleted"));
    conn.reply(&ok(Opcode::Delete));

    let request = DeleteRequest {
        key: b"k".to_vec(),
    };
    handler.delete(&request).unwrap();
    handler.delete(&request).unwrap();
}

#[test]
fn test_touch_sends_exptime() {
    let (conn, mut handler) = setup_handler();
    conn.reply(&ok(Opcode::Touch));
    conn.reply(&not_found(Opcode::Touch));

    handler
        .touch(&TouchRequest {
            key: b"t".to_vec(),
            exptime: 1_700_000_000,
        })
        .unwrap();
    let err = handler
        .touch(&TouchRequest {
            key: b"absent".to_vec(),
            exptime: 10,
        })
        .unwrap_err();
    assert!(matches!(err, MemlinkError::KeyNotFound));

    let sent = &conn.requests()[0];
    assert_eq!(sent.header.opcode, Opcode::Touch);
    assert_eq!(sent.header.extras_length, 4);
    assert_eq!(sent.extras_u32(0), Some(1_700_000_000));
}

// =============================================================================
// Connection Tests
// =============================================================================

#[test]
fn test_bad_magic_is_fatal() {
    let (conn, mut handler) = setup_handler();
    let mut reply = ok(Opcode::Delete);
    reply[0] = 0x80;
    conn.reply(&reply);

    let err = handler
        .delete(&DeleteRequest {
            key: b"k".to_vec(),
        })
        .unwrap_err();
    assert!(matches!(err, MemlinkError::Protocol(_)));
    assert!(err.is_fatal());
    assert_eq!(handler.metrics().snapshot().errors, 1);
}

#[test]
fn test_eof_before_header_is_io_error() {
    let (_conn, mut handler) = setup_handler();

    let err = handler
        .delete(&DeleteRequest {
            key: b"k".to_vec(),
        })
        .unwrap_err();
    assert!(matches!(err, MemlinkError::Io(_)));
}

#[test]
fn test_close_shuts_down_transport() {
    let (conn, handler) = setup_handler();
    assert_eq!(handler.peer(), "unknown");

    handler.close().unwrap();
    assert!(conn.is_shutdown());
}
