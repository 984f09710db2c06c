//! Batched Get Tests
//!
//! Ordering, miss reporting, failure termination and handler hand-back.

use std::sync::Arc;

use memlink::protocol::{Opcode, Status};
use memlink::{Config, DeleteRequest, GetRequest, MemlinkError, Metrics};

use crate::mock::{hit, hit_e, not_found, ok, setup_handler, setup_handler_with, status};

#[test]
fn test_all_misses_in_order() {
    let (conn, handler) = setup_handler();
    for _ in 0..3 {
        conn.reply(&not_found(Opcode::Get));
    }

    let request = GetRequest::new(
        vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()],
        vec![true, false, true],
        vec![10, 20, 30],
    )
    .unwrap();

    let mut batch = handler.get(request);
    let responses: Vec<_> = batch.by_ref().collect::<Result<_, _>>().unwrap();
    let handler = batch.finish().unwrap();

    assert_eq!(responses.len(), 3);
    for (resp, (key, quiet, opaque)) in responses
        .iter()
        .zip([(&b"a"[..], true, 10), (&b"b"[..], false, 20), (&b"c"[..], true, 30)])
    {
        assert!(resp.miss);
        assert_eq!(resp.key, key);
        assert_eq!(resp.quiet, quiet);
        assert_eq!(resp.opaque, opaque);
        assert_eq!(resp.data, None);
    }

    let requests = conn.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.header.opcode == Opcode::Get));
    assert_eq!(requests[1].header.opaque, 20);
    assert_eq!(handler.metrics().snapshot().misses, 3);
}

#[test]
fn test_mixed_hits_and_misses() {
    let (conn, handler) = setup_handler();
    conn.reply(&hit(Opcode::Get, 1, b"one"));
    conn.reply(&not_found(Opcode::Get));
    conn.reply(&hit(Opcode::Get, 3, b"three"));

    let mut batch = handler.get(GetRequest::from_keys(["k1", "k2", "k3"]));

    let first = batch.next().unwrap().unwrap();
    assert!(!first.miss);
    assert_eq!(first.flags, 1);
    assert_eq!(first.data.as_deref(), Some(&b"one"[..]));

    let second = batch.next().unwrap().unwrap();
    assert!(second.miss);
    assert_eq!(second.key, b"k2");

    let third = batch.next().unwrap().unwrap();
    assert_eq!(third.opaque, 2);
    assert_eq!(third.data.as_deref(), Some(&b"three"[..]));

    assert!(batch.next().is_none());
    batch.finish().unwrap();
}

#[test]
fn test_connection_loss_ends_stream_with_one_error() {
    let (conn, handler) = setup_handler();
    conn.reply(&hit(Opcode::Get, 0, b"v1"));
    conn.reply(&not_found(Opcode::Get));
    // Nothing for the third key: the peer hung up

    let mut batch = handler.get(GetRequest::from_keys(["a", "b", "c", "d"]));

    assert!(batch.next().unwrap().is_ok());
    assert!(batch.next().unwrap().is_ok());
    let err = batch.next().unwrap().unwrap_err();
    assert!(matches!(err, MemlinkError::Io(_)));
    assert!(batch.next().is_none());
    assert!(batch.next().is_none());

    let handler = batch.finish().unwrap();
    assert_eq!(conn.requests().len(), 3);
    assert_eq!(handler.metrics().snapshot().errors, 1);
}

#[test]
fn test_server_error_stops_batch() {
    let (conn, handler) = setup_handler();
    conn.reply(&hit(Opcode::Get, 0, b"v1"));
    conn.reply(&status(Opcode::Get, Status::OutOfMemory as u16, "Out of memory"));
    conn.reply(&hit(Opcode::Get, 0, b"never read"));

    let mut batch = handler.get(GetRequest::from_keys(["a", "b", "c"]));
    let results: Vec<_> = batch.by_ref().collect();
    let handler = batch.finish().unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    match &results[1] {
        Err(err) => {
            assert_eq!(err.status(), Some(0x0082));
            assert!(!err.is_fatal());
        }
        Ok(resp) => panic!("expected failure, got {:?}", resp),
    }

    // No request went out for the third key
    assert_eq!(conn.requests().len(), 2);
    drop(handler);
}

#[test]
fn test_get_e_recovers_exptime() {
    let (conn, handler) = setup_handler();
    conn.reply(&hit_e(4, 1_800, b"value"));
    conn.reply(&not_found(Opcode::GetE));

    let mut batch = handler.get_e(GetRequest::from_keys(["live", "dead"]));
    let responses: Vec<_> = batch.by_ref().collect::<Result<_, _>>().unwrap();
    batch.finish().unwrap();

    assert_eq!(responses[0].flags, 4);
    assert_eq!(responses[0].exptime, 1_800);
    assert_eq!(responses[0].data.as_deref(), Some(&b"value"[..]));
    assert!(responses[1].miss);
    assert_eq!(responses[1].exptime, 0);

    let requests = conn.requests();
    assert!(requests.iter().all(|r| r.header.opcode == Opcode::GetE));
}

#[test]
fn test_empty_batch() {
    let (conn, handler) = setup_handler();

    let mut batch = handler.get(GetRequest::default());
    assert!(batch.next().is_none());
    batch.finish().unwrap();
    assert_eq!(conn.written(), 0);
}

#[test]
fn test_abandoned_batch_still_reads_every_key() {
    let config = Config::builder().batch_buffer(0).build();
    let (conn, handler) = setup_handler_with(&config);
    for i in 0..5u32 {
        conn.reply(&hit(Opcode::Get, i, b"v"));
    }

    let mut batch = handler.get(GetRequest::from_keys(["a", "b", "c", "d", "e"]));
    assert_eq!(batch.next().unwrap().unwrap().flags, 0);

    let mut handler = batch.finish().unwrap();
    assert_eq!(conn.requests().len(), 5);

    // Framing survived: the next command reads its own response
    conn.reply(&ok(Opcode::Delete));
    handler
        .delete(&DeleteRequest {
            key: b"a".to_vec(),
        })
        .unwrap();
}

#[test]
fn test_handler_reusable_after_batch() {
    let metrics = Arc::new(Metrics::new());
    let (conn, handler) = setup_handler();
    let handler = handler.with_metrics(Arc::clone(&metrics));

    conn.reply(&hit(Opcode::Get, 0, b"x"));
    let mut batch = handler.get(GetRequest::from_keys(["x"]));
    assert_eq!(batch.by_ref().count(), 1);
    let handler = batch.finish().unwrap();

    conn.reply(&not_found(Opcode::Get));
    let mut batch = handler.get(GetRequest::from_keys(["y"]));
    assert!(batch.next().unwrap().unwrap().miss);
    batch.finish().unwrap();

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.commands, 2);
    assert_eq!(snapshot.misses, 1);
}
