//! Protocol Module
//!
//! Defines the memcached binary protocol as spoken by the handler.
//!
//! ## Packet Format
//! ```text
//! ┌──────────────┬──────────┬──────────┬─────────────────────┐
//! │ Header (24)  │  Extras  │   Key    │        Value        │
//! └──────────────┴──────────┴──────────┴─────────────────────┘
//! ```
//!
//! Requests open with magic 0x80, responses with 0x81. The header's total
//! body length covers extras, key and value; a reader must consume all of
//! it before the next header starts.
//!
//! ### Opcodes
//! - 0x00: GET      0x01: SET      0x02: ADD      0x03: REPLACE
//! - 0x04: DELETE   0x0E: APPEND   0x0F: PREPEND  0x1C: TOUCH
//! - 0x1D: GAT      0x40: GETE (get with expiration)
//!
//! ### Status Classification
//! - 0x0000: success
//! - 0x0001: not found (a miss for get-like commands)
//! - 0x0002: exists
//! - anything else: failure

mod command;
mod response;
mod codec;
mod pool;

pub use command::{
    Opcode, RequestHeader, EXPTIME_EXTRAS_LEN, HEADER_SIZE, REQUEST_MAGIC, STORE_EXTRAS_LEN,
};
pub use response::{classify, Outcome, ResponseHeader, Status, RESPONSE_MAGIC};
pub use codec::{
    discard, read_exact_bytes, read_request, read_response_header, write_add_cmd,
    write_append_cmd, write_delete_cmd, write_gat_cmd, write_gete_cmd, write_get_cmd,
    write_prepend_cmd, write_replace_cmd, write_response, write_set_cmd, write_store_cmd,
    write_touch_cmd, Request, MAX_BODY_SIZE,
};
pub use pool::{HeaderPool, PooledHeader};
