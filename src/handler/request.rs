//! Request and response shapes
//!
//! What callers hand to the [`Handler`](super::Handler) and what comes back.

use bytes::Bytes;

use crate::error::{MemlinkError, Result};

/// Payload for set, add, replace, append and prepend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRequest {
    pub key: Vec<u8>,
    pub flags: u32,
    pub exptime: u32,
    pub data: Bytes,
}

impl SetRequest {
    /// Request with zero flags and no expiration
    pub fn new(key: impl Into<Vec<u8>>, data: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            flags: 0,
            exptime: 0,
            data: data.into(),
        }
    }

    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn exptime(mut self, exptime: u32) -> Self {
        self.exptime = exptime;
        self
    }
}

/// A batched get.
///
/// Keys, quiet flags and opaques are kept in step: every key has exactly
/// one of each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetRequest {
    keys: Vec<Vec<u8>>,
    quiet: Vec<bool>,
    opaques: Vec<u32>,
}

impl GetRequest {
    /// Build from parallel sequences, rejecting mismatched lengths
    pub fn new(keys: Vec<Vec<u8>>, quiet: Vec<bool>, opaques: Vec<u32>) -> Result<Self> {
        if keys.len() != quiet.len() || keys.len() != opaques.len() {
            return Err(MemlinkError::InvalidRequest(format!(
                "{} keys with {} quiet flags and {} opaques",
                keys.len(),
                quiet.len(),
                opaques.len()
            )));
        }
        Ok(Self {
            keys,
            quiet,
            opaques,
        })
    }

    /// Non-quiet request for `keys`, opaques numbered from zero
    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        let mut request = Self::default();
        for (idx, key) in keys.into_iter().enumerate() {
            request.push(key, false, idx as u32);
        }
        request
    }

    /// Append one key
    pub fn push(&mut self, key: impl Into<Vec<u8>>, quiet: bool, opaque: u32) {
        self.keys.push(key.into());
        self.quiet.push(quiet);
        self.opaques.push(opaque);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[Vec<u8>] {
        &self.keys
    }

    /// Iterate `(key, quiet, opaque)` in request order
    pub fn entries(&self) -> impl Iterator<Item = (&[u8], bool, u32)> + '_ {
        self.keys
            .iter()
            .zip(&self.quiet)
            .zip(&self.opaques)
            .map(|((key, quiet), opaque)| (key.as_slice(), *quiet, *opaque))
    }
}

/// Get-and-touch: fetch a key and reset its expiration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatRequest {
    pub key: Vec<u8>,
    pub exptime: u32,
    pub opaque: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchRequest {
    pub key: Vec<u8>,
    pub exptime: u32,
}

/// One key's result from a get, batched get or GAT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResponse {
    pub miss: bool,
    pub quiet: bool,
    pub opaque: u32,
    pub flags: u32,
    pub cas: u64,
    pub key: Vec<u8>,
    /// `None` on a miss
    pub data: Option<Bytes>,
}

/// [`GetResponse`] plus the expiration recovered from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetEResponse {
    pub miss: bool,
    pub quiet: bool,
    pub opaque: u32,
    pub flags: u32,
    pub exptime: u32,
    pub cas: u64,
    pub key: Vec<u8>,
    pub data: Option<Bytes>,
}

/// A value read off the wire for one key
#[derive(Debug, Clone)]
pub(crate) struct Fetched {
    pub flags: u32,
    pub exptime: u32,
    pub cas: u64,
    pub data: Bytes,
}

/// Response types a batch can produce
pub(crate) trait BatchResponse: Send + 'static {
    /// Whether the read path decodes an exptime from the extras
    const WITH_EXPTIME: bool;

    fn build(key: Vec<u8>, quiet: bool, opaque: u32, fetched: Option<Fetched>) -> Self;
}

impl BatchResponse for GetResponse {
    const WITH_EXPTIME: bool = false;

    fn build(key: Vec<u8>, quiet: bool, opaque: u32, fetched: Option<Fetched>) -> Self {
        match fetched {
            Some(f) => GetResponse {
                miss: false,
                quiet,
                opaque,
                flags: f.flags,
                cas: f.cas,
                key,
                data: Some(f.data),
            },
            None => GetResponse {
                miss: true,
                quiet,
                opaque,
                flags: 0,
                cas: 0,
                key,
                data: None,
            },
        }
    }
}

impl BatchResponse for GetEResponse {
    const WITH_EXPTIME: bool = true;

    fn build(key: Vec<u8>, quiet: bool, opaque: u32, fetched: Option<Fetched>) -> Self {
        match fetched {
            Some(f) => GetEResponse {
                miss: false,
                quiet,
                opaque,
                flags: f.flags,
                exptime: f.exptime,
                cas: f.cas,
                key,
                data: Some(f.data),
            },
            None => GetEResponse {
                miss: true,
                quiet,
                opaque,
                flags: 0,
                exptime: 0,
                cas: 0,
                key,
                data: None,
            },
        }
    }
}
