//! The flat integer/real wire streams appended to the host's migration
//! buffer.
//!
//! Each subscriber writes its records as one length-prefixed integer chunk
//! and one length-prefixed real chunk; the matching import reads the chunks
//! back in the same subscription order. The transport carrying the buffer
//! between ranks is owned by the host.

use serde::{Deserialize, Serialize};

use crate::model::ParticleId;
use crate::topology::Error;

/// Decodes a particle id from the integer stream.
pub fn wire_id(raw: i64) -> Result<ParticleId, Error> {
    u64::try_from(raw)
        .map(ParticleId)
        .map_err(|_| Error::CorruptStream(format!("negative particle id {raw} on the wire")))
}

/// Write side of the migration payload: an integer stream and a real stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireBuffer {
    ints: Vec<i64>,
    reals: Vec<f64>,
}

impl WireBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one length-prefixed integer chunk.
    pub fn write_ints(&mut self, chunk: &[i64]) {
        self.ints.push(chunk.len() as i64);
        self.ints.extend_from_slice(chunk);
    }

    /// Appends one length-prefixed real chunk.
    pub fn write_reals(&mut self, chunk: &[f64]) {
        self.reals.push(chunk.len() as f64);
        self.reals.extend_from_slice(chunk);
    }

    pub fn is_empty(&self) -> bool {
        self.ints.is_empty() && self.reals.is_empty()
    }

    pub fn into_reader(self) -> WireReader {
        WireReader { ints: self.ints, reals: self.reals, int_pos: 0, real_pos: 0 }
    }
}

/// Read side of the migration payload.
///
/// Any shape mismatch — a chunk longer than the remaining stream, a negative
/// length, trailing data after every subscriber has read its chunk — is a
/// fatal [`Error::CorruptStream`], never a logged-and-ignored condition.
#[derive(Debug)]
pub struct WireReader {
    ints: Vec<i64>,
    reals: Vec<f64>,
    int_pos: usize,
    real_pos: usize,
}

impl WireReader {
    pub fn read_ints(&mut self) -> Result<Vec<i64>, Error> {
        let len = *self
            .ints
            .get(self.int_pos)
            .ok_or_else(|| Error::CorruptStream("integer stream exhausted".into()))?;
        if len < 0 {
            return Err(Error::CorruptStream(format!("negative integer chunk length {len}")));
        }
        let start = self.int_pos + 1;
        let end = start + len as usize;
        let chunk = self
            .ints
            .get(start..end)
            .ok_or_else(|| {
                Error::CorruptStream(format!(
                    "integer chunk of length {len} overruns the stream"
                ))
            })?
            .to_vec();
        self.int_pos = end;
        Ok(chunk)
    }

    pub fn read_reals(&mut self) -> Result<Vec<f64>, Error> {
        let len = *self
            .reals
            .get(self.real_pos)
            .ok_or_else(|| Error::CorruptStream("real stream exhausted".into()))?;
        if !(len.is_finite() && len >= 0.0 && len.fract() == 0.0) {
            return Err(Error::CorruptStream(format!("bad real chunk length {len}")));
        }
        let start = self.real_pos + 1;
        let end = start + len as usize;
        let chunk = self
            .reals
            .get(start..end)
            .ok_or_else(|| {
                Error::CorruptStream(format!("real chunk of length {len} overruns the stream"))
            })?
            .to_vec();
        self.real_pos = end;
        Ok(chunk)
    }

    /// Whether every chunk has been consumed. Trailing data after the last
    /// subscriber's read means the send and receive sides disagree about the
    /// subscriber set, which the host must treat as fatal.
    pub fn is_drained(&self) -> bool {
        self.int_pos == self.ints.len() && self.real_pos == self.reals.len()
    }
}
