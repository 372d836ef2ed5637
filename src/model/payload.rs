use std::fmt;

/// A per-relationship payload frozen at creation time.
///
/// Payloads (a rest bond length, a rest bending angle, a small vector) are
/// measured once when the relationship is added and then travel with it
/// verbatim through every export/import — they are never recomputed during a
/// rebuild. On the wire a payload occupies a fixed number of reals appended
/// after the participant ids.
pub trait Payload: Copy + PartialEq + fmt::Debug + 'static {
    /// Number of reals this payload occupies on the migration wire.
    const WIDTH: usize;

    fn write(&self, reals: &mut Vec<f64>);

    /// Reads the payload back, advancing `pos`. Returns `None` when the
    /// stream is too short; the import phase promotes that to a fatal
    /// corrupt-stream error.
    fn read(reals: &[f64], pos: &mut usize) -> Option<Self>;
}

impl Payload for () {
    const WIDTH: usize = 0;

    fn write(&self, _reals: &mut Vec<f64>) {}

    fn read(_reals: &[f64], _pos: &mut usize) -> Option<Self> {
        Some(())
    }
}

impl Payload for f64 {
    const WIDTH: usize = 1;

    fn write(&self, reals: &mut Vec<f64>) {
        reals.push(*self);
    }

    fn read(reals: &[f64], pos: &mut usize) -> Option<Self> {
        let v = *reals.get(*pos)?;
        *pos += 1;
        Some(v)
    }
}

impl<const N: usize> Payload for [f64; N] {
    const WIDTH: usize = N;

    fn write(&self, reals: &mut Vec<f64>) {
        reals.extend_from_slice(self);
    }

    fn read(reals: &[f64], pos: &mut usize) -> Option<Self> {
        let end = pos.checked_add(N)?;
        let slice = reals.get(*pos..end)?;
        let mut out = [0.0; N];
        out.copy_from_slice(slice);
        *pos = end;
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trip() {
        let mut reals = Vec::new();
        1.5f64.write(&mut reals);
        let mut pos = 0;
        assert_eq!(f64::read(&reals, &mut pos), Some(1.5));
        assert_eq!(pos, 1);
    }

    #[test]
    fn vector_round_trip() {
        let mut reals = Vec::new();
        [1.0, 2.0, 3.0].write(&mut reals);
        let mut pos = 0;
        assert_eq!(<[f64; 3]>::read(&reals, &mut pos), Some([1.0, 2.0, 3.0]));
    }

    #[test]
    fn short_stream_reads_none() {
        let reals = [1.0];
        let mut pos = 0;
        assert_eq!(<[f64; 3]>::read(&reals, &mut pos), None);
        assert_eq!(pos, 0);
    }
}
