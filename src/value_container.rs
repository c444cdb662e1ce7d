//! # Value Container
//!
//! A typed bundle of variable values matching the shape of a
//! [`VariableList`]: parallel arrays of reals, integers, and booleans,
//! bound at construction to a simulation id and to the cardinalities of
//! a variable list. The bound sizes are immutable thereafter — this
//! type does not know which message tag it will be framed under; that
//! is the concern of [`crate::message`].

use crate::codec::{self, Cursor};
use crate::error::{NetOffError, Result};
use crate::variable_list::VariableList;

/// Parallel typed value arrays bound to a simulation id and variable list.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueContainer {
    sim_id: i32,
    time: f64,
    reals: Vec<f64>,
    ints: Vec<i32>,
    bools: Vec<u8>,
}

impl ValueContainer {
    /// Construct a container bound to `sim_id` and sized by `list`'s
    /// per-kind cardinalities, all values zeroed and time at `0.0`.
    pub fn new(sim_id: i32, list: &VariableList) -> Self {
        Self {
            sim_id,
            time: 0.0,
            reals: vec![0.0; list.n_reals()],
            ints: vec![0; list.n_ints()],
            bools: vec![0; list.n_bools()],
        }
    }

    pub fn sim_id(&self) -> i32 {
        self.sim_id
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub fn reals(&self) -> &[f64] {
        &self.reals
    }

    pub fn reals_mut(&mut self) -> &mut [f64] {
        &mut self.reals
    }

    pub fn ints(&self) -> &[i32] {
        &self.ints
    }

    pub fn ints_mut(&mut self) -> &mut [i32] {
        &mut self.ints
    }

    /// Booleans are stored one byte per value, `0` or `1`.
    pub fn bools(&self) -> &[u8] {
        &self.bools
    }

    pub fn bools_mut(&mut self) -> &mut [u8] {
        &mut self.bools
    }

    /// Overwrite the real slice. Fails with `SizeMismatch` if `values`
    /// does not match the bound cardinality exactly.
    pub fn set_reals(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.reals.len() {
            return Err(NetOffError::SizeMismatch {
                expected: self.reals.len(),
                got: values.len(),
            });
        }
        self.reals.copy_from_slice(values);
        Ok(())
    }

    pub fn set_ints(&mut self, values: &[i32]) -> Result<()> {
        if values.len() != self.ints.len() {
            return Err(NetOffError::SizeMismatch {
                expected: self.ints.len(),
                got: values.len(),
            });
        }
        self.ints.copy_from_slice(values);
        Ok(())
    }

    pub fn set_bools(&mut self, values: &[u8]) -> Result<()> {
        if values.len() != self.bools.len() {
            return Err(NetOffError::SizeMismatch {
                expected: self.bools.len(),
                got: values.len(),
            });
        }
        self.bools.copy_from_slice(values);
        Ok(())
    }

    /// Byte count of the body this container serializes to (`sim_id` +
    /// `time` + the three typed arrays).
    pub fn body_size(&self) -> usize {
        4 + 8 + 8 * self.reals.len() + 4 * self.ints.len() + self.bools.len()
    }

    /// Byte count of the arrays plus time only, excluding `sim_id` —
    /// this is the fixed per-frame length the run plane uses once a
    /// simulation's selected lists have sized its message slots (see
    /// `crate::message`).
    pub fn frame_tail_size(&self) -> usize {
        8 + 8 * self.reals.len() + 4 * self.ints.len() + self.bools.len()
    }

    pub fn encode(&self, buf: &mut [u8], offset: usize) -> usize {
        let mut offset = codec::write_i32(buf, offset, self.sim_id);
        offset = codec::write_f64(buf, offset, self.time);
        for v in &self.reals {
            offset = codec::write_f64(buf, offset, *v);
        }
        for v in &self.ints {
            offset = codec::write_i32(buf, offset, *v);
        }
        for v in &self.bools {
            offset = codec::write_u8(buf, offset, *v);
        }
        offset
    }

    /// Decode a full container body (`sim_id` + `time` + arrays) whose
    /// array lengths are taken from `list`.
    pub fn decode(cursor: &mut Cursor<'_>, list: &VariableList) -> Result<Self> {
        let sim_id = cursor.read_i32()?;
        let time = cursor.read_f64()?;
        let mut reals = Vec::with_capacity(list.n_reals());
        for _ in 0..list.n_reals() {
            reals.push(cursor.read_f64()?);
        }
        let mut ints = Vec::with_capacity(list.n_ints());
        for _ in 0..list.n_ints() {
            ints.push(cursor.read_i32()?);
        }
        let mut bools = Vec::with_capacity(list.n_bools());
        for _ in 0..list.n_bools() {
            bools.push(cursor.read_u8()?);
        }
        Ok(Self {
            sim_id,
            time,
            reals,
            ints,
            bools,
        })
    }

    /// Decode just the frame tail (`time` + arrays, no `sim_id`) into a
    /// container already bound to the right `sim_id` and sizes — used by
    /// the run-plane framing, which reads `sim_id` separately to select
    /// which bound container to decode into (see `crate::message`).
    pub fn decode_tail_into(&mut self, cursor: &mut Cursor<'_>) -> Result<()> {
        self.time = cursor.read_f64()?;
        for v in self.reals.iter_mut() {
            *v = cursor.read_f64()?;
        }
        for v in self.ints.iter_mut() {
            *v = cursor.read_i32()?;
        }
        for v in self.bools.iter_mut() {
            *v = cursor.read_u8()?;
        }
        Ok(())
    }

    pub fn encode_tail(&self, buf: &mut [u8], offset: usize) -> usize {
        let mut offset = codec::write_f64(buf, offset, self.time);
        for v in &self.reals {
            offset = codec::write_f64(buf, offset, *v);
        }
        for v in &self.ints {
            offset = codec::write_i32(buf, offset, *v);
        }
        for v in &self.bools {
            offset = codec::write_u8(buf, offset, *v);
        }
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> VariableList {
        let mut l = VariableList::new();
        l.add_reals(["x", "y"]);
        l.add_int("n");
        l.add_bool("flag");
        l
    }

    #[test]
    fn round_trips_full_body() {
        let list = list();
        let mut c = ValueContainer::new(7, &list);
        c.set_time(1.5);
        c.set_reals(&[1.0, 2.0]).unwrap();
        c.set_ints(&[42]).unwrap();
        c.set_bools(&[1]).unwrap();

        let mut buf = vec![0u8; c.body_size()];
        c.encode(&mut buf, 0);

        let mut cursor = Cursor::new(&buf);
        let decoded = ValueContainer::decode(&mut cursor, &list).unwrap();
        assert_eq!(decoded, c);
    }

    #[test]
    fn wrong_length_write_is_size_mismatch() {
        let mut c = ValueContainer::new(0, &list());
        assert!(matches!(
            c.set_reals(&[1.0]),
            Err(NetOffError::SizeMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn tail_round_trip_preserves_binding() {
        let list = list();
        let mut src = ValueContainer::new(3, &list);
        src.set_time(2.25);
        src.set_reals(&[9.0, 8.0]).unwrap();
        src.set_ints(&[-1]).unwrap();
        src.set_bools(&[0]).unwrap();

        let mut buf = vec![0u8; src.frame_tail_size()];
        src.encode_tail(&mut buf, 0);

        let mut dst = ValueContainer::new(3, &list);
        let mut cursor = Cursor::new(&buf);
        dst.decode_tail_into(&mut cursor).unwrap();
        assert_eq!(dst, src);
    }
}
