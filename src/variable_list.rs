//! # Variable List
//!
//! An ordered triple of ordered name sequences, one per scalar kind. The
//! per-kind order is the positional index used by any [`crate::value_container::ValueContainer`]
//! bound to this list. No uniqueness is enforced; callers are
//! responsible for not registering the same name twice.

use crate::codec::{self, Cursor};
use crate::error::Result;
use std::fmt;

/// Typed, ordered bundle of variable names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableList {
    reals: Vec<String>,
    ints: Vec<String>,
    bools: Vec<String>,
}

impl VariableList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names(reals: Vec<String>, ints: Vec<String>, bools: Vec<String>) -> Self {
        Self { reals, ints, bools }
    }

    pub fn add_real(&mut self, name: impl Into<String>) {
        self.reals.push(name.into());
    }

    pub fn add_int(&mut self, name: impl Into<String>) {
        self.ints.push(name.into());
    }

    pub fn add_bool(&mut self, name: impl Into<String>) {
        self.bools.push(name.into());
    }

    pub fn add_reals<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reals.extend(names.into_iter().map(Into::into));
    }

    pub fn add_ints<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ints.extend(names.into_iter().map(Into::into));
    }

    pub fn add_bools<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bools.extend(names.into_iter().map(Into::into));
    }

    pub fn reals(&self) -> &[String] {
        &self.reals
    }

    pub fn ints(&self) -> &[String] {
        &self.ints
    }

    pub fn bools(&self) -> &[String] {
        &self.bools
    }

    pub fn n_reals(&self) -> usize {
        self.reals.len()
    }

    pub fn n_ints(&self) -> usize {
        self.ints.len()
    }

    pub fn n_bools(&self) -> usize {
        self.bools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reals.is_empty() && self.ints.is_empty() && self.bools.is_empty()
    }

    /// Serialized size in bytes: three `u64` counts plus each name's
    /// length-prefixed string.
    pub fn encoded_size(&self) -> usize {
        let mut size = 3 * 8;
        for name in self.reals.iter().chain(&self.ints).chain(&self.bools) {
            size += codec::string_size(name);
        }
        size
    }

    /// Encode into `buf` at `offset`, returning the offset just past the
    /// written bytes.
    pub fn encode(&self, buf: &mut [u8], offset: usize) -> usize {
        let mut offset = codec::write_u64(buf, offset, self.reals.len() as u64);
        offset = codec::write_u64(buf, offset, self.ints.len() as u64);
        offset = codec::write_u64(buf, offset, self.bools.len() as u64);
        for name in self.reals.iter().chain(&self.ints).chain(&self.bools) {
            offset = codec::write_string(buf, offset, name);
        }
        offset
    }

    /// Decode from a cursor: `u64 nReal, u64 nInt, u64 nBool`, then the
    /// `nReal` real names, then `nInt` int names, then `nBool` bool
    /// names.
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let n_reals = cursor.read_u64()? as usize;
        let n_ints = cursor.read_u64()? as usize;
        let n_bools = cursor.read_u64()? as usize;

        let mut reals = Vec::with_capacity(n_reals);
        for _ in 0..n_reals {
            reals.push(cursor.read_string()?);
        }
        let mut ints = Vec::with_capacity(n_ints);
        for _ in 0..n_ints {
            ints.push(cursor.read_string()?);
        }
        let mut bools = Vec::with_capacity(n_bools);
        for _ in 0..n_bools {
            bools.push(cursor.read_string()?);
        }

        Ok(Self { reals, ints, bools })
    }

    /// Is every name in `self` present, per kind, in `other`? No
    /// ordering is required, only membership.
    pub fn is_subset_of(&self, other: &VariableList) -> bool {
        let kind_subset = |mine: &[String], theirs: &[String]| {
            mine.iter().all(|name| theirs.iter().any(|o| o == name))
        };
        kind_subset(&self.reals, &other.reals)
            && kind_subset(&self.ints, &other.ints)
            && kind_subset(&self.bools, &other.bools)
    }
}

impl fmt::Display for VariableList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Real:[")?;
        for name in &self.reals {
            write!(f, "{} ", name)?;
        }
        write!(f, "]Ints:[")?;
        for name in &self.ints {
            write!(f, "{} ", name)?;
        }
        write!(f, "]Bools:[")?;
        for name in &self.bools {
            write!(f, "{} ", name)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_encode_decode() {
        let mut list = VariableList::new();
        list.add_reals(["x", "y"]);
        list.add_int("n");
        list.add_bools(["flag_a", "flag_b"]);

        let mut buf = vec![0u8; list.encoded_size()];
        list.encode(&mut buf, 0);

        let mut cursor = Cursor::new(&buf);
        let decoded = VariableList::decode(&mut cursor).unwrap();
        assert_eq!(decoded, list);
    }

    #[test]
    fn empty_list_is_valid() {
        let list = VariableList::new();
        assert!(list.is_empty());
        assert_eq!(list.encoded_size(), 24);
    }

    #[test]
    fn subset_ignores_order_and_kind_crossing() {
        let mut a = VariableList::new();
        a.add_reals(["y", "x"]);
        let mut b = VariableList::new();
        b.add_reals(["x", "y", "z"]);
        assert!(a.is_subset_of(&b));

        let mut c = VariableList::new();
        c.add_ints(["x"]); // same name, wrong kind
        assert!(!c.is_subset_of(&b));
    }

    #[test]
    fn display_matches_original_rendering() {
        let mut list = VariableList::new();
        list.add_real("x");
        assert_eq!(list.to_string(), "Real:[x ]Ints:[]Bools:[]");
    }
}
