//! # Message Framing
//!
//! Typed messages layered on top of [`crate::codec`], discriminated by a
//! leading tag byte. The initial plane and the run plane use disjoint
//! tag spaces and disjoint framing disciplines:
//!
//! - Initial-plane frames are length-prefixed (`u32` length, read via
//!   [`crate::transport::Transport::recv_variable`]) and begin with
//!   their tag byte.
//! - Run-plane frames are *not* length-prefixed: the sender writes an
//!   `i32 sim_id` first so the receiver can select the right
//!   pre-sized message slot, then exactly `1 + container.frame_tail_size()`
//!   further bytes follow — a tag byte, then the container's time and
//!   typed arrays. See [`encode_run_tail`]/[`decode_run_tail`].

use crate::codec::{self, Cursor};
use crate::error::{NetOffError, Plane, Result};
use crate::value_container::ValueContainer;
use crate::variable_list::VariableList;

macro_rules! tag_enum {
    ($name:ident, $plane:expr, { $($variant:ident = $value:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub fn from_u8(tag: u8) -> Result<Self> {
                match tag {
                    $($value => Ok(Self::$variant),)+
                    other => Err(NetOffError::UnknownTag { plane: $plane, tag: other }),
                }
            }

            pub fn as_u8(self) -> u8 {
                self as u8
            }
        }
    };
}

tag_enum!(InitialClientTag, Plane::Initial, {
    AddSim = 0,
    InitSim = 1,
    GetFile = 2,
    Start = 3,
    ClientInitAbort = 4,
});

tag_enum!(InitialServerTag, Plane::Initial, {
    SuccessAddSim = 0,
    SuccessGetFile = 1,
    SuccessStart = 2,
});

tag_enum!(RunClientTag, Plane::Run, {
    Inputs = 0,
    Pause = 1,
    Unpause = 2,
    Reset = 3,
    ClientAbort = 4,
});

tag_enum!(RunServerTag, Plane::Run, {
    Outputs = 0,
    SuccessSimInit = 1,
    SuccessPause = 2,
    SuccessUnpause = 3,
    SuccessReset = 4,
});

/// `ADD_SIM sim_id, path`
pub struct AddSimRequest {
    pub sim_id: i32,
    pub path: String,
}

impl AddSimRequest {
    pub fn encode(&self) -> Vec<u8> {
        let size = 1 + 4 + codec::string_size(&self.path);
        let mut buf = vec![0u8; size];
        let mut off = codec::write_u8(&mut buf, 0, InitialClientTag::AddSim.as_u8());
        off = codec::write_i32(&mut buf, off, self.sim_id);
        codec::write_string(&mut buf, off, &self.path);
        buf
    }

    pub fn decode_body(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            sim_id: cursor.read_i32()?,
            path: cursor.read_string()?,
        })
    }
}

/// `INIT_SIM sim_id, selected_inputs, selected_outputs`
pub struct InitSimRequest {
    pub sim_id: i32,
    pub inputs: VariableList,
    pub outputs: VariableList,
}

impl InitSimRequest {
    pub fn encode(&self) -> Vec<u8> {
        let size = 1 + 4 + self.inputs.encoded_size() + self.outputs.encoded_size();
        let mut buf = vec![0u8; size];
        let mut off = codec::write_u8(&mut buf, 0, InitialClientTag::InitSim.as_u8());
        off = codec::write_i32(&mut buf, off, self.sim_id);
        off = self.inputs.encode(&mut buf, off);
        self.outputs.encode(&mut buf, off);
        buf
    }

    pub fn decode_body(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            sim_id: cursor.read_i32()?,
            inputs: VariableList::decode(cursor)?,
            outputs: VariableList::decode(cursor)?,
        })
    }
}

/// `GET_FILE sim_id, path`
pub struct GetFileRequest {
    pub sim_id: i32,
    pub path: String,
}

impl GetFileRequest {
    pub fn encode(&self) -> Vec<u8> {
        let size = 1 + 4 + codec::string_size(&self.path);
        let mut buf = vec![0u8; size];
        let mut off = codec::write_u8(&mut buf, 0, InitialClientTag::GetFile.as_u8());
        off = codec::write_i32(&mut buf, off, self.sim_id);
        codec::write_string(&mut buf, off, &self.path);
        buf
    }

    pub fn decode_body(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            sim_id: cursor.read_i32()?,
            path: cursor.read_string()?,
        })
    }
}

/// `START` (empty body)
pub fn encode_start_request() -> Vec<u8> {
    vec![InitialClientTag::Start.as_u8()]
}

/// `CLIENT_INIT_ABORT` (empty body)
pub fn encode_client_init_abort() -> Vec<u8> {
    vec![InitialClientTag::ClientInitAbort.as_u8()]
}

/// `SUCCESS_ADD_SIM sim_id, possible_inputs, possible_outputs`
pub struct SuccessAddSim {
    pub sim_id: i32,
    pub possible_inputs: VariableList,
    pub possible_outputs: VariableList,
}

impl SuccessAddSim {
    pub fn encode(&self) -> Vec<u8> {
        let size =
            1 + 4 + self.possible_inputs.encoded_size() + self.possible_outputs.encoded_size();
        let mut buf = vec![0u8; size];
        let mut off = codec::write_u8(&mut buf, 0, InitialServerTag::SuccessAddSim.as_u8());
        off = codec::write_i32(&mut buf, off, self.sim_id);
        off = self.possible_inputs.encode(&mut buf, off);
        self.possible_outputs.encode(&mut buf, off);
        buf
    }

    pub fn decode_body(cursor: &mut Cursor<'_>) -> Result<Self> {
        Ok(Self {
            sim_id: cursor.read_i32()?,
            possible_inputs: VariableList::decode(cursor)?,
            possible_outputs: VariableList::decode(cursor)?,
        })
    }
}

/// `SUCCESS_GET_FILE sim_id, blob_len, blob` — no name field on the
/// wire; the informational name the original carried alongside the
/// blob is redundant with the request path and is dropped here.
pub struct SuccessGetFile {
    pub sim_id: i32,
    pub blob: Vec<u8>,
}

impl SuccessGetFile {
    pub fn encode(&self) -> Vec<u8> {
        let size = 1 + 4 + 8 + self.blob.len();
        let mut buf = vec![0u8; size];
        let mut off = codec::write_u8(&mut buf, 0, InitialServerTag::SuccessGetFile.as_u8());
        off = codec::write_i32(&mut buf, off, self.sim_id);
        off = codec::write_u64(&mut buf, off, self.blob.len() as u64);
        buf[off..off + self.blob.len()].copy_from_slice(&self.blob);
        buf
    }

    pub fn decode_body(cursor: &mut Cursor<'_>) -> Result<Self> {
        let sim_id = cursor.read_i32()?;
        let len = cursor.read_u64()? as usize;
        Ok(Self {
            sim_id,
            blob: cursor.read_bytes(len)?,
        })
    }
}

/// `SUCCESS_START` (empty body)
pub fn encode_success_start() -> Vec<u8> {
    vec![InitialServerTag::SuccessStart.as_u8()]
}

/// Byte length of the run-plane frame tail (tag + time + arrays) for a
/// container bound to the simulation the frame addresses.
pub fn run_frame_tail_len(container: &ValueContainer) -> usize {
    1 + container.frame_tail_size()
}

/// Encode the run-plane frame tail: `tag, time, reals, ints, bools`.
/// The caller is responsible for writing the leading `i32 sim_id`
/// separately, since the receiver must read it before it knows which
/// bound container's size to expect for the rest of the frame.
pub fn encode_run_tail(tag: u8, container: &ValueContainer) -> Vec<u8> {
    let mut buf = vec![0u8; run_frame_tail_len(container)];
    let off = codec::write_u8(&mut buf, 0, tag);
    container.encode_tail(&mut buf, off);
    buf
}

/// Decode a run-plane frame tail into `container` (already bound to the
/// right simulation and sizes), returning the tag byte read first.
pub fn decode_run_tail(buf: &[u8], container: &mut ValueContainer) -> Result<u8> {
    let mut cursor = Cursor::new(buf);
    let tag = cursor.read_u8()?;
    container.decode_tail_into(&mut cursor)?;
    Ok(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sim_round_trips() {
        let req = AddSimRequest {
            sim_id: 3,
            path: "/models/a.fmu".to_string(),
        };
        let bytes = req.encode();
        assert_eq!(bytes[0], InitialClientTag::AddSim.as_u8());
        let mut cursor = Cursor::new(&bytes[1..]);
        let decoded = AddSimRequest::decode_body(&mut cursor).unwrap();
        assert_eq!(decoded.sim_id, 3);
        assert_eq!(decoded.path, "/models/a.fmu");
    }

    #[test]
    fn unknown_initial_tag_is_rejected() {
        assert!(matches!(
            InitialClientTag::from_u8(99),
            Err(NetOffError::UnknownTag {
                plane: Plane::Initial,
                tag: 99
            })
        ));
    }

    #[test]
    fn run_tail_round_trips_with_tag() {
        let mut list = VariableList::new();
        list.add_reals(["x"]);
        let mut container = ValueContainer::new(1, &list);
        container.set_time(0.5);
        container.set_reals(&[2.0]).unwrap();

        let bytes = encode_run_tail(RunClientTag::Inputs.as_u8(), &container);
        let mut decoded = ValueContainer::new(1, &list);
        let tag = decode_run_tail(&bytes, &mut decoded).unwrap();
        assert_eq!(tag, RunClientTag::Inputs.as_u8());
        assert_eq!(decoded, container);
    }
}
