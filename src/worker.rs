//! # Worker State Machine (C6)
//!
//! Accepts one driver, executes the init and run phases, dispatches by
//! message tag, and owns the per-simulation buffers. Every "get next
//! request" entry point requires no request to already be outstanding;
//! every "confirm X" entry point requires the outstanding request to be
//! exactly the one it confirms. Both are enforced through
//! [`PendingRequest`] rather than a bare boolean flag, so a mismatched
//! confirm call fails immediately instead of silently corrupting the
//! session.

use crate::codec::Cursor;
use crate::error::{NetOffError, Result};
use crate::message::{
    self, AddSimRequest, GetFileRequest, InitSimRequest, InitialClientTag, RunClientTag,
    RunServerTag, SuccessAddSim, SuccessGetFile,
};
use crate::transport::{Transport, TransportConfig};
use crate::value_container::ValueContainer;
use crate::variable_list::VariableList;
use std::collections::HashMap;
use tracing::debug;

/// Connection lifecycle: `NONE -> INITED -> STARTED -> NONE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    None,
    Inited,
    Started,
}

/// The request a call to one of the `get_*_request` methods has handed
/// to the application and is awaiting a matching `confirm_*` call for.
#[derive(Debug, Clone, PartialEq)]
enum PendingRequest {
    AddSim { sim_id: i32 },
    InitSim { sim_id: i32 },
    GetFile { sim_id: i32 },
    Start,
    Inputs { sim_id: i32 },
    Pause,
    Unpause,
    Reset,
}

#[derive(Debug, Clone, Default)]
struct SimRecord {
    path: String,
    possible_inputs: VariableList,
    possible_outputs: VariableList,
    selected_inputs: Option<VariableList>,
    selected_outputs: Option<VariableList>,
    input_slot: Option<ValueContainer>,
    output_slot: Option<ValueContainer>,
    initialized: bool,
    last_received_time: f64,
}

/// Server-side half of the protocol: accepts one driver and hosts its
/// simulations.
pub struct WorkerSession {
    config: TransportConfig,
    state: WorkerState,
    transport: Option<Transport>,
    sims: Vec<SimRecord>,
    path_to_id: HashMap<String, i32>,
    pending: Option<PendingRequest>,
    last_sim_id: i32,
    last_simulation_file: String,
}

impl WorkerSession {
    pub fn new() -> Self {
        Self {
            config: TransportConfig::default(),
            state: WorkerState::None,
            transport: None,
            sims: Vec::new(),
            path_to_id: HashMap::new(),
            pending: None,
            last_sim_id: -1,
            last_simulation_file: String::new(),
        }
    }

    pub fn set_port(&mut self, port: u16) {
        self.config.port = port;
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Bind and block-accept exactly one driver.
    pub async fn initialize_connection(&mut self) -> Result<()> {
        let transport = Transport::accept_one(&self.config).await?;
        self.transport = Some(transport);
        self.state = WorkerState::Inited;
        Ok(())
    }

    pub async fn deinitialize(&mut self) -> Result<()> {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close().await;
        }
        self.state = WorkerState::None;
        Ok(())
    }

    fn transport_mut(&mut self) -> Result<&mut Transport> {
        self.transport
            .as_mut()
            .ok_or_else(|| NetOffError::ProtocolState("no active connection".to_string()))
    }

    fn sim_mut(&mut self, sim_id: i32) -> Result<&mut SimRecord> {
        self.sims
            .get_mut(sim_id as usize)
            .ok_or(NetOffError::UnknownSimId { sim_id })
    }

    fn sim(&self, sim_id: i32) -> Result<&SimRecord> {
        self.sims
            .get(sim_id as usize)
            .ok_or(NetOffError::UnknownSimId { sim_id })
    }

    /// Read and classify the next initial-plane request. Requires no
    /// request already outstanding and the connection to be at least
    /// `INITED`.
    pub async fn get_initial_client_request(&mut self) -> Result<InitialClientTag> {
        if self.pending.is_some() || self.state == WorkerState::None {
            return Err(NetOffError::ProtocolState(
                "last initial request wasn't handled, or the worker wasn't initialized"
                    .to_string(),
            ));
        }

        let bytes = self.transport_mut()?.recv_variable().await?;
        if bytes.is_empty() {
            return Err(NetOffError::Codec("empty initial-plane frame".to_string()));
        }
        let tag = InitialClientTag::from_u8(bytes[0])?;
        let mut cursor = Cursor::new(&bytes[1..]);

        match tag {
            InitialClientTag::AddSim => {
                let req = AddSimRequest::decode_body(&mut cursor)?;
                if self.path_to_id.contains_key(&req.path) {
                    return Err(NetOffError::DuplicatePath { path: req.path });
                }
                if req.sim_id as usize != self.sims.len() {
                    return Err(NetOffError::ProtocolState(format!(
                        "sim ids must be assigned densely from 0; expected {}, got {}",
                        self.sims.len(),
                        req.sim_id
                    )));
                }
                debug!("worker: ADD_SIM {} -> {}", req.sim_id, req.path);
                self.path_to_id.insert(req.path.clone(), req.sim_id);
                self.sims.push(SimRecord {
                    path: req.path,
                    ..Default::default()
                });
                self.last_sim_id = req.sim_id;
                self.pending = Some(PendingRequest::AddSim { sim_id: req.sim_id });
            }
            InitialClientTag::InitSim => {
                let req = InitSimRequest::decode_body(&mut cursor)?;
                let sim_id = req.sim_id;
                {
                    let sim = self.sim(sim_id)?;
                    if !req.inputs.is_subset_of(&sim.possible_inputs)
                        || !req.outputs.is_subset_of(&sim.possible_outputs)
                    {
                        return Err(NetOffError::ProtocolState(
                            "selected variables are not a subset of the possible variables"
                                .to_string(),
                        ));
                    }
                }

                let input_slot = ValueContainer::new(sim_id, &req.inputs);
                let output_slot = ValueContainer::new(sim_id, &req.outputs);

                // Receive the initial input container immediately, as an
                // ordinary run-plane INPUTS frame, before the
                // application is asked for anything.
                let frame_len = message::run_frame_tail_len(&input_slot);
                let mut sim_id_buf = [0u8; 4];
                self.transport_mut()?.recv_exact(&mut sim_id_buf).await?;
                let wire_sim_id = i32::from_ne_bytes(sim_id_buf);
                if wire_sim_id != sim_id {
                    return Err(NetOffError::UnknownSimId { sim_id: wire_sim_id });
                }
                let mut tail = vec![0u8; frame_len];
                self.transport_mut()?.recv_exact(&mut tail).await?;
                let mut input_slot = input_slot;
                let tag = message::decode_run_tail(&tail, &mut input_slot)?;
                if tag != RunClientTag::Inputs.as_u8() {
                    return Err(NetOffError::UnknownTag {
                        plane: crate::error::Plane::Run,
                        tag,
                    });
                }

                let sim = self.sim_mut(sim_id)?;
                sim.last_received_time = input_slot.time();
                sim.selected_inputs = Some(req.inputs);
                sim.selected_outputs = Some(req.outputs);
                sim.input_slot = Some(input_slot);
                sim.output_slot = Some(output_slot);
                sim.initialized = true;

                self.last_sim_id = sim_id;
                self.pending = Some(PendingRequest::InitSim { sim_id });
            }
            InitialClientTag::GetFile => {
                let req = GetFileRequest::decode_body(&mut cursor)?;
                self.last_simulation_file = req.path;
                self.last_sim_id = req.sim_id;
                self.pending = Some(PendingRequest::GetFile { sim_id: req.sim_id });
            }
            InitialClientTag::Start => {
                self.pending = Some(PendingRequest::Start);
            }
            InitialClientTag::ClientInitAbort => {
                self.deinitialize().await?;
            }
        }

        Ok(tag)
    }

    /// Returns the path and sim id of the simulation just added,
    /// requiring an outstanding `ADD_SIM` request.
    pub fn get_added_simulation(&self) -> Result<(String, i32)> {
        match self.pending {
            Some(PendingRequest::AddSim { sim_id }) => {
                Ok((self.sim(sim_id)?.path.clone(), sim_id))
            }
            _ => Err(NetOffError::ProtocolState(
                "no ADD_SIM request is outstanding".to_string(),
            )),
        }
    }

    pub fn get_last_sim_id(&self) -> i32 {
        self.last_sim_id
    }

    pub fn get_selected_input_variables(&self, sim_id: i32) -> Result<VariableList> {
        self.sim(sim_id)?
            .selected_inputs
            .clone()
            .ok_or(NetOffError::UnknownSimId { sim_id })
    }

    pub fn get_selected_output_variables(&self, sim_id: i32) -> Result<VariableList> {
        self.sim(sim_id)?
            .selected_outputs
            .clone()
            .ok_or(NetOffError::UnknownSimId { sim_id })
    }

    pub fn get_input_value_container(&self, sim_id: i32) -> Result<&ValueContainer> {
        self.sim(sim_id)?
            .input_slot
            .as_ref()
            .ok_or(NetOffError::UnknownSimId { sim_id })
    }

    pub fn get_output_value_container_mut(&mut self, sim_id: i32) -> Result<&mut ValueContainer> {
        self.sim_mut(sim_id)?
            .output_slot
            .as_mut()
            .ok_or(NetOffError::UnknownSimId { sim_id })
    }

    /// Confirm `ADD_SIM` with the simulation's full possible input and
    /// output variable lists, replying with `SUCCESS_ADD_SIM`.
    pub async fn confirm_simulation_add(
        &mut self,
        sim_id: i32,
        possible_inputs: VariableList,
        possible_outputs: VariableList,
    ) -> Result<()> {
        match self.pending {
            Some(PendingRequest::AddSim { sim_id: pending_id }) if pending_id == sim_id => {}
            _ => {
                return Err(NetOffError::ProtocolState(
                    "no matching ADD_SIM request is outstanding".to_string(),
                ))
            }
        }

        {
            let sim = self.sim_mut(sim_id)?;
            sim.possible_inputs = possible_inputs.clone();
            sim.possible_outputs = possible_outputs.clone();
        }

        let reply = SuccessAddSim {
            sim_id,
            possible_inputs,
            possible_outputs,
        };
        self.transport_mut()?.send_variable(&reply.encode()).await?;
        self.pending = None;
        Ok(())
    }

    /// Confirm `INIT_SIM` with the initial output values, framed as
    /// `SUCCESS_SIM_INIT` at time `0.0`.
    pub async fn confirm_simulation_init(
        &mut self,
        sim_id: i32,
        outputs: &ValueContainer,
    ) -> Result<()> {
        match self.pending {
            Some(PendingRequest::InitSim { sim_id: pending_id }) if pending_id == sim_id => {}
            _ => {
                return Err(NetOffError::ProtocolState(
                    "no matching INIT_SIM request is outstanding".to_string(),
                ))
            }
        }

        {
            let sim = self.sim_mut(sim_id)?;
            let slot = sim
                .output_slot
                .as_mut()
                .ok_or(NetOffError::UnknownSimId { sim_id })?;
            slot.set_reals(outputs.reals())?;
            slot.set_ints(outputs.ints())?;
            slot.set_bools(outputs.bools())?;
            slot.set_time(0.0);
        }

        self.send_run_frame(sim_id, RunServerTag::SuccessSimInit.as_u8())
            .await?;
        self.pending = None;
        Ok(())
    }

    pub fn get_simulation_file_name(&self) -> &str {
        &self.last_simulation_file
    }

    pub async fn confirm_simulation_file(&mut self, sim_id: i32, bytes: Vec<u8>) -> Result<()> {
        match self.pending {
            Some(PendingRequest::GetFile { sim_id: pending_id }) if pending_id == sim_id => {}
            _ => {
                return Err(NetOffError::ProtocolState(
                    "no matching GET_FILE request is outstanding".to_string(),
                ))
            }
        }

        let reply = SuccessGetFile { sim_id, blob: bytes };
        self.transport_mut()?.send_variable(&reply.encode()).await?;
        self.pending = None;
        Ok(())
    }

    pub async fn confirm_start(&mut self) -> Result<()> {
        if self.pending != Some(PendingRequest::Start) {
            return Err(NetOffError::ProtocolState(
                "no START request is outstanding".to_string(),
            ));
        }
        self.transport_mut()?
            .send_variable(&message::encode_success_start())
            .await?;
        self.pending = None;
        self.state = WorkerState::Started;
        Ok(())
    }

    /// Read and classify the next run-plane request. Uses `sim_id`'s
    /// input slot as the scratch buffer for control messages.
    pub async fn get_client_request(&mut self) -> Result<RunClientTag> {
        if self.pending.is_some() || self.state != WorkerState::Started {
            return Err(NetOffError::ProtocolState(
                "last request wasn't handled, or the worker wasn't started".to_string(),
            ));
        }

        let mut sim_id_buf = [0u8; 4];
        self.transport_mut()?.recv_exact(&mut sim_id_buf).await?;
        let sim_id = i32::from_ne_bytes(sim_id_buf);

        let frame_len = message::run_frame_tail_len(
            self.sim(sim_id)?
                .input_slot
                .as_ref()
                .ok_or(NetOffError::UnknownSimId { sim_id })?,
        );
        let mut tail = vec![0u8; frame_len];
        self.transport_mut()?.recv_exact(&mut tail).await?;

        let sim = self.sim_mut(sim_id)?;
        let slot = sim.input_slot.as_mut().unwrap();
        let tag_byte = message::decode_run_tail(&tail, slot)?;
        sim.last_received_time = slot.time();

        let tag = RunClientTag::from_u8(tag_byte)?;
        self.last_sim_id = sim_id;

        match tag {
            RunClientTag::Inputs => self.pending = Some(PendingRequest::Inputs { sim_id }),
            RunClientTag::Pause => self.pending = Some(PendingRequest::Pause),
            RunClientTag::Unpause => self.pending = Some(PendingRequest::Unpause),
            RunClientTag::Reset => self.pending = Some(PendingRequest::Reset),
            RunClientTag::ClientAbort => {
                self.deinitialize().await?;
            }
        }

        Ok(tag)
    }

    /// Read-only borrow of the input values just received for `sim_id`.
    /// Requires an outstanding `INPUTS` request for that simulation.
    pub fn recv_input_values(&self, sim_id: i32) -> Result<&ValueContainer> {
        match self.pending {
            Some(PendingRequest::Inputs { sim_id: pending_id }) if pending_id == sim_id => {}
            _ => {
                return Err(NetOffError::ProtocolState(
                    "no matching INPUTS request is outstanding".to_string(),
                ))
            }
        }
        self.get_input_value_container(sim_id)
    }

    /// Flush `sim_id`'s output slot as an `OUTPUTS` reply at `time`,
    /// confirming the outstanding `INPUTS` request.
    pub async fn send_output_values(&mut self, sim_id: i32, time: f64) -> Result<()> {
        match self.pending {
            Some(PendingRequest::Inputs { sim_id: pending_id }) if pending_id == sim_id => {}
            _ => {
                return Err(NetOffError::ProtocolState(
                    "no matching INPUTS request is outstanding".to_string(),
                ))
            }
        }

        {
            let sim = self.sim_mut(sim_id)?;
            sim.output_slot
                .as_mut()
                .ok_or(NetOffError::UnknownSimId { sim_id })?
                .set_time(time);
        }

        self.send_run_frame(sim_id, RunServerTag::Outputs.as_u8())
            .await?;
        self.pending = None;
        Ok(())
    }

    pub async fn confirm_pause(&mut self) -> Result<()> {
        if self.pending != Some(PendingRequest::Pause) {
            return Err(NetOffError::ProtocolState(
                "no PAUSE request is outstanding".to_string(),
            ));
        }
        self.send_run_frame(0, RunServerTag::SuccessPause.as_u8())
            .await?;
        self.pending = None;
        Ok(())
    }

    pub async fn confirm_unpause(&mut self) -> Result<()> {
        if self.pending != Some(PendingRequest::Unpause) {
            return Err(NetOffError::ProtocolState(
                "no UNPAUSE request is outstanding".to_string(),
            ));
        }
        self.send_run_frame(0, RunServerTag::SuccessUnpause.as_u8())
            .await?;
        self.pending = None;
        Ok(())
    }

    /// Acknowledges `RESET` and returns to `STARTED` without tearing the
    /// session down — the protocol permits restarting in place.
    pub async fn confirm_reset(&mut self) -> Result<()> {
        if self.pending != Some(PendingRequest::Reset) {
            return Err(NetOffError::ProtocolState(
                "no RESET request is outstanding".to_string(),
            ));
        }
        self.send_run_frame(0, RunServerTag::SuccessReset.as_u8())
            .await?;
        self.pending = None;
        Ok(())
    }

    pub fn get_last_received_time(&self, sim_id: i32) -> Result<f64> {
        Ok(self.sim(sim_id)?.last_received_time)
    }

    pub fn is_active(&self) -> bool {
        self.state != WorkerState::None
    }

    /// Send `sim_id`'s output slot as a tagged run-plane frame:
    /// `i32 sim_id` then `encode_run_tail(tag, slot)`.
    async fn send_run_frame(&mut self, sim_id: i32, tag: u8) -> Result<()> {
        let sim = self.sim(sim_id)?;
        let slot = sim
            .output_slot
            .as_ref()
            .ok_or(NetOffError::UnknownSimId { sim_id })?;
        let tail = message::encode_run_tail(tag, slot);

        let transport = self.transport_mut()?;
        transport.send_exact(&sim_id.to_ne_bytes()).await?;
        transport.send_exact(&tail).await?;
        Ok(())
    }
}

impl Default for WorkerSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initial_request_before_connection_is_rejected() {
        let mut worker = WorkerSession::new();
        let err = worker.get_initial_client_request().await.unwrap_err();
        assert!(matches!(err, NetOffError::ProtocolState(_)));
    }

    #[tokio::test]
    async fn confirm_start_without_a_pending_start_is_rejected() {
        let mut worker = WorkerSession::new();
        let err = worker.confirm_start().await.unwrap_err();
        assert!(matches!(err, NetOffError::ProtocolState(_)));
    }

    #[test]
    fn unknown_sim_id_accessors_are_rejected() {
        let worker = WorkerSession::new();
        assert!(matches!(
            worker.get_selected_input_variables(0),
            Err(NetOffError::UnknownSimId { sim_id: 0 })
        ));
        assert!(matches!(
            worker.get_input_value_container(0),
            Err(NetOffError::UnknownSimId { sim_id: 0 })
        ));
    }
}
