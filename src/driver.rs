//! # Driver State Machine (C7)
//!
//! Client side of the protocol: each public method here performs one
//! complete request/reply exchange before returning, so unlike
//! [`crate::worker::WorkerSession`] there is no request token to hold
//! between calls — `&mut self` already rules out two exchanges
//! overlapping.

use crate::codec::Cursor;
use crate::error::{NetOffError, Result};
use crate::message::{
    self, AddSimRequest, GetFileRequest, InitSimRequest, InitialServerTag, RunClientTag,
    RunServerTag, SuccessAddSim, SuccessGetFile,
};
use crate::transport::{Transport, TransportConfig};
use crate::value_container::ValueContainer;
use crate::variable_list::VariableList;
use tracing::debug;

/// Connection lifecycle: `NONE -> INITED -> STARTED -> NONE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    None,
    Inited,
    Started,
}

struct SimRecord {
    possible_inputs: VariableList,
    possible_outputs: VariableList,
    selected_inputs: Option<VariableList>,
    selected_outputs: Option<VariableList>,
    input_container: Option<ValueContainer>,
    output_container: Option<ValueContainer>,
}

/// Client-side half of the protocol: connects to one worker and drives
/// it through the init and run phases.
pub struct DriverSession {
    config: TransportConfig,
    state: DriverState,
    transport: Option<Transport>,
    sims: Vec<SimRecord>,
}

impl DriverSession {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            config: TransportConfig {
                host: host.into(),
                port,
                ..Default::default()
            },
            state: DriverState::None,
            transport: None,
            sims: Vec::new(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Connect to the worker, retrying per `self.config`.
    pub async fn initialize_connection(&mut self) -> Result<()> {
        let transport = Transport::connect(&self.config).await?;
        self.transport = Some(transport);
        self.state = DriverState::Inited;
        Ok(())
    }

    /// Send `CLIENT_INIT_ABORT` (if still in the init phase) or
    /// `CLIENT_ABORT` (if running), then close the connection.
    pub async fn deinitialize(&mut self) -> Result<()> {
        if let Some(transport) = self.transport.as_mut() {
            let result = match self.state {
                DriverState::Inited => {
                    transport
                        .send_variable(&message::encode_client_init_abort())
                        .await
                }
                DriverState::Started => {
                    let sim_id = 0i32;
                    let tail = self.control_frame_tail(sim_id, RunClientTag::ClientAbort.as_u8())?;
                    transport.send_exact(&sim_id.to_ne_bytes()).await?;
                    transport.send_exact(&tail).await
                }
                DriverState::None => Ok(()),
            };
            let _ = result;
            let _ = transport.close().await;
        }
        self.transport = None;
        self.state = DriverState::None;
        Ok(())
    }

    fn transport_mut(&mut self) -> Result<&mut Transport> {
        self.transport
            .as_mut()
            .ok_or_else(|| NetOffError::ProtocolState("not connected".to_string()))
    }

    fn sim(&self, sim_id: i32) -> Result<&SimRecord> {
        self.sims
            .get(sim_id as usize)
            .ok_or(NetOffError::UnknownSimId { sim_id })
    }

    fn sim_mut(&mut self, sim_id: i32) -> Result<&mut SimRecord> {
        self.sims
            .get_mut(sim_id as usize)
            .ok_or(NetOffError::UnknownSimId { sim_id })
    }

    /// Encode a control-message tail (time/arrays undefined) shaped by
    /// `sim_id`'s selected input list, since the worker reads
    /// `PAUSE`/`UNPAUSE`/`RESET` into that slot regardless of tag.
    fn control_frame_tail(&self, sim_id: i32, tag: u8) -> Result<Vec<u8>> {
        let slot = self
            .sim(sim_id)?
            .input_container
            .as_ref()
            .ok_or(NetOffError::UnknownSimId { sim_id })?;
        Ok(message::encode_run_tail(tag, slot))
    }

    /// Request a new simulation be registered under `path`, assigning
    /// it the next dense `sim_id`. Returns the possible input/output
    /// variable lists the worker reports as well as the assigned id.
    pub async fn add_simulation(
        &mut self,
        path: impl Into<String>,
    ) -> Result<(i32, VariableList, VariableList)> {
        if self.state != DriverState::Inited {
            return Err(NetOffError::ProtocolState(
                "ADD_SIM requires the connection to be initialized and not yet started"
                    .to_string(),
            ));
        }

        let sim_id = self.sims.len() as i32;
        let path = path.into();
        debug!("driver: ADD_SIM {} -> {}", sim_id, path);
        let request = AddSimRequest { sim_id, path };
        self.transport_mut()?
            .send_variable(&request.encode())
            .await?;

        let bytes = self.transport_mut()?.recv_variable().await?;
        let tag = InitialServerTag::from_u8(*bytes.first().ok_or_else(|| {
            NetOffError::Codec("empty initial-plane reply".to_string())
        })?)?;
        if tag != InitialServerTag::SuccessAddSim {
            return Err(NetOffError::ProtocolState(
                "expected SUCCESS_ADD_SIM".to_string(),
            ));
        }
        let mut cursor = Cursor::new(&bytes[1..]);
        let reply = SuccessAddSim::decode_body(&mut cursor)?;

        self.sims.push(SimRecord {
            possible_inputs: reply.possible_inputs.clone(),
            possible_outputs: reply.possible_outputs.clone(),
            selected_inputs: None,
            selected_outputs: None,
            input_container: None,
            output_container: None,
        });

        Ok((reply.sim_id, reply.possible_inputs, reply.possible_outputs))
    }

    pub fn get_possible_input_variables(&self, sim_id: i32) -> Result<&VariableList> {
        Ok(&self.sim(sim_id)?.possible_inputs)
    }

    pub fn get_possible_output_variables(&self, sim_id: i32) -> Result<&VariableList> {
        Ok(&self.sim(sim_id)?.possible_outputs)
    }

    /// Select `inputs`/`outputs` (each must be a subset of the
    /// simulation's possible lists), ship the initial input values as
    /// an ordinary `INPUTS` run-plane frame, and await `SUCCESS_SIM_INIT`
    /// carrying the initial outputs.
    pub async fn initialize_simulation(
        &mut self,
        sim_id: i32,
        inputs: VariableList,
        outputs: VariableList,
        initial_reals: &[f64],
        initial_ints: &[i32],
        initial_bools: &[u8],
    ) -> Result<()> {
        if self.state != DriverState::Inited {
            return Err(NetOffError::ProtocolState(
                "INIT_SIM requires the connection to be initialized and not yet started"
                    .to_string(),
            ));
        }
        {
            let sim = self.sim(sim_id)?;
            if !inputs.is_subset_of(&sim.possible_inputs) || !outputs.is_subset_of(&sim.possible_outputs)
            {
                return Err(NetOffError::ProtocolState(
                    "selected variables are not a subset of the possible variables".to_string(),
                ));
            }
        }

        let request = InitSimRequest {
            sim_id,
            inputs: inputs.clone(),
            outputs: outputs.clone(),
        };
        self.transport_mut()?
            .send_variable(&request.encode())
            .await?;

        let mut input_container = ValueContainer::new(sim_id, &inputs);
        input_container.set_reals(initial_reals)?;
        input_container.set_ints(initial_ints)?;
        input_container.set_bools(initial_bools)?;
        let tail = message::encode_run_tail(RunClientTag::Inputs.as_u8(), &input_container);
        let transport = self.transport_mut()?;
        transport.send_exact(&sim_id.to_ne_bytes()).await?;
        transport.send_exact(&tail).await?;

        let mut output_container = ValueContainer::new(sim_id, &outputs);
        let mut sim_id_buf = [0u8; 4];
        transport.recv_exact(&mut sim_id_buf).await?;
        let wire_sim_id = i32::from_ne_bytes(sim_id_buf);
        if wire_sim_id != sim_id {
            return Err(NetOffError::UnknownSimId { sim_id: wire_sim_id });
        }
        let frame_len = message::run_frame_tail_len(&output_container);
        let mut reply_tail = vec![0u8; frame_len];
        transport.recv_exact(&mut reply_tail).await?;
        let tag = message::decode_run_tail(&reply_tail, &mut output_container)?;
        if tag != RunServerTag::SuccessSimInit.as_u8() {
            return Err(NetOffError::ProtocolState(
                "expected SUCCESS_SIM_INIT".to_string(),
            ));
        }

        let sim = self.sim_mut(sim_id)?;
        sim.selected_inputs = Some(inputs);
        sim.selected_outputs = Some(outputs);
        sim.input_container = Some(input_container);
        sim.output_container = Some(output_container);
        Ok(())
    }

    /// Request the contents of `remote_path` from the worker's
    /// filesystem, returning the raw bytes.
    pub async fn get_file(&mut self, sim_id: i32, remote_path: impl Into<String>) -> Result<Vec<u8>> {
        if self.state != DriverState::Inited {
            return Err(NetOffError::ProtocolState(
                "GET_FILE requires the connection to be initialized and not yet started"
                    .to_string(),
            ));
        }
        let request = GetFileRequest {
            sim_id,
            path: remote_path.into(),
        };
        self.transport_mut()?
            .send_variable(&request.encode())
            .await?;

        let bytes = self.transport_mut()?.recv_variable().await?;
        let tag = InitialServerTag::from_u8(*bytes.first().ok_or_else(|| {
            NetOffError::Codec("empty initial-plane reply".to_string())
        })?)?;
        if tag != InitialServerTag::SuccessGetFile {
            return Err(NetOffError::ProtocolState(
                "expected SUCCESS_GET_FILE".to_string(),
            ));
        }
        let mut cursor = Cursor::new(&bytes[1..]);
        let reply = SuccessGetFile::decode_body(&mut cursor)?;
        Ok(reply.blob)
    }

    /// Request the worker transition every initialized simulation to
    /// `STARTED`.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != DriverState::Inited {
            return Err(NetOffError::ProtocolState(
                "START requires the connection to be initialized and not yet started".to_string(),
            ));
        }
        self.transport_mut()?
            .send_variable(&message::encode_start_request())
            .await?;
        let bytes = self.transport_mut()?.recv_variable().await?;
        let tag = InitialServerTag::from_u8(*bytes.first().ok_or_else(|| {
            NetOffError::Codec("empty initial-plane reply".to_string())
        })?)?;
        if tag != InitialServerTag::SuccessStart {
            return Err(NetOffError::ProtocolState(
                "expected SUCCESS_START".to_string(),
            ));
        }
        self.state = DriverState::Started;
        Ok(())
    }

    pub fn get_input_value_container(&self, sim_id: i32) -> Result<&ValueContainer> {
        self.sim(sim_id)?
            .input_container
            .as_ref()
            .ok_or(NetOffError::UnknownSimId { sim_id })
    }

    pub fn get_output_value_container(&self, sim_id: i32) -> Result<&ValueContainer> {
        self.sim(sim_id)?
            .output_container
            .as_ref()
            .ok_or(NetOffError::UnknownSimId { sim_id })
    }

    /// Send `inputs` (must match the simulation's bound input
    /// cardinality) as an `INPUTS` frame at `time`.
    pub async fn send_input_values(
        &mut self,
        sim_id: i32,
        time: f64,
        inputs: &ValueContainer,
    ) -> Result<()> {
        if self.state != DriverState::Started {
            return Err(NetOffError::ProtocolState(
                "the connection must be STARTED to exchange input/output values".to_string(),
            ));
        }
        {
            let slot = self
                .sim_mut(sim_id)?
                .input_container
                .as_mut()
                .ok_or(NetOffError::UnknownSimId { sim_id })?;
            slot.set_reals(inputs.reals())?;
            slot.set_ints(inputs.ints())?;
            slot.set_bools(inputs.bools())?;
            slot.set_time(time);
        }

        let slot = self.sim(sim_id)?.input_container.as_ref().unwrap();
        let tail = message::encode_run_tail(RunClientTag::Inputs.as_u8(), slot);
        let transport = self.transport_mut()?;
        transport.send_exact(&sim_id.to_ne_bytes()).await?;
        transport.send_exact(&tail).await?;
        Ok(())
    }

    /// Await the `OUTPUTS` reply for `sim_id`, returning a borrow of
    /// the refreshed output slot.
    pub async fn recv_output_values(&mut self, sim_id: i32) -> Result<&ValueContainer> {
        if self.state != DriverState::Started {
            return Err(NetOffError::ProtocolState(
                "the connection must be STARTED to exchange input/output values".to_string(),
            ));
        }

        let frame_len = message::run_frame_tail_len(
            self.sim(sim_id)?
                .output_container
                .as_ref()
                .ok_or(NetOffError::UnknownSimId { sim_id })?,
        );

        let mut sim_id_buf = [0u8; 4];
        self.transport_mut()?.recv_exact(&mut sim_id_buf).await?;
        let wire_sim_id = i32::from_ne_bytes(sim_id_buf);
        if wire_sim_id != sim_id {
            return Err(NetOffError::UnknownSimId { sim_id: wire_sim_id });
        }
        let mut tail = vec![0u8; frame_len];
        self.transport_mut()?.recv_exact(&mut tail).await?;

        let slot = self.sim_mut(sim_id)?.output_container.as_mut().unwrap();
        let tag = message::decode_run_tail(&tail, slot)?;
        if tag != RunServerTag::Outputs.as_u8() {
            return Err(NetOffError::ProtocolState("expected OUTPUTS".to_string()));
        }
        Ok(self.sim(sim_id)?.output_container.as_ref().unwrap())
    }

    async fn exchange_control_frame(&mut self, tag: u8, expect: RunServerTag) -> Result<()> {
        if self.state != DriverState::Started {
            return Err(NetOffError::ProtocolState(
                "the connection must be STARTED to pause, unpause, or reset".to_string(),
            ));
        }
        let sim_id = 0i32;
        let request_tail = self.control_frame_tail(sim_id, tag)?;
        {
            let transport = self.transport_mut()?;
            transport.send_exact(&sim_id.to_ne_bytes()).await?;
            transport.send_exact(&request_tail).await?;
        }

        let frame_len = message::run_frame_tail_len(
            self.sim(sim_id)?
                .output_container
                .as_ref()
                .ok_or(NetOffError::UnknownSimId { sim_id })?,
        );
        let mut sim_id_buf = [0u8; 4];
        self.transport_mut()?.recv_exact(&mut sim_id_buf).await?;
        let mut reply_tail = vec![0u8; frame_len];
        self.transport_mut()?.recv_exact(&mut reply_tail).await?;
        let reply_slot = self.sim_mut(sim_id)?.output_container.as_mut().unwrap();
        let reply_tag = message::decode_run_tail(&reply_tail, reply_slot)?;
        if reply_tag != expect.as_u8() {
            return Err(NetOffError::ProtocolState(format!(
                "expected {:?} reply",
                expect
            )));
        }
        Ok(())
    }

    pub async fn pause(&mut self) -> Result<()> {
        self.exchange_control_frame(RunClientTag::Pause.as_u8(), RunServerTag::SuccessPause)
            .await
    }

    pub async fn unpause(&mut self) -> Result<()> {
        self.exchange_control_frame(RunClientTag::Unpause.as_u8(), RunServerTag::SuccessUnpause)
            .await
    }

    /// Request the worker reset its simulations. The session stays
    /// `STARTED` afterward: reset preserves restart capability rather
    /// than tearing the session down.
    pub async fn reset(&mut self) -> Result<()> {
        self.exchange_control_frame(RunClientTag::Reset.as_u8(), RunServerTag::SuccessReset)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_sim_before_connecting_is_rejected() {
        let mut driver = DriverSession::new("127.0.0.1", 0);
        let err = driver.add_simulation("a.sim").await.unwrap_err();
        assert!(matches!(err, NetOffError::ProtocolState(_)));
    }

    #[tokio::test]
    async fn send_input_values_before_start_is_rejected() {
        let mut driver = DriverSession::new("127.0.0.1", 0);
        let container = ValueContainer::new(0, &VariableList::new());
        let err = driver
            .send_input_values(0, 0.0, &container)
            .await
            .unwrap_err();
        assert!(matches!(err, NetOffError::ProtocolState(_)));
    }

    #[test]
    fn unknown_sim_id_accessors_are_rejected() {
        let driver = DriverSession::new("127.0.0.1", 0);
        assert!(matches!(
            driver.get_output_value_container(0),
            Err(NetOffError::UnknownSimId { sim_id: 0 })
        ));
    }
}
