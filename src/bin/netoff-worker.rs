//! Demo worker: hosts a single trivial simulation (`y = 2 * x`) and
//! waits for one driver to couple to it, run it, and disconnect.

use clap::Parser;
use netoff::cli::WorkerArgs;
use netoff::message::{InitialClientTag, RunClientTag};
use netoff::variable_list::VariableList;
use netoff::worker::WorkerSession;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> netoff::Result<()> {
    let args = WorkerArgs::parse();
    let _log_guard = netoff::logging::init(args.log_file.as_deref(), args.quiet, args.verbose);

    let mut worker = WorkerSession::new();
    worker.set_port(args.port);

    info!("waiting for a driver on {}:{}", args.host, args.port);
    worker.initialize_connection().await?;
    info!("driver connected");

    loop {
        match worker.get_initial_client_request().await? {
            InitialClientTag::AddSim => {
                let (path, sim_id) = worker.get_added_simulation()?;
                info!("ADD_SIM {sim_id} -> {path}");
                let mut possible_inputs = VariableList::new();
                possible_inputs.add_real("x");
                let mut possible_outputs = VariableList::new();
                possible_outputs.add_real("y");
                worker
                    .confirm_simulation_add(sim_id, possible_inputs, possible_outputs)
                    .await?;
            }
            InitialClientTag::InitSim => {
                let sim_id = worker.get_last_sim_id();
                let x0 = worker.get_input_value_container(sim_id)?.reals()[0];
                let mut initial_outputs =
                    netoff::ValueContainer::new(sim_id, &worker.get_selected_output_variables(sim_id)?);
                initial_outputs.set_reals(&[2.0 * x0])?;
                info!("INIT_SIM {sim_id}, initial x={x0}");
                worker.confirm_simulation_init(sim_id, &initial_outputs).await?;
            }
            InitialClientTag::GetFile => {
                let sim_id = worker.get_last_sim_id();
                let path = worker.get_simulation_file_name().to_string();
                info!("GET_FILE {sim_id} -> {path}");
                worker
                    .confirm_simulation_file(sim_id, format!("# model at {path}\n").into_bytes())
                    .await?;
            }
            InitialClientTag::Start => {
                info!("START");
                worker.confirm_start().await?;
                break;
            }
            InitialClientTag::ClientInitAbort => {
                warn!("driver aborted during init");
                return Ok(());
            }
        }
    }

    loop {
        match worker.get_client_request().await? {
            RunClientTag::Inputs => {
                let sim_id = worker.get_last_sim_id();
                let x = worker.recv_input_values(sim_id)?.reals()[0];
                let time = worker.get_last_received_time(sim_id)?;
                {
                    let outputs = worker.get_output_value_container_mut(sim_id)?;
                    outputs.reals_mut()[0] = 2.0 * x;
                }
                worker.send_output_values(sim_id, time).await?;
            }
            RunClientTag::Pause => {
                info!("PAUSE");
                worker.confirm_pause().await?;
            }
            RunClientTag::Unpause => {
                info!("UNPAUSE");
                worker.confirm_unpause().await?;
            }
            RunClientTag::Reset => {
                info!("RESET");
                worker.confirm_reset().await?;
            }
            RunClientTag::ClientAbort => {
                info!("driver disconnected");
                break;
            }
        }
    }

    worker.deinitialize().await?;
    Ok(())
}
