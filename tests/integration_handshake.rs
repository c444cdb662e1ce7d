//! End-to-end coupling scenarios driven over real loopback TCP
//! connections, one worker task paired with one driver (or a raw
//! transport, for scenarios that need to send malformed/adversarial
//! sequences `DriverSession` itself would never construct) in the test
//! body.

use netoff::driver::DriverSession;
use netoff::error::NetOffError;
use netoff::message::{AddSimRequest, InitialClientTag, RunClientTag};
use netoff::transport::{Transport, TransportConfig};
use netoff::value_container::ValueContainer;
use netoff::variable_list::VariableList;
use netoff::worker::WorkerSession;
use std::time::Duration;

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn raw_config(port: u16) -> TransportConfig {
    TransportConfig {
        host: "127.0.0.1".to_string(),
        port,
        ..Default::default()
    }
}

fn echo_worker(port: u16) -> tokio::task::JoinHandle<netoff::Result<()>> {
    tokio::spawn(async move {
        let mut worker = WorkerSession::new();
        worker.set_port(port);
        worker.initialize_connection().await?;

        loop {
            match worker.get_initial_client_request().await? {
                InitialClientTag::AddSim => {
                    let (_path, sim_id) = worker.get_added_simulation()?;
                    let mut inputs = VariableList::new();
                    inputs.add_real("x");
                    let mut outputs = VariableList::new();
                    outputs.add_real("y");
                    worker.confirm_simulation_add(sim_id, inputs, outputs).await?;
                }
                InitialClientTag::InitSim => {
                    let sim_id = worker.get_last_sim_id();
                    let x0 = worker.get_input_value_container(sim_id)?.reals()[0];
                    let mut initial_outputs = ValueContainer::new(
                        sim_id,
                        &worker.get_selected_output_variables(sim_id)?,
                    );
                    initial_outputs.set_reals(&[2.0 * x0])?;
                    worker.confirm_simulation_init(sim_id, &initial_outputs).await?;
                }
                InitialClientTag::GetFile => {
                    let sim_id = worker.get_last_sim_id();
                    worker
                        .confirm_simulation_file(sim_id, b"model contents".to_vec())
                        .await?;
                }
                InitialClientTag::Start => {
                    worker.confirm_start().await?;
                    break;
                }
                InitialClientTag::ClientInitAbort => return Ok(()),
            }
        }

        loop {
            match worker.get_client_request().await? {
                RunClientTag::Inputs => {
                    let sim_id = worker.get_last_sim_id();
                    let x = worker.recv_input_values(sim_id)?.reals()[0];
                    let time = worker.get_last_received_time(sim_id)?;
                    worker.get_output_value_container_mut(sim_id)?.reals_mut()[0] = 2.0 * x;
                    worker.send_output_values(sim_id, time).await?;
                }
                RunClientTag::Pause => worker.confirm_pause().await?,
                RunClientTag::Unpause => worker.confirm_unpause().await?,
                RunClientTag::Reset => worker.confirm_reset().await?,
                RunClientTag::ClientAbort => break,
            }
        }

        worker.deinitialize().await?;
        Ok(())
    })
}

#[tokio::test]
async fn full_coupling_round_trip() {
    let port = 19901;
    let worker = echo_worker(port);
    settle().await;

    let mut driver = DriverSession::new("127.0.0.1", port);
    driver.initialize_connection().await.unwrap();

    let (sim_id, possible_inputs, possible_outputs) =
        driver.add_simulation("demo.sim").await.unwrap();
    assert_eq!(sim_id, 0);
    assert_eq!(possible_inputs.reals(), ["x"]);
    assert_eq!(possible_outputs.reals(), ["y"]);

    let mut inputs = VariableList::new();
    inputs.add_real("x");
    let mut outputs = VariableList::new();
    outputs.add_real("y");
    driver
        .initialize_simulation(sim_id, inputs, outputs, &[3.0], &[], &[])
        .await
        .unwrap();
    assert_eq!(driver.get_output_value_container(sim_id).unwrap().reals()[0], 6.0);

    let blob = driver.get_file(sim_id, "model.txt").await.unwrap();
    assert_eq!(blob, b"model contents");

    driver.start().await.unwrap();

    let mut step_inputs = driver.get_input_value_container(sim_id).unwrap().clone();
    for step in 0..4u32 {
        step_inputs.reals_mut()[0] = step as f64;
        driver
            .send_input_values(sim_id, step as f64, &step_inputs)
            .await
            .unwrap();
        let out = driver.recv_output_values(sim_id).await.unwrap();
        assert_eq!(out.reals()[0], 2.0 * step as f64);
    }

    driver.pause().await.unwrap();
    driver.unpause().await.unwrap();
    driver.reset().await.unwrap();

    driver.deinitialize().await.unwrap();
    worker.await.unwrap().unwrap();
}

/// `ADD_SIM` with a path already registered must fail with
/// `DuplicatePath` and leave the session able to add a *different*
/// path right afterward — the rejected request must not have mutated
/// anything.
#[tokio::test]
async fn duplicate_add_sim_is_rejected_without_mutating_the_session() {
    let port = 19902;
    let mut worker = WorkerSession::new();
    worker.set_port(port);
    let accept = tokio::spawn(async move {
        worker.initialize_connection().await.unwrap();
        worker
    });
    settle().await;

    let mut client = Transport::connect(&raw_config(port)).await.unwrap();
    let mut worker = accept.await.unwrap();

    let first = AddSimRequest {
        sim_id: 0,
        path: "same.sim".to_string(),
    };
    client.send_variable(&first.encode()).await.unwrap();
    let tag = worker.get_initial_client_request().await.unwrap();
    assert_eq!(tag, InitialClientTag::AddSim);
    let (_path, sim_id) = worker.get_added_simulation().unwrap();
    worker
        .confirm_simulation_add(sim_id, VariableList::new(), VariableList::new())
        .await
        .unwrap();
    client.recv_variable().await.unwrap();

    let dup = AddSimRequest {
        sim_id: 1,
        path: "same.sim".to_string(),
    };
    client.send_variable(&dup.encode()).await.unwrap();
    let err = worker.get_initial_client_request().await.unwrap_err();
    assert!(matches!(err, NetOffError::DuplicatePath { path } if path == "same.sim"));

    let fresh = AddSimRequest {
        sim_id: 1,
        path: "other.sim".to_string(),
    };
    client.send_variable(&fresh.encode()).await.unwrap();
    let tag = worker.get_initial_client_request().await.unwrap();
    assert_eq!(tag, InitialClientTag::AddSim);
    let (path, sim_id) = worker.get_added_simulation().unwrap();
    assert_eq!((path.as_str(), sim_id), ("other.sim", 1));
}

/// Confirming an `ADD_SIM` with a `sim_id` that does not match the
/// outstanding request must fail rather than silently confirming the
/// wrong simulation.
#[tokio::test]
async fn confirm_with_mismatched_sim_id_is_rejected() {
    let port = 19903;
    let mut worker = WorkerSession::new();
    worker.set_port(port);
    let accept = tokio::spawn(async move {
        worker.initialize_connection().await.unwrap();
        worker
    });
    settle().await;

    let mut client = Transport::connect(&raw_config(port)).await.unwrap();
    let mut worker = accept.await.unwrap();

    let req = AddSimRequest {
        sim_id: 0,
        path: "a.sim".to_string(),
    };
    client.send_variable(&req.encode()).await.unwrap();
    worker.get_initial_client_request().await.unwrap();

    let err = worker
        .confirm_simulation_add(99, VariableList::new(), VariableList::new())
        .await
        .unwrap_err();
    assert!(matches!(err, NetOffError::ProtocolState(_)));
}

/// A second `get_initial_client_request` call before the first has been
/// confirmed must fail instead of silently overwriting the outstanding
/// request.
#[tokio::test]
async fn request_before_prior_confirm_is_rejected() {
    let port = 19905;
    let mut worker = WorkerSession::new();
    worker.set_port(port);
    let accept = tokio::spawn(async move {
        worker.initialize_connection().await.unwrap();
        worker
    });
    settle().await;

    let mut client = Transport::connect(&raw_config(port)).await.unwrap();
    let mut worker = accept.await.unwrap();

    let req = AddSimRequest {
        sim_id: 0,
        path: "a.sim".to_string(),
    };
    client.send_variable(&req.encode()).await.unwrap();
    worker.get_initial_client_request().await.unwrap();

    let err = worker.get_initial_client_request().await.unwrap_err();
    assert!(matches!(err, NetOffError::ProtocolState(_)));
}

#[tokio::test]
async fn unknown_sim_id_on_driver_accessors_is_rejected() {
    let driver = DriverSession::new("127.0.0.1", 0);
    let err = driver.get_possible_input_variables(0).unwrap_err();
    assert!(matches!(err, NetOffError::UnknownSimId { sim_id: 0 }));
}
