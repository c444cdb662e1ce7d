//! Demo driver: couples to one worker's simulation, steps it a fixed
//! number of times, pauses and unpauses once in the middle, then
//! disconnects.

use clap::Parser;
use netoff::cli::DriverArgs;
use netoff::driver::DriverSession;
use netoff::variable_list::VariableList;
use tracing::info;

#[tokio::main]
async fn main() -> netoff::Result<()> {
    let args = DriverArgs::parse();
    let _log_guard = netoff::logging::init(args.log_file.as_deref(), args.quiet, args.verbose);

    let mut driver = DriverSession::new(args.host.clone(), args.port);

    info!("connecting to {}:{}", args.host, args.port);
    driver.initialize_connection().await?;

    let (sim_id, possible_inputs, possible_outputs) =
        driver.add_simulation(args.sim_path.clone()).await?;
    info!("ADD_SIM {sim_id} -> {} (possible inputs: {possible_inputs}, possible outputs: {possible_outputs})", args.sim_path);

    let mut inputs = VariableList::new();
    inputs.add_real("x");
    let mut outputs = VariableList::new();
    outputs.add_real("y");

    driver
        .initialize_simulation(sim_id, inputs, outputs, &[1.0], &[], &[])
        .await?;
    let y0 = driver.get_output_value_container(sim_id)?.reals()[0];
    info!("INIT_SIM complete, initial y={y0}");

    let contents = driver.get_file(sim_id, "model.txt").await?;
    info!("GET_FILE returned {} bytes", contents.len());

    driver.start().await?;
    info!("STARTED, stepping {} times", args.steps);

    let mut input_snapshot = driver.get_input_value_container(sim_id)?.clone();
    for step in 0..args.steps {
        let t = step as f64;
        input_snapshot.reals_mut()[0] = 1.0 + step as f64;
        driver.send_input_values(sim_id, t, &input_snapshot).await?;
        let outputs = driver.recv_output_values(sim_id).await?;
        info!("t={t} -> y={}", outputs.reals()[0]);

        if step == args.steps / 2 {
            driver.pause().await?;
            driver.unpause().await?;
        }
    }

    driver.reset().await?;
    info!("reset acknowledged");

    driver.deinitialize().await?;
    info!("disconnected");
    Ok(())
}
