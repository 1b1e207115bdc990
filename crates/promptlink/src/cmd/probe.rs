use std::time::Instant;

use promptlink_session::connect_with_config;

use crate::cmd::send::wait_ready;
use crate::cmd::{parse_duration, runtime, ProbeArgs};
use crate::config::LinkArgs;
use crate::exit::{session_error, CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{print_probe, OutputFormat, ProbeRecord};

pub fn run(args: ProbeArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let (serial, config) = link.resolve()?;
    let port = serial.port.clone();

    runtime()?.block_on(async move {
        let started = Instant::now();
        let session = connect_with_config(serial, config)
            .map_err(|err| session_error("invalid configuration", err))?;
        let ready = wait_ready(&session, connect_timeout).await;
        session.shutdown().await;

        let record = ProbeRecord {
            port: &port,
            synchronized: ready.is_ok(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        print_probe(&record, format);
        match ready {
            Ok(()) => Ok(SUCCESS),
            Err(err) => {
                tracing::warn!(port = %port, error = %err, "probe failed");
                Ok(HEALTH_CHECK_FAILED)
            }
        }
    })
}
