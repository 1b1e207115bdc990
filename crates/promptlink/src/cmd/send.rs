use std::time::{Duration, Instant};

use promptlink_session::{connect_with_config, Session, SessionError};
use tracing::debug;

use crate::cmd::{parse_duration, parse_optional_duration, runtime, SendArgs};
use crate::config::LinkArgs;
use crate::exit::{session_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_response, OutputFormat, ResponseRecord};

pub fn run(args: SendArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let timeout = parse_optional_duration(args.timeout.as_deref())?;
    let (serial, config) = link.resolve()?;
    let port = serial.port.clone();

    runtime()?.block_on(async move {
        let session = connect_with_config(serial, config)
            .map_err(|err| session_error("invalid configuration", err))?;
        let result = exchange(&session, &args.command, connect_timeout, timeout).await;
        session.shutdown().await;

        let (response, elapsed_ms) = result?;
        print_response(
            &ResponseRecord::new(&port, &args.command, &response, elapsed_ms),
            format,
        );
        Ok(SUCCESS)
    })
}

/// Wait for the link, then run one command. Returns the response and the
/// command's round-trip time in milliseconds.
async fn exchange(
    session: &Session,
    command: &str,
    connect_timeout: Duration,
    timeout: Option<Duration>,
) -> CliResult<(String, u64)> {
    wait_ready(session, connect_timeout).await?;

    let started = Instant::now();
    let response = session
        .execute(command, timeout)
        .await
        .map_err(|err| session_error("command failed", err))?;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    debug!(command, elapsed_ms, "command completed");
    Ok((response, elapsed_ms))
}

pub(crate) async fn wait_ready(
    session: &Session,
    connect_timeout: Duration,
) -> CliResult<()> {
    match session.wait_connected(connect_timeout).await {
        Ok(()) => Ok(()),
        Err(SessionError::NotConnected) => Err(CliError::new(
            TIMEOUT,
            format!(
                "{} did not synchronize within {} ms",
                session.name(),
                connect_timeout.as_millis()
            ),
        )),
        Err(err) => Err(session_error("connect failed", err)),
    }
}
