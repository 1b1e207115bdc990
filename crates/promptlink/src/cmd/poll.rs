use std::time::Instant;

use promptlink_session::connect_with_config;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::cmd::{parse_duration, parse_optional_duration, runtime, PollArgs};
use crate::config::LinkArgs;
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_response, OutputFormat, ResponseRecord};

/// Poll until Ctrl-C or `--count` responses.
///
/// Failed polls are logged and skipped; the session keeps reconnecting in
/// the background, so a device that comes back is picked up on a later tick.
pub fn run(args: PollArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let timeout = parse_optional_duration(args.timeout.as_deref())?;
    let (serial, config) = link.resolve()?;
    let port = serial.port.clone();

    runtime()?.block_on(async move {
        let session = connect_with_config(serial, config)
            .map_err(|err| session_error("invalid configuration", err))?;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut answered = 0usize;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    break;
                }
                _ = ticker.tick() => {}
            }

            if !session.state().is_connected() {
                warn!(port = %port, state = %session.state(), "skipping poll, link not ready");
                continue;
            }

            let started = Instant::now();
            let result = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    break;
                }
                result = session.execute(&args.command, timeout) => result,
            };
            match result {
                Ok(response) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    print_response(
                        &ResponseRecord::new(&port, &args.command, &response, elapsed_ms),
                        format,
                    );
                    answered += 1;
                    if args.count.is_some_and(|count| answered >= count) {
                        break;
                    }
                }
                Err(err) => warn!(port = %port, error = %err, "poll failed"),
            }
        }

        session.shutdown().await;
        Ok(SUCCESS)
    })
}
