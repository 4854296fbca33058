//! `smarttouch serve`: the host bus over stdio.
//!
//! Each stdin line is one `UiRequest`; each stdout line is one
//! `ControlEvent`. Malformed lines are logged and skipped. Ctrl-C, or
//! stdin EOF followed by a quiet bus, shuts the control plane down.

use std::io;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use smarttouch_core::{ControlConfig, ControlEvent, ControlPlane, UiRequest};

use crate::cli::ServeArgs;
use crate::error::CliError;
use crate::output;

pub async fn handle(control: ControlConfig, args: ServeArgs) -> Result<(), CliError> {
    let plane = ControlPlane::new(control)?;

    // Subscribing first forwards the startup discovery to the host.
    let early = (!args.no_initial).then(|| plane.events());
    plane.start().await?;
    let events = early.unwrap_or_else(|| plane.events());
    info!(devices = plane.registry().len(), "serving host bus on stdio");

    let result = run(&plane, events).await;
    plane.shutdown().await;
    result
}

async fn run(
    plane: &ControlPlane,
    mut events: broadcast::Receiver<ControlEvent>,
) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    // After stdin closes, in-flight results are still forwarded until the
    // bus has been quiet for one request timeout.
    let grace = plane.config().timeout;
    let mut draining: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => return Ok(()),

            event = events.recv() => match event {
                Ok(event) => {
                    output::write_json_line(&mut io::stdout().lock(), &event)?;
                    if draining.is_some() {
                        draining = Some(Instant::now() + grace);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "host is not keeping up; events dropped");
                }
                Err(RecvError::Closed) => return Ok(()),
            },

            () = sleep_until_some(draining) => {
                info!("host closed stdin");
                return Ok(());
            }

            line = lines.next_line(), if draining.is_none() => match line? {
                Some(line) => {
                    if let Some(request) = parse_request(&line) {
                        debug!(request = request.name(), "request from host");
                        plane.submit(request).await?;
                    }
                }
                None => draining = Some(Instant::now() + grace),
            },
        }
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn parse_request(line: &str) -> Option<UiRequest> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(request) => Some(request),
        Err(e) => {
            warn!(error = %e, line, "skipping malformed request");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use smarttouch_core::DeviceId;

    use super::*;

    #[test]
    fn request_lines() {
        assert_eq!(
            parse_request(r#" {"request":"SetBrightness","payload":{"id":"aa","model":"H6159","value":40}} "#),
            Some(UiRequest::SetBrightness {
                id: DeviceId::new("AA"),
                model: "H6159".into(),
                value: 40,
            })
        );
        assert_eq!(parse_request(""), None);
        assert_eq!(parse_request("{not json"), None);
        assert_eq!(parse_request(r#"{"request":"Explode"}"#), None);
    }
}
