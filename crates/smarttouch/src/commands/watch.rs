//! `smarttouch watch`: a headless touch panel.
//!
//! Runs the control plane with a View Synchronizer and prints every view
//! patch as a JSON line. Gestures can be typed on stdin, one per line:
//!
//! ```text
//! open <device>            close
//! grab <control>           input <control> <value>
//! commit <control> <value> power
//! toggle <device>          all
//! ```

use std::io;
use std::str::FromStr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tracing::{info, warn};

use smarttouch_core::{
    Control, ControlConfig, ControlEvent, ControlPlane, Reaction, ViewPatch, ViewSynchronizer,
};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Gestures ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Gesture {
    Open(String),
    Close,
    Grab(Control),
    Input(Control, i64),
    Commit(Control, i64),
    Power,
    Toggle(String),
    All,
}

fn parse_control(raw: &str) -> Result<Control, String> {
    match raw.to_ascii_lowercase().as_str() {
        "brightness" | "b" => Ok(Control::Brightness),
        "color-temp" | "color_temperature" | "ct" | "kelvin" => Ok(Control::ColorTemperature),
        other => Err(format!("unknown control '{other}'")),
    }
}

fn parse_value(raw: Option<&str>) -> Result<i64, String> {
    let raw = raw.ok_or("missing value")?;
    raw.parse().map_err(|_| format!("'{raw}' is not a number"))
}

impl FromStr for Gesture {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or("empty line")?;
        let rest = || line.trim_start()[verb.len()..].trim().to_owned();

        let gesture = match verb {
            "open" => Self::Open(rest()),
            "close" => Self::Close,
            "grab" => Self::Grab(parse_control(words.next().ok_or("missing control")?)?),
            "input" | "commit" => {
                let control = parse_control(words.next().ok_or("missing control")?)?;
                let value = parse_value(words.next())?;
                if verb == "input" {
                    Self::Input(control, value)
                } else {
                    Self::Commit(control, value)
                }
            }
            "power" => Self::Power,
            "toggle" => Self::Toggle(rest()),
            "all" => Self::All,
            other => return Err(format!("unknown gesture '{other}'")),
        };

        match gesture {
            Self::Open(ref d) | Self::Toggle(ref d) if d.is_empty() => Err("missing device".into()),
            g => Ok(g),
        }
    }
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(
    mut control: ControlConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(p) = args.presentation {
        control.presentation = p.into();
    }

    let plane = ControlPlane::new(control)?;
    plane.start().await?;
    // Subscribed after startup discovery; the initial list is emitted below.
    let events = plane.events();

    let mut sync = ViewSynchronizer::new(
        Arc::clone(plane.registry()),
        Arc::clone(plane.capabilities()),
        plane.config(),
    );
    info!(devices = plane.registry().len(), mode = %sync.mode(), "watching");

    let result = run(&plane, &mut sync, events, args.device.as_deref(), global.quiet).await;
    plane.shutdown().await;
    result
}

async fn run(
    plane: &ControlPlane,
    sync: &mut ViewSynchronizer,
    mut events: broadcast::Receiver<ControlEvent>,
    device: Option<&str>,
    quiet: bool,
) -> Result<(), CliError> {
    emit(&sync.rebuild_list(), quiet)?;

    if let Some(needle) = device {
        let device = util::resolve_device(plane, needle)?;
        let reaction = sync.open(&device.id)?;
        react(plane, reaction, quiet).await?;
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let deadline = sync.next_deadline();
        tokio::select! {
            _ = &mut ctrl_c => return Ok(()),

            event = events.recv() => match event {
                Ok(event) => emit(&sync.apply(&event), quiet)?,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event stream lagged, rebuilding the list");
                    emit(&sync.rebuild_list(), quiet)?;
                }
                Err(RecvError::Closed) => return Ok(()),
            },

            () = wait_until(deadline) => emit(&sync.tick(), quiet)?,

            line = stdin.next_line(), if stdin_open => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match line.parse::<Gesture>() {
                    Ok(gesture) => {
                        if let Err(e) = perform(plane, sync, gesture, quiet).await {
                            warn!(error = %e, "gesture failed");
                        }
                    }
                    Err(reason) => warn!(%reason, %line, "ignoring input"),
                },
                None => stdin_open = false,
            },
        }
    }
}

async fn perform(
    plane: &ControlPlane,
    sync: &mut ViewSynchronizer,
    gesture: Gesture,
    quiet: bool,
) -> Result<(), CliError> {
    match gesture {
        Gesture::Open(needle) => {
            let device = util::resolve_device(plane, &needle)?;
            let reaction = sync.open(&device.id)?;
            react(plane, reaction, quiet).await
        }
        Gesture::Close => emit(&sync.close(), quiet),
        Gesture::Grab(control) => {
            if !sync.begin_interaction(control) {
                warn!(%control, "control is not available");
            }
            Ok(())
        }
        Gesture::Input(control, value) => emit(&sync.input(control, value), quiet),
        Gesture::Commit(control, value) => react(plane, sync.commit(control, value), quiet).await,
        Gesture::Power => react(plane, sync.toggle_power(), quiet).await,
        Gesture::Toggle(needle) => {
            let device = util::resolve_device(plane, &needle)?;
            let reaction = sync.toggle_device(&device.id)?;
            react(plane, reaction, quiet).await
        }
        Gesture::All => Ok(plane.submit(sync.toggle_all_request()).await?),
    }
}

/// Print the patches, then queue the request. Its result comes back as
/// an event.
async fn react(plane: &ControlPlane, reaction: Reaction, quiet: bool) -> Result<(), CliError> {
    emit(&reaction.patches, quiet)?;
    if let Some(request) = reaction.request {
        plane.submit(request).await?;
    }
    Ok(())
}

fn emit(patches: &[ViewPatch], quiet: bool) -> Result<(), CliError> {
    if quiet {
        return Ok(());
    }
    let mut out = io::stdout().lock();
    for patch in patches {
        output::write_json_line(&mut out, patch)?;
    }
    Ok(())
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
