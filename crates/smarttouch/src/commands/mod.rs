//! Command dispatch: bridges CLI args -> control-plane requests -> output.

pub mod all;
pub mod brightness;
pub mod color_temp;
pub mod config_cmd;
pub mod devices;
pub mod power;
pub mod serve;
pub mod util;
pub mod watch;

use smarttouch_core::{ControlConfig, ControlPlane};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a network-bound command to its handler.
///
/// One-shot commands run against a control plane with polling disabled;
/// `watch` and `serve` own a long-running one.
pub async fn dispatch(
    cmd: Command,
    control: ControlConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(control, args, global).await,
        Command::Serve(args) => serve::handle(control, args).await,
        cmd => {
            ControlPlane::oneshot(control, |plane| async move {
                match cmd {
                    Command::Devices(args) => devices::handle(&plane, args, global).await,
                    Command::Power(args) => power::handle(&plane, args, global).await,
                    Command::Brightness(args) => brightness::handle(&plane, args, global).await,
                    Command::ColorTemp(args) => color_temp::handle(&plane, args, global).await,
                    Command::All(args) => all::handle(&plane, args, global).await,
                    // Handled before dispatch or above
                    Command::Watch(_)
                    | Command::Serve(_)
                    | Command::Config(_)
                    | Command::Completions(_) => unreachable!(),
                }
            })
            .await
        }
    }
}
