use smarttouch_core::{ControlEvent, ControlPlane, PowerState, UiRequest};

use crate::cli::{GlobalOpts, PowerArg, PowerArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    plane: &ControlPlane,
    args: PowerArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let device = util::resolve_device(plane, &args.device)?;

    // SetPower flips `current_state`, so an explicit target is sent as
    // its opposite.
    let current_state = match args.state {
        PowerArg::On => PowerState::Off,
        PowerArg::Off => PowerState::On,
        PowerArg::Toggle => device.power_state,
    };

    let event = plane
        .execute(UiRequest::SetPower {
            id: device.id.clone(),
            model: device.model.clone(),
            current_state,
        })
        .await?;
    let event = util::expect_success(event)?;

    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &event,
        |e| match e {
            ControlEvent::DeviceToggled { new_state, .. } => format!(
                "{} ({}) is now {}",
                device.name,
                device.id,
                output::power_label(*new_state, color)
            ),
            _ => String::new(),
        },
        |_| device.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
