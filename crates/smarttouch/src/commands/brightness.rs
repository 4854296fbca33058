use smarttouch_core::{ControlEvent, ControlPlane, UiRequest};

use crate::cli::{BrightnessArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    plane: &ControlPlane,
    args: BrightnessArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let device = util::resolve_device(plane, &args.device)?;

    let event = plane
        .execute(UiRequest::SetBrightness {
            id: device.id.clone(),
            model: device.model.clone(),
            value: args.value,
        })
        .await?;
    let event = util::expect_success(event)?;

    let out = output::render_single(
        global.output,
        &event,
        |e| match e {
            ControlEvent::DeviceStateUpdated { fields, .. } => fields
                .brightness
                .map(|b| format!("{} ({}) brightness set to {b}%", device.name, device.id))
                .unwrap_or_default(),
            _ => String::new(),
        },
        |_| device.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
