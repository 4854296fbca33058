use smarttouch_core::{ControlEvent, ControlPlane, UiRequest};

use crate::cli::{ColorTempArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

/// Validated against the device's discovered range, or 2000-9000K when
/// discovery reported none.
pub async fn handle(
    plane: &ControlPlane,
    args: ColorTempArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let device = util::resolve_device(plane, &args.device)?;

    let event = plane
        .execute(UiRequest::SetColorTemperature {
            id: device.id.clone(),
            model: device.model.clone(),
            kelvin: args.kelvin,
            range: None,
        })
        .await?;
    let event = util::expect_success(event)?;

    let out = output::render_single(
        global.output,
        &event,
        |e| match e {
            ControlEvent::DeviceStateUpdated { fields, .. } => fields
                .color_temperature
                .map(|k| format!("{} ({}) color temperature set to {k}K", device.name, device.id))
                .unwrap_or_default(),
            _ => String::new(),
        },
        |_| device.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
