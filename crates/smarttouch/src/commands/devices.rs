use std::sync::Arc;

use tabled::Tabled;

use smarttouch_core::{ControlEvent, ControlPlane, Device, Feature, UiRequest};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "Brightness")]
    brightness: String,
    #[tabled(rename = "Color Temp")]
    color_temp: String,
}

fn row(d: &Arc<Device>, color: bool) -> DeviceRow {
    DeviceRow {
        id: d.id.to_string(),
        name: d.name.clone(),
        model: d.model.clone(),
        power: output::power_label(d.power_state, color),
        brightness: format!("{}%", d.brightness),
        color_temp: kelvin_label(d),
    }
}

fn kelvin_label(d: &Device) -> String {
    if !d.advertises(Feature::ColorTemperature) {
        return "n/a".into();
    }
    d.color_temperature
        .map_or_else(|| "-".into(), |k| format!("{k}K"))
}

fn detail(d: &Arc<Device>) -> String {
    let features = d
        .features
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ");
    let range = d.effective_color_temp_range();
    [
        format!("ID:           {}", d.id),
        format!("Name:         {}", d.name),
        format!("Model:        {}", d.model),
        format!("Power:        {}", d.power_state),
        format!("Brightness:   {}%", d.brightness),
        format!("Color Temp:   {}", kelvin_label(d)),
        format!("Range:        {}K-{}K", range.min, range.max),
        format!("Controllable: {}", d.controllable),
        format!("Retrievable:  {}", d.retrievable),
        format!(
            "Features:     {}",
            if features.is_empty() { "(not reported)" } else { features.as_str() }
        ),
    ]
    .join("\n")
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(
    plane: &ControlPlane,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);

    match args.command {
        DevicesCommand::List => {
            let snap = plane.devices_snapshot();
            let out = output::render_list(
                global.output,
                &snap,
                |d| row(d, color),
                |d| d.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Get { device } => {
            let d = util::resolve_device(plane, &device)?;
            let out = output::render_single(global.output, &d, detail, |d| d.id.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::State { device } => {
            let d = util::resolve_device(plane, &device)?;
            let event = plane
                .execute(UiRequest::RequestFreshState {
                    id: d.id.clone(),
                    model: d.model.clone(),
                })
                .await?;
            let event = util::expect_success(event)?;
            if let ControlEvent::DeviceFreshState { ref state, .. } = event {
                tracing::debug!(device = %d.id, ?state, "fresh state applied");
            }

            // The registry now holds the merged live state.
            let fresh = plane.registry().get(&d.id).unwrap_or(d);
            let out = output::render_single(global.output, &fresh, detail, |d| d.id.to_string())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
