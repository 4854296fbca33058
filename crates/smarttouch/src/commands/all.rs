//! Bulk commands. Every device is commanded in parallel; failures are
//! reported per device and never abort the rest.

use tabled::Tabled;

use smarttouch_core::{
    ControlEvent, ControlPlane, PowerAction, SetAllOutcome, ToggleOutcome, UiRequest,
};

use crate::cli::{AllArgs, AllCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct ToggleRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "Error")]
    error: String,
}

#[derive(Tabled)]
struct SetAllRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Color Temp")]
    color_temp: &'static str,
    #[tabled(rename = "Brightness")]
    brightness: &'static str,
}

fn mark(ok: bool) -> &'static str {
    if ok { "ok" } else { "failed" }
}

pub async fn handle(
    plane: &ControlPlane,
    args: AllArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        AllCommand::On => toggle(plane, PowerAction::On, global).await,
        AllCommand::Off => toggle(plane, PowerAction::Off, global).await,
        AllCommand::Toggle => {
            let action = plane.registry().summarize().bulk_action();
            toggle(plane, action, global).await
        }
        AllCommand::Set { brightness, kelvin } => {
            let avg = plane.registry().average_settings();
            let brightness = brightness.unwrap_or_else(|| i64::from(avg.brightness));
            let kelvin = kelvin.unwrap_or_else(|| i64::from(avg.color_temperature));
            set_all(plane, kelvin, brightness, global).await
        }
    }
}

async fn toggle(
    plane: &ControlPlane,
    action: PowerAction,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let total = plane.registry().len();
    let pb = util::spinner(format!("Turning {total} devices {action}"), global.quiet);
    let event = plane
        .execute(UiRequest::ToggleAll {
            action,
            devices: Vec::new(),
        })
        .await;
    pb.finish_and_clear();
    let event = util::expect_success(event?)?;

    let ControlEvent::AllToggled { results, .. } = event else {
        return Ok(());
    };

    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        &results,
        |r: &ToggleOutcome| ToggleRow {
            device: r.device.to_string(),
            result: mark(r.success).into(),
            power: r
                .new_state
                .map(|s| output::power_label(s, color))
                .unwrap_or_default(),
            error: r.error.clone().unwrap_or_default(),
        },
        |r| format!("{} {}", r.device, mark(r.success)),
    )?;
    output::print_output(&out, global.quiet);

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        return Err(CliError::PartialFailure {
            failed,
            total: results.len(),
        });
    }
    Ok(())
}

async fn set_all(
    plane: &ControlPlane,
    kelvin: i64,
    brightness: i64,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let pb = util::spinner(
        format!("Applying {brightness}% at {kelvin}K to every device"),
        global.quiet,
    );
    let event = plane
        .execute(UiRequest::SetAll {
            color_temperature: kelvin,
            brightness,
        })
        .await;
    pb.finish_and_clear();
    let event = util::expect_success(event?)?;

    let ControlEvent::AllDevicesSet(report) = event else {
        return Ok(());
    };

    let out = output::render_single(
        global.output,
        &report,
        |r| {
            let rows: Vec<SetAllRow> = r
                .results
                .iter()
                .map(|o: &SetAllOutcome| SetAllRow {
                    device: o.device.to_string(),
                    color_temp: mark(o.color_temp_success),
                    brightness: mark(o.brightness_success),
                })
                .collect();
            format!(
                "{}\nColor temperature {}K applied to {}/{}, brightness {}% to {}/{}",
                tabled::Table::new(rows).with(tabled::settings::Style::rounded()),
                r.color_temperature,
                r.color_temp_successes,
                r.total,
                r.brightness,
                r.brightness_successes,
                r.total,
            )
        },
        |r| format!("{}/{}", r.brightness_successes, r.total),
    )?;
    output::print_output(&out, global.quiet);

    // Devices without colour temperature skip that command, so only
    // brightness is expected everywhere.
    if report.brightness_successes < report.total {
        return Err(CliError::PartialFailure {
            failed: report.total - report.brightness_successes,
            total: report.total,
        });
    }
    Ok(())
}
