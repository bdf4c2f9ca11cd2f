//! Example plugin touching every host service: timers, commands, data
//! values, layouts, app settings and diagnostics reporting.

use playhost_runtime::{
    CommandService, DisplayControlService, DisplayLayout, DisplayLayoutChanged,
    DisplayLayoutService, DisplayState, HostResult, InputType, Measure, Orientation, PlayerPlugin,
    PluginCommand, PluginContext, PluginLogLevel, PowerState, ReceiveDataService, ServiceHandle,
    Settings, State, SystemDiagnosticsService, SystemDiagnosticsState, SystemInformationService,
    TimerService,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const INTERVAL_SETTING: &str = "intervalSeconds";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
pub struct DiagnosticsExample {
    interval: Mutex<Option<Duration>>,
}

impl DiagnosticsExample {
    pub const NAME: &'static str = "Diagnostics example";

    pub fn new() -> Self {
        Self::default()
    }

    /// Timer interval picked during `initialize`.
    pub fn interval(&self) -> Option<Duration> {
        *self.interval.lock().unwrap()
    }
}

/// Read the timer interval; bad values are logged and replaced by the default.
fn parse_interval(ctx: &PluginContext, settings: &Settings) -> Duration {
    let Some(raw) = settings.get(INTERVAL_SETTING) else {
        return DEFAULT_INTERVAL;
    };
    match raw.trim().parse::<i64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs.unsigned_abs()),
        Ok(_) => {
            ctx.log(
                PluginLogLevel::Error,
                format!("{INTERVAL_SETTING} must be positive, got {raw}"),
            );
            DEFAULT_INTERVAL
        }
        Err(_) => {
            ctx.log(
                PluginLogLevel::Error,
                format!("Failed to parse {INTERVAL_SETTING} from {raw}"),
            );
            DEFAULT_INTERVAL
        }
    }
}

fn log_layout(ctx: &PluginContext, title: &str, layout: Option<&Arc<DisplayLayout>>) {
    match layout {
        None => ctx.log(PluginLogLevel::Information, format!("{title} no layout")),
        Some(layout) if layout.views.is_empty() => {
            ctx.log(PluginLogLevel::Information, format!("{title} no views"))
        }
        Some(layout) => {
            ctx.log(PluginLogLevel::Information, title);
            for (id, view) in &layout.views {
                ctx.log(
                    PluginLogLevel::Information,
                    format!(
                        "  view {id} x {} y {} w {} h {}",
                        view.x, view.y, view.width, view.height
                    ),
                );
            }
        }
    }
}

fn log_layouts(ctx: &PluginContext, layouts: &DisplayLayoutChanged) {
    log_layout(ctx, "Display heads layout", layouts.display_heads.as_ref());
    log_layout(ctx, "Virtual display layout", layouts.virtual_display.as_ref());
    log_layout(ctx, "Physical display layout", layouts.physical.as_ref());
}

fn execute_command(ctx: &PluginContext, command: PluginCommand) {
    ctx.log(
        PluginLogLevel::Information,
        format!("Command {}={} intercepted", command.key(), command.value()),
    );
    command.report_progress(0.5, "Plugin command executing");
    command.return_result("OK");
}

fn display(id: &str, view: i32, vendor: &str, model: &str, message: &str) -> DisplayState {
    DisplayState {
        id: id.into(),
        display_layout_view: view,
        state: State::Ok,
        aspect_ratio: Some("16:9".into()),
        vendor: Some(vendor.into()),
        orientation: Orientation::Landscape,
        power_state: PowerState::On,
        temperature: Some(Measure {
            min: 35.0,
            average: 40.0,
            max: 50.0,
        }),
        input: InputType::Hdmi,
        input_number: u32::try_from(view).ok(),
        model: Some(model.into()),
        diagonal_size: None,
        message: Some(message.into()),
    }
}

fn physical_displays() -> Vec<DisplayState> {
    (1..=2)
        .map(|idx| DisplayState {
            diagonal_size: Some(65),
            ..display(
                &format!("Physical display {idx}"),
                idx,
                "My screen",
                "My screen model",
                "Screen is working fine",
            )
        })
        .collect()
}

fn virtual_displays() -> Vec<DisplayState> {
    (1..=2)
        .map(|idx| {
            display(
                &format!("Virtual display {idx}"),
                idx,
                "My view",
                "My virtual model",
                "Virtual display is working fine",
            )
        })
        .collect()
}

fn on_timer(
    ctx: &PluginContext,
    system: &ServiceHandle<SystemDiagnosticsService>,
    displays: &ServiceHandle<DisplayControlService>,
) {
    ctx.set_state(State::Ok, "Timer callback");

    ctx.log(PluginLogLevel::Information, "An information log message");
    ctx.log(PluginLogLevel::Warning, "A warning log message");
    ctx.log(PluginLogLevel::Error, "An error log message");

    system.report_diagnostics(SystemDiagnosticsState {
        state: State::Warning,
        message: Some("Warning message from plugin diagnostics service".into()),
        computer_name: Some("This computer".into()),
        os_info: Some("Operating system information".into()),
        temperature_measure: Some(Measure {
            min: 45.0,
            average: 50.0,
            max: 80.0,
        }),
    });
    displays.report_diagnostics(Some(physical_displays()), Some(virtual_displays()), None);
}

impl PlayerPlugin for DiagnosticsExample {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn vendor(&self) -> &str {
        "INSM"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn documentation(&self) -> String {
        "Example plugin demonstrates a few features in the Instoremedia Plugin API".into()
    }

    fn initialize(&self, ctx: &PluginContext, settings: &Settings) -> HostResult<bool> {
        let interval = parse_interval(ctx, settings);
        *self.interval.lock().unwrap() = Some(interval);
        tracing::debug!(plugin = Self::NAME, ?interval, "Diagnostics interval selected");

        let system_diagnostics = ctx.service::<SystemDiagnosticsService>()?;
        let display_control = ctx.service::<DisplayControlService>()?;
        ctx.service::<TimerService>()?
            .request_repeating_callback(interval, move |ctx| {
                on_timer(ctx, &system_diagnostics, &display_control)
            })?;

        ctx.service::<CommandService>()?
            .register_callback(execute_command)?;

        ctx.service::<ReceiveDataService>()?
            .on_values_changed(|ctx, event| {
                let received: String = event
                    .changed
                    .iter()
                    .map(|(key, value)| format!("{key}={value} "))
                    .collect();
                ctx.log(PluginLogLevel::Information, format!("Received data {received}"));
            })?;

        let layouts = ctx.service::<DisplayLayoutService>()?;
        layouts.on_display_layout_changed(|ctx, event| {
            ctx.log(PluginLogLevel::Information, "Display layouts changed");
            log_layouts(ctx, event);
        })?;
        log_layouts(ctx, &layouts.snapshot());

        let system = ctx.service::<SystemInformationService>()?;
        system.on_app_settings_changed(|ctx, event| {
            for (key, value) in &event.changed {
                ctx.log(
                    PluginLogLevel::Information,
                    format!("AppSetting changed {key}={value}"),
                );
            }
        })?;
        ctx.log(
            PluginLogLevel::Information,
            format!("System version {}", system.version()),
        );
        ctx.log(
            PluginLogLevel::Information,
            format!("System type {}", system.system_type()),
        );
        ctx.log(
            PluginLogLevel::Information,
            format!(
                "AppSetting: fileCache={}",
                system.app_setting("fileCache").unwrap_or_default()
            ),
        );

        ctx.set_state(State::Ok, "Up and running");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_display_states() {
        let physical = physical_displays();
        assert_eq!(physical.len(), 2);
        assert_eq!(physical[1].id, "Physical display 2");
        assert_eq!(physical[1].input_number, Some(2));
        assert_eq!(physical[0].diagonal_size, Some(65));

        let virtual_displays = virtual_displays();
        assert_eq!(virtual_displays[0].vendor.as_deref(), Some("My view"));
        assert_eq!(virtual_displays[0].diagonal_size, None);
    }

    #[test]
    fn interval_unknown_before_initialize() {
        let plugin = DiagnosticsExample::new();
        assert_eq!(plugin.interval(), None);
        assert!(plugin.default_settings().is_empty());
        assert!(plugin.check());
    }
}
