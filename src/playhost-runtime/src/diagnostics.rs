//! Diagnostics records submitted by plugins and the sinks that receive them.

use playhost_core::DiagnosticsSinkKind;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Health reported by a plugin, a display or the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Ok,
    Warning,
    Error,
}

/// Aggregate of several sensor readings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Measure {
    pub min: f64,
    pub average: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
    Standby,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Hdmi,
    Dvi,
    Vga,
    DisplayPort,
    Composite,
    #[default]
    Other,
}

/// State of one physical or virtual display.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplayState {
    pub id: String,
    /// View id in the matching display layout.
    pub display_layout_view: i32,
    pub state: State,
    pub aspect_ratio: Option<String>,
    pub vendor: Option<String>,
    pub orientation: Orientation,
    pub power_state: PowerState,
    pub temperature: Option<Measure>,
    pub input: InputType,
    pub input_number: Option<u32>,
    pub model: Option<String>,
    /// Inches.
    pub diagonal_size: Option<u32>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemDiagnosticsState {
    pub state: State,
    pub message: Option<String>,
    pub computer_name: Option<String>,
    pub os_info: Option<String>,
    pub temperature_measure: Option<Measure>,
}

/// Display states forwarded by [`DisplayControlService::report_diagnostics`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplayDiagnosticsReport {
    pub physical: Vec<DisplayState>,
    #[serde(rename = "virtual")]
    pub virtual_displays: Vec<DisplayState>,
    pub extra: Vec<DisplayState>,
}

impl DisplayDiagnosticsReport {
    pub fn is_empty(&self) -> bool {
        self.physical.is_empty() && self.virtual_displays.is_empty() && self.extra.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to encode diagnostics: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("diagnostics sink unavailable: {0}")]
    Unavailable(String),
}

/// Downstream destination for diagnostics, e.g. a monitoring channel.
pub trait DiagnosticsSink: Send + Sync {
    fn display_diagnostics(&self, plugin: &str, report: &DisplayDiagnosticsReport) -> Result<(), SinkError>;

    fn system_diagnostics(&self, plugin: &str, state: &SystemDiagnosticsState) -> Result<(), SinkError>;
}

/// Writes every report as a JSON field on a log line.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn display_diagnostics(&self, plugin: &str, report: &DisplayDiagnosticsReport) -> Result<(), SinkError> {
        let json = serde_json::to_string(report)?;
        tracing::info!(plugin, report = %json, "Display diagnostics");
        Ok(())
    }

    fn system_diagnostics(&self, plugin: &str, state: &SystemDiagnosticsState) -> Result<(), SinkError> {
        let json = serde_json::to_string(state)?;
        tracing::info!(plugin, state = %json, "System diagnostics");
        Ok(())
    }
}

/// A report as retained by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticsRecord {
    Display {
        plugin: String,
        report: DisplayDiagnosticsReport,
    },
    System {
        plugin: String,
        state: SystemDiagnosticsState,
    },
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<DiagnosticsRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DiagnosticsRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }
}

impl DiagnosticsSink for MemorySink {
    fn display_diagnostics(&self, plugin: &str, report: &DisplayDiagnosticsReport) -> Result<(), SinkError> {
        self.records.lock().unwrap().push(DiagnosticsRecord::Display {
            plugin: plugin.to_string(),
            report: report.clone(),
        });
        Ok(())
    }

    fn system_diagnostics(&self, plugin: &str, state: &SystemDiagnosticsState) -> Result<(), SinkError> {
        self.records.lock().unwrap().push(DiagnosticsRecord::System {
            plugin: plugin.to_string(),
            state: state.clone(),
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn display_diagnostics(&self, _: &str, _: &DisplayDiagnosticsReport) -> Result<(), SinkError> {
        Ok(())
    }

    fn system_diagnostics(&self, _: &str, _: &SystemDiagnosticsState) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Build the sink named in configuration.
pub fn sink_for(kind: DiagnosticsSinkKind) -> Arc<dyn DiagnosticsSink> {
    match kind {
        DiagnosticsSinkKind::Log => Arc::new(TracingSink),
        DiagnosticsSinkKind::Memory => Arc::new(MemorySink::new()),
        DiagnosticsSinkKind::None => Arc::new(NullSink),
    }
}

/// Accepts display-level diagnostics.
pub struct DisplayControlService {
    sink: Arc<dyn DiagnosticsSink>,
}

impl DisplayControlService {
    pub fn new(sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self { sink }
    }

    /// Forward display states unmodified. `None` is treated as an empty list.
    ///
    /// Best effort: sink failures are logged, never returned.
    pub fn report_diagnostics(
        &self,
        physical: Option<Vec<DisplayState>>,
        virtual_displays: Option<Vec<DisplayState>>,
        extra: Option<Vec<DisplayState>>,
    ) {
        let report = DisplayDiagnosticsReport {
            physical: physical.unwrap_or_default(),
            virtual_displays: virtual_displays.unwrap_or_default(),
            extra: extra.unwrap_or_default(),
        };
        let plugin = reporting_plugin();
        if let Err(err) = self.sink.display_diagnostics(&plugin, &report) {
            tracing::warn!(%plugin, error = %err, "Dropping display diagnostics");
        }
    }
}

/// Accepts system-level diagnostics.
pub struct SystemDiagnosticsService {
    sink: Arc<dyn DiagnosticsSink>,
}

impl SystemDiagnosticsService {
    pub fn new(sink: Arc<dyn DiagnosticsSink>) -> Self {
        Self { sink }
    }

    /// Best effort: sink failures are logged, never returned.
    pub fn report_diagnostics(&self, state: SystemDiagnosticsState) {
        let plugin = reporting_plugin();
        if let Err(err) = self.sink.system_diagnostics(&plugin, &state) {
            tracing::warn!(%plugin, error = %err, "Dropping system diagnostics");
        }
    }
}

thread_local! {
    static REPORTING_PLUGIN: std::cell::RefCell<Option<String>> = const { std::cell::RefCell::new(None) };
}

/// Puts the previous attribution back when dropped, including on unwind.
struct RestoreReporter(Option<String>);

impl Drop for RestoreReporter {
    fn drop(&mut self) {
        let previous = self.0.take();
        REPORTING_PLUGIN.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Attribute reports made while `f` runs to `plugin`.
pub(crate) fn with_reporting_plugin<T>(plugin: &str, f: impl FnOnce() -> T) -> T {
    let _restore =
        RestoreReporter(REPORTING_PLUGIN.with(|slot| slot.replace(Some(plugin.to_string()))));
    f()
}

fn reporting_plugin() -> String {
    REPORTING_PLUGIN
        .with(|slot| slot.borrow().clone())
        .unwrap_or_else(|| "host".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    impl DiagnosticsSink for FailingSink {
        fn display_diagnostics(&self, _: &str, _: &DisplayDiagnosticsReport) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("offline".into()))
        }

        fn system_diagnostics(&self, _: &str, _: &SystemDiagnosticsState) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("offline".into()))
        }
    }

    #[test]
    fn absent_lists_forward_an_empty_report() {
        let sink = Arc::new(MemorySink::new());
        let service = DisplayControlService::new(sink.clone());
        service.report_diagnostics(Some(Vec::new()), None, None);

        match sink.records().as_slice() {
            [DiagnosticsRecord::Display { plugin, report }] => {
                assert_eq!(plugin, "host");
                assert!(report.is_empty());
            }
            other => panic!("unexpected records: {other:?}"),
        }
    }

    #[test]
    fn reports_are_forwarded_unmodified() {
        let sink = Arc::new(MemorySink::new());
        let service = SystemDiagnosticsService::new(sink.clone());
        let state = SystemDiagnosticsState {
            state: State::Warning,
            message: Some("hot".into()),
            computer_name: Some("kiosk-7".into()),
            os_info: None,
            temperature_measure: Some(Measure {
                min: 45.0,
                average: 50.0,
                max: 80.0,
            }),
        };
        with_reporting_plugin("diag", || service.report_diagnostics(state.clone()));

        assert_eq!(
            sink.records(),
            vec![DiagnosticsRecord::System {
                plugin: "diag".into(),
                state
            }]
        );
    }

    #[test]
    fn attribution_is_restored_after_a_panic() {
        let sink = Arc::new(MemorySink::new());
        let service = SystemDiagnosticsService::new(sink.clone());
        let outcome = std::panic::catch_unwind(|| {
            with_reporting_plugin::<()>("crashes", || panic!("check blew up"))
        });
        assert!(outcome.is_err());

        service.report_diagnostics(SystemDiagnosticsState::default());
        match sink.records().as_slice() {
            [DiagnosticsRecord::System { plugin, .. }] => assert_eq!(plugin, "host"),
            other => panic!("unexpected records: {other:?}"),
        }
    }

    #[test]
    fn sink_failures_are_swallowed() {
        let sink: Arc<dyn DiagnosticsSink> = Arc::new(FailingSink);
        DisplayControlService::new(sink.clone()).report_diagnostics(None, None, None);
        SystemDiagnosticsService::new(sink).report_diagnostics(SystemDiagnosticsState::default());
    }

    #[test]
    fn report_serializes_with_virtual_key() {
        let report = DisplayDiagnosticsReport {
            virtual_displays: vec![DisplayState {
                id: "Virtual display 1".into(),
                display_layout_view: 1,
                input: InputType::Hdmi,
                ..DisplayState::default()
            }],
            ..DisplayDiagnosticsReport::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["virtual"][0]["id"], "Virtual display 1");
        assert_eq!(json["virtual"][0]["input"], "hdmi");
        assert_eq!(json["physical"].as_array().map(Vec::len), Some(0));
    }
}
