use playhost_runtime::{
    CommandService, DiagnosticsRecord, DisplayControlService, DisplayLayout, DisplayLayoutService,
    DisplayLayoutView, HostError, HostResult, LayoutKind, MemorySink, PlayerPlugin, PluginContext,
    PluginHost, PluginStatus, ReceiveDataService, Settings, SystemInformationService, TimerHandle,
    TimerService,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Setup = Box<dyn Fn(&PluginContext, &Recorder) -> HostResult<bool> + Send + Sync>;

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn push(&self, line: impl Into<String>) {
        self.0.lock().unwrap().push(line.into());
    }

    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct Scripted {
    name: String,
    recorder: Recorder,
    setup: Setup,
}

impl Scripted {
    fn new<F>(name: &str, setup: F) -> (Arc<Self>, Recorder)
    where
        F: Fn(&PluginContext, &Recorder) -> HostResult<bool> + Send + Sync + 'static,
    {
        let recorder = Recorder::default();
        let plugin = Arc::new(Self {
            name: name.to_string(),
            recorder: recorder.clone(),
            setup: Box::new(setup),
        });
        (plugin, recorder)
    }
}

impl PlayerPlugin for Scripted {
    fn name(&self) -> &str {
        &self.name
    }

    fn vendor(&self) -> &str {
        "Tests"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn documentation(&self) -> String {
        format!("scripted plugin {}", self.name)
    }

    fn initialize(&self, ctx: &PluginContext, _settings: &Settings) -> HostResult<bool> {
        (self.setup)(ctx, &self.recorder)
    }
}

fn manual_host() -> PluginHost {
    PluginHost::builder().manual_clock().build().unwrap()
}

fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn ping_command_reports_progress_then_result() {
    let host = manual_host();
    let (plugin, recorder) = Scripted::new("commands", |ctx, recorder| {
        let recorder = recorder.clone();
        ctx.service::<CommandService>()?
            .register_callback(move |_ctx, command| {
                recorder.push(format!("{}={}", command.key(), command.value()));
                command.report_progress(0.5, "working");
                command.return_result("OK");
            })?;
        Ok(true)
    });
    host.load(plugin).unwrap();

    let report = host.dispatch_command("ping", "1").unwrap();
    assert_eq!(report.progress.len(), 1);
    assert_eq!(report.progress[0].fraction, 0.5);
    assert_eq!(report.progress[0].message, "working");
    assert_eq!(report.result, "OK");
    assert_eq!(recorder.lines(), vec!["ping=1"]);
}

#[test]
fn second_command_handler_fails_its_plugin() {
    let host = manual_host();
    let register = |ctx: &PluginContext, _: &Recorder| -> HostResult<bool> {
        ctx.service::<CommandService>()?
            .register_callback(|_, command| {
                command.return_result("OK");
            })?;
        Ok(true)
    };
    host.load(Scripted::new("first", register).0).unwrap();
    let err = host.load(Scripted::new("second", register).0).unwrap_err();

    assert!(err.to_string().contains("first"));
    assert!(matches!(host.status("second"), PluginStatus::Failed { .. }));
    assert_eq!(host.status("first"), PluginStatus::Running);
}

#[test]
fn unloading_the_handler_owner_frees_the_command_slot() {
    let host = manual_host();
    let (plugin, _) = Scripted::new("owner", |ctx, _| {
        ctx.service::<CommandService>()?
            .register_callback(|_, command| {
                command.return_result("OK");
            })?;
        Ok(true)
    });
    host.load(plugin).unwrap();
    host.unload("owner").unwrap();

    let commands = host.service::<CommandService>().unwrap();
    assert_eq!(commands.handler_owner(), None);
    assert!(matches!(
        host.dispatch_command("ping", "1"),
        Err(HostError::NoCommandHandler)
    ));
}

#[test]
fn plugins_receive_only_changed_values() {
    let host = manual_host();
    let (plugin, recorder) = Scripted::new("values", |ctx, recorder| {
        let recorder = recorder.clone();
        ctx.service::<ReceiveDataService>()?
            .on_values_changed(move |_ctx, event| {
                for (key, value) in &event.changed {
                    recorder.push(format!("{key}={value}"));
                }
            })?;
        Ok(true)
    });
    host.load(plugin).unwrap();

    let data = host.service::<ReceiveDataService>().unwrap();
    data.set_values(values(&[("a", "1"), ("b", "2")]));
    data.set_values(values(&[("a", "1"), ("b", "3")]));
    data.set_values(values(&[("a", "1")]));
    host.flush();

    assert_eq!(recorder.lines(), vec!["a=1", "b=2", "b=3"]);
}

#[test]
fn layout_events_carry_the_full_triple() {
    let host = manual_host();
    let (plugin, recorder) = Scripted::new("layouts", |ctx, recorder| {
        let recorder = recorder.clone();
        ctx.service::<DisplayLayoutService>()?
            .on_display_layout_changed(move |_ctx, event| {
                recorder.push(format!(
                    "physical={:?} virtual={:?}",
                    event.physical.as_ref().map(|l| l.views.len()),
                    event.virtual_display.as_ref().map(|l| l.views.len()),
                ));
            })?;
        Ok(true)
    });
    host.load(plugin).unwrap();

    let view = DisplayLayoutView {
        x: 0,
        y: 0,
        width: 1920,
        height: 1080,
    };
    let layouts = host.service::<DisplayLayoutService>().unwrap();
    layouts.set_layout(
        LayoutKind::Physical,
        DisplayLayout::new().with_view(1, view).with_view(2, view),
    );
    layouts.set_layout(LayoutKind::Virtual, DisplayLayout::new().with_view(1, view));
    host.flush();

    assert_eq!(
        recorder.lines(),
        vec![
            "physical=Some(2) virtual=None",
            "physical=Some(2) virtual=Some(1)"
        ]
    );
}

#[test]
fn app_setting_changes_reach_plugins() {
    let host = manual_host();
    let (plugin, recorder) = Scripted::new("settings", |ctx, recorder| {
        let system = ctx.service::<SystemInformationService>()?;
        recorder.push(format!("fileCache={:?}", system.app_setting("fileCache")));
        let recorder = recorder.clone();
        system.on_app_settings_changed(move |_ctx, event| {
            recorder.push(format!("changed={:?}", event.changed.keys().collect::<Vec<_>>()));
        })?;
        Ok(true)
    });
    host.load(plugin).unwrap();

    host.service::<SystemInformationService>()
        .unwrap()
        .update_app_settings(values(&[("fileCache", "/var/cache")]));
    host.flush();

    assert_eq!(
        recorder.lines(),
        vec!["fileCache=None", "changed=[\"fileCache\"]"]
    );
}

#[test]
fn empty_display_report_is_attributed_to_the_plugin() {
    let sink = Arc::new(MemorySink::new());
    let host = PluginHost::builder()
        .manual_clock()
        .diagnostics_sink(sink.clone())
        .build()
        .unwrap();
    let (plugin, _) = Scripted::new("reporter", |ctx, _| {
        ctx.service::<DisplayControlService>()?
            .report_diagnostics(Some(Vec::new()), None, Some(Vec::new()));
        Ok(true)
    });
    host.load(plugin).unwrap();

    match sink.records().as_slice() {
        [DiagnosticsRecord::Display { plugin, report }] => {
            assert_eq!(plugin, "reporter");
            assert!(report.is_empty());
        }
        other => panic!("unexpected records: {other:?}"),
    }
}

#[test]
fn cancelling_inside_a_firing_stops_further_firings() {
    let host = manual_host();
    let (plugin, recorder) = Scripted::new("self-cancel", |ctx, recorder| {
        let slot: Arc<Mutex<Option<TimerHandle>>> = Arc::default();
        let inner = slot.clone();
        let recorder = recorder.clone();
        let handle = ctx.service::<TimerService>()?.request_repeating_callback(
            Duration::from_secs(1),
            move |_ctx| {
                recorder.push("tick");
                if let Some(handle) = inner.lock().unwrap().as_ref() {
                    handle.cancel();
                }
            },
        )?;
        *slot.lock().unwrap() = Some(handle);
        Ok(true)
    });
    host.load(plugin).unwrap();

    host.advance_clock(Duration::from_secs(1)).unwrap();
    host.advance_clock(Duration::from_secs(5)).unwrap();

    assert_eq!(recorder.lines(), vec!["tick"]);
}

#[test]
fn plugin_timers_run_on_the_dispatcher_until_unload() {
    let host = manual_host();
    let (plugin, recorder) = Scripted::new("ticker", |ctx, recorder| {
        let recorder = recorder.clone();
        ctx.service::<TimerService>()?
            .request_repeating_callback(Duration::from_secs(1), move |_ctx| {
                let thread = std::thread::current();
                recorder.push(thread.name().unwrap_or("?"));
            })?;
        Ok(true)
    });
    host.load(plugin).unwrap();

    host.advance_clock(Duration::from_secs(2)).unwrap();
    host.unload("ticker").unwrap();
    host.advance_clock(Duration::from_secs(2)).unwrap();

    assert_eq!(
        recorder.lines(),
        vec!["playhost-dispatch", "playhost-dispatch"]
    );
}

#[test]
fn failed_plugin_receives_no_callbacks() {
    let host = manual_host();
    let (plugin, recorder) = Scripted::new("gives-up", |ctx, recorder| {
        let recorder = recorder.clone();
        ctx.service::<TimerService>()?
            .request_repeating_callback(Duration::from_secs(1), move |_ctx| recorder.push("tick"))?;
        Ok(false)
    });
    assert!(matches!(
        host.load(plugin),
        Err(HostError::InitializationFailed { .. })
    ));

    host.advance_clock(Duration::from_secs(3)).unwrap();
    assert!(recorder.lines().is_empty());
    assert_eq!(host.service::<TimerService>().unwrap().pending(), 0);
}

#[test]
fn real_time_timer_fires_on_the_dispatcher() {
    let host = PluginHost::new().unwrap();
    let (plugin, recorder) = Scripted::new("realtime", |ctx, recorder| {
        let recorder = recorder.clone();
        ctx.service::<TimerService>()?
            .request_one_shot_callback(Duration::from_millis(20), move |ctx| {
                let thread = std::thread::current();
                recorder.push(format!("{} on {}", ctx.name(), thread.name().unwrap_or("?")));
            })?;
        Ok(true)
    });
    host.load(plugin).unwrap();

    std::thread::sleep(Duration::from_millis(300));
    host.flush();
    assert_eq!(recorder.lines(), vec!["realtime on playhost-dispatch"]);
}
