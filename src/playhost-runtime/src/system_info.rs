//! Player version, system type and app settings.

use crate::context::{PluginContext, ServiceHandle};
use crate::data::merge_changes;
use crate::error::HostResult;
use crate::event_bus::{EventBus, SubscriptionHandle};
use playhost_core::SystemConfig;
use std::collections::BTreeMap;
use std::sync::Mutex;

pub const APP_SETTINGS_CHANGED: &str = "app-settings-changed";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppSettingsChanged {
    pub changed: BTreeMap<String, String>,
}

/// Read-only system metadata plus app settings that can change at runtime.
pub struct SystemInformationService {
    version: String,
    system_type: String,
    app_settings: Mutex<BTreeMap<String, String>>,
    bus: EventBus<AppSettingsChanged>,
}

impl SystemInformationService {
    pub fn new(version: impl Into<String>, system_type: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            system_type: system_type.into(),
            app_settings: Mutex::new(BTreeMap::new()),
            bus: EventBus::new(),
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        let service = Self::new(&config.version, &config.system_type);
        *service.app_settings.lock().unwrap() = config.app_settings.clone();
        service
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn system_type(&self) -> &str {
        &self.system_type
    }

    /// `None` for unknown keys.
    pub fn app_setting(&self, key: &str) -> Option<String> {
        self.app_settings.lock().unwrap().get(key).cloned()
    }

    pub fn app_settings(&self) -> BTreeMap<String, String> {
        self.app_settings.lock().unwrap().clone()
    }

    /// Admin-side update; subscribers see only the settings that changed.
    pub fn update_app_settings(&self, updates: BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut settings = self.app_settings.lock().unwrap();
        let changed = merge_changes(&mut settings, updates);
        if !changed.is_empty() {
            tracing::info!(keys = ?changed.keys().collect::<Vec<_>>(), "App settings changed");
            self.bus.publish(
                APP_SETTINGS_CHANGED,
                &AppSettingsChanged {
                    changed: changed.clone(),
                },
            );
        }
        changed
    }
}

impl ServiceHandle<SystemInformationService> {
    pub fn on_app_settings_changed<F>(&self, handler: F) -> HostResult<SubscriptionHandle>
    where
        F: Fn(&PluginContext, &AppSettingsChanged) + Send + Sync + 'static,
    {
        self.subscribe(&self.service().bus, APP_SETTINGS_CHANGED, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn seeded_from_config() {
        let config = SystemConfig {
            version: "4.2".into(),
            system_type: "kiosk".into(),
            app_settings: BTreeMap::from([("fileCache".into(), "/cache".into())]),
        };
        let service = SystemInformationService::from_config(&config);
        assert_eq!(service.version(), "4.2");
        assert_eq!(service.system_type(), "kiosk");
        assert_eq!(service.app_setting("fileCache").as_deref(), Some("/cache"));
        assert_eq!(service.app_setting("nope"), None);
    }

    #[test]
    fn update_publishes_changed_subset() {
        let service = SystemInformationService::new("1.0", "player");
        service.update_app_settings(BTreeMap::from([("a".into(), "1".into())]));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        service
            .bus
            .subscribe(APP_SETTINGS_CHANGED, move |event: &AppSettingsChanged| {
                sink.lock().unwrap().push(event.changed.clone())
            });

        let changed = service.update_app_settings(BTreeMap::from([
            ("a".into(), "1".into()),
            ("b".into(), "2".into()),
        ]));
        service.update_app_settings(BTreeMap::from([("b".into(), "2".into())]));

        assert_eq!(changed, BTreeMap::from([("b".to_string(), "2".to_string())]));
        assert_eq!(*seen.lock().unwrap(), vec![changed]);
    }
}
