//! Capability registry: exactly one live service per capability.

use crate::command::CommandService;
use crate::data::ReceiveDataService;
use crate::diagnostics::{DisplayControlService, SystemDiagnosticsService};
use crate::error::{HostError, HostResult};
use crate::layout::DisplayLayoutService;
use crate::system_info::SystemInformationService;
use crate::timer::TimerService;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Services a host can offer to plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Timer,
    Command,
    ReceiveData,
    SystemInformation,
    DisplayLayout,
    DisplayControl,
    SystemDiagnostics,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::Timer,
        Capability::Command,
        Capability::ReceiveData,
        Capability::SystemInformation,
        Capability::DisplayLayout,
        Capability::DisplayControl,
        Capability::SystemDiagnostics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Timer => "timer",
            Capability::Command => "command",
            Capability::ReceiveData => "receive-data",
            Capability::SystemInformation => "system-information",
            Capability::DisplayLayout => "display-layout",
            Capability::DisplayControl => "display-control",
            Capability::SystemDiagnostics => "system-diagnostics",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|capability| capability.as_str() == s)
            .ok_or_else(|| HostError::invalid(format!("unknown service capability '{s}'")))
    }
}

/// A service type that can be looked up by capability.
pub trait Service: Send + Sync + 'static {
    const CAPABILITY: Capability;

    fn resolve(registry: &ServiceRegistry) -> Option<&Arc<Self>>;
}

macro_rules! registered_service {
    ($ty:ty, $capability:ident, $field:ident) => {
        impl Service for $ty {
            const CAPABILITY: Capability = Capability::$capability;

            fn resolve(registry: &ServiceRegistry) -> Option<&Arc<Self>> {
                registry.$field.as_ref()
            }
        }
    };
}

registered_service!(TimerService, Timer, timers);
registered_service!(CommandService, Command, commands);
registered_service!(ReceiveDataService, ReceiveData, data);
registered_service!(SystemInformationService, SystemInformation, system);
registered_service!(DisplayLayoutService, DisplayLayout, layout);
registered_service!(DisplayControlService, DisplayControl, display_control);
registered_service!(SystemDiagnosticsService, SystemDiagnostics, system_diagnostics);

#[derive(Default)]
pub struct ServiceRegistry {
    timers: Option<Arc<TimerService>>,
    commands: Option<Arc<CommandService>>,
    data: Option<Arc<ReceiveDataService>>,
    system: Option<Arc<SystemInformationService>>,
    layout: Option<Arc<DisplayLayoutService>>,
    display_control: Option<Arc<DisplayControlService>>,
    system_diagnostics: Option<Arc<SystemDiagnosticsService>>,
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

impl ServiceRegistry {
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::default()
    }

    pub fn get<T: Service>(&self) -> HostResult<Arc<T>> {
        T::resolve(self)
            .cloned()
            .ok_or(HostError::ServiceUnavailable(T::CAPABILITY))
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Timer => self.timers.is_some(),
            Capability::Command => self.commands.is_some(),
            Capability::ReceiveData => self.data.is_some(),
            Capability::SystemInformation => self.system.is_some(),
            Capability::DisplayLayout => self.layout.is_some(),
            Capability::DisplayControl => self.display_control.is_some(),
            Capability::SystemDiagnostics => self.system_diagnostics.is_some(),
        }
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|capability| self.supports(*capability))
            .collect()
    }

    pub(crate) fn shutdown(&self) {
        if let Some(timers) = &self.timers {
            timers.shutdown();
        }
    }
}

#[derive(Default)]
pub struct ServiceRegistryBuilder {
    registry: ServiceRegistry,
}

impl ServiceRegistryBuilder {
    pub fn timers(mut self, service: TimerService) -> Self {
        self.registry.timers = Some(Arc::new(service));
        self
    }

    pub fn commands(mut self, service: CommandService) -> Self {
        self.registry.commands = Some(Arc::new(service));
        self
    }

    pub fn data(mut self, service: ReceiveDataService) -> Self {
        self.registry.data = Some(Arc::new(service));
        self
    }

    pub fn system(mut self, service: SystemInformationService) -> Self {
        self.registry.system = Some(Arc::new(service));
        self
    }

    pub fn layout(mut self, service: DisplayLayoutService) -> Self {
        self.registry.layout = Some(Arc::new(service));
        self
    }

    pub fn display_control(mut self, service: DisplayControlService) -> Self {
        self.registry.display_control = Some(Arc::new(service));
        self
    }

    pub fn system_diagnostics(mut self, service: SystemDiagnosticsService) -> Self {
        self.registry.system_diagnostics = Some(Arc::new(service));
        self
    }

    /// Drop a capability the host should not offer.
    pub fn without(mut self, capability: Capability) -> Self {
        let registry = &mut self.registry;
        match capability {
            Capability::Timer => registry.timers = None,
            Capability::Command => registry.commands = None,
            Capability::ReceiveData => registry.data = None,
            Capability::SystemInformation => registry.system = None,
            Capability::DisplayLayout => registry.layout = None,
            Capability::DisplayControl => registry.display_control = None,
            Capability::SystemDiagnostics => registry.system_diagnostics = None,
        }
        self
    }

    pub fn build(self) -> ServiceRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_names_round_trip() {
        for capability in Capability::ALL {
            assert_eq!(capability.as_str().parse::<Capability>().unwrap(), capability);
        }
        assert!("printer".parse::<Capability>().is_err());
    }

    #[test]
    fn missing_capability_is_unavailable() {
        let registry = ServiceRegistry::builder()
            .data(ReceiveDataService::new())
            .build();
        assert!(registry.get::<ReceiveDataService>().is_ok());
        assert!(matches!(
            registry.get::<DisplayLayoutService>(),
            Err(HostError::ServiceUnavailable(Capability::DisplayLayout))
        ));
        assert_eq!(registry.capabilities(), vec![Capability::ReceiveData]);
    }

    #[test]
    fn lookups_return_the_same_instance() {
        let registry = ServiceRegistry::builder()
            .layout(DisplayLayoutService::new())
            .without(Capability::Timer)
            .build();
        let first = registry.get::<DisplayLayoutService>().unwrap();
        let second = registry.get::<DisplayLayoutService>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
