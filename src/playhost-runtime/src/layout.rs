//! Display layouts: display heads, virtual and physical.

use crate::context::{PluginContext, ServiceHandle};
use crate::error::HostResult;
use crate::event_bus::{EventBus, SubscriptionHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

pub const LAYOUT_CHANGED: &str = "layout-changed";

/// A rectangle on the output surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayLayoutView {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// View id to rectangle. An empty layout is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayLayout {
    pub views: BTreeMap<i32, DisplayLayoutView>,
}

impl DisplayLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view(mut self, id: i32, view: DisplayLayoutView) -> Self {
        self.views.insert(id, view);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutKind {
    DisplayHeads,
    Virtual,
    Physical,
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayoutKind::DisplayHeads => "display heads",
            LayoutKind::Virtual => "virtual display",
            LayoutKind::Physical => "physical display",
        })
    }
}

/// The three current layouts. `None` means not yet established.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayLayoutChanged {
    pub display_heads: Option<Arc<DisplayLayout>>,
    pub virtual_display: Option<Arc<DisplayLayout>>,
    pub physical: Option<Arc<DisplayLayout>>,
}

impl DisplayLayoutChanged {
    pub fn get(&self, kind: LayoutKind) -> Option<&Arc<DisplayLayout>> {
        match kind {
            LayoutKind::DisplayHeads => self.display_heads.as_ref(),
            LayoutKind::Virtual => self.virtual_display.as_ref(),
            LayoutKind::Physical => self.physical.as_ref(),
        }
    }

    fn slot(&mut self, kind: LayoutKind) -> &mut Option<Arc<DisplayLayout>> {
        match kind {
            LayoutKind::DisplayHeads => &mut self.display_heads,
            LayoutKind::Virtual => &mut self.virtual_display,
            LayoutKind::Physical => &mut self.physical,
        }
    }
}

pub struct DisplayLayoutService {
    current: Mutex<DisplayLayoutChanged>,
    bus: EventBus<DisplayLayoutChanged>,
}

impl Default for DisplayLayoutService {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayLayoutService {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(DisplayLayoutChanged::default()),
            bus: EventBus::new(),
        }
    }

    pub fn display_heads_layout(&self) -> Option<Arc<DisplayLayout>> {
        self.layout(LayoutKind::DisplayHeads)
    }

    pub fn virtual_display_layout(&self) -> Option<Arc<DisplayLayout>> {
        self.layout(LayoutKind::Virtual)
    }

    pub fn physical_display_layout(&self) -> Option<Arc<DisplayLayout>> {
        self.layout(LayoutKind::Physical)
    }

    pub fn layout(&self, kind: LayoutKind) -> Option<Arc<DisplayLayout>> {
        self.current.lock().unwrap().get(kind).cloned()
    }

    /// All three layouts as one consistent snapshot.
    pub fn snapshot(&self) -> DisplayLayoutChanged {
        self.current.lock().unwrap().clone()
    }

    /// Replace one layout wholesale and publish the full triple.
    pub fn set_layout(&self, kind: LayoutKind, layout: DisplayLayout) -> DisplayLayoutChanged {
        let mut current = self.current.lock().unwrap();
        *current.slot(kind) = Some(Arc::new(layout));
        let snapshot = current.clone();
        tracing::info!(%kind, views = snapshot.get(kind).map_or(0, |l| l.views.len()), "Display layout replaced");
        self.bus.publish(LAYOUT_CHANGED, &snapshot);
        snapshot
    }
}

impl ServiceHandle<DisplayLayoutService> {
    pub fn on_display_layout_changed<F>(&self, handler: F) -> HostResult<SubscriptionHandle>
    where
        F: Fn(&PluginContext, &DisplayLayoutChanged) + Send + Sync + 'static,
    {
        self.subscribe(&self.service().bus, LAYOUT_CHANGED, handler)
    }
}
