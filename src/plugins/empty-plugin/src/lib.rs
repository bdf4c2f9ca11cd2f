use playhost_runtime::{HostResult, PlayerPlugin, PluginContext, Settings, State};

/// The smallest useful plugin: reports itself healthy and does nothing else.
#[derive(Debug, Default)]
pub struct EmptyExample;

impl EmptyExample {
    pub const NAME: &'static str = "EmptyExample";

    pub fn new() -> Self {
        Self
    }
}

impl PlayerPlugin for EmptyExample {
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
        "Empty example plugin demonstrates a minimal Instoremedia Plugin API".into()
    }

    fn initialize(&self, ctx: &PluginContext, _settings: &Settings) -> HostResult<bool> {
        ctx.set_state(State::Ok, "Up and running");
        Ok(true)
    }
}
