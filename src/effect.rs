//! The contract between the bridge and the effects it drives.
//!
//! An effect is registered once as an [`EffectDescriptor`]: a name, an
//! option table, default resource lines and an `init` function. Each time
//! the driver starts the effect, `init` produces a boxed [`EffectState`]
//! that receives `draw`, `reshape`, `event` and `free` calls until the
//! driver tears it down.

use crate::display::Display;
use crate::drawable::Drawable;
use crate::errors::BridgeError;
use crate::event::Event;
use crate::options::{OptionSpec, OptionTable, Resources};
use hashbrown::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A unique identifier for one running instance of an effect.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectInstanceId(Uuid);

impl EffectInstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EffectInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an effect sees during a callback.
pub struct EffectContext<'a> {
    pub display: &'a mut Display,
    pub resources: &'a Resources,
    /// The window, for drawing calls.
    pub window: Drawable,
    /// Frames drawn so far by this instance.
    pub frame: u64,
}

impl<'a> EffectContext<'a> {
    pub fn new(display: &'a mut Display, resources: &'a Resources, frame: u64) -> Self {
        Self { display, resources, window: Drawable::Window, frame }
    }

    pub fn width(&self) -> u32 {
        self.display.window().width()
    }

    pub fn height(&self) -> u32 {
        self.display.window().height()
    }
}

/// A running effect.
pub trait EffectState: Send {
    /// Draws one frame. Returns how long to wait before the next one, or
    /// `None` for the driver's frame interval.
    fn draw(&mut self, ctx: &mut EffectContext<'_>) -> Option<Duration>;

    /// The window changed size. Called before the next draw.
    fn reshape(&mut self, _ctx: &mut EffectContext<'_>, _width: u32, _height: u32) {}

    /// Returns `true` when the event was consumed.
    fn event(&mut self, _ctx: &mut EffectContext<'_>, _event: &Event) -> bool {
        false
    }

    /// Releases what the effect allocated. Anything left over is swept by the driver.
    fn free(&mut self, _ctx: &mut EffectContext<'_>) {}
}

/// Creates the effect's state. Runs on the first frame, with the window cleared.
pub type InitFn = dyn Fn(&mut EffectContext<'_>) -> anyhow::Result<Box<dyn EffectState>> + Send + Sync;

/// Static description of an effect. Never changed once registered.
#[derive(Clone)]
pub struct EffectDescriptor {
    name: String,
    class: String,
    init: Arc<InitFn>,
    options: OptionTable,
    defaults: Vec<String>,
}

impl fmt::Debug for EffectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectDescriptor")
            .field("name", &self.name)
            .field("class", &self.class)
            .field("options", &self.options.len())
            .field("defaults", &self.defaults.len())
            .finish()
    }
}

impl EffectDescriptor {
    /// A descriptor whose class is the capitalised name.
    pub fn new<F>(name: &str, init: F) -> Self
    where
        F: Fn(&mut EffectContext<'_>) -> anyhow::Result<Box<dyn EffectState>> + Send + Sync + 'static,
    {
        let mut chars = name.chars();
        let class = match chars.next() {
            Some(c) => c.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        Self { name: name.to_string(), class, init: Arc::new(init), options: OptionTable::default(), defaults: Vec::new() }
    }

    pub fn class(mut self, class: &str) -> Self {
        self.class = class.to_string();
        self
    }

    pub fn option(mut self, spec: OptionSpec) -> Self {
        self.options.push(spec);
        self
    }

    pub fn defaults(mut self, lines: &[&str]) -> Self {
        self.defaults.extend(lines.iter().map(|l| l.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class_name(&self) -> &str {
        &self.class
    }

    /// The effect's own switches followed by the standard ones.
    pub fn option_table(&self) -> OptionTable {
        self.options.clone().with_standard()
    }

    pub fn default_lines(&self) -> &[String] {
        &self.defaults
    }

    pub(crate) fn init(&self, ctx: &mut EffectContext<'_>) -> anyhow::Result<Box<dyn EffectState>> {
        (self.init)(ctx)
    }
}

/// Effects available by name.
#[derive(Debug, Default, Clone)]
pub struct EffectRegistry {
    effects: HashMap<String, Arc<EffectDescriptor>>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the effects that ship with the crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for descriptor in crate::effects::builtins() {
            registry.register(descriptor);
        }
        registry
    }

    /// Adds an effect, replacing any with the same name.
    pub fn register(&mut self, descriptor: EffectDescriptor) -> Arc<EffectDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.effects.insert(descriptor.name().to_string(), descriptor.clone());
        descriptor
    }

    pub fn get(&self, name: &str) -> Result<Arc<EffectDescriptor>, BridgeError> {
        self.effects.get(name).cloned().ok_or_else(|| BridgeError::UnknownEffect(name.to_string()))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.effects.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
