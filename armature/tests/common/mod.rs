use std::sync::Arc;

use armature::prelude::*;
use parking_lot::Mutex;

/// Shared record of lifecycle hook calls, as `instance:hook`.
pub type Journal = Arc<Mutex<Vec<String>>>;

#[allow(dead_code)]
pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

#[allow(dead_code)]
pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().clone()
}

/// Component recording every lifecycle hook into a journal, optionally
/// failing one of them.
#[derive(Debug)]
pub struct Recorder {
    core: ComponentCore,
    journal: Journal,
    fail_on: Mutex<Option<&'static str>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn new(journal: &Journal) -> impl FnOnce(ComponentCore) -> Result<Self> + use<> {
        Self::failing(journal, None)
    }

    pub fn failing(
        journal: &Journal,
        hook: Option<&'static str>,
    ) -> impl FnOnce(ComponentCore) -> Result<Self> + use<> {
        let journal = journal.clone();
        move |core| {
            Ok(Self {
                core,
                journal,
                fail_on: Mutex::new(hook),
            })
        }
    }

    pub fn fail_on(&self, hook: Option<&'static str>) {
        *self.fail_on.lock() = hook;
    }

    fn record(&self, hook: &'static str) -> Result<()> {
        let name = self.core.instance_name();
        self.journal.lock().push(format!("{name}:{hook}"));
        if *self.fail_on.lock() == Some(hook) {
            return Err(Error::Lifecycle {
                component: name.to_string(),
                reason: format!("{hook} failed on purpose"),
            });
        }
        Ok(())
    }
}

impl Component for Recorder {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn pre_init(&self) -> Result<()> {
        self.record("pre_init")
    }

    fn post_init(&self) -> Result<()> {
        self.record("post_init")
    }

    fn pre_uninit(&self) -> Result<()> {
        self.record("pre_uninit")
    }

    fn post_uninit(&self) -> Result<()> {
        self.record("post_uninit")
    }
}

/// Plain container component.
pub struct App {
    core: ComponentCore,
}

impl Component for App {
    fn core(&self) -> &ComponentCore {
        &self.core
    }
}

#[allow(dead_code)]
pub fn app(core: ComponentCore) -> Result<App> {
    Ok(App { core })
}

pub struct Camera {
    core: ComponentCore,
    pub fps: Arc<Parameter<u32>>,
    pub gain: Arc<Parameter<f64>>,
}

impl Component for Camera {
    fn core(&self) -> &ComponentCore {
        &self.core
    }
}

#[allow(dead_code)]
pub fn camera(core: ComponentCore) -> Result<Camera> {
    let fps = core.declare(ParameterDef::new("fps", "Frames per second", 30u32, "Camera"))?;
    let gain = core.declare(
        ParameterDef::new("gain", "Sensor gain", 1.0f64, "Camera").with_range(0.0, 16.0),
    )?;
    Ok(Camera { core, fps, gain })
}

pub struct Logger {
    core: ComponentCore,
    pub log: Arc<Parameter<bool>>,
}

impl Component for Logger {
    fn core(&self) -> &ComponentCore {
        &self.core
    }
}

#[allow(dead_code)]
pub fn logger(core: ComponentCore) -> Result<Logger> {
    let log = core.declare(ParameterDef::new("log", "Enable logging", true, "Logging"))?;
    Ok(Logger { core, log })
}
