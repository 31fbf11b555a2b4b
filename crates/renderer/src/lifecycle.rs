//! Mount/teardown bookkeeping for the water surface.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    StopCycler,
    CancelRenderLoop,
    ReleaseGpu,
    DetachInput,
}

/// Teardown runs these steps in exactly this order.
pub const TEARDOWN_ORDER: [TeardownStep; 4] = [
    TeardownStep::StopCycler,
    TeardownStep::CancelRenderLoop,
    TeardownStep::ReleaseGpu,
    TeardownStep::DetachInput,
];

pub trait TeardownHooks {
    fn stop_cycler(&mut self);
    fn cancel_render_loop(&mut self);
    fn release_gpu(&mut self);
    fn detach_input(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Unmounted,
    Mounted,
    TornDown,
}

#[derive(Debug, Default)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.state == LifecycleState::Mounted
    }

    /// Returns false if the surface was already mounted or torn down.
    pub fn mount(&mut self) -> bool {
        if self.state != LifecycleState::Unmounted {
            return false;
        }
        self.state = LifecycleState::Mounted;
        true
    }

    /// Runs the teardown steps once. Later calls do nothing and return false.
    pub fn teardown(&mut self, hooks: &mut impl TeardownHooks) -> bool {
        if self.state == LifecycleState::TornDown {
            return false;
        }
        self.state = LifecycleState::TornDown;
        for step in TEARDOWN_ORDER {
            tracing::debug!(?step, "teardown");
            match step {
                TeardownStep::StopCycler => hooks.stop_cycler(),
                TeardownStep::CancelRenderLoop => hooks.cancel_render_loop(),
                TeardownStep::ReleaseGpu => hooks.release_gpu(),
                TeardownStep::DetachInput => hooks.detach_input(),
            }
        }
        true
    }
}
