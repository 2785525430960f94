/// Indicates the state of an update signal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum UpdatePlan {
    /// Validate and boot the installed application.
    Boot,
    /// Wait for a new image over serial.
    Update,
}

pub trait ReadUpdateSignal {
    fn read_update_plan(&self) -> UpdatePlan;
}

#[cfg(not(target_arch = "arm"))]
#[doc(hidden)]
pub mod doubles {
    use super::*;

    /// Signal that always yields the same plan.
    pub struct FixedSignal(pub UpdatePlan);

    impl ReadUpdateSignal for FixedSignal {
        fn read_update_plan(&self) -> UpdatePlan { self.0 }
    }

    /// Signal that must never be consulted.
    pub struct UnreachableSignal;

    impl ReadUpdateSignal for UnreachableSignal {
        fn read_update_plan(&self) -> UpdatePlan { panic!("update signal read") }
    }
}
