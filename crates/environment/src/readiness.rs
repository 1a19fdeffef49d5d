use serde::{Deserialize, Serialize};

/// Snapshot of both bootstrap flags, as delivered to readiness observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadinessFlags {
    pub xr_ready: bool,
    pub physics_ready: bool,
}

impl ReadinessFlags {
    pub fn both(&self) -> bool {
        self.xr_ready && self.physics_ready
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadinessState {
    #[default]
    Init,
    PhysicsReady,
    XrReady,
    BothReady,
}

/// A bootstrap that finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessSignal {
    Physics,
    Xr,
}

/// Result of a signal that changed the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ReadinessState,
    pub to: ReadinessState,
    pub flags: ReadinessFlags,
}

impl Transition {
    /// True only for the single transition into [`ReadinessState::BothReady`].
    pub fn entered_ready(&self) -> bool {
        self.to == ReadinessState::BothReady && self.from != ReadinessState::BothReady
    }
}

/// Aggregates the physics and XR bootstraps, which may finish in either order.
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    state: ReadinessState,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReadinessState {
        self.state
    }

    pub fn flags(&self) -> ReadinessFlags {
        match self.state {
            ReadinessState::Init => ReadinessFlags::default(),
            ReadinessState::PhysicsReady => ReadinessFlags {
                xr_ready: false,
                physics_ready: true,
            },
            ReadinessState::XrReady => ReadinessFlags {
                xr_ready: true,
                physics_ready: false,
            },
            ReadinessState::BothReady => ReadinessFlags {
                xr_ready: true,
                physics_ready: true,
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == ReadinessState::BothReady
    }

    /// Apply a signal. Repeating a signal that was already applied is a no-op
    /// and returns `None`.
    pub fn signal(&mut self, signal: ReadinessSignal) -> Option<Transition> {
        use ReadinessSignal as S;
        use ReadinessState as R;

        let next = match (self.state, signal) {
            (R::Init, S::Physics) => R::PhysicsReady,
            (R::Init, S::Xr) => R::XrReady,
            (R::PhysicsReady, S::Xr) | (R::XrReady, S::Physics) => R::BothReady,
            _ => return None,
        };
        let from = self.state;
        self.state = next;
        Some(Transition {
            from,
            to: next,
            flags: self.flags(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physics_then_xr() {
        let mut r = Readiness::new();
        let first = r.signal(ReadinessSignal::Physics).unwrap();
        assert_eq!(first.to, ReadinessState::PhysicsReady);
        assert!(first.flags.physics_ready && !first.flags.xr_ready);
        assert!(!first.entered_ready());

        let second = r.signal(ReadinessSignal::Xr).unwrap();
        assert!(second.entered_ready());
        assert!(second.flags.both());
        assert!(r.is_ready());
    }

    #[test]
    fn xr_then_physics() {
        let mut r = Readiness::new();
        assert_eq!(r.signal(ReadinessSignal::Xr).unwrap().to, ReadinessState::XrReady);
        assert!(r.signal(ReadinessSignal::Physics).unwrap().entered_ready());
    }

    #[test]
    fn repeated_signals_are_idempotent() {
        let mut r = Readiness::new();
        r.signal(ReadinessSignal::Physics);
        assert_eq!(r.signal(ReadinessSignal::Physics), None);
        assert_eq!(r.state(), ReadinessState::PhysicsReady);

        r.signal(ReadinessSignal::Xr);
        assert_eq!(r.signal(ReadinessSignal::Xr), None);
        assert_eq!(r.signal(ReadinessSignal::Physics), None);
        assert!(r.is_ready());
    }
}
