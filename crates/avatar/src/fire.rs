use serde::{Deserialize, Serialize};
use xrspace_scene::BULLET_LIFETIME;

/// Projectile tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponConfig {
    /// Trigger value that must be exceeded to fire.
    pub threshold: f32,
    /// Muzzle speed along the pointer ray, in m/s.
    pub speed: f32,
    pub radius: f32,
    /// `#rrggbb`
    pub color: String,
    /// Seconds of scene time before a projectile is disposed.
    pub lifetime: f64,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            speed: 150.0,
            radius: 0.05,
            color: "#ffff00".to_string(),
            lifetime: BULLET_LIFETIME,
        }
    }
}

/// One shot per trigger pull.
///
/// Pulling past the threshold fires and locks; the lock only opens when the
/// trigger is fully released (value exactly `0`).
#[derive(Debug, Clone, Default)]
pub struct FireControl {
    threshold: f32,
    locked: bool,
}

impl FireControl {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            locked: false,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Feed a trigger value. Returns `true` when this value fires a shot.
    pub fn pull(&mut self, value: f32) -> bool {
        let mut fire = false;
        if value > self.threshold && !self.locked {
            self.locked = true;
            fire = true;
        }
        if value == 0.0 {
            self.locked = false;
        }
        fire
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_per_pull() {
        let mut fire = FireControl::new(0.5);
        let shots = [0.0, 0.6, 0.6, 0.6, 0.0, 0.7]
            .into_iter()
            .filter(|v| fire.pull(*v))
            .count();
        assert_eq!(shots, 2);
        assert!(fire.is_locked());
    }

    #[test]
    fn partial_release_keeps_lock() {
        let mut fire = FireControl::new(0.5);
        assert!(fire.pull(0.9));
        assert!(!fire.pull(0.1));
        assert!(!fire.pull(0.8));
        assert!(!fire.pull(0.0));
        assert!(fire.pull(0.51));
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut fire = FireControl::new(0.5);
        assert!(!fire.pull(0.5));
        assert!(!fire.is_locked());
    }
}
