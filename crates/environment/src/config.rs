use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use xrspace_avatar::{AvatarConfig, AvatarKind, MovementConfig, WeaponConfig};
use xrspace_input::BindingProfile;
use xrspace_physics::PhysicsConfig;
use xrspace_scene::BULLET_LIFETIME;

use crate::demo::DemoConfig;
use crate::xr::XrSessionOptions;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which experience to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    /// Gravity, grounded movement, turning and firing.
    #[default]
    Immersive,
    /// Weightless flight; sticks and face buttons only.
    Basic,
}

impl EnvironmentKind {
    pub fn avatar_kind(&self) -> AvatarKind {
        match self {
            Self::Immersive => AvatarKind::Immersive,
            Self::Basic => AvatarKind::Basic,
        }
    }

    pub fn binding_profile(&self) -> BindingProfile {
        match self {
            Self::Immersive => BindingProfile::Immersive,
            Self::Basic => BindingProfile::Basic,
        }
    }
}

/// Which asynchronous bootstrap a driver awaits first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootstrapOrder {
    #[default]
    PhysicsFirst,
    XrFirst,
}

/// Per-field overrides on top of the variant's avatar defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<Vec3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eye_height: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement: Option<MovementConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weapon: Option<WeaponConfig>,
    pub upright: bool,
}

/// Everything needed to stand up an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub variant: EnvironmentKind,
    pub avatar: AvatarOverrides,
    pub physics: PhysicsConfig,
    pub xr: XrSessionOptions,
    pub bootstrap: BootstrapOrder,
    /// Seconds of scene time a bullet lives.
    pub bullet_lifetime: f64,
    pub demo: DemoConfig,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            variant: EnvironmentKind::default(),
            avatar: AvatarOverrides::default(),
            physics: PhysicsConfig::default(),
            xr: XrSessionOptions::default(),
            bootstrap: BootstrapOrder::default(),
            bullet_lifetime: BULLET_LIFETIME,
            demo: DemoConfig::default(),
        }
    }
}

impl EnvironmentConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&yaml)?;
        tracing::debug!(path = %path.display(), variant = ?config.variant, "config loaded");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.bullet_lifetime.is_finite() || self.bullet_lifetime <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "bullet_lifetime must be positive, got {}",
                self.bullet_lifetime
            )));
        }
        if let Some(movement) = &self.avatar.movement {
            if !(0.0..1.0).contains(&movement.deadzone) {
                return Err(ConfigError::Invalid(format!(
                    "deadzone must be in [0, 1), got {}",
                    movement.deadzone
                )));
            }
        }
        if let Some(eye) = self.avatar.eye_height {
            if !eye.is_finite() {
                return Err(ConfigError::Invalid("eye_height must be finite".into()));
            }
        }
        Ok(())
    }

    /// The variant's avatar defaults with overrides applied.
    pub fn avatar_config(&self) -> AvatarConfig {
        let mut config = AvatarConfig::for_kind(self.variant.avatar_kind());
        let overrides = &self.avatar;
        if let Some(start) = overrides.start {
            config.start = start;
        }
        if let Some(eye) = overrides.eye_height {
            config.eye_height = eye;
        }
        if let Some(movement) = overrides.movement {
            config.movement = movement;
        }
        if let Some(weapon) = &overrides.weapon {
            config.weapon = Some(weapon.clone());
        }
        if let Some(weapon) = config.weapon.as_mut() {
            weapon.lifetime = self.bullet_lifetime;
        }
        config.upright = overrides.upright;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_is_default() {
        let config = EnvironmentConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, EnvironmentConfig::default());
        assert_eq!(config.bullet_lifetime, 2.5);
    }

    #[test]
    fn default_round_trips_through_yaml() {
        let yaml = EnvironmentConfig::default().to_yaml().unwrap();
        assert_eq!(
            EnvironmentConfig::from_yaml_str(&yaml).unwrap(),
            EnvironmentConfig::default()
        );
    }

    #[test]
    fn overrides_apply_to_variant_defaults() {
        let yaml = r#"
variant: basic
bootstrap: xr-first
avatar:
  eye_height: 1.2
  upright: true
  movement:
    deadzone: 0.1
"#;
        let config = EnvironmentConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.bootstrap, BootstrapOrder::XrFirst);

        let avatar = config.avatar_config();
        assert_eq!(avatar.kind, AvatarKind::Basic);
        assert_eq!(avatar.start, Vec3::new(0.0, 1.0, -5.0));
        assert_eq!(avatar.eye_height, 1.2);
        assert!(avatar.upright);
        assert_eq!(avatar.movement.deadzone, 0.1);
        // unspecified movement fields fall back to the serde default
        assert_eq!(avatar.movement.speed_factor, MovementConfig::default().speed_factor);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            EnvironmentConfig::from_yaml_str("bullet_lifetime: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EnvironmentConfig::from_yaml_str("avatar:\n  movement:\n    deadzone: 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EnvironmentConfig::from_yaml_str("variant: desktop"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
