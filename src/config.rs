//! Viewer presets. Each [`Skin`] is a complete [`ViewerConfig`]; the active
//! one is picked from the `skin` query parameter of the page URL.

use std::{fmt, str::FromStr};

use cgmath::{Point3, Vector3};

use crate::geometry::{FitOptions, DEFAULT_TARGET_SIZE};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Skin {
    /// Cube map background and reflections, no floor.
    #[default]
    Studio,
    /// Transparent canvas over the page, translucent floor and grid.
    Transparent,
    /// Cube map background with a reflective floor.
    Showcase,
}

impl FromStr for Skin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "studio" => Ok(Self::Studio),
            "transparent" => Ok(Self::Transparent),
            "showcase" => Ok(Self::Showcase),
            other => Err(format!("unknown skin '{}'", other)),
        }
    }
}

impl fmt::Display for Skin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Studio => write!(f, "studio"),
            Self::Transparent => write!(f, "transparent"),
            Self::Showcase => write!(f, "showcase"),
        }
    }
}

impl Skin {
    /// Pick the skin out of a `location.search` string such as
    /// `?skin=transparent&x=1`. Missing or unknown values give the default.
    pub fn from_query(search: &str) -> Self {
        search
            .trim_start_matches('?')
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "skin")
            .and_then(|(_, value)| match value.parse() {
                Ok(skin) => Some(skin),
                Err(err) => {
                    leptos::logging::warn!("{}, using the default skin", err);
                    None
                }
            })
            .unwrap_or_default()
    }
}

#[inline]
pub fn rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

#[inline]
fn rgba(hex: u32, alpha: f32) -> [f32; 4] {
    let [r, g, b] = rgb(hex);
    [r, g, b, alpha]
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraConfig {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Point3::new(0.0, 1.5, 5.0),
            target: Point3::new(0.0, 0.0, 0.0),
            fov_deg: 75.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlsConfig {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            min_distance: 1.0,
            max_distance: 20.0,
            min_polar_angle: 0.0,
            max_polar_angle: std::f32::consts::FRAC_PI_2,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
        }
    }
}

/// Directional light shining from `position` towards the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub position: Vector3<f32>,
    pub color: [f32; 3],
    pub intensity: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightRig {
    pub key: DirectionalLight,
    pub fill: DirectionalLight,
    pub rim: DirectionalLight,
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
}

impl LightRig {
    fn studio(key: f32, fill: f32, rim: f32) -> Self {
        Self {
            key: DirectionalLight {
                position: Vector3::new(5.0, 8.0, 5.0),
                color: rgb(0xffffff),
                intensity: key,
            },
            fill: DirectionalLight {
                position: Vector3::new(-5.0, 3.0, -5.0),
                color: rgb(0xffffff),
                intensity: fill,
            },
            rim: DirectionalLight {
                position: Vector3::new(0.0, 2.0, -5.0),
                color: rgb(0xffffff),
                intensity: rim,
            },
            ambient_color: rgb(0x404040),
            ambient_intensity: 0.1,
        }
    }

    pub fn lights(&self) -> [&DirectionalLight; 3] {
        [&self.key, &self.fill, &self.rim]
    }
}

impl Default for LightRig {
    fn default() -> Self {
        Self::studio(1.2, 0.4, 0.3)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentConfig {
    /// Faces in +x, -x, +y, -y, +z, -z order.
    pub urls: [String; 6],
    /// Reflection strength applied to loaded models.
    pub model_intensity: f32,
    pub model_roughness: f32,
    pub model_metalness: f32,
}

impl EnvironmentConfig {
    pub fn pisa() -> Self {
        let face =
            |name: &str| format!("https://threejs.org/examples/textures/cube/pisa/{}.png", name);
        Self {
            urls: [face("px"), face("nx"), face("py"), face("ny"), face("pz"), face("nz")],
            model_intensity: 0.5,
            model_roughness: 0.4,
            model_metalness: 0.6,
        }
    }
}

/// Horizontal disc under the model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloorConfig {
    pub radius: f32,
    pub segments: u32,
    pub y: f32,
    pub color: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
    pub env_intensity: f32,
}

/// Square line grid, like a ground plane helper.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridConfig {
    pub size: f32,
    pub divisions: u32,
    pub y: f32,
    pub center_color: [f32; 3],
    pub line_color: [f32; 3],
    pub opacity: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    pub skin: Skin,
    pub fit: FitOptions,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub lights: LightRig,
    /// Clear color used whenever no environment is shown.
    pub background: [f32; 4],
    pub environment: Option<EnvironmentConfig>,
    pub floor: Option<FloorConfig>,
    pub grid: Option<GridConfig>,
    pub rotation_enabled: bool,
    pub rotation_speed: f32,
    /// Radians per frame at speed 1.
    pub rotation_step: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self::for_skin(Skin::default())
    }
}

impl ViewerConfig {
    pub fn for_skin(skin: Skin) -> Self {
        let base = Self {
            skin,
            fit: FitOptions::default(),
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            lights: LightRig::default(),
            background: rgba(0x222222, 1.0),
            environment: Some(EnvironmentConfig::pisa()),
            floor: None,
            grid: None,
            rotation_enabled: true,
            rotation_speed: 1.0,
            rotation_step: 0.01,
        };
        match skin {
            Skin::Studio => base,
            Skin::Transparent => Self {
                fit: FitOptions {
                    target_size: DEFAULT_TARGET_SIZE * 2.0,
                    camera_height: 1.5,
                    camera_distance: 2.0,
                    target_height: 0.5,
                },
                camera: CameraConfig {
                    position: Point3::new(0.0, 5.5, 15.0),
                    ..Default::default()
                },
                lights: LightRig::studio(1.0, 0.3, 0.2),
                background: [0.0, 0.0, 0.0, 0.0],
                environment: None,
                floor: Some(FloorConfig {
                    radius: 8.0,
                    segments: 32,
                    y: -0.5,
                    color: rgba(0x888888, 0.3),
                    roughness: 0.8,
                    metalness: 0.2,
                    env_intensity: 0.0,
                }),
                grid: Some(GridConfig {
                    size: 10.0,
                    divisions: 10,
                    y: -0.49,
                    center_color: rgb(0x888888),
                    line_color: rgb(0x444444),
                    opacity: 0.2,
                }),
                ..base
            },
            Skin::Showcase => Self {
                floor: Some(FloorConfig {
                    radius: 4.0,
                    segments: 64,
                    y: -DEFAULT_TARGET_SIZE / 2.0,
                    color: rgba(0x444444, 1.0),
                    roughness: 0.8,
                    metalness: 0.2,
                    env_intensity: 0.3,
                }),
                ..base
            },
        }
    }

    /// Configuration for the page at `search` (a `location.search` value).
    pub fn from_query(search: &str) -> Self {
        Self::for_skin(Skin::from_query(search))
    }

    pub fn is_transparent(&self) -> bool {
        self.background[3] < 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skin_names_round_trip_through_display() {
        for skin in [Skin::Studio, Skin::Transparent, Skin::Showcase] {
            assert_eq!(skin.to_string().parse::<Skin>(), Ok(skin));
        }
        assert_eq!(" Transparent ".parse::<Skin>(), Ok(Skin::Transparent));
        assert!("neon".parse::<Skin>().is_err());
    }

    #[test]
    fn skin_comes_from_the_query_string() {
        assert_eq!(Skin::from_query("?skin=transparent"), Skin::Transparent);
        assert_eq!(Skin::from_query("?a=1&skin=showcase&b=2"), Skin::Showcase);
        assert_eq!(Skin::from_query(""), Skin::Studio);
        assert_eq!(Skin::from_query("?skin=neon"), Skin::Studio);
        assert_eq!(Skin::from_query("?skins=transparent"), Skin::Studio);
    }

    #[test]
    fn transparent_skin_has_no_environment_and_a_clear_background() {
        let config = ViewerConfig::for_skin(Skin::Transparent);
        assert!(config.is_transparent());
        assert!(config.environment.is_none());
        assert!(config.floor.is_some() && config.grid.is_some());
        assert_eq!(config.fit.target_size, 5.0);
    }

    #[test]
    fn studio_is_the_default() {
        let config = ViewerConfig::default();
        assert_eq!(config.skin, Skin::Studio);
        assert!(!config.is_transparent());
        assert_eq!(config.environment.as_ref().map(|env| env.urls.len()), Some(6));
        assert_eq!(config.fit.target_size, DEFAULT_TARGET_SIZE);
    }

    #[test]
    fn hex_colors_map_to_unit_range() {
        assert_eq!(rgb(0xff0000), [1.0, 0.0, 0.0]);
        assert_eq!(rgb(0x000000), [0.0, 0.0, 0.0]);
    }
}
