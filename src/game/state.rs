//! Arena state store: tanks, bullets and the payloads that create or mutate them

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{ArenaError, ConnectionId};

/// Arena width in world units
pub const ARENA_WIDTH: f64 = 1500.0;
/// Arena height in world units (excluding the top margin)
pub const ARENA_HEIGHT: f64 = 800.0;
/// Height of the HUD strip above the playable area
pub const TOP_MARGIN: f64 = 80.0;

/// Health every tank starts with and is restored to on respawn
pub const STARTING_HEALTH: i32 = 50;

pub const DEFAULT_BULLET_SPEED: f64 = 6.0;
pub const DEFAULT_MAX_BOUNCES: u32 = 1;
pub const DEFAULT_BULLET_RADIUS: f64 = 8.0;

/// Keys a client may never set through the passthrough bag
const PROTECTED_FIELDS: [&str; 4] = ["health", "maxHealth", "size", "sid"];

/// Player-controlled tank (authoritative)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tank {
    /// Top-left corner X of the bounding box
    pub x: f64,
    /// Top-left corner Y of the bounding box
    pub y: f64,
    /// Edge length of the square bounding box
    pub size: f64,
    pub health: i32,
    pub max_health: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Client-visible fields the server carries without interpreting
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Tank {
    /// Center of the bounding box
    pub fn center(&self) -> (f64, f64) {
        let half = self.size / 2.0;
        (self.x + half, self.y + half)
    }
}

/// Tank description supplied by a client on join
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TankSeed {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub body_angle: Option<f64>,
    #[serde(default)]
    pub head_angle: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TankSeed {
    /// Validate the seed and build a tank at full starting health.
    ///
    /// Any health the client claims is discarded.
    pub fn into_tank(self) -> Result<Tank, ArenaError> {
        let x = self.x.filter(|v| v.is_finite()).ok_or(ArenaError::InvalidEntity("x"))?;
        let y = self.y.filter(|v| v.is_finite()).ok_or(ArenaError::InvalidEntity("y"))?;
        let size = self
            .size
            .filter(|v| v.is_finite() && *v > 0.0)
            .ok_or(ArenaError::InvalidEntity("size"))?;

        Ok(Tank {
            x,
            y,
            size,
            health: STARTING_HEALTH,
            max_health: STARTING_HEALTH,
            body_angle: self.body_angle,
            head_angle: self.head_angle,
            color: self.color,
            extra: strip_protected(self.extra),
        })
    }
}

/// Field-level overlay applied by `move`
///
/// Health, size and identity are never writable from here; any other unknown key is
/// carried in `extra` and merged into the tank's passthrough bag.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TankPatch {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub body_angle: Option<f64>,
    #[serde(default)]
    pub head_angle: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TankPatch {
    pub fn apply(self, tank: &mut Tank) {
        if let Some(x) = self.x {
            tank.x = x;
        }
        if let Some(y) = self.y {
            tank.y = y;
        }
        if self.body_angle.is_some() {
            tank.body_angle = self.body_angle;
        }
        if self.head_angle.is_some() {
            tank.head_angle = self.head_angle;
        }
        if self.color.is_some() {
            tank.color = self.color;
        }
        tank.extra.extend(strip_protected(self.extra));
    }
}

fn strip_protected(mut extra: Map<String, Value>) -> Map<String, Value> {
    extra.retain(|key, _| !PROTECTED_FIELDS.contains(&key.as_str()));
    extra
}

/// Projectile in flight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bullet {
    pub x: f64,
    pub y: f64,
    /// Direction of travel in radians
    pub angle: f64,
    /// Distance travelled per tick
    pub speed: f64,
    /// Wall reflections so far
    pub bounces: u32,
    /// Reflections allowed before the bullet expires
    pub max_bounces: u32,
    pub radius: f64,
    pub owner: ConnectionId,
}

/// Bullet request supplied by a client on fire
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireOrder {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_max_bounces")]
    pub max_bounces: u32,
    #[serde(default = "default_radius")]
    pub radius: f64,
}

fn default_speed() -> f64 {
    DEFAULT_BULLET_SPEED
}

fn default_max_bounces() -> u32 {
    DEFAULT_MAX_BOUNCES
}

fn default_radius() -> f64 {
    DEFAULT_BULLET_RADIUS
}

impl FireOrder {
    pub fn into_bullet(self, owner: ConnectionId) -> Bullet {
        Bullet {
            x: self.x,
            y: self.y,
            angle: self.angle,
            speed: self.speed,
            bounces: 0,
            max_bounces: self.max_bounces,
            radius: self.radius,
            owner,
        }
    }
}

/// The whole shared arena; serialized as-is for `arena_state`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArenaState {
    /// Ordered by connection id, which fixes the collision tie-break order
    pub tanks: BTreeMap<ConnectionId, Tank>,
    pub bullets: Vec<Bullet>,
}

impl ArenaState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tank_count(&self) -> usize {
        self.tanks.len()
    }

    pub fn bullet_count(&self) -> usize {
        self.bullets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    fn seed(value: Value) -> TankSeed {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn join_seed_forces_starting_health() {
        let tank = assert_ok!(seed(json!({
            "x": 10.0, "y": 120.0, "size": 40.0,
            "health": 3, "maxHealth": 9000, "color": "green"
        }))
        .into_tank());

        assert_eq!(tank.health, STARTING_HEALTH);
        assert_eq!(tank.max_health, STARTING_HEALTH);
        assert_eq!(tank.color.as_deref(), Some("green"));
        assert!(tank.extra.is_empty());

        let wire = serde_json::to_value(&tank).unwrap();
        assert_eq!(wire["health"], json!(50));
        assert_eq!(wire["maxHealth"], json!(50));
    }

    #[test]
    fn join_seed_requires_position_and_size() {
        assert_err!(seed(json!({ "y": 1.0, "size": 40.0 })).into_tank());
        assert_err!(seed(json!({ "x": 1.0, "size": 40.0 })).into_tank());
        assert_err!(seed(json!({ "x": 1.0, "y": 1.0 })).into_tank());
        assert_err!(seed(json!({ "x": 1.0, "y": 1.0, "size": 0.0 })).into_tank());
        assert_err!(seed(json!({ "x": 1.0, "y": null, "size": 40.0 })).into_tank());
    }

    #[test]
    fn patch_overlays_fields_but_never_health_or_size() {
        let mut tank = seed(json!({ "x": 0.0, "y": 100.0, "size": 40.0 }))
            .into_tank()
            .unwrap();
        tank.health = 7;

        let patch: TankPatch = serde_json::from_value(json!({
            "x": 55.5,
            "headAngle": 1.25,
            "health": 50,
            "maxHealth": 99,
            "size": 400,
            "turretSkin": "desert"
        }))
        .unwrap();
        patch.apply(&mut tank);

        assert_eq!(tank.x, 55.5);
        assert_eq!(tank.y, 100.0);
        assert_eq!(tank.head_angle, Some(1.25));
        assert_eq!(tank.health, 7);
        assert_eq!(tank.max_health, STARTING_HEALTH);
        assert_eq!(tank.size, 40.0);
        assert_eq!(tank.extra.get("turretSkin"), Some(&json!("desert")));
        assert_eq!(tank.extra.len(), 1);
    }

    #[test]
    fn fire_order_applies_defaults() {
        let owner = Uuid::new_v4();
        let order: FireOrder =
            serde_json::from_value(json!({ "x": 5.0, "y": 6.0, "angle": 0.5 })).unwrap();
        let bullet = order.into_bullet(owner);

        assert_eq!(bullet.speed, DEFAULT_BULLET_SPEED);
        assert_eq!(bullet.max_bounces, DEFAULT_MAX_BOUNCES);
        assert_eq!(bullet.radius, DEFAULT_BULLET_RADIUS);
        assert_eq!(bullet.bounces, 0);
        assert_eq!(bullet.owner, owner);
    }

    #[test]
    fn tank_center_is_box_center() {
        let tank = seed(json!({ "x": 100.0, "y": 100.0, "size": 40.0 }))
            .into_tank()
            .unwrap();
        assert_eq!(tank.center(), (120.0, 120.0));
    }
}
