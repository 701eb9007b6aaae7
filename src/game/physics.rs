//! Bullet physics: movement, tank hits, wall bounces and expiry

use rand::Rng;
use std::f64::consts::PI;
use tracing::debug;

use crate::ws::protocol::ServerMsg;

use super::state::{ArenaState, Bullet, Tank, ARENA_HEIGHT, ARENA_WIDTH, TOP_MARGIN};
use super::{ConnectionId, Outbound};

/// Physics system for advancing bullets one tick at a time
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance every live bullet by one tick.
    ///
    /// Returns the events produced along the way, followed by a `bullets_update` carrying the
    /// surviving bullets.
    pub fn step<R: Rng>(state: &mut ArenaState, rng: &mut R) -> Vec<Outbound> {
        let mut events = Vec::new();
        let mut survivors = Vec::with_capacity(state.bullets.len());

        for mut bullet in std::mem::take(&mut state.bullets) {
            Self::integrate(&mut bullet);

            if let Some(sid) = Self::find_hit(&bullet, &state.tanks) {
                if let Some(tank) = state.tanks.get_mut(&sid) {
                    Self::apply_hit(sid, tank, rng, &mut events);
                }
                events.push(Outbound::all(ServerMsg::BulletExploded {
                    x: bullet.x,
                    y: bullet.y,
                }));
                continue;
            }

            if Self::bounce_off_walls(&mut bullet) {
                bullet.bounces += 1;
            }

            if bullet.bounces <= bullet.max_bounces {
                survivors.push(bullet);
            } else {
                events.push(Outbound::all(ServerMsg::BulletExploded {
                    x: bullet.x,
                    y: bullet.y,
                }));
            }
        }

        state.bullets = survivors;
        events.push(Outbound::all(ServerMsg::BulletsUpdate(state.bullets.clone())));
        events
    }

    fn integrate(bullet: &mut Bullet) {
        bullet.x += bullet.angle.cos() * bullet.speed;
        bullet.y += bullet.angle.sin() * bullet.speed;
    }

    /// First tank (in id order) the bullet overlaps, never its owner
    fn find_hit<'a, I>(bullet: &Bullet, tanks: I) -> Option<ConnectionId>
    where
        I: IntoIterator<Item = (&'a ConnectionId, &'a Tank)>,
    {
        tanks
            .into_iter()
            .filter(|(sid, _)| **sid != bullet.owner)
            .find(|(_, tank)| Self::overlaps(bullet, tank))
            .map(|(sid, _)| *sid)
    }

    /// Circle test: the tank counts as a circle of radius size/2 around its box center
    pub fn overlaps(bullet: &Bullet, tank: &Tank) -> bool {
        let (cx, cy) = tank.center();
        let dx = bullet.x - cx;
        let dy = bullet.y - cy;
        let distance = (dx * dx + dy * dy).sqrt();
        distance < bullet.radius + tank.size / 2.0
    }

    fn apply_hit<R: Rng>(
        sid: ConnectionId,
        tank: &mut Tank,
        rng: &mut R,
        events: &mut Vec<Outbound>,
    ) {
        tank.health -= 1;
        debug!(sid = %sid, health = tank.health, "Tank hit");

        events.push(Outbound::all(ServerMsg::TankDamaged {
            sid,
            health: tank.health,
            max_health: tank.max_health,
        }));

        if tank.health <= 0 {
            tank.health = tank.max_health;
            let (x, y) = Self::respawn_position(tank.size, rng);
            tank.x = x;
            tank.y = y;
            debug!(sid = %sid, x, y, "Tank respawned");

            events.push(Outbound::all(ServerMsg::TankRespawned {
                sid,
                tank: tank.clone(),
            }));
        }
    }

    /// Uniform position in `[0, W - size) x [TOP, TOP + H - size)`
    pub fn respawn_position<R: Rng>(size: f64, rng: &mut R) -> (f64, f64) {
        let span_x = (ARENA_WIDTH - size).max(0.0);
        let span_y = (ARENA_HEIGHT - size).max(0.0);
        let x = rng.gen::<f64>() * span_x;
        let y = TOP_MARGIN + rng.gen::<f64>() * span_y;
        (x, y)
    }

    /// Clamp the bullet back inside the arena and mirror its heading.
    /// Returns true if any wall was touched this tick.
    pub fn bounce_off_walls(bullet: &mut Bullet) -> bool {
        let r = bullet.radius;
        let mut bounced = false;

        if bullet.x - r < 0.0 {
            bullet.x = r;
            bullet.angle = PI - bullet.angle;
            bounced = true;
        } else if bullet.x + r > ARENA_WIDTH {
            bullet.x = ARENA_WIDTH - r;
            bullet.angle = PI - bullet.angle;
            bounced = true;
        }

        if bullet.y - r < TOP_MARGIN {
            bullet.y = TOP_MARGIN + r;
            bullet.angle = -bullet.angle;
            bounced = true;
        } else if bullet.y + r > TOP_MARGIN + ARENA_HEIGHT {
            bullet.y = TOP_MARGIN + ARENA_HEIGHT - r;
            bullet.angle = -bullet.angle;
            bounced = true;
        }

        bounced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::STARTING_HEALTH;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::Map;
    use uuid::Uuid;

    fn tank(x: f64, y: f64, size: f64) -> Tank {
        Tank {
            x,
            y,
            size,
            health: STARTING_HEALTH,
            max_health: STARTING_HEALTH,
            body_angle: None,
            head_angle: None,
            color: None,
            extra: Map::new(),
        }
    }

    fn bullet(x: f64, y: f64, angle: f64, speed: f64, owner: ConnectionId) -> Bullet {
        Bullet {
            x,
            y,
            angle,
            speed,
            bounces: 0,
            max_bounces: 1,
            radius: 8.0,
            owner,
        }
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    fn count<F: Fn(&ServerMsg) -> bool>(events: &[Outbound], pred: F) -> usize {
        events.iter().filter(|e| pred(&e.msg)).count()
    }

    fn exploded(msg: &ServerMsg) -> bool {
        matches!(msg, ServerMsg::BulletExploded { .. })
    }

    #[test]
    fn bullet_hits_enemy_tank_and_is_discarded() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut state = ArenaState::new();
        state.tanks.insert(a, tank(100.0, 100.0, 40.0));
        state.tanks.insert(b, tank(140.0, 100.0, 40.0));
        // Fired from A's center straight at B's center
        state.bullets.push(bullet(120.0, 120.0, 0.0, 40.0, a));

        let events = PhysicsSystem::step(&mut state, &mut rng());

        assert_eq!(state.tanks[&b].health, STARTING_HEALTH - 1);
        assert_eq!(state.tanks[&a].health, STARTING_HEALTH);
        assert!(state.bullets.is_empty());
        assert!(events.iter().any(|e| matches!(
            e.msg,
            ServerMsg::TankDamaged { sid, health: 49, max_health: 50 } if sid == b
        )));
        assert_eq!(count(&events, exploded), 1);
        assert_eq!(
            events.last().map(|e| &e.msg),
            Some(&ServerMsg::BulletsUpdate(Vec::new()))
        );
    }

    #[test]
    fn bullet_never_hits_its_owner() {
        let owner = Uuid::new_v4();
        let mut state = ArenaState::new();
        state.tanks.insert(owner, tank(300.0, 300.0, 40.0));
        state.bullets.push(bullet(320.0, 320.0, 0.0, 0.0, owner));

        let events = PhysicsSystem::step(&mut state, &mut rng());

        assert_eq!(state.tanks[&owner].health, STARTING_HEALTH);
        assert_eq!(state.bullets.len(), 1);
        assert_eq!(count(&events, exploded), 0);
    }

    #[test]
    fn overlapping_owner_still_immune_while_other_tank_is_hit() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut state = ArenaState::new();
        state.tanks.insert(owner, tank(300.0, 300.0, 40.0));
        state.tanks.insert(other, tank(300.0, 300.0, 40.0));
        state.bullets.push(bullet(320.0, 320.0, 0.0, 0.0, owner));

        PhysicsSystem::step(&mut state, &mut rng());

        assert_eq!(state.tanks[&owner].health, STARTING_HEALTH);
        assert_eq!(state.tanks[&other].health, STARTING_HEALTH - 1);
    }

    #[test]
    fn first_tank_in_id_order_takes_the_hit() {
        let owner = Uuid::from_u128(1);
        let low = Uuid::from_u128(2);
        let high = Uuid::from_u128(3);
        let mut state = ArenaState::new();
        state.tanks.insert(high, tank(500.0, 500.0, 40.0));
        state.tanks.insert(low, tank(500.0, 500.0, 40.0));
        state.bullets.push(bullet(520.0, 520.0, 0.0, 0.0, owner));

        PhysicsSystem::step(&mut state, &mut rng());

        assert_eq!(state.tanks[&low].health, STARTING_HEALTH - 1);
        assert_eq!(state.tanks[&high].health, STARTING_HEALTH);
    }

    #[test]
    fn departed_owner_bullet_hits_anyone() {
        let gone = Uuid::new_v4();
        let target = Uuid::new_v4();
        let mut state = ArenaState::new();
        state.tanks.insert(target, tank(500.0, 500.0, 40.0));
        state.bullets.push(bullet(520.0, 520.0, 0.0, 0.0, gone));

        PhysicsSystem::step(&mut state, &mut rng());

        assert_eq!(state.tanks[&target].health, STARTING_HEALTH - 1);
    }

    #[test]
    fn left_wall_bounce_clamps_and_reflects() {
        let mut state = ArenaState::new();
        state.bullets.push(bullet(2.0, 400.0, PI, 6.0, Uuid::new_v4()));

        let events = PhysicsSystem::step(&mut state, &mut rng());

        assert_eq!(state.bullets.len(), 1);
        let b = &state.bullets[0];
        assert_eq!(b.x, 8.0);
        assert_eq!(b.angle, 0.0);
        assert_eq!(b.bounces, 1);
        assert_eq!(count(&events, exploded), 0);
    }

    #[test]
    fn zero_bounce_bullet_explodes_once_on_wall_contact() {
        let mut state = ArenaState::new();
        let mut b = bullet(1495.0, 400.0, 0.0, 6.0, Uuid::new_v4());
        b.max_bounces = 0;
        state.bullets.push(b);

        let events = PhysicsSystem::step(&mut state, &mut rng());

        assert!(state.bullets.is_empty());
        assert_eq!(count(&events, exploded), 1);
        assert!(events
            .iter()
            .any(|e| e.msg == ServerMsg::BulletExploded { x: ARENA_WIDTH - 8.0, y: 400.0 }));
    }

    #[test]
    fn corner_bounce_counts_once() {
        let mut b = bullet(-5.0, TOP_MARGIN - 5.0, 0.3, 0.0, Uuid::new_v4());
        assert!(PhysicsSystem::bounce_off_walls(&mut b));
        assert_eq!(b.x, 8.0);
        assert_eq!(b.y, TOP_MARGIN + 8.0);
        assert_eq!(b.angle, -(PI - 0.3));

        let mut state = ArenaState::new();
        state.bullets.push(bullet(-5.0, TOP_MARGIN - 5.0, 0.3, 0.0, Uuid::new_v4()));
        PhysicsSystem::step(&mut state, &mut rng());
        assert_eq!(state.bullets[0].bounces, 1);
    }

    #[test]
    fn bottom_wall_negates_angle() {
        let mut b = bullet(700.0, TOP_MARGIN + ARENA_HEIGHT, 1.0, 0.0, Uuid::new_v4());
        assert!(PhysicsSystem::bounce_off_walls(&mut b));
        assert_eq!(b.y, TOP_MARGIN + ARENA_HEIGHT - 8.0);
        assert_eq!(b.angle, -1.0);
    }

    #[test]
    fn bullet_expires_after_exceeding_bounce_budget() {
        let mut state = ArenaState::new();
        let mut b = bullet(2.0, 400.0, PI, 6.0, Uuid::new_v4());
        b.bounces = 1;
        state.bullets.push(b);

        let events = PhysicsSystem::step(&mut state, &mut rng());

        assert!(state.bullets.is_empty());
        assert_eq!(count(&events, exploded), 1);
    }

    #[test]
    fn lethal_hit_respawns_at_full_health() {
        let owner = Uuid::new_v4();
        let victim = Uuid::new_v4();
        let mut state = ArenaState::new();
        let mut t = tank(500.0, 500.0, 40.0);
        t.health = 1;
        state.tanks.insert(victim, t);
        state.bullets.push(bullet(520.0, 520.0, 0.0, 0.0, owner));

        let events = PhysicsSystem::step(&mut state, &mut rng());

        let respawned = &state.tanks[&victim];
        assert_eq!(respawned.health, STARTING_HEALTH);
        assert!(events.iter().any(|e| matches!(
            e.msg,
            ServerMsg::TankDamaged { health: 0, .. }
        )));
        assert!(events.iter().any(|e| matches!(
            &e.msg,
            ServerMsg::TankRespawned { sid, tank } if *sid == victim && tank == respawned
        )));
    }

    #[test]
    fn health_stays_in_range_under_sustained_fire() {
        let owner = Uuid::new_v4();
        let victim = Uuid::new_v4();
        let mut state = ArenaState::new();
        state.tanks.insert(victim, tank(500.0, 500.0, 40.0));
        let mut rng = rng();

        for _ in 0..200 {
            let (cx, cy) = state.tanks[&victim].center();
            state.bullets.push(bullet(cx, cy, 0.0, 0.0, owner));
            PhysicsSystem::step(&mut state, &mut rng);

            let t = &state.tanks[&victim];
            assert!(t.health > 0 && t.health <= t.max_health);
        }
    }

    #[test]
    fn respawn_position_stays_inside_arena() {
        let mut rng = rng();
        for size in [1.0, 40.0, 300.0, 799.0] {
            for _ in 0..1000 {
                let (x, y) = PhysicsSystem::respawn_position(size, &mut rng);
                assert!(x >= 0.0 && x < ARENA_WIDTH - size);
                assert!(y >= TOP_MARGIN && y < TOP_MARGIN + ARENA_HEIGHT - size);
            }
        }
    }

    #[test]
    fn respawn_is_reproducible_for_a_seed() {
        let a = PhysicsSystem::respawn_position(40.0, &mut ChaCha8Rng::seed_from_u64(99));
        let b = PhysicsSystem::respawn_position(40.0, &mut ChaCha8Rng::seed_from_u64(99));
        assert_eq!(a, b);
    }
}
