//! Client event handlers
//!
//! Each handler mutates the arena synchronously and returns the messages it wants
//! delivered. None of them perform I/O.

use crate::ws::protocol::ServerMsg;

use super::state::{ArenaState, FireOrder, TankPatch, TankSeed};
use super::{ArenaError, ConnectionId, Outbound};

/// Insert the caller's tank at full health.
///
/// The caller receives the full arena, everyone else a `tank_joined` delta. A rejoin by the
/// same connection replaces its tank.
pub fn join(
    state: &mut ArenaState,
    sid: ConnectionId,
    seed: Option<TankSeed>,
) -> Result<Vec<Outbound>, ArenaError> {
    let tank = seed.ok_or(ArenaError::InvalidEntity("tank"))?.into_tank()?;

    state.tanks.insert(sid, tank.clone());

    Ok(vec![
        Outbound::only(sid, ServerMsg::ArenaState(state.clone())),
        Outbound::all_except(sid, ServerMsg::TankJoined { sid, tank }),
    ])
}

/// Merge a patch into the caller's tank; silently ignored if the caller has none.
pub fn move_tank(state: &mut ArenaState, sid: ConnectionId, patch: TankPatch) -> Vec<Outbound> {
    let Some(tank) = state.tanks.get_mut(&sid) else {
        return Vec::new();
    };

    patch.apply(tank);

    vec![Outbound::all_except(
        sid,
        ServerMsg::TankUpdate {
            sid,
            tank: tank.clone(),
        },
    )]
}

/// Append a bullet owned by the caller. Position and angle are not validated; the wall
/// clamp in the stepper pulls stray bullets back into the arena.
pub fn fire(state: &mut ArenaState, sid: ConnectionId, order: FireOrder) -> Vec<Outbound> {
    let bullet = order.into_bullet(sid);
    state.bullets.push(bullet.clone());

    vec![Outbound::all(ServerMsg::BulletAdd(bullet))]
}

/// Remove the caller's tank. Repeated calls after the first are no-ops.
pub fn leave(state: &mut ArenaState, sid: ConnectionId) -> Vec<Outbound> {
    if state.tanks.remove(&sid).is_none() {
        return Vec::new();
    }

    vec![Outbound::all(ServerMsg::TankLeft { sid })]
}
