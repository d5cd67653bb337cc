//! Battle-start entity creation.

#[cfg(test)]
#[path = "spawn_test.rs"]
mod spawn_test;

use rand::Rng;

use super::entities::{Enemy, Player};
use super::rules::BattleRules;
use crate::consts::{PLAYER_COLORS, PLAYER_MAX_HEALTH};
use crate::doc::Stroke;
use crate::geom::Bounds;
use crate::presence::Member;

/// Deterministic enemy id for the stroke it was spawned from.
#[must_use]
pub fn enemy_id(stroke_id: &str) -> String {
    format!("enemy-{stroke_id}")
}

/// One enemy per drawable stroke. Every peer derives the same set.
#[must_use]
pub fn spawn_enemies(strokes: &[Stroke], rules: &BattleRules) -> Vec<Enemy> {
    let mut drawable: Vec<&Stroke> = strokes.iter().filter(|s| s.is_drawable()).collect();
    drawable.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    drawable
        .into_iter()
        .filter_map(|stroke| {
            let mut enemy =
                Enemy::from_path(enemy_id(&stroke.id), &stroke.path, stroke.color.clone(), rules.enemy_speed, rules.enemy_health)?;
            if rules.growth_enabled {
                enemy.growth_rate = rules.growth_rate;
                enemy.max_scale = rules.max_scale;
            }
            Some(enemy)
        })
        .collect()
}

/// One full-health player per member at a random point inside `area`.
/// Colors follow sorted member order so every peer agrees on them.
pub fn spawn_players(members: &[Member], area: Bounds, rules: &BattleRules, rng: &mut impl Rng) -> Vec<Player> {
    let mut sorted: Vec<&Member> = members.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, member)| Player {
            id: member.id.clone(),
            x: rng.random_range(area.min_x..=area.max_x),
            y: rng.random_range(area.min_y..=area.max_y),
            radius: rules.player_radius,
            color: PLAYER_COLORS[i % PLAYER_COLORS.len()].to_string(),
            speed: rules.player_speed,
            is_alive: true,
            health: PLAYER_MAX_HEALTH,
            username: member.username.clone(),
            avatar_url: member.avatar_url.clone(),
        })
        .collect()
}
