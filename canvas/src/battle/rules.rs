//! Tunable battle constants.

/// Gameplay and sync tuning for one battle. The defaults are what rooms play
/// with; tests and the server config override individual fields.
#[derive(Debug, Clone, PartialEq)]
pub struct BattleRules {
    pub player_radius: f64,
    /// World units per frame at full input.
    pub player_speed: f64,
    pub projectile_speed: f64,
    pub projectile_radius: f64,
    /// Owned projectiles farther than this from the local player are retired.
    pub projectile_max_distance: f64,
    pub shot_cooldown_ms: i64,
    /// Interval between position republishes of locally owned projectiles.
    pub projectile_sync_ms: i64,
    /// Interval between host enemy snapshots.
    pub enemy_sync_ms: i64,
    /// Interval between local player position publishes.
    pub position_sync_ms: i64,
    pub enemy_speed: f64,
    pub enemy_health: f64,
    /// Centroid-to-player distance under which enemy segments are tested.
    pub trigger_radius: f64,
    /// Health drained per frame of overlap.
    pub damage_per_frame: f64,
    /// Projectiles skip enemies whose centroid is farther than this.
    pub broad_phase_radius: f64,
    pub growth_enabled: bool,
    /// Scale added per frame when growth is enabled.
    pub growth_rate: f64,
    pub max_scale: f64,
}

impl Default for BattleRules {
    fn default() -> Self {
        Self {
            player_radius: 20.0,
            player_speed: 5.0,
            projectile_speed: 10.0,
            projectile_radius: 5.0,
            projectile_max_distance: 1500.0,
            shot_cooldown_ms: 200,
            projectile_sync_ms: 100,
            enemy_sync_ms: 125,
            position_sync_ms: 50,
            enemy_speed: 1.0,
            enemy_health: 1.0,
            trigger_radius: 100.0,
            damage_per_frame: 0.5,
            broad_phase_radius: 500.0,
            growth_enabled: false,
            growth_rate: 0.001,
            max_scale: 2.0,
        }
    }
}
