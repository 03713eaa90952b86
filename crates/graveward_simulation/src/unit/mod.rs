//! Unit — composition root врага
//!
//! Связывает в одном entity: pooled scene handle, строку AggroTable,
//! steering и боевой автомат. Спавн идёт через scene pool (политика
//! Fail: нет слота — спавн пропускается), смерть — через death linger
//! с возвратом handle и teardown aggro строки.
//!
//! Архетипы data-driven: новая разновидность врага — новая таблица
//! статов/способностей, не новый control flow.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggro::AggroTable;
use crate::combat::{
    AbilityBook, AbilitySelect, AbilitySpec, CombatState, Cooldowns, EnemyDied, SummonMinions,
};
use crate::components::{Actor, Enemy, Health, Player, StatusEffects, Summoned, FACTION_DEFENDERS, FACTION_HOSTILE};
use crate::pool::{PoolExhausted, ScenePool, SceneSlot};
use crate::steering::{PursuitTarget, Steering, SteeringState};
use crate::{SimClock, SimSet};

/// Сколько секунд труп остаётся в мире (death animation linger)
pub const DEATH_LINGER: f32 = 1.2;

/// Таблица статов архетипа врага (serde: грузится из данных)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyArchetype {
    pub name: String,
    pub max_health: u32,
    pub steering: Steering,
    pub abilities: Vec<AbilitySpec>,
    pub policy: AbilitySelect,
}

impl EnemyArchetype {
    /// Husk — рядовой melee враг
    pub fn husk() -> Self {
        Self {
            name: "husk".to_string(),
            max_health: 60,
            steering: Steering::default(),
            abilities: vec![AbilitySpec::cleave()],
            policy: AbilitySelect::PriorityByRange,
        }
    }

    /// Stalker — melee + снаряд на дистанции
    pub fn stalker() -> Self {
        Self {
            name: "stalker".to_string(),
            max_health: 45,
            steering: Steering {
                base_speed: 3.6,
                ..Steering::default()
            },
            abilities: vec![AbilitySpec::cleave(), AbilitySpec::bolt()],
            policy: AbilitySelect::PriorityByRange,
        }
    }

    /// Warden — элитный враг со спец-набором (weighted random выбор)
    pub fn warden() -> Self {
        Self {
            name: "warden".to_string(),
            max_health: 160,
            steering: Steering {
                base_speed: 2.4,
                separation_radius: 3.0,
                ..Steering::default()
            },
            abilities: vec![
                AbilitySpec::cleave(),
                AbilitySpec::pull(),
                AbilitySpec::teleport(),
                AbilitySpec::summon(),
            ],
            policy: AbilitySelect::WeightedRandom,
        }
    }
}

/// Таймер деспавна после смерти
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct DeathLinger {
    pub timer: f32,
}

/// Spawn helper: создать врага по архетипу
///
/// Берёт scene handle из пула (исчерпание → Err, caller пропускает
/// спавн), заводит aggro строку, собирает полный bundle.
pub fn spawn_enemy(
    commands: &mut Commands,
    scene_pool: &mut ScenePool,
    aggro: &mut AggroTable,
    archetype: &EnemyArchetype,
    position: Vec3,
) -> Result<Entity, PoolExhausted> {
    let handle = scene_pool.0.acquire()?;

    let book = AbilityBook::new(archetype.abilities.clone(), archetype.policy);
    let cooldowns = Cooldowns::for_book(&book);

    // Steering подходит на дистанцию самой короткой способности
    let mut steering = archetype.steering.clone();
    steering.stop_distance = book.shortest_range() * 0.85;

    let entity = commands
        .spawn((
            Transform::from_translation(position),
            Enemy,
            Actor {
                faction_id: FACTION_HOSTILE,
            },
            Health::new(archetype.max_health),
            StatusEffects::default(),
            steering,
            SteeringState::default(),
            PursuitTarget::None,
            book,
            cooldowns,
            CombatState::default(),
            SceneSlot(handle),
        ))
        .id();

    aggro.initialize_enemy(entity);

    crate::log(&format!(
        "👹 Spawned '{}' {:?} at {:?}",
        archetype.name, entity, position
    ));

    Ok(entity)
}

/// Spawn helper: игрок (headless мир)
pub fn spawn_player(commands: &mut Commands, position: Vec3) -> Entity {
    commands
        .spawn((
            Transform::from_translation(position),
            Player,
            Actor {
                faction_id: FACTION_DEFENDERS,
            },
            Health::new(100),
        ))
        .id()
}

/// Spawn helper: призванный юнит игрока
pub fn spawn_summon(
    commands: &mut Commands,
    owner: Option<Entity>,
    position: Vec3,
    max_health: u32,
) -> Entity {
    commands
        .spawn((
            Transform::from_translation(position),
            Summoned { owner },
            Actor {
                faction_id: FACTION_DEFENDERS,
            },
            Health::new(max_health),
        ))
        .id()
}

/// Система: обработка смертей врагов
///
/// EnemyDied → Dead state + DeathLinger. Активный каст обрывается
/// сменой состояния; деспавн и возврат в пул — после linger.
pub fn handle_enemy_deaths(
    mut died: EventReader<EnemyDied>,
    mut commands: Commands,
    mut enemies: Query<(&mut CombatState, &mut PursuitTarget), With<Enemy>>,
) {
    for event in died.read() {
        if let Ok((mut state, mut pursuit)) = enemies.get_mut(event.entity) {
            *state = CombatState::Dead;
            *pursuit = PursuitTarget::None;
        }

        if let Ok(mut entity_commands) = commands.get_entity(event.entity) {
            entity_commands.insert(DeathLinger {
                timer: DEATH_LINGER,
            });
        }
    }
}

/// Система: деспавн после death linger
///
/// Возвращает scene handle в пул, выбрасывает aggro строку врага и его
/// упоминания в чужих строках, деспавнит entity.
pub fn despawn_after_linger(
    clock: Res<SimClock>,
    mut commands: Commands,
    mut scene_pool: ResMut<ScenePool>,
    mut aggro: ResMut<AggroTable>,
    mut lingering: Query<(Entity, &mut DeathLinger, Option<&SceneSlot>)>,
) {
    let dt = clock.delta;

    for (entity, mut linger, slot) in lingering.iter_mut() {
        linger.timer -= dt;
        if linger.timer > 0.0 {
            continue;
        }

        if let Some(slot) = slot {
            scene_pool.0.release(slot.0);
        }
        aggro.remove_enemy(entity);
        aggro.remove_target(entity);

        crate::log(&format!("🕳️ Enemy {:?} despawned (linger over)", entity));
        commands.entity(entity).despawn();
    }
}

/// Система: чистка aggro от умерших целей
///
/// Мёртвый призванный юнит убирается из всех строк (removeTarget);
/// живым он больше не станет.
pub fn purge_dead_targets(
    mut aggro: ResMut<AggroTable>,
    summons: Query<(Entity, &Health), With<Summoned>>,
) {
    for (entity, health) in summons.iter() {
        if !health.is_alive() {
            aggro.remove_target(entity);
        }
    }
}

/// Система: призыв миньонов (способность Summon)
///
/// Миньоны проходят через тот же pooled spawner; исчерпание пула —
/// пропуск спавна с warning, не ошибка.
pub fn spawn_summoned_minions(
    mut events: EventReader<SummonMinions>,
    mut commands: Commands,
    mut scene_pool: ResMut<ScenePool>,
    mut aggro: ResMut<AggroTable>,
) {
    for event in events.read() {
        let archetype = EnemyArchetype::husk();

        for index in 0..event.count {
            // Кольцо вокруг призывателя (детерминированно по индексу)
            let angle = std::f32::consts::TAU * (index as f32 / event.count.max(1) as f32);
            let offset = Vec3::new(angle.sin(), 0.0, angle.cos()) * 2.5;

            match spawn_enemy(
                &mut commands,
                &mut scene_pool,
                &mut aggro,
                &archetype,
                event.position + offset,
            ) {
                Ok(minion) => {
                    crate::log(&format!(
                        "🌑 Warden {:?} summoned minion {:?}",
                        event.summoner, minion
                    ));
                }
                Err(PoolExhausted) => {
                    crate::log_warning(&format!(
                        "⚠️ Summon skipped: scene pool exhausted (summoner {:?})",
                        event.summoner
                    ));
                }
            }
        }
    }
}

/// Unit Plugin (lifecycle: смерти, деспавн, призывы)
pub struct UnitPlugin;

impl Plugin for UnitPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            (
                handle_enemy_deaths,
                purge_dead_targets,
                spawn_summoned_minions,
                despawn_after_linger,
            )
                .chain()
                .in_set(SimSet::Cleanup),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archetypes_have_abilities() {
        for archetype in [
            EnemyArchetype::husk(),
            EnemyArchetype::stalker(),
            EnemyArchetype::warden(),
        ] {
            assert!(!archetype.abilities.is_empty(), "{}", archetype.name);
            assert!(archetype.max_health > 0);
            assert!(archetype.steering.base_speed > 0.0);
        }
    }

    #[test]
    fn test_warden_uses_weighted_selection() {
        let warden = EnemyArchetype::warden();
        assert_eq!(warden.policy, AbilitySelect::WeightedRandom);
        assert!(warden.abilities.len() >= 4);
    }
}
