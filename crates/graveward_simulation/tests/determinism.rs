//! Determinism test
//!
//! Один seed + одинаковый сценарий + одинаковое число тиков ⇒
//! побитово одинаковое состояние мира. Все источники случайности —
//! DeterministicRng, всё время — SimClock.

use bevy::prelude::*;
use graveward_simulation::*;

/// Скриптованный бой: 3 врага против 2 игроков с призванным юнитом
fn run_scenario(seed: u64, ticks: usize) -> Vec<u8> {
    let mut app = create_headless_app(seed);
    app.add_plugins(SimulationPlugin);

    let world = app.world_mut();
    let player = {
        let mut commands = world.commands();
        let player = spawn_player(&mut commands, Vec3::new(9.0, 0.0, 0.0));
        spawn_player(&mut commands, Vec3::new(11.0, 0.0, 4.0));
        spawn_summon(&mut commands, Some(player), Vec3::new(7.0, 0.0, -2.0), 40);
        player
    };

    world.resource_scope(|world, mut scene_pool: Mut<ScenePool>| {
        world.resource_scope(|world, mut aggro: Mut<AggroTable>| {
            let mut commands = world.commands();
            let archetypes = [
                EnemyArchetype::husk(),
                EnemyArchetype::stalker(),
                EnemyArchetype::warden(),
            ];
            for (index, archetype) in archetypes.iter().enumerate() {
                spawn_enemy(
                    &mut commands,
                    &mut scene_pool,
                    &mut aggro,
                    archetype,
                    Vec3::new(-7.0 - index as f32 * 2.0, 0.0, index as f32 * 2.5),
                )
                .expect("pool has capacity");
            }
        });
    });

    for tick in 0..ticks {
        // Скриптованный входящий урон (часть сценария, тоже детерминирован)
        if tick % 45 == 0 {
            let world = app.world_mut();
            let mut query = world.query_filtered::<(Entity, &Health), With<Enemy>>();
            let target = query
                .iter(world)
                .filter(|(_, health)| health.is_alive())
                .map(|(entity, _)| entity)
                .next();
            if let Some(target) = target {
                world.send_event(DamageInflicted {
                    attacker: player,
                    target,
                    amount: 7,
                });
            }
        }

        step(&mut app);
    }

    // Snapshot: здоровье + позиции + боевые состояния
    let world = app.world_mut();
    let mut snapshot = world_snapshot::<Health>(world);
    snapshot.extend(world_snapshot::<Transform>(world));
    snapshot.extend(world_snapshot::<CombatState>(world));
    snapshot
}

/// Тест: 3 прогона с одним seed дают идентичные снапшоты
#[test]
fn test_same_seed_three_runs_identical() {
    const SEED: u64 = 42;
    const TICKS: usize = 600;

    let snapshot1 = run_scenario(SEED, TICKS);
    let snapshot2 = run_scenario(SEED, TICKS);
    let snapshot3 = run_scenario(SEED, TICKS);

    assert_eq!(snapshot1, snapshot2, "determinism failed: run 1 != run 2");
    assert_eq!(snapshot2, snapshot3, "determinism failed: run 2 != run 3");
}

/// Тест: другой seed даёт другое развитие боя
///
/// Warden выбирает способности weighted random'ом — при другом seed
/// за 600 тиков последовательность выборов расходится.
#[test]
fn test_different_seed_diverges() {
    const TICKS: usize = 600;

    let snapshot_a = run_scenario(42, TICKS);
    let snapshot_b = run_scenario(1337, TICKS);

    assert_ne!(snapshot_a, snapshot_b, "different seeds should diverge");
}
