//! Headless симуляция GRAVEWARD
//!
//! Гоняет боевую сцену без рендера: отряд врагов против игроков
//! с призванным юнитом, игроки огрызаются входящим уроном.

use bevy::prelude::*;
use graveward_simulation::{
    create_headless_app, spawn_enemy, spawn_player, spawn_summon, step, AggroTable,
    DamageInflicted, Enemy, EnemyArchetype, Health, ScenePool, SimulationPlugin,
};

fn main() {
    let seed = 42;
    println!("Starting GRAVEWARD headless simulation (seed: {})", seed);

    let mut app = create_headless_app(seed);
    app.add_plugins(SimulationPlugin);

    // Сцена: 3 врага, 2 игрока, 1 призванный юнит
    let world = app.world_mut();
    let mut players = Vec::new();

    let mut commands = world.commands();
    players.push(spawn_player(&mut commands, Vec3::new(10.0, 0.0, 0.0)));
    players.push(spawn_player(&mut commands, Vec3::new(12.0, 0.0, 3.0)));
    spawn_summon(&mut commands, Some(players[0]), Vec3::new(8.0, 0.0, -2.0), 40);

    world.resource_scope(|world, mut scene_pool: Mut<ScenePool>| {
        world.resource_scope(|world, mut aggro: Mut<AggroTable>| {
            let mut commands = world.commands();
            let archetypes = [
                EnemyArchetype::husk(),
                EnemyArchetype::stalker(),
                EnemyArchetype::warden(),
            ];
            for (index, archetype) in archetypes.iter().enumerate() {
                let position = Vec3::new(-8.0 - index as f32 * 2.0, 0.0, index as f32 * 3.0);
                if let Err(err) =
                    spawn_enemy(&mut commands, &mut scene_pool, &mut aggro, archetype, position)
                {
                    eprintln!("spawn skipped: {}", err);
                }
            }
        });
    });

    // 1800 тиков = 30 секунд боя
    for tick in 0..1800u32 {
        // Игроки огрызаются: 6 урона ближайшему врагу каждые полсекунды
        if tick % 30 == 0 {
            let world = app.world_mut();
            let mut query = world.query_filtered::<(Entity, &Health), With<Enemy>>();
            let target = query
                .iter(world)
                .filter(|(_, health)| health.is_alive())
                .map(|(entity, _)| entity)
                .next();
            if let Some(target) = target {
                world.send_event(DamageInflicted {
                    attacker: players[0],
                    target,
                    amount: 6,
                });
            }
        }

        step(&mut app);

        if tick % 300 == 0 {
            let world = app.world_mut();
            let mut query = world.query_filtered::<&Health, With<Enemy>>();
            let alive = query.iter(world).filter(|h| h.is_alive()).count();
            println!(
                "Tick {}: {} entities, {} enemies alive",
                tick,
                world.entities().len(),
                alive
            );
        }
    }

    println!("Simulation complete!");
}
