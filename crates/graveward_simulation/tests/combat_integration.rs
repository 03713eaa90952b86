//! Combat integration tests
//!
//! Полный цикл headless: спавн через pool → aggro → steering →
//! charge/strike/recover → урон → смерть → teardown.
//!
//! Тики гоняем через step() — время детерминировано, никакой
//! зависимости от wall clock.

use bevy::prelude::*;
use graveward_simulation::*;

/// Helper: полный combat App
fn create_combat_app(seed: u64) -> App {
    let mut app = create_headless_app(seed);
    app.add_plugins(SimulationPlugin);
    app
}

fn step_n(app: &mut App, ticks: usize) {
    for _ in 0..ticks {
        step(app);
    }
}

/// Helper: спавн врага через pool + aggro (как это делает игра)
fn spawn_test_enemy(app: &mut App, archetype: &EnemyArchetype, position: Vec3) -> Entity {
    let mut spawned = None;
    let world = app.world_mut();
    world.resource_scope(|world, mut scene_pool: Mut<ScenePool>| {
        world.resource_scope(|world, mut aggro: Mut<AggroTable>| {
            let mut commands = world.commands();
            spawned =
                spawn_enemy(&mut commands, &mut scene_pool, &mut aggro, archetype, position).ok();
        });
    });
    world.flush();
    spawned.expect("scene pool must have capacity in tests")
}

fn spawn_test_player(app: &mut App, position: Vec3) -> Entity {
    let world = app.world_mut();
    let entity = spawn_player(&mut world.commands(), position);
    world.flush();
    entity
}

fn drain_events<E: Event>(app: &mut App) -> Vec<E> {
    app.world_mut().resource_mut::<Events<E>>().drain().collect()
}

/// Архетип с точными таймингами для проверки фаз
fn jab_archetype() -> EnemyArchetype {
    EnemyArchetype {
        name: "test_jab".to_string(),
        max_health: 60,
        steering: Steering::default(),
        abilities: vec![AbilitySpec {
            name: "jab".to_string(),
            kind: AbilityKind::Melee,
            damage: 10,
            range: 3.0,
            cone_half_angle: 0.9,
            cooldown: 5.0,
            charge_duration: 0.5,
            strike_duration: 0.3,
            hit_delay: 0.1,
            recovery_duration: 0.2,
            weight: 1.0,
            effect: EffectKind::SlashArc,
        }],
        policy: AbilitySelect::PriorityByRange,
    }
}

/// Тест: цикл charge→strike→recover наносит урон ровно один раз,
/// и только после телеграфа
#[test]
fn test_single_cycle_deals_damage_exactly_once() {
    let mut app = create_combat_app(42);

    let player = spawn_test_player(&mut app, Vec3::new(1.5, 0.0, 0.0));
    let _enemy = spawn_test_enemy(&mut app, &jab_archetype(), Vec3::ZERO);

    // Телеграф 0.5s = 30 тиков: за 25 тиков урона быть не может
    step_n(&mut app, 25);
    assert!(
        drain_events::<DamageDealt>(&mut app).is_empty(),
        "no damage before charge completes"
    );

    // Телеграф при этом уже выпущен
    let effects = drain_events::<EffectTriggered>(&mut app);
    assert!(
        effects.iter().any(|e| e.kind == EffectKind::ChargeTelegraph),
        "telegraph effect must fire at charge start"
    );

    // К 80-му тику strike отработал; cooldown 5s не пускает второй цикл
    step_n(&mut app, 55);
    let dealt = drain_events::<DamageDealt>(&mut app);
    assert_eq!(dealt.len(), 1, "damage applies exactly once per cycle");
    assert_eq!(dealt[0].target, player);
    assert_eq!(dealt[0].kind, TargetKind::Player);
    assert_eq!(dealt[0].damage, 10);

    let health = app.world().get::<Health>(player).unwrap();
    assert_eq!(health.current, 90);

    // И strike эффект тоже был
    let effects = drain_events::<EffectTriggered>(&mut app);
    assert!(effects.iter().any(|e| e.kind == EffectKind::SlashArc));
}

/// Тест: смерть цели в середине замаха отменяет каст без урона,
/// cooldown остаётся потраченным
#[test]
fn test_target_death_mid_charge_abandons_cast() {
    let mut app = create_combat_app(42);

    let player = spawn_test_player(&mut app, Vec3::new(1.5, 0.0, 0.0));
    let enemy = spawn_test_enemy(&mut app, &jab_archetype(), Vec3::ZERO);

    // Замах начался
    step_n(&mut app, 10);
    let state = app.world().get::<CombatState>(enemy).unwrap();
    assert!(
        matches!(state, CombatState::Charging { .. }),
        "enemy must be mid-charge, got {:?}",
        state
    );
    drain_events::<DamageDealt>(&mut app);

    // Цель умирает
    app.world_mut().get_mut::<Health>(player).unwrap().current = 0;

    step_n(&mut app, 30);

    // Урона нет, автомат вернулся в Idle
    assert!(
        drain_events::<DamageDealt>(&mut app).is_empty(),
        "abandoned cast must not deal damage"
    );
    let state = app.world().get::<CombatState>(enemy).unwrap();
    assert_eq!(*state, CombatState::Idle);

    // Cooldown списан как использованный, не возвращён
    let cooldowns = app.world().get::<Cooldowns>(enemy).unwrap();
    assert!(
        cooldowns.0[0] > 0.0,
        "cooldown must stay consumed after abandonment"
    );
}

/// Тест: исчерпание scene pool пропускает спавн (политика Fail)
#[test]
fn test_spawn_skipped_when_pool_exhausted() {
    let mut app = create_combat_app(42);
    app.insert_resource(ScenePool::with_capacity(2));

    let archetype = EnemyArchetype::husk();
    let mut results = Vec::new();

    let world = app.world_mut();
    world.resource_scope(|world, mut scene_pool: Mut<ScenePool>| {
        world.resource_scope(|world, mut aggro: Mut<AggroTable>| {
            let mut commands = world.commands();
            for index in 0..3 {
                results.push(spawn_enemy(
                    &mut commands,
                    &mut scene_pool,
                    &mut aggro,
                    &archetype,
                    Vec3::new(index as f32 * 3.0, 0.0, 0.0),
                ));
            }
        });
    });
    world.flush();

    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert_eq!(results[2], Err(PoolExhausted), "third spawn must be skipped");

    let pool = &app.world().resource::<ScenePool>().0;
    assert_eq!(pool.in_use(), 2);
    assert!(pool.available() + pool.in_use() <= pool.max_size());
}

/// Тест: смерть врага → death linger → release пула, teardown aggro, деспавн
#[test]
fn test_enemy_death_releases_pool_slot() {
    let mut app = create_combat_app(42);
    app.insert_resource(ScenePool::with_capacity(4));

    // Игрок далеко — бой не начинается, проверяем чистый lifecycle
    let player = spawn_test_player(&mut app, Vec3::new(40.0, 0.0, 0.0));
    let enemy = spawn_test_enemy(&mut app, &EnemyArchetype::husk(), Vec3::ZERO);
    assert_eq!(app.world().resource::<ScenePool>().0.in_use(), 1);

    step_n(&mut app, 5);

    // Добиваем входящим уроном (60 HP у husk)
    app.world_mut().send_event(DamageInflicted {
        attacker: player,
        target: enemy,
        amount: 100,
    });
    step_n(&mut app, 2);

    let died = drain_events::<EnemyDied>(&mut app);
    assert_eq!(died.len(), 1);
    assert_eq!(died[0].entity, enemy);

    let state = app.world().get::<CombatState>(enemy).unwrap();
    assert_eq!(*state, CombatState::Dead);

    // Death linger ещё держит труп в мире
    assert!(app.world().get_entity(enemy).is_ok());

    // После linger (1.2s = 72 тика) — деспавн и возврат слота
    step_n(&mut app, 80);
    assert!(app.world().get_entity(enemy).is_err(), "corpse must despawn");
    assert_eq!(app.world().resource::<ScenePool>().0.in_use(), 0);
}

/// Тест: урон по врагу тянет aggro к источнику
#[test]
fn test_damage_pulls_aggro_to_attacker() {
    let mut app = create_combat_app(42);

    // Два игрока: ближний и дальний
    let near = spawn_test_player(&mut app, Vec3::new(5.0, 0.0, 0.0));
    let far = spawn_test_player(&mut app, Vec3::new(0.0, 0.0, 15.0));
    let enemy = spawn_test_enemy(&mut app, &EnemyArchetype::husk(), Vec3::ZERO);

    step_n(&mut app, 3);

    // Без урона выбран ближний
    let pursuit = app.world().get::<PursuitTarget>(enemy).unwrap();
    assert_eq!(
        match pursuit {
            PursuitTarget::Entity { target, .. } => Some(*target),
            PursuitTarget::None => None,
        },
        Some(near)
    );

    // Дальний бьёт больно → aggro перевешивает hysteresis порог
    app.world_mut().send_event(DamageInflicted {
        attacker: far,
        target: enemy,
        amount: 40,
    });
    step_n(&mut app, 3);

    let pursuit = app.world().get::<PursuitTarget>(enemy).unwrap();
    assert_eq!(
        match pursuit {
            PursuitTarget::Entity { target, .. } => Some(*target),
            PursuitTarget::None => None,
        },
        Some(far),
        "damage aggro must switch pursuit to the attacker"
    );
}

/// Тест: stealth-evaded враг блуждает и не кастует
#[test]
fn test_stealth_evasion_wanders_without_casting() {
    let mut app = create_combat_app(42);

    let _player = spawn_test_player(&mut app, Vec3::new(2.0, 0.0, 0.0));
    let enemy = spawn_test_enemy(&mut app, &jab_archetype(), Vec3::ZERO);

    app.world_mut()
        .get_mut::<StatusEffects>(enemy)
        .unwrap()
        .stealth_evaded = true;

    let start = app.world().get::<Transform>(enemy).unwrap().translation;
    step_n(&mut app, 90);

    // Двигался (wander), но не атаковал
    let position = app.world().get::<Transform>(enemy).unwrap().translation;
    assert!(
        start.distance(position) > 0.5,
        "stealth-evaded enemy must wander"
    );
    assert!(drain_events::<DamageDealt>(&mut app).is_empty());
    assert!(drain_events::<EffectTriggered>(&mut app).is_empty());
}

/// Тест: frozen полностью блокирует движение и атаки
#[test]
fn test_frozen_suppresses_movement_and_attacks() {
    let mut app = create_combat_app(42);

    let _player = spawn_test_player(&mut app, Vec3::new(2.0, 0.0, 0.0));
    let enemy = spawn_test_enemy(&mut app, &jab_archetype(), Vec3::ZERO);

    app.world_mut()
        .get_mut::<StatusEffects>(enemy)
        .unwrap()
        .frozen = true;

    let start = app.world().get::<Transform>(enemy).unwrap().translation;
    step_n(&mut app, 90);

    let position = app.world().get::<Transform>(enemy).unwrap().translation;
    assert_eq!(start, position, "frozen enemy must not move");
    assert!(drain_events::<DamageDealt>(&mut app).is_empty());
}

/// Тест: маленькая орда дерётся 1000 тиков, инварианты держатся
#[test]
fn test_horde_runs_1000_ticks_with_invariants() {
    let mut app = create_combat_app(42);

    let player_a = spawn_test_player(&mut app, Vec3::new(8.0, 0.0, 0.0));
    let _player_b = spawn_test_player(&mut app, Vec3::new(10.0, 0.0, 4.0));
    {
        let world = app.world_mut();
        spawn_summon(&mut world.commands(), Some(player_a), Vec3::new(6.0, 0.0, -2.0), 40);
        world.flush();
    }

    spawn_test_enemy(&mut app, &EnemyArchetype::husk(), Vec3::new(-6.0, 0.0, 0.0));
    spawn_test_enemy(&mut app, &EnemyArchetype::stalker(), Vec3::new(-8.0, 0.0, 3.0));
    spawn_test_enemy(&mut app, &EnemyArchetype::warden(), Vec3::new(-10.0, 0.0, -3.0));

    for tick in 0..1000 {
        step(&mut app);

        if tick % 100 == 0 {
            let world = app.world_mut();
            let mut query = world.query::<&Health>();
            for health in query.iter(world) {
                assert!(
                    health.current <= health.max,
                    "tick {}: health invariant broken",
                    tick
                );
            }

            let pool = &world.resource::<ScenePool>().0;
            assert!(
                pool.available() + pool.in_use() <= pool.max_size(),
                "tick {}: pool invariant broken",
                tick
            );
        }
    }

    // Враги реально дрались
    let dealt = drain_events::<DamageDealt>(&mut app);
    assert!(!dealt.is_empty(), "enemies must have landed attacks");

    // Рассылка позиций шла, но rate-limited (меньше чем тиков × юнитов)
    let positions = drain_events::<PositionChanged>(&mut app);
    assert!(!positions.is_empty());
    assert!(positions.len() < 3000);
}
