//! GRAVEWARD Simulation Core
//!
//! Headless ECS-симуляция боевого AI врагов на Bevy 0.16:
//! aggro-таблица выбора целей, steering движение, многофазный боевой
//! автомат и bounded resource pool для scene containers.
//!
//! Архитектура:
//! - Single-threaded по смыслу: один тик = один прогон FixedUpdate,
//!   системы в жёстко упорядоченных SimSet'ах
//! - Всё время — от SimClock (тиковый clock с фиксированным SIM_DT);
//!   никаких отложенных callbacks, любой таймер = start timestamp +
//!   сравнение на каждом тике. Симуляция отменяется простым
//!   прекращением тиков и тестируется с fake clock
//! - Сервисы (AggroTable, ScenePool) — ресурсы, созданные корнем
//!   и инжектированные в системы; глобального состояния нет
//! - Рендер/звук/сеть — снаружи: граница только из событий

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod aggro;
pub mod combat;
pub mod components;
pub mod logger;
pub mod pool;
pub mod steering;
pub mod unit;

// Re-export базовых типов для удобства
pub use aggro::{AggroTable, AggroTuning, TargetCandidate};
pub use combat::{
    AbilityBook, AbilityKind, AbilitySelect, AbilitySpec, CombatPlugin, CombatState, Cooldowns,
    DamageDealt, DamageInflicted, EffectCompleted, EffectKind, EffectTriggered, EnemyDied,
    ForcedDisplacement,
};
pub use components::*;
pub use logger::{
    init_logger, log, log_error, log_info, log_warning, set_log_level, set_logger, LogLevel,
    LogPrinter,
};
pub use pool::{
    ExhaustionPolicy, PoolConfig, PoolExhausted, PoolHandle, ResourcePool, SceneContainer,
    ScenePool, SceneSlot,
};
pub use steering::{PositionChanged, PursuitTarget, Steering, SteeringPlugin, SteeringState};
pub use unit::{
    spawn_enemy, spawn_player, spawn_summon, DeathLinger, EnemyArchetype, UnitPlugin,
};

/// Длительность одного simulation тика (60Hz)
pub const SIM_DT: f32 = 1.0 / 60.0;

/// Seed по умолчанию
const DEFAULT_SEED: u64 = 42;

/// Порядок фаз тика
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimSet {
    /// Продвижение SimClock
    Clock,
    /// Steering: движение + поворот + рассылка позиций
    Steering,
    /// Combat: выбор цели, фазы атаки
    Combat,
    /// Применение урона и перемещений
    Damage,
    /// Смерти, деспавн, призывы
    Cleanup,
}

/// Тиковый clock симуляции
///
/// Продвигается на константный SIM_DT каждый прогон FixedUpdate —
/// время полностью детерминировано и не зависит от wall clock.
#[derive(Resource, Debug, Clone)]
pub struct SimClock {
    pub tick: u64,
    /// Фиксированная дельта тика (секунды)
    pub delta: f32,
    /// Прошедшее simulation время (секунды)
    pub elapsed: f64,
}

impl Default for SimClock {
    fn default() -> Self {
        Self {
            tick: 0,
            delta: SIM_DT,
            elapsed: 0.0,
        }
    }
}

/// Система: продвижение SimClock (первая в тике)
pub fn advance_sim_clock(mut clock: ResMut<SimClock>) {
    clock.tick += 1;
    clock.elapsed += SIM_DT as f64;
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Главный plugin симуляции (объединяет все подсистемы)
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        // Fixed timestep 60Hz для клиентов, которые гонят App::update();
        // headless драйвер использует step() и тикает схему напрямую
        app.insert_resource(Time::<Fixed>::from_hz(60.0));

        app.init_resource::<SimClock>()
            .init_resource::<AggroTable>()
            .init_resource::<ScenePool>();

        // Не перетираем seed, выставленный create_headless_app
        if !app.world().contains_resource::<DeterministicRng>() {
            app.insert_resource(DeterministicRng::new(DEFAULT_SEED));
        }

        app.configure_sets(
            FixedUpdate,
            (
                SimSet::Clock,
                SimSet::Steering,
                SimSet::Combat,
                SimSet::Damage,
                SimSet::Cleanup,
            )
                .chain(),
        );

        app.add_systems(FixedUpdate, advance_sim_clock.in_set(SimSet::Clock));

        app.add_plugins((SteeringPlugin, CombatPlugin, UnitPlugin));
    }
}

/// Создаёт minimal Bevy App для headless симуляции
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(DeterministicRng::new(seed));

    app
}

/// Прогоняет ровно один simulation тик
///
/// Требует добавленного SimulationPlugin. Queued commands (спавны
/// снаружи) применяются перед тиком.
pub fn step(app: &mut App) {
    app.world_mut().flush();
    app.world_mut().run_schedule(FixedUpdate);
}

/// Snapshot мира для сравнения детерминизма
///
/// Debug-сериализация компонента, отсортированная по Entity ID.
pub fn world_snapshot<T: Component>(world: &mut World) -> Vec<u8>
where
    T: std::fmt::Debug,
{
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();

    // Сортируем по Entity ID для детерминизма
    entities.sort_by_key(|(entity, _)| entity.index());

    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
