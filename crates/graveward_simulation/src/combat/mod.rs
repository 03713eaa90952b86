//! Combat — боевой автомат, способности, урон
//!
//! ECS ответственность:
//! - Game state: CombatState фазы, Cooldowns, AbilityBook
//! - Combat rules: выбор цели (через AggroTable), конусный hit-test,
//!   однократное применение урона на смещении strike фазы
//! - Events: DamageDealt/EnemyDied/EffectTriggered наружу,
//!   DamageInflicted/EffectCompleted снаружи
//!
//! Внешний слой отвечает за рендер эффектов (телеграфы, slash arcs,
//! снаряды): симуляция только эмитит (kind, position, direction,
//! duration) и потребляет completion событие.

use bevy::prelude::*;

pub mod abilities;
pub mod hitbox;
pub mod state;
pub mod systems;

// Re-export основных типов
pub use abilities::{
    choose_ability, AbilityBook, AbilityKind, AbilitySelect, AbilitySpec, Cooldowns, EffectKind,
};
pub use hitbox::{cone_hit, flat_distance};
pub use state::CombatState;
pub use systems::{
    acquire_targets, advance_attack_phases, apply_forced_displacement, apply_inflicted_damage,
    apply_strike_damage, start_attacks, tick_cooldowns,
};

use crate::components::TargetKind;
use crate::SimSet;

// ============================================================================
// Events
// ============================================================================

/// Исходящее: визуальный эффект (телеграф, slash arc, снаряд, вспышка)
///
/// Симуляция не знает как это рендерится — только kind/позиция/
/// направление/длительность. Внешний слой ответит EffectCompleted.
#[derive(Event, Debug, Clone)]
pub struct EffectTriggered {
    pub kind: EffectKind,
    pub position: Vec3,
    pub direction: Vec3,
    /// Сколько эффект должен жить (секунды)
    pub duration: f32,
}

/// Входящее: внешний слой доиграл эффект
///
/// Информационное: все внутренние таймеры тиковые, геймплей на
/// completion не ждёт.
#[derive(Event, Debug, Clone)]
pub struct EffectCompleted {
    pub kind: EffectKind,
    pub position: Vec3,
}

/// Внутреннее: удар достал цель (детекция отделена от применения урона)
#[derive(Event, Debug, Clone)]
pub struct StrikeLanded {
    pub attacker: Entity,
    pub target: Entity,
    pub damage: u32,
}

/// Исходящее: урон нанесён цели (игроку или призванному юниту)
///
/// Потребители ветвятся по `kind`: урон игроку уходит его
/// авторитетному владельцу, урон призванному — системе призывов.
#[derive(Event, Debug, Clone)]
pub struct DamageDealt {
    pub attacker: Entity,
    pub target: Entity,
    pub kind: TargetKind,
    pub damage: u32,
    pub target_died: bool,
}

/// Входящее: внешний мир нанёс урон врагу (атака игрока/призванного)
///
/// Fire-and-forget: подтверждения не требуется. Урон конвертируется
/// в damage aggro источнику.
#[derive(Event, Debug, Clone)]
pub struct DamageInflicted {
    pub attacker: Entity,
    pub target: Entity,
    pub amount: u32,
}

/// Принудительное перемещение (pull цели, teleport самого юнита)
#[derive(Event, Debug, Clone)]
pub struct ForcedDisplacement {
    pub target: Entity,
    pub to: Vec3,
}

/// Исходящее: враг умер (триггерит release пула + teardown aggro строки)
#[derive(Event, Debug, Clone)]
pub struct EnemyDied {
    pub entity: Entity,
    pub killer: Option<Entity>,
}

/// Внутреннее: способность Summon призывает миньонов (спавнит unit слой)
#[derive(Event, Debug, Clone)]
pub struct SummonMinions {
    pub summoner: Entity,
    pub position: Vec3,
    pub count: u32,
}

/// Combat Plugin
///
/// Порядок выполнения (FixedUpdate):
/// 1. tick_cooldowns — обратный отсчёт cooldown слотов
/// 2. acquire_targets — снапшот целей + запрос AggroTable
/// 3. start_attacks — вход в замах (телеграф, cooldown списывается)
/// 4. advance_attack_phases — Charging → Striking → Recovering → Idle
/// 5. Damage фаза: применение урона, входящий урон, displacement
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        // Регистрация событий
        app.add_event::<EffectTriggered>()
            .add_event::<EffectCompleted>()
            .add_event::<StrikeLanded>()
            .add_event::<DamageDealt>()
            .add_event::<DamageInflicted>()
            .add_event::<ForcedDisplacement>()
            .add_event::<EnemyDied>()
            .add_event::<SummonMinions>();

        app.add_systems(
            FixedUpdate,
            (
                tick_cooldowns,
                acquire_targets,
                start_attacks,
                advance_attack_phases,
            )
                .chain()
                .in_set(SimSet::Combat),
        );

        app.add_systems(
            FixedUpdate,
            (
                apply_strike_damage,
                apply_inflicted_damage,
                apply_forced_displacement,
                systems::note_effect_completions,
            )
                .chain()
                .in_set(SimSet::Damage),
        );
    }
}
