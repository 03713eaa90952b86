//! Combat state machine — фазы атаки юнита
//!
//! Idle → Chasing → Charging (телеграф) → Striking → Recovering → Idle,
//! терминальное состояние Dead. Ranged/special способности идут через
//! те же фазы (один каст за раз, mutual exclusion через сам enum).
//!
//! Все таймеры — обратный отсчёт от SimClock, никаких отложенных
//! callbacks: каст отменяется и возобновляется просто переставанием
//! тикать.

use bevy::prelude::*;

/// Фазы боевого автомата (данные фазы живут в варианте)
#[derive(Component, Debug, Clone, PartialEq, Reflect)]
#[reflect(Component)]
pub enum CombatState {
    /// Цели нет, стоим
    Idle,

    /// Преследуем цель (steering ведёт на радиус атаки)
    Chasing { target: Entity },

    /// Замах/телеграф: движение заблокировано, противник видит wind-up
    Charging {
        /// Слот способности в AbilityBook
        slot: usize,
        target: Entity,
        /// Позиция цели на момент НАЧАЛА замаха (референс прицеливания)
        aim: Vec3,
        /// Остаток телеграфа (секунды)
        timer: f32,
    },

    /// Удар: урон применяется один раз на фиксированном смещении фазы
    Striking {
        slot: usize,
        target: Entity,
        /// Направление удара (вычислено один раз на переходе из Charging)
        direction: Vec3,
        /// Сколько фаза уже длится
        elapsed: f32,
        /// Guard: урон уже применён (повторные тики не дублируют)
        damage_applied: bool,
    },

    /// Хвост анимации, движение разблокируется по завершении
    Recovering { timer: f32 },

    /// Юнит мёртв, автомат остановлен
    Dead,
}

impl Default for CombatState {
    fn default() -> Self {
        Self::Idle
    }
}

impl CombatState {
    /// Фаза блокирует движение (замах и удар фиксируют позицию)
    pub fn locks_movement(&self) -> bool {
        matches!(
            self,
            CombatState::Charging { .. } | CombatState::Striking { .. } | CombatState::Dead
        )
    }

    /// Идёт каст (новый начать нельзя)
    pub fn is_casting(&self) -> bool {
        matches!(
            self,
            CombatState::Charging { .. }
                | CombatState::Striking { .. }
                | CombatState::Recovering { .. }
        )
    }

    pub fn is_dead(&self) -> bool {
        matches!(self, CombatState::Dead)
    }

    /// Цель активного каста/преследования (если есть)
    pub fn target(&self) -> Option<Entity> {
        match self {
            CombatState::Chasing { target }
            | CombatState::Charging { target, .. }
            | CombatState::Striking { target, .. } => Some(*target),
            _ => None,
        }
    }
}
