//! Базовые компоненты акторов: Actor, Health, StatusEffects

use bevy::prelude::*;

/// Фракция враждебных юнитов (враги)
pub const FACTION_HOSTILE: u64 = 0;

/// Фракция защитников (игроки + их призванные юниты)
pub const FACTION_DEFENDERS: u64 = 1;

/// Актор (враг, игрок, призванный юнит) — базовый компонент живых существ
///
/// Автоматически добавляет Health и StatusEffects через Required Components.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
#[require(Health, StatusEffects)]
pub struct Actor {
    /// Stable ID фракции (separation steering группирует по ней)
    pub faction_id: u64,
}

/// Маркер: враждебный юнит (управляется боевым AI)
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct Enemy;

/// Здоровье актора
///
/// Инвариант: 0 ≤ current ≤ max. Урон насыщающий — health никогда
/// не уходит в минус и не переполняется.
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct Health {
    pub current: u32,
    pub max: u32,
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100) // Default 100 HP
    }
}

impl Health {
    pub fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    /// Наносит урон, возвращает фактически снятое количество HP
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let applied = amount.min(self.current);
        self.current -= applied;
        applied
    }

    pub fn heal(&mut self, amount: u32) {
        self.current = (self.current + amount).min(self.max);
    }
}

/// Статус-эффекты юнита
///
/// Внешние системы (заклинания игрока, ловушки) переключают флаги,
/// симуляция их только читает:
/// - frozen/stunned: движение, поворот и начало каста заблокированы
/// - slowed: скорость ×0.5
/// - stealth_evaded: юнит потерял цель из виду (стелс) → wander
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct StatusEffects {
    pub frozen: bool,
    pub stunned: bool,
    pub slowed: bool,
    pub stealth_evaded: bool,
}

impl StatusEffects {
    /// Движение и поворот полностью подавлены
    pub fn movement_locked(&self) -> bool {
        self.frozen || self.stunned
    }

    /// Множитель скорости от статусов
    pub fn speed_multiplier(&self) -> f32 {
        if self.slowed {
            0.5
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_damage_saturates() {
        let mut health = Health::new(100);

        let applied = health.take_damage(30);
        assert_eq!(applied, 30);
        assert_eq!(health.current, 70);
        assert!(health.is_alive());

        // Урон больше остатка — снимается только остаток, не уходим в минус
        let applied = health.take_damage(200);
        assert_eq!(applied, 70);
        assert_eq!(health.current, 0);
        assert!(!health.is_alive());

        // Урон по мёртвому — ничего не снимает
        assert_eq!(health.take_damage(10), 0);
        assert_eq!(health.current, 0);
    }

    #[test]
    fn test_health_heal_clamped() {
        let mut health = Health::new(100);
        health.take_damage(50);

        health.heal(30);
        assert_eq!(health.current, 80);

        health.heal(100); // Clamp к max
        assert_eq!(health.current, 100);
    }

    #[test]
    fn test_status_effects_locks() {
        let mut status = StatusEffects::default();
        assert!(!status.movement_locked());
        assert_eq!(status.speed_multiplier(), 1.0);

        status.slowed = true;
        assert_eq!(status.speed_multiplier(), 0.5);
        assert!(!status.movement_locked());

        status.frozen = true;
        assert!(status.movement_locked());

        status.frozen = false;
        status.stunned = true;
        assert!(status.movement_locked());
    }
}
