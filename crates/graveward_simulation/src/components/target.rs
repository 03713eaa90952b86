//! Цели врагов: игроки и призванные юниты
//!
//! Позиции/здоровье целей приходят от внешнего мира каждый тик
//! (в headless режиме — живут как обычные entity).

use bevy::prelude::*;

/// Маркер: игрок
///
/// Health игрока в production авторитетен на стороне клиента/сервера;
/// headless симуляция трекает его чтобы отчитываться о killing blow.
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct Player;

/// Призванный юнит игрока (скелет, голем)
///
/// Призванный юнит с health == 0 никогда не выбирается целью.
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct Summoned {
    /// Владелец (игрок), если известен
    pub owner: Option<Entity>,
}

/// Тип цели (для aggro записей и исходящих damage событий)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub enum TargetKind {
    Player,
    Summoned,
}
