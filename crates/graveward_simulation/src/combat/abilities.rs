//! Data-driven таблицы способностей
//!
//! Architecture Decision:
//! - Одна `AbilitySpec` описывает и melee, и ranged, и special способности
//! - Archetype-специфика — конфигурация (таблица + политика выбора),
//!   не копипаста control flow
//!
//! Rationale:
//! - Единый state machine в systems.rs параметризуется спекой слота
//! - Новый вид врага = новая таблица, ноль нового кода
//!
//! Trade-offs:
//! - Unused поля (cone_half_angle не нужен bolt'у, weight не нужен
//!   priority-политике); footprint — несколько f32, acceptable

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Вид способности
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Reflect)]
pub enum AbilityKind {
    /// Удар по конусу перед собой
    Melee,
    /// Одиночный снаряд по цели
    RangedBolt,
    /// Притянуть цель к себе
    Pull,
    /// Телепортироваться вплотную к цели
    Teleport,
    /// Призвать миньонов (через scene pool)
    Summon,
}

/// Вид визуального эффекта (рендерит внешний слой)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Reflect)]
pub enum EffectKind {
    /// Телеграф замаха (окно реакции противника)
    ChargeTelegraph,
    SlashArc,
    BoltTrail,
    PullBeam,
    TeleportFlash,
    SummonCircle,
}

/// Спека одной способности (строка data-driven таблицы)
#[derive(Debug, Clone, Serialize, Deserialize, Reflect)]
pub struct AbilitySpec {
    pub name: String,
    pub kind: AbilityKind,
    pub damage: u32,
    /// Дальность применения (метры)
    pub range: f32,
    /// Полуугол конуса (радианы); 0 → одиночная цель
    pub cone_half_angle: f32,
    /// Cooldown слота (секунды)
    pub cooldown: f32,
    /// Длительность телеграфа/замаха
    pub charge_duration: f32,
    /// Длительность strike фазы
    pub strike_duration: f32,
    /// Смещение внутри strike когда применяется урон/эффект
    pub hit_delay: f32,
    /// Хвост анимации после strike
    pub recovery_duration: f32,
    /// Вес для WeightedRandom выбора
    pub weight: f32,
    /// Эффект strike фазы
    pub effect: EffectKind,
}

impl AbilitySpec {
    /// Размашистый удар по конусу (базовая атака melee врагов)
    pub fn cleave() -> Self {
        Self {
            name: "cleave".to_string(),
            kind: AbilityKind::Melee,
            damage: 18,
            range: 2.5,
            cone_half_angle: 0.9, // ~52°
            cooldown: 2.0,
            charge_duration: 1.0,
            strike_duration: 0.45,
            hit_delay: 0.15,
            recovery_duration: 0.6,
            weight: 1.0,
            effect: EffectKind::SlashArc,
        }
    }

    /// Снаряд тьмы (одиночная цель)
    pub fn bolt() -> Self {
        Self {
            name: "bolt".to_string(),
            kind: AbilityKind::RangedBolt,
            damage: 12,
            range: 14.0,
            cone_half_angle: 0.0,
            cooldown: 4.0,
            charge_duration: 0.8,
            strike_duration: 0.3,
            hit_delay: 0.1,
            recovery_duration: 0.4,
            weight: 1.0,
            effect: EffectKind::BoltTrail,
        }
    }

    /// Притягивание цели
    pub fn pull() -> Self {
        Self {
            name: "pull".to_string(),
            kind: AbilityKind::Pull,
            damage: 6,
            range: 10.0,
            cone_half_angle: 0.0,
            cooldown: 9.0,
            charge_duration: 1.2,
            strike_duration: 0.4,
            hit_delay: 0.2,
            recovery_duration: 0.5,
            weight: 0.6,
            effect: EffectKind::PullBeam,
        }
    }

    /// Телепорт к цели
    pub fn teleport() -> Self {
        Self {
            name: "teleport".to_string(),
            kind: AbilityKind::Teleport,
            damage: 0,
            range: 16.0,
            cone_half_angle: 0.0,
            cooldown: 12.0,
            charge_duration: 0.6,
            strike_duration: 0.2,
            hit_delay: 0.1,
            recovery_duration: 0.3,
            weight: 0.4,
            effect: EffectKind::TeleportFlash,
        }
    }

    /// Призыв миньонов
    pub fn summon() -> Self {
        Self {
            name: "summon".to_string(),
            kind: AbilityKind::Summon,
            damage: 0,
            range: 20.0,
            cone_half_angle: 0.0,
            cooldown: 18.0,
            charge_duration: 1.5,
            strike_duration: 0.5,
            hit_delay: 0.25,
            recovery_duration: 0.8,
            weight: 0.3,
            effect: EffectKind::SummonCircle,
        }
    }
}

/// Политика выбора среди доступных (off-cooldown, в радиусе) способностей
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Reflect)]
pub enum AbilitySelect {
    /// Строгий приоритет по дальности: ближнедействующая предпочтительнее
    PriorityByRange,
    /// Взвешенный случайный выбор (weights из таблицы)
    WeightedRandom,
}

/// Способности юнита + политика выбора
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct AbilityBook {
    pub abilities: Vec<AbilitySpec>,
    pub policy: AbilitySelect,
}

impl AbilityBook {
    pub fn new(abilities: Vec<AbilitySpec>, policy: AbilitySelect) -> Self {
        Self { abilities, policy }
    }

    /// Минимальная дальность по таблице (steering подходит на неё)
    pub fn shortest_range(&self) -> f32 {
        self.abilities
            .iter()
            .map(|a| a.range)
            .fold(f32::INFINITY, f32::min)
    }
}

/// Cooldown таймеры по слотам (обратный отсчёт, параллелен AbilityBook)
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct Cooldowns(pub Vec<f32>);

impl Cooldowns {
    pub fn for_book(book: &AbilityBook) -> Self {
        Self(vec![0.0; book.abilities.len()])
    }

    pub fn ready(&self, slot: usize) -> bool {
        self.0.get(slot).map(|t| *t <= 0.0).unwrap_or(false)
    }

    /// Запустить cooldown слота (при входе в замах; не возвращается при отмене)
    pub fn start(&mut self, slot: usize, duration: f32) {
        if let Some(timer) = self.0.get_mut(slot) {
            *timer = duration;
        }
    }

    pub fn tick(&mut self, dt: f32) {
        for timer in &mut self.0 {
            if *timer > 0.0 {
                *timer = (*timer - dt).max(0.0);
            }
        }
    }
}

/// Выбрать слот среди доступных сейчас способностей
///
/// Доступность: cooldown готов И цель в радиусе слота.
/// Политика — по архетипу: priority-by-range либо weighted random.
pub fn choose_ability(
    book: &AbilityBook,
    cooldowns: &Cooldowns,
    distance: f32,
    rng: &mut rand_chacha::ChaCha8Rng,
) -> Option<usize> {
    let eligible: Vec<usize> = book
        .abilities
        .iter()
        .enumerate()
        .filter(|(slot, spec)| cooldowns.ready(*slot) && distance <= spec.range)
        .map(|(slot, _)| slot)
        .collect();

    if eligible.is_empty() {
        return None;
    }

    match book.policy {
        AbilitySelect::PriorityByRange => eligible.into_iter().min_by(|a, b| {
            let ra = book.abilities[*a].range;
            let rb = book.abilities[*b].range;
            ra.partial_cmp(&rb).unwrap_or(std::cmp::Ordering::Equal)
        }),
        AbilitySelect::WeightedRandom => {
            let total: f32 = eligible.iter().map(|s| book.abilities[*s].weight).sum();
            if total <= 0.0 {
                return eligible.first().copied();
            }

            let roll = rng.gen_range(0.0..total);
            let mut acc = 0.0;
            for slot in &eligible {
                acc += book.abilities[*slot].weight;
                if roll < acc {
                    return Some(*slot);
                }
            }
            eligible.last().copied()
        }
    }
}
