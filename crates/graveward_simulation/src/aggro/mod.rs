//! Aggro table — кто кого атакует
//!
//! Каждый враг ведёт свою строку угрозы: урон и близость целей
//! конвертируются в scalar aggro, значения затухают со временем,
//! забытые цели выбрасываются. Выбор цели липкий: переключение только
//! когда претендент обгоняет текущую цель больше чем на порог
//! (hysteresis против дёргания между близкими значениями).
//!
//! Архитектура:
//! - Resource симуляции, создаётся корнем и инжектится в системы
//!   (никаких глобальных таблиц)
//! - Строки партиционированы по enemy entity: каждый враг трогает
//!   только свою строку, cross-unit блокировок не нужно
//! - Чистая структура данных: время приходит параметром `now`,
//!   снапшот целей — слайсом кандидатов; полностью тестируется
//!   с fake clock без ECS

use std::collections::HashMap;

use bevy::prelude::*;

use crate::components::TargetKind;

/// Константы aggro (тюнятся, в алгоритм не зашиты)
#[derive(Debug, Clone, Reflect)]
pub struct AggroTuning {
    /// Доля значения, сгорающая за секунду (0.5 → минус половина в секунду)
    pub decay_rate: f32,
    /// Aggro за метр недостающей дистанции
    pub distance_factor: f32,
    /// Aggro за единицу полученного урона
    pub damage_multiplier: f32,
    /// Стартовое значение новой записи
    pub initial_aggro: f32,
    /// Дальше этого цели не видим
    pub max_distance: f32,
    /// Насколько претендент должен обогнать текущую цель для переключения
    pub switch_threshold: f32,
    /// Сколько секунд помним невидимую цель
    pub memory_duration: f32,
}

impl Default for AggroTuning {
    fn default() -> Self {
        Self {
            decay_rate: 0.5,
            distance_factor: 0.1,
            damage_multiplier: 2.0,
            initial_aggro: 10.0,
            max_distance: 25.0,
            switch_threshold: 5.0,
            memory_duration: 10.0,
        }
    }
}

/// Снапшот потенциальной цели на текущий тик
#[derive(Debug, Clone, Copy)]
pub struct TargetCandidate {
    pub entity: Entity,
    pub kind: TargetKind,
    pub position: Vec3,
    /// Мёртвый призванный юнит не выбирается целью
    pub alive: bool,
}

/// Запись угрозы: одна цель в строке одного врага
#[derive(Debug, Clone)]
pub struct AggroEntry {
    pub target: Entity,
    pub kind: TargetKind,
    pub value: f32,
    pub last_damage_at: f64,
    pub last_seen_at: f64,
}

/// Строка одного врага
#[derive(Debug, Clone, Default)]
struct AggroRow {
    entries: Vec<AggroEntry>,
    /// Текущая цель (hysteresis держится за неё)
    current: Option<Entity>,
    /// Когда строка затухала последний раз
    last_decay_at: Option<f64>,
}

impl AggroRow {
    fn entry_mut(&mut self, target: Entity) -> Option<&mut AggroEntry> {
        self.entries.iter_mut().find(|e| e.target == target)
    }

    fn upsert_damage(
        &mut self,
        tuning: &AggroTuning,
        target: Entity,
        kind: TargetKind,
        damage: f32,
        now: f64,
    ) {
        // Якорь затухания ставится при первом вкладе в строку
        self.last_decay_at.get_or_insert(now);

        let gain = damage * tuning.damage_multiplier;
        match self.entry_mut(target) {
            Some(entry) => {
                entry.value += gain;
                entry.last_damage_at = now;
                entry.last_seen_at = now;
            }
            None => self.entries.push(AggroEntry {
                target,
                kind,
                value: gain + tuning.initial_aggro,
                last_damage_at: now,
                last_seen_at: now,
            }),
        }
    }

    fn upsert_proximity(
        &mut self,
        tuning: &AggroTuning,
        target: Entity,
        kind: TargetKind,
        distance: f32,
        now: f64,
    ) {
        self.last_decay_at.get_or_insert(now);

        let gain = ((tuning.max_distance - distance) * tuning.distance_factor).max(0.0);
        match self.entry_mut(target) {
            Some(entry) => {
                // Близость обновляет только last_seen, не время урона
                entry.value += gain;
                entry.last_seen_at = now;
            }
            None => self.entries.push(AggroEntry {
                target,
                kind,
                value: gain + tuning.initial_aggro,
                last_damage_at: now,
                last_seen_at: now,
            }),
        }
    }

    /// Затухание по фактически прошедшему времени + чистка забытых записей
    fn decay_and_purge(&mut self, tuning: &AggroTuning, now: f64) {
        let last = self.last_decay_at.unwrap_or(now);
        self.last_decay_at = Some(now);

        let dt = (now - last).max(0.0) as f32;
        if dt > 0.0 {
            let factor = (1.0 - tuning.decay_rate).powf(dt);
            for entry in &mut self.entries {
                entry.value *= factor;
            }
        }

        let memory = tuning.memory_duration as f64;
        self.entries
            .retain(|e| now - e.last_seen_at <= memory && e.value >= 1.0);
    }
}

/// Таблица aggro всех врагов (resource, владеет корень симуляции)
#[derive(Resource, Default)]
pub struct AggroTable {
    rows: HashMap<Entity, AggroRow>,
    pub tuning: AggroTuning,
}

impl AggroTable {
    pub fn new(tuning: AggroTuning) -> Self {
        Self {
            rows: HashMap::new(),
            tuning,
        }
    }

    /// Завести (пустую) строку врага; идемпотентно
    pub fn initialize_enemy(&mut self, enemy: Entity) {
        self.rows.entry(enemy).or_default();
    }

    /// Враг умер — строка выбрасывается целиком
    pub fn remove_enemy(&mut self, enemy: Entity) {
        self.rows.remove(&enemy);
    }

    /// Цель умерла/отключилась — убираем из всех строк
    pub fn remove_target(&mut self, target: Entity) {
        for row in self.rows.values_mut() {
            row.entries.retain(|e| e.target != target);
            if row.current == Some(target) {
                row.current = None;
            }
        }
    }

    /// Полученный урон → aggro источнику урона
    pub fn add_damage_aggro(
        &mut self,
        enemy: Entity,
        target: Entity,
        kind: TargetKind,
        damage: f32,
        now: f64,
    ) {
        let tuning = self.tuning.clone();
        self.rows
            .entry(enemy)
            .or_default()
            .upsert_damage(&tuning, target, kind, damage, now);
    }

    /// Близость цели → aggro (чем ближе, тем больше)
    pub fn add_proximity_aggro(
        &mut self,
        enemy: Entity,
        target: Entity,
        kind: TargetKind,
        distance: f32,
        now: f64,
    ) {
        let tuning = self.tuning.clone();
        self.rows
            .entry(enemy)
            .or_default()
            .upsert_proximity(&tuning, target, kind, distance, now);
    }

    /// Текущее значение записи (для тестов/отладки)
    pub fn entry_value(&self, enemy: Entity, target: Entity) -> Option<f32> {
        self.rows
            .get(&enemy)?
            .entries
            .iter()
            .find(|e| e.target == target)
            .map(|e| e.value)
    }

    /// Выбрать лучшую цель врага
    ///
    /// Алгоритм:
    /// 1. Строка пуста или целей нет → ближайшая живая цель
    /// 2. Per-tick update: proximity aggro всем видимым целям в радиусе,
    ///    затем затухание по прошедшему времени и чистка забытых
    /// 3. Скан записей: цель должна резолвиться в живого кандидата
    ///    в радиусе; переключение с текущей цели только если претендент
    ///    обгоняет её больше чем на switch_threshold
    /// 4. Ни одна запись не дала цели → ближайшая живая цель
    ///
    /// Никогда не фейлится: в худшем случае None = "стоим, ничего не делаем".
    pub fn select_target(
        &mut self,
        enemy: Entity,
        enemy_position: Vec3,
        candidates: &[TargetCandidate],
        now: f64,
    ) -> Option<TargetCandidate> {
        let tuning = self.tuning.clone();
        let row = self.rows.entry(enemy).or_default();

        // (1) Нечего взвешивать — просто ближайший
        if row.entries.is_empty() || candidates.is_empty() {
            row.current = None;
            return nearest_eligible(enemy_position, candidates);
        }

        // (2) Per-tick update строки
        for candidate in candidates {
            if !candidate.alive {
                continue;
            }
            let distance = candidate.position.distance(enemy_position);
            if distance <= tuning.max_distance {
                row.upsert_proximity(&tuning, candidate.entity, candidate.kind, distance, now);
            }
        }
        row.decay_and_purge(&tuning, now);

        // (3) Скан записей: только резолвящиеся живые цели в радиусе
        let resolve = |target: Entity| -> Option<TargetCandidate> {
            candidates
                .iter()
                .find(|c| {
                    c.entity == target
                        && c.alive
                        && c.position.distance(enemy_position) <= tuning.max_distance
                })
                .copied()
        };

        let mut best: Option<(f32, TargetCandidate)> = None;
        for entry in &row.entries {
            let Some(candidate) = resolve(entry.target) else {
                continue;
            };
            if best.map(|(v, _)| entry.value > v).unwrap_or(true) {
                best = Some((entry.value, candidate));
            }
        }

        let Some((best_value, best_candidate)) = best else {
            // (4) Записи есть, но ни одна не резолвится — fallback
            row.current = None;
            return nearest_eligible(enemy_position, candidates);
        };

        // Hysteresis: держимся за текущую цель пока претендент
        // не обгонит её больше чем на порог
        let chosen = match row.current.and_then(|cur| {
            let candidate = resolve(cur)?;
            let value = row.entries.iter().find(|e| e.target == cur)?.value;
            Some((value, candidate))
        }) {
            Some((current_value, current_candidate))
                if best_value <= current_value + tuning.switch_threshold =>
            {
                current_candidate
            }
            _ => best_candidate,
        };

        row.current = Some(chosen.entity);
        Some(chosen)
    }
}

/// Fallback: ближайшая живая цель (мёртвые призванные исключаются)
fn nearest_eligible(position: Vec3, candidates: &[TargetCandidate]) -> Option<TargetCandidate> {
    candidates
        .iter()
        .filter(|c| c.alive)
        .min_by(|a, b| {
            let da = a.position.distance_squared(position);
            let db = b.position.distance_squared(position);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .copied()
}
