//! Steering — движение и поворот юнитов
//!
//! Per-tick интеграция: seek к цели + separation от соседей своей
//! фракции + сглаживание позиции и поворота. Никакого pathfinding —
//! чистое steering к точке.
//!
//! Архитектура:
//! - Transform юнита пишут только системы этого модуля
//! - `PursuitTarget` заполняет combat-слой, steering его только читает
//! - Потерянная цель (stealth) → wander: когерентное блуждание
//!   экстраполяцией текущего heading, на доле базовой скорости
//! - frozen/stunned и charge/strike фазы атаки полностью блокируют
//!   движение и поворот

use bevy::prelude::*;
use rand::Rng;

use crate::combat::CombatState;
use crate::components::{Actor, Enemy, StatusEffects};
use crate::{DeterministicRng, SimClock, SimSet};

/// Порог смещения для исходящего PositionChanged (юниты)
const BROADCAST_MIN_MOVE: f32 = 0.2;

/// Минимальный интервал между PositionChanged одного юнита (секунды)
const BROADCAST_MIN_INTERVAL: f64 = 0.02;

/// Параметры движения юнита (из таблицы архетипа)
#[derive(Component, Debug, Clone, Reflect, serde::Serialize, serde::Deserialize)]
#[reflect(Component)]
pub struct Steering {
    /// Базовая скорость (m/s)
    pub base_speed: f32,
    /// Максимальная угловая скорость поворота (rad/s)
    pub rotation_speed: f32,
    /// Лерп-фактор сглаживания позиции (гасит per-frame дрожание направления)
    pub position_smoothing: f32,
    /// Радиус separation от союзников (метры)
    pub separation_radius: f32,
    /// Сила отталкивания на соседа
    pub separation_force: f32,
    /// Вес separation в итоговом направлении (возмущает seek, не перебивает)
    pub separation_weight: f32,
    /// Ближе этой дистанции к цели не двигаемся (подход на радиус атаки)
    pub stop_distance: f32,
    /// Радиус wander точек
    pub wander_radius: f32,
    /// Сколько секунд идём к wander точке прежде чем выбрать новую
    pub wander_duration: f32,
    /// Доля базовой скорости при wander (никогда не полная)
    pub wander_speed_fraction: f32,
}

impl Default for Steering {
    fn default() -> Self {
        Self {
            base_speed: 3.0,
            rotation_speed: 6.0,
            position_smoothing: 0.85,
            separation_radius: 2.0,
            separation_force: 1.0,
            separation_weight: 0.3,
            stop_distance: 1.5,
            wander_radius: 6.0,
            wander_duration: 3.0,
            wander_speed_fraction: 0.4,
        }
    }
}

/// Runtime состояние steering (heading, wander, broadcast bookkeeping)
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct SteeringState {
    /// Текущий yaw (радианы); heading → направление через (sin, 0, cos)
    pub heading: f32,
    /// Активная wander точка (если блуждаем)
    pub wander_target: Option<Vec3>,
    /// Сколько осталось идти к текущей wander точке
    pub wander_timer: f32,
    /// Последняя разосланная позиция (rate limiting)
    pub last_broadcast_pos: Option<Vec3>,
    /// Когда рассылали последний раз
    pub last_broadcast_at: f64,
}

/// Куда двигаться (пишет combat-слой, читает steering)
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Reflect)]
#[reflect(Component)]
pub enum PursuitTarget {
    /// Цели нет — стоим на месте
    #[default]
    None,
    /// Преследуем entity (позиция — снапшот этого тика)
    Entity { target: Entity, position: Vec3 },
}

/// Исходящее событие: юнит сместился (rate-limited, см. broadcast_positions)
#[derive(Event, Debug, Clone)]
pub struct PositionChanged {
    pub entity: Entity,
    pub position: Vec3,
    pub yaw: f32,
}

/// Направление из yaw
pub fn heading_direction(heading: f32) -> Vec3 {
    Vec3::new(heading.sin(), 0.0, heading.cos())
}

/// Yaw из направления (XZ плоскость)
pub fn direction_heading(direction: Vec3) -> f32 {
    direction.x.atan2(direction.z)
}

/// Свернуть угол в [-π, π]
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + std::f32::consts::PI).rem_euclid(std::f32::consts::TAU);
    wrapped - std::f32::consts::PI
}

/// Повернуть heading к desired по кратчайшей дуге, не быстрее max_step
pub fn turn_towards(current: f32, desired: f32, max_step: f32) -> f32 {
    let diff = wrap_angle(desired - current);
    let step = diff.clamp(-max_step, max_step);
    wrap_angle(current + step)
}

/// Separation: сумма отталкиваний от соседей в радиусе
pub fn separation_vector(position: Vec3, neighbors: &[Vec3], radius: f32, force: f32) -> Vec3 {
    let mut push = Vec3::ZERO;

    for &other in neighbors {
        let away = Vec3::new(position.x - other.x, 0.0, position.z - other.z);
        let distance = away.length();
        if distance < radius && distance > 0.001 {
            push += (away / distance) * force;
        }
    }

    push
}

/// Система: per-tick движение юнитов
///
/// Порядок:
/// 1. frozen/stunned/Dead или position-lock фаза атаки → стоим
/// 2. stealth_evaded → wander (точка экстраполяцией heading)
/// 3. иначе seek к PursuitTarget + separation, стоп на stop_distance
/// 4. позиция через lerp (smoothing), heading — ограниченным шагом
pub fn steer_units(
    clock: Res<SimClock>,
    mut rng: ResMut<DeterministicRng>,
    mut units: Query<
        (
            Entity,
            &mut Transform,
            &Steering,
            &mut SteeringState,
            &StatusEffects,
            &Actor,
            &PursuitTarget,
            &CombatState,
        ),
        With<Enemy>,
    >,
) {
    let dt = clock.delta;

    // Снапшот позиций для separation (собираем до мутаций)
    let positions: Vec<(Entity, u64, Vec3)> = units
        .iter()
        .map(|(entity, transform, _, _, _, actor, _, _)| {
            (entity, actor.faction_id, transform.translation)
        })
        .collect();

    for (entity, mut transform, steering, mut state, status, actor, pursuit, combat) in
        units.iter_mut()
    {
        if status.movement_locked() || combat.locks_movement() {
            continue;
        }

        let position = transform.translation;

        // Куда и с какой скоростью
        let (goal, speed) = if status.stealth_evaded {
            // Цель потеряна: блуждаем на доле скорости
            let goal = refresh_wander_target(
                &mut state,
                steering,
                position,
                dt,
                &mut rng.rng,
            );
            (Some(goal), steering.base_speed * steering.wander_speed_fraction)
        } else {
            match pursuit {
                PursuitTarget::Entity { position: target_position, .. } => {
                    let flat = flatten(*target_position - position);
                    if flat.length() <= steering.stop_distance {
                        // Дошли на дистанцию — только доворачиваемся
                        let desired = direction_heading(flat.normalize_or_zero());
                        if flat.length() > 0.001 {
                            state.heading =
                                turn_towards(state.heading, desired, steering.rotation_speed * dt);
                            transform.rotation = Quat::from_rotation_y(state.heading);
                        }
                        continue;
                    }
                    (Some(*target_position), steering.base_speed)
                }
                PursuitTarget::None => (None, 0.0),
            }
        };

        let Some(goal) = goal else {
            continue;
        };

        let seek = flatten(goal - position).normalize_or_zero();
        if seek == Vec3::ZERO {
            continue;
        }

        // Separation от союзников: возмущает направление, не перебивает seek
        let neighbors: Vec<Vec3> = positions
            .iter()
            .filter(|(other, faction, _)| *other != entity && *faction == actor.faction_id)
            .map(|(_, _, pos)| *pos)
            .collect();
        let separation = separation_vector(
            position,
            &neighbors,
            steering.separation_radius,
            steering.separation_force,
        );
        let separation = separation.normalize_or_zero() * steering.separation_weight;

        let combined = (seek + separation).normalize_or_zero();
        let frame_speed = speed * status.speed_multiplier() * dt;

        // Lerp к следующей позиции гасит дрожание от per-frame шума направления
        let next = position + combined * frame_speed;
        transform.translation = position.lerp(next, steering.position_smoothing);

        // Поворот по кратчайшей дуге, с ограничением угловой скорости
        let desired = direction_heading(combined);
        state.heading = turn_towards(state.heading, desired, steering.rotation_speed * dt);
        transform.rotation = Quat::from_rotation_y(state.heading);
    }
}

/// Wander точка: экстраполяция текущего heading с ограниченным разбросом
/// (блуждание остаётся когерентным, юнит не мечется)
fn refresh_wander_target(
    state: &mut SteeringState,
    steering: &Steering,
    position: Vec3,
    dt: f32,
    rng: &mut rand_chacha::ChaCha8Rng,
) -> Vec3 {
    state.wander_timer -= dt;

    let arrived = state
        .wander_target
        .map(|t| flatten(t - position).length() < 0.3)
        .unwrap_or(true);

    if state.wander_timer <= 0.0 || arrived {
        let jitter = rng.gen_range(-0.7..0.7);
        let distance = rng.gen_range(0.35..1.0) * steering.wander_radius;
        let direction = Quat::from_rotation_y(jitter) * heading_direction(state.heading);
        state.wander_target = Some(position + direction * distance);
        state.wander_timer = steering.wander_duration;
    }

    state.wander_target.unwrap_or(position)
}

fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Система: rate-limited рассылка позиций наружу
///
/// Rendering/network слой не заваливаем: событие только когда юнит
/// сместился больше порога И прошёл минимальный интервал.
pub fn broadcast_positions(
    clock: Res<SimClock>,
    mut units: Query<(Entity, &Transform, &mut SteeringState), With<Enemy>>,
    mut events: EventWriter<PositionChanged>,
) {
    let now = clock.elapsed;

    for (entity, transform, mut state) in units.iter_mut() {
        let position = transform.translation;

        let moved_enough = state
            .last_broadcast_pos
            .map(|last| last.distance(position) > BROADCAST_MIN_MOVE)
            .unwrap_or(true);
        let interval_ok = now - state.last_broadcast_at >= BROADCAST_MIN_INTERVAL;

        if moved_enough && interval_ok {
            state.last_broadcast_pos = Some(position);
            state.last_broadcast_at = now;
            events.write(PositionChanged {
                entity,
                position,
                yaw: state.heading,
            });
        }
    }
}

/// Steering Plugin
///
/// Системы в FixedUpdate, после aggro/до combat (SimSet::Steering).
pub struct SteeringPlugin;

impl Plugin for SteeringPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<PositionChanged>();

        app.add_systems(
            FixedUpdate,
            (steer_units, broadcast_positions)
                .chain()
                .in_set(SimSet::Steering),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(0.0)).abs() < 1e-6);
        assert!((wrap_angle(PI + 0.1) - (-PI + 0.1)).abs() < 1e-5);
        assert!((wrap_angle(-PI - 0.1) - (PI - 0.1)).abs() < 1e-5);
        assert!((wrap_angle(2.0 * PI) - 0.0).abs() < 1e-5);
    }

    #[test]
    fn test_turn_towards_shortest_path() {
        // Из +170° в -170°: кратчайшая дуга через ±π, а не через ноль
        let current = PI - 0.1;
        let desired = -PI + 0.1;
        let next = turn_towards(current, desired, 0.05);
        assert!(
            wrap_angle(next - current) > 0.0,
            "must turn forward through ±π"
        );

        // Шаг ограничен max_step
        let next = turn_towards(0.0, FRAC_PI_2, 0.1);
        assert!((next - 0.1).abs() < 1e-6);

        // Доворачиваемся точно когда desired ближе шага
        let next = turn_towards(0.0, 0.05, 0.1);
        assert!((next - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_separation_pushes_apart() {
        let neighbors = vec![Vec3::new(1.0, 0.0, 0.0)];
        let push = separation_vector(Vec3::ZERO, &neighbors, 2.0, 1.0);
        // Сосед справа → толкает влево
        assert!(push.x < 0.0);
        assert_eq!(push.y, 0.0);

        // Вне радиуса — нет вклада
        let far = vec![Vec3::new(5.0, 0.0, 0.0)];
        assert_eq!(separation_vector(Vec3::ZERO, &far, 2.0, 1.0), Vec3::ZERO);
    }

    #[test]
    fn test_heading_direction_roundtrip() {
        for heading in [0.0, 0.7, -1.3, 2.9] {
            let dir = heading_direction(heading);
            assert!((direction_heading(dir) - heading).abs() < 1e-5);
        }
    }
}
