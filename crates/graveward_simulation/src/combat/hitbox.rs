//! Геометрия попаданий: конусный hit-test
//!
//! Цель поражена ⟺ дистанция ≤ range И угол от направления удара
//! ≤ полуугла конуса. Обе границы включительные (цель ровно на границе
//! засчитывается), с малым epsilon против float шума.

use bevy::prelude::*;

/// Допуск по дистанции на границе конуса
const RANGE_EPSILON: f32 = 1e-4;

/// Допуск по углу на границе конуса (радианы)
const ANGLE_EPSILON: f32 = 1e-4;

/// Дистанция в горизонтальной плоскости (бой идёт по XZ)
pub fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    (dx * dx + dz * dz).sqrt()
}

/// Конусный hit-test
///
/// `direction` — направление удара (XZ, нормализуется внутри).
/// Цель в точке атакующего считается попаданием (угол не определён).
pub fn cone_hit(origin: Vec3, direction: Vec3, range: f32, half_angle: f32, target: Vec3) -> bool {
    let to_target = Vec3::new(target.x - origin.x, 0.0, target.z - origin.z);
    let distance = to_target.length();

    if distance > range + RANGE_EPSILON {
        return false;
    }
    if distance <= f32::EPSILON {
        return true;
    }

    let direction = Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero();
    if direction == Vec3::ZERO {
        return false;
    }

    let cos = direction.dot(to_target / distance).clamp(-1.0, 1.0);
    let angle = cos.acos();

    angle <= half_angle + ANGLE_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANGE: f32 = 2.5;
    const HALF_ANGLE: f32 = 0.9;

    #[test]
    fn test_boundary_is_inclusive() {
        // Ровно на границе дальности, по оси удара — попадание
        assert!(cone_hit(
            Vec3::ZERO,
            Vec3::Z,
            RANGE,
            HALF_ANGLE,
            Vec3::new(0.0, 0.0, RANGE)
        ));

        // Ровно на полуугле конуса — попадание
        let on_edge = Vec3::new(HALF_ANGLE.sin(), 0.0, HALF_ANGLE.cos()) * 2.0;
        assert!(cone_hit(Vec3::ZERO, Vec3::Z, RANGE, HALF_ANGLE, on_edge));
    }

    #[test]
    fn test_beyond_boundary_misses() {
        // За дальностью — промах
        assert!(!cone_hit(
            Vec3::ZERO,
            Vec3::Z,
            RANGE,
            HALF_ANGLE,
            Vec3::new(0.0, 0.0, RANGE + 0.01)
        ));

        // За полууглом — промах
        let angle = HALF_ANGLE + 0.01;
        let outside = Vec3::new(angle.sin(), 0.0, angle.cos()) * 2.0;
        assert!(!cone_hit(Vec3::ZERO, Vec3::Z, RANGE, HALF_ANGLE, outside));
    }

    #[test]
    fn test_behind_attacker_misses() {
        assert!(!cone_hit(
            Vec3::ZERO,
            Vec3::Z,
            RANGE,
            HALF_ANGLE,
            Vec3::new(0.0, 0.0, -1.0)
        ));
    }

    #[test]
    fn test_height_is_ignored() {
        // Бой по XZ: разница по Y не влияет
        assert!(cone_hit(
            Vec3::ZERO,
            Vec3::Z,
            RANGE,
            HALF_ANGLE,
            Vec3::new(0.0, 3.0, 2.0)
        ));
    }

    #[test]
    fn test_point_blank_hits() {
        assert!(cone_hit(Vec3::ZERO, Vec3::Z, RANGE, HALF_ANGLE, Vec3::ZERO));
    }

    #[test]
    fn test_flat_distance() {
        let a = Vec3::new(0.0, 5.0, 0.0);
        let b = Vec3::new(3.0, -2.0, 4.0);
        assert!((flat_distance(a, b) - 5.0).abs() < 1e-6);
    }
}
