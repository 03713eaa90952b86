//! Combat системы: выбор цели, фазы атаки, применение урона

use bevy::prelude::*;

use crate::aggro::{AggroTable, TargetCandidate};
use crate::combat::abilities::{choose_ability, AbilityBook, AbilityKind, Cooldowns, EffectKind};
use crate::combat::hitbox::{cone_hit, flat_distance};
use crate::combat::state::CombatState;
use crate::combat::{
    DamageDealt, DamageInflicted, EffectCompleted, EffectTriggered, EnemyDied, ForcedDisplacement,
    StrikeLanded, SummonMinions,
};
use crate::components::{Enemy, Health, Player, StatusEffects, Summoned, TargetKind};
use crate::steering::{heading_direction, PursuitTarget, SteeringState};
use crate::{DeterministicRng, SimClock};

/// На сколько метров pull подтягивает цель к атакующему
const PULL_ARRIVE_DISTANCE: f32 = 1.5;

/// На сколько метров teleport выходит перед целью
const TELEPORT_ARRIVE_DISTANCE: f32 = 2.0;

/// Допуск дальности для ranged урона на момент попадания
/// (цель успела немного отойти за время полёта — всё ещё попадание)
const RANGED_RANGE_GRACE: f32 = 1.2;

/// Сколько миньонов призывает Summon
const SUMMON_COUNT: u32 = 2;

/// Система: обратный отсчёт cooldown слотов
pub fn tick_cooldowns(clock: Res<SimClock>, mut cooldowns: Query<&mut Cooldowns>) {
    let dt = clock.delta;
    for mut slots in cooldowns.iter_mut() {
        slots.tick(dt);
    }
}

/// Система: выбор цели через AggroTable
///
/// Снапшот игроков/призванных собирается один раз на тик и передаётся
/// таблице (таблица — чистая структура, ECS не трогает). PursuitTarget
/// обновляется каждый тик; CombatState меняется только в Idle/Chasing —
/// активный каст держит свою цель сам.
pub fn acquire_targets(
    clock: Res<SimClock>,
    mut aggro: ResMut<AggroTable>,
    players: Query<(Entity, &Transform, &Health), (With<Player>, Without<Enemy>)>,
    summons: Query<(Entity, &Transform, &Health), (With<Summoned>, Without<Enemy>)>,
    mut enemies: Query<
        (
            Entity,
            &Transform,
            &StatusEffects,
            &mut CombatState,
            &mut PursuitTarget,
        ),
        With<Enemy>,
    >,
) {
    let now = clock.elapsed;

    let candidates: Vec<TargetCandidate> = players
        .iter()
        .map(|(entity, transform, health)| TargetCandidate {
            entity,
            kind: TargetKind::Player,
            position: transform.translation,
            alive: health.is_alive(),
        })
        .chain(summons.iter().map(|(entity, transform, health)| {
            TargetCandidate {
                entity,
                kind: TargetKind::Summoned,
                position: transform.translation,
                alive: health.is_alive(),
            }
        }))
        .collect();

    for (entity, transform, status, mut state, mut pursuit) in enemies.iter_mut() {
        if state.is_dead() {
            continue;
        }

        if status.stealth_evaded {
            // Цель растворилась: преследование сброшено, steering уйдёт в wander
            *pursuit = PursuitTarget::None;
            if matches!(*state, CombatState::Chasing { .. }) {
                *state = CombatState::Idle;
            }
            continue;
        }

        match aggro.select_target(entity, transform.translation, &candidates, now) {
            Some(candidate) => {
                *pursuit = PursuitTarget::Entity {
                    target: candidate.entity,
                    position: candidate.position,
                };
                match *state {
                    CombatState::Idle => {
                        crate::log(&format!(
                            "🎯 Enemy {:?} acquired target {:?}",
                            entity, candidate.entity
                        ));
                        *state = CombatState::Chasing {
                            target: candidate.entity,
                        };
                    }
                    CombatState::Chasing { .. } => {
                        *state = CombatState::Chasing {
                            target: candidate.entity,
                        };
                    }
                    _ => {}
                }
            }
            None => {
                // Нет валидной цели — стоим, ничего не делаем
                *pursuit = PursuitTarget::None;
                if matches!(*state, CombatState::Chasing { .. }) {
                    *state = CombatState::Idle;
                }
            }
        }
    }
}

/// Система: вход в замах
///
/// Условия: цель в радиусе выбранного слота, cooldown готов, нет
/// активного каста, юнит не frozen/stunned. Cooldown списывается при
/// ВХОДЕ в замах и при отмене не возвращается.
pub fn start_attacks(
    mut rng: ResMut<DeterministicRng>,
    mut enemies: Query<
        (
            Entity,
            &Transform,
            &SteeringState,
            &StatusEffects,
            &AbilityBook,
            &mut Cooldowns,
            &mut CombatState,
            &PursuitTarget,
        ),
        With<Enemy>,
    >,
    targets: Query<&Transform, Without<Enemy>>,
    mut effects: EventWriter<EffectTriggered>,
) {
    for (entity, transform, steering_state, status, book, mut cooldowns, mut state, pursuit) in
        enemies.iter_mut()
    {
        if !matches!(*state, CombatState::Idle | CombatState::Chasing { .. }) {
            continue;
        }
        if status.movement_locked() || status.stealth_evaded {
            continue;
        }

        let PursuitTarget::Entity { target, .. } = *pursuit else {
            continue;
        };
        let Ok(target_transform) = targets.get(target) else {
            continue;
        };

        let distance = flat_distance(transform.translation, target_transform.translation);
        let Some(slot) = choose_ability(book, &cooldowns, distance, &mut rng.rng) else {
            continue;
        };

        let spec = &book.abilities[slot];
        cooldowns.start(slot, spec.cooldown);

        // Референс прицеливания: позиция цели на момент НАЧАЛА замаха
        let aim = target_transform.translation;
        let facing = {
            let to_aim = Vec3::new(
                aim.x - transform.translation.x,
                0.0,
                aim.z - transform.translation.z,
            )
            .normalize_or_zero();
            if to_aim == Vec3::ZERO {
                heading_direction(steering_state.heading)
            } else {
                to_aim
            }
        };

        // Телеграф: окно реакции противника
        effects.write(EffectTriggered {
            kind: EffectKind::ChargeTelegraph,
            position: transform.translation,
            direction: facing,
            duration: spec.charge_duration,
        });

        crate::log(&format!(
            "⚔️ Enemy {:?} charging '{}' at {:?} (windup: {:.2}s)",
            entity, spec.name, target, spec.charge_duration
        ));

        *state = CombatState::Charging {
            slot,
            target,
            aim,
            timer: spec.charge_duration,
        };
    }
}

/// Система: продвижение фаз атаки
///
/// Charging → Striking → Recovering → Idle. Урон применяется один раз
/// на hit_delay внутри strike (guard в самом варианте). Невалидная цель
/// (умерла/исчезла/стелс) до применения урона отменяет каст без урона;
/// cooldown остаётся потраченным.
pub fn advance_attack_phases(
    clock: Res<SimClock>,
    mut enemies: Query<
        (Entity, &Transform, &StatusEffects, &AbilityBook, &mut CombatState),
        With<Enemy>,
    >,
    targets: Query<
        (Entity, &Transform, &Health, Option<&Summoned>),
        (Without<Enemy>, Or<(With<Player>, With<Summoned>)>),
    >,
    mut effects: EventWriter<EffectTriggered>,
    mut strikes: EventWriter<StrikeLanded>,
    mut displacements: EventWriter<ForcedDisplacement>,
    mut summon_events: EventWriter<SummonMinions>,
) {
    let dt = clock.delta;

    let target_alive = |target: Entity| -> bool {
        targets
            .get(target)
            .map(|(_, _, health, _)| health.is_alive())
            .unwrap_or(false)
    };

    for (entity, transform, status, book, mut state) in enemies.iter_mut() {
        let new_state = match &*state {
            CombatState::Charging { slot, target, aim, timer } => {
                if !target_alive(*target) || status.stealth_evaded {
                    crate::log(&format!(
                        "🚫 Enemy {:?} abandoned cast (target invalid), cooldown kept",
                        entity
                    ));
                    CombatState::Idle
                } else {
                    let new_timer = timer - dt;
                    if new_timer > 0.0 {
                        CombatState::Charging {
                            slot: *slot,
                            target: *target,
                            aim: *aim,
                            timer: new_timer,
                        }
                    } else {
                        // Телеграф доигран: направление удара вычисляется один
                        // раз, от позиции цели на момент начала замаха
                        let spec = &book.abilities[*slot];
                        let to_aim = Vec3::new(
                            aim.x - transform.translation.x,
                            0.0,
                            aim.z - transform.translation.z,
                        )
                        .normalize_or_zero();
                        let direction = if to_aim == Vec3::ZERO { Vec3::Z } else { to_aim };

                        effects.write(EffectTriggered {
                            kind: spec.effect,
                            position: transform.translation,
                            direction,
                            duration: spec.strike_duration,
                        });

                        CombatState::Striking {
                            slot: *slot,
                            target: *target,
                            direction,
                            elapsed: 0.0,
                            damage_applied: false,
                        }
                    }
                }
            }

            CombatState::Striking { slot, target, direction, elapsed, damage_applied } => {
                let spec = &book.abilities[*slot];

                if !damage_applied && (!target_alive(*target) || status.stealth_evaded) {
                    crate::log(&format!(
                        "🚫 Enemy {:?} abandoned strike (target invalid mid-swing)",
                        entity
                    ));
                    CombatState::Recovering {
                        timer: spec.recovery_duration,
                    }
                } else {
                    let elapsed = elapsed + dt;
                    let mut applied = *damage_applied;

                    if !applied && elapsed >= spec.hit_delay {
                        // Guard: урон ровно один раз, сколько бы тиков
                        // strike фаза ни длилась
                        applied = true;
                        resolve_strike(
                            entity,
                            transform.translation,
                            spec,
                            *target,
                            *direction,
                            &targets,
                            &mut strikes,
                            &mut displacements,
                            &mut summon_events,
                        );
                    }

                    if elapsed >= spec.strike_duration {
                        CombatState::Recovering {
                            timer: spec.recovery_duration,
                        }
                    } else {
                        CombatState::Striking {
                            slot: *slot,
                            target: *target,
                            direction: *direction,
                            elapsed,
                            damage_applied: applied,
                        }
                    }
                }
            }

            CombatState::Recovering { timer } => {
                let new_timer = timer - dt;
                if new_timer <= 0.0 {
                    CombatState::Idle
                } else {
                    CombatState::Recovering { timer: new_timer }
                }
            }

            other => other.clone(),
        };

        if *state != new_state {
            *state = new_state;
        }
    }
}

/// Применение одного удара (вызывается ровно один раз за strike)
#[allow(clippy::too_many_arguments)]
fn resolve_strike(
    attacker: Entity,
    attacker_position: Vec3,
    spec: &crate::combat::AbilitySpec,
    target: Entity,
    direction: Vec3,
    targets: &Query<
        (Entity, &Transform, &Health, Option<&Summoned>),
        (Without<Enemy>, Or<(With<Player>, With<Summoned>)>),
    >,
    strikes: &mut EventWriter<StrikeLanded>,
    displacements: &mut EventWriter<ForcedDisplacement>,
    summon_events: &mut EventWriter<SummonMinions>,
) {
    match spec.kind {
        AbilityKind::Melee => {
            // Конусная проверка по ВСЕМ живым кандидатам (area attack)
            for (candidate, transform, health, _) in targets.iter() {
                if !health.is_alive() {
                    continue;
                }
                if cone_hit(
                    attacker_position,
                    direction,
                    spec.range,
                    spec.cone_half_angle,
                    transform.translation,
                ) {
                    strikes.write(StrikeLanded {
                        attacker,
                        target: candidate,
                        damage: spec.damage,
                    });
                }
            }
        }

        AbilityKind::RangedBolt => {
            // Одиночная цель; отошла за дальность (с допуском) — промах
            let Ok((_, transform, health, _)) = targets.get(target) else {
                return;
            };
            if !health.is_alive() {
                return;
            }
            let distance = flat_distance(attacker_position, transform.translation);
            if distance <= spec.range * RANGED_RANGE_GRACE {
                strikes.write(StrikeLanded {
                    attacker,
                    target,
                    damage: spec.damage,
                });
            }
        }

        AbilityKind::Pull => {
            let Ok((_, _, health, _)) = targets.get(target) else {
                return;
            };
            if !health.is_alive() {
                return;
            }
            displacements.write(ForcedDisplacement {
                target,
                to: attacker_position + direction * PULL_ARRIVE_DISTANCE,
            });
            if spec.damage > 0 {
                strikes.write(StrikeLanded {
                    attacker,
                    target,
                    damage: spec.damage,
                });
            }
        }

        AbilityKind::Teleport => {
            let Ok((_, transform, _, _)) = targets.get(target) else {
                return;
            };
            displacements.write(ForcedDisplacement {
                target: attacker,
                to: transform.translation - direction * TELEPORT_ARRIVE_DISTANCE,
            });
        }

        AbilityKind::Summon => {
            summon_events.write(SummonMinions {
                summoner: attacker,
                position: attacker_position,
                count: SUMMON_COUNT,
            });
        }
    }
}

/// Система: применение урона ударов к целям
///
/// Детекция (resolve_strike) отделена от применения: устаревшая цель
/// здесь — промах, не ошибка; автомат атакующего уже идёт в Recovering.
pub fn apply_strike_damage(
    mut strikes: EventReader<StrikeLanded>,
    mut targets: Query<(&mut Health, Option<&Player>, Option<&Summoned>), Without<Enemy>>,
    mut dealt: EventWriter<DamageDealt>,
) {
    for strike in strikes.read() {
        let Ok((mut health, player, _summoned)) = targets.get_mut(strike.target) else {
            crate::log(&format!(
                "⚠️ Strike target {:?} stale at damage time — skipped",
                strike.target
            ));
            continue;
        };
        if !health.is_alive() {
            continue;
        }

        let applied = health.take_damage(strike.damage);
        let kind = if player.is_some() {
            TargetKind::Player
        } else {
            TargetKind::Summoned
        };

        dealt.write(DamageDealt {
            attacker: strike.attacker,
            target: strike.target,
            kind,
            damage: applied,
            target_died: !health.is_alive(),
        });

        crate::log(&format!(
            "💥 Enemy {:?} hit {:?} for {} (HP left: {})",
            strike.attacker, strike.target, applied, health.current
        ));
    }
}

/// Система: входящий урон по врагам (атаки игроков и призванных)
///
/// Урон конвертируется в damage aggro источнику; смерть эмитит
/// EnemyDied (unit слой делает teardown).
pub fn apply_inflicted_damage(
    clock: Res<SimClock>,
    mut aggro: ResMut<AggroTable>,
    mut events: EventReader<DamageInflicted>,
    mut enemies: Query<&mut Health, With<Enemy>>,
    attackers: Query<(Option<&Player>, Option<&Summoned>), Without<Enemy>>,
    mut died: EventWriter<EnemyDied>,
) {
    let now = clock.elapsed;

    for event in events.read() {
        let Ok(mut health) = enemies.get_mut(event.target) else {
            continue;
        };
        if !health.is_alive() {
            continue;
        }

        health.take_damage(event.amount);

        // Урон → aggro источнику
        if let Ok((player, summoned)) = attackers.get(event.attacker) {
            let kind = if player.is_some() {
                Some(TargetKind::Player)
            } else if summoned.is_some() {
                Some(TargetKind::Summoned)
            } else {
                None
            };
            if let Some(kind) = kind {
                aggro.add_damage_aggro(event.target, event.attacker, kind, event.amount as f32, now);
            }
        }

        if !health.is_alive() {
            crate::log(&format!(
                "☠️ Enemy {:?} killed by {:?}",
                event.target, event.attacker
            ));
            died.write(EnemyDied {
                entity: event.target,
                killer: Some(event.attacker),
            });
        }
    }
}

/// Система: применение принудительных перемещений (pull/teleport)
pub fn apply_forced_displacement(
    mut events: EventReader<ForcedDisplacement>,
    mut transforms: Query<&mut Transform>,
) {
    for event in events.read() {
        if let Ok(mut transform) = transforms.get_mut(event.target) {
            transform.translation = event.to;
        }
    }
}

/// Система: приём completion событий от слоя эффектов
///
/// Геймплей на них не ждёт (таймеры тиковые) — фиксируем для отладки.
pub fn note_effect_completions(mut events: EventReader<EffectCompleted>) {
    for event in events.read() {
        crate::log(&format!(
            "✨ Effect {:?} completed at {:?}",
            event.kind, event.position
        ));
    }
}
