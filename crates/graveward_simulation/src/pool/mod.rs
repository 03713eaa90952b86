//! Bounded resource pool — переиспользование scene containers и ресурсов эффектов
//!
//! Спавн/деспавн врагов и эффектов происходит десятками в секунду;
//! пул гасит allocation churn, выдавая handle на заранее построенный
//! объект вместо конструирования нового.
//!
//! Контракт:
//! - `acquire` выдаёт handle из free-списка, при нехватке достраивает
//!   батчами `expand_size` до `max_size`
//! - при исчерпании — политика пула: `Fail` (caller пропускает спавн)
//!   или `Overflow` (over-budget объект вне учёта, с warning в лог)
//! - `release` идемпотентен: чужой/устаревший handle — no-op
//! - Инвариант: free + busy ≤ max_size в любой момент

use std::collections::{HashMap, HashSet};
use std::fmt;

use bevy::prelude::*;

use crate::logger;

/// Ошибка: пул исчерпан (free пуст, бюджет max_size выбран)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolExhausted;

impl fmt::Display for PoolExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource pool exhausted")
    }
}

impl std::error::Error for PoolExhausted {}

/// Политика поведения при исчерпании пула
///
/// Одна явная политика на каждый инстанс пула.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// `acquire` возвращает `Err(PoolExhausted)`, caller пропускает операцию
    Fail,
    /// Конструируем over-budget объект вне учёта (с warning);
    /// его release его дропает, а не возвращает в пул
    Overflow,
}

/// Параметры пула
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Сколько объектов построить при создании/clear
    pub initial_size: usize,
    /// Размер батча достройки когда free пуст
    pub expand_size: usize,
    /// Жёсткий бюджет: free + busy никогда не превышают его
    pub max_size: usize,
    pub policy: ExhaustionPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 8,
            expand_size: 4,
            max_size: 64,
            policy: ExhaustionPolicy::Fail,
        }
    }
}

/// Handle на объект пула (стабильный id, Copy)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub struct PoolHandle(u64);

type Factory<T> = Box<dyn FnMut() -> T + Send + Sync>;
type Hook<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// Generic bounded pool
///
/// Объекты живут внутри пула, наружу выдаются только handle'ы —
/// release чужого handle поэтому тривиально идемпотентен.
pub struct ResourcePool<T> {
    config: PoolConfig,
    factory: Factory<T>,
    /// Восстанавливает дефолтное состояние при release (transform, opacity)
    reset: Option<Hook<T>>,
    /// Cleanup hook для dispose (например освобождение GPU ресурса)
    cleanup: Option<Hook<T>>,
    slots: HashMap<u64, T>,
    free: Vec<u64>,
    busy: HashSet<u64>,
    /// Over-budget объекты (только при политике Overflow), вне инварианта
    overflow: HashSet<u64>,
    next_id: u64,
}

impl<T> ResourcePool<T> {
    pub fn new(config: PoolConfig, factory: impl FnMut() -> T + Send + Sync + 'static) -> Self {
        let mut pool = Self {
            config,
            factory: Box::new(factory),
            reset: None,
            cleanup: None,
            slots: HashMap::new(),
            free: Vec::new(),
            busy: HashSet::new(),
            overflow: HashSet::new(),
            next_id: 0,
        };
        pool.populate_initial();
        pool
    }

    pub fn with_reset(mut self, reset: impl Fn(&mut T) + Send + Sync + 'static) -> Self {
        self.reset = Some(Box::new(reset));
        self
    }

    pub fn with_cleanup(mut self, cleanup: impl Fn(&mut T) + Send + Sync + 'static) -> Self {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    fn construct(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.slots.insert(id, (self.factory)());
        id
    }

    fn populate_initial(&mut self) {
        let count = self.config.initial_size.min(self.config.max_size);
        for _ in 0..count {
            let id = self.construct();
            self.free.push(id);
        }
    }

    fn tracked_len(&self) -> usize {
        self.free.len() + self.busy.len()
    }

    /// Взять объект из пула
    ///
    /// Free пуст → достраиваем батч в пределах max_size; бюджет выбран →
    /// политика пула (`Fail` | `Overflow`).
    pub fn acquire(&mut self) -> Result<PoolHandle, PoolExhausted> {
        if self.free.is_empty() && self.tracked_len() < self.config.max_size {
            let budget = self.config.max_size - self.tracked_len();
            let batch = self.config.expand_size.max(1).min(budget);
            for _ in 0..batch {
                let id = self.construct();
                self.free.push(id);
            }
        }

        if let Some(id) = self.free.pop() {
            self.busy.insert(id);
            return Ok(PoolHandle(id));
        }

        match self.config.policy {
            ExhaustionPolicy::Fail => Err(PoolExhausted),
            ExhaustionPolicy::Overflow => {
                let id = self.construct();
                self.overflow.insert(id);
                logger::log_warning(&format!(
                    "⚠️ Pool over budget: constructed untracked instance (max_size: {})",
                    self.config.max_size
                ));
                Ok(PoolHandle(id))
            }
        }
    }

    /// Вернуть объект в пул
    ///
    /// Идемпотентно: handle не в busy/overflow — no-op.
    /// Over-budget объекты дропаются, а не возвращаются в free.
    pub fn release(&mut self, handle: PoolHandle) {
        let PoolHandle(id) = handle;

        if self.busy.remove(&id) {
            if let Some(item) = self.slots.get_mut(&id) {
                if let Some(reset) = &self.reset {
                    reset(item);
                }
            }
            self.free.push(id);
        } else if self.overflow.remove(&id) {
            if let Some(mut item) = self.slots.remove(&id) {
                if let Some(cleanup) = &self.cleanup {
                    cleanup(&mut item);
                }
            }
        }
        // Неизвестный/устаревший handle: no-op
    }

    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.slots.get(&handle.0)
    }

    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.slots.get_mut(&handle.0)
    }

    /// Сбросить весь учёт и заново построить начальную популяцию
    /// (используется при teardown сцены)
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.busy.clear();
        self.overflow.clear();
        self.populate_initial();
    }

    /// Прогнать cleanup hook по всем построенным объектам и дропнуть всё
    /// (без повторной популяции)
    pub fn dispose(&mut self) {
        if let Some(cleanup) = &self.cleanup {
            for item in self.slots.values_mut() {
                cleanup(item);
            }
        }
        self.slots.clear();
        self.free.clear();
        self.busy.clear();
        self.overflow.clear();
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn in_use(&self) -> usize {
        self.busy.len()
    }

    pub fn max_size(&self) -> usize {
        self.config.max_size
    }
}

// ============================================================================
// Scene containers
// ============================================================================

/// Переиспользуемый scene container (слот внешнего scene graph)
///
/// Симуляция не рендерит — container хранит только то состояние,
/// которое надо восстановить перед повторной выдачей.
#[derive(Debug, Clone, Reflect)]
pub struct SceneContainer {
    pub visible: bool,
    pub opacity: f32,
    pub local_position: Vec3,
}

impl Default for SceneContainer {
    fn default() -> Self {
        Self {
            visible: true,
            opacity: 1.0,
            local_position: Vec3::ZERO,
        }
    }
}

/// Пул scene containers (resource симуляции)
///
/// Политика — `Fail`: при исчерпании спавн пропускается, см. spawn_enemy.
#[derive(Resource)]
pub struct ScenePool(pub ResourcePool<SceneContainer>);

impl ScenePool {
    pub fn with_capacity(max_size: usize) -> Self {
        let config = PoolConfig {
            initial_size: max_size.min(8),
            expand_size: 4,
            max_size,
            policy: ExhaustionPolicy::Fail,
        };
        let pool = ResourcePool::new(config, SceneContainer::default)
            .with_reset(|container| *container = SceneContainer::default());
        Self(pool)
    }
}

impl Default for ScenePool {
    fn default() -> Self {
        Self::with_capacity(64)
    }
}

/// Scene handle юнита (выдаётся при спавне, возвращается при деспавне)
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct SceneSlot(pub PoolHandle);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter_pool(config: PoolConfig) -> ResourcePool<u32> {
        let mut n = 0;
        ResourcePool::new(config, move || {
            n += 1;
            n
        })
    }

    #[test]
    fn test_acquire_reuses_released() {
        let mut pool = counter_pool(PoolConfig {
            initial_size: 1,
            expand_size: 1,
            max_size: 4,
            policy: ExhaustionPolicy::Fail,
        });

        let a = pool.acquire().unwrap();
        pool.release(a);
        let b = pool.acquire().unwrap();

        // Тот же объект вернулся из free, новый не строился
        assert_eq!(a, b);
        assert_eq!(pool.in_use(), 1);
    }

    #[test]
    fn test_invariant_holds_under_churn() {
        let mut pool = counter_pool(PoolConfig {
            initial_size: 2,
            expand_size: 2,
            max_size: 5,
            policy: ExhaustionPolicy::Fail,
        });

        let mut handles = Vec::new();
        for _ in 0..5 {
            handles.push(pool.acquire().unwrap());
            assert!(pool.available() + pool.in_use() <= pool.max_size());
        }
        assert_eq!(pool.in_use(), 5);

        // Шестой — исчерпание
        assert_eq!(pool.acquire(), Err(PoolExhausted));
        assert!(pool.available() + pool.in_use() <= pool.max_size());

        for handle in handles {
            pool.release(handle);
            assert!(pool.available() + pool.in_use() <= pool.max_size());
        }
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.available(), 5);
    }

    #[test]
    fn test_exhaustion_policy_fail() {
        let mut pool = counter_pool(PoolConfig {
            initial_size: 2,
            expand_size: 2,
            max_size: 2,
            policy: ExhaustionPolicy::Fail,
        });

        let _a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        assert_eq!(pool.acquire(), Err(PoolExhausted));
    }

    #[test]
    fn test_exhaustion_policy_overflow() {
        let mut pool = counter_pool(PoolConfig {
            initial_size: 2,
            expand_size: 2,
            max_size: 2,
            policy: ExhaustionPolicy::Overflow,
        });

        let _a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();

        // Over-budget объект выдаётся вне учёта
        let extra = pool.acquire().unwrap();
        assert_eq!(pool.in_use(), 2);
        assert!(pool.available() + pool.in_use() <= pool.max_size());

        // Его release дропает объект, free не растёт
        pool.release(extra);
        assert_eq!(pool.available(), 0);
        assert!(pool.get(extra).is_none());
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut pool = counter_pool(PoolConfig {
            initial_size: 1,
            expand_size: 1,
            max_size: 2,
            policy: ExhaustionPolicy::Fail,
        });

        let a = pool.acquire().unwrap();
        pool.release(a);
        let before = pool.available();

        // Повторный release того же handle — no-op, дублей в free нет
        pool.release(a);
        assert_eq!(pool.available(), before);
    }

    #[test]
    fn test_reset_runs_on_release() {
        let mut pool = ResourcePool::new(
            PoolConfig {
                initial_size: 1,
                expand_size: 1,
                max_size: 2,
                policy: ExhaustionPolicy::Fail,
            },
            SceneContainer::default,
        )
        .with_reset(|c| *c = SceneContainer::default());

        let handle = pool.acquire().unwrap();
        {
            let container = pool.get_mut(handle).unwrap();
            container.visible = false;
            container.opacity = 0.3;
        }

        pool.release(handle);

        // После release состояние восстановлено к дефолту
        let container = pool.get(handle).unwrap();
        assert!(container.visible);
        assert_eq!(container.opacity, 1.0);
    }

    #[test]
    fn test_clear_repopulates() {
        let mut pool = counter_pool(PoolConfig {
            initial_size: 3,
            expand_size: 1,
            max_size: 8,
            policy: ExhaustionPolicy::Fail,
        });

        let a = pool.acquire().unwrap();
        pool.clear();

        assert_eq!(pool.available(), 3);
        assert_eq!(pool.in_use(), 0);
        // Старый handle устарел: get ничего не находит, release — no-op
        assert!(pool.get(a).is_none());
        pool.release(a);
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn test_dispose_runs_cleanup_on_every_slot() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let cleaned_hook = Arc::clone(&cleaned);

        let mut pool = ResourcePool::new(
            PoolConfig {
                initial_size: 3,
                expand_size: 1,
                max_size: 4,
                policy: ExhaustionPolicy::Fail,
            },
            || 0u32,
        )
        .with_cleanup(move |_| {
            cleaned_hook.fetch_add(1, Ordering::SeqCst);
        });

        let _held = pool.acquire().unwrap();
        pool.dispose();

        // Hook прошёл по всем построенным объектам, включая busy
        assert_eq!(cleaned.load(Ordering::SeqCst), 3);
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.in_use(), 0);
    }
}
