//! Free-list allocator for transient entities such as projectiles.

use serde::{Deserialize, Serialize};

/// Sizing parameters for a [`Pool`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    initial: usize,
    max: Option<usize>,
}

impl PoolConfig {
    /// Creates a configuration that preallocates `initial` objects and never
    /// grows beyond `max` when a cap is provided.
    #[must_use]
    pub const fn new(initial: usize, max: Option<usize>) -> Self {
        Self { initial, max }
    }

    /// Number of objects constructed up front.
    #[must_use]
    pub const fn initial(&self) -> usize {
        self.initial
    }

    /// Upper bound on constructed objects, if any.
    #[must_use]
    pub const fn max(&self) -> Option<usize> {
        self.max
    }
}

/// Index of an object owned by a [`Pool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolSlot(usize);

impl PoolSlot {
    /// Position of the slot inside the pool's storage.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

/// Occupancy figures reported by [`Pool::stats`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStats {
    /// Objects currently owned by the pool.
    pub size: usize,
    /// Objects waiting on the free list.
    pub free: usize,
    /// Objects handed out and not yet released.
    pub in_use: usize,
    /// Objects constructed over the pool's lifetime.
    pub created: usize,
    /// Configured capacity, if any.
    pub max: Option<usize>,
}

/// Generic object pool with optional capacity.
///
/// Released objects go back on a LIFO free list and are handed out again
/// before the pool constructs anything new. Reaching capacity is backpressure,
/// not an error: [`Pool::acquire`] returns `None` and the caller skips the
/// spawn.
pub struct Pool<T> {
    slots: Vec<T>,
    in_use: Vec<bool>,
    free: Vec<usize>,
    max: Option<usize>,
    create: Box<dyn FnMut() -> T>,
    reset: Box<dyn FnMut(&mut T)>,
}

impl<T> Pool<T> {
    /// Builds a pool and preallocates `config.initial()` objects.
    pub fn new<C, R>(config: PoolConfig, create: C, reset: R) -> Self
    where
        C: FnMut() -> T + 'static,
        R: FnMut(&mut T) + 'static,
    {
        let mut pool = Self {
            slots: Vec::new(),
            in_use: Vec::new(),
            free: Vec::new(),
            max: config.max(),
            create: Box::new(create),
            reset: Box::new(reset),
        };
        let _ = pool.preallocate(config.initial());
        pool
    }

    /// Hands out a free object, constructing one while under capacity.
    pub fn acquire(&mut self) -> Option<PoolSlot> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => self.grow()?,
        };
        self.in_use[index] = true;
        Some(PoolSlot(index))
    }

    /// Resets the object and returns it to the free list.
    ///
    /// Returns `false` if the slot was not handed out, which keeps a double
    /// release from putting one object on the free list twice.
    pub fn release(&mut self, slot: PoolSlot) -> bool {
        match self.in_use.get_mut(slot.0) {
            Some(flag) if *flag => {
                *flag = false;
                (self.reset)(&mut self.slots[slot.0]);
                self.free.push(slot.0);
                true
            }
            _ => false,
        }
    }

    /// Constructs up to `count` additional free objects, respecting capacity.
    ///
    /// Returns the number of objects actually constructed.
    pub fn preallocate(&mut self, count: usize) -> usize {
        let mut constructed = 0;
        while constructed < count {
            match self.grow() {
                Some(index) => self.free.push(index),
                None => break,
            }
            constructed += 1;
        }
        constructed
    }

    /// Borrows a handed-out object.
    #[must_use]
    pub fn get(&self, slot: PoolSlot) -> Option<&T> {
        if self.is_in_use(slot) {
            self.slots.get(slot.0)
        } else {
            None
        }
    }

    /// Mutably borrows a handed-out object.
    pub fn get_mut(&mut self, slot: PoolSlot) -> Option<&mut T> {
        if self.is_in_use(slot) {
            self.slots.get_mut(slot.0)
        } else {
            None
        }
    }

    /// Reports whether `slot` is currently handed out.
    #[must_use]
    pub fn is_in_use(&self, slot: PoolSlot) -> bool {
        self.in_use.get(slot.0).copied().unwrap_or(false)
    }

    /// Current occupancy figures.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let free = self.free.len();
        PoolStats {
            size: self.slots.len(),
            free,
            in_use: self.slots.len() - free,
            created: self.slots.len(),
            max: self.max,
        }
    }

    fn grow(&mut self) -> Option<usize> {
        if let Some(max) = self.max {
            if self.slots.len() >= max {
                return None;
            }
        }
        let index = self.slots.len();
        self.slots.push((self.create)());
        self.in_use.push(false);
        Some(index)
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool").field("stats", &self.stats()).finish()
    }
}
