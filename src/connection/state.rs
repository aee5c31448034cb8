use std::cell::{Cell, RefCell};

use log::debug;

use crate::error::{DbError, DbResult};

/// Hook run once per cursor, before its first step, with the expanded SQL.
pub(crate) type TraceHook = Box<dyn FnMut(&str) -> DbResult<()>>;

/// Per-connection bookkeeping shared by every statement and cursor.
pub(crate) struct DbState {
    busy: Cell<bool>,
    iterators: Cell<u16>,
    iterator_ceiling: u16,
    safe_integers: Cell<bool>,
    unsafe_mode: Cell<bool>,
    trace: RefCell<Option<TraceHook>>,
    // bumped on every set_trace, so a running hook can tell it was replaced or cleared
    trace_epoch: Cell<u64>,
}

impl DbState {
    pub fn new(iterator_ceiling: u16, safe_integers: bool, unsafe_mode: bool) -> Self {
        Self {
            busy: Cell::new(false),
            iterators: Cell::new(0),
            iterator_ceiling,
            safe_integers: Cell::new(safe_integers),
            unsafe_mode: Cell::new(unsafe_mode),
            trace: RefCell::new(None),
            trace_epoch: Cell::new(0),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    pub fn require_not_busy(&self) -> DbResult<()> {
        if self.busy.get() {
            return Err(DbError::Busy);
        }
        Ok(())
    }

    /// Marks the connection busy until the returned guard is dropped.
    pub fn enter(&self) -> BusyGuard<'_> {
        debug_assert!(!self.busy.get());
        self.busy.set(true);
        BusyGuard { state: self }
    }

    pub fn iterators(&self) -> u16 {
        self.iterators.get()
    }

    pub fn has_iterator_room(&self) -> bool {
        self.iterators.get() < self.iterator_ceiling
    }

    pub fn add_iterator(&self) {
        debug_assert!(self.has_iterator_room());
        self.iterators.set(self.iterators.get() + 1);
    }

    pub fn remove_iterator(&self) {
        debug_assert!(self.iterators.get() > 0);
        self.iterators.set(self.iterators.get().saturating_sub(1));
    }

    /// Writes are refused while cursors are live, unless unsafe mode is on.
    pub fn require_no_iterators(&self) -> DbResult<()> {
        if self.iterators.get() > 0 && !self.unsafe_mode.get() {
            return Err(DbError::Busy);
        }
        Ok(())
    }

    pub fn safe_integers(&self) -> bool {
        self.safe_integers.get()
    }

    pub fn set_safe_integers(&self, safe_integers: bool) {
        self.safe_integers.set(safe_integers);
    }

    pub fn set_unsafe_mode(&self, unsafe_mode: bool) {
        self.unsafe_mode.set(unsafe_mode);
    }

    pub fn has_trace(&self) -> bool {
        self.trace.borrow().is_some()
    }

    pub fn set_trace(&self, hook: Option<TraceHook>) {
        self.trace_epoch.set(self.trace_epoch.get() + 1);
        *self.trace.borrow_mut() = hook;
    }

    /// Runs the trace hook, if any, with `sql`.
    ///
    /// The hook is taken out for the duration of the call so it may touch the
    /// connection again. It is put back only if nobody set or cleared the hook
    /// while it ran.
    pub fn trace(&self, sql: &str) -> DbResult<()> {
        let Some(mut hook) = self.trace.borrow_mut().take() else {
            return Ok(());
        };
        let epoch = self.trace_epoch.get();
        let result = hook(sql);
        if self.trace_epoch.get() == epoch {
            *self.trace.borrow_mut() = Some(hook);
        }
        if result.is_err() {
            debug!("trace hook failed for: {}", sql);
        }
        result
    }
}

/// Clears the busy flag on every exit path.
pub(crate) struct BusyGuard<'a> {
    state: &'a DbState,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state.busy.set(false);
    }
}
