//! The trail capability: an ordered, append-only list of child crumbs.
//!
//! Any type becomes trail-bearing by embedding a [`Trail`] and implementing
//! [`TrailCapable::trail_slot`]:
//!
//! ```ignore
//! struct Pipeline {
//!     name: String,
//!     trail: Trail,
//! }
//!
//! impl TrailCapable for Pipeline {
//!     fn trail_slot(&self) -> &Trail {
//!         &self.trail
//!     }
//! }
//! ```

use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::crumb::Crumb;

/// Storage for a trail. Nothing is allocated until the first crumb arrives.
#[derive(Default)]
pub struct Trail {
    entries: Mutex<Option<Vec<Crumb>>>,
}

impl Trail {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(None),
        }
    }

    /// Copy of the current sequence; empty when nothing was ever attached.
    pub fn snapshot(&self) -> Vec<Crumb> {
        self.entries().clone().unwrap_or_default()
    }

    pub fn push(&self, crumb: Crumb) {
        self.entries().get_or_insert_with(Vec::new).push(crumb);
    }

    pub fn replace(&self, crumbs: Vec<Crumb>) {
        *self.entries() = Some(crumbs);
    }

    pub fn len(&self) -> usize {
        self.entries().as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether storage has been created yet.
    pub fn is_allocated(&self) -> bool {
        self.entries().is_some()
    }

    fn entries(&self) -> MutexGuard<'_, Option<Vec<Crumb>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloning a trail copies the sequence; the two no longer affect each other.
impl Clone for Trail {
    fn clone(&self) -> Self {
        Self {
            entries: Mutex::new(self.entries().clone()),
        }
    }
}

impl fmt::Debug for Trail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.snapshot()).finish()
    }
}

/// Anything that can own a trail of crumbs.
pub trait TrailCapable {
    fn trail_slot(&self) -> &Trail;

    fn trail(&self) -> Vec<Crumb> {
        self.trail_slot().snapshot()
    }

    fn attach_child(&self, crumb: Crumb) {
        self.trail_slot().push(crumb);
    }

    /// Replace this trail with a snapshot of `other`'s trail as it is now.
    fn copy_trail_from(&self, other: &dyn TrailCapable) {
        let crumbs = other.trail();
        self.trail_slot().replace(crumbs);
    }
}

impl<T: TrailCapable + ?Sized> TrailCapable for &T {
    fn trail_slot(&self) -> &Trail {
        (**self).trail_slot()
    }
}

impl<T: TrailCapable + ?Sized> TrailCapable for &mut T {
    fn trail_slot(&self) -> &Trail {
        (**self).trail_slot()
    }
}

impl<T: TrailCapable + ?Sized> TrailCapable for Box<T> {
    fn trail_slot(&self) -> &Trail {
        (**self).trail_slot()
    }
}

impl<T: TrailCapable + ?Sized> TrailCapable for Rc<T> {
    fn trail_slot(&self) -> &Trail {
        (**self).trail_slot()
    }
}

impl<T: TrailCapable + ?Sized> TrailCapable for Arc<T> {
    fn trail_slot(&self) -> &Trail {
        (**self).trail_slot()
    }
}
