use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
};

/// A single-threaded shared handle with interior mutability.
///
/// Clones share the same value. Borrows are checked at runtime by the inner
/// `RefCell`.
///
/// # Examples
///
/// ```rust
/// use geomip_terrain::core::StSystem;
///
/// let system = StSystem::new(String::from("device"));
/// let shared = system.clone();
/// shared.get_mut().push_str(" lost");
/// assert_eq!(*system.get(), "device lost");
/// ```
///
/// # Panics
/// - Panics if a borrow is held while trying to mutably borrow
/// - Panics if a mutable borrow is held while trying to borrow
pub struct StSystem<T> {
    system: Rc<RefCell<T>>,
}

impl<T> StSystem<T> {
    /// Wraps `system` in a new shared handle.
    pub fn new(system: T) -> Self {
        Self {
            system: Rc::new(RefCell::new(system)),
        }
    }

    /// Returns an immutable borrow of the contained value.
    ///
    /// # Panics
    /// Panics if the value is currently mutably borrowed.
    pub fn get(&self) -> Ref<'_, T> {
        self.system.borrow()
    }

    /// Returns a mutable borrow of the contained value.
    ///
    /// # Panics
    /// Panics if the value is currently borrowed.
    pub fn get_mut(&self) -> RefMut<'_, T> {
        self.system.borrow_mut()
    }
}

impl<T> Clone for StSystem<T> {
    fn clone(&self) -> Self {
        Self {
            system: self.system.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_value() {
        let system = StSystem::new(vec![1, 2]);
        let other = system.clone();
        other.get_mut().push(3);

        assert_eq!(*system.get(), vec![1, 2, 3]);
    }
}
