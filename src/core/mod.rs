//! # Core Module
//!
//! Shared-ownership handles for the GPU objects that several parts of the
//! renderer hold on to at once: the device, the queue and the buffer registry.
//!
//! Everything here is single-threaded. The event loop owns the renderer and
//! nothing GPU-side crosses a thread boundary.
//!
//! ## Usage
//! ```rust
//! use geomip_terrain::core::StSystem;
//!
//! let counter = StSystem::new(0u32);
//! *counter.get_mut() += 1;
//! assert_eq!(*counter.get(), 1);
//! ```

pub mod st_system;

pub use st_system::StSystem;
