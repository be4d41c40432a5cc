//! # Geomipmapped Terrain Demo
//!
//! Native entry point. Everything happens in the library's `run()`.
//!
//! ```bash
//! RUST_LOG=info cargo run --release
//! ```

fn main() {
    geomip_terrain::run();
}
