//! # Ledgerkeel Test Suite
//!
//! Integration scenarios exercising the appending pipeline end to end
//! through its public entry points, against the in-memory storage adapter.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Chain builder, keys, transaction builders,
//! │                     # scriptable fake VM
//! └── integration/
//!     ├── pipeline.rs   # Dispatch core: pool vs block, duplicates,
//!     │                 # ordering, fan-out, fees, index
//!     └── fallible.rs   # Exchange/invoke failed-but-recorded outcomes
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p appender-tests
//! cargo test -p appender-tests integration::pipeline::
//! ```

pub mod fixtures;
pub mod integration;
