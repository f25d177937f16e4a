//! Testing utilities for reduce sessions.
//!
//! This module is used by the crate's own tests and is public so reduce logic
//! built on top of the engine can be tested the same way. It includes:
//!
//! - **Mocks**: in-memory sources, collecting and failing sinks, a recording
//!   instrumentation sink and a fixed memory probe
//! - **Builders**: [`TupleBuilder`] for sorted input streams
//! - **Fixtures**: small, ready-made task configurations and inputs
//! - **Assertions**: [`collect_groups`] and [`assert_groups_equal`]
//!
//! # Quick Start
//!
//! ```
//! use ironreduce::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut session = words_session(CollectingSink::new())?;
//! let groups = collect_groups(&mut session)?;
//! assert_groups_equal(&groups, &[group("A", [1, 2]), group("B", [3, 4, 5])]);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod builders;
pub mod fixtures;
pub mod mocks;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
pub use mocks::*;
