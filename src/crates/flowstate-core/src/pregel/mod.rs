//! Step-based execution engine
//!
//! Execution is divided into **steps** in the Pregel style:
//!
//! 1. **Input**: every node of the frontier receives the same state
//! 2. **Compute**: the nodes run concurrently
//! 3. **Barrier**: wait for all of them
//! 4. **Merge**: fold their updates into the state in frontier order
//! 5. **Route**: resolve the next frontier on the merged state
//! 6. **Checkpoint**: append one checkpoint for the step
//!
//! The loop repeats until the frontier is empty, an interrupt point is hit,
//! a step fails, or the recursion limit of the call is reached.
//!
//! - [`executor`] runs the tasks of one step (with per-node retries)
//! - [`loop_impl`] drives steps and writes checkpoints

pub(crate) mod executor;
pub(crate) mod loop_impl;

pub(crate) use loop_impl::ExecutionLoop;
