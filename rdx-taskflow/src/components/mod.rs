//! Contains the building blocks for creating task trees.
//!
//! This module provides the `Task` contract plus the concrete tasks the scheduler
//! and the builder are assembled from: waits, closures, releases, the
//! sequential/parallel `CompositeTask`, and the branching `ConditionalTask`.

pub mod composite;
pub mod condition;
pub mod conditional;
pub mod quick;
pub mod task;
pub mod wait;
