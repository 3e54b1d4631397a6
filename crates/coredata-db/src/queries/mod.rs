//! Collection operations on [`DbClient`](crate::DbClient)
//!
//! One `impl DbClient` block per collection. Every operation acquires its
//! store handle inside the store call, so nothing here holds resources
//! across awaits.

mod events;
mod readings;
mod value_descriptors;
