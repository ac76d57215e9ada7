//! Domain plugins built on the core record store and router.

pub mod proposal;
