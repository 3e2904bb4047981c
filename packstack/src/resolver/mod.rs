//! Layered resource resolution.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │               AggregateResolver                │
//! │  namespace "a" ──► NamespaceResolver           │
//! │  namespace "b" ──► NamespaceResolver           │
//! └────────────────────────────────────────────────┘
//!                        │
//!                        ▼
//!     [ source 0 ] [ source 1 ] ... [ source n-1 ]
//!      lowest priority            highest priority
//! ```
//!
//! Both resolvers implement [`ResourceManager`], the query surface handed to
//! the rest of the application.

mod aggregate;
mod manager;
mod namespace;

pub use aggregate::AggregateResolver;
pub use manager::{ListFilter, ResourceManager};
pub use namespace::{IdFilter, NamespaceResolver};
