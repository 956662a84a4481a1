//! Platform-specific type aliases and trait bounds
//!
//! This module provides conditional compilation for single-threaded (Rc-based)
//! vs multi-threaded (Arc-based) implementations.
//!
//! - `send` feature (default): Uses Arc and requires Send bounds on listeners,
//!   results and spawned reader tasks
//! - `local` feature: Uses Rc and removes Send requirements; takes precedence
//!   when both features are enabled

// ============================================================================
// MULTI-THREADED (send feature - default)
// ============================================================================
#[cfg(all(feature = "send", not(feature = "local")))]
pub use std::sync::Arc as SharedPtr;
#[cfg(all(feature = "send", not(feature = "local")))]
pub use std::sync::Weak as WeakPtr;

#[cfg(all(feature = "send", not(feature = "local")))]
pub trait MaybeSend: Send {}
#[cfg(all(feature = "send", not(feature = "local")))]
impl<T: Send> MaybeSend for T {}

#[cfg(all(feature = "send", not(feature = "local")))]
pub trait MaybeSync: Sync {}
#[cfg(all(feature = "send", not(feature = "local")))]
impl<T: Sync> MaybeSync for T {}

// Boxed future handed to a reader's spawner
#[cfg(all(feature = "send", not(feature = "local")))]
pub type PlatformBoxFutureStatic<T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'static>>;

// Event listener registered on a reader
#[cfg(all(feature = "send", not(feature = "local")))]
pub type Listener<E> = Box<dyn FnMut(&crate::reader::ReaderEvent<E>) + Send + 'static>;

// Spawn function shared by every reader a factory creates
#[cfg(all(feature = "send", not(feature = "local")))]
pub type Spawner = SharedPtr<dyn Fn(PlatformBoxFutureStatic<()>) + Send + Sync + 'static>;

// ============================================================================
// SINGLE-THREADED (local feature)
// ============================================================================
#[cfg(feature = "local")]
pub use std::rc::Rc as SharedPtr;
#[cfg(feature = "local")]
pub use std::rc::Weak as WeakPtr;

#[cfg(feature = "local")]
pub trait MaybeSend {}
#[cfg(feature = "local")]
impl<T> MaybeSend for T {}

#[cfg(feature = "local")]
pub trait MaybeSync {}
#[cfg(feature = "local")]
impl<T> MaybeSync for T {}

#[cfg(feature = "local")]
pub type PlatformBoxFutureStatic<T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + 'static>>;

#[cfg(feature = "local")]
pub type Listener<E> = Box<dyn FnMut(&crate::reader::ReaderEvent<E>) + 'static>;

#[cfg(feature = "local")]
pub type Spawner = SharedPtr<dyn Fn(PlatformBoxFutureStatic<()>) + 'static>;

#[cfg(not(any(feature = "send", feature = "local")))]
compile_error!("enable either the `send` or the `local` feature");
