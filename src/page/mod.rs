//! The in-page side of See My Clicks.
//!
//! Everything that runs next to the host app: building captures from live elements,
//! finding them again after re-renders and navigation, and keeping the numbered markers,
//! badge and comment box in step with the store. The browser script served at
//! `client.js` follows the same rules; this module is the typed, testable form of them
//! over the [`dom::Dom`] abstraction.

pub mod capture;
pub mod client;
pub mod controller;
pub mod dom;
pub mod overlay;
pub mod reconciler;
pub mod resolver;
pub mod scheduler;
pub mod selector;

pub use capture::{CaptureBuilder, PageContext};
pub use client::{ClientError, StoreClient};
pub use controller::{CaptureController, Command, Interaction, Modifiers};
pub use dom::{Document, Dom, NodeId, Rect};
pub use overlay::Overlay;
pub use reconciler::{MarkerReconciler, SyncReport};
pub use resolver::{ComponentResolver, ResolverChain};
pub use scheduler::{run_debounced, SyncTrigger};
