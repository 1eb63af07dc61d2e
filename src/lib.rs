#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # Shellwright: role negotiation for wayland shell surfaces
//!
//! This crate implements the server side of the window roles a wayland compositor hands
//! out to client surfaces: xdg toplevels and popups, layer-shell surfaces and session
//! lock surfaces. It takes care of the protocol bookkeeping (role assignment,
//! double-buffered state, the configure/acknowledge handshake, popup positioning and
//! layer-shell geometry), while leaving window management and drawing to the compositor.
//!
//! ## Structure of the crate
//!
//! - [`wayland`] contains the handlers for the protocol objects: surfaces and their
//!   roles, the shells and the session lock.
//! - [`desktop`] contains the per-output arrangement of layer surfaces.
//! - [`utils`] contains the geometry types, serials and liveness tracking shared by
//!   everything else.
//!
//! ## General principles
//!
//! ### State handling
//!
//! The crate does not own an event loop nor decode the wire protocol. The compositor
//! keeps one central state struct, implements the handler traits of the protocols it
//! supports on it (together they form
//! [`ShellHandler`](wayland::shell::ShellHandler)), and passes a mutable reference to it
//! to every request handler. Handler invocation is always sequential, so no
//! synchronization is needed on the compositor side.
//!
//! Role objects (e.g. [`ToplevelSurface`](wayland::shell::xdg::ToplevelSurface)) are
//! cheap handles that can be cloned and stored freely. They only hold weak references to
//! their surface and turn inert once the client destroyed them.
//!
//! ### Logging
//!
//! Shellwright makes extensive use of [`tracing`] for its internal logging.
//!
//! For release builds it is recommended to limit the log level during compile time.
//! This can be done by adding a dependency to [`tracing`] and enabling the corresponding features.
//! For example to enable `trace` messages for debug builds, but limit release builds to `debug` add
//! the following in your binary crate `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! tracing = { version = "0.1", features = ["max_level_trace", "release_max_level_debug"] }
//! ```
//!
//! If you do not want to use [`tracing`] for your compositor, refer to [`log compatibility`](tracing#log-compatibility)
//! for how to forward shellwright's debug output to other `log` compatible frameworks.

pub mod desktop;
pub mod utils;
pub mod wayland;
