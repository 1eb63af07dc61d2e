//! Protocol-related utilities
//!
//! This module contains the handlers negotiating the window roles of client surfaces:
//! xdg toplevels and popups, layer surfaces and session lock surfaces.
//!
//! Decoding the wire protocol is left to the transport. Every utility provided in this
//! module works in the same way:
//!
//! - A state struct (e.g. [`XdgShellState`](shell::xdg::XdgShellState)) is created and
//!   stored in the compositor state, and the matching handler trait is implemented.
//!   All handler traits together form [`ShellHandler`](shell::ShellHandler).
//! - Decoded requests are fed to the `handle_*_request` functions, role factories like
//!   [`get_toplevel`](shell::xdg::get_toplevel) create the role objects.
//! - Events meant for a client are queued on its [`Client`] and drained by the
//!   transport with [`Client::drain_events`].
//!
//! A protocol violation is posted to the [`Client`] as a [`ProtocolError`]; the
//! connection is dead from then on and all of its further requests are ignored.

pub mod client;
pub mod compositor;
pub mod error;
pub mod event;
pub mod output;
pub mod seat;
pub mod session_lock;
pub mod shell;

#[cfg(test)]
pub(crate) mod test_utils;

pub use self::client::{Client, ClientId};
pub use self::error::{Interface, ProtocolError};
pub use self::event::Event;
