//! D-Bus interface for the StatusOLED daemon.
//!
//! Provides the `org.statusoled.Daemon1` interface on the session or system bus.

mod interface;

pub use interface::run_dbus_server;
