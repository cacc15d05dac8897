//! D-Bus client library for communicating with the StatusOLED daemon.

use anyhow::{Context, Result};
use tracing::debug;
use zbus::{proxy, Connection};

/// Well-known bus name of the daemon.
pub const SERVICE_NAME: &str = "org.statusoled.Daemon";

/// D-Bus bus type selection.
#[derive(Debug, Clone, Copy, Default)]
pub enum BusType {
    /// Session bus (user session).
    Session,
    /// System bus (system-wide).
    System,
    /// Try session first, fall back to system.
    #[default]
    Auto,
}

/// D-Bus proxy for the StatusOLED daemon.
#[proxy(
    interface = "org.statusoled.Daemon1",
    default_service = "org.statusoled.Daemon",
    default_path = "/org/statusoled/Daemon"
)]
trait Daemon1 {
    /// Shows a status message; an empty message clears the displays.
    fn show_text(&self, text: &str) -> zbus::Result<()>;

    /// Sets the print progress in percent.
    fn set_progress(&self, progress: f64) -> zbus::Result<()>;

    /// Feeds a G-code line; returns true if it was a status command.
    fn send_gcode(&self, line: &str) -> zbus::Result<bool>;

    /// Notifies a printer lifecycle event by name.
    fn notify_event(&self, event: &str) -> zbus::Result<()>;

    /// Blanks every display.
    fn clear_display(&self) -> zbus::Result<()>;

    /// Returns the current frame as PNG data.
    fn get_screen_png(&self) -> zbus::Result<Vec<u8>>;

    /// Lists available font files.
    fn list_fonts(&self) -> zbus::Result<Vec<String>>;

    /// Shuts down the daemon.
    fn quit(&self) -> zbus::Result<()>;

    /// Whether the OLED panel is connected and enabled.
    #[zbus(property)]
    fn panel_connected(&self) -> zbus::Result<bool>;

    /// Current print progress in percent.
    #[zbus(property)]
    fn progress(&self) -> zbus::Result<f64>;

    /// Queued status lines, most recent first.
    #[zbus(property)]
    fn text(&self) -> zbus::Result<Vec<String>>;
}

/// D-Bus client wrapper for the daemon.
pub struct DaemonClient {
    proxy: Daemon1Proxy<'static>,
}

impl DaemonClient {
    /// Attempts to connect to the daemon via D-Bus with auto bus detection.
    pub async fn connect() -> Result<Self> {
        Self::connect_with_bus(BusType::Auto).await
    }

    /// Attempts to connect to the daemon via D-Bus with specified bus type.
    pub async fn connect_with_bus(bus_type: BusType) -> Result<Self> {
        let connection = match bus_type {
            BusType::Session => {
                debug!("Connecting to session bus");
                Connection::session()
                    .await
                    .context("Failed to connect to session bus")?
            }
            BusType::System => {
                debug!("Connecting to system bus");
                Connection::system()
                    .await
                    .context("Failed to connect to system bus")?
            }
            BusType::Auto => match Connection::session().await {
                Ok(conn) if Self::service_exists(&conn).await => {
                    debug!("Found daemon on session bus");
                    conn
                }
                Ok(_) => {
                    debug!("Daemon not on session bus, trying system bus");
                    let sys_conn = Connection::system()
                        .await
                        .context("Failed to connect to system bus")?;
                    if !Self::service_exists(&sys_conn).await {
                        anyhow::bail!(
                            "Daemon service not found on session or system bus. Is statusoledd running?"
                        );
                    }
                    debug!("Found daemon on system bus");
                    sys_conn
                }
                Err(_) => {
                    debug!("Session bus unavailable, trying system bus");
                    Connection::system()
                        .await
                        .context("Failed to connect to any D-Bus")?
                }
            },
        };

        let proxy = Daemon1Proxy::new(&connection)
            .await
            .context("Failed to create D-Bus proxy")?;

        Ok(Self { proxy })
    }

    /// Checks if the daemon service exists on the given connection.
    async fn service_exists(conn: &Connection) -> bool {
        use zbus::fdo::DBusProxy;
        let Ok(dbus_proxy) = DBusProxy::new(conn).await else {
            return false;
        };
        let Ok(name) = SERVICE_NAME.try_into() else {
            return false;
        };
        dbus_proxy.name_has_owner(name).await.unwrap_or(false)
    }

    /// Shows a status message.
    pub async fn show_text(&self, text: &str) -> Result<()> {
        self.proxy
            .show_text(text)
            .await
            .context("Failed to show text via D-Bus")
    }

    /// Sets the print progress in percent.
    pub async fn set_progress(&self, progress: f64) -> Result<()> {
        self.proxy
            .set_progress(progress)
            .await
            .context("Failed to set progress via D-Bus")
    }

    /// Feeds a G-code line.
    pub async fn send_gcode(&self, line: &str) -> Result<bool> {
        self.proxy
            .send_gcode(line)
            .await
            .context("Failed to send G-code via D-Bus")
    }

    /// Notifies a printer lifecycle event.
    pub async fn notify_event(&self, event: &str) -> Result<()> {
        self.proxy
            .notify_event(event)
            .await
            .context("Failed to notify event via D-Bus")
    }

    /// Blanks every display.
    pub async fn clear_display(&self) -> Result<()> {
        self.proxy
            .clear_display()
            .await
            .context("Failed to clear display via D-Bus")
    }

    /// Gets the screen as PNG data.
    pub async fn get_screen_png(&self) -> Result<Vec<u8>> {
        self.proxy
            .get_screen_png()
            .await
            .context("Failed to get screen PNG via D-Bus")
    }

    /// Lists available font files.
    pub async fn list_fonts(&self) -> Result<Vec<String>> {
        self.proxy
            .list_fonts()
            .await
            .context("Failed to list fonts via D-Bus")
    }

    /// Shuts down the daemon.
    pub async fn quit(&self) -> Result<()> {
        self.proxy
            .quit()
            .await
            .context("Failed to quit daemon via D-Bus")
    }

    /// Checks if the OLED panel is connected.
    pub async fn is_panel_connected(&self) -> Result<bool> {
        self.proxy
            .panel_connected()
            .await
            .context("Failed to get panel status via D-Bus")
    }

    /// Current print progress.
    pub async fn progress(&self) -> Result<f64> {
        self.proxy
            .progress()
            .await
            .context("Failed to get progress via D-Bus")
    }

    /// Queued status lines, most recent first.
    pub async fn text(&self) -> Result<Vec<String>> {
        self.proxy
            .text()
            .await
            .context("Failed to get text via D-Bus")
    }
}
