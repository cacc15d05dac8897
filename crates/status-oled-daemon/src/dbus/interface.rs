//! D-Bus interface implementation using zbus.
//!
//! Provides the `org.statusoled.Daemon1` interface.

use std::sync::Arc;

use tracing::{debug, info, warn};
use zbus::{interface, object_server::SignalEmitter, Connection};

use crate::config::DbusBusType;
use crate::printer::PrinterEvent;
use crate::state::AppState;

/// Well-known bus name of the daemon.
const BUS_NAME: &str = "org.statusoled.Daemon";

/// Object path of the daemon interface.
const OBJECT_PATH: &str = "/org/statusoled/Daemon";

/// D-Bus interface implementation for the StatusOLED daemon.
pub struct Daemon1Interface {
    state: Arc<AppState>,
    shutdown_tx: tokio::sync::mpsc::Sender<()>,
}

impl Daemon1Interface {
    /// Creates a new D-Bus interface.
    pub fn new(state: Arc<AppState>, shutdown_tx: tokio::sync::mpsc::Sender<()>) -> Self {
        Self { state, shutdown_tx }
    }
}

#[interface(name = "org.statusoled.Daemon1")]
impl Daemon1Interface {
    /// Shows a status message; an empty message clears the displays.
    async fn show_text(
        &self,
        text: &str,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> zbus::fdo::Result<()> {
        self.state.show_status(text);
        if let Err(e) = self.text_changed(&emitter).await {
            warn!("Failed to emit Text change: {}", e);
        }
        debug!("D-Bus: ShowText({})", text);
        Ok(())
    }

    /// Sets the print progress in percent.
    async fn set_progress(
        &self,
        progress: f64,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> zbus::fdo::Result<()> {
        if progress.is_nan() {
            return Err(zbus::fdo::Error::InvalidArgs(
                "Progress must be a number".to_string(),
            ));
        }
        self.state.set_progress(progress as f32);
        if let Err(e) = self.progress_changed(&emitter).await {
            warn!("Failed to emit Progress change: {}", e);
        }
        debug!("D-Bus: SetProgress({})", progress);
        Ok(())
    }

    /// Feeds a sent G-code line; returns true if it was a status command.
    fn send_gcode(&self, line: &str) -> bool {
        debug!("D-Bus: SendGcode({})", line);
        self.state.handle_gcode(line)
    }

    /// Notifies a printer lifecycle event by name (e.g. "PrintStarted").
    fn notify_event(&self, event: &str) -> zbus::fdo::Result<()> {
        let event: PrinterEvent = event
            .parse()
            .map_err(|e: String| zbus::fdo::Error::InvalidArgs(e))?;
        self.state.handle_event(event);
        debug!("D-Bus: NotifyEvent({})", event);
        Ok(())
    }

    /// Blanks every display.
    fn clear_display(&self) {
        self.state.clear_all_displays();
        debug!("D-Bus: ClearDisplay");
    }

    /// Returns the current frame as PNG bytes.
    fn get_screen_png(&self) -> zbus::fdo::Result<Vec<u8>> {
        self.state
            .screen_png()
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Lists the available font files.
    fn list_fonts(&self) -> Vec<String> {
        self.state.fonts()
    }

    /// Requests the daemon to shut down.
    async fn quit(&self) -> zbus::fdo::Result<()> {
        info!("D-Bus: Quit requested");
        self.shutdown_tx
            .send(())
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Ok(())
    }

    /// Whether the OLED panel is connected and enabled.
    #[zbus(property)]
    fn panel_connected(&self) -> bool {
        self.state.is_panel_connected()
    }

    /// Current print progress in percent.
    #[zbus(property)]
    fn progress(&self) -> f64 {
        self.state.progress() as f64
    }

    /// Queued status lines, most recent first.
    #[zbus(property)]
    fn text(&self) -> Vec<String> {
        self.state.lines()
    }
}

/// Connects to the appropriate D-Bus bus based on configuration.
async fn connect_to_bus(bus_type: DbusBusType) -> anyhow::Result<(Connection, &'static str)> {
    match bus_type {
        DbusBusType::Session => {
            let conn = Connection::session()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to session bus: {}", e))?;
            Ok((conn, "session"))
        }
        DbusBusType::System => {
            let conn = Connection::system()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to system bus: {}", e))?;
            Ok((conn, "system"))
        }
        DbusBusType::Auto => match Connection::session().await {
            Ok(conn) => Ok((conn, "session")),
            Err(session_err) => {
                warn!(
                    "Session bus unavailable ({}), trying system bus",
                    session_err
                );
                let conn = Connection::system().await.map_err(|system_err| {
                    anyhow::anyhow!(
                        "Failed to connect to any D-Bus: session={}, system={}",
                        session_err,
                        system_err
                    )
                })?;
                Ok((conn, "system"))
            }
        },
    }
}

/// Runs the D-Bus server.
pub async fn run_dbus_server(
    state: Arc<AppState>,
    shutdown_tx: tokio::sync::mpsc::Sender<()>,
    bus_type: DbusBusType,
) -> anyhow::Result<Connection> {
    let interface = Daemon1Interface::new(state, shutdown_tx);

    let (connection, bus_name) = connect_to_bus(bus_type).await?;

    connection
        .object_server()
        .at(OBJECT_PATH, interface)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to register object: {}", e))?;

    connection
        .request_name(BUS_NAME)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to request bus name: {}", e))?;

    info!("D-Bus service registered at {} on {} bus", BUS_NAME, bus_name);
    Ok(connection)
}
