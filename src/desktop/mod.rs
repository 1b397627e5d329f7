//! Mouse and keyboard automation.
//!
//! [`InputDriver`] is the boundary to the platform automation tool. Every
//! operation reports success as a `bool` and never panics; the orchestrator
//! turns a `false` into a spoken apology.
//!
//! - **Linux/X11**: [`XdotoolDriver`](xdotool::XdotoolDriver) via `xdotool` + `scrot`
//! - Anywhere else, or when no tool is installed: [`DryRunDriver`], which
//!   only logs what it would have done.

#[cfg(target_os = "linux")]
pub mod xdotool;

use crate::config::InputControllerConfig;
use crate::intent::ScrollDirection;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Mouse button for a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
}

/// Platform automation backend.
pub trait InputDriver: Send + Sync {
    /// Human-readable backend name (e.g. "xdotool").
    fn name(&self) -> &str;

    /// Click at `(x, y)`, or at the current pointer position when either is `None`.
    fn click(&self, x: Option<i32>, y: Option<i32>, button: MouseButton, double: bool) -> bool;

    /// Type text as keyboard input.
    fn type_text(&self, text: &str) -> bool;

    /// Press and release one key.
    fn press_key(&self, key: &str) -> bool;

    /// Press keys together, e.g. `["command", "space"]`.
    fn key_combination(&self, keys: &[String]) -> bool;

    /// Scroll by `amount` wheel steps.
    fn scroll(&self, amount: u32, direction: ScrollDirection) -> bool;

    /// Screen size in pixels, if the backend can tell.
    fn screen_size(&self) -> Option<(u32, u32)>;

    /// Capture the screen, returning the image path.
    fn screenshot(&self) -> Option<PathBuf>;
}

// ── Dry run ─────────────────────────────────────────────────────

/// Driver that logs actions instead of performing them.
#[derive(Debug, Default)]
pub struct DryRunDriver;

impl InputDriver for DryRunDriver {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn click(&self, x: Option<i32>, y: Option<i32>, button: MouseButton, double: bool) -> bool {
        info!(?x, ?y, ?button, double, "dry-run click");
        true
    }

    fn type_text(&self, text: &str) -> bool {
        info!(text, "dry-run type");
        true
    }

    fn press_key(&self, key: &str) -> bool {
        info!(key, "dry-run key press");
        true
    }

    fn key_combination(&self, keys: &[String]) -> bool {
        info!(keys = %keys.join("+"), "dry-run key combination");
        true
    }

    fn scroll(&self, amount: u32, direction: ScrollDirection) -> bool {
        info!(amount, %direction, "dry-run scroll");
        true
    }

    fn screen_size(&self) -> Option<(u32, u32)> {
        None
    }

    fn screenshot(&self) -> Option<PathBuf> {
        info!("dry-run screenshot");
        None
    }
}

// ── Key names ───────────────────────────────────────────────────

/// Normalise a spoken or typed key name to the X keysym used by xdotool.
pub fn keysym(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let mapped = match lower.as_str() {
        "command" | "cmd" | "win" | "windows" | "meta" => "super",
        "control" => "ctrl",
        "option" => "alt",
        "enter" | "return" => "Return",
        "esc" | "escape" => "Escape",
        "tab" => "Tab",
        "space" | "spacebar" => "space",
        "backspace" => "BackSpace",
        "delete" | "del" => "Delete",
        "up" => "Up",
        "down" => "Down",
        "left" => "Left",
        "right" => "Right",
        "home" => "Home",
        "end" => "End",
        "page up" | "pageup" => "Prior",
        "page down" | "pagedown" => "Next",
        _ => return name.trim().to_owned(),
    };
    mapped.to_owned()
}

// ── Backend auto-detection ──────────────────────────────────────

/// Pick the best available driver for this machine.
pub fn detect_driver(config: &InputControllerConfig) -> Arc<dyn InputDriver> {
    #[cfg(target_os = "linux")]
    {
        let xd = xdotool::XdotoolDriver::new(config);
        if xd.is_available() {
            info!("using xdotool input driver");
            return Arc::new(xd);
        }
    }
    #[cfg(not(target_os = "linux"))]
    let _ = config;

    warn!("{}", install_instructions());
    Arc::new(DryRunDriver)
}

/// How to install an automation backend on this platform.
pub fn install_instructions() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "No desktop automation backend found; actions will only be logged.\n\
         Install xdotool: sudo apt install xdotool scrot (X11 session required)."
    }
    #[cfg(not(target_os = "linux"))]
    {
        "No desktop automation backend for this platform; actions will only be logged."
    }
}
