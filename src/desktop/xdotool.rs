//! Xdotool driver for Linux desktop automation.
//!
//! Wraps `xdotool` (X11) and `scrot` for screenshots.
//!
//! Requires: `sudo apt install xdotool scrot` (X11 session).

use super::{InputDriver, MouseButton, keysym};
use crate::config::InputControllerConfig;
use crate::intent::ScrollDirection;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Linux input automation via xdotool.
pub struct XdotoolDriver {
    timeout: Duration,
    move_duration: Duration,
    click_delay_ms: u64,
    type_delay_ms: u64,
}

impl XdotoolDriver {
    pub fn new(config: &InputControllerConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.command_timeout_secs.max(1)),
            move_duration: Duration::from_secs_f32(config.move_duration_secs.max(0.0)),
            click_delay_ms: secs_to_ms(config.click_delay_secs),
            type_delay_ms: secs_to_ms(config.type_interval_secs),
        }
    }

    /// Returns `true` if `xdotool` is on `PATH`.
    pub fn is_available(&self) -> bool {
        which::which("xdotool").is_ok()
    }

    /// Run a command with timeout, returning stdout.
    fn run_command(&self, program: &str, args: &[&str]) -> Result<String, String> {
        let start = Instant::now();

        let mut child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("failed to spawn {program}: {e}"))?;

        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) => {
                    if start.elapsed() > self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(format!(
                            "{program} timed out after {}s",
                            self.timeout.as_secs()
                        ));
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
                Err(e) => return Err(format!("failed to check {program} status: {e}")),
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| format!("failed to read {program} output: {e}"))?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code().unwrap_or(-1);
            let detail = if stderr.trim().is_empty() {
                stdout.as_str()
            } else {
                &*stderr
            };
            return Err(format!("{program} exited with code {code}: {}", detail.trim()));
        }
        Ok(stdout)
    }

    /// Run xdotool and log failures.
    fn xdotool(&self, args: &[&str]) -> bool {
        debug!(?args, "xdotool");
        match self.run_command("xdotool", args) {
            Ok(_) => true,
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }

    /// Glide to `(x, y)` over the configured move duration.
    fn move_pointer(&self, x: i32, y: i32) -> bool {
        let steps = (self.move_duration.as_millis() / 25).clamp(1, 40) as u32;
        let Some((sx, sy)) = self.pointer_position() else {
            return self.xdotool(&["mousemove", "--sync", &x.to_string(), &y.to_string()]);
        };
        for step in 1..=steps {
            let t = f64::from(step) / f64::from(steps);
            let px = f64::from(sx) + f64::from(x - sx) * t;
            let py = f64::from(sy) + f64::from(y - sy) * t;
            let (px, py) = (px.round() as i32, py.round() as i32);
            if !self.xdotool(&["mousemove", &px.to_string(), &py.to_string()]) {
                return false;
            }
            std::thread::sleep(self.move_duration / steps);
        }
        true
    }

    fn pointer_position(&self) -> Option<(i32, i32)> {
        let out = self.run_command("xdotool", &["getmouselocation", "--shell"]).ok()?;
        parse_mouse_location(&out)
    }
}

impl InputDriver for XdotoolDriver {
    fn name(&self) -> &str {
        "xdotool"
    }

    fn click(&self, x: Option<i32>, y: Option<i32>, button: MouseButton, double: bool) -> bool {
        if let (Some(x), Some(y)) = (x, y) {
            if !self.move_pointer(x, y) {
                return false;
            }
        }
        let button = match button {
            MouseButton::Left => "1",
            MouseButton::Middle => "2",
            MouseButton::Right => "3",
        };
        if double {
            let delay = self.click_delay_ms.to_string();
            self.xdotool(&["click", "--repeat", "2", "--delay", &delay, button])
        } else {
            self.xdotool(&["click", button])
        }
    }

    fn type_text(&self, text: &str) -> bool {
        let delay = self.type_delay_ms.to_string();
        self.xdotool(&["type", "--delay", &delay, "--", text])
    }

    fn press_key(&self, key: &str) -> bool {
        let key = keysym(key);
        self.xdotool(&["key", &key])
    }

    fn key_combination(&self, keys: &[String]) -> bool {
        if keys.is_empty() {
            return false;
        }
        let combo = keys
            .iter()
            .map(|k| keysym(k))
            .collect::<Vec<_>>()
            .join("+");
        self.xdotool(&["key", &combo])
    }

    fn scroll(&self, amount: u32, direction: ScrollDirection) -> bool {
        // Buttons 4 and 5 are the wheel.
        let button = match direction {
            ScrollDirection::Up => "4",
            ScrollDirection::Down => "5",
        };
        let repeat = amount.max(1).to_string();
        self.xdotool(&["click", "--repeat", &repeat, button])
    }

    fn screen_size(&self) -> Option<(u32, u32)> {
        let out = self.run_command("xdotool", &["getdisplaygeometry"]).ok()?;
        parse_geometry(&out)
    }

    fn screenshot(&self) -> Option<PathBuf> {
        let path = std::env::temp_dir().join(format!(
            "buddy_screenshot_{}.png",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ));
        let path_str = path.to_string_lossy().into_owned();
        match self.run_command("scrot", &["--overwrite", &path_str]) {
            Ok(_) => Some(path),
            Err(e) => {
                warn!("screenshot failed: {e}");
                None
            }
        }
    }
}

fn secs_to_ms(secs: f32) -> u64 {
    (secs.max(0.0) * 1000.0).round() as u64
}

/// Parse `xdotool getdisplaygeometry` output (`"1920 1080"`).
fn parse_geometry(out: &str) -> Option<(u32, u32)> {
    let mut parts = out.split_whitespace();
    let w = parts.next()?.parse().ok()?;
    let h = parts.next()?.parse().ok()?;
    Some((w, h))
}

/// Parse `xdotool getmouselocation --shell` output.
fn parse_mouse_location(out: &str) -> Option<(i32, i32)> {
    let mut x = None;
    let mut y = None;
    for line in out.lines() {
        if let Some(v) = line.strip_prefix("X=") {
            x = v.trim().parse().ok();
        } else if let Some(v) = line.strip_prefix("Y=") {
            y = v.trim().parse().ok();
        }
    }
    Some((x?, y?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_parsing() {
        assert_eq!(parse_geometry("1920 1080\n"), Some((1920, 1080)));
        assert_eq!(parse_geometry("garbage"), None);
    }

    #[test]
    fn mouse_location_parsing() {
        let out = "X=640\nY=480\nSCREEN=0\nWINDOW=123\n";
        assert_eq!(parse_mouse_location(out), Some((640, 480)));
        assert_eq!(parse_mouse_location("SCREEN=0"), None);
    }

    #[test]
    fn delays_follow_config() {
        let driver = XdotoolDriver::new(&InputControllerConfig::default());
        assert_eq!(driver.click_delay_ms, 100);
        assert_eq!(driver.type_delay_ms, 10);
        assert_eq!(driver.move_duration, Duration::from_millis(500));
    }
}
