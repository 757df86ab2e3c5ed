//! Auto-start registration with the host OS
//!
//! - Linux and other Unix: XDG autostart `.desktop` entry
//! - macOS: per-user LaunchAgent plist
//! - Windows: `HKCU\Software\Microsoft\Windows\CurrentVersion\Run` value
//!
//! The registered command is `"<exe>" run`.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

pub const APP_NAME: &str = "dirsentry";

/// Registrar for launching the agent at login
pub struct AutoStart {
    app_name: String,
    exe: PathBuf,
    #[cfg(not(windows))]
    dir: PathBuf,
}

impl AutoStart {
    /// Registrar for the running executable in the platform location
    pub fn for_current_exe() -> Result<Self> {
        let exe = std::env::current_exe().context("Failed to get current executable path")?;
        Self::new(APP_NAME, exe)
    }

    #[cfg(not(windows))]
    pub fn new(app_name: &str, exe: PathBuf) -> Result<Self> {
        let dir = platform_dir().context("Could not determine auto-start directory")?;
        Ok(Self::with_dir(app_name, exe, dir))
    }

    #[cfg(windows)]
    pub fn new(app_name: &str, exe: PathBuf) -> Result<Self> {
        Ok(Self {
            app_name: app_name.to_string(),
            exe,
        })
    }

    /// Registrar writing its entry into `dir`
    #[cfg(not(windows))]
    pub fn with_dir(app_name: &str, exe: PathBuf, dir: PathBuf) -> Self {
        Self {
            app_name: app_name.to_string(),
            exe,
            dir,
        }
    }

    /// Command line the OS will run
    pub fn command_line(&self) -> String {
        format!("\"{}\" run", self.exe.display())
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn platform_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("autostart"))
}

#[cfg(target_os = "macos")]
fn platform_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|d| d.join("Library").join("LaunchAgents"))
}

#[cfg(not(windows))]
impl AutoStart {
    pub fn enable(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let entry = self.entry_path();
        std::fs::write(&entry, self.render())
            .with_context(|| format!("Failed to write {}", entry.display()))?;
        info!("Auto-start enabled ({})", entry.display());
        Ok(())
    }

    pub fn disable(&self) -> Result<()> {
        let entry = self.entry_path();
        match std::fs::remove_file(&entry) {
            Ok(()) => info!("Auto-start disabled ({})", entry.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove {}", entry.display()))
            }
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> Result<bool> {
        Ok(self.entry_path().is_file())
    }

    /// File holding the registration
    pub fn entry_path(&self) -> PathBuf {
        self.dir.join(entry_file_name(&self.app_name))
    }

    #[cfg(not(target_os = "macos"))]
    fn render(&self) -> String {
        format!(
            "[Desktop Entry]\n\
             Type=Application\n\
             Name={name}\n\
             Comment=Notify about changes in a watched directory\n\
             Exec={exec}\n\
             Terminal=false\n\
             NoDisplay=true\n\
             X-GNOME-Autostart-enabled=true\n",
            name = self.app_name,
            exec = self.command_line(),
        )
    }

    #[cfg(target_os = "macos")]
    fn render(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{exe}</string>
        <string>run</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
</dict>
</plist>
"#,
            label = launch_label(&self.app_name),
            exe = xml_escape(&self.exe.display().to_string()),
        )
    }
}

#[cfg(all(not(windows), not(target_os = "macos")))]
fn entry_file_name(app_name: &str) -> String {
    format!("{}.desktop", app_name)
}

#[cfg(target_os = "macos")]
fn entry_file_name(app_name: &str) -> String {
    format!("{}.plist", launch_label(app_name))
}

#[cfg(target_os = "macos")]
fn launch_label(app_name: &str) -> String {
    format!("com.{}.agent", app_name)
}

#[cfg(target_os = "macos")]
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(windows)]
const RUN_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";

#[cfg(windows)]
impl AutoStart {
    pub fn enable(&self) -> Result<()> {
        use winreg::enums::HKEY_CURRENT_USER;
        use winreg::RegKey;

        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let (key, _) = hkcu.create_subkey(RUN_KEY).context("Failed to open Run key")?;
        key.set_value(&self.app_name, &self.command_line())
            .context("Failed to write Run value")?;
        info!("Auto-start enabled (HKCU\\{})", RUN_KEY);
        Ok(())
    }

    pub fn disable(&self) -> Result<()> {
        use winreg::enums::{HKEY_CURRENT_USER, KEY_WRITE};
        use winreg::RegKey;

        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let key = hkcu
            .open_subkey_with_flags(RUN_KEY, KEY_WRITE)
            .context("Failed to open Run key")?;
        match key.delete_value(&self.app_name) {
            Ok(()) => info!("Auto-start disabled"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).context("Failed to delete Run value"),
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> Result<bool> {
        use winreg::enums::{HKEY_CURRENT_USER, KEY_READ};
        use winreg::RegKey;

        let hkcu = RegKey::predef(HKEY_CURRENT_USER);
        let key = match hkcu.open_subkey_with_flags(RUN_KEY, KEY_READ) {
            Ok(key) => key,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e).context("Failed to open Run key"),
        };
        Ok(key.get_value::<String, _>(&self.app_name).is_ok())
    }
}

/// Human readable status line
pub fn describe(registrar: &AutoStart) -> Result<String> {
    let enabled = registrar.is_enabled()?;
    Ok(if enabled {
        format!("Auto-start is enabled: {}", registrar.command_line())
    } else {
        "Auto-start is disabled".to_string()
    })
}
