//! Manage launch at login

use crate::autostart::{self, AutoStart};
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run_enable() -> Result<()> {
    let registrar = AutoStart::for_current_exe()?;
    registrar.enable()?;
    println!("{} {}", "✓".green(), autostart::describe(&registrar)?);
    Ok(())
}

pub fn run_disable() -> Result<()> {
    let registrar = AutoStart::for_current_exe()?;
    registrar.disable()?;
    println!("{} {}", "✓".green(), autostart::describe(&registrar)?);
    Ok(())
}

pub fn run_status() -> Result<()> {
    let registrar = AutoStart::for_current_exe()?;
    println!("{}", autostart::describe(&registrar)?);
    Ok(())
}
