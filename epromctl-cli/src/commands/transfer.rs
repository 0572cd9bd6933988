//! Whole-device read, write, verify and fill.

use anyhow::{Context, Result};
use console::style;
use epromctl::image;
use log::info;
use std::path::Path;

use crate::session::Session;
use crate::{Cli, CliError, progress};

/// Refuse to overwrite an existing file.
pub(crate) fn ensure_absent(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(CliError::Validation(format!(
            "A file with the name {} already exists",
            path.display()
        ))
        .into());
    }
    Ok(())
}

/// Require an existing input file.
pub(crate) fn ensure_present(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(CliError::Validation(format!(
            "There is no file with the name {}",
            path.display()
        ))
        .into());
    }
    Ok(())
}

/// Load and validate an image before the port is opened.
fn load_image(session: &Session, path: &Path) -> Result<Vec<u8>> {
    ensure_present(path)?;
    let data = image::load(path, session.size())
        .with_context(|| format!("Cannot load {}", path.display()))?;
    info!("{} holds {} bytes", path.display(), data.len());
    Ok(data)
}

/// Save an image produced by the device.
fn save_image(path: &Path, data: &[u8]) -> Result<()> {
    image::save(path, data).with_context(|| format!("Cannot write {}", path.display()))
}

fn done(cli: &Cli, message: &str) {
    if !cli.quiet {
        eprintln!("{} {}", style("Done:").green().bold(), message);
    }
}

/// Read the whole EPROM into `file`.
pub(crate) fn cmd_read(cli: &Cli, session: &Session, file: &Path) -> Result<()> {
    ensure_absent(file)?;

    let mut programmer = session.open()?;
    let data = programmer.read(progress::sink(cli).as_mut())?;
    programmer.close()?;

    save_image(file, &data)?;
    done(cli, &format!("saved {}", file.display()));
    println!("{} bytes read", data.len());
    Ok(())
}

/// Program the EPROM from `file`.
pub(crate) fn cmd_write(cli: &Cli, session: &Session, file: &Path) -> Result<()> {
    let data = load_image(session, file)?;

    let mut programmer = session.open()?;
    let written = programmer.write(&data, progress::sink(cli).as_mut())?;
    programmer.close()?;

    println!("{written} bytes written");
    Ok(())
}

/// Compare the EPROM against `file`.
pub(crate) fn cmd_verify(cli: &Cli, session: &Session, file: &Path) -> Result<()> {
    let data = load_image(session, file)?;

    let mut programmer = session.open()?;
    let verified = programmer.verify(&data, progress::sink(cli).as_mut())?;
    programmer.close()?;

    println!("{verified} bytes verified");
    Ok(())
}

/// Fill the EPROM with random values and record them in `file`.
pub(crate) fn cmd_fill(cli: &Cli, session: &Session, file: &Path) -> Result<()> {
    ensure_absent(file)?;

    let mut rng = rand::thread_rng();
    let mut programmer = session.open()?;
    let data = programmer.fill(&mut rng, progress::sink(cli).as_mut())?;
    programmer.close()?;

    save_image(file, &data)?;
    done(cli, &format!("saved {}", file.display()));
    println!("{} bytes written", data.len());
    Ok(())
}
