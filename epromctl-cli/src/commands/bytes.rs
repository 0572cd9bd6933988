//! Single-byte access and write protection.

use anyhow::Result;

use crate::session::Session;

/// Read one byte and print it in hex.
pub(crate) fn cmd_read_byte(session: &Session, address: u32) -> Result<()> {
    session.check_address(address)?;

    let mut programmer = session.open()?;
    let value = programmer.read_byte(address)?;
    programmer.close()?;

    println!("{value:#x}");
    Ok(())
}

/// Write one byte.
pub(crate) fn cmd_write_byte(session: &Session, address: u32, data: u8) -> Result<()> {
    session.check_address(address)?;

    let mut programmer = session.open()?;
    programmer.write_byte(address, data)?;
    programmer.close()?;

    log::info!(
        "Wrote {data:#x} to address {address:#x} of {}",
        session.profile()
    );
    Ok(())
}

/// Enable (`1`) or disable (`0`) write protection.
pub(crate) fn cmd_protect(session: &Session, mode: u8) -> Result<()> {
    let enabled = mode == 1;

    let mut programmer = session.open()?;
    programmer.set_protection(enabled)?;
    programmer.close()?;

    if enabled {
        println!("Protection set on EPROM");
    } else {
        println!("Protection removed from EPROM");
    }
    Ok(())
}
