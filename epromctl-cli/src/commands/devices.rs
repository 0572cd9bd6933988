//! Supported EPROM types.

use anyhow::Result;
use epromctl::DeviceProfile;

/// Render the catalog as a text table.
fn render_table(profiles: &[DeviceProfile]) -> String {
    let mut out = String::new();
    for profile in profiles {
        out.push_str(&format!(
            "{:<8} {:>6} bytes (0x0 to {:#x})\n",
            profile.name,
            profile.size,
            profile.last_address()
        ));
    }
    out
}

/// List the supported EPROM types.
pub(crate) fn cmd_devices(json: bool) -> Result<()> {
    let profiles = DeviceProfile::all();
    if json {
        println!("{}", serde_json::to_string_pretty(profiles)?);
    } else {
        print!("{}", render_table(profiles));
    }
    Ok(())
}
