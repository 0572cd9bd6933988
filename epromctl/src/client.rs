//! Typed round trips on top of a [`Connection`].

use log::debug;

use crate::connection::Connection;
use crate::device::DeviceProfile;
use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::{READ_PAYLOAD_OFFSET, Request, Response};

/// Issues one request at a time and waits for its answer.
pub struct CommandClient<P: Port> {
    connection: Connection<P>,
    selected: Option<DeviceProfile>,
}

impl<P: Port> CommandClient<P> {
    /// Create a client over an established connection.
    pub fn new(connection: Connection<P>) -> Self {
        Self {
            connection,
            selected: None,
        }
    }

    /// Profile chosen with [`CommandClient::select_device`], if any.
    pub fn selected(&self) -> Option<DeviceProfile> {
        self.selected
    }

    /// Tell the programmer which EPROM type is attached.
    ///
    /// Allowed once per connection.
    pub fn select_device(&mut self, profile: &DeviceProfile) -> Result<()> {
        if let Some(current) = self.selected {
            return Err(Error::Validation(format!(
                "EPROM type {current} is already selected on this connection"
            )));
        }

        self.expect_ok(&Request::SelectDevice(profile.name.to_string()))?;
        debug!("Selected EPROM type {profile} ({} bytes)", profile.size);
        self.selected = Some(*profile);
        Ok(())
    }

    /// Read the byte at `address`.
    pub fn read_byte(&mut self, address: u32) -> Result<u8> {
        self.check_address(address)?;
        let payload = self.expect_ok(&Request::ReadByte(address))?;
        parse_read_payload(&payload)
    }

    /// Write `value` at `address`.
    pub fn write_byte(&mut self, address: u32, value: u8) -> Result<()> {
        self.check_address(address)?;
        self.expect_ok(&Request::WriteByte(address, value))?;
        Ok(())
    }

    /// Enable or disable the device's write protection.
    pub fn set_protection(&mut self, enabled: bool) -> Result<()> {
        self.ensure_selected()?;
        self.expect_ok(&Request::SetProtection(enabled))?;
        Ok(())
    }

    /// Get a reference to the connection.
    pub fn connection(&self) -> &Connection<P> {
        &self.connection
    }

    /// Close the connection.
    pub fn close(&mut self) -> Result<()> {
        self.connection.close()
    }

    fn ensure_selected(&self) -> Result<DeviceProfile> {
        self.selected.ok_or(Error::NotSelected)
    }

    fn check_address(&self, address: u32) -> Result<()> {
        let profile = self.ensure_selected()?;
        if profile.contains(address) {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "Address {address:#x} is outside the {profile} (0x0 to {:#x})",
                profile.last_address()
            )))
        }
    }

    fn expect_ok(&mut self, request: &Request) -> Result<String> {
        match self.connection.transact(request)? {
            Response::Ok(payload) => Ok(payload),
            Response::Error(message) => {
                debug!("Programmer rejected {request}: {message}");
                Err(Error::DeviceRejected(message))
            },
        }
    }
}

/// Extract the byte from an `R` response.
fn parse_read_payload(line: &str) -> Result<u8> {
    let digits = line
        .get(READ_PAYLOAD_OFFSET..)
        .map(str::trim)
        .filter(|digits| !digits.is_empty())
        .ok_or_else(|| Error::Protocol(format!("Read response {line:?} carries no data")))?;

    u8::from_str_radix(digits, 16)
        .map_err(|_| Error::Protocol(format!("Read response {line:?} is not a byte value")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::{ErrorKind, Read, Write};
    use std::time::Duration;

    /// Port that replays canned response lines.
    struct ScriptedPort {
        responses: VecDeque<u8>,
        written: Vec<u8>,
    }

    impl ScriptedPort {
        fn new(responses: &str) -> Self {
            Self {
                responses: responses.bytes().collect(),
                written: Vec::new(),
            }
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let mut n = 0;
            while n < buf.len() {
                match self.responses.pop_front() {
                    Some(byte) => {
                        buf[n] = byte;
                        n += 1;
                    },
                    None => break,
                }
            }
            if n == 0 {
                Err(std::io::Error::new(ErrorKind::TimedOut, "no data"))
            } else {
                Ok(n)
            }
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Port for ScriptedPort {
        fn name(&self) -> &str {
            "scripted"
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn client(responses: &str) -> CommandClient<ScriptedPort> {
        let connection = Connection::new(ScriptedPort::new(responses), Duration::from_millis(50));
        CommandClient::new(connection)
    }

    fn written(client: &CommandClient<ScriptedPort>) -> String {
        String::from_utf8(client.connection().port().written.clone()).unwrap()
    }

    fn profile(name: &str) -> DeviceProfile {
        DeviceProfile::find(name).unwrap()
    }

    #[test]
    fn test_select_then_read() {
        let mut client = client("OK\nR:3c\n");
        client.select_device(&profile("28C64")).unwrap();
        assert_eq!(client.read_byte(0).unwrap(), 0x3c);
        assert_eq!(written(&client), "S,28C64\nR,0\n");
    }

    #[test]
    fn test_select_twice_is_rejected_without_io() {
        let mut client = client("OK\n");
        client.select_device(&profile("28C16")).unwrap();
        let err = client.select_device(&profile("28C64")).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(written(&client), "S,28C16\n");
    }

    #[test]
    fn test_select_rejected_by_device() {
        let mut client = client("E,unsupported\n");
        let err = client.select_device(&profile("27C16")).unwrap_err();
        assert!(matches!(err, Error::DeviceRejected(ref m) if m == "unsupported"));
        assert_eq!(client.selected(), None);
    }

    #[test]
    fn test_byte_commands_require_selection() {
        let mut client = client("");
        assert!(matches!(client.read_byte(0), Err(Error::NotSelected)));
        assert!(matches!(client.write_byte(0, 1), Err(Error::NotSelected)));
        assert!(matches!(client.set_protection(true), Err(Error::NotSelected)));
        assert_eq!(written(&client), "");
    }

    #[test]
    fn test_address_bounds_checked_before_io() {
        let mut client = client("OK\nR:ff\n");
        client.select_device(&profile("28C16")).unwrap();

        let err = client.read_byte(2048).unwrap_err();
        assert!(err.is_validation());
        assert!(client.write_byte(0x800, 0).unwrap_err().is_validation());
        assert_eq!(written(&client), "S,28C16\n");

        assert_eq!(client.read_byte(2047).unwrap(), 0xff);
        assert_eq!(written(&client), "S,28C16\nR,7ff\n");
    }

    #[test]
    fn test_write_byte_and_protection_frames() {
        let mut client = client("OK\nOK\nOK\nOK\n");
        client.select_device(&profile("28C256")).unwrap();
        client.write_byte(0x1234, 0x0f).unwrap();
        client.set_protection(true).unwrap();
        client.set_protection(false).unwrap();
        assert_eq!(written(&client), "S,28C256\nW,1234,f\nP,1\nP,0\n");
    }

    #[test]
    fn test_write_rejected_by_device() {
        let mut client = client("OK\nEwrite failed\n");
        client.select_device(&profile("28C64")).unwrap();
        let err = client.write_byte(1, 2).unwrap_err();
        assert_eq!(err.to_string(), "write failed");
    }

    #[test]
    fn test_read_payload_parsing() {
        assert_eq!(parse_read_payload("R:a5").unwrap(), 0xa5);
        assert_eq!(parse_read_payload("OK0").unwrap(), 0x0);
        assert_eq!(parse_read_payload("R:00ff").unwrap(), 0xff);
        assert!(matches!(parse_read_payload("R"), Err(Error::Protocol(_))));
        assert!(matches!(parse_read_payload("R:"), Err(Error::Protocol(_))));
        assert!(matches!(parse_read_payload("R:zz"), Err(Error::Protocol(_))));
        assert!(matches!(parse_read_payload("R:100"), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_read_times_out() {
        let mut client = client("OK\n");
        client.select_device(&profile("28C64")).unwrap();
        assert!(matches!(client.read_byte(5), Err(Error::Timeout(_))));
    }
}
