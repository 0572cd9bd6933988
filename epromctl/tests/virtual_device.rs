//! End-to-end behaviour against an in-memory EPROM programmer.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use epromctl::{
    Connection, DeviceProfile, Error, NoProgress, OperationState, Port, Programmer, Result,
    SerialConfig, image,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// How the virtual programmer answers requests.
#[derive(Clone)]
enum Behavior {
    Normal,
    /// Answer every request with this command code with `E,<message>`.
    Reject(char, &'static str),
    /// Never answer requests with this command code.
    Silent(char),
}

/// State visible to the test after the port has been moved away.
#[derive(Default)]
struct Shared {
    memory: Vec<u8>,
    requests: Vec<String>,
    protected: Option<bool>,
    closed: bool,
}

struct VirtualEprom {
    behavior: Behavior,
    shared: Arc<Mutex<Shared>>,
    incoming: Vec<u8>,
    outgoing: VecDeque<u8>,
}

impl VirtualEprom {
    fn new(size: usize, behavior: Behavior) -> (Self, Arc<Mutex<Shared>>) {
        let shared = Arc::new(Mutex::new(Shared {
            memory: vec![0xff; size],
            ..Shared::default()
        }));
        let port = Self {
            behavior,
            shared: Arc::clone(&shared),
            incoming: Vec::new(),
            // CR and a stray control byte must not disturb framing
            outgoing: b"EPROM Programmer v1.2\r\n\x00".iter().copied().collect(),
        };
        (port, shared)
    }

    fn answer(&mut self, line: &str) {
        let mut shared = self.shared.lock().unwrap();
        shared.requests.push(line.to_string());

        let mut fields = line.split(',');
        let code = fields.next().and_then(|f| f.chars().next()).unwrap_or('?');

        let reply = match &self.behavior {
            Behavior::Silent(c) if *c == code => return,
            Behavior::Reject(c, message) if *c == code => format!("E,{message}"),
            _ => match code {
                'S' => "OK".to_string(),
                'R' => {
                    let address = usize::from_str_radix(fields.next().unwrap(), 16).unwrap();
                    format!("R:{:x}", shared.memory[address])
                },
                'W' => {
                    let address = usize::from_str_radix(fields.next().unwrap(), 16).unwrap();
                    let value = u8::from_str_radix(fields.next().unwrap(), 16).unwrap();
                    shared.memory[address] = value;
                    "OK".to_string()
                },
                'P' => {
                    shared.protected = Some(fields.next() == Some("1"));
                    "OK".to_string()
                },
                _ => "E,unknown command".to_string(),
            },
        };

        self.outgoing.extend(reply.bytes());
        self.outgoing.extend(b"\r\n");
    }
}

impl Read for VirtualEprom {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.outgoing.is_empty() {
            return Err(io::Error::new(ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(self.outgoing.len());
        for (slot, byte) in buf.iter_mut().zip(self.outgoing.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for VirtualEprom {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if byte == b'\n' {
                let line = String::from_utf8(std::mem::take(&mut self.incoming)).unwrap();
                self.answer(&line);
            } else {
                self.incoming.push(byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for VirtualEprom {
    fn name(&self) -> &str {
        "virtual"
    }

    fn close(&mut self) -> Result<()> {
        self.shared.lock().unwrap().closed = true;
        Ok(())
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config() -> SerialConfig {
    SerialConfig::new("virtual")
        .with_settle_delay(Duration::ZERO)
        .with_response_timeout(Duration::from_millis(100))
}

fn profile(name: &str) -> DeviceProfile {
    DeviceProfile::find(name).unwrap()
}

fn connect(name: &str, behavior: Behavior) -> (Programmer<VirtualEprom>, Arc<Mutex<Shared>>) {
    init_logging();
    let profile = profile(name);
    let (port, shared) = VirtualEprom::new(profile.size as usize, behavior);
    let programmer = Programmer::connect(port, profile, &config()).unwrap();
    (programmer, shared)
}

#[test]
fn select_then_read_first_byte() {
    let (mut programmer, shared) = connect("28C16", Behavior::Normal);
    assert_eq!(programmer.read_byte(0).unwrap(), 0xff);
    assert_eq!(shared.lock().unwrap().requests, vec!["S,28C16", "R,0"]);
}

#[test]
fn bulk_write_then_read_round_trips() {
    let (mut programmer, shared) = connect("28C16", Behavior::Normal);
    let written: Vec<u8> = (0..2048u32).map(|i| (i * 7 % 251) as u8).collect();

    assert_eq!(programmer.write(&written, &mut NoProgress).unwrap(), 2048);
    let read = programmer.read(&mut NoProgress).unwrap();

    assert_eq!(read, written);
    assert_eq!(shared.lock().unwrap().memory, written);
    assert_eq!(programmer.state(), &OperationState::Done);
}

#[test]
fn partial_image_writes_only_its_prefix() {
    let (mut programmer, shared) = connect("28C64", Behavior::Normal);
    programmer.write(&[1, 2, 3], &mut NoProgress).unwrap();

    let shared = shared.lock().unwrap();
    assert_eq!(&shared.memory[..4], &[1, 2, 3, 0xff]);
    assert_eq!(shared.requests.len(), 4);
}

#[test]
fn verify_is_repeatable() {
    let (mut programmer, _shared) = connect("28C16", Behavior::Normal);
    let image = vec![0x5a; 100];
    programmer.write(&image, &mut NoProgress).unwrap();

    assert_eq!(programmer.verify(&image, &mut NoProgress).unwrap(), 100);
    assert_eq!(programmer.verify(&image, &mut NoProgress).unwrap(), 100);
}

#[test]
fn verify_reports_first_mismatch() {
    let (mut programmer, shared) = connect("28C16", Behavior::Normal);
    programmer.write(&[1, 2, 3, 4], &mut NoProgress).unwrap();

    let err = programmer
        .verify(&[1, 2, 0xff, 4], &mut NoProgress)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DataMismatch {
            address: 0x2,
            actual: 0x3,
            expected: 0xff
        }
    ));
    assert!(err.to_string().contains("(0x3)"));
    assert!(err.to_string().contains("(0xff)"));
    assert!(err.to_string().contains("address 0x2"));
    assert!(matches!(programmer.state(), OperationState::Failed(_)));

    // Stopped at the mismatch: S, four writes, three reads
    assert_eq!(shared.lock().unwrap().requests.len(), 8);
}

#[test]
fn last_address_is_valid_and_size_is_rejected() {
    let (mut programmer, shared) = connect("28C16", Behavior::Normal);

    programmer.write_byte(2047, 0x42).unwrap();
    assert_eq!(programmer.read_byte(0x7ff).unwrap(), 0x42);

    let before = shared.lock().unwrap().requests.len();
    assert!(programmer.read_byte(2048).unwrap_err().is_validation());
    assert!(programmer.write_byte(2048, 0).unwrap_err().is_validation());
    assert_eq!(shared.lock().unwrap().requests.len(), before);
}

#[test]
fn full_range_data_value_is_written() {
    let (mut programmer, shared) = connect("28C16", Behavior::Normal);
    programmer.write_byte(0x10, 0xff).unwrap();
    programmer.write_byte(0x11, 0x00).unwrap();
    let shared = shared.lock().unwrap();
    assert_eq!(shared.requests[1..], ["W,10,ff", "W,11,0"]);
}

#[test]
fn fill_writes_saveable_values_below_ff() {
    let (mut programmer, shared) = connect("28C16", Behavior::Normal);
    let mut rng = StdRng::seed_from_u64(0x2816);

    let filled = programmer.fill(&mut rng, &mut NoProgress).unwrap();
    assert_eq!(filled.len(), 2048);
    assert!(filled.iter().all(|&v| v <= 254));
    assert_eq!(shared.lock().unwrap().memory, filled);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fill.txt");
    image::save(&path, &filled).unwrap();
    assert_eq!(image::load(&path, 2048).unwrap(), filled);
}

#[test]
fn protection_is_forwarded() {
    let (mut programmer, shared) = connect("28C64", Behavior::Normal);
    programmer.set_protection(true).unwrap();
    assert_eq!(shared.lock().unwrap().protected, Some(true));
    programmer.set_protection(false).unwrap();
    assert_eq!(shared.lock().unwrap().protected, Some(false));
}

#[test]
fn rejected_selection_stops_everything() {
    init_logging();
    let (port, shared) = VirtualEprom::new(2048, Behavior::Reject('S', "unsupported"));

    let result = Programmer::connect(port, profile("28C16"), &config());
    let Err(err) = result else {
        panic!("selection should have been rejected");
    };
    assert!(matches!(err, Error::DeviceRejected(ref m) if m == "unsupported"));
    assert_eq!(err.to_string(), "unsupported");

    let shared = shared.lock().unwrap();
    assert_eq!(shared.requests, vec!["S,28C16"]);
    assert!(shared.closed);
}

#[test]
fn rejected_write_aborts_bulk_operation() {
    let (mut programmer, shared) = connect("28C16", Behavior::Reject('W', "write protected"));
    let err = programmer.write(&[1, 2, 3], &mut NoProgress).unwrap_err();

    assert_eq!(err.to_string(), "write protected");
    assert_eq!(shared.lock().unwrap().requests, vec!["S,28C16", "W,0,1"]);
}

#[test]
fn silent_device_times_out_and_closes() {
    let (mut programmer, shared) = connect("28C16", Behavior::Silent('R'));

    let err = programmer.read(&mut NoProgress).unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
    assert!(!shared.lock().unwrap().closed);

    drop(programmer);
    assert!(shared.lock().unwrap().closed);
}

#[test]
fn missing_greeting_times_out() {
    init_logging();
    let (mut port, shared) = VirtualEprom::new(2048, Behavior::Normal);
    port.outgoing.clear();

    let result = Connection::establish(port, &config());
    assert!(matches!(result, Err(Error::Timeout(_))));
    assert!(shared.lock().unwrap().closed);
}

#[test]
fn explicit_close_releases_port() {
    let (programmer, shared) = connect("27C256", Behavior::Normal);
    programmer.close().unwrap();
    assert!(shared.lock().unwrap().closed);
}
