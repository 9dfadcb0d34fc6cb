//! Driver and programmer runs against the emulated module

use std::cell::RefCell;
use std::fmt::Write;
use std::rc::Rc;

use iqrf_core::module::{McuType, ModuleType};
use iqrf_core::pgm::{FileKind, PgmStatus, Programmer, SecretKind, SecretWriter};
use iqrf_core::port::SliceSource;
use iqrf_core::spi::{opcodes, LinkStatus, QueueStatus, TransportStatus};
use iqrf_core::transport::{Driver, DriverConfig, SendStatus};
use iqrf_core::{Error, Result};

use super::*;

type Handler = Box<dyn FnMut(&[u8])>;
type TestDriver = Driver<DummyModule, Handler>;
type Received = Rc<RefCell<Vec<Vec<u8>>>>;

const MAX_TICKS: usize = 200_000;

fn start(module: DummyModule) -> (TestDriver, Received) {
    let received: Received = Rc::default();
    let sink = received.clone();
    let handler: Handler = Box::new(move |data: &[u8]| sink.borrow_mut().push(data.to_vec()));
    let mut drv = Driver::new(module, DriverConfig::default(), handler);
    drv.init();
    (drv, received)
}

fn tick_until(drv: &mut TestDriver, mut done: impl FnMut(&TestDriver) -> bool) {
    for _ in 0..MAX_TICKS {
        if done(drv) {
            return;
        }
        drv.tick();
        drv.wait_tick();
    }
    panic!("condition not reached");
}

fn communication_ready(drv: &mut TestDriver) {
    tick_until(drv, |d| d.transport_status() == TransportStatus::CommunicationMode);
}

fn send(drv: &mut TestDriver, data: &[u8]) -> Result<SendStatus> {
    for _ in 0..MAX_TICKS {
        match drv.send(data) {
            Ok(SendStatus::InProgress) => {
                drv.tick();
                drv.wait_tick();
            }
            other => return other,
        }
    }
    panic!("send did not finish");
}

/// Poll a programming operation to its end, returning the result and the last progress
fn run(
    drv: &mut TestDriver,
    mut step: impl FnMut(&mut TestDriver) -> Result<PgmStatus>,
) -> (Result<PgmStatus>, u8) {
    let mut last = 0;
    for _ in 0..MAX_TICKS {
        drv.tick();
        match step(drv) {
            Ok(PgmStatus::InProgress(p)) => {
                last = p;
                drv.wait_tick();
            }
            other => return (other, last),
        }
    }
    panic!("programming did not finish");
}

fn hex_line(address: u16, record_type: u8, data: &[u8]) -> String {
    let mut line = format!(":{:02X}{:04X}{:02X}", data.len(), address, record_type);
    let mut sum = (data.len() as u8)
        .wrapping_add((address >> 8) as u8)
        .wrapping_add(address as u8)
        .wrapping_add(record_type);
    for &b in data {
        sum = sum.wrapping_add(b);
        write!(line, "{:02X}", b).unwrap();
    }
    write!(line, "{:02X}\r\n", sum.wrapping_neg()).unwrap();
    line
}

fn ramp(len: usize, start: u8) -> Vec<u8> {
    (0..len).map(|i| start.wrapping_add(i as u8)).collect()
}

#[test]
fn test_identification() {
    let (drv, _) = start(DummyModule::new_default());
    let id = drv.identity();
    assert!(id.is_known());
    assert_eq!(id.module_id, 0x8100_1234);
    assert_eq!(id.module_type, ModuleType::Tr72d);
    assert_eq!(id.mcu_type, McuType::Pic16lf1938);
    assert_eq!((id.os_major(), id.os_minor()), (4, 3));
    assert_eq!(id.os_build, 0x08B8);
    assert!(!id.fcc);
    assert_eq!(id.ibk, Some(drv.port().config().ibk));
    assert!(drv.is_fast_mode());
    assert_eq!(drv.port().mode(), Mode::Communication);
    assert_eq!(drv.port().packets_with(opcodes::SPI_MODULE_INFO).count(), 1);
}

#[test]
fn test_identification_old_os() {
    let config = DummyConfig {
        // OS 3.08, TR-52D with PIC16F886, FCC
        identity: [0x01, 0x02, 0x03, 0x04, 0x38, 0x0B, 0x10, 0x00],
        ..DummyConfig::default()
    };
    let (drv, _) = start(DummyModule::new(config));
    let id = drv.identity();
    assert_eq!(id.module_type, ModuleType::Tr52d);
    assert_eq!(id.mcu_type, McuType::Pic16f886);
    assert!(id.fcc);
    assert_eq!(id.ibk, None);
    assert!(!drv.is_fast_mode());
}

#[test]
fn test_identification_without_module() {
    let mut module = DummyModule::new_default();
    module.set_dead(true);
    let (drv, _) = start(module);
    assert!(!drv.identity().is_known());
    assert!(!drv.is_fast_mode());
    assert_eq!(drv.transport_status(), TransportStatus::NoModule);
}

#[test]
fn test_send_and_receive_echo() {
    let (mut drv, received) = start(DummyModule::new_default());
    communication_ready(&mut drv);
    assert_eq!(send(&mut drv, &[1, 2, 3]), Ok(SendStatus::Sent));
    tick_until(&mut drv, |_| !received.borrow().is_empty());
    assert_eq!(received.borrow()[0], vec![1, 2, 3]);

    drv.port_mut().push_to_host(&[0x5A; 64]);
    tick_until(&mut drv, |_| received.borrow().len() == 2);
    assert_eq!(received.borrow()[1], vec![0x5A; 64]);
}

#[test]
fn test_send_retries_within_budget() {
    let (mut drv, _) = start(DummyModule::new_default());
    communication_ready(&mut drv);
    drv.port_mut().clear_packets();
    drv.port_mut().reject_frames(2);
    assert_eq!(send(&mut drv, &[0xAB]), Ok(SendStatus::Sent));
    assert_eq!(drv.port().packets_with(opcodes::SPI_WR_RD).count(), 1);
}

#[test]
fn test_send_fails_when_budget_exhausted() {
    let (mut drv, received) = start(DummyModule::new_default());
    communication_ready(&mut drv);
    drv.port_mut().clear_packets();
    drv.port_mut().reject_frames(3);
    assert_eq!(send(&mut drv, &[0xAB]), Err(Error::WriteFailed));
    assert!(drv.port().packets().is_empty());
    assert!(received.borrow().is_empty());
}

#[test]
fn test_send_requires_communication_mode() {
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().set_dead(true);
    tick_until(&mut drv, |d| d.transport_status() == TransportStatus::NoModule);
    assert_eq!(drv.send(&[1]), Err(Error::NotReady));
}

#[test]
fn test_busy_mailbox_keeps_first_request() {
    let (mut drv, _) = start(DummyModule::new_default());
    communication_ready(&mut drv);
    drv.port_mut().clear_packets();
    drv.submit_packet(opcodes::SPI_WR_RD, &[1]).unwrap();
    assert_eq!(drv.submit_packet(opcodes::SPI_WR_RD, &[2]), Err(Error::NotReady));
    tick_until(&mut drv, |d| {
        d.queue_status() == QueueStatus::Free && d.link_status() == LinkStatus::Ready
    });
    let sent: Vec<_> = drv.port().packets().iter().map(|p| p.data.clone()).collect();
    assert_eq!(sent, vec![vec![1]]);
}

#[test]
fn test_hex_check_and_write() {
    let data = ramp(16, 0x10);
    let file = hex_line(0x7400, 0, &data) + &hex_line(0, 1, &[]);
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().clear_packets();

    let mut pgm = Programmer::new(FileKind::Hex, file.len() as u32);
    let mut src = SliceSource::new(file.as_bytes());
    assert_eq!(run(&mut drv, |_| pgm.check_file(&mut src)), (Ok(PgmStatus::Success), 100));

    let mut src = SliceSource::new(file.as_bytes());
    let (result, last) = run(&mut drv, |d| pgm.write_file(d, &mut src));
    assert_eq!(result, Ok(PgmStatus::Success));
    assert_eq!(last, 100);

    let flash: Vec<_> = drv.port().packets_with(opcodes::SPI_FLASH_PGM).collect();
    assert_eq!(flash.len(), 2);
    assert_eq!(&flash[0].data[..2], &[0x00, 0x3A]);
    assert_eq!(&flash[0].data[2..18], &data[..]);
    assert_eq!(&flash[0].data[18..20], &[0xFF, 0x3F]);
    assert_eq!(&flash[1].data[..2], &[0x10, 0x3A]);
    assert!(flash[1].data[2..].chunks(2).all(|w| w == [0xFF, 0x3F]));
    assert_eq!(drv.port().mode(), Mode::Communication);
}

#[test]
fn test_hex_pages_written_in_order() {
    let file = [
        hex_line(0, 4, &[0x00, 0x00]),
        hex_line(0x7400, 0, &ramp(16, 0)),
        hex_line(0x7480, 0, &ramp(16, 0x40)),
        hex_line(0, 4, &[0x00, 0x01]),
        hex_line(0xE000, 0, &[0x11, 0x00, 0x22, 0x00]),
        hex_line(0, 1, &[]),
    ]
    .concat();
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().clear_packets();

    let mut pgm = Programmer::new(FileKind::Hex, file.len() as u32);
    let mut src = SliceSource::new(file.as_bytes());
    assert_eq!(run(&mut drv, |d| pgm.write_file(d, &mut src)).0, Ok(PgmStatus::Success));

    let cmds: Vec<_> = drv
        .port()
        .packets()
        .iter()
        .filter(|p| p.cmd != opcodes::SPI_MODULE_INFO)
        .map(|p| (p.cmd, p.data[0], p.data[1]))
        .collect();
    assert_eq!(
        cmds,
        vec![
            (opcodes::SPI_FLASH_PGM, 0x00, 0x3A),
            (opcodes::SPI_FLASH_PGM, 0x10, 0x3A),
            (opcodes::SPI_FLASH_PGM, 0x40, 0x3A),
            (opcodes::SPI_FLASH_PGM, 0x50, 0x3A),
            (opcodes::SPI_EEPROM_PGM, 0x00, 2),
        ]
    );
    let eeprom = drv.port().packets_with(opcodes::SPI_EEPROM_PGM).next().unwrap();
    assert_eq!(eeprom.data, vec![0x00, 2, 0x11, 0x22]);
}

#[test]
fn test_hex_format_error_leaves_programming_mode() {
    let mut file = hex_line(0x7400, 0, &ramp(16, 0));
    file.replace_range(9..10, "X");
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().clear_packets();

    let mut pgm = Programmer::new(FileKind::Hex, file.len() as u32);
    let mut src = SliceSource::new(file.as_bytes());
    assert_eq!(run(&mut drv, |d| pgm.write_file(d, &mut src)).0, Err(Error::FileFormatError));
    assert!(drv.port().packets().is_empty());
    assert_eq!(drv.port().mode(), Mode::Communication);
}

#[test]
fn test_config_write() {
    let file = ramp(33, 0x80);
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().clear_packets();

    let mut pgm = Programmer::new(FileKind::Config, file.len() as u32);
    let mut src = SliceSource::new(&file);
    assert_eq!(run(&mut drv, |_| pgm.check_file(&mut src)), (Ok(PgmStatus::Success), 100));

    let mut src = SliceSource::new(&file);
    assert_eq!(run(&mut drv, |d| pgm.write_file(d, &mut src)).0, Ok(PgmStatus::Success));

    let packets = drv.port().packets();
    assert_eq!(packets.len(), 3);
    assert_eq!(packets[0].cmd, opcodes::SPI_FLASH_PGM);
    assert_eq!(&packets[0].data[..4], &[0xC0, 0x37, 0x80, 0x34]);
    assert_eq!(packets[1].cmd, opcodes::SPI_FLASH_PGM);
    assert_eq!(&packets[1].data[..4], &[0xD0, 0x37, 0x90, 0x34]);
    assert_eq!(packets[2].cmd, opcodes::SPI_EEPROM_PGM);
    assert_eq!(packets[2].data, vec![0xC1, 1, 0xA0]);
}

#[test]
fn test_plugin_write() {
    let file = "# plugin\n000102030405060708090A0B0C0D0E0F10111213\n\
                FFEEDDCCBBAA99887766554433221100F0E0D0C0\n";
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().clear_packets();

    let mut pgm = Programmer::new(FileKind::Plugin, file.len() as u32);
    let mut src = SliceSource::new(file.as_bytes());
    let (result, last) = run(&mut drv, |d| pgm.write_file(d, &mut src));
    assert_eq!(result, Ok(PgmStatus::Success));
    assert_eq!(last, 100);

    let lines: Vec<_> = drv.port().packets_with(opcodes::SPI_PLUGIN_PGM).collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].data, ramp(20, 0));
    assert_eq!(lines[1].data[..4], [0xFF, 0xEE, 0xDD, 0xCC]);
}

#[test]
fn test_user_key_write() {
    let key: [u8; 16] = core::array::from_fn(|i| 0x30 + i as u8);
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().clear_packets();

    let mut writer = SecretWriter::new();
    let result = run(&mut drv, |d| writer.write_key_or_password(d, SecretKind::UserKey, &key)).0;
    assert_eq!(result, Ok(PgmStatus::Success));

    let packets = drv.port().packets();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].cmd, opcodes::SPI_EEPROM_PGM);
    assert_eq!(packets[0].data[..2], [0xD1, 0x10]);
    assert_eq!(packets[0].data[2..], key);
    assert_eq!(drv.port().mode(), Mode::Communication);
}

#[test]
fn test_stalled_module_is_reset() {
    let file = hex_line(0x7400, 0, &ramp(16, 0))
        + &hex_line(0x7480, 0, &ramp(16, 0))
        + &hex_line(0, 1, &[]);
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().clear_packets();
    drv.port_mut().stall_after(1);

    let mut pgm = Programmer::new(FileKind::Hex, file.len() as u32);
    let mut src = SliceSource::new(file.as_bytes());
    let before = drv.now_ms();
    assert_eq!(run(&mut drv, |d| pgm.write_file(d, &mut src)).0, Err(Error::HardwareTimeout));
    assert!(drv.now_ms().wrapping_sub(before) >= 1000);
    assert_eq!(drv.port().packets_with(opcodes::SPI_FLASH_PGM).count(), 1);
    assert_eq!(drv.port().mode(), Mode::Communication);
}

#[test]
fn test_write_without_module_times_out() {
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().set_dead(true);

    let file = hex_line(0, 1, &[]);
    let mut pgm = Programmer::new(FileKind::Hex, file.len() as u32);
    let mut src = SliceSource::new(file.as_bytes());
    assert_eq!(run(&mut drv, |d| pgm.write_file(d, &mut src)).0, Err(Error::HardwareTimeout));
}

#[test]
fn test_password_without_module_times_out() {
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().set_dead(true);

    let mut writer = SecretWriter::new();
    let result = run(&mut drv, |d| writer.write_key_or_password(d, SecretKind::Password, &[0; 16])).0;
    assert_eq!(result, Err(Error::HardwareTimeout));
}

#[test]
fn test_rejected_flash_packet_fails_write() {
    let file = hex_line(0x7400, 0, &ramp(16, 0)) + &hex_line(0, 1, &[]);
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().clear_packets();
    drv.port_mut().reject_frames(3);

    let mut pgm = Programmer::new(FileKind::Hex, file.len() as u32);
    let mut src = SliceSource::new(file.as_bytes());
    assert_eq!(run(&mut drv, |d| pgm.write_file(d, &mut src)).0, Err(Error::WriteFailed));
    assert_eq!(drv.port().packets_with(opcodes::SPI_FLASH_PGM).count(), 0);
    assert_eq!(drv.port().mode(), Mode::Communication);

    // The next attempt starts over from the beginning of the file
    let mut src = SliceSource::new(file.as_bytes());
    assert_eq!(run(&mut drv, |d| pgm.write_file(d, &mut src)).0, Ok(PgmStatus::Success));
    assert_eq!(drv.port().packets_with(opcodes::SPI_FLASH_PGM).count(), 2);
}

#[test]
fn test_flash_packet_retried_within_budget() {
    let file = hex_line(0x7400, 0, &ramp(16, 0)) + &hex_line(0, 1, &[]);
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().clear_packets();
    drv.port_mut().reject_frames(2);

    let mut pgm = Programmer::new(FileKind::Hex, file.len() as u32);
    let mut src = SliceSource::new(file.as_bytes());
    assert_eq!(run(&mut drv, |d| pgm.write_file(d, &mut src)).0, Ok(PgmStatus::Success));
    assert_eq!(drv.port().packets_with(opcodes::SPI_FLASH_PGM).count(), 2);
}

#[test]
fn test_rejected_user_key_fails_write() {
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().clear_packets();
    drv.port_mut().reject_frames(3);

    let mut writer = SecretWriter::new();
    let result = run(&mut drv, |d| writer.write_key_or_password(d, SecretKind::UserKey, &[7; 16])).0;
    assert_eq!(result, Err(Error::WriteFailed));
    assert!(drv.port().packets().is_empty());
    assert_eq!(drv.port().mode(), Mode::Communication);
}

/// Milliseconds before the port clock wraps
const NEAR_WRAP_MS: u32 = u32::MAX - 300;

#[test]
fn test_identification_across_clock_wrap() {
    let mut module = DummyModule::new_default();
    module.set_clock_ms(u32::MAX - 700);
    let (drv, _) = start(module);
    assert!(drv.now_ms() < u32::MAX - 700);
    assert!(drv.identity().is_known());
    assert_eq!(drv.identity().ibk, Some(drv.port().config().ibk));
}

#[test]
fn test_write_across_clock_wrap() {
    let file = hex_line(0x7400, 0, &ramp(16, 0)) + &hex_line(0, 1, &[]);
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().clear_packets();
    drv.port_mut().set_clock_ms(NEAR_WRAP_MS);

    let mut pgm = Programmer::new(FileKind::Hex, file.len() as u32);
    let mut src = SliceSource::new(file.as_bytes());
    assert_eq!(run(&mut drv, |d| pgm.write_file(d, &mut src)).0, Ok(PgmStatus::Success));
    assert!(drv.now_ms() < NEAR_WRAP_MS);
    assert_eq!(drv.port().packets_with(opcodes::SPI_FLASH_PGM).count(), 2);
}

#[test]
fn test_stall_detected_across_clock_wrap() {
    let file = hex_line(0x7400, 0, &ramp(16, 0))
        + &hex_line(0x7480, 0, &ramp(16, 0))
        + &hex_line(0, 1, &[]);
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().stall_after(1);
    drv.port_mut().set_clock_ms(NEAR_WRAP_MS);

    let mut pgm = Programmer::new(FileKind::Hex, file.len() as u32);
    let mut src = SliceSource::new(file.as_bytes());
    assert_eq!(run(&mut drv, |d| pgm.write_file(d, &mut src)).0, Err(Error::HardwareTimeout));
    assert!(drv.now_ms() < NEAR_WRAP_MS);
    assert!(drv.now_ms().wrapping_sub(NEAR_WRAP_MS) >= 1000);
}

#[test]
fn test_mode_entry_timeout_across_clock_wrap() {
    let (mut drv, _) = start(DummyModule::new_default());
    drv.port_mut().set_dead(true);
    drv.port_mut().set_clock_ms(NEAR_WRAP_MS);

    let file = hex_line(0, 1, &[]);
    let mut pgm = Programmer::new(FileKind::Hex, file.len() as u32);
    let mut src = SliceSource::new(file.as_bytes());
    assert_eq!(run(&mut drv, |d| pgm.write_file(d, &mut src)).0, Err(Error::HardwareTimeout));
    assert!(drv.now_ms() < NEAR_WRAP_MS);
    assert!(drv.now_ms().wrapping_sub(NEAR_WRAP_MS) >= 1000);
}
