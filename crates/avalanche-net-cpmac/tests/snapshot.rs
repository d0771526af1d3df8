#![cfg(feature = "io-snapshot")]

mod common;

use avalanche_io_snapshot::io::state::codec::Encoder;
use avalanche_io_snapshot::io::state::{IoSnapshot, SnapshotError, SnapshotVersion, SnapshotWriter};
use avalanche_net_cpmac::{CpmacDevice, MAC_IN_VECTOR, RX0_HDP, TXGOODFRAMES, TX0_HDP};
use common::{build_test_frame, write_desc, RecordingIrq, TestDma};

const WHOLE_FRAME: u32 = (1 << 31) | (1 << 30) | (1 << 29);

const TAG_REGS: u16 = 1;
const TAG_MAC_ADDR: u16 = 2;
const TAG_TX_PENDING: u16 = 3;
const TAG_IRQ_LEVEL: u16 = 4;

#[test]
fn snapshot_roundtrip_preserves_key_state() {
    let (irq, _irq_log) = RecordingIrq::new();
    let mut dev = CpmacDevice::new(0, irq);
    let mut dma = TestDma::new(0x40_000);
    dev.set_mac_addr([0x52, 0x54, 0x00, 0x12, 0x34, 0x56]);

    // Transmit one frame and leave it unpopped, leave an armed RX ring, and
    // leave the interrupt pending.
    let payload: Vec<u8> = (0..100u8).collect();
    dma.write(0x2_0000, &payload);
    write_desc(&mut dma, 0x1_0000, 0, 0x2_0000, 100, WHOLE_FRAME | 100);
    dev.mmio_write(&mut dma, TX0_HDP, 0x1_0000);

    write_desc(&mut dma, 0x1_0040, 0, 0x3_0000, 0, 1 << 29);
    dev.mmio_write(&mut dma, RX0_HDP, 0x1_0040);

    let blob = dev.save_state();

    let (irq2, irq2_log) = RecordingIrq::new();
    let mut restored = CpmacDevice::new(0, irq2);
    restored.load_state(&blob).expect("load_state");

    assert_eq!(restored.mac_addr(), [0x52, 0x54, 0x00, 0x12, 0x34, 0x56]);
    assert_eq!(restored.mmio_read(TXGOODFRAMES), 1);
    assert!(restored.irq_level(), "pending interrupt survives restore");
    assert_eq!(irq2_log.borrow().as_slice(), &[true], "line re-driven on load");
    assert_eq!(restored.pop_tx_frame().as_deref(), Some(payload.as_slice()));
    assert!(restored.pop_tx_frame().is_none());
    assert!(restored.can_receive(), "rx head pointer survives");

    // The restored device keeps receiving into the preserved ring.
    let frame = build_test_frame(&[0x44; 60]);
    restored.receive_frame(&mut dma, &frame);
    assert_eq!(dma.read_vec(0x3_0000, frame.len()), frame);

    assert_ne!(restored.mmio_read(MAC_IN_VECTOR), 0);
}

#[test]
fn snapshot_encoding_is_deterministic() {
    let (irq, _irq_log) = RecordingIrq::new();
    let mut dev = CpmacDevice::new(1, irq);
    let mut dma = TestDma::new(0x100);
    dev.mmio_write(&mut dma, 0x100, 0xdead_beef);

    let blob = dev.save_state();
    let (irq2, _log2) = RecordingIrq::new();
    let mut restored = CpmacDevice::new(1, irq2);
    restored.load_state(&blob).unwrap();
    assert_eq!(restored.save_state(), blob);
}

#[test]
fn snapshot_rejects_wrong_regs_size() {
    let mut w = SnapshotWriter::new(
        <CpmacDevice as IoSnapshot>::DEVICE_ID,
        <CpmacDevice as IoSnapshot>::DEVICE_VERSION,
    );
    w.field_bytes(TAG_REGS, vec![0u8; 0x400]);
    let bytes = w.finish();

    let (irq, _log) = RecordingIrq::new();
    let mut dev = CpmacDevice::new(0, irq);
    let err = dev.load_state(&bytes).unwrap_err();
    assert_eq!(err, SnapshotError::InvalidFieldEncoding("cpmac regs size"));
}

#[test]
fn snapshot_rejects_malformed_mac() {
    let mut w = SnapshotWriter::new(
        <CpmacDevice as IoSnapshot>::DEVICE_ID,
        <CpmacDevice as IoSnapshot>::DEVICE_VERSION,
    );
    w.field_bytes(TAG_MAC_ADDR, vec![0u8; 5]);
    let bytes = w.finish();

    let (irq, _log) = RecordingIrq::new();
    let mut dev = CpmacDevice::new(0, irq);
    let err = dev.load_state(&bytes).unwrap_err();
    assert_eq!(err, SnapshotError::InvalidFieldEncoding("cpmac mac"));
}

#[test]
fn snapshot_rejects_absurd_tx_pending_count() {
    let mut w = SnapshotWriter::new(
        <CpmacDevice as IoSnapshot>::DEVICE_ID,
        <CpmacDevice as IoSnapshot>::DEVICE_VERSION,
    );
    w.field_bytes(TAG_TX_PENDING, Encoder::new().u32(257).finish());
    let bytes = w.finish();

    let (irq, _log) = RecordingIrq::new();
    let mut dev = CpmacDevice::new(0, irq);
    let err = dev.load_state(&bytes).unwrap_err();
    assert_eq!(
        err,
        SnapshotError::InvalidFieldEncoding("cpmac tx_pending count")
    );
}

#[test]
fn snapshot_rejects_oversized_pending_frame() {
    let oversized = avalanche_net_cpmac::MAX_FRAME_LEN as u32 + 1;
    let mut w = SnapshotWriter::new(
        <CpmacDevice as IoSnapshot>::DEVICE_ID,
        <CpmacDevice as IoSnapshot>::DEVICE_VERSION,
    );
    w.field_bytes(TAG_TX_PENDING, Encoder::new().u32(1).u32(oversized).finish());
    let bytes = w.finish();

    let (irq, _log) = RecordingIrq::new();
    let mut dev = CpmacDevice::new(0, irq);
    let err = dev.load_state(&bytes).unwrap_err();
    assert_eq!(
        err,
        SnapshotError::InvalidFieldEncoding("cpmac tx_pending frame")
    );
}

#[test]
fn snapshot_load_is_atomic_on_error() {
    let (irq, _log) = RecordingIrq::new();
    let mut dev = CpmacDevice::new(0, irq);
    let mut dma = TestDma::new(0x100);
    dev.set_mac_addr([0xaa; 6]);
    dev.mmio_write(&mut dma, 0x100, 0x1234_5678);

    let before = dev.save_state();

    let mut w = SnapshotWriter::new(
        <CpmacDevice as IoSnapshot>::DEVICE_ID,
        <CpmacDevice as IoSnapshot>::DEVICE_VERSION,
    );
    w.field_bytes(TAG_MAC_ADDR, vec![0u8; 3]);
    let bytes = w.finish();

    assert!(dev.load_state(&bytes).is_err());
    assert_eq!(dev.save_state(), before, "failed load must not mutate");
}

#[test]
fn snapshot_rejects_unsupported_major_version() {
    let unsupported =
        SnapshotVersion::new(<CpmacDevice as IoSnapshot>::DEVICE_VERSION.major + 1, 0);
    let w = SnapshotWriter::new(<CpmacDevice as IoSnapshot>::DEVICE_ID, unsupported);
    let bytes = w.finish();

    let (irq, _log) = RecordingIrq::new();
    let mut dev = CpmacDevice::new(0, irq);
    let err = dev.load_state(&bytes).unwrap_err();
    assert_eq!(
        err,
        SnapshotError::UnsupportedDeviceMajorVersion {
            found: unsupported.major,
            supported: <CpmacDevice as IoSnapshot>::DEVICE_VERSION.major,
        }
    );
}

#[test]
fn snapshot_tolerates_irq_level_field() {
    let mut w = SnapshotWriter::new(
        <CpmacDevice as IoSnapshot>::DEVICE_ID,
        <CpmacDevice as IoSnapshot>::DEVICE_VERSION,
    );
    w.field_bool(TAG_IRQ_LEVEL, true);
    let bytes = w.finish();

    let (irq, log) = RecordingIrq::new();
    let mut dev = CpmacDevice::new(0, irq);
    dev.load_state(&bytes).unwrap();
    assert!(dev.irq_level());
    assert_eq!(log.borrow().as_slice(), &[true]);
}
