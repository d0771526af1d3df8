use avalanche_devices::watchdog::{
    Watchdog, WDT_CHANGE, WDT_CHANGE_LOCK, WDT_DISABLE, WDT_DISABLE_LOCK, WDT_KICK, WDT_KICK_LOCK,
    WDT_PRESCALE, WDT_PRESCALE_LOCK,
};
use avalanche_io_snapshot::io::state::IoSnapshot;

fn state(wdt: &Watchdog, lock: usize) -> u32 {
    wdt.lock_state(lock)
}

#[test]
fn kick_two_stage_unlock_reaches_terminal_state() {
    let mut wdt = Watchdog::new();
    assert_eq!(state(&wdt, WDT_KICK_LOCK), 0);

    wdt.mmio_write(WDT_KICK_LOCK as u32, 0x5555);
    assert_eq!(state(&wdt, WDT_KICK_LOCK), 1);

    wdt.mmio_write(WDT_KICK_LOCK as u32, 0xaaaa);
    assert_eq!(state(&wdt, WDT_KICK_LOCK), 3);
    assert_eq!(wdt.mmio_read(WDT_KICK_LOCK as u32), 0xaaab);

    wdt.mmio_write(WDT_KICK as u32, 1);
    assert_eq!(wdt.mmio_read(WDT_KICK as u32), 1);
}

#[test]
fn skipping_the_first_stage_does_not_unlock() {
    let mut wdt = Watchdog::new();
    wdt.mmio_write(WDT_KICK_LOCK as u32, 0xaaaa);
    assert_eq!(state(&wdt, WDT_KICK_LOCK), 0, "second stage requires the first");
}

#[test]
fn first_stage_rearms_from_any_state() {
    let mut wdt = Watchdog::new();
    wdt.mmio_write(WDT_KICK_LOCK as u32, 0x5555);
    wdt.mmio_write(WDT_KICK_LOCK as u32, 0xaaaa);
    assert_eq!(state(&wdt, WDT_KICK_LOCK), 3);

    // Drivers run the full sequence for every kick; re-arming must work.
    wdt.mmio_write(WDT_KICK_LOCK as u32, 0x5555);
    assert_eq!(state(&wdt, WDT_KICK_LOCK), 1);
    wdt.mmio_write(WDT_KICK_LOCK as u32, 0xaaaa);
    assert_eq!(state(&wdt, WDT_KICK_LOCK), 3);
}

#[test]
fn wrong_magic_does_not_advance_the_lock() {
    let mut wdt = Watchdog::new();
    wdt.mmio_write(WDT_KICK_LOCK as u32, 0x5555);
    wdt.mmio_write(WDT_KICK_LOCK as u32, 0xbbbb); // change-lock magic, wrong lock
    assert_eq!(state(&wdt, WDT_KICK_LOCK), 1);
}

#[test]
fn each_lock_uses_its_own_constants() {
    let mut wdt = Watchdog::new();

    wdt.mmio_write(WDT_CHANGE_LOCK as u32, 0x6666);
    wdt.mmio_write(WDT_CHANGE_LOCK as u32, 0xbbbb);
    assert_eq!(state(&wdt, WDT_CHANGE_LOCK), 3);
    wdt.mmio_write(WDT_CHANGE as u32, 0xffff);
    assert_eq!(wdt.mmio_read(WDT_CHANGE as u32), 0xffff);

    wdt.mmio_write(WDT_PRESCALE_LOCK as u32, 0x5a5a);
    wdt.mmio_write(WDT_PRESCALE_LOCK as u32, 0xa5a5);
    assert_eq!(state(&wdt, WDT_PRESCALE_LOCK), 3);
    wdt.mmio_write(WDT_PRESCALE as u32, 0x100);
    assert_eq!(wdt.mmio_read(WDT_PRESCALE as u32), 0x100);
}

#[test]
fn disable_needs_all_three_stages() {
    let mut wdt = Watchdog::new();

    wdt.mmio_write(WDT_DISABLE_LOCK as u32, 0x7777);
    assert_eq!(state(&wdt, WDT_DISABLE_LOCK), 1);
    wdt.mmio_write(WDT_DISABLE_LOCK as u32, 0xcccc);
    assert_eq!(state(&wdt, WDT_DISABLE_LOCK), 2);

    // Jumping straight to the last stage from state 1 must not work.
    wdt.mmio_write(WDT_DISABLE_LOCK as u32, 0x7777);
    wdt.mmio_write(WDT_DISABLE_LOCK as u32, 0xdddd);
    assert_eq!(state(&wdt, WDT_DISABLE_LOCK), 1);

    wdt.mmio_write(WDT_DISABLE_LOCK as u32, 0xcccc);
    wdt.mmio_write(WDT_DISABLE_LOCK as u32, 0xdddd);
    assert_eq!(state(&wdt, WDT_DISABLE_LOCK), 3);
    wdt.mmio_write(WDT_DISABLE as u32, 0);
    assert_eq!(wdt.mmio_read(WDT_DISABLE as u32), 0);
}

#[test]
fn value_write_while_locked_still_lands() {
    // The model accepts the write (no timer is armed either way); the
    // violation only shows up in diagnostics.
    let mut wdt = Watchdog::new();
    wdt.mmio_write(WDT_KICK as u32, 42);
    assert_eq!(wdt.mmio_read(WDT_KICK as u32), 42);
}

#[test]
fn snapshot_preserves_lock_progress() {
    let mut wdt = Watchdog::new();
    wdt.mmio_write(WDT_DISABLE_LOCK as u32, 0x7777);
    wdt.mmio_write(WDT_DISABLE_LOCK as u32, 0xcccc);

    let blob = wdt.save_state();
    let mut restored = Watchdog::new();
    restored.load_state(&blob).unwrap();

    assert_eq!(state(&restored, WDT_DISABLE_LOCK), 2);
    restored.mmio_write(WDT_DISABLE_LOCK as u32, 0xdddd);
    assert_eq!(state(&restored, WDT_DISABLE_LOCK), 3);
}
