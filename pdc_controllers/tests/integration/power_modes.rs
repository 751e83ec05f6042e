//! Low-power behavior across the device family.
//!
//! Every controller powers its device down within a tick of the flag
//! being raised and parks there, but the wake paths differ: link and
//! display replay through a one-tick exit state, the sensor toggles a
//! sleep bit, the receiver holds in a bounded wake-wait, and the
//! volume simply rests in standby without touching the card.

use pdc_common::bus::ioctl;
use pdc_common::config::{
    DisplayConfig, LinkConfig, ReceiverConfig, SensorConfig, VolumeConfig,
};
use pdc_common::fault::ReceiverFault;
use pdc_common::state::{
    DisplayState, LinkState, ReceiverState, SensorState, VolumeState,
};
use pdc_controllers::controller::Controller;
use pdc_controllers::{
    DisplayController, LinkController, ReceiverController, SensorController, VolumeController,
};
use pdc_hal::sim::{SimBus, SimFilesystem};

fn sensor_bus(readings: usize) -> SimBus {
    let mut bus = SimBus::new();
    bus.set_self_test_pass(true);
    for _ in 0..readings {
        bus.push_rx(&[0u8; 6]);
    }
    bus
}

#[test]
fn whole_family_sleeps_and_wakes_clean() {
    let mut volume = VolumeController::new(SimFilesystem::new(), VolumeConfig::default());
    volume.tick();
    assert_eq!(volume.state(), VolumeState::AccessCheck);

    let mut link = LinkController::new(SimBus::new(), LinkConfig::default());
    link.tick();
    link.bus_handle_mut().set_carrier(true);
    link.tick();
    link.tick();
    assert_eq!(link.state(), LinkState::Connected);

    let mut display = DisplayController::new(SimBus::new(), DisplayConfig::default());
    display.tick();
    assert_eq!(display.state(), DisplayState::Idle);

    let mut sensor = SensorController::new(sensor_bus(1), SensorConfig::default());
    sensor.tick();
    assert_eq!(sensor.state(), SensorState::Sampling);

    let mut receiver = ReceiverController::new(SimBus::new(), ReceiverConfig::default());
    receiver.tick();
    assert_eq!(receiver.state(), ReceiverState::ReadContinuous);

    // Sleep: one tick to power down, one tick to park.
    volume.set_low_power();
    link.set_low_power();
    display.set_low_power();
    sensor.set_low_power();
    receiver.set_low_power();
    for _ in 0..2 {
        volume.tick();
        link.tick();
        display.tick();
        sensor.tick();
        receiver.tick();
    }
    assert_eq!(volume.state(), VolumeState::Standby);
    assert_eq!(link.state(), LinkState::LowPower);
    assert_eq!(display.state(), DisplayState::LowPower);
    assert_eq!(sensor.state(), SensorState::LowPower);
    assert_eq!(receiver.state(), ReceiverState::LowPower);
    assert!(link.bus_handle().is_powered_down());
    assert!(display.bus_handle().is_powered_down());
    assert!(receiver.bus_handle().is_powered_down());
    assert_eq!(sensor.bus_handle().ioctl_written(ioctl::SLEEP_BIT), Some(1));

    // Wake: every machine is back in a resting state within three
    // ticks, with no fault latched along either edge.
    volume.clear_low_power();
    link.clear_low_power();
    display.clear_low_power();
    sensor.clear_low_power();
    receiver.clear_low_power();
    for _ in 0..3 {
        volume.tick();
        link.tick();
        display.tick();
        sensor.tick();
        receiver.tick();
    }
    assert_eq!(volume.state(), VolumeState::AccessCheck);
    assert_eq!(link.state(), LinkState::Connected);
    assert_eq!(display.state(), DisplayState::Idle);
    assert_eq!(sensor.state(), SensorState::Sampling);
    assert_eq!(receiver.state(), ReceiverState::ReadContinuous);
    assert!(volume.fault().is_empty());
    assert!(link.fault().is_empty());
    assert!(display.fault().is_empty());
    assert!(sensor.fault().is_empty());
    assert!(receiver.fault().is_empty());
}

#[test]
fn sensor_holds_sampling_while_asleep() {
    let config = SensorConfig {
        sample_period_ticks: 1,
    };
    let mut sensor = SensorController::new(sensor_bus(4), config);
    sensor.tick(); // init + calibration
    sensor.tick(); // first sample
    assert!(sensor.last_sample().is_some());
    let reads_before = sensor.bus_handle().reads;

    sensor.set_low_power();
    for _ in 0..4 {
        sensor.tick();
    }
    assert_eq!(sensor.state(), SensorState::LowPower);
    // No bus traffic while asleep.
    assert_eq!(sensor.bus_handle().reads, reads_before);

    sensor.clear_low_power();
    sensor.tick(); // exit clears the sleep bit
    assert_eq!(sensor.bus_handle().ioctl_written(ioctl::SLEEP_BIT), Some(0));
    sensor.tick(); // sampling resumes
    assert_eq!(sensor.bus_handle().reads, reads_before + 1);
    assert!(sensor.fault().is_empty());
}

#[test]
fn display_request_raised_during_sleep_fires_after_wake() {
    let mut display = DisplayController::new(SimBus::new(), DisplayConfig::default());
    display.tick();
    display.set_line(0, "status ok").unwrap();
    display.set_write();
    display.tick();
    display.bus_handle_mut().take_tx();

    display.set_low_power();
    display.tick();
    display.tick();
    assert_eq!(display.state(), DisplayState::LowPower);

    // A write staged while asleep must wait for the wake edge.
    display.set_line(1, "queued").unwrap();
    display.set_write();
    display.tick();
    assert_eq!(display.state(), DisplayState::LowPower);
    assert!(display.bus_handle_mut().take_tx().is_empty());

    display.clear_low_power();
    display.tick(); // exit re-dirties the surviving line too
    display.tick(); // write flushes both
    assert_eq!(display.state(), DisplayState::Idle);
    let tx = display.bus_handle_mut().take_tx();
    let mut expected = vec![0u8];
    expected.extend_from_slice(b"status ok");
    expected.push(1);
    expected.extend_from_slice(b"queued");
    assert_eq!(tx, expected);
}

#[test]
fn receiver_slow_wake_recovers_within_timeout() {
    let config = ReceiverConfig {
        wake_timeout_ticks: 5,
        continuous: true,
    };
    let mut receiver = ReceiverController::new(SimBus::new(), config);
    receiver.tick();
    receiver.set_low_power();
    receiver.tick();
    receiver.tick();

    receiver.bus_handle_mut().script_wake_delay(3);
    receiver.clear_low_power();
    for _ in 0..3 {
        receiver.tick();
        assert_eq!(receiver.state(), ReceiverState::WakeWait);
    }
    receiver.tick();
    assert_eq!(receiver.state(), ReceiverState::ReadContinuous);
    assert!(receiver.fault().is_empty());
}

#[test]
fn receiver_wake_timeout_resets_back_to_continuous_reads() {
    let config = ReceiverConfig {
        wake_timeout_ticks: 2,
        continuous: true,
    };
    let mut receiver = ReceiverController::new(SimBus::new(), config);
    receiver.tick();
    receiver.set_low_power();
    receiver.tick();
    receiver.tick();

    // The device never answers within the bound.
    receiver.bus_handle_mut().script_wake_delay(20);
    receiver.clear_low_power();
    receiver.tick();
    receiver.tick();
    assert!(receiver.fault().contains(ReceiverFault::WAKE_TIMEOUT));
    receiver.tick();
    assert_eq!(receiver.state(), ReceiverState::Fault);

    receiver.set_reset();
    receiver.tick();
    receiver.tick();
    assert_eq!(receiver.state(), ReceiverState::ReadContinuous);
    assert!(receiver.fault().is_empty());

    // Data flows again after recovery.
    receiver.bus_handle_mut().push_rx(b"$GPGGA,fix");
    receiver.tick();
    assert_eq!(&receiver.take_data().unwrap()[..], b"$GPGGA,fix");
}
