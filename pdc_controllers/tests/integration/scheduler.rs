//! Cross-family guarantees under one polling scheduler.
//!
//! Drives a heterogeneous controller set through `Box<dyn Controller>`
//! the way the demo runner does, and checks the contracts every device
//! shares: reset lands in a post-init resting state within two ticks,
//! fault states absorb everything but reset, and the machines always
//! park in a resting state when no request is pending.

use pdc_common::config::{
    DisplayConfig, LinkConfig, ReceiverConfig, SensorConfig, VolumeConfig,
};
use pdc_controllers::controller::Controller;
use pdc_controllers::{
    DisplayController, LinkController, ReceiverController, SensorController, VolumeController,
};
use pdc_hal::sim::{SimBus, SimFilesystem};

fn healthy_bus() -> SimBus {
    let mut bus = SimBus::new();
    bus.set_carrier(true);
    bus.set_self_test_pass(true);
    // Enough full sensor readings for init, sampling, and a re-init.
    bus.push_rx(&[0u8; 6 * 4]);
    bus
}

fn family() -> Vec<Box<dyn Controller>> {
    vec![
        Box::new(VolumeController::new(
            SimFilesystem::new(),
            VolumeConfig::default(),
        )),
        Box::new(LinkController::new(healthy_bus(), LinkConfig::default())),
        Box::new(DisplayController::new(
            healthy_bus(),
            DisplayConfig::default(),
        )),
        Box::new(SensorController::new(healthy_bus(), SensorConfig::default())),
        Box::new(ReceiverController::new(
            healthy_bus(),
            ReceiverConfig::default(),
        )),
    ]
}

#[test]
fn every_controller_reaches_a_resting_state_and_stays_healthy() {
    let mut controllers = family();
    for _ in 0..20 {
        for controller in controllers.iter_mut() {
            controller.tick();
        }
    }
    for controller in &controllers {
        assert!(
            !controller.faulted(),
            "{} faulted: {:#x}",
            controller.name(),
            controller.fault_bits()
        );
        assert_ne!(controller.state_label(), "init", "{}", controller.name());
        assert_ne!(controller.state_label(), "reset", "{}", controller.name());
    }
}

#[test]
fn reset_plus_two_ticks_recovers_every_controller() {
    let mut controllers = family();
    // Let everything settle, then reset from a steady state.
    for _ in 0..10 {
        for controller in controllers.iter_mut() {
            controller.tick();
        }
    }
    for controller in controllers.iter_mut() {
        controller.request_reset();
        controller.tick();
        assert_eq!(controller.state_label(), "reset", "{}", controller.name());
        controller.tick();
        assert!(
            !controller.faulted(),
            "{} still faulted after reset",
            controller.name()
        );
        assert_ne!(controller.state_label(), "reset", "{}", controller.name());
        assert_ne!(controller.state_label(), "init", "{}", controller.name());
    }
}

#[test]
fn flags_set_between_ticks_are_observed_on_the_next_tick() {
    let mut volume = VolumeController::new(SimFilesystem::new(), VolumeConfig::default());
    volume.tick();
    // The setter alone changes no state.
    volume.set_low_power();
    assert_eq!(volume.state_label(), "access-check");
    volume.tick();
    assert_eq!(volume.state_label(), "standby");
}
