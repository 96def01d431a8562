//! Device binding: enumeration, validation and the fallback chain

mod helpers;

use helpers::*;
use micplay_ap::audio::DeviceBinding;
use micplay_ap::DeviceError;

const RATE: u32 = 44100;

#[test]
fn test_enumerate_skips_input_only_devices() {
    let host = MockHost::new(vec![
        MockDevice::input_only("Microphone"),
        MockDevice::output("Speakers"),
        MockDevice::output("CABLE Input"),
    ]);
    let binding = DeviceBinding::new(host.as_host(), None, RATE).unwrap();

    let indices: Vec<usize> = binding.enumerate().iter().map(|d| d.index).collect();
    assert_eq!(indices, vec![1, 2]);
}

#[test]
fn test_remembered_device_used_when_valid() {
    let host = MockHost::standard();
    let binding = DeviceBinding::new(host.as_host(), Some(1), RATE).unwrap();

    assert_eq!(binding.current(), 1);
    assert_eq!(binding.handle().name, "CABLE Input");
    assert_eq!(binding.handle().sample_rate, RATE);
}

#[test]
fn test_invalid_remembered_falls_back_to_system_default() {
    let host = MockHost::new(vec![
        MockDevice::output("Speakers"),
        MockDevice::output("Headphones"),
        MockDevice::output("CABLE Input"),
    ]);
    host.set_default_output(Some(1));
    host.reject(2);

    let binding = DeviceBinding::new(host.as_host(), Some(2), RATE).unwrap();
    assert_eq!(binding.current(), 1);
}

#[test]
fn test_remembered_rejected_at_rate_falls_back() {
    let host = MockHost::standard();
    host.reject_rate(1, 16000);

    let binding = DeviceBinding::new(host.as_host(), Some(1), 16000).unwrap();
    assert_eq!(binding.current(), 0);
}

#[test]
fn test_no_default_falls_back_to_first_enumerated() {
    let host = MockHost::new(vec![
        MockDevice::input_only("Microphone"),
        MockDevice::output("Speakers"),
    ]);
    host.set_default_output(None);

    let binding = DeviceBinding::new(host.as_host(), Some(7), RATE).unwrap();
    assert_eq!(binding.current(), 1);
}

#[test]
fn test_default_pointing_at_input_device_is_skipped() {
    let host = MockHost::new(vec![
        MockDevice::input_only("Microphone"),
        MockDevice::output("Speakers"),
    ]);
    host.set_default_output(Some(0));

    let binding = DeviceBinding::new(host.as_host(), None, RATE).unwrap();
    assert_eq!(binding.current(), 1);
}

#[test]
fn test_system_default_checked_against_rate() {
    let host = MockHost::standard();
    host.reject_rate(0, 16000);

    let binding = DeviceBinding::new(host.as_host(), None, 16000).unwrap();
    assert_eq!(binding.current(), 1);
    assert_eq!(binding.handle().sample_rate, 16000);
}

#[test]
fn test_first_enumerated_skips_unplayable_devices() {
    let host = MockHost::new(vec![
        MockDevice::output("Broken"),
        MockDevice::input_only("Microphone"),
        MockDevice::output("Headphones"),
    ]);
    host.set_default_output(None);
    host.reject(0);

    let binding = DeviceBinding::new(host.as_host(), None, RATE).unwrap();
    assert_eq!(binding.current(), 2);
}

#[test]
fn test_no_device_plays_rate_keeps_an_output() {
    let host = MockHost::standard();
    host.reject_rate(0, 16000);
    host.reject_rate(1, 16000);

    let binding = DeviceBinding::new(host.as_host(), Some(1), 16000).unwrap();
    assert_eq!(binding.current(), 0);
    assert!(!binding.validate(binding.current(), 16000));
}

#[test]
fn test_no_devices_is_fatal() {
    let host = MockHost::new(vec![]);
    let err = DeviceBinding::new(host.as_host(), None, RATE).err();
    assert_eq!(err, Some(DeviceError::NoOutputDevices));
}

#[test]
fn test_only_input_devices_is_fatal() {
    let host = MockHost::new(vec![MockDevice::input_only("Microphone")]);
    let err = DeviceBinding::new(host.as_host(), Some(0), RATE).err();
    assert_eq!(err, Some(DeviceError::NoOutputDevices));
}

#[test]
fn test_validate() {
    let host = MockHost::standard();
    host.reject_rate(1, 16000);
    let binding = DeviceBinding::new(host.as_host(), None, RATE).unwrap();

    assert!(binding.validate(0, 16000));
    assert!(binding.validate(1, RATE));
    assert!(!binding.validate(1, 16000));
    assert!(!binding.validate(5, RATE));
}

#[test]
fn test_bind_compatible_device() {
    let host = MockHost::standard();
    let mut binding = DeviceBinding::new(host.as_host(), None, RATE).unwrap();

    let handle = binding.bind(1).unwrap();
    assert_eq!(handle.index, 1);
    assert_eq!(binding.current(), 1);
}

#[test]
fn test_bind_incompatible_device_keeps_binding_valid() {
    let host = MockHost::new(vec![
        MockDevice::output("Speakers"),
        MockDevice::output("Headphones"),
        MockDevice::output("Broken"),
    ]);
    host.reject(2);
    let mut binding = DeviceBinding::new(host.as_host(), Some(1), RATE).unwrap();

    let err = binding.bind(2).unwrap_err();
    assert!(matches!(err, DeviceError::IncompatibleDevice { index: 2, .. }));
    // Previous device heads the fallback chain
    assert_eq!(binding.current(), 1);
    assert!(binding.validate(binding.current(), RATE));
}

#[test]
fn test_bind_out_of_range() {
    let host = MockHost::standard();
    let mut binding = DeviceBinding::new(host.as_host(), None, RATE).unwrap();

    let err = binding.bind(9).unwrap_err();
    assert!(matches!(err, DeviceError::IncompatibleDevice { index: 9, .. }));
    assert_eq!(binding.current(), 0);
}

#[test]
fn test_set_sample_rate_revalidates() {
    let host = MockHost::standard();
    host.reject_rate(1, 16000);
    let mut binding = DeviceBinding::new(host.as_host(), Some(1), RATE).unwrap();

    binding.set_sample_rate(24000).unwrap();
    assert_eq!(binding.current(), 1);
    assert_eq!(binding.handle().sample_rate, 24000);

    let err = binding.set_sample_rate(16000).unwrap_err();
    assert!(matches!(err, DeviceError::IncompatibleDevice { index: 1, .. }));
    assert_eq!(binding.current(), 0);
    assert_eq!(binding.sample_rate(), 16000);
}
