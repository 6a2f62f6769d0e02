use std::time::Duration;

use shared::error::ProvisionError;
use shared::provision::ChecksumStage;
use shared::secrets::{FieldKind, MAX_SLOTS};

use crate::constants::ABORT_EXIT_MAX_READS;
use crate::provision::{ProvisioningSession, SessionConfig, SessionState};
use crate::test_support::{
    ChattyTransport, ListFault, ListFaultTransport, dev1_record, expected_slot_writes,
    sample_record, script_enter, script_exit, script_field_success, script_listing,
    script_slot_success, test_config,
};
use crate::transport::memory::ScriptedTransport;

#[test]
fn empty_batch_never_touches_the_device() {
    let mut session = ProvisioningSession::new(ScriptedTransport::new(), test_config());

    let report = session.run(&[]).expect("empty batch");

    assert_eq!(report.slots_written, 0);
    assert!(report.before.is_empty() && report.after.is_empty());
    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.into_transport().writes.is_empty());
}

#[test]
fn uploads_records_into_consecutive_slots() {
    let records = [dev1_record(), sample_record("dev2", 7)];
    let mut transport = ScriptedTransport::new();
    script_enter(&mut transport);
    script_listing(&mut transport, &["0: <empty>", "1: <empty>"]);
    script_slot_success(&mut transport, 0, &records[0]);
    script_slot_success(&mut transport, 1, &records[1]);
    script_listing(&mut transport, &["0: dev1", "1: dev2"]);
    script_exit(&mut transport);

    let mut session = ProvisioningSession::new(transport, test_config());
    let report = session.run(&records).expect("upload batch");

    assert_eq!(report.slots_written, 2);
    assert_eq!(report.before, vec!["0: <empty>", "1: <empty>"]);
    assert_eq!(report.after, vec!["0: dev1", "1: dev2"]);
    assert_eq!(session.state(), SessionState::Closed);

    let transport = session.into_transport();
    let mut expected = vec![b"X".to_vec(), b"l".to_vec()];
    expected.extend(expected_slot_writes(0, &records[0]));
    expected.extend(expected_slot_writes(1, &records[1]));
    expected.push(b"l".to_vec());
    expected.push(b"q".to_vec());
    assert_eq!(transport.writes, expected);
    assert_eq!(transport.pending(), 0);
}

#[test]
fn slot_failure_aborts_and_leaves_provisioning_mode() {
    let records = [dev1_record(), sample_record("dev2", 7)];
    let mut transport = ScriptedTransport::new();
    script_enter(&mut transport);
    script_listing(&mut transport, &[]);
    script_slot_success(&mut transport, 0, &records[0]);
    transport.push_line("slot=1");
    for kind in FieldKind::UPLOAD_ORDER {
        script_field_success(&mut transport, kind);
    }
    transport.push_line("slot=tmp crc=zzzzzzzz");
    script_exit(&mut transport);

    let mut session = ProvisioningSession::new(transport, test_config());
    let err = session.run(&records).expect_err("slot 1 fails");

    assert_eq!(err.slot(), Some(1));
    assert!(matches!(
        err.root(),
        ProvisionError::ChecksumMismatch {
            stage: ChecksumStage::Buffered,
            ..
        }
    ));
    assert_eq!(session.state(), SessionState::Aborted);

    let transport = session.into_transport();
    let slot0 = expected_slot_writes(0, &records[0]);
    assert_eq!(&transport.writes[2..2 + slot0.len()], slot0.as_slice());
    assert_eq!(transport.writes.last(), Some(&b"q".to_vec()));
    assert_eq!(
        transport.writes.iter().filter(|write| *write == b"l").count(),
        1,
        "no listing after an abort"
    );
    assert_eq!(transport.pending(), 0);
}

#[test]
fn abort_keeps_original_error_when_device_stays_silent() {
    let mut transport = ScriptedTransport::new();
    script_enter(&mut transport);
    script_listing(&mut transport, &[]);
    transport.push_line("slot=?");
    for _ in 0..ABORT_EXIT_MAX_READS {
        transport.push_silence();
    }
    transport.push_line("X");

    let mut session = ProvisioningSession::new(transport, test_config());
    let err = session.run(&[dev1_record()]).expect_err("select fails");

    assert!(matches!(
        err.root(),
        ProvisionError::SlotSelectFailed { slot: 0, .. }
    ));
    assert_eq!(session.state(), SessionState::Aborted);
    assert_eq!(session.into_transport().pending(), 1, "exit wait is bounded");
}

#[test]
fn abort_exit_is_bounded_on_a_chatty_console() {
    let mut script = ScriptedTransport::new();
    script_enter(&mut script);
    script_listing(&mut script, &[]);
    script.push_line("slot=?");
    let transport = ChattyTransport::new(script, "I (123) pgp: ble adv");

    let mut session = ProvisioningSession::new(transport, test_config());
    let err = session.run(&[dev1_record()]).expect_err("select fails");

    assert_eq!(err.slot(), Some(0));
    assert_eq!(err.received_line(), Some("slot=?"));
    assert_eq!(session.state(), SessionState::Aborted);

    let transport = session.into_transport();
    assert_eq!(transport.chatter_reads, ABORT_EXIT_MAX_READS);
    assert_eq!(transport.script.writes.last(), Some(&b"q".to_vec()));
}

fn script_listless_upload(transport: &mut ScriptedTransport) {
    script_enter(transport);
    script_slot_success(transport, 0, &dev1_record());
    script_exit(transport);
}

#[test]
fn failed_list_request_does_not_stop_the_upload() {
    let mut script = ScriptedTransport::new();
    script_listless_upload(&mut script);

    let transport = ListFaultTransport::new(script, ListFault::Request);
    let mut session = ProvisioningSession::new(transport, test_config());
    let report = session.run(&[dev1_record()]).expect("upload despite listing failure");

    assert_eq!(report.slots_written, 1);
    assert!(report.before.is_empty() && report.after.is_empty());
    assert_eq!(session.state(), SessionState::Closed);

    let transport = session.into_transport();
    assert_eq!(transport.failures, 2);
    assert_eq!(transport.script.pending(), 0);
}

#[test]
fn failed_listing_read_does_not_stop_the_upload() {
    let mut script = ScriptedTransport::new();
    script_listless_upload(&mut script);

    let transport = ListFaultTransport::new(script, ListFault::Drain);
    let mut session = ProvisioningSession::new(transport, test_config());
    let report = session.run(&[dev1_record()]).expect("upload despite listing failure");

    assert_eq!(report.slots_written, 1);
    assert_eq!(session.state(), SessionState::Closed);

    let transport = session.into_transport();
    assert_eq!(transport.failures, 2);
    assert_eq!(
        transport.script.writes.iter().filter(|write| *write == b"l").count(),
        2
    );
}

#[test]
fn enter_waits_through_console_noise() {
    let mut transport = ScriptedTransport::new();
    transport
        .push_line("rst:0x1 (POWERON_RESET)")
        .push_silence()
        .push_silence()
        .push_line("!!")
        .push_line("!");
    script_listing(&mut transport, &["0: dev1"]);
    script_exit(&mut transport);

    let mut session = ProvisioningSession::new(transport, test_config());
    let listing = session.inspect().expect("inspect");

    assert_eq!(listing, vec!["0: dev1"]);
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(
        session.into_transport().writes,
        vec![b"X".to_vec(), b"l".to_vec(), b"q".to_vec()]
    );
}

#[test]
fn bounded_mode_wait_times_out() {
    let mut transport = ScriptedTransport::new();
    transport.push_silence();
    let config = SessionConfig {
        mode_wait: Some(Duration::ZERO),
        ..test_config()
    };

    let mut session = ProvisioningSession::new(transport, config);
    let err = session.run(&[dev1_record()]).expect_err("no sentinel");

    assert!(matches!(
        err,
        ProvisionError::ModeChangeTimedOut { sentinel: '!', .. }
    ));
    assert_eq!(session.state(), SessionState::Aborted);
    assert_eq!(
        session.into_transport().writes,
        vec![b"X".to_vec(), b"q".to_vec()]
    );
}

#[test]
fn failed_exit_after_upload_is_reported() {
    let record = dev1_record();
    let mut transport = ScriptedTransport::new();
    script_enter(&mut transport);
    script_listing(&mut transport, &[]);
    script_slot_success(&mut transport, 0, &record);
    script_listing(&mut transport, &["0: dev1"]);

    let mut session = ProvisioningSession::new(transport, test_config());
    let err = session.run(&[record]).expect_err("exit never confirmed");

    assert!(matches!(err, ProvisionError::Transport(_)));
    assert_eq!(session.state(), SessionState::Aborted);
}

#[test]
fn too_many_records_fail_before_any_io() {
    let records: Vec<_> = (0..=MAX_SLOTS)
        .map(|index| sample_record(&format!("dev{index}"), index as u8))
        .collect();

    let mut session = ProvisioningSession::new(ScriptedTransport::new(), test_config());
    let err = session.run(&records).expect_err("11 records");

    assert!(matches!(
        err,
        ProvisionError::TooManyRecords { count: 11, max: 10 }
    ));
    assert!(err.is_validation());
    assert!(session.into_transport().writes.is_empty());
}

#[test]
fn finished_session_cannot_run_again() {
    let mut session = ProvisioningSession::new(ScriptedTransport::new(), test_config());
    session.run(&[]).expect("empty batch");

    assert!(matches!(
        session.run(&[dev1_record()]),
        Err(ProvisionError::SessionClosed)
    ));
    assert!(matches!(
        session.inspect(),
        Err(ProvisionError::SessionClosed)
    ));
}
