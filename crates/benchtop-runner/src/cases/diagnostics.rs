//! UDS requests over the CAN interface.
//!
//! Requests go to the physical request ID; the ECU answers on request + 8.
//! The mock bus echoes with the same offset, so the ID check holds on both.
//! The positive-response SID (`request + 0x40`) is only checked on live
//! hardware. Tests still marked `requires_hardware` skip on a simulated bus.

use std::time::Duration;

use benchtop_proto::CanFrame;

use super::CAN_INTERFACE;
use super::can_bus::reset;
use crate::case::{TestCase, TestContext, check, ensure};
use crate::error::{TestFailure, TestResult};

const SUITE: &str = "diagnostics";

pub(super) const TESTS: &[TestCase] = &[
    TestCase::new(SUITE, "test_diag_session", session),
    TestCase::new(SUITE, "test_diag_dtc_read", dtc_read),
    TestCase::new(SUITE, "test_diag_tester_present", tester_present),
];

const REQUEST_ID: u32 = 0x7E0;
const RESPONSE_ID: u32 = 0x7E8;
const POSITIVE_RESPONSE: u8 = 0x40;
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Sends a single-frame request and checks the reply.
fn request(ctx: &mut TestContext<'_>, payload: &[u8]) -> TestResult {
    let mock = ctx.is_mock(CAN_INTERFACE);
    if mock && ctx.has_marker("requires_hardware") {
        return Err(TestFailure::skip("needs a live ECU, CAN is simulated"));
    }
    let bus = ctx.can(CAN_INTERFACE)?;
    reset(bus)?;
    check(bus.add_filter(RESPONSE_ID, 0x7FF), "CAN add filter")?;

    let mut frame = Vec::with_capacity(payload.len() + 1);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);
    check(bus.send(&CanFrame::new(REQUEST_ID, frame)), "UDS request")?;

    let response = bus.receive(Some(RESPONSE_TIMEOUT));
    reset(bus)?;
    let response = response.ok_or_else(|| {
        TestFailure::Assertion(format!("no response to service 0x{:02X}", payload[0]))
    })?;

    ensure(
        response.id == RESPONSE_ID,
        format!("response on 0x{:X}, expected 0x{RESPONSE_ID:X}", response.id),
    )?;
    ensure(response.data.len() >= 2, "response frame too short")?;
    if !mock {
        let sid = response.data[1];
        ensure(
            sid == payload[0] + POSITIVE_RESPONSE,
            format!("negative response 0x{sid:02X} to service 0x{:02X}", payload[0]),
        )?;
    }
    Ok(())
}

fn session(ctx: &mut TestContext<'_>) -> TestResult {
    // DiagnosticSessionControl, extended session
    request(ctx, &[0x10, 0x03])
}

fn dtc_read(ctx: &mut TestContext<'_>) -> TestResult {
    // ReadDTCInformation, report DTCs by status mask
    request(ctx, &[0x19, 0x02, 0xFF])
}

fn tester_present(ctx: &mut TestContext<'_>) -> TestResult {
    request(ctx, &[0x3E, 0x00])
}
