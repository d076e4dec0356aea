use std::time::Duration;

use benchtop_adapters::MOCK_RESPONSE_OFFSET;
use benchtop_proto::{CanBus, CanFrame};

use super::CAN_INTERFACE;
use crate::case::{TestCase, TestContext, check, ensure};
use crate::error::{TestFailure, TestResult};

const SUITE: &str = "can_bus";

pub(super) const TESTS: &[TestCase] = &[
    TestCase::new(SUITE, "test_can_initialization", initialization),
    TestCase::new(SUITE, "test_can_send_receive", send_receive),
    TestCase::new(SUITE, "test_can_filters", filters),
    TestCase::new(SUITE, "test_can_send_various_messages", send_various),
];

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);

/// Clears filters and drops queued frames left by earlier tests.
pub(super) fn reset(bus: &mut dyn CanBus) -> TestResult {
    check(bus.clear_filters(), "CAN clear filters")?;
    while bus.receive(Some(Duration::ZERO)).is_some() {}
    Ok(())
}

fn initialization(ctx: &mut TestContext<'_>) -> TestResult {
    ensure(ctx.is_ready(CAN_INTERFACE)?, "CAN interface is not ready")
}

fn send_receive(ctx: &mut TestContext<'_>) -> TestResult {
    let mock = ctx.is_mock(CAN_INTERFACE);
    let bus = ctx.can(CAN_INTERFACE)?;
    reset(bus)?;

    let request = CanFrame::new(0x123, [0x01, 0x02, 0x03, 0x04]);
    check(bus.send(&request), "CAN send")?;

    let Some(response) = bus.receive(Some(RECEIVE_TIMEOUT)) else {
        if mock {
            return Err(TestFailure::Assertion("mock bus produced no response".into()));
        }
        return Err(TestFailure::skip("no frame received (bus idle)"));
    };
    if mock {
        let expected = request.id + MOCK_RESPONSE_OFFSET;
        ensure(
            response.id == expected,
            format!("expected response ID 0x{expected:X}, got 0x{:X}", response.id),
        )?;
        ensure(
            response.data == [0x02, 0x03, 0x04, 0x05],
            format!("unexpected response payload {:02X?}", response.data),
        )?;
    }
    Ok(())
}

fn filters(ctx: &mut TestContext<'_>) -> TestResult {
    let mock = ctx.is_mock(CAN_INTERFACE);
    let bus = ctx.can(CAN_INTERFACE)?;
    reset(bus)?;

    check(bus.add_filter(0x7E8, 0x7FF), "CAN add filter")?;
    ensure(bus.filters() == [0x7E8], format!("filters are {:X?}", bus.filters()))?;

    if mock {
        check(bus.send(&CanFrame::new(0x100, [0x00])), "CAN send")?;
        check(bus.send(&CanFrame::new(0x7E0, [0x00])), "CAN send")?;
        let first = bus.receive(Some(RECEIVE_TIMEOUT));
        ensure(
            first.as_ref().is_some_and(|frame| frame.id == 0x7E8),
            format!("expected only 0x7E8 to pass the filter, got {first:?}"),
        )?;
        ensure(
            bus.receive(Some(Duration::ZERO)).is_none(),
            "filtered frame reached the receive queue",
        )?;
    }

    check(bus.clear_filters(), "CAN clear filters")?;
    ensure(bus.filters().is_empty(), "filters remain after clear")
}

fn send_various(ctx: &mut TestContext<'_>) -> TestResult {
    let bus = ctx.can(CAN_INTERFACE)?;
    reset(bus)?;

    let frames = [
        CanFrame::new(0x100, [0x01, 0x02, 0x03]),
        CanFrame::new(0x200, [0xAA, 0xBB, 0xCC, 0xDD]),
        CanFrame::new(0x300, [0xFF; 8]),
        CanFrame::new(0x18DA_F110, [0x02, 0x3E, 0x00]).extended(),
    ];
    for frame in &frames {
        check(bus.send(frame), &format!("CAN send 0x{:X}", frame.id))?;
    }
    reset(bus)
}
