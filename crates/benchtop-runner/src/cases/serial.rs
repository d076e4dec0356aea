use std::time::Duration;

use super::SERIAL_INTERFACE;
use crate::case::{TestCase, TestContext, check, ensure};
use crate::error::{TestFailure, TestResult};

const SUITE: &str = "serial";

pub(super) const TESTS: &[TestCase] = &[
    TestCase::new(SUITE, "test_serial_echo", echo),
    TestCase::new(SUITE, "test_serial_read_line", read_line),
    TestCase::new(SUITE, "test_serial_timeout", idle_read),
];

fn echo(ctx: &mut TestContext<'_>) -> TestResult {
    let mock = ctx.is_mock(SERIAL_INTERFACE);
    let port = ctx.serial(SERIAL_INTERFACE)?;
    port.flush();

    let payload = b"PING\r\n";
    let written = check(port.write(payload), "serial write")?;
    ensure(
        written.data == Some(payload.len().into()),
        format!("expected {} bytes written, got {:?}", payload.len(), written.data),
    )?;

    match port.read(payload.len()) {
        Some(bytes) if !bytes.is_empty() => {
            ensure(bytes == payload, format!("echo mismatch: {bytes:02X?}"))
        }
        _ if mock => Err(TestFailure::Assertion("mock port did not echo".into())),
        _ => Err(TestFailure::skip("port has no loopback")),
    }
}

fn read_line(ctx: &mut TestContext<'_>) -> TestResult {
    let timeout = Duration::from_secs_f64(ctx.parameters().default_timeout);
    let port = ctx.serial(SERIAL_INTERFACE)?;
    port.flush();

    check(port.write(b"AT\r\n"), "serial write")?;
    let line = port
        .read_line(Some(timeout))
        .ok_or_else(|| TestFailure::Assertion("no response line".into()))?;
    ensure(line.ends_with("\r\n"), format!("unterminated line {line:?}"))?;
    ensure(line.trim_end() == "OK", format!("expected OK, got {line:?}"))
}

fn idle_read(ctx: &mut TestContext<'_>) -> TestResult {
    let port = ctx.serial(SERIAL_INTERFACE)?;
    port.flush();
    let data = port.read(16);
    ensure(
        data.as_ref().is_none_or(Vec::is_empty),
        format!("idle port returned {data:02X?}"),
    )
}
