use benchtop_proto::GpioBank;

use super::GPIO_INTERFACE;
use crate::case::{TestCase, TestContext, check, ensure};
use crate::error::{TestFailure, TestResult};

const SUITE: &str = "gpio";

pub(super) const TESTS: &[TestCase] = &[
    TestCase::new(SUITE, "test_gpio_toggle", toggle),
    TestCase::new(SUITE, "test_gpio_named_pins", named_pins),
];

const STATUS_LED: &str = "status_led";

fn status_led(bank: &dyn GpioBank) -> Result<u32, TestFailure> {
    bank.pin_by_name(STATUS_LED)
        .ok_or_else(|| TestFailure::skip(format!("no '{STATUS_LED}' pin configured")))
}

fn toggle(ctx: &mut TestContext<'_>) -> TestResult {
    let bank = ctx.gpio(GPIO_INTERFACE)?;
    let pin = status_led(bank)?;

    check(bank.set_pin(pin, true), "GPIO set")?;
    ensure(bank.get_pin(pin) == Some(true), format!("pin {pin} did not go high"))?;

    check(bank.toggle_pin(pin), "GPIO toggle")?;
    ensure(bank.get_pin(pin) == Some(false), format!("pin {pin} did not toggle low"))
}

fn named_pins(ctx: &mut TestContext<'_>) -> TestResult {
    let bank = ctx.gpio(GPIO_INTERFACE)?;
    status_led(bank)?;
    ensure(
        bank.pin_by_name("no_such_pin").is_none(),
        "unknown pin alias resolved",
    )
}
