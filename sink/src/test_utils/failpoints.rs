use fail::FailScenario;

/// Fail points configured for the lifetime of the value.
///
/// Every configured fail point is switched off again on drop, so a failing assertion does not
/// leak the configuration into the next test.
pub struct CustomFailScenario<'a> {
    _scenario: FailScenario<'a>,
    failpoints: Vec<String>,
}

impl<'a> CustomFailScenario<'a> {
    /// Configures each `(name, action)` pair, e.g. `("session.commit", "return")`.
    pub fn setup(failpoints: &[(&str, &str)]) -> CustomFailScenario<'a> {
        let scenario = FailScenario::setup();

        for (name, action) in failpoints {
            fail::cfg(*name, action).unwrap();
        }

        Self {
            _scenario: scenario,
            failpoints: failpoints.iter().map(|(name, _)| name.to_string()).collect(),
        }
    }
}

impl Drop for CustomFailScenario<'_> {
    fn drop(&mut self) {
        for name in &self.failpoints {
            fail::remove(name);
        }
    }
}
