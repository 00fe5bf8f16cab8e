//! various helper functions used to simplify unit tests.
//!
//! **Note**: This module is only compiled and used during testing.

#[cfg(test)]
pub mod test_helper {
    use log::Level;

    /// Assert that exactly the given warnings (in this order) were logged since
    /// `testing_logger::setup()`.
    pub fn check_warnings(expected_warnings: Vec<&str>) {
        testing_logger::validate(|captured_logs| {
            let captured_logs: Vec<_> = captured_logs
                .iter()
                .filter(|l| l.level == Level::Warn)
                .collect();
            assert_eq!(captured_logs.len(), expected_warnings.len());
            for (log, expected) in captured_logs.iter().zip(&expected_warnings) {
                assert_eq!(log.body, *expected);
            }
        });
    }
    /// Assert that no warning was logged since `testing_logger::setup()`.
    pub fn check_no_warnings() {
        check_warnings(vec![]);
    }
}
