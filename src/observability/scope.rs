//! Begin/complete logging around a unit of work.

use std::time::Instant;

use super::logger::Logger;

/// Logs `{name}_BEGIN` on creation and exactly one of `{name}_COMPLETE`,
/// `{name}_FAILED` or `{name}_INCOMPLETE` (on drop) afterwards. Completion
/// lines carry the elapsed time in `elapsed_us`.
///
/// ```ignore
/// let scope = ObservationScope::with_fields("COMMIT", &[("operations", "3")]);
/// // ... apply ...
/// scope.complete_with_fields(&[("failures", "0")]);
/// ```
pub struct ObservationScope {
    name: String,
    fields: Vec<(String, String)>,
    started: Instant,
    finished: bool,
}

impl ObservationScope {
    pub fn new(name: &str) -> Self {
        Self::with_fields(name, &[])
    }

    pub fn with_fields(name: &str, fields: &[(&str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);
        Self {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    pub fn complete_with_fields(mut self, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.elapsed_us();
        let mut all: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        all.extend(extra.iter().copied());
        all.push(("elapsed_us", elapsed.as_str()));
        Logger::info(&format!("{}_COMPLETE", self.name), &all);
    }

    pub fn fail(mut self, reason: &str) {
        self.finished = true;
        let elapsed = self.elapsed_us();
        Logger::error(
            &format!("{}_FAILED", self.name),
            &[("elapsed_us", elapsed.as_str()), ("reason", reason)],
        );
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn elapsed_us(&self) -> String {
        self.started.elapsed().as_micros().to_string()
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_lifecycle() {
        let scope = ObservationScope::with_fields("TEST", &[("key", "value")]);
        assert!(!scope.is_finished());
        scope.complete_with_fields(&[("result", "ok")]);
    }

    #[test]
    fn test_scope_fail_and_drop_do_not_panic() {
        ObservationScope::new("TEST").fail("went wrong");
        drop(ObservationScope::new("TEST"));
    }
}
