use stampede_core::{Outcome, Response, ScenarioConfig, DEFAULT_SUCCESS_SENTINEL};

/// Turns a [`Response`] into exactly one [`Outcome`].
///
/// Transport failures always win. In strict mode a response that made it through the
/// transport is only a success when its application status equals the sentinel; a missing
/// status is an application failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classifier {
    sentinel: Option<String>,
}

impl Classifier {
    pub fn strict(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: Some(sentinel.into()),
        }
    }

    /// Only the transport layer decides; application status is ignored.
    pub fn transport_only() -> Self {
        Self { sentinel: None }
    }

    pub fn from_config(config: &ScenarioConfig) -> Self {
        if config.check_application_status {
            Self::strict(config.success_sentinel.as_str())
        } else {
            Self::transport_only()
        }
    }

    pub fn classify(&self, response: &Response) -> Outcome {
        if let Some(kind) = response.transport.error_kind() {
            return Outcome::TransportFailure(kind);
        }

        match &self.sentinel {
            None => Outcome::Success,
            Some(sentinel) => match response.app_status.as_deref() {
                Some(status) if status == sentinel => Outcome::Success,
                _ => Outcome::ApplicationFailure,
            },
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::strict(DEFAULT_SUCCESS_SENTINEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampede_core::{ErrorKind, TransportStatus};

    fn ok(status: Option<&str>) -> Response {
        Response::ok(status.map(str::to_string), None, 0)
    }

    #[test]
    fn strict_success_requires_sentinel() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(&ok(Some("True"))), Outcome::Success);
        assert_eq!(
            classifier.classify(&ok(Some("False"))),
            Outcome::ApplicationFailure
        );
        assert_eq!(
            classifier.classify(&ok(Some("true"))),
            Outcome::ApplicationFailure
        );
        assert_eq!(classifier.classify(&ok(None)), Outcome::ApplicationFailure);
    }

    #[test]
    fn transport_failure_takes_precedence() {
        let classifier = Classifier::default();
        let mut response = Response::failed(TransportStatus::Status("503".into()), "busy");
        response.app_status = Some("True".to_string());

        assert_eq!(
            classifier.classify(&response),
            Outcome::TransportFailure(ErrorKind::Protocol)
        );

        let response = Response::failed(TransportStatus::TimedOut, "slow");
        assert_eq!(
            Classifier::transport_only().classify(&response),
            Outcome::TransportFailure(ErrorKind::Connection)
        );
    }

    #[test]
    fn transport_only_ignores_status() {
        let classifier = Classifier::transport_only();
        assert_eq!(classifier.classify(&ok(None)), Outcome::Success);
        assert_eq!(classifier.classify(&ok(Some("False"))), Outcome::Success);
    }

    #[test]
    fn classify_is_total() {
        let statuses = [
            TransportStatus::Ok,
            TransportStatus::ConnectFailed,
            TransportStatus::TimedOut,
            TransportStatus::Rejected,
            TransportStatus::Status("500".into()),
            TransportStatus::Malformed,
        ];
        let app_statuses = [None, Some("True"), Some("False"), Some("")];
        let classifiers = [
            Classifier::default(),
            Classifier::strict("OK"),
            Classifier::transport_only(),
        ];

        for classifier in &classifiers {
            for transport in &statuses {
                for app in &app_statuses {
                    let response = Response {
                        transport: transport.clone(),
                        app_status: app.map(str::to_string),
                        ..Response::ok(None, None, 0)
                    };
                    let outcome = classifier.classify(&response);
                    let expected_transport = !transport.is_ok();
                    assert_eq!(
                        matches!(outcome, Outcome::TransportFailure(_)),
                        expected_transport,
                        "{transport:?} {app:?} => {outcome:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn custom_sentinel_from_config() {
        let mut config = ScenarioConfig::new(
            "custom",
            stampede_core::ExecutorKind::FixedPopulation,
            vec![stampede_core::Stage::new(1., std::time::Duration::from_secs(1))],
        );
        config.success_sentinel = "OK".to_string();
        let classifier = Classifier::from_config(&config);
        assert_eq!(classifier.classify(&ok(Some("OK"))), Outcome::Success);
        assert_eq!(
            classifier.classify(&ok(Some("True"))),
            Outcome::ApplicationFailure
        );

        config.check_application_status = false;
        assert_eq!(Classifier::from_config(&config), Classifier::transport_only());
    }
}
