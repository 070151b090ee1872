//! Multi-signal success classification
//!
//! After a submit the application may confirm in several ways: the API
//! answers, a toast shows up, or the new entry appears in a list. Signals
//! are consulted in a configured order and the first positive one wins;
//! later signals are not evaluated.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use super::outcome::Outcome;
use super::poller::{SignalPattern, SignalPoller};
use crate::browser::{Locator, Page, ResponseWatch};

/// One way the application can confirm a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// A matching 2xx response
    Network,
    /// A notification whose text matches the success pattern
    Toast,
    /// The created entry is visible on the page
    ListRow,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalKind::Network => "network",
            SignalKind::Toast => "toast",
            SignalKind::ListRow => "list_row",
        };
        f.write_str(name)
    }
}

/// Everything needed to evaluate each signal once
pub struct SuccessSignals {
    /// Watch started before the triggering action
    pub response: ResponseWatch,
    pub poller: SignalPoller,
    pub toast_pattern: SignalPattern,
    pub toast_timeout: Duration,
    /// Element that shows the created entry
    pub list_row: Locator,
}

/// Result of a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub outcome: Outcome,
    /// Signal that confirmed success, if any
    pub signal: Option<SignalKind>,
}

/// Evaluate signals in `order`, stopping at the first that confirms success
pub async fn classify(page: &dyn Page, order: &[SignalKind], signals: SuccessSignals) -> Classification {
    let SuccessSignals {
        response,
        poller,
        toast_pattern,
        toast_timeout,
        list_row,
    } = signals;
    let mut response = Some(response);

    for kind in order {
        let confirmed = match kind {
            SignalKind::Network => match response.take() {
                Some(watch) => match watch.wait().await {
                    Some(observed) => {
                        tracing::debug!(url = %observed.url, status = observed.status, "Response observed");
                        observed.ok()
                    }
                    None => false,
                },
                None => false,
            },
            SignalKind::Toast => poller.await_signal(page, &toast_pattern, toast_timeout).await,
            SignalKind::ListRow => page.is_visible(&list_row).await.unwrap_or(false),
        };

        if confirmed {
            tracing::info!(signal = %kind, "Success confirmed");
            return Classification {
                outcome: Outcome::Success,
                signal: Some(*kind),
            };
        }
        tracing::debug!(signal = %kind, "No confirmation from signal");
    }

    Classification {
        outcome: Outcome::Failure,
        signal: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::mock::{MockElement, MockPage};
    use crate::browser::{ObservedResponse, ResponseMatcher};
    use crate::testing::poller::{toast_region, READINESS_POLL_INTERVAL};

    const DEFAULT_ORDER: [SignalKind; 3] = [SignalKind::Network, SignalKind::Toast, SignalKind::ListRow];

    async fn signals(page: &MockPage, row: &Locator) -> SuccessSignals {
        let matcher = ResponseMatcher::new("requirement", &["POST", "PUT"]).unwrap();
        SuccessSignals {
            response: page
                .watch_response(matcher, Duration::from_secs(10))
                .await
                .unwrap(),
            poller: SignalPoller::toasts(READINESS_POLL_INTERVAL),
            toast_pattern: SignalPattern::new("(created|success|saved)").unwrap(),
            toast_timeout: Duration::from_secs(7),
            list_row: row.clone(),
        }
    }

    fn response(status: u16) -> ObservedResponse {
        ObservedResponse {
            url: "http://app/api/requirements".to_string(),
            method: "POST".to_string(),
            status,
        }
    }

    #[tokio::test]
    async fn test_network_short_circuits() {
        let page = MockPage::new();
        let row = Locator::loose_text("Auto Req 1");
        let signals = signals(&page, &row).await;
        page.deliver(response(201));

        let result = classify(&page, &DEFAULT_ORDER, signals).await;
        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.signal, Some(SignalKind::Network));
        // Neither the toast region nor the row was consulted
        assert_eq!(page.reads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_list_row() {
        let page = MockPage::new();
        let row = Locator::loose_text("Auto Req 2");
        page.place(row.clone(), MockElement::new("Auto Req 2"));
        let signals = signals(&page, &row).await;

        let result = classify(&page, &DEFAULT_ORDER, signals).await;
        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.signal, Some(SignalKind::ListRow));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_then_toast() {
        let page = MockPage::new();
        let row = Locator::loose_text("Auto Req 3");
        page.place(toast_region(), MockElement::new("Requirement saved"));
        let signals = signals(&page, &row).await;
        page.deliver(response(500));

        let result = classify(&page, &DEFAULT_ORDER, signals).await;
        assert_eq!(result.signal, Some(SignalKind::Toast));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_confirms() {
        let page = MockPage::new();
        let row = Locator::loose_text("Auto Req 4");
        let signals = signals(&page, &row).await;

        let result = classify(&page, &DEFAULT_ORDER, signals).await;
        assert_eq!(result.outcome, Outcome::Failure);
        assert_eq!(result.signal, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_order_is_respected() {
        let page = MockPage::new();
        let row = Locator::loose_text("Auto Req 5");
        page.place(row.clone(), MockElement::new("Auto Req 5"));
        page.place(toast_region(), MockElement::new("Created"));
        let signals = signals(&page, &row).await;

        let result = classify(&page, &[SignalKind::ListRow, SignalKind::Toast], signals).await;
        assert_eq!(result.signal, Some(SignalKind::ListRow));
    }

    #[test]
    fn test_signal_kind_names() {
        #[derive(Deserialize)]
        struct Order {
            signal_order: Vec<SignalKind>,
        }
        let order: Order = toml::from_str("signal_order = [\"list_row\", \"network\"]").unwrap();
        assert_eq!(order.signal_order, vec![SignalKind::ListRow, SignalKind::Network]);
        assert_eq!(SignalKind::ListRow.to_string(), "list_row");
    }
}
