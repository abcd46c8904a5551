//! Ordered fallback over equivalent requests.
//!
//! Deployments differ in which upload route and multipart field name
//! they accept, so several endpoints try a sequence of shapes until one
//! succeeds. Futures are built lazily by async fns, so collecting the
//! whole chain up front costs nothing until an attempt is polled.

use std::future::Future;

use tracing::debug;

use crate::http::ClientError;

pub struct Attempt<F> {
    pub label: &'static str,
    pub run: F,
}

impl<F> Attempt<F> {
    pub fn new(label: &'static str, run: F) -> Self {
        Self { label, run }
    }
}

/// Runs attempts in order, returning the first success. A failure on a
/// non-final attempt continues only when `non_fatal` says so; the final
/// attempt's error always propagates.
pub async fn try_in_order<T, F>(
    attempts: Vec<Attempt<F>>,
    non_fatal: impl Fn(&ClientError) -> bool,
) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    let total = attempts.len();
    if total == 0 {
        return Err(ClientError::Validation("no request attempts to run".into()));
    }

    for (index, attempt) in attempts.into_iter().enumerate() {
        let last = index + 1 == total;
        match attempt.run.await {
            Ok(value) => return Ok(value),
            Err(err) if !last && non_fatal(&err) => {
                debug!("Attempt '{}' failed, trying next: {err}", attempt.label);
            }
            Err(err) => return Err(err),
        }
    }

    unreachable!("loop returns on the final attempt");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::ready;

    fn api_error(status: u16) -> ClientError {
        ClientError::Api {
            status,
            message: "nope".into(),
        }
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let result = try_in_order(
            vec![
                Attempt::new("a", ready(Ok(1))),
                Attempt::new("b", ready(Ok(2))),
            ],
            |_| true,
        )
        .await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_non_fatal_failure_falls_through() {
        let result = try_in_order(
            vec![
                Attempt::new("a", ready(Err(api_error(404)))),
                Attempt::new("b", ready(Ok(7))),
            ],
            |err| matches!(err, ClientError::Api { status: 404, .. }),
        )
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_fatal_failure_stops_the_chain() {
        let result: Result<i32, _> = try_in_order(
            vec![
                Attempt::new("a", ready(Err(api_error(500)))),
                Attempt::new("b", ready(Ok(7))),
            ],
            |err| matches!(err, ClientError::Api { status: 404, .. }),
        )
        .await;
        assert!(matches!(
            result.unwrap_err(),
            ClientError::Api { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn test_final_error_propagates() {
        let result: Result<i32, _> = try_in_order(
            vec![
                Attempt::new("a", ready(Err(api_error(404)))),
                Attempt::new("b", ready(Err(api_error(422)))),
            ],
            |_| true,
        )
        .await;
        assert!(matches!(
            result.unwrap_err(),
            ClientError::Api { status: 422, .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_chain_is_an_error() {
        let result: Result<i32, _> =
            try_in_order(Vec::<Attempt<std::future::Ready<_>>>::new(), |_| true).await;
        assert!(matches!(result.unwrap_err(), ClientError::Validation(_)));
    }
}
