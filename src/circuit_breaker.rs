use failsafe::{backoff, failure_policy, Config, StateMachine};
use std::time::Duration;

/// Breaker type guarding the external risk provider.
pub type ProviderCircuitBreaker =
    StateMachine<failure_policy::ConsecutiveFailures<backoff::Exponential>, ()>;

/// Creates the circuit breaker placed in front of the external risk provider.
///
/// # Configuration
///
/// - **Failure threshold**: 5 consecutive failed provider calls open the circuit.
/// - **Backoff**: Exponential from 10s to 60s before a trial call is let through.
///
/// While open, assessments skip the provider and return the local result.
pub fn create_provider_circuit_breaker() -> ProviderCircuitBreaker {
    let backoff_strategy = backoff::exponential(Duration::from_secs(10), Duration::from_secs(60));

    let failure_policy = failure_policy::consecutive_failures(5, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use failsafe::{CircuitBreaker, Error};

    #[test]
    fn test_opens_after_five_failures() {
        let cb = create_provider_circuit_breaker();

        for _ in 0..5 {
            let result: Result<(), Error<&str>> = cb.call(|| Err::<(), &str>("provider down"));
            assert!(result.is_err());
        }

        assert!(!cb.is_call_permitted());
        match cb.call(|| Ok::<(), &str>(())) {
            Err(Error::Rejected) => {}
            _ => panic!("Expected the open circuit to reject the call"),
        }
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let cb = create_provider_circuit_breaker();

        for _ in 0..4 {
            let _ = cb.call(|| Err::<(), &str>("provider down"));
        }
        let _ = cb.call(|| Ok::<(), &str>(()));
        for _ in 0..4 {
            let _ = cb.call(|| Err::<(), &str>("provider down"));
        }

        assert!(cb.is_call_permitted());
    }
}
