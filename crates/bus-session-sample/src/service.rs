//! Server-side implementation of the sample interface.

use async_trait::async_trait;
use bus_session_core::{BusObject, InterfaceContract, MethodError};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::contract::{CONCATENATE, FIBONACCI, PI, PING, sample_interface};

/// Error name reported for rejected arguments.
pub const INVALID_ARGUMENT: &str = "com.my.sample.Error.InvalidArgument";

/// Largest index whose Fibonacci number fits in a `u64`.
pub const MAX_FIBONACCI_INDEX: u32 = 93;

/// Sample service object.
pub struct SampleService {
    contract: InterfaceContract,
}

impl SampleService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            contract: sample_interface(),
        }
    }
}

impl Default for SampleService {
    fn default() -> Self {
        Self::new()
    }
}

/// `n`-th Fibonacci number with `F(0) = 0` and `F(1) = 1`.
#[must_use]
pub fn fibonacci(n: u32) -> Option<u64> {
    if n > MAX_FIBONACCI_INDEX {
        return None;
    }
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        // b runs one step ahead and may wrap on the last step; it is discarded.
        (a, b) = (b, a.wrapping_add(b));
    }
    Some(a)
}

/// Approximate pi with `iterations` terms of the Leibniz series.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn leibniz_pi(iterations: u64) -> f64 {
    let mut sum = 0.0;
    let mut sign = 1.0;
    for k in 0..iterations {
        sum += sign / (2 * k + 1) as f64;
        sign = -sign;
    }
    4.0 * sum
}

fn parse_args<T: DeserializeOwned>(member: &str, args: Value) -> Result<T, MethodError> {
    serde_json::from_value(args).map_err(|e| MethodError::InvalidArguments {
        member: member.to_string(),
        reason: e.to_string(),
    })
}

fn invalid(message: String) -> MethodError {
    MethodError::Failed {
        name: INVALID_ARGUMENT.to_string(),
        message,
    }
}

#[async_trait]
impl BusObject for SampleService {
    fn interface(&self) -> &InterfaceContract {
        &self.contract
    }

    async fn call(&self, member: &str, args: Value) -> Result<Value, MethodError> {
        match member {
            PING => {
                let (text,): (String,) = parse_args(member, args)?;
                tracing::debug!(%text, "Ping");
                Ok(json!(text))
            }
            CONCATENATE => {
                let (head, tail): (String, String) = parse_args(member, args)?;
                Ok(json!(head + &tail))
            }
            FIBONACCI => {
                let (n,): (i64,) = parse_args(member, args)?;
                let index = u32::try_from(n).map_err(|_| {
                    invalid(format!("Fibonacci index must be non-negative, got {n}"))
                })?;
                let value = fibonacci(index).ok_or_else(|| {
                    invalid(format!("Fibonacci({index}) exceeds {MAX_FIBONACCI_INDEX}"))
                })?;
                Ok(json!(value))
            }
            PI => {
                let (iterations,): (u64,) = parse_args(member, args)?;
                tracing::info!(iterations, "Calculating Pi");
                let pi = tokio::task::spawn_blocking(move || leibniz_pi(iterations))
                    .await
                    .map_err(|e| MethodError::Failed {
                        name: "com.my.sample.Error.Aborted".to_string(),
                        message: e.to_string(),
                    })?;
                Ok(json!(pi))
            }
            other => Err(MethodError::UnknownMember(other.to_string())),
        }
    }
}
