//! Test objects shared by unit tests.

use async_trait::async_trait;
use bus_session_core::{BusObject, InterfaceContract, MethodError};
use serde_json::{Value, json};

/// Echoes its argument, adds numbers, or fails on request.
pub struct EchoObject {
    contract: InterfaceContract,
}

impl EchoObject {
    pub fn new() -> Self {
        Self {
            contract: Self::contract(),
        }
    }

    pub fn contract() -> InterfaceContract {
        InterfaceContract::new("com.example.Echo")
            .method("Echo", 1)
            .method("Add", 2)
            .method("Fail", 0)
    }
}

#[async_trait]
impl BusObject for EchoObject {
    fn interface(&self) -> &InterfaceContract {
        &self.contract
    }

    async fn call(&self, member: &str, args: Value) -> Result<Value, MethodError> {
        match member {
            "Echo" => {
                tokio::task::yield_now().await;
                Ok(args[0].clone())
            }
            "Add" => {
                let (a, b): (i64, i64) =
                    serde_json::from_value(args).map_err(|e| MethodError::InvalidArguments {
                        member: member.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(json!(a + b))
            }
            "Fail" => Err(MethodError::Failed {
                name: "com.example.Error.Fail".to_string(),
                message: "asked to fail".to_string(),
            }),
            other => Err(MethodError::UnknownMember(other.to_string())),
        }
    }
}
