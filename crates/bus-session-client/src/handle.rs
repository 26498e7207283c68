//! Proxy for a remote interface over a session.

use std::{fmt, sync::Arc};

use bus_session_core::{BusTransport, InterfaceContract, MethodCall};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{RemoteCallError, Session};

/// Remote service handle.
///
/// Binds a session to an interface contract and an object path. Read-only
/// after creation and cheap to clone; clones can be moved into independent
/// tasks and used concurrently.
#[derive(Clone)]
pub struct RemoteServiceHandle {
    transport: Arc<dyn BusTransport>,
    session: Session,
    object_path: String,
    contract: Arc<InterfaceContract>,
}

impl fmt::Debug for RemoteServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteServiceHandle")
            .field("session", &self.session)
            .field("object_path", &self.object_path)
            .field("interface", &self.contract.name)
            .finish_non_exhaustive()
    }
}

impl RemoteServiceHandle {
    pub(crate) fn new(
        transport: Arc<dyn BusTransport>,
        session: Session,
        object_path: impl Into<String>,
        contract: InterfaceContract,
    ) -> Self {
        Self {
            transport,
            session,
            object_path: object_path.into(),
            contract: Arc::new(contract),
        }
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn contract(&self) -> &InterfaceContract {
        &self.contract
    }

    #[must_use]
    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    /// Invoke `member` with positional `args` (a JSON array).
    ///
    /// Waits for the reply. Independent of any other call in flight on this
    /// handle or its clones.
    ///
    /// # Errors
    /// Returns error if the session is not connected, the member is not part
    /// of the contract, the arguments do not match its arity, or the remote
    /// call fails.
    pub async fn invoke(&self, member: &str, args: Value) -> Result<Value, RemoteCallError> {
        if !self.session.is_connected() {
            return Err(RemoteCallError::NotConnected(self.session.id()));
        }

        let spec = self
            .contract
            .find(member)
            .ok_or_else(|| RemoteCallError::UnknownMember {
                interface: self.contract.name.clone(),
                member: member.to_string(),
            })?;

        let provided = match &args {
            Value::Array(items) => items.len(),
            other => {
                return Err(RemoteCallError::InvalidArguments {
                    member: member.to_string(),
                    reason: format!("expected an argument array, got {other}"),
                });
            }
        };
        if provided != spec.arity {
            return Err(RemoteCallError::InvalidArguments {
                member: member.to_string(),
                reason: format!("expected {} arguments, got {provided}", spec.arity),
            });
        }

        tracing::debug!(
            session = %self.session.id(),
            interface = %self.contract.name,
            member,
            "remote call"
        );

        let call = MethodCall {
            session: self.session.id(),
            destination: self.session.remote_name().to_string(),
            object_path: self.object_path.clone(),
            interface: self.contract.name.clone(),
            member: member.to_string(),
            args,
        };

        self.transport.method_call(call).await.map_err(RemoteCallError::from)
    }

    /// Typed variant of [`invoke`](Self::invoke).
    ///
    /// `args` must serialize to an array, e.g. a tuple: `("Hello",)`.
    ///
    /// # Errors
    /// Same as `invoke`, plus JSON conversion failures.
    pub async fn call<A, R>(&self, member: &str, args: A) -> Result<R, RemoteCallError>
    where
        A: Serialize + Send,
        R: DeserializeOwned,
    {
        let args = serde_json::to_value(args)?;
        let reply = self.invoke(member, args).await?;
        Ok(serde_json::from_value(reply)?)
    }
}
