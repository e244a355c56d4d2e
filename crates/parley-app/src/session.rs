//! Tool session lifecycle: provider process, handshake, registry.

use std::future::Future;

use tokio::io::AsyncBufRead;
use tracing::{debug, info, warn};

use parley_ai::{ModelClient, ToolCallRequest};
use parley_common::{ParleyError, SessionId, ToolError};
use parley_tools::{
    EndpointDescriptor, ServerInfo, ToolCallResult, ToolProvider, ToolRegistry, ToolTransport,
    TransportOptions,
};

use crate::console::{Console, QueryReader};
use crate::orchestrator::{Conversation, ConversationOptions};

/// `Disconnected` and `Initializing` are the startup phases inside
/// [`Session::start`]; they only show up in logs. A `Session` value exists
/// from `Ready` onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Disconnected,
    Initializing,
    Ready,
    Closed,
}

pub struct Session {
    id: SessionId,
    provider: Box<dyn ToolProvider>,
    registry: ToolRegistry,
    server: ServerInfo,
    state: LifecycleState,
}

impl Session {
    /// Launch the provider and bring the session to `Ready`.
    pub async fn start(
        endpoint: &EndpointDescriptor,
        options: TransportOptions,
    ) -> Result<Self, ToolError> {
        let id = SessionId::new();
        debug!(session = id.short(), state = ?LifecycleState::Disconnected, "starting session");

        let transport = ToolTransport::connect(endpoint, options).await?;
        Self::establish(id, Box::new(transport)).await
    }

    /// Handshake and registry population over an already-connected provider.
    /// On failure the provider is closed before the error is returned.
    pub async fn establish(
        id: SessionId,
        provider: Box<dyn ToolProvider>,
    ) -> Result<Self, ToolError> {
        debug!(session = id.short(), state = ?LifecycleState::Initializing, "provider connected");

        let server = match provider.initialize().await {
            Ok(server) => server,
            Err(e) => {
                provider.close().await;
                return Err(e);
            }
        };

        let mut registry = ToolRegistry::new();
        if let Err(e) = registry.refresh(provider.as_ref()).await {
            provider.close().await;
            return Err(e);
        }

        info!(
            session = id.short(),
            server = %server.name,
            tools = ?registry.names(),
            "session ready"
        );

        Ok(Self {
            id,
            provider,
            registry,
            server,
            state: LifecycleState::Ready,
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn server(&self) -> &ServerInfo {
        &self.server
    }

    /// Run one requested tool. Unknown names are rejected without touching
    /// the provider.
    pub async fn call_tool(&self, request: &ToolCallRequest) -> Result<ToolCallResult, ToolError> {
        if self.state != LifecycleState::Ready {
            return Err(ToolError::Transport(format!(
                "session is {:?}",
                self.state
            )));
        }
        if !self.registry.contains(&request.tool_name) {
            return Err(ToolError::NotFound(request.tool_name.clone()));
        }

        debug!(
            session = self.id.short(),
            tool = %request.tool_name,
            call_id = %request.id,
            "calling tool"
        );
        let content = self
            .provider
            .call_tool(&request.tool_name, request.arguments.clone())
            .await?;

        Ok(ToolCallResult {
            tool_call_id: request.id.clone(),
            content,
        })
    }

    /// Close the provider. Only the first call does anything.
    pub async fn stop(&mut self) {
        if self.state == LifecycleState::Closed {
            return;
        }
        self.provider.close().await;
        self.state = LifecycleState::Closed;
        info!(session = self.id.short(), "session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state != LifecycleState::Closed {
            // The transport kills its child on drop.
            warn!(session = self.id.short(), "session dropped without stop");
        }
    }
}

/// Start a session, run the chat loop on it, and stop it on every exit path.
pub async fn run_session<R, I>(
    endpoint: &EndpointDescriptor,
    transport: TransportOptions,
    model: &dyn ModelClient,
    options: ConversationOptions,
    console: Console,
    input: &mut QueryReader<R>,
    interrupt: I,
) -> Result<(), ParleyError>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = ()>,
{
    let session = Session::start(endpoint, transport).await?;
    converse(session, model, options, console, input, interrupt).await
}

/// Run the chat loop on a ready session, then stop it whatever the outcome.
pub async fn converse<R, I>(
    mut session: Session,
    model: &dyn ModelClient,
    options: ConversationOptions,
    console: Console,
    input: &mut QueryReader<R>,
    interrupt: I,
) -> Result<(), ParleyError>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = ()>,
{
    info!(
        session = session.id().short(),
        server = %session.server().name,
        server_version = %session.server().version,
        tools = session.registry().len(),
        "conversation started"
    );

    let result = {
        let mut conversation = Conversation::new(model, &session, options, console);
        let result = conversation.run(input, interrupt).await;
        conversation.report_usage();
        result
    };

    session.stop().await;
    result
}
