//! MCP tool surface: three generic tools over the dispatcher.

use crate::dispatch::Dispatcher;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, ErrorData, Implementation, JsonObject, ServerCapabilities, ServerInfo,
};
use rmcp::{ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use std::fmt::Write as _;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MakeApiRequestParams {
    /// Service name, e.g. `Customers`, `Catalog` or `Payments` (case-insensitive)
    pub service: String,
    /// Method name within the service, e.g. `list`, `search` or `createImage`
    pub method: String,
    /// Path parameters, query parameters and body fields in one flat object. For file uploads,
    /// file fields hold a local file path.
    #[serde(default)]
    pub request: Option<JsonObject>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TypeInfoParams {
    /// Service name (case-insensitive)
    pub service: String,
    /// Method name within the service
    pub method: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ServiceInfoParams {
    /// Service name (case-insensitive)
    pub service: String,
}

#[derive(Clone)]
pub struct CommerceMcpServer {
    dispatcher: Dispatcher,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl CommerceMcpServer {
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            tool_router: Self::tool_router(),
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[tool(
        annotations(open_world_hint = true),
        description = "Call a commerce API endpoint. Pick the service and method with get_service_info, check the arguments with get_type_info, then pass path parameters, query parameters and body fields together in `request`. Returns the raw JSON response body as text."
    )]
    async fn make_api_request(
        &self,
        Parameters(params): Parameters<MakeApiRequestParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self
            .dispatcher
            .execute_call(&params.service, &params.method, params.request)
            .await)
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "Describe the request type of a service method as a JSON Schema: field names, types and which fields are required."
    )]
    async fn get_type_info(
        &self,
        Parameters(params): Parameters<TypeInfoParams>,
    ) -> Result<CallToolResult, ErrorData> {
        let TypeInfoParams { service, method } = params;
        Ok(self.dispatcher.describe_type(&service, &method))
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "List the methods of a service with a short description of each."
    )]
    async fn get_service_info(
        &self,
        Parameters(params): Parameters<ServiceInfoParams>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(self.dispatcher.describe_service(&params.service))
    }

    fn instructions(&self) -> String {
        let registry = self.dispatcher.registry();
        let mut out = String::from(
            "Commerce platform API bridge.\nFLOW: get_service_info -> get_type_info -> make_api_request.\nSERVICES:\n",
        );
        for service in registry.endpoints().services() {
            let _ = writeln!(out, "- {}: {}", service.name(), service.description());
        }
        if self.dispatcher.policy().disallow_writes {
            out.push_str("WRITES ARE DISABLED: only read and search methods will succeed.\n");
        }
        out
    }
}

#[tool_handler]
impl ServerHandler for CommerceMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(self.instructions()),
            ..Default::default()
        }
    }
}
