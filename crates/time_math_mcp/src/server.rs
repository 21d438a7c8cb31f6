use rmcp::{
    RoleServer, ServerHandler,
    handler::server::{
        router::{prompt::PromptRouter, tool::ToolRouter},
        wrapper::Parameters,
    },
    model::*,
    prompt, prompt_handler, prompt_router,
    service::RequestContext,
    tool, tool_handler, tool_router,
};

use crate::core::provider::TimeMathServer;
use crate::core::{error::McpResult, models::TimeMathRequest};

/// Available resource URIs for the Time Math MCP Server
pub const AVAILABLE_RESOURCES: &[&str] = &[
    "time-math://status",
    "time-math://help",
    "time-math://operations",
];

/// Time Math MCP Server with batch time-arithmetic operations
#[derive(Clone)]
pub struct TimeMathService {
    time_server: TimeMathServer,
    local_timezone_name: String, // Cache this
    tool_router: ToolRouter<TimeMathService>,
    prompt_router: PromptRouter<TimeMathService>,
}

impl TimeMathService {
    pub fn new() -> Self {
        let time_server = TimeMathServer::new();
        let local_timezone_name = time_server.local_timezone.to_string();

        Self {
            time_server,
            local_timezone_name,
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }

    fn create_resource_text(&self, uri: &str, name: &str) -> Resource {
        RawResource::new(uri, name.to_string()).no_annotation()
    }

    pub(crate) fn get_local_timezone_name(&self) -> &str {
        &self.local_timezone_name
    }

    fn generate_status_content(&self) -> String {
        format!(
            r#"Time Math MCP Server Status

Server: Running
Local Timezone: {}
Debug Metadata: {}
Tools Available: 1
Prompts Available: 1
Resources Available: 3

Capabilities:
- Calendar-aware add/subtract over one or many timestamps
- Pairwise, cross-product and aggregate batch interactions
- Timestamp statistics (dispersion, intervals) and chronological sorting
- Partial-failure reporting inside pairwise batches"#,
            self.local_timezone_name,
            if debug_enabled() { "enabled" } else { "disabled" }
        )
    }

    fn generate_help_content(&self) -> String {
        format!(
            r#"Time Math MCP Server Help

TOOL: time_math

Arguments:
- operation (required): add | subtract | diff | duration_between | stats | sort
- interaction_mode: single_to_single | single_to_many | many_to_single |
  pairwise | cross_product | aggregate | auto_detect (default)
- base_time: timestamp string or array; defaults to the current instant
- compare_time: timestamp string or array (pairing operations)
- timezone: IANA zone for interpreting zone-less inputs (default: local)
- compare_time_timezone: overrides timezone for the compare sequence
- years, months, days, hours, minutes, seconds: signed units for add/subtract

TIMESTAMP FORMATS:
- RFC 3339: '2024-03-15T10:30:00Z', '2024-03-15T10:30:00+02:00'
- Zone-less: '2024-03-15T10:30:00', '2024-03-15 10:30', '2024-03-15'
  (interpreted as wall-clock time in the request timezone)
- A string containing a JSON array literal is expanded into a batch

BATCHING:
- Up to 10000 units of work per request
- Pairwise batches keep going when individual elements fail; each failing
  index carries an error object alongside its echoed inputs
- Single results are returned bare; batches as {{count, results}}

EXAMPLE USAGE:

Add one month to a date:
```json
{{
  "operation": "add",
  "base_time": "2024-01-31T12:00:00Z",
  "months": 1
}}
```

Pairwise differences:
```json
{{
  "operation": "diff",
  "base_time": ["2024-01-01T10:00:00Z", "2024-01-02T10:00:00Z"],
  "compare_time": ["2024-01-01T12:00:00Z", "2024-01-02T16:00:00Z"]
}}
```

Interval statistics:
```json
{{
  "operation": "stats",
  "base_time": ["2024-01-01T00:00:00Z", "2024-01-03T00:00:00Z", "2024-01-08T00:00:00Z"]
}}
```

LOCAL TIMEZONE: {}

DEBUG METADATA:
- Set TIME_MATH_DEBUG=1 to attach a verbose block (computation wall-clock,
  resolution zone) to every response."#,
            self.local_timezone_name
        )
    }

    fn generate_operations_content(&self) -> &'static str {
        r#"Time Math Operations

add / subtract:
- Applies the signed duration units to every element of base_time (and
  compare_time, when present)
- Calendar units cascade through variable month lengths; Jan 31 + 1 month
  clamps to the last day of February
- At least one duration unit is required

diff:
- compare minus base, decomposed into days, hours, minutes, seconds and
  milliseconds (cascading remainders) plus the exact signed millisecond delta

duration_between:
- Like diff, but additionally breaks out whole calendar years and months and
  renders a human-readable form such as "1 year, 2 months, 5 days"

stats:
- Without compare_time: earliest/latest/mean/median instants, population
  standard deviation, and statistics over the intervals between
  chronologically consecutive points (requires at least 2 timestamps)
- With compare_time: min/max/mean/median/standard deviation/total over the
  index-wise compare - base durations (requires at least 2 pairs)

sort:
- Stable chronological ordering with three parallel views (input strings,
  canonical strings, unix milliseconds) and span metadata

INTERACTION MODES:
- auto_detect resolves from the sequence sizes: one-and-one pairs singly,
  one-to-many fans out, many-to-one fans in, many-and-many goes pairwise
- pairwise truncates both sequences to the shorter length
- cross_product pairs every base element with every compare element,
  base-major
- aggregate pairs like pairwise but returns one statistics summary"#
    }
}

impl Default for TimeMathService {
    fn default() -> Self {
        Self::new()
    }
}

/// Debug flag from the caller's environment, read once per request.
fn debug_enabled() -> bool {
    match std::env::var("TIME_MATH_DEBUG") {
        Ok(value) => {
            let value = value.trim().to_ascii_lowercase();
            !(value.is_empty() || value == "0" || value == "false")
        }
        Err(_) => false,
    }
}

#[tool_router]
impl TimeMathService {
    #[tool(
        description = "Batch time arithmetic: add/subtract calendar durations, compute differences and duration breakdowns, timestamp statistics, and chronological sorting over one or many timestamps"
    )]
    pub(crate) async fn time_math(
        &self,
        Parameters(req): Parameters<TimeMathRequest>,
    ) -> McpResult<CallToolResult> {
        let result = self.time_server.execute(&req, debug_enabled())?;
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&result).unwrap(),
        )]))
    }
}

#[prompt_router]
impl TimeMathService {
    /// Generate guidance for effective batch time arithmetic
    #[prompt(name = "time_math_guidance")]
    async fn time_math_guidance(
        &self,
        _ctx: RequestContext<rmcp::RoleServer>,
    ) -> McpResult<Vec<PromptMessage>> {
        let local_tz = self.get_local_timezone_name();
        let guidance = format!(
            r#"Batch Time Arithmetic Best Practices:

1. **Timestamps**
   - Prefer RFC 3339 with an explicit offset ('2024-03-15T10:30:00Z')
   - Zone-less timestamps are interpreted in the request timezone
   - Your local timezone is detected as: {}

2. **Batching**
   - base_time and compare_time each accept a single string or an array
   - Let auto_detect choose the interaction mode unless you need
     cross_product or aggregate explicitly
   - Pairwise batches report per-index errors without aborting siblings

3. **Calendar Arithmetic**
   - add/subtract needs at least one of years, months, days, hours,
     minutes, seconds
   - Month arithmetic clamps at the end of shorter months
   - Months preserve local wall-clock time across DST; days and smaller
     units are exact elapsed time

4. **Statistics**
   - stats without compare_time summarizes a set of instants
   - stats with compare_time summarizes per-index durations
   - Both need at least 2 samples

5. **Limits and Errors**
   - At most 10000 units of work per request
   - Invalid timezones, unknown operations and empty durations return
     typed errors, never partial results"#,
            local_tz
        );

        Ok(vec![PromptMessage {
            role: PromptMessageRole::Assistant,
            content: PromptMessageContent::text(guidance),
        }])
    }
}

#[tool_handler]
#[prompt_handler]
impl ServerHandler for TimeMathService {
    fn get_info(&self) -> ServerInfo {
        let local_tz = self.get_local_timezone_name();
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_prompts()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(format!(
                "Time Math MCP Server for batch time arithmetic. Tool: time_math (add, subtract, diff, duration_between, stats, sort). Local timezone: {}. Use IANA timezone names.",
                local_tz
            )),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _: RequestContext<rmcp::RoleServer>,
    ) -> McpResult<ListResourcesResult> {
        Ok(ListResourcesResult {
            resources: vec![
                self.create_resource_text("time-math://status", "server-status"),
                self.create_resource_text("time-math://help", "help-documentation"),
                self.create_resource_text("time-math://operations", "operation-reference"),
            ],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _: RequestContext<rmcp::RoleServer>,
    ) -> McpResult<ReadResourceResult> {
        match uri.as_str() {
            "time-math://status" => {
                let status = self.generate_status_content();
                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(status, uri)],
                })
            }
            "time-math://help" => {
                let help = self.generate_help_content();
                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(help, uri)],
                })
            }
            "time-math://operations" => {
                let operations = self.generate_operations_content();
                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(operations, uri)],
                })
            }
            _ => Err(crate::core::error::TimeMathError::ResourceNotFound {
                uri: uri.to_string(),
            }
            .into()),
        }
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _: RequestContext<rmcp::RoleServer>,
    ) -> McpResult<ListResourceTemplatesResult> {
        Ok(ListResourceTemplatesResult {
            next_cursor: None,
            resource_templates: Vec::new(),
        })
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> McpResult<InitializeResult> {
        tracing::info!("Time Math MCP Server initialized successfully");
        Ok(self.get_info())
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    use rmcp::{ServiceExt, transport::stdio};

    let service = TimeMathService::new().serve(stdio()).await.inspect_err(|e| {
        tracing::error!("serving error: {:?}", e);
    })?;

    service.waiting().await?;
    Ok(())
}
