//! The MCP connection pool: single-flighted connects to external tool
//! servers, plus discovery that flattens their tool lists into one
//! LLM-facing set of `<server>/<tool>`-named definitions.

mod discovery;
mod error;
mod pool;
mod transport;

pub use discovery::{discover_tools, ToolDefinition};
pub use error::McpError;
pub use pool::ConnectionPool;
pub use transport::{SubprocessPipeTransport, Transport};
