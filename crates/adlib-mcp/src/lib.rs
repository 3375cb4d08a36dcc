//! Ad Library MCP Server
//!
//! Model Context Protocol server that exposes Meta Ad Library research and
//! the local media cache as tools for AI assistants (Claude Desktop, Cursor, etc.)

pub mod handlers;
pub mod prompts;
pub mod server;
pub mod tools;

pub use handlers::AdLibraryHandlers;
pub use server::AdLibraryService;
