//! MCP server using rmcp SDK
//!
//! Exposes ad-library research and the media cache as MCP tools over stdio.

use crate::handlers::AdLibraryHandlers;
use crate::tools::*;
use adlib_core::{AppError, ErrorMetadata};
use adlib_infra::ErrorResponse;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::tool::Parameters;
use rmcp::model::*;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

fn text_content(s: impl Into<String>) -> Content {
    Content {
        raw: RawContent::Text(RawTextContent { text: s.into() }),
        annotations: None,
    }
}

#[derive(Clone)]
pub struct AdLibraryService {
    handlers: Arc<AdLibraryHandlers>,
    is_production: bool,
    tool_router: ToolRouter<AdLibraryService>,
}

impl std::fmt::Debug for AdLibraryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdLibraryService")
            .field("is_production", &self.is_production)
            .finish_non_exhaustive()
    }
}

#[tool_router]
impl AdLibraryService {
    pub fn new(handlers: AdLibraryHandlers, is_production: bool) -> Self {
        Self {
            handlers: Arc::new(handlers),
            is_production,
            tool_router: Self::tool_router(),
        }
    }

    fn respond(
        &self,
        result: Result<serde_json::Value, AppError>,
    ) -> Result<CallToolResult, ErrorData> {
        let body = result.map_err(|e| {
            let response = ErrorResponse::from_app_error(&e, self.is_production);
            ErrorData {
                code: ErrorCode(e.rpc_code()),
                message: Cow::from(response.error.clone()),
                data: Some(response.to_json()),
            }
        })?;
        let text = serde_json::to_string(&body).map_err(|e| ErrorData {
            code: ErrorCode(adlib_core::error::RPC_INTERNAL_ERROR),
            message: Cow::from(e.to_string()),
            data: None,
        })?;
        Ok(CallToolResult::success(vec![text_content(text)]))
    }

    #[tool(
        description = "Search the Meta Ad Library for brands and return their Meta Platform IDs. Use this before get_meta_ads."
    )]
    async fn get_meta_platform_id(
        &self,
        Parameters(req): Parameters<GetMetaPlatformIdRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.respond(self.handlers.get_meta_platform_id(req).await)
    }

    #[tool(
        description = "Retrieve currently running ads for a Meta Platform ID, including ad text, media URLs and run dates."
    )]
    async fn get_meta_ads(
        &self,
        Parameters(req): Parameters<GetMetaAdsRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.respond(self.handlers.get_meta_ads(req).await)
    }

    #[tool(
        description = "Download (or load from cache) an ad image and prepare it for objective visual analysis. Returns the image data, an analysis prompt and citation links. Returns the cached analysis directly when one exists."
    )]
    async fn analyze_ad_image(
        &self,
        Parameters(req): Parameters<AnalyzeAdImageRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.respond(self.handlers.analyze_ad_image(req).await)
    }

    #[tool(
        description = "Download (or load from cache) an ad video and prepare it for analysis. Returns the local file path, an analysis prompt and any cached analysis."
    )]
    async fn analyze_ad_video(
        &self,
        Parameters(req): Parameters<AnalyzeAdVideoRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.respond(self.handlers.analyze_ad_video(req).await)
    }

    #[tool(
        description = "Save an analysis for cached ad media so later searches can filter by colors, people and text."
    )]
    async fn save_ad_analysis(
        &self,
        Parameters(req): Parameters<SaveAdAnalysisRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.respond(self.handlers.save_ad_analysis(req).await)
    }

    #[tool(description = "Get media cache statistics: file counts, storage usage and analysis coverage.")]
    async fn get_cache_stats(&self) -> Result<CallToolResult, ErrorData> {
        self.respond(self.handlers.get_cache_stats().await)
    }

    #[tool(
        description = "Search cached ad media by brand, presence of people, dominant color or media kind."
    )]
    async fn search_cached_media(
        &self,
        Parameters(req): Parameters<SearchCachedMediaRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.respond(self.handlers.search_cached_media(req).await)
    }

    #[tool(description = "Remove cached media older than the given number of days and free disk space.")]
    async fn cleanup_media_cache(
        &self,
        Parameters(req): Parameters<CleanupMediaCacheRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        self.respond(self.handlers.cleanup_media_cache(req).await)
    }
}

#[tool_handler]
impl ServerHandler for AdLibraryService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "adlib-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
            instructions: Some(
                "Meta Ad Library research: find a brand's platform id, list its running ads, \
                 prepare ad images and videos for analysis, save analyses and search the local media cache. \
                 Set SCRAPECREATORS_API_KEY for ad-library tools."
                    .to_string(),
            ),
        }
    }
}
