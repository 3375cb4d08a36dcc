use std::sync::Arc;
use std::time::Duration;

use adlib_api_client::{MediaFetcher, ScrapeCreatorsClient};
use adlib_core::{AppError, CacheConfig};
use adlib_mcp::tools::*;
use adlib_mcp::AdLibraryHandlers;
use adlib_services::MediaCacheService;
use serde_json::json;
use tempfile::{tempdir, TempDir};

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

async fn setup(ad_library_url: Option<String>) -> (TempDir, AdLibraryHandlers) {
    let dir = tempdir().unwrap();
    let cache = MediaCacheService::open(CacheConfig::new(dir.path()))
        .await
        .unwrap();
    let ad_library =
        ad_library_url.map(|url| ScrapeCreatorsClient::new(url, "test-key").unwrap());
    let fetcher = MediaFetcher::new(Duration::from_secs(5), 1024 * 1024).unwrap();

    (
        dir,
        AdLibraryHandlers::new(Arc::new(cache), ad_library, fetcher),
    )
}

fn image_request(url: &str) -> AnalyzeAdImageRequest {
    AnalyzeAdImageRequest {
        media_url: url.to_string(),
        brand_name: Some("Nike".to_string()),
        ad_id: Some("111".to_string()),
    }
}

#[tokio::test]
async fn test_analyze_image_downloads_once_then_uses_cache() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/ad.png")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(PNG_BYTES)
        .expect(1)
        .create_async()
        .await;
    let url = format!("{}/ad.png", server.url());
    let (_dir, handlers) = setup(None).await;

    let first = handlers.analyze_ad_image(image_request(&url)).await.unwrap();
    assert_eq!(first["cached"], false);
    assert_eq!(first["cache_info"]["cache_status"], "miss");
    assert_eq!(first["analysis"]["image_data_base64"], "iVBORw0KGgo=");
    assert_eq!(first["analysis"]["image_size_bytes"], PNG_BYTES.len());
    assert_eq!(first["citation_info"]["brand_context"], "**Brand:** Nike");

    let second = handlers.analyze_ad_image(image_request(&url)).await.unwrap();
    assert_eq!(second["cached"], true);
    assert_eq!(second["cache_info"]["cache_status"], "hit");
    assert_eq!(second["analysis"]["image_data_base64"], "iVBORw0KGgo=");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_saved_analysis_is_returned_and_searchable() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/ad.png")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(PNG_BYTES)
        .create_async()
        .await;
    let url = format!("{}/ad.png", server.url());
    let (_dir, handlers) = setup(None).await;

    handlers.analyze_ad_image(image_request(&url)).await.unwrap();

    let analysis = json!({
        "colors": {"dominant_colors": ["red", "white"]},
        "people_description": "Young woman running",
        "text_elements": {"headline_hook": ["Just do it"]},
        "image_data_base64": "AAAA"
    });
    let saved = handlers
        .save_ad_analysis(SaveAdAnalysisRequest {
            media_url: url.clone(),
            analysis: analysis.clone(),
        })
        .await
        .unwrap();
    assert_eq!(saved["quick_filters"]["dominant_colors"], "red,white");
    assert_eq!(saved["quick_filters"]["has_people"], true);

    let cached = handlers.analyze_ad_image(image_request(&url)).await.unwrap();
    assert_eq!(cached["cached"], true);
    assert_eq!(cached["analysis"], analysis);

    let found = handlers
        .search_cached_media(SearchCachedMediaRequest {
            brand_name: Some("Nike".to_string()),
            has_people: Some(true),
            color_contains: Some("red".to_string()),
            media_kind: Some(MediaKindParam::Image),
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(found["count"], 1);
    assert_eq!(found["results"][0]["source_url"], url.as_str());
    assert_eq!(
        found["results"][0]["analysis"]["image_data_base64"],
        "[Image data available]"
    );
}

#[tokio::test]
async fn test_save_analysis_accepts_json_string() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/ad.png")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(PNG_BYTES)
        .create_async()
        .await;
    let url = format!("{}/ad.png", server.url());
    let (_dir, handlers) = setup(None).await;
    handlers.analyze_ad_image(image_request(&url)).await.unwrap();

    let saved = handlers
        .save_ad_analysis(SaveAdAnalysisRequest {
            media_url: url,
            analysis: json!(r#"{"people_description": ""}"#),
        })
        .await
        .unwrap();

    assert_eq!(saved["quick_filters"]["has_people"], false);
}

#[tokio::test]
async fn test_save_analysis_for_uncached_url_is_not_found() {
    let (_dir, handlers) = setup(None).await;

    let err = handlers
        .save_ad_analysis(SaveAdAnalysisRequest {
            media_url: "https://cdn.example.com/never-seen.jpg".to_string(),
            analysis: json!({"overall_description": "a shoe"}),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_save_analysis_rejects_non_object() {
    let (_dir, handlers) = setup(None).await;

    let err = handlers
        .save_ad_analysis(SaveAdAnalysisRequest {
            media_url: "https://cdn.example.com/a.jpg".to_string(),
            analysis: json!([1, 2, 3]),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::MalformedAnalysis(_)));
}

#[tokio::test]
async fn test_analyze_image_rejects_video_content() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/clip.mp4")
        .with_status(200)
        .with_header("content-type", "video/mp4")
        .with_body(vec![0u8; 32])
        .create_async()
        .await;
    let (_dir, handlers) = setup(None).await;

    let err = handlers
        .analyze_ad_image(image_request(&format!("{}/clip.mp4", server.url())))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidInput(_)));
    let stats = handlers.get_cache_stats().await.unwrap();
    assert_eq!(stats["total_files"], 0);
}

#[tokio::test]
async fn test_analyze_image_redownloads_missing_blob() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/ad.png")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(PNG_BYTES)
        .expect(2)
        .create_async()
        .await;
    let url = format!("{}/ad.png", server.url());
    let (dir, handlers) = setup(None).await;

    handlers.analyze_ad_image(image_request(&url)).await.unwrap();
    for entry in std::fs::read_dir(dir.path().join("media")).unwrap() {
        std::fs::remove_file(entry.unwrap().path()).unwrap();
    }

    let again = handlers.analyze_ad_image(image_request(&url)).await.unwrap();
    assert_eq!(again["cached"], false);
    assert_eq!(again["analysis"]["image_data_base64"], "iVBORw0KGgo=");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_analyze_video_returns_local_path() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/clip.mp4")
        .with_status(200)
        .with_header("content-type", "video/mp4")
        .with_body(vec![7u8; 64])
        .create_async()
        .await;
    let url = format!("{}/clip.mp4", server.url());
    let (_dir, handlers) = setup(None).await;

    let response = handlers
        .analyze_ad_video(AnalyzeAdVideoRequest {
            media_url: url.clone(),
            brand_name: Some("Nike".to_string()),
            ad_id: None,
            duration_seconds: Some(15.0),
        })
        .await
        .unwrap();

    assert_eq!(response["cached"], false);
    assert_eq!(response["analysis"]["video_size_bytes"], 64);
    assert_eq!(response["analysis"]["duration_seconds"], 15.0);
    let local_path = response["analysis"]["local_path"].as_str().unwrap();
    assert!(local_path.ends_with(".mp4"));
    assert_eq!(std::fs::read(local_path).unwrap(), vec![7u8; 64]);

    let stats = handlers.get_cache_stats().await.unwrap();
    assert_eq!(stats["video_count"], 1);
    assert_eq!(stats["image_count"], 0);
}

#[tokio::test]
async fn test_cleanup_with_zero_days_clears_cache() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/ad.png")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(PNG_BYTES)
        .create_async()
        .await;
    let (_dir, handlers) = setup(None).await;
    handlers
        .analyze_ad_image(image_request(&format!("{}/ad.png", server.url())))
        .await
        .unwrap();

    let response = handlers
        .cleanup_media_cache(CleanupMediaCacheRequest {
            max_age_days: Some(0),
        })
        .await
        .unwrap();

    assert_eq!(response["report"]["removed_count"], 1);
    assert_eq!(response["report"]["remaining_count"], 0);
    assert_eq!(response["report"]["max_age_days"], 0);
}

#[tokio::test]
async fn test_search_rejects_zero_limit() {
    let (_dir, handlers) = setup(None).await;

    let err = handlers
        .search_cached_media(SearchCachedMediaRequest {
            brand_name: None,
            has_people: None,
            color_contains: None,
            media_kind: None,
            limit: Some(0),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_ad_library_tools_require_api_key() {
    let (_dir, handlers) = setup(None).await;

    let err = handlers
        .get_meta_platform_id(GetMetaPlatformIdRequest {
            brand_name: "Nike".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_get_meta_platform_id() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/facebook/adLibrary/search/companies")
        .match_query(mockito::Matcher::UrlEncoded("query".into(), "Nike".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"searchResults":[{"name":"Nike","page_id":"15087023444"}]}"#)
        .create_async()
        .await;
    let (_dir, handlers) = setup(Some(server.url())).await;

    let response = handlers
        .get_meta_platform_id(GetMetaPlatformIdRequest {
            brand_name: "  Nike ".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(response["total_results"], 1);
    assert_eq!(response["platform_ids"]["Nike"], "15087023444");
}

#[tokio::test]
async fn test_get_meta_ads_validates_before_calling_api() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/facebook/adLibrary/company/ads")
        .match_query(mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let (_dir, handlers) = setup(Some(server.url())).await;

    let err = handlers
        .get_meta_ads(GetMetaAdsRequest {
            platform_id: "42".to_string(),
            limit: Some(10),
            country: Some("USA".to_string()),
            trim: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let err = handlers
        .get_meta_ads(GetMetaAdsRequest {
            platform_id: "42".to_string(),
            limit: Some(0),
            country: None,
            trim: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_meta_ads_maps_upstream_errors() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/facebook/adLibrary/company/ads")
        .match_query(mockito::Matcher::Any)
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;
    let (_dir, handlers) = setup(Some(server.url())).await;

    let err = handlers
        .get_meta_ads(GetMetaAdsRequest {
            platform_id: "42".to_string(),
            limit: None,
            country: Some("us".to_string()),
            trim: Some(false),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Upstream(_)));
}
