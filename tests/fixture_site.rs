//! Fixture site served over real HTTP

use std::net::{IpAddr, Ipv4Addr};

use conformance::fixture::{corpus, FixtureSite};
use futures_util::future::join_all;
use reqwest::StatusCode;

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

async fn get(site: &FixtureSite, path: &str) -> reqwest::Response {
    reqwest::get(format!("{}{}", site.base_url(), path))
        .await
        .expect("request to fixture site")
}

#[tokio::test]
async fn test_serves_every_page_with_its_content_type() {
    let site = FixtureSite::start(LOOPBACK, 0).await.unwrap();

    for page in corpus::all_pages() {
        let response = get(&site, page.path).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", page.path);

        let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
        assert!(
            content_type.starts_with(page.content_type()),
            "{} served as {}",
            page.path,
            content_type
        );
        assert_eq!(response.text().await.unwrap(), page.render(site.port()));
    }

    site.shutdown().await;
}

#[tokio::test]
async fn test_sitemap_carries_bound_port() {
    let site = FixtureSite::start(LOOPBACK, 0).await.unwrap();

    let body = get(&site, "/sitemap.xml").await.text().await.unwrap();
    assert!(!body.contains(corpus::PORT_PLACEHOLDER));
    assert_eq!(body.matches("<loc>").count(), corpus::html_page_count());
    assert!(body.contains(&format!("http://localhost:{}/products/widget", site.port())));

    let robots = get(&site, "/robots.txt").await.text().await.unwrap();
    assert!(robots.contains(&format!("localhost:{}/sitemap.xml", site.port())));

    site.shutdown().await;
}

#[tokio::test]
async fn test_unknown_path_is_empty_not_found() {
    let site = FixtureSite::start(LOOPBACK, 0).await.unwrap();

    let response = get(&site, "/missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.text().await.unwrap().is_empty());

    let response = get(&site, "/products/").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    site.shutdown().await;
}

#[tokio::test]
async fn test_only_reads_are_allowed() {
    let site = FixtureSite::start(LOOPBACK, 0).await.unwrap();

    let response = reqwest::Client::new()
        .post(format!("{}/contact", site.base_url()))
        .body("email=someone")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    site.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_requests() {
    let site = FixtureSite::start(LOOPBACK, 0).await.unwrap();
    let client = reqwest::Client::new();

    let requests = (0..24).map(|i| {
        let page = &corpus::all_pages()[i % corpus::all_pages().len()];
        let url = format!("{}{}", site.base_url(), page.path);
        let client = client.clone();
        async move { client.get(url).send().await.map(|r| r.status()) }
    });

    for status in join_all(requests).await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }

    site.shutdown().await;
}

#[tokio::test]
async fn test_two_sites_bind_distinct_ports() {
    let first = FixtureSite::start(LOOPBACK, 0).await.unwrap();
    let second = FixtureSite::start(LOOPBACK, 0).await.unwrap();
    assert_ne!(first.port(), second.port());

    let taken = FixtureSite::start(LOOPBACK, first.port()).await;
    assert!(taken.is_err());

    first.shutdown().await;
    second.shutdown().await;
}
