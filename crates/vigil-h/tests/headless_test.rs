use serial_test::serial;
use vigil_engine::host::{DataClearer, DataScope, GLOBAL_CATEGORIES, PageContext};
use vigil_engine::recovery::detect;
use vigil_h::ChromiumHost;

async fn launch() -> Option<ChromiumHost> {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::INFO)
        .try_init()
        .ok();

    let mut host = ChromiumHost::new(false);
    match host.launch().await {
        Ok(_) => Some(host),
        Err(e) => {
            eprintln!("Failed to launch browser (is Chromium installed?): {}", e);
            None
        }
    }
}

#[tokio::test]
#[serial]
async fn test_reads_element_text_and_title() {
    let Some(mut host) = launch().await else {
        return;
    };

    let html = concat!(
        "<html><head><title>Item 42</title></head>",
        "<body><span id='price'>In Stock</span></body></html>"
    );
    host.navigate(&format!("data:text/html,{}", html))
        .await
        .expect("Navigation failed");

    assert_eq!(host.title().await.unwrap(), "Item 42");
    assert_eq!(
        host.element_text("#price").await.unwrap().as_deref(),
        Some("In Stock")
    );
    assert_eq!(host.element_text("#missing").await.unwrap(), None);
    assert!(host.tab_id().await.is_some());

    PageContext::reload(&host).await.expect("Reload failed");
    assert_eq!(
        host.element_text("#price").await.unwrap().as_deref(),
        Some("In Stock")
    );

    host.close().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_forbidden_page_is_detected() {
    let Some(mut host) = launch().await else {
        return;
    };

    let html = concat!(
        "<html><head><title>403 Forbidden</title></head>",
        "<body><h1>Access Denied</h1></body></html>"
    );
    host.navigate(&format!("data:text/html,{}", html))
        .await
        .expect("Navigation failed");

    let title = host.title().await.unwrap();
    let body = host.body_text().await.unwrap();
    assert!(detect(&title, &body));

    host.clear_cookies_all().await.expect("Cookie clear failed");

    host.close().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_isolated_context_becomes_active_tab() {
    let Some(mut host) = launch().await else {
        return;
    };

    let blocked = host.tab_id().await.expect("no active tab");
    let html = "<html><head><title>Item 42</title></head><body>Restocked</body></html>";
    let reopened = host
        .open_isolated_context(&format!("data:text/html,{}", html))
        .await
        .expect("Isolated context failed");

    assert_ne!(reopened, blocked);
    assert_eq!(host.tab_id().await, Some(reopened));
    host.close_context(&blocked).await.expect("Close failed");
    assert!(host.url().await.is_ok());

    host.close().await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_global_clear_without_web_origins() {
    let Some(mut host) = launch().await else {
        return;
    };

    // Only about:blank is open, so nothing origin-bound is cleared.
    host.clear_browsing_data(DataScope::Global, GLOBAL_CATEGORIES)
        .await
        .expect("Global clear failed");

    host.close().await.unwrap();
}
