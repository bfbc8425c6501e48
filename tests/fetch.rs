mod common;

use common::{Fakes, FakeHttp};
use undercov::config::RepoConfig;
use undercov::error::FailureKind;
use undercov::fetch::FetchOutcome;
use undercov::http::HttpResponse;
use undercov::model::CoverageReference;
use undercov::page::PageType;

const PAGE: &str = "https://github.com/acme/widgets/tree/main";
const MAIN_REPORT: &str = "https://cov.acme.dev/main/coverage-final.json";

fn main_ref() -> CoverageReference {
    CoverageReference::new("main").unwrap()
}

async fn fetch(fakes: &Fakes, repo: &RepoConfig, page_type: Option<PageType>) -> FetchOutcome {
    fakes
        .fetcher()
        .fetch(&main_ref(), page_type, Some(repo), PAGE)
        .await
}

#[tokio::test]
async fn report_on_success() {
    let fakes = Fakes::new(PAGE, FakeHttp::new([HttpResponse::new(200, "{}")]), false);
    let outcome = fetch(&fakes, &common::repo_config(), Some(PageType::Tree)).await;

    let FetchOutcome::Report(raw) = outcome else {
        panic!("expected a report, got {outcome:?}");
    };
    assert_eq!(raw.url, MAIN_REPORT);
    assert_eq!(raw.body, b"{}");
    assert_eq!(fakes.http.requests(), vec![MAIN_REPORT]);
    assert!(fakes.permissions.requests().is_empty());
}

#[tokio::test]
async fn granted_permission_retries_once() {
    let http = FakeHttp::new([HttpResponse::unreachable(), HttpResponse::new(200, "{}")]);
    let fakes = Fakes::new(PAGE, http, true);
    let outcome = fetch(&fakes, &common::repo_config(), Some(PageType::Tree)).await;

    assert!(matches!(outcome, FetchOutcome::Report(_)), "{outcome:?}");
    assert_eq!(fakes.http.requests(), vec![MAIN_REPORT, MAIN_REPORT]);
    assert_eq!(fakes.permissions.requests(), vec!["https://cov.acme.dev"]);
}

#[tokio::test]
async fn denied_permission_does_not_retry() {
    let fakes = Fakes::new(PAGE, FakeHttp::new([HttpResponse::unreachable()]), false);
    let outcome = fetch(&fakes, &common::repo_config(), Some(PageType::Tree)).await;

    assert!(matches!(
        outcome,
        FetchOutcome::Empty(FailureKind::NetworkUnreachable)
    ));
    assert_eq!(fakes.http.requests().len(), 1);
    assert_eq!(fakes.permissions.requests().len(), 1);
}

#[tokio::test]
async fn unreachable_after_grant_gives_up() {
    let http = FakeHttp::new([HttpResponse::unreachable(), HttpResponse::unreachable()]);
    let fakes = Fakes::new(PAGE, http, true);
    let outcome = fetch(&fakes, &common::repo_config(), Some(PageType::Tree)).await;

    assert!(matches!(
        outcome,
        FetchOutcome::Empty(FailureKind::NetworkUnreachable)
    ));
    assert_eq!(fakes.http.requests().len(), 2);
    assert_eq!(fakes.permissions.requests().len(), 1);
}

#[tokio::test]
async fn forbidden_redirects_to_auth_with_marker() {
    let fakes = Fakes::new(PAGE, FakeHttp::new([HttpResponse::new(403, "")]), false);
    let outcome = fetch(&fakes, &common::repo_config(), Some(PageType::Tree)).await;

    let expected = "https://cov.acme.dev/login?next=https://github.com/acme/widgets/tree/main?undercov_auth=1";
    let FetchOutcome::Redirected { url } = outcome else {
        panic!("expected a redirect, got {outcome:?}");
    };
    assert_eq!(url, expected);
    assert_eq!(fakes.navigator.navigations(), vec![expected]);

    let notices = fakes.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert!(!notices[0].persistent);
}

#[tokio::test]
async fn forbidden_after_redirect_reports_failure() {
    // The navigator still shows the unmarked page; the marker comes from the page passed in.
    let page = "https://github.com/acme/widgets/tree/main?undercov_auth=1";
    let fakes = Fakes::new(PAGE, FakeHttp::new([HttpResponse::new(403, "")]), false);
    let outcome = fakes
        .fetcher()
        .fetch(&main_ref(), Some(PageType::Tree), Some(&common::repo_config()), page)
        .await;

    assert!(matches!(outcome, FetchOutcome::Empty(FailureKind::AuthRequired)));
    assert!(fakes.navigator.navigations().is_empty());
    let notices = fakes.notifier.notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].persistent);
}

#[tokio::test]
async fn forbidden_without_auth_template_is_a_server_error() {
    let repo = RepoConfig {
        auth_url_template: Some(String::new()),
        ..common::repo_config()
    };
    let fakes = Fakes::new(PAGE, FakeHttp::new([HttpResponse::new(403, "")]), false);
    let outcome = fetch(&fakes, &repo, Some(PageType::Tree)).await;

    assert!(matches!(
        outcome,
        FetchOutcome::Empty(FailureKind::ServerError(403))
    ));
    assert!(fakes.navigator.navigations().is_empty());
}

#[tokio::test]
async fn server_error() {
    let fakes = Fakes::new(PAGE, FakeHttp::new([HttpResponse::new(500, "boom")]), true);
    let outcome = fetch(&fakes, &common::repo_config(), Some(PageType::Tree)).await;

    assert!(matches!(
        outcome,
        FetchOutcome::Empty(FailureKind::ServerError(500))
    ));
    assert!(fakes.permissions.requests().is_empty());
}

#[tokio::test]
async fn forbidden_after_permission_grant_still_redirects() {
    let http = FakeHttp::new([HttpResponse::unreachable(), HttpResponse::new(403, "")]);
    let fakes = Fakes::new(PAGE, http, true);
    let outcome = fetch(&fakes, &common::repo_config(), Some(PageType::Tree)).await;

    assert!(matches!(outcome, FetchOutcome::Redirected { .. }), "{outcome:?}");
    assert_eq!(fakes.navigator.navigations().len(), 1);
}

#[tokio::test]
async fn pull_requests_use_the_pr_template() {
    let fakes = Fakes::new(PAGE, FakeHttp::new([HttpResponse::new(200, "{}")]), false);
    let reference = CoverageReference::new("42").unwrap();
    fakes
        .fetcher()
        .fetch(&reference, Some(PageType::Pull), Some(&common::repo_config()), PAGE)
        .await;

    assert_eq!(
        fakes.http.requests(),
        vec!["https://cov.acme.dev/pr/42/coverage-final.json"]
    );
}

#[tokio::test]
async fn missing_configuration_makes_no_request() {
    let fakes = Fakes::new(PAGE, FakeHttp::new([]), true);
    let outcome = fakes.fetcher().fetch(&main_ref(), None, None, PAGE).await;
    assert!(matches!(outcome, FetchOutcome::Empty(FailureKind::ConfigMissing)));

    let repo = RepoConfig {
        branch_url_template: String::new(),
        ..common::repo_config()
    };
    let outcome = fetch(&fakes, &repo, None).await;
    assert!(matches!(outcome, FetchOutcome::Empty(FailureKind::ConfigMissing)));
    assert!(fakes.http.requests().is_empty());
}
