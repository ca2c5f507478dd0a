//! End-to-end compiles of `fixtures/site/`.

use async_trait::async_trait;
use serde_json::{Value, json};
use site_compiler::components::{CompileOutput, ComponentCompiler, ComponentError};
use site_compiler::config::JobConfig;
use site_compiler::content::LocalContentClient;
use site_compiler::context::CompileContext;
use site_compiler::reporter::Reporter;
use site_compiler::site::{RunSummary, SiteCompiler};
use site_compiler::types::ComponentInstance;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    _tmp: TempDir,
    site: PathBuf,
    out: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let site = tmp.path().join("site");
        let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
        copy_dir(&src, &site);
        let out = tmp.path().join("dist");
        Self {
            _tmp: tmp,
            site,
            out,
        }
    }

    fn job(&self) -> JobConfig {
        JobConfig::new(&self.site, &self.out)
    }

    fn write_json(&self, relative: &str, value: Value) {
        fs::write(self.site.join(relative), value.to_string()).unwrap();
    }

    fn read_page(&self, relative: &str) -> String {
        fs::read_to_string(self.out.join(relative))
            .unwrap_or_else(|e| panic!("{relative}: {e}"))
    }
}

fn copy_dir(src: &Path, dst: &Path) {
    fs::create_dir_all(dst).unwrap();
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let target = dst.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

fn client(fixture: &Fixture) -> LocalContentClient {
    LocalContentClient::new(fixture.site.join("content"), "/site/demo/content")
}

async fn compile(fixture: &Fixture, reporter: &Reporter) -> RunSummary {
    let job = fixture.job();
    let client = client(fixture);
    SiteCompiler::new(&job, reporter)
        .with_content(&client)
        .run()
        .await
        .unwrap()
}

fn render_info(html: &str) -> Value {
    let start = html
        .find("id=\"scsRenderInfo\">")
        .map(|i| i + "id=\"scsRenderInfo\">".len())
        .expect("render info present");
    let end = start + html[start..].find("</script>").unwrap();
    serde_json::from_str(&html[start..end]).unwrap()
}

#[tokio::test]
async fn compiles_fixture_site() {
    let fixture = Fixture::new();
    let reporter = Reporter::new();
    let summary = compile(&fixture, &reporter).await;

    assert!(summary.success, "{:?}", reporter.render_report());
    assert_eq!(summary.pages_written, 3);
    assert_eq!(summary.detail_pages_written, 1);

    let home = fixture.read_page("index.html");
    assert!(home.contains("<title>Home | demo</title>"));
    assert!(home.contains("<h1 id=\"headline\">Welcome home</h1>"));
    assert!(home.contains("<p class=\"banner\">Demo site</p>"));
    assert!(home.contains("href=\"/site/demo/about.html\""));
    assert!(home.contains("Hello <b>there</b>"));
    assert!(home.contains("/site/demo/cars/detail/Car/C1/blue-car"));
    assert!(!home.contains("SCS_"));
    assert!(home.contains("src=\"/site/demo/_bootstrap/en.js\""));

    let about = fixture.read_page("about.html");
    assert!(about.contains("We build <i>things</i>."));
    assert!(about.contains("<body class=\"scs-page-"));
    assert!(about.contains(" p{ color: #333; }"));

    let detail = fixture.read_page("cars/detail/Car/C1/blue-car");
    assert!(detail.contains("Blue Car"));
    assert!(detail.contains("href=\"/site/demo/index.html\""));

    let bootstrap = fixture.read_page("_bootstrap/en.js");
    assert!(bootstrap.contains("\"siteName\":\"demo\""));
}

#[tokio::test]
async fn no_link_button_has_no_href_and_hydrates() {
    let fixture = Fixture::new();
    let reporter = Reporter::new();
    compile(&fixture, &reporter).await;

    let home = fixture.read_page("index.html");
    let anchor_start = home.find("<a class=\"scs-button-button\"").unwrap();
    let anchor = &home[anchor_start..anchor_start + home[anchor_start..].find('>').unwrap()];
    assert!(!anchor.contains("href"));
    assert!(home.contains("<span class=\"scs-button-text\">Go</span>"));

    let info = render_info(&home);
    assert_eq!(info["components"]["go"]["hydrate"], json!(true));
    assert_eq!(info["components"]["welcome"]["hydrate"], json!(false));
}

struct Broken;

#[async_trait]
impl ComponentCompiler for Broken {
    async fn compile(
        &self,
        _instance: &ComponentInstance,
        _ctx: &CompileContext<'_>,
    ) -> Result<CompileOutput, ComponentError> {
        Err(ComponentError::InvalidData("broken on purpose".into()))
    }
}

#[tokio::test]
async fn failing_component_spares_siblings_and_other_pages() {
    let fixture = Fixture::new();
    fixture.write_json(
        "pages/100.json",
        json!({
            "properties": {"title": "Home", "pageLayout": "index"},
            "slots": {"main": {"components": ["bad", "go"]}},
            "componentInstances": {
                "bad": {"type": "x-broken", "data": {}},
                "go": {"type": "scs-button", "data": {"text": "Go", "linkType": "no-link"}}
            }
        }),
    );
    let job = fixture.job();
    let client = client(&fixture);
    let reporter = Reporter::new();
    let mut compiler = SiteCompiler::new(&job, &reporter).with_content(&client);
    compiler
        .components_mut()
        .register("x-broken", Arc::new(Broken), true);
    let summary = compiler.run().await.unwrap();

    assert!(!summary.success);
    assert!(reporter.has_errors());
    assert!(fixture.read_page("index.html").contains("Go"));
    assert!(fixture.read_page("about.html").contains("things"));
    assert!(
        reporter
            .render_report()
            .iter()
            .any(|line| line.contains("broken on purpose"))
    );
}

#[tokio::test]
async fn same_item_requested_twice_yields_one_detail_page() {
    let fixture = Fixture::new();
    fixture.write_json(
        "pages/200.json",
        json!({
            "properties": {"title": "About", "pageLayout": "index"},
            "slots": {"main": {"components": ["a", "b"]}},
            "componentInstances": {
                "a": {"type": "scs-contentitem", "data": {"contentId": "C1"}},
                "b": {"type": "scs-contentitem", "data": {"contentId": "C1", "detailPageId": 300}}
            }
        }),
    );
    let reporter = Reporter::new();
    let summary = compile(&fixture, &reporter).await;
    assert!(summary.success, "{:?}", reporter.render_report());
    assert_eq!(summary.detail_pages_written, 1);
}

#[tokio::test]
async fn locale_overlay_compiles_into_alias_folder() {
    let fixture = Fixture::new();
    fixture.write_json(
        "fr-FR_structure.json",
        json!({"base": {"pages": [{"id": 200, "pageUrl": "a-propos.html"}]}}),
    );
    fixture.write_json(
        "fr-FR_siteinfo.json",
        json!({"base": {"properties": {"localeAliases": {"fr-FR": "fr"}}}}),
    );
    fixture.write_json(
        "pages/fr-FR_100.json",
        json!({
            "properties": {"title": "Accueil"},
            "componentInstances": {"go": {"data": {"text": "Allez"}}}
        }),
    );
    let reporter = Reporter::new();
    let summary = compile(&fixture, &reporter).await;
    assert!(summary.success, "{:?}", reporter.render_report());

    let home = fixture.read_page("index.html");
    assert!(home.contains(">Go<"));
    let fr = fixture.read_page("fr/index.html");
    assert!(fr.contains("<title>Accueil | demo</title>"));
    assert!(fr.contains(">Allez<"));
    assert!(fr.contains("href=\"a-propos.html\""));
    assert!(fixture.out.join("fr/a-propos.html").exists());
}

#[tokio::test]
async fn page_selection_limits_output() {
    let fixture = Fixture::new();
    let mut job = fixture.job();
    job.pages = vec!["200".into()];
    let client = client(&fixture);
    let reporter = Reporter::new();
    let summary = SiteCompiler::new(&job, &reporter)
        .with_content(&client)
        .run()
        .await
        .unwrap();
    assert_eq!(summary.pages_written, 1);
    assert!(fixture.out.join("about.html").exists());
    assert!(!fixture.out.join("index.html").exists());
}

fn home_hidden_on_mobile(fixture: &Fixture) {
    fixture.write_json(
        "pages/100.json",
        json!({
            "properties": {"title": "Home", "pageLayout": "index"},
            "slots": {"main": {"components": ["welcome", "go"]}},
            "componentInstances": {
                "welcome": {"type": "scs-title", "data": {"text": "Desktop only", "visibleOnMobile": false}},
                "go": {"type": "scs-button", "data": {"text": "Go", "linkType": "no-link"}}
            }
        }),
    );
}

fn assert_device_variants(fixture: &Fixture) {
    let desktop = fixture.read_page("index.html");
    assert!(desktop.contains("scs-title-bounding-box"));
    assert_eq!(render_info(&desktop)["device"], json!("desktop"));

    // The instance stays in the page model; only its markup is dropped.
    let mobile = fixture.read_page("mobile/index.html");
    assert!(mobile.contains("<div id=\"welcome\"></div>"));
    assert!(!mobile.contains("scs-title-bounding-box"));
    assert!(mobile.contains(">Go<"));
    let info = render_info(&mobile);
    assert_eq!(info["device"], json!("mobile"));
    assert!(info["components"].get("welcome").is_none());
    assert!(fixture.out.join("mobile/about.html").exists());
}

#[tokio::test]
async fn mobile_pass_writes_under_mobile_and_honors_visibility() {
    let fixture = Fixture::new();
    home_hidden_on_mobile(&fixture);
    let mut job = fixture.job();
    job.mobile = true;
    let client = client(&fixture);
    let reporter = Reporter::new();
    let summary = SiteCompiler::new(&job, &reporter)
        .with_content(&client)
        .run()
        .await
        .unwrap();

    assert!(summary.success, "{:?}", reporter.render_report());
    assert_eq!(summary.pages_written, 6);
    assert_device_variants(&fixture);
}

#[tokio::test]
async fn folder_mobile_rule_enables_mobile_pass() {
    let fixture = Fixture::new();
    home_hidden_on_mobile(&fixture);
    fixture.write_json("_folder.json", json!({"mobileUserAgents": ["iPhone"]}));
    let reporter = Reporter::new();
    let summary = compile(&fixture, &reporter).await;

    assert!(summary.success, "{:?}", reporter.render_report());
    assert_eq!(summary.pages_written, 6);
    assert_device_variants(&fixture);
}
