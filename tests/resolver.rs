use std::time::{Duration, Instant};
use vehicle_lister_lib::dom::{Document, HtmlDocument};
use vehicle_lister_lib::engine::{ElementResolver, Position, ResolutionQuery, RetryPolicy};

const QUICK: RetryPolicy = RetryPolicy::new(1, Duration::from_millis(1));

async fn resolved_name(markup: &str, query: ResolutionQuery) -> Option<String> {
    let doc = HtmlDocument::parse(markup);
    let resolver = ElementResolver::new(&doc);
    let el = resolver.resolve(&query, QUICK).await.ok()?;
    let info = doc.describe(el).await.ok()?;
    info.attr("name").map(str::to_string)
}

#[tokio::test]
async fn direct_selector_wins() {
    let markup = r#"<input name="other"><input name="make">"#;
    let query = ResolutionQuery::selectors(&[r#"input[name="make"]"#]);
    assert_eq!(resolved_name(markup, query).await.as_deref(), Some("make"));
}

#[tokio::test]
async fn invalid_selector_is_skipped() {
    let markup = r#"<input name="make">"#;
    let query = ResolutionQuery::selectors(&["div:contains('Make')", r#"input[name="make"]"#]);
    assert_eq!(resolved_name(markup, query).await.as_deref(), Some("make"));
}

#[tokio::test]
async fn label_bound_by_for() {
    let markup = r#"<label for="m">Model</label><div><input id="m" name="model"></div>"#;
    let query = ResolutionQuery::default().label("model");
    assert_eq!(resolved_name(markup, query).await.as_deref(), Some("model"));
}

#[tokio::test]
async fn label_wrapping_control() {
    let markup = r#"<label>Asking price <input name="price"></label>"#;
    let query = ResolutionQuery::default().label("Price");
    assert_eq!(resolved_name(markup, query).await.as_deref(), Some("price"));
}

#[tokio::test]
async fn label_followed_by_control() {
    let markup = r#"<div><label>Mileage</label><input name="mileage"></div>"#;
    let query = ResolutionQuery::default().label("mileage");
    assert_eq!(resolved_name(markup, query).await.as_deref(), Some("mileage"));
}

#[tokio::test]
async fn label_parent_scope() {
    let markup = r#"
        <div class="field">
          <label>Exterior color</label>
          <span class="hint">pick one</span>
          <div><select name="color"><option>Blue</option></select></div>
        </div>"#;
    let query = ResolutionQuery::default().label("exterior color");
    assert_eq!(resolved_name(markup, query).await.as_deref(), Some("color"));
}

#[tokio::test]
async fn placeholder_only() {
    let markup = r#"<input name="a" placeholder="Search"><input name="loc" placeholder="Enter Location">"#;
    let query = ResolutionQuery::default().placeholder("location");
    assert_eq!(resolved_name(markup, query).await.as_deref(), Some("loc"));
}

#[tokio::test]
async fn accessible_name_only() {
    let markup = r#"<input name="a" aria-label="Search"><input name="fuel" aria-label="Fuel type">"#;
    let query = ResolutionQuery::default().aria_label("FUEL");
    assert_eq!(resolved_name(markup, query).await.as_deref(), Some("fuel"));
}

#[tokio::test]
async fn role_honors_position() {
    let markup = r#"
        <div role="combobox" name="first"></div>
        <div role="combobox" name="second"></div>
        <div role="combobox" name="third"></div>"#;
    let first = ResolutionQuery::default().role("combobox");
    assert_eq!(resolved_name(markup, first).await.as_deref(), Some("first"));
    let last = ResolutionQuery::default().role("combobox").position(Position::Last);
    assert_eq!(resolved_name(markup, last).await.as_deref(), Some("third"));
    let second = ResolutionQuery::default()
        .role("combobox")
        .position(Position::Index(1));
    assert_eq!(resolved_name(markup, second).await.as_deref(), Some("second"));
}

#[tokio::test]
async fn out_of_range_position_finds_nothing() {
    let markup = r#"<div role="combobox" name="only"></div>"#;
    let query = ResolutionQuery::default()
        .role("combobox")
        .position(Position::Index(4));
    assert_eq!(resolved_name(markup, query).await, None);
}

#[tokio::test]
async fn tag_only() {
    let markup = r#"<input name="x"><textarea name="notes"></textarea>"#;
    let query = ResolutionQuery::default().tag("textarea");
    assert_eq!(resolved_name(markup, query).await.as_deref(), Some("notes"));
}

#[tokio::test]
async fn input_type_only() {
    let markup = r#"<input name="x"><input type="file" name="photos">"#;
    let query = ResolutionQuery::default().input_type("file");
    assert_eq!(resolved_name(markup, query).await.as_deref(), Some("photos"));
}

#[tokio::test]
async fn test_id_only() {
    let markup = r#"<input name="x" data-testid="price-input-old"><input name="price" data-testid="price-input">"#;
    let query = ResolutionQuery::default().test_id("price-input");
    assert_eq!(resolved_name(markup, query).await.as_deref(), Some("price"));
}

#[tokio::test]
async fn not_found_spends_whole_budget() {
    let doc = HtmlDocument::parse(r#"<input name="make">"#);
    let resolver = ElementResolver::new(&doc);
    let policy = RetryPolicy::new(4, Duration::from_millis(25));
    let query = ResolutionQuery::selectors(&["#missing"]).label("Nope");

    let start = Instant::now();
    let result = resolver.resolve(&query, policy).await;
    assert!(result.is_err());
    assert!(start.elapsed() >= policy.budget());
}

#[tokio::test]
async fn resolve_all_takes_first_nonempty_selector() {
    let doc = HtmlDocument::parse(r#"<ul><li>a</li><li>b</li></ul><div class="menu-item">c</div>"#);
    let resolver = ElementResolver::new(&doc);
    let found = resolver
        .resolve_all(&[r#"[role="option"]"#, ".menu-item", "ul > li"], QUICK)
        .await;
    assert_eq!(found.len(), 1);

    let none = resolver.resolve_all(&[".nothing"], QUICK).await;
    assert!(none.is_empty());
}
