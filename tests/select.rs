use vehicle_lister_lib::config::EngineConfig;
use vehicle_lister_lib::dom::{Document, DomEvent, HtmlDocument};
use vehicle_lister_lib::engine::{
    ElementResolver, OptionSelector, ResolutionQuery, SelectOptions, Selection,
};
use vehicle_lister_lib::error::EngineError;

fn quick() -> SelectOptions {
    SelectOptions::from_config(&EngineConfig::instant())
}

#[tokio::test]
async fn exact_match_beats_containment() {
    let doc = HtmlDocument::parse(
        r#"
        <div role="combobox" aria-label="Exterior color"></div>
        <div role="listbox">
          <div role="option" id="o1">Dark Blue</div>
          <div role="option" id="o2">Blue Metallic</div>
          <div role="option" id="o3">blue</div>
        </div>"#,
    );
    let resolver = ElementResolver::new(&doc);
    let query = ResolutionQuery::selectors(&[r#"[aria-label="Exterior color"]"#]);

    let selection = OptionSelector::new(&resolver)
        .select(&query, "Blue", &quick())
        .await
        .unwrap();

    assert_eq!(selection, Selection::Option("blue".to_string()));
    assert!(doc.was_clicked(r#"[role="combobox"]"#));
    assert!(doc.was_clicked("#o3"));
    assert!(!doc.was_clicked("#o1"));
}

#[tokio::test]
async fn containment_when_no_exact() {
    let doc = HtmlDocument::parse(
        r#"
        <button aria-label="Vehicle type"></button>
        <ul><li id="a">Motorcycle</li><li id="b">Car/Truck</li></ul>"#,
    );
    let resolver = ElementResolver::new(&doc);
    let query = ResolutionQuery::selectors(&[r#"[aria-label="Vehicle type"]"#]);

    let selection = OptionSelector::new(&resolver)
        .select(&query, "car", &quick())
        .await
        .unwrap();
    assert_eq!(selection, Selection::Option("Car/Truck".to_string()));
    assert!(doc.was_clicked("#b"));
}

#[tokio::test]
async fn native_select_uses_its_options() {
    let doc = HtmlDocument::parse(
        r#"
        <select name="transmission">
          <option value="">Choose</option>
          <option value="auto">Automatic</option>
          <option value="man">Manual</option>
        </select>
        <div role="option">Automatic transmission decoy</div>"#,
    );
    let resolver = ElementResolver::new(&doc);
    let query = ResolutionQuery::selectors(&[r#"select[name="transmission"]"#]);

    let selection = OptionSelector::new(&resolver)
        .select(&query, "Manual", &quick())
        .await
        .unwrap();
    assert_eq!(selection, Selection::Native("man".to_string()));
    assert_eq!(doc.value_of("select").as_deref(), Some("man"));
    assert_eq!(doc.events_on("select"), vec![DomEvent::Input, DomEvent::Change]);
}

#[tokio::test]
async fn text_trigger_falls_back_to_typing() {
    let doc = HtmlDocument::parse(
        r#"<input name="make" aria-label="Make" role="combobox">
           <div role="option">Honda</div>"#,
    );
    let resolver = ElementResolver::new(&doc);
    let query = ResolutionQuery::selectors(&[r#"input[name="make"]"#]);

    let selection = OptionSelector::new(&resolver)
        .select(&query, "Lada", &quick())
        .await
        .unwrap();
    assert_eq!(selection, Selection::DirectInput);
    assert_eq!(doc.value_of("input").as_deref(), Some("Lada"));
    assert_eq!(
        doc.events_on("input"),
        vec![DomEvent::Input, DomEvent::Change, DomEvent::enter()]
    );
}

#[tokio::test]
async fn non_text_trigger_without_match_fails() {
    let doc = HtmlDocument::parse(
        r#"<div role="combobox" aria-label="Fuel type"></div>
           <div role="option">Gasoline</div>"#,
    );
    let resolver = ElementResolver::new(&doc);
    let query = ResolutionQuery::selectors(&[r#"[aria-label="Fuel type"]"#]);

    let err = OptionSelector::new(&resolver)
        .select(&query, "Hydrogen", &quick())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Simulation { .. }));
}

#[tokio::test]
async fn unresolved_trigger_found_through_label() {
    let doc = HtmlDocument::parse(
        r#"
        <input type="hidden" name="csrf">
        <div>
          <label>Year</label>
          <div role="combobox" id="year-box"></div>
        </div>
        <div role="option" id="y22">2022</div>"#,
    );
    let resolver = ElementResolver::new(&doc);
    // The selector misses; only the label text leads to the widget.
    let query = ResolutionQuery::selectors(&[r#"[aria-label="Year"]"#]);

    let selection = OptionSelector::new(&resolver)
        .select(&query, "2022", &quick())
        .await
        .unwrap();
    assert_eq!(selection, Selection::Option("2022".to_string()));
    assert!(doc.was_clicked("#year-box"));
    assert!(doc.was_clicked("#y22"));
}

#[tokio::test]
async fn last_resort_skips_filled_inputs() {
    let doc = HtmlDocument::parse(
        r#"
        <input name="make" value="Toyota">
        <input type="hidden" name="csrf">
        <input type="checkbox" name="clean-title">
        <input name="notes">
        <div role="option">Gasoline</div>"#,
    );
    let resolver = ElementResolver::new(&doc);
    let query = ResolutionQuery::selectors(&[r#"[aria-label="Fuel type"]"#]);

    let selection = OptionSelector::new(&resolver)
        .select(&query, "Hybrid", &quick())
        .await
        .unwrap();

    assert_eq!(selection, Selection::Fallback(Box::new(Selection::DirectInput)));
    assert_eq!(doc.value_of(r#"[name="make"]"#).as_deref(), Some("Toyota"));
    assert!(doc.events_on(r#"[name="make"]"#).is_empty());
    assert_eq!(doc.value_of(r#"[name="notes"]"#).as_deref(), Some("Hybrid"));
}

#[tokio::test]
async fn written_inputs_are_not_reused() {
    let doc = HtmlDocument::parse(
        r#"<input name="make"><div role="option">Gasoline</div>"#,
    );
    let make = doc.query("input").await.unwrap().unwrap();
    doc.set_value(make, "Toyota").await.unwrap();
    let resolver = ElementResolver::new(&doc);
    let query = ResolutionQuery::selectors(&[r#"[aria-label="Fuel type"]"#]);

    let err = OptionSelector::new(&resolver)
        .select(&query, "Hybrid", &quick())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Resolution { .. }));
    assert_eq!(doc.value_of("input").as_deref(), Some("Toyota"));
}
