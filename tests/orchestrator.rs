mod common;

use common::{RecordingReporter, ScriptedTechnique};
use std::time::Duration;
use vehicle_lister_lib::config::EngineConfig;
use vehicle_lister_lib::dom::HtmlDocument;
use vehicle_lister_lib::engine::assets::AcquisitionTechnique;
use vehicle_lister_lib::engine::{
    AssetFetcher, FieldRecord, FillState, FormFiller, ImageList, Outcome, Severity,
};
use vehicle_lister_lib::platforms::marketplace;

const FORM: &str = r#"
<form>
  <input name="make">
  <input name="model">
  <div role="combobox" aria-label="Year" id="year"></div>
  <ul role="listbox">
    <li role="option" id="y2021">2021</li>
    <li role="option" id="y2022">2022</li>
  </ul>
  <input name="price">
  <input name="mileage">
  <input name="location">
  <input type="file" accept="image/*" multiple>
</form>
"#;

fn no_fetch() -> AssetFetcher<'static> {
    AssetFetcher::new(Vec::new(), 5, Duration::from_millis(10))
}

fn corolla() -> FieldRecord {
    FieldRecord::new()
        .with("make", "Toyota")
        .with("model", "Corolla")
        .with("year", 2022i64)
        .with("price", 21000i64)
}

#[tokio::test]
async fn unloaded_form_fails_without_touching_fields() {
    let doc = HtmlDocument::parse(r#"<form><input name="make"><input name="model"></form>"#);
    let status = RecordingReporter::default();
    let config = EngineConfig::instant();
    let filler = FormFiller::new(&doc, &status, &config, &marketplace::PROFILE);

    let outcome = filler.run(&corolla(), None, &no_fetch()).await;

    assert_eq!(outcome.outcome, Outcome::Failed);
    assert!(outcome.message.to_lowercase().contains("form did not load"));
    assert_eq!(filler.state(), FillState::Failed);
    assert!(doc
        .queried_selectors()
        .iter()
        .all(|s| s == marketplace::PROFILE.ready_selector));
    assert_eq!(doc.mutation_count(), 0);
    assert_eq!(
        status.terminal(),
        vec![(outcome.message.clone(), Severity::Error)]
    );
}

#[tokio::test]
async fn fills_all_four_fields() {
    let doc = HtmlDocument::parse(FORM);
    let status = RecordingReporter::default();
    let config = EngineConfig::instant();
    let filler = FormFiller::new(&doc, &status, &config, &marketplace::PROFILE);

    let outcome = filler.run(&corolla(), None, &no_fetch()).await;

    assert_eq!(outcome.outcome, Outcome::Success, "{}", outcome.message);
    assert_eq!(filler.state(), FillState::Done(Outcome::Success));
    assert_eq!(doc.value_of(r#"[name="make"]"#).as_deref(), Some("Toyota"));
    assert_eq!(doc.value_of(r#"[name="model"]"#).as_deref(), Some("Corolla"));
    assert_eq!(doc.value_of(r#"[name="price"]"#).as_deref(), Some("21000"));
    assert!(doc.was_clicked("#year"));
    assert!(doc.was_clicked("#y2022"));
    assert!(!doc.was_clicked("#y2021"));
    assert_eq!(doc.value_of(r#"[name="mileage"]"#).as_deref(), Some(""));

    let terminal = status.terminal();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].1, Severity::Success);
}

#[tokio::test]
async fn missing_control_degrades_to_partial() {
    let doc = HtmlDocument::parse(FORM);
    let status = RecordingReporter::default();
    let config = EngineConfig::instant();
    let filler = FormFiller::new(&doc, &status, &config, &marketplace::PROFILE);
    let record = corolla().with("fuelType", "Hybrid");

    let outcome = filler.run(&record, None, &no_fetch()).await;

    assert_eq!(outcome.outcome, Outcome::Partial, "{}", outcome.message);
    assert!(outcome.message.contains("fuelType"));
    assert_eq!(doc.value_of(r#"[name="make"]"#).as_deref(), Some("Toyota"));
    assert_eq!(doc.value_of(r#"[name="model"]"#).as_deref(), Some("Corolla"));
    assert_eq!(doc.value_of(r#"[name="price"]"#).as_deref(), Some("21000"));
    assert_eq!(status.terminal().len(), 1);
    assert_eq!(status.terminal()[0].1, Severity::Warning);
}

#[tokio::test]
async fn one_failed_image_still_uploads_the_other() {
    let doc = HtmlDocument::parse(FORM);
    let status = RecordingReporter::default();
    let config = EngineConfig::instant();
    let filler = FormFiller::new(&doc, &status, &config, &marketplace::PROFILE);

    let direct = ScriptedTechnique::new("direct", &["https://img/ok.jpg"]);
    let relay = ScriptedTechnique::new("relay", &[]);
    let techniques: Vec<Box<dyn AcquisitionTechnique + '_>> =
        vec![Box::new(&direct), Box::new(&relay)];
    let fetcher = AssetFetcher::new(techniques, 5, Duration::from_millis(200));
    let images = ImageList::new(["https://img/ok.jpg", "https://img/gone.jpg"]);

    let outcome = filler.run(&corolla(), Some(&images), &fetcher).await;

    assert_eq!(outcome.outcome, Outcome::Partial, "{}", outcome.message);
    let files = doc.files_on(r#"input[type="file"]"#);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].bytes, b"direct:https://img/ok.jpg");
    assert_eq!(doc.value_of(r#"[name="make"]"#).as_deref(), Some("Toyota"));
    assert_eq!(status.terminal().len(), 1);
    assert_eq!(status.terminal()[0].1, Severity::Warning);
}

#[tokio::test]
async fn rejected_file_list_needs_manual_action() {
    let doc = HtmlDocument::parse(FORM).without_file_assignment();
    let status = RecordingReporter::default();
    let config = EngineConfig::instant();
    let filler = FormFiller::new(&doc, &status, &config, &marketplace::PROFILE);

    let direct = ScriptedTechnique::new("direct", &["https://img/ok.jpg"]);
    let techniques: Vec<Box<dyn AcquisitionTechnique + '_>> = vec![Box::new(&direct)];
    let fetcher = AssetFetcher::new(techniques, 5, Duration::from_millis(200));
    let images = ImageList::new(["https://img/ok.jpg"]);

    let outcome = filler.run(&corolla(), Some(&images), &fetcher).await;

    assert_eq!(outcome.outcome, Outcome::Partial);
    assert!(outcome.message.contains("manually"));
    assert!(doc.was_clicked(r#"input[type="file"]"#));
}

#[tokio::test]
async fn record_is_left_untouched() {
    let doc = HtmlDocument::parse(FORM);
    let status = RecordingReporter::default();
    let config = EngineConfig::instant();
    let filler = FormFiller::new(&doc, &status, &config, &marketplace::PROFILE);
    let record = corolla().with("title", "").with("mileage", "45,000 km");
    let before = record.clone();

    filler.run(&record, None, &no_fetch()).await;

    assert_eq!(record, before);
    assert_eq!(doc.value_of(r#"[name="mileage"]"#).as_deref(), Some("45000"));
}
