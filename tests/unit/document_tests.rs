/*!
 * Tests for segment document loading
 */

use docufluent::errors::AppError;
use docufluent::translation::document::SegmentDocument;

use crate::common::{create_temp_dir, create_test_file};

#[test]
fn test_load_namedJson_shouldKeepOrderAndPlaceholders() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(
        dir.path(),
        "paper.json",
        r#"{
            "name": "bridge_report",
            "segments": [
                {"id": "h1", "text": "Introduction"},
                {"id": "p1", "text": "Let {{MATH_0}} be the span.", "placeholders": ["{{MATH_0}}"]}
            ]
        }"#,
    )
    .unwrap();

    let document = SegmentDocument::load(&path).unwrap();
    assert_eq!(document.name, "bridge_report");
    assert_eq!(document.len(), 2);
    assert_eq!(document.segments[1].placeholders, vec!["{{MATH_0}}".to_string()]);
}

#[test]
fn test_load_bareJsonArray_shouldUseFileStem() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "notes.json", r#"[{"id": "a", "text": "One"}]"#).unwrap();

    let document = SegmentDocument::load(&path).unwrap();
    assert_eq!(document.name, "notes");
    assert_eq!(document.segments[0].text, "One");
}

#[test]
fn test_load_plainText_shouldSplitParagraphs() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "memo.txt", "First line\ncontinues.\n\n\nSecond paragraph.\n").unwrap();

    let document = SegmentDocument::load(&path).unwrap();
    assert_eq!(document.len(), 2);
    assert_eq!(document.segments[0].id, "p1");
    assert_eq!(document.segments[0].text, "First line\ncontinues.");
    assert_eq!(document.segments[1].text, "Second paragraph.");
}

#[test]
fn test_load_duplicateIds_shouldFailWithDocumentError() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(
        dir.path(),
        "dup.json",
        r#"[{"id": "a", "text": "One"}, {"id": "a", "text": "Two"}]"#,
    )
    .unwrap();

    assert!(matches!(SegmentDocument::load(&path), Err(AppError::Document(_))));
}

#[test]
fn test_load_malformedJson_shouldFailWithDocumentError() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "broken.json", "[{\"id\": ").unwrap();
    assert!(matches!(SegmentDocument::load(&path), Err(AppError::Document(_))));
}
