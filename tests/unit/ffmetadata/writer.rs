use super::*;

#[test]
fn writes_header_global_then_sections() {
    let mut doc = FfMetadata::new();
    let mut global = FfSection::new();
    global.insert("title".into(), "Song".into());
    doc.insert(GLOBAL_SECTION, global);
    let mut chapter = FfSection::new();
    chapter.insert("title".into(), "Intro".into());
    doc.insert("CHAPTER", chapter);

    assert_eq!(
        doc.to_string(),
        ";FFMETADATA1\ntitle=Song\n[CHAPTER]\ntitle=Intro\n"
    );
}

#[test]
fn special_characters_are_escaped() {
    assert_eq!(escape("a=b;c#d\\e"), "a\\=b\\;c\\#d\\\\e");
    assert_eq!(escape("two\nlines"), "two\\\nlines");
}

#[test]
fn written_text_parses_back() {
    let mut doc = FfMetadata::new();
    let mut global = FfSection::new();
    global.insert("key=with;delims#".into(), "C:\\path".into());
    global.insert("comment".into(), "100% ; sure".into());
    doc.insert(GLOBAL_SECTION, global);
    doc.insert("STREAM", FfSection::new());

    let parsed = FfMetadata::parse(&doc.to_string()).unwrap();
    assert_eq!(parsed, doc);
}
