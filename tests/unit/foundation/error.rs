use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        MadamError::unsupported("x")
            .to_string()
            .contains("unsupported format:")
    );
    assert!(
        MadamError::operator("x")
            .to_string()
            .contains("operator error:")
    );
    assert!(MadamError::not_found("x").to_string().contains("not found:"));
    assert!(
        MadamError::config("x")
            .to_string()
            .contains("configuration error:")
    );
    assert!(
        MadamError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn already_exists_names_the_path() {
    let err = MadamError::AlreadyExists(PathBuf::from("/tmp/storage.bin"));
    assert!(err.to_string().contains("/tmp/storage.bin"));
}

#[test]
fn parse_errors_keep_the_line_number() {
    let err = MadamError::from(FfMetadataError::new(3, "unescaped '='"));
    assert!(err.to_string().contains("line 3"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = MadamError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
