use std::path::PathBuf;

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn load_fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", relative))
}

/// Load an HTML page fixture, replacing `{{base}}` with a mock server URI
pub fn load_page(name: &str, base: &str) -> String {
    load_fixture(&format!("pages/{}", name)).replace("{{base}}", base)
}
