use std::fs;

const DEFAULT_CONFIG: &str = "src/default_config.toml";

fn main() {
    println!("cargo:rerun-if-changed={}", DEFAULT_CONFIG);

    let content = fs::read_to_string(DEFAULT_CONFIG).expect("Failed to read default_config.toml");

    // The bundled config must parse and carry the style tables the converter reads
    let table = match content.parse::<toml::Table>() {
        Ok(table) => table,
        Err(e) => panic!("Invalid default_config.toml: {}", e),
    };
    let Some(styles) = table.get("styles").and_then(|s| s.as_table()) else {
        panic!("default_config.toml is missing the [styles] table");
    };
    for section in ["headings", "paragraph", "code", "lists", "table", "admonitions"] {
        if !styles.contains_key(section) {
            panic!("default_config.toml is missing [styles.{}]", section);
        }
    }
}
