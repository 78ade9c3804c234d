//! Helpers shared by the command-line tools.
//!
//! Every `*_or_exit` helper reports on stderr and exits with status 1.

use std::io::Write;
use std::path::Path;
use std::process;

use serde::Serialize;
use serde_json::Value;

use crate::config::{Model, ModelConfig};
use crate::entity::Entity;

/// Reports `message` on stderr and exits with status 1.
pub fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    process::exit(1);
}

/// Like [`fail`], followed by the tool's usage text.
pub fn fail_with_usage(message: impl std::fmt::Display, usage: &str) -> ! {
    eprintln!("error: {message}\n\n{usage}");
    process::exit(1);
}

/// Writes `value` to stdout as indented JSON followed by a newline.
pub fn emit_json(value: &impl Serialize) {
    let mut stdout = std::io::stdout().lock();
    let written = serde_json::to_writer_pretty(&mut stdout, value)
        .map_err(|e| e.to_string())
        .and_then(|()| writeln!(stdout).map_err(|e| e.to_string()));
    if let Err(e) = written {
        fail(format_args!("cannot write JSON output: {e}"));
    }
}

/// Reads and resolves the YAML model at `path`.
pub fn load_model_or_exit(path: &str) -> Model {
    ModelConfig::from_path(path)
        .and_then(|config| config.build())
        .unwrap_or_else(|e| fail(format_args!("model {path}: {e}")))
}

/// Looks up entity `name` in `model`, listing the declared entities when it is missing.
pub fn entity_or_exit(model: &Model, name: &str) -> Entity {
    if let Some(entity) = model.entities.get(name) {
        return entity.clone();
    }
    let declared = model
        .entities
        .iter()
        .map(|(declared, _)| declared)
        .collect::<Vec<_>>()
        .join(", ");
    fail(format_args!("model declares no entity {name} (declared: {declared})"))
}

/// Parses the JSON record stored at `path`.
pub fn read_record(path: impl AsRef<Path>) -> Result<Value, String> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&content).map_err(|e| format!("{} is not JSON: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_are_read_from_disk() {
        let dir = std::env::temp_dir().join(format!("focus4-cli-{}", process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let good = dir.join("good.json");
        let bad = dir.join("bad.json");
        std::fs::write(&good, r#"{"code": "OP1"}"#).unwrap();
        std::fs::write(&bad, "code: OP1").unwrap();

        assert_eq!(read_record(&good).unwrap(), json!({"code": "OP1"}));
        assert!(read_record(&bad).unwrap_err().contains("is not JSON"));
        assert!(
            read_record(dir.join("missing.json"))
                .unwrap_err()
                .starts_with("cannot read")
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
